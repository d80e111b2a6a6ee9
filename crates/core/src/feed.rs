//! Channel upload feeds.
//!
//! YouTube publishes the latest uploads of a channel as an Atom document:
//! ```xml
//! <feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns="http://www.w3.org/2005/Atom">
//!   <entry>
//!     <yt:videoId>dQw4w9WgXcQ</yt:videoId>
//!     <title>Never Gonna Give You Up</title>
//!     <published>2009-10-25T06:57:33+00:00</published>
//!   </entry>
//! </feed>
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::{PipelineError, Result},
    video::is_safe_video_id,
};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const YT_NS: &str = "http://www.youtube.com/xml/schemas/2015";
const SERVICE: &str = "channel feed";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    pub video_id: String,
    pub title: String,
    pub published: Option<DateTime<Utc>>,
}

pub fn feed_url(channel_id: &str) -> String {
    format!(
        "https://www.youtube.com/feeds/videos.xml?channel_id={}",
        channel_id
    )
}

/// Parse an upload feed into entries, in document order.
///
/// Entries without a usable `yt:videoId` are skipped.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| PipelineError::upstream(SERVICE, format!("XML parse error: {}", e)))?;

    let root = doc.root_element();
    if !root.has_tag_name((ATOM_NS, "feed")) {
        return Err(PipelineError::upstream(
            SERVICE,
            "root element must be an Atom <feed>",
        ));
    }

    let entries = root
        .children()
        .filter(|n| n.has_tag_name((ATOM_NS, "entry")))
        .filter_map(|entry| {
            let child_text = |ns: &str, name: &str| {
                entry
                    .children()
                    .find(|n| n.has_tag_name((ns, name)))
                    .and_then(|n| n.text())
                    .map(str::trim)
            };

            let video_id = child_text(YT_NS, "videoId").filter(|id| is_safe_video_id(id))?;
            Some(FeedEntry {
                video_id: video_id.to_string(),
                title: child_text(ATOM_NS, "title").unwrap_or_default().to_string(),
                published: child_text(ATOM_NS, "published")
                    .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                    .map(|ts| ts.with_timezone(&Utc)),
            })
        })
        .collect();

    Ok(entries)
}

pub struct FeedClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl FeedClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    pub async fn fetch(&self, channel_id: &str) -> Result<Vec<FeedEntry>> {
        let response = self
            .http
            .get(feed_url(channel_id))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PipelineError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PipelineError::RateLimited {
                service: SERVICE,
                retry_after: None,
            });
        }
        if !status.is_success() {
            return Err(PipelineError::upstream(
                SERVICE,
                format!("{} for channel {}", status, channel_id),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::upstream(SERVICE, e.to_string()))?;
        parse_feed(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
  <title>Some Channel</title>
  <entry>
    <id>yt:video:dQw4w9WgXcQ</id>
    <yt:videoId>dQw4w9WgXcQ</yt:videoId>
    <title>How to start small</title>
    <published>2024-03-01T12:00:00+00:00</published>
  </entry>
  <entry>
    <yt:videoId>../../etc/passwd</yt:videoId>
    <title>broken</title>
  </entry>
  <entry>
    <yt:videoId>abcdefghijk</yt:videoId>
    <title>Second</title>
    <published>not a date</published>
  </entry>
</feed>"#;

    #[test]
    fn extracts_video_ids_in_order() {
        let entries = parse_feed(FEED).unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.video_id.as_str()).collect();
        assert_eq!(ids, vec!["dQw4w9WgXcQ", "abcdefghijk"]);
        assert_eq!(entries[0].title, "How to start small");
        assert!(entries[0].published.is_some());
        assert!(entries[1].published.is_none());
    }

    #[test]
    fn rejects_non_atom_documents() {
        assert!(parse_feed("<rss><channel/></rss>").is_err());
        assert!(parse_feed("not xml").is_err());
    }

    #[test]
    fn feed_url_uses_channel_id() {
        assert_eq!(
            feed_url("UC123"),
            "https://www.youtube.com/feeds/videos.xml?channel_id=UC123"
        );
    }
}
