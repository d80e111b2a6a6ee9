use chrono::Utc;

use crate::types::{ContentRecord, ContentSummary};

/// Format an archived record as human-readable markdown
pub fn format_report_readable(record: &ContentRecord) -> String {
    let mut output = String::new();

    let Some(summary) = &record.summary else {
        output.push_str(&format!("# {}\n\n", record.video_id));
        output.push_str(&format!("**Status:** {}\n", record.status));
        if let Some(error) = &record.error {
            output.push_str(&format!("**Error:** {}\n", error));
        }
        return output;
    };

    output.push_str(&format!("# {}\n\n", summary.one_liner));
    output.push_str(&format!(
        "**Difficulty:** {} | **Source language:** {} | **Video:** {}\n\n",
        summary.difficulty.label_ko(),
        record.source_language.as_deref().unwrap_or("unknown"),
        record.video_url
    ));

    if !summary.tags.is_empty() {
        output.push_str(&format!("**Tags:** {}\n\n", summary.tags.join(", ")));
    }

    output.push_str("## 핵심 포인트\n\n");
    for point in &summary.key_points {
        output.push_str(&format!("### {}\n\n{}\n\n", point.title, point.description));
        if !point.example.is_empty() {
            output.push_str(&format!("> {}\n\n", point.example));
        }
    }

    if !summary.quotes.is_empty() {
        output.push_str("## 인용구\n\n");
        for quote in &summary.quotes {
            output.push_str(&format!("• \"{}\"\n  \"{}\"\n", quote.original, quote.translated));
        }
        output.push('\n');
    }

    if !summary.action_items.is_empty() {
        output.push_str("## 액션 아이템\n\n");
        for (i, item) in summary.action_items.iter().enumerate() {
            output.push_str(&format!("{}. {}\n", i + 1, item));
        }
        output.push('\n');
    }

    if !summary.related_topics.is_empty() {
        output.push_str("## 연관 주제\n\n");
        for topic in &summary.related_topics {
            output.push_str(&format!("• {}\n", topic));
        }
        output.push('\n');
    }

    output
}

pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn summary_sections(summary: &ContentSummary) -> String {
    let mut html = String::new();

    html.push_str("<section>\n<h2>핵심 포인트</h2>\n");
    for point in &summary.key_points {
        html.push_str(&format!(
            "<div class=\"key-point\">\n<h4>{}</h4>\n<p>{}</p>\n",
            escape_html(&point.title),
            escape_html(&point.description)
        ));
        if !point.example.is_empty() {
            html.push_str(&format!(
                "<p class=\"example\">{}</p>\n",
                escape_html(&point.example)
            ));
        }
        html.push_str("</div>\n");
    }
    html.push_str("</section>\n");

    html.push_str("<section>\n<h2>인용구</h2>\n");
    for quote in &summary.quotes {
        html.push_str(&format!(
            "<blockquote class=\"quote\">\n<p class=\"original\">\"{}\"</p>\n<p class=\"korean\">\"{}\"</p>\n</blockquote>\n",
            escape_html(&quote.original),
            escape_html(&quote.translated)
        ));
    }
    html.push_str("</section>\n");

    html.push_str("<section>\n<h2>액션 아이템</h2>\n<ul class=\"actions\">");
    for item in &summary.action_items {
        html.push_str(&format!("<li>{}</li>", escape_html(item)));
    }
    html.push_str("</ul>\n</section>\n");

    html.push_str("<section>\n<h2>연관 주제</h2>\n<div class=\"topics\">");
    for topic in &summary.related_topics {
        html.push_str(&format!("<span class=\"topic\">{}</span>", escape_html(topic)));
    }
    html.push_str("</div>\n</section>\n");

    html
}

const STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; line-height: 1.8; color: #333; background: #f8f9fa; }
.container { max-width: 800px; margin: 0 auto; padding: 40px 20px; }
header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 40px 20px; margin-bottom: 30px; border-radius: 16px; }
header h1 { font-size: 1.8em; margin-bottom: 16px; }
.meta, .tags, .topics { display: flex; gap: 10px; flex-wrap: wrap; align-items: center; }
.tags { margin-top: 16px; }
.difficulty, .video-link, .tag { background: rgba(255,255,255,0.2); color: white; padding: 4px 12px; border-radius: 20px; font-size: 0.85em; text-decoration: none; }
section { background: white; padding: 30px; margin-bottom: 20px; border-radius: 12px; box-shadow: 0 2px 8px rgba(0,0,0,0.08); }
section h2 { font-size: 1.3em; margin-bottom: 20px; padding-bottom: 10px; border-bottom: 2px solid #667eea; color: #444; }
.key-point { margin-bottom: 24px; padding: 20px; background: #f8f9fa; border-radius: 8px; border-left: 4px solid #667eea; }
.key-point h4 { color: #667eea; margin-bottom: 8px; }
.key-point .example { margin-top: 12px; padding: 12px; background: #e9ecef; border-radius: 6px; font-size: 0.9em; color: #666; }
.quote { margin-bottom: 20px; padding: 20px; background: #f1f3f6; border-radius: 8px; }
.quote .original { font-style: italic; color: #666; margin-bottom: 8px; }
.quote .korean { font-weight: 500; }
.actions { padding-left: 20px; }
.actions li { margin-bottom: 12px; }
.topic { background: #e9ecef; padding: 6px 14px; border-radius: 20px; font-size: 0.9em; color: #555; }
.transcript { max-height: 400px; overflow-y: auto; padding: 20px; background: #f8f9fa; border-radius: 8px; }
.transcript p { margin-bottom: 16px; }
.collapse-btn { background: #667eea; color: white; border: none; padding: 10px 20px; border-radius: 8px; cursor: pointer; margin-bottom: 16px; }
.collapsed { display: none; }
footer { text-align: center; padding: 20px; color: #888; font-size: 0.85em; }
"#;

/// Render a record as a standalone HTML page.
pub fn render_html(record: &ContentRecord) -> String {
    let title = record
        .summary
        .as_ref()
        .map(|s| s.one_liner.as_str())
        .unwrap_or("YouTube 번역");

    let difficulty = record
        .summary
        .as_ref()
        .map(|s| s.difficulty.label_ko())
        .unwrap_or("-");

    let tags: String = record
        .summary
        .iter()
        .flat_map(|s| s.tags.iter())
        .map(|tag| format!("<span class=\"tag\">{}</span>", escape_html(tag)))
        .collect();

    let sections = record
        .summary
        .as_ref()
        .map(summary_sections)
        .unwrap_or_default();

    let paragraphs: String = record
        .korean_transcript
        .as_deref()
        .unwrap_or_default()
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p)))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="ko">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
<div class="container">
<header>
<h1>{title}</h1>
<div class="meta">
<span class="difficulty">{difficulty}</span>
<a href="{url}" target="_blank" class="video-link">YouTube에서 보기</a>
</div>
<div class="tags">{tags}</div>
</header>
{sections}<section>
<h2>전체 번역</h2>
<button class="collapse-btn" onclick="document.getElementById('transcript').classList.toggle('collapsed')">펼치기 / 접기</button>
<div class="transcript" id="transcript">{paragraphs}</div>
</section>
<footer><p>beonyeok | {generated}</p></footer>
</div>
</body>
</html>
"#,
        title = escape_html(title),
        style = STYLE,
        difficulty = difficulty,
        url = escape_html(&record.video_url),
        tags = tags,
        sections = sections,
        paragraphs = paragraphs,
        generated = Utc::now().format("%Y-%m-%d %H:%M"),
    )
}
