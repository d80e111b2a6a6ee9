use std::{net::SocketAddr, path::PathBuf, time::Duration};

use beonyeok_core::{Provider, StoreKind};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "beonyeok-server")]
#[command(about = "Serve the beonyeok API and poll channel feeds for new uploads")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "BEONYEOK_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// AI provider for translation and summaries
    #[arg(long, env = "BEONYEOK_PROVIDER", default_value = "anthropic")]
    pub provider: Provider,

    /// Override the provider's default model
    #[arg(long, env = "BEONYEOK_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "BEONYEOK_STORE", default_value = "json")]
    pub store: StoreKind,

    #[arg(long, env = "BEONYEOK_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Shared secret expected in `x-webhook-secret`; unset disables the check
    #[arg(long, env = "WEBHOOK_SECRET")]
    pub webhook_secret: Option<String>,

    /// Pipeline runs allowed at the same time
    #[arg(long, env = "BEONYEOK_MAX_CONCURRENT_JOBS", default_value_t = 2)]
    pub max_concurrent_jobs: usize,

    /// Channel ids whose upload feeds are polled
    #[arg(long = "channel", env = "BEONYEOK_CHANNELS", value_delimiter = ',')]
    pub channels: Vec<String>,

    /// Seconds between feed polls
    #[arg(long, env = "BEONYEOK_POLL_INTERVAL_SECS", default_value_t = 900)]
    pub poll_interval_secs: u64,

    /// Seconds a finished job stays queryable under `/api/status`
    #[arg(long, env = "BEONYEOK_JOB_RETENTION_SECS", default_value_t = 3600)]
    pub job_retention_secs: u64,

    /// yt-dlp executable used to fetch subtitles
    #[arg(long = "yt-dlp", env = "BEONYEOK_YT_DLP", default_value = "yt-dlp")]
    pub yt_dlp: PathBuf,
}

impl ServerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channels_and_defaults() {
        let config = ServerConfig::parse_from([
            "beonyeok-server",
            "--channel",
            "UCa,UCb",
            "--store",
            "memory",
            "--provider",
            "claude",
        ]);

        assert_eq!(config.channels, vec!["UCa", "UCb"]);
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.provider, Provider::Anthropic);
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.poll_interval(), Duration::from_secs(900));
        assert_eq!(config.job_retention(), Duration::from_secs(3600));
        assert_eq!(config.yt_dlp, PathBuf::from("yt-dlp"));
    }
}
