use std::sync::Arc;

use anyhow::Result;
use beonyeok_core::{
    LlmClient, Pipeline, PipelineConfig, StoreOptions, YtDlpTranscriptSource,
    logging::init_tracing, open_store,
};
use clap::Parser;
use tracing::info;

use crate::{config::ServerConfig, poller::spawn_feed_poller, routes::router, state::AppState};

mod config;
mod error;
mod poller;
mod routes;
mod state;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing("info");

    let server = ServerConfig::parse();
    let config = PipelineConfig {
        provider: server.provider,
        model: server.model.clone(),
        ..PipelineConfig::default()
    };

    let store = open_store(StoreOptions {
        kind: server.store,
        database_url: server.database_url.clone(),
        output_dir: server.output_dir.clone(),
        timeout: config.store_timeout,
    })
    .await?;
    let transcripts = Arc::new(
        YtDlpTranscriptSource::new(
            config.transcript_languages.clone(),
            config.transcript_timeout,
        )
        .with_binary(server.yt_dlp.clone()),
    );
    let generator = Arc::new(LlmClient::from_config(&config)?);
    let pipeline = Arc::new(Pipeline::new(transcripts, generator, store, &config));

    let state = AppState::new(
        pipeline,
        server.max_concurrent_jobs,
        server.webhook_secret.clone(),
    )
    .with_job_retention(server.job_retention());

    if !server.channels.is_empty() {
        info!(
            channels = server.channels.len(),
            interval_secs = server.poll_interval().as_secs(),
            "feed poller started"
        );
        spawn_feed_poller(
            state.clone(),
            server.channels.clone(),
            server.poll_interval(),
        );
    }

    let listener = tokio::net::TcpListener::bind(server.bind).await?;
    info!(
        addr = %server.bind,
        provider = config.provider.name(),
        model = %config.model(),
        store = ?server.store,
        "listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
