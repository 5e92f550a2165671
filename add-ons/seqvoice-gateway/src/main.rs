use seqvoice_core::{
    ArtifactStore, FsArtifactStore, HttpSynthesisClient, PlaceholderSynthesis, SeqVoiceConfig,
    SynthesisBackend, SynthesisMode,
};
use seqvoice_gateway::{build_router, logging, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = match SeqVoiceConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let _log_guard = logging::init(&config.log_dir);

    if let Err(e) = run(config).await {
        tracing::error!(target: "seqvoice::gateway", error = %e, "Gateway stopped");
        std::process::exit(1);
    }
}

async fn run(config: SeqVoiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(&config.storage_dir).await?;

    let backend: Arc<dyn SynthesisBackend> = match config.synthesis.mode {
        SynthesisMode::Http => {
            let client = HttpSynthesisClient::new(&config.synthesis.base_url, &config.synthesis.endpoint)?;
            if client.check_connection().await {
                tracing::info!(target: "seqvoice::gateway", base_url = %client.base_url(), "Synthesis backend reachable");
            } else {
                tracing::warn!(
                    target: "seqvoice::gateway",
                    base_url = %client.base_url(),
                    "Synthesis backend not reachable yet; sentences will fail until it is up"
                );
            }
            Arc::new(client)
        }
        SynthesisMode::Placeholder => {
            tracing::warn!(target: "seqvoice::gateway", "Placeholder synthesis: every sentence renders as silence");
            Arc::new(PlaceholderSynthesis::default())
        }
    };
    let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(
        config.storage_dir.clone(),
        config.synthesis.defaults.media_type.extension(),
    ));

    let addr = config.listen_addr();
    tracing::info!(
        target: "seqvoice::gateway",
        addr = %addr,
        storage_dir = %config.storage_dir.display(),
        log_dir = %config.log_dir.display(),
        threshold = config.segmenter.short_fragment_threshold,
        sentence_timeout_secs = config.orchestrator.sentence_timeout_secs,
        "SeqVoice gateway starting"
    );

    let app = build_router(AppState::new(config, backend, store));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(target: "seqvoice::gateway", "Shutdown requested (Ctrl+C)");
        }
    }
    Ok(())
}
