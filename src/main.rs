use std::sync::Arc;

use anyhow::Context;

use workflow_chat::config::AppConfig;
use workflow_chat::llm::create_provider;
use workflow_chat::store::LibSqlBackend;
use workflow_chat::workflow_chat::{
    LlmFieldExtractor, SnapshotExporter, WorkflowChatManager, WorkflowChatRouteState,
    workflow_chat_routes,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("Workflow Chat v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {} ({:?})", config.llm.model, config.llm.backend);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   API: http://0.0.0.0:{}/workflowchat", config.port);
    match &config.export_dir {
        Some(dir) => eprintln!("   Snapshots: {}", dir.display()),
        None => eprintln!("   Snapshots: disabled"),
    }
    if config.api_token.is_none() {
        eprintln!("   Warning: WORKFLOW_CHAT_API_TOKEN not set, requests are not verified");
    }

    // ── Database ─────────────────────────────────────────────────────────
    let db = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );

    // ── Chat manager ─────────────────────────────────────────────────────
    let llm = create_provider(&config.llm)?;
    let extractor = Arc::new(LlmFieldExtractor::new(llm));
    let mut manager = WorkflowChatManager::new(db.clone(), db, extractor)
        .with_extractor_timeout(config.extractor_timeout);
    if let Some(dir) = &config.export_dir {
        manager = manager.with_exporter(SnapshotExporter::new(dir.clone()));
    }

    let app = workflow_chat_routes(WorkflowChatRouteState {
        manager: Arc::new(manager),
        api_token: config.api_token.clone(),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Workflow chat server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
