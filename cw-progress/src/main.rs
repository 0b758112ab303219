//! cw-progress - Learning-content progress service
//!
//! Records learner interaction events from content players and keeps
//! completion state consistent across every placement of a content
//! package within a course.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cw_common::config;
use cw_progress::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "cw-progress", version, about = "Courseware progress service")]
struct Args {
    /// Root folder holding the database (overrides env/config resolution)
    #[arg(long)]
    root_folder: Option<String>,

    /// Port to listen on
    #[arg(long, default_value_t = 5831)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting Courseware Progress (cw-progress) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();

    let root_folder =
        config::resolve_root_folder(args.root_folder.as_deref(), "COURSEWARE_ROOT")?;
    let db_path = config::database_path(&root_folder)?;
    info!("Database path: {}", db_path.display());

    let pool = cw_common::db::init_database(&db_path).await?;

    let state = AppState::new(pool);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
    info!("cw-progress listening on http://127.0.0.1:{}", args.port);
    info!("Health check: http://127.0.0.1:{}/health", args.port);

    axum::serve(listener, app).await?;

    Ok(())
}
