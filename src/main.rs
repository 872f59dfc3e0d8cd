/// Driftcast - video platform core
///
/// Backend for a video sharing platform: upload drafts and their
/// transcoding lifecycle, public feeds, reactions, comments, playlists,
/// and subscriptions, all behind an identity-forwarding gateway.
mod api;
mod catalog;
mod config;
mod context;
mod db;
mod error;
mod jobs;
mod media;
mod metrics;
mod pagination;
mod rate_limit;
mod reactions;
mod server;

use config::ServerConfig;
use context::AppContext;
use error::ApiResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ApiResult<()> {
    // Load configuration first so its log level can seed the filter
    let config = ServerConfig::from_env()?;

    // Tracing before anything that can log
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("driftcast={},tower_http=debug", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    metrics::SERVICE_START_TIME.set(chrono::Utc::now().timestamp());

    // Pool, migrations, and the managers behind every route
    let ctx = AppContext::new(config).await?;
    let ctx = Arc::new(ctx);

    // Janitor loops
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    // Serve until the process is stopped
    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ____       _  ______                    __
   / __ \_____(_)/ __/ /__________ _ _____ / /_
  / / / / ___/ // /_/ __/ ___/ __ `// ___// __/
 / /_/ / /  / // __/ /_/ /__/ /_/ /(__  )/ /_
/_____/_/  /_//_/  \__/\___/\__,_//____/ \__/

        Video platform core v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
