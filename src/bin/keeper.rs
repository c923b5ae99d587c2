//! Keeper entrypoint: load config, validate, run to completion, map fatal
//! conditions to the exit codes in §6.

use edge_keeper::app::App;
use edge_keeper::config::Config;
use edge_keeper::error::exit_code;
use tracing::error;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::default().apply_env_overrides();
    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        std::process::exit(exit_code::FATAL_STARTUP);
    }

    let app = match App::build(config).await {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "failed to open order store");
            std::process::exit(exit_code::FATAL_STARTUP);
        }
    };

    if let Err(e) = app.run().await {
        error!(error = %e, "unrecoverable runtime error");
        std::process::exit(exit_code::UNRECOVERABLE_RUNTIME);
    }
}
