//! `envsync-server`: the self-hosted HTTP remote (C9).

use envsync::server::{self, ServerConfig};

#[tokio::main]
async fn main() {
    let log_format = std::env::var("ENVSYNC_SERVER_LOG_FORMAT").unwrap_or_else(|_| "pretty".into());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "envsync_server=info,tower_http=info".into());
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("envsync-server: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server::run(config).await {
        eprintln!("envsync-server: {e}");
        std::process::exit(1);
    }
}
