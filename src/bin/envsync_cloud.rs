//! `envsync-cloud`: the multi-tenant cloud control plane (C8).

use envsync::cloud::{self, CloudConfig};

#[tokio::main]
async fn main() {
    let log_format = std::env::var("ENVSYNC_CLOUD_LOG_FORMAT").unwrap_or_else(|_| "pretty".into());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "envsync_cloud=info,tower_http=info".into());
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = match CloudConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("envsync-cloud: {e}");
            std::process::exit(1);
        }
    };

    if config.pat_pepper.is_none() {
        tracing::warn!("ENVSYNC_CLOUD_PAT_PEPPER is not set; personal access tokens are disabled");
    }

    let addr = config.addr;
    let db = match cloud::open_db(&config).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("envsync-cloud: {e}");
            std::process::exit(1);
        }
    };

    let state = cloud::build_state(config, db);
    let app = cloud::router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("envsync-cloud: failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "envsync-cloud listening");
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("envsync-cloud: server error: {e}");
        std::process::exit(1);
    }
}
