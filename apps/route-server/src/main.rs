use anyhow::{Context, Result};
use clap::Parser;
use route_server::{cli, config, db, openapi, routes, state, static_assets};
use tokio::net::TcpListener;

async fn bind_listener(addr: &str) -> Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Failed to bind route-server listener on {addr}: port already in use. Stop the other service using this port or re-run with --port to choose another port.",
            );
        }
        Err(err) => {
            Err(err).with_context(|| format!("failed to bind route-server listener on {addr}"))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    if args.print_openapi {
        println!("{}", serde_json::to_string_pretty(&openapi::openapi_json())?);
        return Ok(());
    }

    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("failed to load .env: {err}");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = config::RouteServerConfig::from_env(args.static_root)?;
    let pool = db::connect_lazy(&config)?;
    let state = state::AppState {
        config: config.clone(),
        db: pool,
    };

    let site = static_assets::StaticSite::resolve(config.static_root)?;
    let app = routes::router(state).fallback_service(site.into_router());
    let addr = format!("{}:{}", args.host, args.port);
    let listener = bind_listener(&addr).await?;
    tracing::info!(%addr, "route-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
