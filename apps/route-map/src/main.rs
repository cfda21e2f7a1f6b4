use anyhow::{Context, Result};
use clap::Parser;
use route_map::cli::{Cli, Commands, LayersArgs, OutputFormat, RoutesArgs};
use route_map::config::ClientConfig;
use route_map::fetch::HttpRouteSource;
use route_map::geometry::CollectionCatalog;
use route_map::layers;
use route_map::model::Sport;
use route_map::session::MapSession;
use route_map::store::{Action, Store};

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

/// Server catalog when reachable and non-empty, built-in otherwise.
async fn load_catalog(source: &HttpRouteSource, builtin: bool) -> CollectionCatalog {
    if builtin {
        return CollectionCatalog::builtin();
    }
    match source.fetch_collections().await {
        Ok(collections) if !collections.is_empty() => {
            CollectionCatalog::from_collections(collections)
        }
        Ok(_) => CollectionCatalog::builtin(),
        Err(err) => {
            tracing::warn!(error = %err, "collection catalog unavailable; using built-in collections");
            CollectionCatalog::builtin()
        }
    }
}

async fn print_routes(config: &ClientConfig, source: HttpRouteSource, args: RoutesArgs) -> Result<()> {
    let catalog = load_catalog(&source, args.builtin_collections).await;
    let mut store = Store::default();
    store.dispatch(Action::ReplaceFilters(args.filters()));
    if let Some(bounds) = args.bounds() {
        store.dispatch(Action::CommitBounds(bounds));
    }

    let mut session = MapSession::new(store, source, catalog);
    session.refresh().await;
    if let Some(err) = &session.store.state().query.error {
        anyhow::bail!("route query failed: {err}");
    }

    match args.format {
        OutputFormat::Features => {
            println!("{}", serde_json::to_string_pretty(&session.features())?);
        }
        OutputFormat::Summary => {
            let routes = session.routes().unwrap_or_default();
            for route in routes.iter() {
                let km = route
                    .distance_km()
                    .map_or_else(|| "-".to_string(), |km| format!("{km:.1} km"));
                let sport = route
                    .sport
                    .as_deref()
                    .and_then(|s| s.parse::<Sport>().ok())
                    .map_or_else(|| route.sport.clone().unwrap_or_default(), |s| s.label().to_string());
                let link = route.external_link().map(|l| l.url).unwrap_or_default();
                let gpx = route
                    .gpx_file_path
                    .as_deref()
                    .and_then(|path| config.gpx_path(route.sport.as_deref(), path))
                    .map(|path| path.display().to_string())
                    .unwrap_or_default();
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    route.id,
                    route.name,
                    sport,
                    km,
                    session.catalog().classify(route),
                    link,
                    gpx
                );
            }
        }
    }
    Ok(())
}

async fn print_layers(config: &ClientConfig, source: HttpRouteSource, args: LayersArgs) -> Result<()> {
    let catalog = load_catalog(&source, args.builtin_collections).await;
    let document = serde_json::json!({
        "style": config.map_style_url(),
        "sourceId": layers::ROUTE_SOURCE_ID,
        "layers": layers::route_layers(&catalog),
        "interactiveLayerIds": layers::interactive_layer_ids(),
        "legend": layers::legend(&catalog),
    });
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_base_url {
        config.api_base_url = url;
    }
    let http = reqwest::Client::builder()
        .user_agent(concat!("route-map/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;
    let source = HttpRouteSource::new(&config.api_base_url, http)?;

    match cli.command {
        Commands::Routes(args) => print_routes(&config, source, args).await,
        Commands::Layers(args) => print_layers(&config, source, args).await,
    }
}
