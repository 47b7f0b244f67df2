use actix_web::{App, HttpServer, web};
use adsweep::{Config, HttpFetcher};
use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod server;

// Config is read before the runtime starts so the local UTC offset can still be queried.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?
        .block_on(serve(config))
}

async fn serve(config: Config) -> Result<()> {
    let fetcher = HttpFetcher::new(&config).context("failed to build http client")?;
    let bind = (config.host.clone(), config.port);

    tracing::info!(
        host = %bind.0,
        port = bind.1,
        origin = %config.site.origin,
        output_dir = %config.output_dir.display(),
        utc_offset = %config.utc_offset,
        "starting adsweep"
    );

    let state = web::Data::new(server::AppState::new(config, fetcher));
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(server::index)
            .service(server::healthz)
            .service(server::sweep_endpoint)
            .service(server::sweep_stream) // SSE stream
            .service(server::enrich_endpoint)
            .service(server::stop_endpoint)
    })
    .bind(bind)?
    .run()
    .await?;
    Ok(())
}
