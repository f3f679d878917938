use anyhow::Context;
use marketplace_api::{
    config::{init_tracing, load_config},
    db,
    events::{process_events, EventSender},
    external::{payment::HostedGatewayClient, shipping::CarrierHttpClient},
    handlers::AppServices,
    app_router, AppState,
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal, sync::mpsc};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("loading configuration")?;
    init_tracing(config.log_level(), config.log_json);
    info!(
        environment = %config.environment,
        "starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let db = Arc::new(
        db::establish_connection(&config)
            .await
            .context("connecting to database")?,
    );
    if config.auto_migrate {
        db::create_schema(&db).await.context("creating schema")?;
    }

    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = Arc::new(EventSender::new(event_tx));
    tokio::spawn(process_events(event_rx));

    let carrier = Arc::new(CarrierHttpClient::new(config.carrier.clone())?);
    let gateway = Arc::new(HostedGatewayClient::new(config.gateway.clone()));
    let services = AppServices::new(db.clone(), carrier, gateway, event_sender.clone());

    let config = Arc::new(config);
    let state = AppState {
        db,
        config: config.clone(),
        services,
        event_sender,
    };

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("binding {}", config.bind_addr()))?;
    info!("listening on {}", config.bind_addr());

    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sigterm) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}
