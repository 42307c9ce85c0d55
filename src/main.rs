use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task;
use tracing::*;
use tracing_subscriber::FmtSubscriber;
use usb4704_south::axumstate::{AxumState, DeviceSession};
use usb4704_south::config::{ConfigCategory, default_category};
use usb4704_south::hardware::HardwarePort;
use usb4704_south::hardware::backend::sim::Usb4704Sim;
use usb4704_south::http::router;
use usb4704_south::plugin_info;
use usb4704_south::poll_task::{POLL_PERIOD, poll_device};

const LISTEN_ADDR: &str = "0.0.0.0:8000";

/// Demo host: drives one device session, polling it periodically and exposing it over http
#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        // all spans/events with a level higher than TRACE (e.g, debug, info, warn, etc.)
        // will be written to stdout.
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default tracing subscriber failed")?;

    let info = plugin_info();
    info!("{} {} plugin, version {}", info.name, info.plugin_type, info.version);

    // Configuration category from the file given on the command line, else the plugin defaults
    let category = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration category from {path}");
            let text = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            ConfigCategory::from_json(&text).with_context(|| format!("parsing {path}"))?
        }
        None => ConfigCategory::from_value(&default_category())?,
    };

    let port: Box<dyn HardwarePort + Send> = Box::new(Usb4704Sim::new());
    let session =
        DeviceSession::init_category(category, port).context("initialising device session")?;
    let state = AxumState::new(session);

    // Poll the device in the background
    let poller = task::spawn(poll_device(state.clone(), POLL_PERIOD));

    let app = router(state.clone());

    info!("Axum Router & poll task initialised");
    info!("Listening on http://{LISTEN_ADDR}");
    let listener = tokio::net::TcpListener::bind(LISTEN_ADDR).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("ctrl-c received, shutting down"),
                Err(err) => error!("unable to listen for ctrl-c, shutting down: {err}"),
            }
        })
        .await?;

    poller.abort();
    let _ = poller.await;
    match Arc::try_unwrap(state.session) {
        Ok(session) => {
            session.shutdown();
        }
        Err(_) => warn!("session still in use at exit, skipping shutdown"),
    }
    Ok(())
}
