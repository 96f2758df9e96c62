use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
};
use tracing::{info, warn};

use thermostat_core::{Button, PersistedSettings, TemperatureModel};

use crate::{
    http,
    input::ButtonLines,
    poller::HttpTemperatureSource,
    runtime::Station,
    sim::SimulatedBus,
    store::{data_dir, load_runtime_config, FileStore, SettingsStore},
};

const PRESS_HOLD: Duration = Duration::from_millis(50);

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let dir = data_dir();
    let mut runtime = load_runtime_config(&dir).await.unwrap_or_else(|err| {
        warn!("failed to load runtime config: {err:#}");
        Default::default()
    });
    if let Some(port) = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        runtime.http_port = port;
    }

    let store: Arc<dyn SettingsStore> = Arc::new(FileStore::new(&dir));
    let settings = store.load().await.unwrap_or_else(|err| {
        warn!("failed to load settings from store: {err:#}");
        PersistedSettings::default()
    });

    let source = HttpTemperatureSource::new(&runtime.control)?;
    let station = Station::start(
        &runtime,
        settings,
        store,
        SimulatedBus::new(TemperatureModel::default()),
        source,
    )
    .await;

    spawn_button_console(station.buttons.clone());

    let app = http::router(station.app_state());
    let addr = SocketAddr::from(([0, 0, 0, 0], runtime.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind station server at {addr}"))?;

    info!("station listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    station.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

fn spawn_button_console(lines: Arc<ButtonLines>) {
    tokio::spawn(async move {
        let mut input = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match input.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return,
                Err(err) => {
                    warn!("button console read failed: {err}");
                    return;
                }
            };

            for key in line.trim().chars() {
                let button = match key.to_ascii_lowercase() {
                    'm' => Button::Mode,
                    'u' => Button::Up,
                    'd' => Button::Down,
                    other => {
                        warn!("unknown button key `{other}`, use m/u/d");
                        continue;
                    }
                };
                lines.on_edge(button.index(), false);
                tokio::time::sleep(PRESS_HOLD).await;
                lines.on_edge(button.index(), true);
            }
        }
    });
}
