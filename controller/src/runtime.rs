use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, warn};

use thermostat_core::{
    BusCommand, Identity, PersistedSettings, RelayBits, RuntimeConfig, StationRecord,
};

use crate::{
    bus::{bus_channel, Arbiter, Bus},
    engine::{ActionSink, Controller, SharedController},
    http::AppState,
    input::{ButtonLines, InputTask},
    poller::{ExternalPoller, PollerSettings, TemperatureSource},
    status::StatusBoard,
    store::{SettingsStore, SettingsWriter},
    tick::TickTask,
};

pub struct Station {
    pub station: Arc<StationRecord>,
    pub controller: SharedController,
    pub board: Arc<StatusBoard>,
    pub sink: ActionSink,
    pub buttons: Arc<ButtonLines>,
    pub poller: Arc<watch::Sender<PollerSettings>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Station {
    pub async fn start<B, S>(
        runtime: &RuntimeConfig,
        mut settings: PersistedSettings,
        store: Arc<dyn SettingsStore>,
        bus: B,
        source: S,
    ) -> Self
    where
        B: Bus + 'static,
        S: TemperatureSource + 'static,
    {
        settings.sanitize();
        let config = runtime.control.clone();

        let (station, relay_writer) = StationRecord::new(Identity {
            id: settings.id.clone(),
            tag: settings.tag.clone(),
        });
        let controller = Controller::new(config.clone(), &settings);
        controller.mirror_into(&station);
        let controller = controller.shared();

        let (bus_tx, bus_rx) = bus_channel(runtime.bus_queue_depth);
        let writer = Arc::new(SettingsWriter::new(store, settings.clone()));
        let sink = ActionSink::new(bus_tx, writer);
        let board = Arc::new(StatusBoard::new(station.snapshot(), &config));

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(Arbiter::new(bus, relay_writer).run(bus_rx)));

        for command in [
            BusCommand::InitDisplay,
            BusCommand::SetRelays(RelayBits::ALL_OFF),
            BusCommand::ReadTemperature,
            BusCommand::RenderStatus,
        ] {
            if sink.bus().send(command).await.is_err() {
                warn!("bus queue closed during boot");
            }
        }

        let (buttons, button_rx) = ButtonLines::new(station.clone(), runtime.button_queue_depth);
        tasks.push(tokio::spawn(
            InputTask::new(
                buttons.clone(),
                button_rx,
                controller.clone(),
                station.clone(),
                sink.clone(),
            )
            .run(),
        ));

        let (poller_tx, poller_rx) = watch::channel(PollerSettings::from_settings(&settings));
        tasks.push(tokio::spawn(
            ExternalPoller::new(source, station.clone(), poller_rx, &config).run(),
        ));

        tasks.push(tokio::spawn(
            TickTask::new(
                &config,
                controller.clone(),
                station.clone(),
                sink.clone(),
                board.clone(),
            )
            .run(),
        ));

        info!(
            id = %settings.id,
            fan_mode = settings.fan_mode,
            ac_mode = settings.ac_mode,
            "station started"
        );

        Self {
            station,
            controller,
            board,
            sink,
            buttons,
            poller: Arc::new(poller_tx),
            tasks,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            controller: self.controller.clone(),
            station: self.station.clone(),
            board: self.board.clone(),
            sink: self.sink.clone(),
            poller: self.poller.clone(),
        }
    }

    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}
