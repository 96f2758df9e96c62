use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use thermostat_core::{
    ControlConfig, ControlEngine, EngineAction, InputMenu, PersistedSettings, Setting,
    StationRecord,
};

use crate::{bus::BusSender, store::SettingsWriter};

#[derive(Debug)]
pub struct Controller {
    pub engine: ControlEngine,
    pub menu: InputMenu,
}

pub type SharedController = Arc<Mutex<Controller>>;

impl Controller {
    pub fn new(config: ControlConfig, settings: &PersistedSettings) -> Self {
        let menu = InputMenu::new(config.menu_idle_secs);
        Self {
            engine: ControlEngine::new(config, settings),
            menu,
        }
    }

    pub fn shared(self) -> SharedController {
        Arc::new(Mutex::new(self))
    }

    pub fn mirror_into(&self, station: &StationRecord) {
        station.mirror_modes(self.engine.mode_settings());
        station.record_usage(self.engine.usage());
    }
}

#[derive(Clone)]
pub struct ActionSink {
    bus: BusSender,
    settings: Arc<SettingsWriter>,
}

impl ActionSink {
    pub fn new(bus: BusSender, settings: Arc<SettingsWriter>) -> Self {
        Self { bus, settings }
    }

    pub fn bus(&self) -> &BusSender {
        &self.bus
    }

    pub fn settings(&self) -> &Arc<SettingsWriter> {
        &self.settings
    }

    pub async fn execute_engine_actions(&self, actions: Vec<EngineAction>) {
        let mut persist: Vec<Setting> = Vec::new();
        for action in actions {
            match action {
                EngineAction::Bus(command) => {
                    debug!("bus command: {command:?}");
                    if self.bus.send(command).await.is_err() {
                        warn!("bus queue closed, dropped {command:?}");
                    }
                }
                EngineAction::Persist(setting) => persist.push(setting),
            }
        }

        if let Err(err) = self.settings.apply(&persist).await {
            warn!("settings persist failed: {err:#}");
        }
    }
}
