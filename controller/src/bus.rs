use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use thermostat_core::{
    celsius_to_fahrenheit, config::is_plausible_temp_f, BusCommand, RelayBits, RelayWriter,
    StationRecord, StationStatus, StatusFlags,
};

pub type BusSender = mpsc::Sender<BusCommand>;
pub type BusReceiver = mpsc::Receiver<BusCommand>;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("{device} did not acknowledge")]
    Nack { device: &'static str },
    #[error("{device} transaction failed: {reason}")]
    Transaction {
        device: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Status,
    Fan,
    Ac,
    Target,
    Indicator,
}

#[async_trait]
pub trait Bus: Send {
    async fn init_display(&mut self) -> Result<(), BusError>;

    async fn read_temperature(&mut self) -> Result<f32, BusError>;

    async fn write_relays(&mut self, relays: RelayBits) -> Result<(), BusError>;

    async fn render(&mut self, screen: Screen, status: &StationStatus) -> Result<(), BusError>;
}

pub fn bus_channel(depth: usize) -> (BusSender, BusReceiver) {
    mpsc::channel(depth.max(1))
}

/// Sole owner of the bus. Commands are handled one at a time, in queue order.
pub struct Arbiter<B> {
    bus: B,
    relays: RelayWriter,
    station: Arc<StationRecord>,
}

impl<B: Bus> Arbiter<B> {
    pub fn new(bus: B, relays: RelayWriter) -> Self {
        let station = Arc::clone(relays.station());
        Self {
            bus,
            relays,
            station,
        }
    }

    pub async fn run(mut self, mut commands: BusReceiver) {
        while let Some(command) = commands.recv().await {
            self.handle(command).await;
        }
        info!("bus queue closed, arbiter stopping");
    }

    pub async fn handle(&mut self, command: BusCommand) {
        match command {
            BusCommand::InitDisplay => {
                if let Err(err) = self.bus.init_display().await {
                    self.station.raise(StatusFlags::LCD_INIT);
                    warn!("display init failed: {err}");
                }
            }
            BusCommand::ReadTemperature => self.read_temperature().await,
            BusCommand::SetRelays(relays) => match self.bus.write_relays(relays).await {
                Ok(()) => self.relays.commit(relays),
                Err(err) => {
                    self.station.raise(StatusFlags::BUS_WRITE);
                    warn!("relay write {:#04x} failed: {err}", relays.raw());
                }
            },
            BusCommand::RenderStatus => self.render(Screen::Status).await,
            BusCommand::RenderFan => self.render(Screen::Fan).await,
            BusCommand::RenderAc => self.render(Screen::Ac).await,
            BusCommand::RenderTarget => self.render(Screen::Target).await,
            BusCommand::AnimateIndicator => self.render(Screen::Indicator).await,
        }
    }

    async fn read_temperature(&mut self) {
        match self.bus.read_temperature().await {
            Ok(temp_c) => {
                let temp_f = celsius_to_fahrenheit(temp_c);
                if is_plausible_temp_f(temp_f) {
                    self.station.publish_local(temp_c, temp_f);
                } else {
                    self.station.invalidate_local();
                    self.station.raise(StatusFlags::SENSOR_RANGE);
                    warn!("sensor reading {temp_f:.1}F outside sanity band");
                }
            }
            Err(err) => {
                self.station.invalidate_local();
                self.station.raise(StatusFlags::SENSOR);
                warn!("sensor read failed: {err}");
            }
        }
    }

    async fn render(&mut self, screen: Screen) {
        let status = self.station.snapshot();
        if let Err(err) = self.bus.render(screen, &status).await {
            debug!("render {screen:?} failed: {err}");
        }
    }
}
