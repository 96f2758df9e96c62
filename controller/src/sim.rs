use async_trait::async_trait;
use tracing::{debug, info};

use thermostat_core::{RelayBits, StationStatus, TemperatureModel};

use crate::bus::{Bus, BusError, Screen};

const INDICATOR_FRAMES: [char; 4] = ['|', '/', '-', '\\'];

#[derive(Debug, Default)]
pub struct SimulatedBus {
    model: TemperatureModel,
    relays: RelayBits,
    frame: usize,
}

impl SimulatedBus {
    pub fn new(model: TemperatureModel) -> Self {
        Self {
            model,
            relays: RelayBits::ALL_OFF,
            frame: 0,
        }
    }
}

#[async_trait]
impl Bus for SimulatedBus {
    async fn init_display(&mut self) -> Result<(), BusError> {
        info!("simulated display ready");
        Ok(())
    }

    async fn read_temperature(&mut self) -> Result<f32, BusError> {
        Ok(self.model.sample(self.relays))
    }

    async fn write_relays(&mut self, relays: RelayBits) -> Result<(), BusError> {
        info!(
            fan = relays.fan_active(),
            cool = relays.cool_active(),
            heat = relays.heat_active(),
            master = relays.master_active(),
            "relays {:#04x}",
            relays.raw()
        );
        self.relays = relays;
        Ok(())
    }

    async fn render(&mut self, screen: Screen, status: &StationStatus) -> Result<(), BusError> {
        match screen {
            Screen::Indicator => {
                self.frame = (self.frame + 1) % INDICATOR_FRAMES.len();
            }
            Screen::Status => debug!(
                "{:.1}F {} fan {} ac {} cool {} heat {}",
                status.temp_f,
                INDICATOR_FRAMES[self.frame],
                status.fan_mode,
                status.ac_mode,
                status.cool_to,
                status.heat_to
            ),
            Screen::Fan => debug!("fan mode {}", status.fan_mode),
            Screen::Ac => debug!("ac mode {}", status.ac_mode),
            Screen::Target => debug!("cool {} heat {}", status.cool_to, status.heat_to),
        }
        Ok(())
    }
}
