pub mod config;
pub mod control;
pub mod keys;
pub mod menu;
pub mod model;
pub mod station;
pub mod types;

pub use config::{ControlConfig, PersistedSettings, RuntimeConfig, Setting, SettingError};
pub use control::{ControlEngine, EngineAction, ModeSettings, UsageCounters};
pub use keys::*;
pub use menu::{Button, InputMenu, MenuContext};
pub use model::{celsius_to_fahrenheit, fahrenheit_to_celsius, TemperatureModel};
pub use station::{Identity, Reading, RelayWriter, StationRecord};
pub use types::{AcMode, BusCommand, FanMode, Relay, RelayBits, StationStatus, StatusFlags};
