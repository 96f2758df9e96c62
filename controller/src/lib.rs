pub mod bus;
pub mod engine;
pub mod host;
pub mod http;
pub mod input;
pub mod poller;
pub mod runtime;
pub mod sim;
pub mod status;
pub mod store;
pub mod tick;

pub use bus::{Arbiter, Bus, BusError, Screen};
pub use engine::{ActionSink, Controller, SharedController};
pub use poller::{
    ExternalPoller, FetchError, HttpTemperatureSource, PollerSettings, TemperatureSource,
};
pub use runtime::Station;
pub use status::{SnapshotBusy, StatusBoard};
pub use store::{FileStore, MemoryStore, SettingsStore, SettingsWriter};
