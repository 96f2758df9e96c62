use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FanMode {
    Off,
    On,
    Cycle,
    Timed,
    Aux,
}

impl FanMode {
    pub const LAST: u8 = 4;

    /// Values past the last mode fall back to `Off`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::On,
            2 => Self::Cycle,
            3 => Self::Timed,
            4 => Self::Aux,
            _ => Self::Off,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 1,
            Self::Cycle => 2,
            Self::Timed => 3,
            Self::Aux => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
            Self::Cycle => "CYCLE",
            Self::Timed => "TIMED",
            Self::Aux => "AUX",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AcMode {
    Off,
    Cool,
    Heat,
    Auto,
}

impl AcMode {
    pub const LAST: u8 = 3;

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Cool,
            2 => Self::Heat,
            3 => Self::Auto,
            _ => Self::Off,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Cool => 1,
            Self::Heat => 2,
            Self::Auto => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Cool => "COOL",
            Self::Heat => "HEAT",
            Self::Auto => "AUTO",
        }
    }

    pub fn cools(self) -> bool {
        matches!(self, Self::Cool | Self::Auto)
    }

    pub fn heats(self) -> bool {
        matches!(self, Self::Heat | Self::Auto)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    Fan,
    Cool,
    Heat,
    Master,
}

impl Relay {
    pub fn mask(self) -> u8 {
        match self {
            Self::Fan => 1 << 0,
            Self::Cool => 1 << 1,
            Self::Heat => 1 << 2,
            Self::Master => 1 << 3,
        }
    }
}

/// Relay driver output byte. A set bit means the line is de-energised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelayBits(u8);

impl RelayBits {
    pub const ALL_OFF: Self = Self(0xFF);

    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub fn is_active(self, relay: Relay) -> bool {
        self.0 & relay.mask() == 0
    }

    #[must_use]
    pub fn with(self, relay: Relay, active: bool) -> Self {
        if active {
            Self(self.0 & !relay.mask())
        } else {
            Self(self.0 | relay.mask())
        }
    }

    pub fn fan_active(self) -> bool {
        self.is_active(Relay::Fan)
    }

    pub fn cool_active(self) -> bool {
        self.is_active(Relay::Cool)
    }

    pub fn heat_active(self) -> bool {
        self.is_active(Relay::Heat)
    }

    pub fn master_active(self) -> bool {
        self.is_active(Relay::Master)
    }
}

impl Default for RelayBits {
    fn default() -> Self {
        Self::ALL_OFF
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusCommand {
    InitDisplay,
    ReadTemperature,
    SetRelays(RelayBits),
    RenderStatus,
    RenderFan,
    RenderAc,
    RenderTarget,
    AnimateIndicator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusFlags(u32);

impl StatusFlags {
    pub const LCD_INIT: Self = Self(0x0001);
    pub const SENSOR: Self = Self(0x0002);
    pub const EXT_GET: Self = Self(0x0004);
    pub const EXT_JSON: Self = Self(0x0008);
    pub const EXT_TEMP: Self = Self(0x0010);
    pub const BUFFER_OVERFLOW: Self = Self(0x0020);
    pub const BUS_WRITE: Self = Self(0x0040);
    pub const SENSOR_RANGE: Self = Self(0x0080);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationStatus {
    pub id: String,
    pub tag: String,
    pub version: &'static str,
    pub uptime: u32,
    pub status: u32,
    pub temp_c: f32,
    pub temp_f: f32,
    pub temp_valid: bool,
    pub ext_temp_c: f32,
    pub ext_temp_f: f32,
    pub ext_valid: bool,
    pub fan_mode: &'static str,
    pub ac_mode: &'static str,
    pub cool_to: u8,
    pub heat_to: u8,
    pub hyst_trigger: f32,
    pub hyst_release: f32,
    pub relays: u8,
    pub filter_sec: u32,
    pub cool_sec: u32,
    pub heat_sec: u32,
}
