use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::*;
use crate::types::{AcMode, FanMode};

pub const MIN_TARGET_F: u8 = 60;
pub const MAX_TARGET_F: u8 = 90;
pub const MIN_VALID_TEMP_F: f32 = 60.0;
pub const MAX_VALID_TEMP_F: f32 = 90.0;
pub const MAX_HYSTERESIS_F: f32 = 10.0;

const MAX_ID_LEN: usize = 32;
const MAX_TAG_LEN: usize = 64;
const MAX_SERVER_LEN: usize = 64;

pub fn clamp_target(temp_f: u8) -> u8 {
    temp_f.clamp(MIN_TARGET_F, MAX_TARGET_F)
}

pub fn is_plausible_temp_f(temp_f: f32) -> bool {
    temp_f.is_finite() && (MIN_VALID_TEMP_F..=MAX_VALID_TEMP_F).contains(&temp_f)
}

pub fn clamp_hysteresis(delta_f: f32, fallback: f32) -> f32 {
    if delta_f.is_finite() {
        delta_f.clamp(0.0, MAX_HYSTERESIS_F)
    } else {
        fallback
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub fan_settle_secs: u32,
    pub ac_settle_secs: u32,
    pub ac_period_secs: u32,
    pub cycle_on_secs: u32,
    pub cycle_off_secs: u32,
    pub timed_run_secs: u32,
    pub sensor_read_secs: u32,
    pub counters_commit_secs: u32,
    pub menu_idle_secs: u32,
    pub ext_retry_count: u32,
    pub ext_retry_delay_ms: u64,
    pub ext_timeout_ms: u64,
    pub ext_max_response_bytes: usize,
    pub snapshot_publish_wait_ms: u64,
    pub snapshot_read_wait_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            fan_settle_secs: 5,
            ac_settle_secs: 30,
            ac_period_secs: 30,
            cycle_on_secs: 15 * 60,
            cycle_off_secs: 45 * 60,
            timed_run_secs: 60 * 60,
            sensor_read_secs: 5,
            counters_commit_secs: 60,
            menu_idle_secs: 5,
            ext_retry_count: 5,
            ext_retry_delay_ms: 5_000,
            ext_timeout_ms: 5_000,
            ext_max_response_bytes: 512,
            snapshot_publish_wait_ms: 20,
            snapshot_read_wait_ms: 100,
        }
    }
}

impl ControlConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if self.ac_period_secs == 0 {
            self.ac_period_secs = defaults.ac_period_secs;
        }
        if self.cycle_on_secs == 0 {
            self.cycle_on_secs = defaults.cycle_on_secs;
        }
        if self.cycle_off_secs == 0 {
            self.cycle_off_secs = defaults.cycle_off_secs;
        }
        if self.timed_run_secs == 0 {
            self.timed_run_secs = defaults.timed_run_secs;
        }
        if self.sensor_read_secs == 0 {
            self.sensor_read_secs = defaults.sensor_read_secs;
        }
        if self.counters_commit_secs == 0 {
            self.counters_commit_secs = defaults.counters_commit_secs;
        }
        self.fan_settle_secs = self.fan_settle_secs.max(1);
        self.ac_settle_secs = self.ac_settle_secs.max(1);
        self.ext_retry_count = self.ext_retry_count.max(1);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub control: ControlConfig,
    pub http_port: u16,
    pub bus_queue_depth: usize,
    pub button_queue_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            control: ControlConfig::default(),
            http_port: 8080,
            bus_queue_depth: 16,
            button_queue_depth: 10,
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.control.sanitize();
        self.bus_queue_depth = self.bus_queue_depth.max(1);
        self.button_queue_depth = self.button_queue_depth.max(1);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSettings {
    pub fan_mode: u8,
    pub ac_mode: u8,
    pub cool_to: u8,
    pub heat_to: u8,
    pub hyst_trigger: f32,
    pub hyst_release: f32,
    pub filter_sec: u32,
    pub cool_sec: u32,
    pub heat_sec: u32,
    pub ext_server: String,
    pub ext_read_sec: u32,
    pub id: String,
    pub tag: String,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            fan_mode: FanMode::Off.as_u8(),
            ac_mode: AcMode::Off.as_u8(),
            cool_to: 72,
            heat_to: 68,
            hyst_trigger: 1.5,
            hyst_release: 0.5,
            filter_sec: 0,
            cool_sec: 0,
            heat_sec: 0,
            ext_server: String::new(),
            ext_read_sec: 0,
            id: "Thermostat".to_string(),
            tag: "Smart Thermostat station".to_string(),
        }
    }
}

impl PersistedSettings {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        self.fan_mode = FanMode::from_u8(self.fan_mode).as_u8();
        self.ac_mode = AcMode::from_u8(self.ac_mode).as_u8();
        self.cool_to = clamp_target(self.cool_to);
        self.heat_to = clamp_target(self.heat_to);
        self.hyst_trigger = clamp_hysteresis(self.hyst_trigger, defaults.hyst_trigger);
        self.hyst_release = clamp_hysteresis(self.hyst_release, defaults.hyst_release);
        truncate_chars(&mut self.id, MAX_ID_LEN);
        truncate_chars(&mut self.tag, MAX_TAG_LEN);
        if self.ext_server.chars().count() > MAX_SERVER_LEN {
            self.ext_server.clear();
        }
    }
}

fn truncate_chars(value: &mut String, max: usize) {
    if let Some((index, _)) = value.char_indices().nth(max) {
        value.truncate(index);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    FanMode(u8),
    AcMode(u8),
    CoolTarget(u8),
    HeatTarget(u8),
    HystTrigger(f32),
    HystRelease(f32),
    FilterSeconds(u32),
    CoolSeconds(u32),
    HeatSeconds(u32),
    ExtServer(String),
    ExtReadSeconds(u32),
    Id(String),
    Tag(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("unknown setting `{0}`")]
    UnknownKey(String),
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: &'static str, value: String },
    #[error("value for `{key}` exceeds {max} characters")]
    TooLong { key: &'static str, max: usize },
}

impl Setting {
    pub fn key(&self) -> &'static str {
        match self {
            Self::FanMode(_) => KEY_FAN_MODE,
            Self::AcMode(_) => KEY_AC_MODE,
            Self::CoolTarget(_) => KEY_COOL_TO,
            Self::HeatTarget(_) => KEY_HEAT_TO,
            Self::HystTrigger(_) => KEY_HYST_TRIGGER,
            Self::HystRelease(_) => KEY_HYST_RELEASE,
            Self::FilterSeconds(_) => KEY_FILTER_SEC,
            Self::CoolSeconds(_) => KEY_COOL_SEC,
            Self::HeatSeconds(_) => KEY_HEAT_SEC,
            Self::ExtServer(_) => KEY_EXT_SERVER,
            Self::ExtReadSeconds(_) => KEY_EXT_READ_SEC,
            Self::Id(_) => KEY_ID,
            Self::Tag(_) => KEY_TAG,
        }
    }

    pub fn apply(&self, settings: &mut PersistedSettings) {
        match self {
            Self::FanMode(value) => settings.fan_mode = *value,
            Self::AcMode(value) => settings.ac_mode = *value,
            Self::CoolTarget(value) => settings.cool_to = *value,
            Self::HeatTarget(value) => settings.heat_to = *value,
            Self::HystTrigger(value) => settings.hyst_trigger = *value,
            Self::HystRelease(value) => settings.hyst_release = *value,
            Self::FilterSeconds(value) => settings.filter_sec = *value,
            Self::CoolSeconds(value) => settings.cool_sec = *value,
            Self::HeatSeconds(value) => settings.heat_sec = *value,
            Self::ExtServer(value) => settings.ext_server = value.clone(),
            Self::ExtReadSeconds(value) => settings.ext_read_sec = *value,
            Self::Id(value) => settings.id = value.clone(),
            Self::Tag(value) => settings.tag = value.clone(),
        }
    }

    /// Parses a remote `key=value` pair. Range clamping is left to the
    /// engine setters; only unparseable input is rejected here.
    pub fn parse(key: &str, raw: &str) -> Result<Self, SettingError> {
        let raw = raw.trim();
        match key {
            KEY_FAN_MODE => parse_number(KEY_FAN_MODE, raw).map(Self::FanMode),
            KEY_AC_MODE => parse_number(KEY_AC_MODE, raw).map(Self::AcMode),
            KEY_COOL_TO => parse_number(KEY_COOL_TO, raw).map(Self::CoolTarget),
            KEY_HEAT_TO => parse_number(KEY_HEAT_TO, raw).map(Self::HeatTarget),
            KEY_HYST_TRIGGER => parse_delta(KEY_HYST_TRIGGER, raw).map(Self::HystTrigger),
            KEY_HYST_RELEASE => parse_delta(KEY_HYST_RELEASE, raw).map(Self::HystRelease),
            KEY_FILTER_SEC => parse_number(KEY_FILTER_SEC, raw).map(Self::FilterSeconds),
            KEY_COOL_SEC => parse_number(KEY_COOL_SEC, raw).map(Self::CoolSeconds),
            KEY_HEAT_SEC => parse_number(KEY_HEAT_SEC, raw).map(Self::HeatSeconds),
            KEY_EXT_READ_SEC => parse_number(KEY_EXT_READ_SEC, raw).map(Self::ExtReadSeconds),
            KEY_EXT_SERVER => {
                if raw.contains(|c: char| c.is_whitespace() || c == '/') {
                    return Err(invalid(KEY_EXT_SERVER, raw));
                }
                bounded(KEY_EXT_SERVER, raw, MAX_SERVER_LEN).map(Self::ExtServer)
            }
            KEY_ID => bounded(KEY_ID, raw, MAX_ID_LEN).map(Self::Id),
            KEY_TAG => bounded(KEY_TAG, raw, MAX_TAG_LEN).map(Self::Tag),
            other => Err(SettingError::UnknownKey(other.to_string())),
        }
    }
}

fn invalid(key: &'static str, raw: &str) -> SettingError {
    SettingError::InvalidValue {
        key,
        value: raw.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, SettingError> {
    raw.parse::<T>().map_err(|_| invalid(key, raw))
}

fn parse_delta(key: &'static str, raw: &str) -> Result<f32, SettingError> {
    match raw.parse::<f32>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(invalid(key, raw)),
    }
}

fn bounded(key: &'static str, raw: &str, max: usize) -> Result<String, SettingError> {
    if raw.chars().count() > max {
        return Err(SettingError::TooLong { key, max });
    }
    Ok(raw.to_string())
}
