use std::sync::{
    atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering},
    Arc, RwLock,
};

use crate::{
    control::{ModeSettings, UsageCounters},
    types::{AcMode, FanMode, RelayBits, StationStatus, StatusFlags},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub tag: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temp_c: f32,
    pub temp_f: f32,
    pub valid: bool,
}

#[derive(Debug, Default)]
struct TemperatureCell {
    temp_c: AtomicU32,
    temp_f: AtomicU32,
    valid: AtomicBool,
}

impl TemperatureCell {
    fn publish(&self, temp_c: f32, temp_f: f32) {
        self.temp_c.store(temp_c.to_bits(), Ordering::Relaxed);
        self.temp_f.store(temp_f.to_bits(), Ordering::Relaxed);
        self.valid.store(true, Ordering::Release);
    }

    fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    fn read(&self) -> Reading {
        let valid = self.valid.load(Ordering::Acquire);
        Reading {
            temp_c: f32::from_bits(self.temp_c.load(Ordering::Relaxed)),
            temp_f: f32::from_bits(self.temp_f.load(Ordering::Relaxed)),
            valid,
        }
    }
}

/// Telemetry shared between the station tasks. Every field has exactly one
/// writing task; readers never lock. `relay_bits` can only be written through
/// the [`RelayWriter`] returned by [`StationRecord::new`].
#[derive(Debug)]
pub struct StationRecord {
    local: TemperatureCell,
    external: TemperatureCell,
    relays: AtomicU8,

    fan_mode: AtomicU8,
    ac_mode: AtomicU8,
    cool_to: AtomicU8,
    heat_to: AtomicU8,
    hyst_trigger: AtomicU32,
    hyst_release: AtomicU32,

    filter_sec: AtomicU32,
    cool_sec: AtomicU32,
    heat_sec: AtomicU32,

    status: AtomicU32,
    uptime: AtomicU32,
    identity: RwLock<Identity>,
}

/// Write capability for the shared relay byte, held by the bus arbiter.
#[derive(Debug)]
pub struct RelayWriter {
    station: Arc<StationRecord>,
}

impl RelayWriter {
    pub fn commit(&self, relays: RelayBits) {
        self.station.relays.store(relays.raw(), Ordering::Release);
    }

    pub fn station(&self) -> &Arc<StationRecord> {
        &self.station
    }
}

impl StationRecord {
    pub fn new(identity: Identity) -> (Arc<Self>, RelayWriter) {
        let station = Arc::new(Self {
            local: TemperatureCell::default(),
            external: TemperatureCell::default(),
            relays: AtomicU8::new(RelayBits::ALL_OFF.raw()),
            fan_mode: AtomicU8::new(FanMode::Off.as_u8()),
            ac_mode: AtomicU8::new(AcMode::Off.as_u8()),
            cool_to: AtomicU8::new(0),
            heat_to: AtomicU8::new(0),
            hyst_trigger: AtomicU32::new(0),
            hyst_release: AtomicU32::new(0),
            filter_sec: AtomicU32::new(0),
            cool_sec: AtomicU32::new(0),
            heat_sec: AtomicU32::new(0),
            status: AtomicU32::new(0),
            uptime: AtomicU32::new(0),
            identity: RwLock::new(identity),
        });
        let writer = RelayWriter {
            station: Arc::clone(&station),
        };
        (station, writer)
    }

    pub fn publish_local(&self, temp_c: f32, temp_f: f32) {
        self.local.publish(temp_c, temp_f);
    }

    pub fn invalidate_local(&self) {
        self.local.invalidate();
    }

    pub fn local(&self) -> Reading {
        self.local.read()
    }

    pub fn publish_external(&self, temp_c: f32, temp_f: f32) {
        self.external.publish(temp_c, temp_f);
    }

    pub fn invalidate_external(&self) {
        self.external.invalidate();
    }

    pub fn external(&self) -> Reading {
        self.external.read()
    }

    /// The external reading when valid, otherwise the local one.
    pub fn effective_temperature(&self) -> Option<f32> {
        [self.external.read(), self.local.read()]
            .into_iter()
            .find(|reading| reading.valid)
            .map(|reading| reading.temp_f)
    }

    pub fn relay_bits(&self) -> RelayBits {
        RelayBits::from_raw(self.relays.load(Ordering::Acquire))
    }

    pub fn raise(&self, flags: StatusFlags) {
        self.status.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn status(&self) -> StatusFlags {
        StatusFlags::from_bits(self.status.load(Ordering::Acquire))
    }

    pub fn advance_uptime(&self) -> u32 {
        self.uptime.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    pub fn uptime(&self) -> u32 {
        self.uptime.load(Ordering::Acquire)
    }

    pub fn record_usage(&self, usage: UsageCounters) {
        self.filter_sec.store(usage.filter_sec, Ordering::Relaxed);
        self.cool_sec.store(usage.cool_sec, Ordering::Relaxed);
        self.heat_sec.store(usage.heat_sec, Ordering::Relaxed);
    }

    pub fn usage(&self) -> UsageCounters {
        UsageCounters {
            filter_sec: self.filter_sec.load(Ordering::Relaxed),
            cool_sec: self.cool_sec.load(Ordering::Relaxed),
            heat_sec: self.heat_sec.load(Ordering::Relaxed),
        }
    }

    pub fn mirror_modes(&self, modes: ModeSettings) {
        self.fan_mode.store(modes.fan_mode.as_u8(), Ordering::Relaxed);
        self.ac_mode.store(modes.ac_mode.as_u8(), Ordering::Relaxed);
        self.cool_to.store(modes.cool_target, Ordering::Relaxed);
        self.heat_to.store(modes.heat_target, Ordering::Relaxed);
        self.hyst_trigger
            .store(modes.hysteresis_trigger.to_bits(), Ordering::Relaxed);
        self.hyst_release
            .store(modes.hysteresis_release.to_bits(), Ordering::Relaxed);
    }

    pub fn fan_mode(&self) -> FanMode {
        FanMode::from_u8(self.fan_mode.load(Ordering::Relaxed))
    }

    pub fn ac_mode(&self) -> AcMode {
        AcMode::from_u8(self.ac_mode.load(Ordering::Relaxed))
    }

    pub fn cool_target(&self) -> u8 {
        self.cool_to.load(Ordering::Relaxed)
    }

    pub fn heat_target(&self) -> u8 {
        self.heat_to.load(Ordering::Relaxed)
    }

    pub fn identity(&self) -> Identity {
        match self.identity.read() {
            Ok(identity) => identity.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_identity(&self, update: impl FnOnce(&mut Identity)) {
        let mut guard = match self.identity.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        update(&mut guard);
    }

    pub fn snapshot(&self) -> StationStatus {
        let Identity { id, tag } = self.identity();
        let local = self.local();
        let external = self.external();
        let usage = self.usage();

        StationStatus {
            id,
            tag,
            version: env!("CARGO_PKG_VERSION"),
            uptime: self.uptime(),
            status: self.status().bits(),
            temp_c: local.temp_c,
            temp_f: local.temp_f,
            temp_valid: local.valid,
            ext_temp_c: external.temp_c,
            ext_temp_f: external.temp_f,
            ext_valid: external.valid,
            fan_mode: self.fan_mode().as_str(),
            ac_mode: self.ac_mode().as_str(),
            cool_to: self.cool_target(),
            heat_to: self.heat_target(),
            hyst_trigger: f32::from_bits(self.hyst_trigger.load(Ordering::Relaxed)),
            hyst_release: f32::from_bits(self.hyst_release.load(Ordering::Relaxed)),
            relays: self.relay_bits().raw(),
            filter_sec: usage.filter_sec,
            cool_sec: usage.cool_sec,
            heat_sec: usage.heat_sec,
        }
    }
}
