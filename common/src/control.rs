use serde::Serialize;

use crate::{
    config::{clamp_hysteresis, clamp_target, ControlConfig, PersistedSettings, Setting},
    types::{AcMode, BusCommand, FanMode, Relay, RelayBits},
};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    Bus(BusCommand),
    Persist(Setting),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UsageCounters {
    pub filter_sec: u32,
    pub cool_sec: u32,
    pub heat_sec: u32,
}

impl UsageCounters {
    pub fn from_settings(settings: &PersistedSettings) -> Self {
        Self {
            filter_sec: settings.filter_sec,
            cool_sec: settings.cool_sec,
            heat_sec: settings.heat_sec,
        }
    }

    pub fn settings(&self) -> [Setting; 3] {
        [
            Setting::FilterSeconds(self.filter_sec),
            Setting::CoolSeconds(self.cool_sec),
            Setting::HeatSeconds(self.heat_sec),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeSettings {
    pub fan_mode: FanMode,
    pub ac_mode: AcMode,
    pub cool_target: u8,
    pub heat_target: u8,
    pub hysteresis_trigger: f32,
    pub hysteresis_release: f32,
}

#[derive(Debug, Clone)]
pub struct ControlEngine {
    pub config: ControlConfig,

    fan_mode: FanMode,
    fan_counter: u32,
    fan_demand: bool,
    timed_running: bool,

    ac_mode: AcMode,
    ac_counter: u32,
    cool_demand: bool,
    heat_demand: bool,

    cool_target: u8,
    heat_target: u8,
    hysteresis_trigger: f32,
    hysteresis_release: f32,

    // Last relay byte handed to the bus.
    relays: RelayBits,
    usage: UsageCounters,
}

impl ControlEngine {
    pub fn new(mut config: ControlConfig, settings: &PersistedSettings) -> Self {
        config.sanitize();
        let mut settings = settings.clone();
        settings.sanitize();

        Self {
            fan_mode: FanMode::from_u8(settings.fan_mode),
            fan_counter: config.fan_settle_secs,
            fan_demand: false,
            timed_running: false,
            ac_mode: AcMode::from_u8(settings.ac_mode),
            ac_counter: config.ac_settle_secs,
            cool_demand: false,
            heat_demand: false,
            cool_target: settings.cool_to,
            heat_target: settings.heat_to,
            hysteresis_trigger: settings.hyst_trigger,
            hysteresis_release: settings.hyst_release,
            relays: RelayBits::ALL_OFF,
            usage: UsageCounters::from_settings(&settings),
            config,
        }
    }

    pub fn fan_mode(&self) -> FanMode {
        self.fan_mode
    }

    pub fn ac_mode(&self) -> AcMode {
        self.ac_mode
    }

    pub fn cool_target(&self) -> u8 {
        self.cool_target
    }

    pub fn heat_target(&self) -> u8 {
        self.heat_target
    }

    pub fn hysteresis(&self) -> (f32, f32) {
        (self.hysteresis_trigger, self.hysteresis_release)
    }

    pub fn fan_counter(&self) -> u32 {
        self.fan_counter
    }

    pub fn ac_counter(&self) -> u32 {
        self.ac_counter
    }

    pub fn relays(&self) -> RelayBits {
        self.relays
    }

    pub fn usage(&self) -> UsageCounters {
        self.usage
    }

    pub fn mode_settings(&self) -> ModeSettings {
        ModeSettings {
            fan_mode: self.fan_mode,
            ac_mode: self.ac_mode,
            cool_target: self.cool_target,
            heat_target: self.heat_target,
            hysteresis_trigger: self.hysteresis_trigger,
            hysteresis_release: self.hysteresis_release,
        }
    }

    /// Advances both state machines by one second. `temp_f` is the effective
    /// temperature, `None` while no source is valid.
    pub fn tick(&mut self, temp_f: Option<f32>) -> Vec<EngineAction> {
        let mut actions = Vec::new();

        self.step_fan(&mut actions);
        self.step_ac(temp_f);

        let relays = self.apply_interlocks();
        if relays != self.relays {
            self.relays = relays;
            actions.push(EngineAction::Bus(BusCommand::SetRelays(relays)));
        }

        actions
    }

    pub fn set_fan_mode(&mut self, mode: u8) -> Vec<EngineAction> {
        let mode = FanMode::from_u8(mode);
        self.fan_mode = mode;
        self.timed_running = false;
        self.fan_counter = self.config.fan_settle_secs;

        vec![
            EngineAction::Persist(Setting::FanMode(mode.as_u8())),
            EngineAction::Bus(BusCommand::RenderFan),
        ]
    }

    pub fn set_ac_mode(&mut self, mode: u8) -> Vec<EngineAction> {
        let mode = AcMode::from_u8(mode);
        self.ac_mode = mode;
        self.ac_counter = self.config.ac_settle_secs;

        vec![
            EngineAction::Persist(Setting::AcMode(mode.as_u8())),
            EngineAction::Bus(BusCommand::RenderAc),
        ]
    }

    pub fn set_cool_target(&mut self, temp_f: u8) -> Vec<EngineAction> {
        self.cool_target = clamp_target(temp_f);
        self.ac_counter = self.config.ac_period_secs;

        vec![
            EngineAction::Persist(Setting::CoolTarget(self.cool_target)),
            EngineAction::Bus(BusCommand::RenderTarget),
        ]
    }

    pub fn set_heat_target(&mut self, temp_f: u8) -> Vec<EngineAction> {
        self.heat_target = clamp_target(temp_f);
        self.ac_counter = self.config.ac_period_secs;

        vec![
            EngineAction::Persist(Setting::HeatTarget(self.heat_target)),
            EngineAction::Bus(BusCommand::RenderTarget),
        ]
    }

    pub fn set_hysteresis(&mut self, trigger_f: f32, release_f: f32) -> Vec<EngineAction> {
        self.hysteresis_trigger = clamp_hysteresis(trigger_f, self.hysteresis_trigger);
        self.hysteresis_release = clamp_hysteresis(release_f, self.hysteresis_release);
        self.ac_counter = self.config.ac_period_secs;

        vec![
            EngineAction::Persist(Setting::HystTrigger(self.hysteresis_trigger)),
            EngineAction::Persist(Setting::HystRelease(self.hysteresis_release)),
        ]
    }

    pub fn set_usage(&mut self, usage: UsageCounters) {
        self.usage = usage;
    }

    /// Counts one second of run time for every active output, but only while
    /// the master relay actually powers the appliances. Returns whether any
    /// counter moved.
    pub fn accounting(&mut self, relays: RelayBits) -> bool {
        if !relays.master_active() {
            return false;
        }

        let mut changed = false;
        if relays.fan_active() {
            self.usage.filter_sec = self.usage.filter_sec.saturating_add(1);
            changed = true;
        }
        if relays.cool_active() {
            self.usage.cool_sec = self.usage.cool_sec.saturating_add(1);
            changed = true;
        }
        if relays.heat_active() {
            self.usage.heat_sec = self.usage.heat_sec.saturating_add(1);
            changed = true;
        }
        changed
    }

    fn step_fan(&mut self, actions: &mut Vec<EngineAction>) {
        if self.fan_counter == 0 {
            return;
        }
        self.fan_counter -= 1;
        if self.fan_counter > 0 {
            return;
        }

        match self.fan_mode {
            FanMode::Off | FanMode::Aux => {
                self.fan_demand = false;
            }
            FanMode::On => {
                self.fan_demand = true;
            }
            FanMode::Cycle => {
                if self.fan_demand {
                    self.fan_demand = false;
                    self.fan_counter = self.config.cycle_off_secs;
                } else {
                    self.fan_demand = true;
                    self.fan_counter = self.config.cycle_on_secs;
                }
            }
            FanMode::Timed => {
                if self.timed_running {
                    self.fan_demand = false;
                    self.timed_running = false;
                    self.fan_mode = FanMode::Off;
                    actions.push(EngineAction::Persist(Setting::FanMode(
                        FanMode::Off.as_u8(),
                    )));
                    actions.push(EngineAction::Bus(BusCommand::RenderFan));
                } else {
                    self.fan_demand = true;
                    self.timed_running = true;
                    self.fan_counter = self.config.timed_run_secs;
                }
            }
        }
    }

    // A zero counter means an evaluation is due but waits for a valid
    // reading. Outputs the mode no longer allows are dropped without one.
    fn step_ac(&mut self, temp_f: Option<f32>) {
        if self.ac_counter > 0 {
            self.ac_counter -= 1;
            if self.ac_counter > 0 {
                return;
            }
        }

        if !self.ac_mode.cools() {
            self.cool_demand = false;
        }
        if !self.ac_mode.heats() {
            self.heat_demand = false;
        }

        let Some(temp_f) = temp_f else {
            return;
        };
        if self.ac_mode.cools() {
            self.evaluate_cooling(temp_f);
        }
        if self.ac_mode.heats() {
            self.evaluate_heating(temp_f);
        }

        self.ac_counter = self.config.ac_period_secs;
    }

    fn evaluate_cooling(&mut self, temp_f: f32) {
        let target = f32::from(self.cool_target);
        if !self.cool_demand && temp_f > target + self.hysteresis_trigger {
            self.cool_demand = true;
        } else if self.cool_demand && temp_f < target - self.hysteresis_release {
            self.cool_demand = false;
        }
    }

    fn evaluate_heating(&mut self, temp_f: f32) {
        let target = f32::from(self.heat_target);
        if !self.heat_demand && temp_f < target - self.hysteresis_trigger {
            self.heat_demand = true;
        } else if self.heat_demand && temp_f > target + self.hysteresis_release {
            self.heat_demand = false;
        }
    }

    fn apply_interlocks(&mut self) -> RelayBits {
        // Cooling and heating never run together.
        if self.cool_demand && self.heat_demand {
            self.cool_demand = false;
            self.heat_demand = false;
        }

        let appliance = self.cool_demand || self.heat_demand;
        let fan = self.fan_demand || appliance;

        RelayBits::ALL_OFF
            .with(Relay::Fan, fan)
            .with(Relay::Cool, self.cool_demand)
            .with(Relay::Heat, self.heat_demand)
            .with(Relay::Master, fan || appliance)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn engine_with(settings: PersistedSettings) -> ControlEngine {
        ControlEngine::new(ControlConfig::default(), &settings)
    }

    fn cooling_engine() -> ControlEngine {
        engine_with(PersistedSettings {
            ac_mode: AcMode::Cool.as_u8(),
            cool_to: 72,
            hyst_trigger: 1.5,
            hyst_release: 0.5,
            ..PersistedSettings::default()
        })
    }

    fn run(engine: &mut ControlEngine, ticks: u32, temp_f: Option<f32>) -> Vec<EngineAction> {
        let mut actions = Vec::new();
        for _ in 0..ticks {
            actions.extend(engine.tick(temp_f));
        }
        actions
    }

    fn relay_writes(actions: &[EngineAction]) -> Vec<RelayBits> {
        actions
            .iter()
            .filter_map(|action| match action {
                EngineAction::Bus(BusCommand::SetRelays(bits)) => Some(*bits),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn fan_on_applies_after_settle_delay() {
        let mut engine = engine_with(PersistedSettings::default());
        let actions = engine.set_fan_mode(FanMode::On.as_u8());
        assert_eq!(
            actions,
            vec![
                EngineAction::Persist(Setting::FanMode(1)),
                EngineAction::Bus(BusCommand::RenderFan),
            ]
        );

        assert!(relay_writes(&run(&mut engine, 4, None)).is_empty());

        let writes = relay_writes(&engine.tick(None));
        assert_eq!(writes.len(), 1);
        assert!(writes[0].fan_active());
        assert!(writes[0].master_active());
        assert!(!writes[0].cool_active());
    }

    #[test]
    fn out_of_range_fan_mode_is_off() {
        let mut engine = engine_with(PersistedSettings::default());
        engine.set_fan_mode(1);
        run(&mut engine, 5, None);
        assert!(engine.relays().fan_active());

        let actions = engine.set_fan_mode(17);
        assert_eq!(engine.fan_mode(), FanMode::Off);
        assert_eq!(actions[0], EngineAction::Persist(Setting::FanMode(0)));

        run(&mut engine, 5, None);
        assert_eq!(engine.relays(), RelayBits::ALL_OFF);
    }

    #[test]
    fn quiescent_tick_emits_nothing() {
        let mut engine = cooling_engine();
        run(&mut engine, 30, Some(74.0));
        assert!(engine.relays().cool_active());

        for _ in 0..29 {
            assert!(engine.tick(Some(74.0)).is_empty());
        }
        // Re-evaluation without a threshold crossing is also silent.
        assert!(engine.tick(Some(74.0)).is_empty());
    }

    #[test]
    fn cycle_mode_runs_fifteen_on_forty_five_off() {
        let mut engine = engine_with(PersistedSettings::default());
        engine.set_fan_mode(FanMode::Cycle.as_u8());
        run(&mut engine, 5, None);
        assert!(engine.relays().fan_active());

        for _ in 0..2 {
            assert!(relay_writes(&run(&mut engine, 899, None)).is_empty());
            let off = relay_writes(&engine.tick(None));
            assert_eq!(off, vec![RelayBits::ALL_OFF]);

            assert!(relay_writes(&run(&mut engine, 2_699, None)).is_empty());
            let on = relay_writes(&engine.tick(None));
            assert_eq!(on.len(), 1);
            assert!(on[0].fan_active());
        }
    }

    #[test]
    fn timed_mode_runs_once_then_reverts_to_off() {
        let mut config = ControlConfig::default();
        config.timed_run_secs = 120;
        let mut engine = ControlEngine::new(config, &PersistedSettings::default());

        engine.set_fan_mode(FanMode::Timed.as_u8());
        run(&mut engine, 5, None);
        assert!(engine.relays().fan_active());

        run(&mut engine, 119, None);
        assert!(engine.relays().fan_active());

        let actions = engine.tick(None);
        assert!(actions.contains(&EngineAction::Persist(Setting::FanMode(0))));
        assert!(actions.contains(&EngineAction::Bus(BusCommand::RenderFan)));
        assert_eq!(engine.fan_mode(), FanMode::Off);
        assert_eq!(engine.relays(), RelayBits::ALL_OFF);
    }

    #[test]
    fn aux_fan_mode_keeps_fan_off() {
        let mut engine = engine_with(PersistedSettings::default());
        engine.set_fan_mode(FanMode::Aux.as_u8());
        run(&mut engine, 10, None);

        assert_eq!(engine.relays(), RelayBits::ALL_OFF);
    }

    #[test]
    fn cooling_hysteresis_band() {
        let mut engine = cooling_engine();

        run(&mut engine, 30, Some(74.0));
        let relays = engine.relays();
        assert!(relays.cool_active());
        assert!(relays.fan_active());
        assert!(relays.master_active());

        run(&mut engine, 30, Some(72.3));
        assert!(engine.relays().cool_active());

        run(&mut engine, 30, Some(71.6));
        assert!(engine.relays().cool_active());

        run(&mut engine, 30, Some(71.4));
        assert_eq!(engine.relays(), RelayBits::ALL_OFF);
    }

    #[test]
    fn cooling_stays_off_inside_band() {
        let mut engine = cooling_engine();

        for temp in [71.6, 72.0, 73.0, 73.5] {
            assert!(relay_writes(&run(&mut engine, 30, Some(temp))).is_empty());
        }
        assert!(!engine.relays().cool_active());
    }

    #[test]
    fn heating_mirrors_cooling() {
        let mut engine = engine_with(PersistedSettings {
            ac_mode: AcMode::Heat.as_u8(),
            heat_to: 68,
            hyst_trigger: 1.5,
            hyst_release: 0.5,
            ..PersistedSettings::default()
        });

        run(&mut engine, 30, Some(67.0));
        assert!(!engine.relays().heat_active());

        run(&mut engine, 30, Some(66.4));
        assert!(engine.relays().heat_active());
        assert!(engine.relays().fan_active());

        run(&mut engine, 30, Some(68.4));
        assert!(engine.relays().heat_active());

        run(&mut engine, 30, Some(68.6));
        assert!(!engine.relays().heat_active());
    }

    #[test]
    fn invalid_temperature_suspends_ac_control() {
        let mut engine = cooling_engine();

        run(&mut engine, 29, Some(74.0));
        run(&mut engine, 100, None);
        assert_eq!(engine.ac_counter(), 0);
        assert!(!engine.relays().cool_active());

        engine.tick(Some(74.0));
        assert!(engine.relays().cool_active());
        assert_eq!(engine.ac_counter(), 30);
    }

    #[test]
    fn ac_off_applies_without_a_valid_reading() {
        let mut engine = cooling_engine();
        run(&mut engine, 30, Some(80.0));
        assert!(engine.relays().cool_active());

        engine.set_ac_mode(AcMode::Off.as_u8());
        run(&mut engine, 29, None);
        assert!(engine.relays().cool_active());

        let writes = relay_writes(&engine.tick(None));
        assert_eq!(writes.len(), 1);
        assert!(!engine.relays().cool_active());
        assert!(!engine.relays().master_active());
    }

    #[test]
    fn invalid_reading_holds_a_running_appliance() {
        let mut engine = cooling_engine();
        run(&mut engine, 30, Some(80.0));

        run(&mut engine, 120, None);
        assert!(engine.relays().cool_active());
    }

    #[test]
    fn ac_off_forces_appliances_off() {
        let mut engine = cooling_engine();
        run(&mut engine, 30, Some(80.0));
        assert!(engine.relays().cool_active());

        let actions = engine.set_ac_mode(AcMode::Off.as_u8());
        assert_eq!(
            actions,
            vec![
                EngineAction::Persist(Setting::AcMode(0)),
                EngineAction::Bus(BusCommand::RenderAc),
            ]
        );

        run(&mut engine, 29, Some(80.0));
        assert!(engine.relays().cool_active());
        engine.tick(Some(80.0));
        assert_eq!(engine.relays(), RelayBits::ALL_OFF);
    }

    #[test]
    fn overlapping_auto_bands_turn_everything_off() {
        let mut engine = engine_with(PersistedSettings {
            ac_mode: AcMode::Auto.as_u8(),
            cool_to: 60,
            heat_to: 90,
            ..PersistedSettings::default()
        });

        let writes = relay_writes(&run(&mut engine, 30, Some(75.0)));

        assert!(writes.is_empty());
        assert_eq!(engine.relays(), RelayBits::ALL_OFF);
    }

    #[test]
    fn auto_mode_picks_the_needed_appliance() {
        let mut engine = engine_with(PersistedSettings {
            ac_mode: AcMode::Auto.as_u8(),
            cool_to: 76,
            heat_to: 66,
            ..PersistedSettings::default()
        });

        run(&mut engine, 30, Some(80.0));
        assert!(engine.relays().cool_active());
        assert!(!engine.relays().heat_active());

        run(&mut engine, 30, Some(62.0));
        assert!(!engine.relays().cool_active());
        assert!(engine.relays().heat_active());
    }

    #[test]
    fn forced_fan_drops_with_the_appliance() {
        let mut engine = cooling_engine();
        run(&mut engine, 30, Some(74.0));
        assert!(engine.relays().cool_active());

        run(&mut engine, 30, Some(70.0));
        assert_eq!(engine.relays(), RelayBits::ALL_OFF);
    }

    #[test]
    fn fan_demand_survives_appliance_shutdown() {
        let mut engine = cooling_engine();
        engine.set_fan_mode(FanMode::On.as_u8());
        run(&mut engine, 30, Some(74.0));
        assert!(engine.relays().cool_active());

        run(&mut engine, 30, Some(70.0));
        let relays = engine.relays();
        assert!(!relays.cool_active());
        assert!(relays.fan_active());
        assert!(relays.master_active());
    }

    #[test]
    fn targets_are_clamped_and_rearm_evaluation() {
        let mut engine = cooling_engine();
        run(&mut engine, 12, Some(72.0));

        let actions = engine.set_cool_target(200);
        assert_eq!(engine.cool_target(), 90);
        assert_eq!(engine.ac_counter(), 30);
        assert_eq!(
            actions,
            vec![
                EngineAction::Persist(Setting::CoolTarget(90)),
                EngineAction::Bus(BusCommand::RenderTarget),
            ]
        );

        engine.set_heat_target(3);
        assert_eq!(engine.heat_target(), 60);
    }

    #[test]
    fn hysteresis_setter_clamps_and_persists() {
        let mut engine = cooling_engine();

        let actions = engine.set_hysteresis(f32::INFINITY, 42.0);

        assert_eq!(engine.hysteresis(), (1.5, 10.0));
        assert_eq!(
            actions,
            vec![
                EngineAction::Persist(Setting::HystTrigger(1.5)),
                EngineAction::Persist(Setting::HystRelease(10.0)),
            ]
        );
    }

    #[test]
    fn accounting_requires_master() {
        let mut engine = engine_with(PersistedSettings::default());
        let without_master = RelayBits::ALL_OFF
            .with(Relay::Fan, true)
            .with(Relay::Cool, true)
            .with(Relay::Heat, true);

        assert!(!engine.accounting(without_master));
        assert_eq!(engine.usage(), UsageCounters::default());

        let cooling = RelayBits::ALL_OFF
            .with(Relay::Fan, true)
            .with(Relay::Cool, true)
            .with(Relay::Master, true);
        assert!(engine.accounting(cooling));
        assert!(engine.accounting(cooling));

        assert_eq!(
            engine.usage(),
            UsageCounters {
                filter_sec: 2,
                cool_sec: 2,
                heat_sec: 0,
            }
        );

        assert!(!engine.accounting(RelayBits::ALL_OFF.with(Relay::Master, true)));
    }

    #[test]
    fn restores_modes_and_counters_from_settings() {
        let engine = engine_with(PersistedSettings {
            fan_mode: 2,
            ac_mode: 9,
            cool_to: 99,
            filter_sec: 1_000,
            ..PersistedSettings::default()
        });

        assert_eq!(engine.fan_mode(), FanMode::Cycle);
        assert_eq!(engine.ac_mode(), AcMode::Off);
        assert_eq!(engine.cool_target(), 90);
        assert_eq!(engine.usage().filter_sec, 1_000);
        assert_eq!(engine.fan_counter(), 5);
        assert_eq!(engine.ac_counter(), 30);
        assert_eq!(engine.relays(), RelayBits::ALL_OFF);
    }
}
