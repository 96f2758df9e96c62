//! Relay safety properties over arbitrary operator and sensor sequences.

use proptest::prelude::*;
use thermostat_core::{
    BusCommand, ControlConfig, ControlEngine, EngineAction, PersistedSettings, RelayBits,
    UsageCounters,
};

#[derive(Debug, Clone)]
enum Op {
    Tick(Option<f32>),
    FanMode(u8),
    AcMode(u8),
    CoolTarget(u8),
    HeatTarget(u8),
    Hysteresis(f32, f32),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        8 => proptest::option::weighted(0.9, 50.0f32..100.0f32).prop_map(Op::Tick),
        1 => any::<u8>().prop_map(Op::FanMode),
        1 => any::<u8>().prop_map(Op::AcMode),
        1 => any::<u8>().prop_map(Op::CoolTarget),
        1 => any::<u8>().prop_map(Op::HeatTarget),
        1 => (0.0f32..12.0f32, 0.0f32..12.0f32).prop_map(|(t, r)| Op::Hysteresis(t, r)),
    ]
}

fn check_relays(bits: RelayBits) -> Result<(), TestCaseError> {
    prop_assert!(
        !(bits.cool_active() && bits.heat_active()),
        "cooling and heating active together: {:#04x}",
        bits.raw()
    );
    if bits.cool_active() || bits.heat_active() {
        prop_assert!(bits.fan_active(), "appliance without airflow: {:#04x}", bits.raw());
    }
    prop_assert_eq!(
        bits.master_active(),
        bits.fan_active() || bits.cool_active() || bits.heat_active()
    );
    Ok(())
}

proptest! {
    #[test]
    fn relay_output_is_always_safe(ops in proptest::collection::vec(arb_op(), 1..=400)) {
        let mut config = ControlConfig::default();
        config.ac_period_secs = 3;
        config.ac_settle_secs = 3;
        config.cycle_on_secs = 7;
        config.cycle_off_secs = 11;
        config.timed_run_secs = 13;
        let mut engine = ControlEngine::new(config, &PersistedSettings::default());

        for op in ops {
            let actions = match op {
                Op::Tick(temp) => engine.tick(temp),
                Op::FanMode(mode) => engine.set_fan_mode(mode),
                Op::AcMode(mode) => engine.set_ac_mode(mode),
                Op::CoolTarget(temp) => engine.set_cool_target(temp),
                Op::HeatTarget(temp) => engine.set_heat_target(temp),
                Op::Hysteresis(trigger, release) => engine.set_hysteresis(trigger, release),
            };

            let writes: Vec<RelayBits> = actions
                .iter()
                .filter_map(|action| match action {
                    EngineAction::Bus(BusCommand::SetRelays(bits)) => Some(*bits),
                    _ => None,
                })
                .collect();
            prop_assert!(writes.len() <= 1, "more than one relay write per call");
            for bits in writes {
                check_relays(bits)?;
            }
            check_relays(engine.relays())?;

            prop_assert!((60..=90).contains(&engine.cool_target()));
            prop_assert!((60..=90).contains(&engine.heat_target()));
        }
    }

    #[test]
    fn accounting_never_counts_without_master(raw in any::<u8>()) {
        let mut engine = ControlEngine::new(ControlConfig::default(), &PersistedSettings::default());
        let bits = RelayBits::from_raw(raw);

        let changed = engine.accounting(bits);

        if !bits.master_active() {
            prop_assert!(!changed);
            prop_assert_eq!(engine.usage(), UsageCounters::default());
        }
    }
}
