use std::{sync::Arc, time::Duration};

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use thermostat_core::{BusCommand, ControlConfig, EngineAction, StationRecord};

use crate::{
    engine::{ActionSink, SharedController},
    status::StatusBoard,
};

const TICK_PERIOD: Duration = Duration::from_secs(1);

pub struct TickTask {
    controller: SharedController,
    station: Arc<StationRecord>,
    sink: ActionSink,
    board: Arc<StatusBoard>,
    sensor_read_secs: u32,
    counters_commit_secs: u32,
    usage_dirty: bool,
}

impl TickTask {
    pub fn new(
        config: &ControlConfig,
        controller: SharedController,
        station: Arc<StationRecord>,
        sink: ActionSink,
        board: Arc<StatusBoard>,
    ) -> Self {
        Self {
            controller,
            station,
            sink,
            board,
            sensor_read_secs: config.sensor_read_secs.max(1),
            counters_commit_secs: config.counters_commit_secs.max(1),
            usage_dirty: false,
        }
    }

    pub async fn run(mut self) {
        // Wakes are scheduled from the previous deadline, never from the end
        // of the previous step.
        let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

        loop {
            interval.tick().await;
            self.step().await;
        }
    }

    pub async fn step(&mut self) {
        let uptime = self.station.advance_uptime();
        let mut actions = Vec::new();

        if uptime % self.sensor_read_secs == 0 {
            actions.push(EngineAction::Bus(BusCommand::ReadTemperature));
            actions.push(EngineAction::Bus(BusCommand::RenderStatus));
        }

        let temp_f = self.station.effective_temperature();
        let relays = self.station.relay_bits();

        let (engine_actions, counted, menu_expired) = {
            let mut controller = self.controller.lock().await;
            let engine_actions = controller.engine.tick(temp_f);
            let counted = controller.engine.accounting(relays);
            let menu_expired = controller.menu.tick();
            controller.mirror_into(&self.station);
            (engine_actions, counted, menu_expired)
        };

        actions.extend(engine_actions);
        if menu_expired {
            actions.push(EngineAction::Bus(BusCommand::RenderStatus));
        }
        actions.push(EngineAction::Bus(BusCommand::AnimateIndicator));
        self.sink.execute_engine_actions(actions).await;

        self.usage_dirty |= counted;
        if self.usage_dirty && uptime % self.counters_commit_secs == 0 {
            // Held across the save so a remote counter reset cannot be
            // overwritten by an older total.
            let controller = self.controller.lock().await;
            let usage = controller.engine.usage();
            match self.sink.settings().apply(&usage.settings()).await {
                Ok(()) => self.usage_dirty = false,
                Err(err) => warn!("usage counter commit failed: {err:#}"),
            }
        }

        if self.board.publish(self.station.snapshot()).await.is_err() {
            debug!("status snapshot busy, skipped publish at {uptime}s");
        }
    }
}
