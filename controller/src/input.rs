use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use thermostat_core::{Button, StationRecord, StatusFlags};

use crate::engine::{ActionSink, SharedController};

/// Interrupt side of the button hand-off. Lines are active low: a recorded
/// level of `false` means the button is held down.
#[derive(Debug)]
pub struct ButtonLines {
    levels: [AtomicBool; Button::COUNT],
    events: mpsc::Sender<usize>,
    station: Arc<StationRecord>,
}

impl ButtonLines {
    pub fn new(station: Arc<StationRecord>, depth: usize) -> (Arc<Self>, mpsc::Receiver<usize>) {
        let (events, rx) = mpsc::channel(depth.max(1));
        let lines = Arc::new(Self {
            levels: [
                AtomicBool::new(true),
                AtomicBool::new(true),
                AtomicBool::new(true),
            ],
            events,
            station,
        });
        (lines, rx)
    }

    /// Records the line level and posts its index. Never blocks; a full queue
    /// drops the event.
    pub fn on_edge(&self, index: usize, level: bool) {
        let Some(line) = self.levels.get(index) else {
            return;
        };
        line.store(level, Ordering::Release);

        match self.events.try_send(index) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.station.raise(StatusFlags::BUFFER_OVERFLOW);
                warn!("button queue full, dropped edge on line {index}");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    pub fn is_pressed(&self, index: usize) -> bool {
        self.levels
            .get(index)
            .is_some_and(|line| !line.load(Ordering::Acquire))
    }
}

pub struct InputTask {
    lines: Arc<ButtonLines>,
    events: mpsc::Receiver<usize>,
    controller: SharedController,
    station: Arc<StationRecord>,
    sink: ActionSink,
}

impl InputTask {
    pub fn new(
        lines: Arc<ButtonLines>,
        events: mpsc::Receiver<usize>,
        controller: SharedController,
        station: Arc<StationRecord>,
        sink: ActionSink,
    ) -> Self {
        Self {
            lines,
            events,
            controller,
            station,
            sink,
        }
    }

    pub async fn run(mut self) {
        while let Some(index) = self.events.recv().await {
            self.handle(index).await;
        }
    }

    async fn handle(&mut self, index: usize) {
        // Only the press edge counts; releases and bounces that end high are
        // ignored.
        if !self.lines.is_pressed(index) {
            return;
        }
        let Some(button) = Button::from_index(index) else {
            return;
        };
        debug!("button {button:?} pressed");

        let actions = {
            let mut guard = self.controller.lock().await;
            let controller = &mut *guard;
            let actions = controller.menu.press(button, &mut controller.engine);
            controller.mirror_into(&self.station);
            actions
        };
        self.sink.execute_engine_actions(actions).await;
    }
}
