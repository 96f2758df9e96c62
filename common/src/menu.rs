use crate::{
    control::{ControlEngine, EngineAction},
    types::{AcMode, BusCommand, FanMode},
};

const FAN_CHOICES: [FanMode; 4] = [FanMode::Off, FanMode::On, FanMode::Cycle, FanMode::Timed];
const AC_CHOICES: [AcMode; 4] = [AcMode::Off, AcMode::Cool, AcMode::Heat, AcMode::Auto];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Mode,
    Up,
    Down,
}

impl Button {
    pub const COUNT: usize = 3;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Mode),
            1 => Some(Self::Up),
            2 => Some(Self::Down),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Mode => 0,
            Self::Up => 1,
            Self::Down => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuContext {
    Target,
    Fan,
    Ac,
}

impl MenuContext {
    fn next(self) -> Self {
        match self {
            Self::Target => Self::Fan,
            Self::Fan => Self::Ac,
            Self::Ac => Self::Target,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputMenu {
    context: MenuContext,
    idle_secs: u32,
    idle_counter: u32,
}

impl InputMenu {
    pub fn new(idle_secs: u32) -> Self {
        Self {
            context: MenuContext::Target,
            idle_secs,
            idle_counter: 0,
        }
    }

    pub fn context(&self) -> MenuContext {
        self.context
    }

    pub fn press(&mut self, button: Button, engine: &mut ControlEngine) -> Vec<EngineAction> {
        self.idle_counter = self.idle_secs;

        let mut actions = match (button, self.context) {
            (Button::Mode, _) => {
                self.context = self.context.next();
                Vec::new()
            }
            (step, MenuContext::Target) => {
                let up = step == Button::Up;
                if engine.ac_mode() == AcMode::Heat {
                    engine.set_heat_target(nudge(engine.heat_target(), up))
                } else {
                    engine.set_cool_target(nudge(engine.cool_target(), up))
                }
            }
            (step, MenuContext::Fan) => {
                let mode = rotate(&FAN_CHOICES, engine.fan_mode(), step == Button::Up);
                engine.set_fan_mode(mode.as_u8())
            }
            (step, MenuContext::Ac) => {
                let mode = rotate(&AC_CHOICES, engine.ac_mode(), step == Button::Up);
                engine.set_ac_mode(mode.as_u8())
            }
        };

        actions.push(EngineAction::Bus(BusCommand::RenderStatus));
        actions
    }

    /// One second of idle time. Returns true when the menu fell back to the
    /// target context and the display needs a refresh.
    pub fn tick(&mut self) -> bool {
        if self.idle_counter == 0 {
            return false;
        }
        self.idle_counter -= 1;
        if self.idle_counter == 0 && self.context != MenuContext::Target {
            self.context = MenuContext::Target;
            return true;
        }
        false
    }
}

fn nudge(target: u8, up: bool) -> u8 {
    if up {
        target.saturating_add(1)
    } else {
        target.saturating_sub(1)
    }
}

fn rotate<T: Copy + PartialEq>(choices: &[T], current: T, forward: bool) -> T {
    let len = choices.len();
    let position = choices.iter().position(|choice| *choice == current);
    let next = match (position, forward) {
        (None, _) => 0,
        (Some(index), true) => (index + 1) % len,
        (Some(index), false) => (index + len - 1) % len,
    };
    choices[next]
}
