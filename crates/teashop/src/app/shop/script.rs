use std::collections::VecDeque;

use engine::Stopwatch;

use super::beverage::{TeaKind, WaterTemperature};

/// One thing the player (or the shop door) does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlayerAction {
    EnterKitchen,
    LeaveKitchen,
    /// Snaps the first idle, undocked cup into the brewing socket.
    DockCup,
    PourWater(WaterTemperature),
    AddTea(TeaKind),
    Steep,
    AddMilk,
    AddIce,
    AddTopping(&'static str),
    /// Empties the docked cup at the sink, which also undocks it.
    EmptyAtSink,
    /// Serves the docked cup, optionally to the customer seated at `customer`.
    Serve { customer: Option<usize> },
    /// Picks the serving cup back up, cancelling its attempt.
    GrabBack,
    AnswerChoice(bool),
    /// A customer walks in and says `line`; the order is matched against the
    /// recipe book.
    CustomerArrives(&'static str),
    CloseShop,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScriptStep {
    pub(crate) at_seconds: f32,
    pub(crate) action: PlayerAction,
}

/// Timed queue of actions replayed against the session clock.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedPlayer {
    clock: Stopwatch,
    steps: VecDeque<ScriptStep>,
}

impl ScriptedPlayer {
    /// Steps are replayed in time order; ties keep their listed order.
    pub(crate) fn new(mut steps: Vec<ScriptStep>) -> Self {
        steps.sort_by(|a, b| a.at_seconds.total_cmp(&b.at_seconds));
        Self {
            clock: Stopwatch::default(),
            steps: steps.into(),
        }
    }

    pub(crate) fn elapsed_seconds(&self) -> f32 {
        self.clock.elapsed_seconds()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.steps.len()
    }

    /// Advances the clock and returns every action now due.
    pub(crate) fn due(&mut self, fixed_dt_seconds: f32) -> Vec<PlayerAction> {
        self.clock.tick(fixed_dt_seconds);
        let now = self.clock.elapsed_seconds();
        let mut due = Vec::new();
        while self.steps.front().is_some_and(|step| step.at_seconds <= now) {
            if let Some(step) = self.steps.pop_front() {
                due.push(step.action);
            }
        }
        due
    }
}

fn at(at_seconds: f32, action: PlayerAction) -> ScriptStep {
    ScriptStep { at_seconds, action }
}

/// The headless demo: a guided first order with one recovery, then a walk-in
/// customer served without guidance.
pub(crate) fn demo_script() -> Vec<ScriptStep> {
    use PlayerAction::*;

    vec![
        at(0.5, AnswerChoice(true)),
        at(1.0, EnterKitchen),
        at(1.5, DockCup),
        at(2.0, PourWater(WaterTemperature::Cold)),
        at(3.0, EmptyAtSink),
        at(3.8, DockCup),
        at(4.2, PourWater(WaterTemperature::Hot)),
        at(4.6, AddTea(TeaKind::Lavender)),
        at(5.0, Steep),
        at(5.4, Steep),
        at(5.8, Steep),
        at(6.4, Serve { customer: None }),
        at(8.0, CustomerArrives("Hi! Could I get a green tea, please?")),
        at(8.6, DockCup),
        at(9.0, PourWater(WaterTemperature::Hot)),
        at(9.4, AddTea(TeaKind::Green)),
        at(9.8, AddTopping("cinnamon")),
        at(10.2, Serve { customer: Some(1) }),
        at(11.4, EmptyAtSink),
        at(11.8, DockCup),
        at(12.2, PourWater(WaterTemperature::Hot)),
        at(12.6, AddTea(TeaKind::Green)),
        at(13.0, Steep),
        at(13.4, Serve { customer: Some(1) }),
        at(15.0, LeaveKitchen),
        at(15.5, CloseShop),
    ]
}
