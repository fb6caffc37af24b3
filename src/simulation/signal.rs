//! Signal phasing for the intersection
//!
//! The automatic cycle is a fixed transition table: every [`CycleState`]
//! names the approach it serves, the color that approach shows, and the
//! state that follows it. Durations come from [`SimConfig`].

use log::debug;

use super::config::SimConfig;
use super::types::{ApproachId, SignalPhase};

/// The signal shown to one approach
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub approach: ApproachId,
    pub phase: SignalPhase,
    /// Time left in the current phase; zero when the phase has no scheduled end
    pub remaining_ms: f64,
}

impl Signal {
    fn red(approach: ApproachId) -> Self {
        Self {
            approach,
            phase: SignalPhase::Red,
            remaining_ms: 0.0,
        }
    }
}

/// States of the automatic signal cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleState {
    NorthGreen,
    NorthYellow,
    EastGreen,
    EastYellow,
    SouthGreen,
    SouthYellow,
    WestGreen,
    WestYellow,
}

/// One row of the cycle table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStep {
    pub state: CycleState,
    pub approach: ApproachId,
    pub phase: SignalPhase,
    pub next: CycleState,
}

const CYCLE: [CycleStep; 8] = [
    CycleStep {
        state: CycleState::NorthGreen,
        approach: ApproachId::North,
        phase: SignalPhase::Green,
        next: CycleState::NorthYellow,
    },
    CycleStep {
        state: CycleState::NorthYellow,
        approach: ApproachId::North,
        phase: SignalPhase::Yellow,
        next: CycleState::EastGreen,
    },
    CycleStep {
        state: CycleState::EastGreen,
        approach: ApproachId::East,
        phase: SignalPhase::Green,
        next: CycleState::EastYellow,
    },
    CycleStep {
        state: CycleState::EastYellow,
        approach: ApproachId::East,
        phase: SignalPhase::Yellow,
        next: CycleState::SouthGreen,
    },
    CycleStep {
        state: CycleState::SouthGreen,
        approach: ApproachId::South,
        phase: SignalPhase::Green,
        next: CycleState::SouthYellow,
    },
    CycleStep {
        state: CycleState::SouthYellow,
        approach: ApproachId::South,
        phase: SignalPhase::Yellow,
        next: CycleState::WestGreen,
    },
    CycleStep {
        state: CycleState::WestGreen,
        approach: ApproachId::West,
        phase: SignalPhase::Green,
        next: CycleState::WestYellow,
    },
    CycleStep {
        state: CycleState::WestYellow,
        approach: ApproachId::West,
        phase: SignalPhase::Yellow,
        next: CycleState::NorthGreen,
    },
];

impl CycleState {
    pub fn step(self) -> &'static CycleStep {
        let index = match self {
            CycleState::NorthGreen => 0,
            CycleState::NorthYellow => 1,
            CycleState::EastGreen => 2,
            CycleState::EastYellow => 3,
            CycleState::SouthGreen => 4,
            CycleState::SouthYellow => 5,
            CycleState::WestGreen => 6,
            CycleState::WestYellow => 7,
        };
        &CYCLE[index]
    }

    pub fn next(self) -> CycleState {
        self.step().next
    }

    pub fn approach(self) -> ApproachId {
        self.step().approach
    }

    pub fn phase(self) -> SignalPhase {
        self.step().phase
    }
}

/// Drives the four signals, either from the automatic cycle or by manual override
#[derive(Debug, Clone)]
pub struct SignalController {
    signals: [Signal; 4],
    state: CycleState,
    /// Time left before the next automatic transition
    timer_ms: f64,
    auto_mode: bool,
    green_duration_ms: f64,
    yellow_duration_ms: f64,
}

impl SignalController {
    /// Create a controller in `NorthGreen` with auto mode enabled
    pub fn new(config: &SimConfig) -> Self {
        let mut controller = Self {
            signals: ApproachId::ALL.map(Signal::red),
            state: CycleState::NorthGreen,
            timer_ms: 0.0,
            auto_mode: true,
            green_duration_ms: config.green_duration_ms,
            yellow_duration_ms: config.yellow_duration_ms,
        };
        controller.enter(CycleState::NorthGreen);
        controller
    }

    fn duration_of(&self, phase: SignalPhase) -> f64 {
        match phase {
            SignalPhase::Green => self.green_duration_ms,
            SignalPhase::Yellow => self.yellow_duration_ms,
            SignalPhase::Red => 0.0,
        }
    }

    /// Apply the signal assignment of `state` and restart the phase timer
    fn enter(&mut self, state: CycleState) {
        let step = state.step();
        let duration = self.duration_of(step.phase);
        for signal in &mut self.signals {
            *signal = Signal::red(signal.approach);
        }
        let active = &mut self.signals[step.approach.index()];
        active.phase = step.phase;
        active.remaining_ms = duration;
        self.state = state;
        self.timer_ms = duration;
    }

    /// Advance timers by `delta_ms`.
    ///
    /// While `preempted` only the per-signal countdowns move; otherwise an
    /// expired phase timer in auto mode moves the cycle one step. Returns
    /// the state entered, if a transition happened.
    pub fn update(&mut self, delta_ms: f64, preempted: bool) -> Option<CycleState> {
        for signal in &mut self.signals {
            signal.remaining_ms = (signal.remaining_ms - delta_ms).max(0.0);
        }

        if preempted || !self.auto_mode {
            return None;
        }

        self.timer_ms -= delta_ms;
        if self.timer_ms > 0.0 {
            return None;
        }

        let next = self.state.next();
        debug!("Signal cycle {:?} -> {:?}", self.state, next);
        self.enter(next);
        Some(next)
    }

    /// Flip auto mode. Re-enabling restarts the cycle at `NorthGreen`.
    pub fn toggle_auto_mode(&mut self) -> bool {
        self.set_auto_mode(!self.auto_mode);
        self.auto_mode
    }

    pub fn set_auto_mode(&mut self, enabled: bool) {
        if enabled && !self.auto_mode {
            self.enter(CycleState::NorthGreen);
        }
        self.auto_mode = enabled;
    }

    /// Show `phase` on every approach with no scheduled end
    pub fn set_all(&mut self, phase: SignalPhase) {
        for signal in &mut self.signals {
            signal.phase = phase;
            signal.remaining_ms = 0.0;
        }
    }

    /// Clear a path for `approach`: it and its opposing approach go GREEN, the rest RED
    pub fn apply_preemption(&mut self, approach: ApproachId, hold_ms: f64) {
        let opposing = approach.opposing();
        for signal in &mut self.signals {
            if signal.approach == approach || signal.approach == opposing {
                signal.phase = SignalPhase::Green;
                signal.remaining_ms = hold_ms;
            } else {
                *signal = Signal::red(signal.approach);
            }
        }
    }

    /// Hand control back to the cycle through a North yellow phase
    pub fn resume_after_preemption(&mut self) {
        self.auto_mode = true;
        self.enter(CycleState::NorthYellow);
    }

    pub fn phase_of(&self, approach: ApproachId) -> SignalPhase {
        self.signals[approach.index()].phase
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.to_vec()
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn is_auto_mode(&self) -> bool {
        self.auto_mode
    }

    /// Time left before the next automatic transition
    pub fn time_to_transition_ms(&self) -> f64 {
        self.timer_ms.max(0.0)
    }
}
