//! SOS state machine.
//!
//! ```text
//! Idle --trigger--> Armed(N) --tick--> Armed(N-1) ... --tick--> Sending --ok--> Sent
//!                     |                                           \--err--> Failed(msg)
//!                     \--cancel--> Idle
//! ```
//!
//! `Sent` and `Failed` go back to `Idle` on acknowledge, and both accept a new
//! trigger directly. A drill runs `Sending -> Sent` without an arming phase.
//! A trigger during a drill abandons the drill and arms as usual; the drill's
//! late outcome is then ignored.
//!
//! Each arming gets a fresh cycle number. Ticks carry the cycle they were
//! scheduled for, so a tick that outlives a cancel is recognized as stale and
//! ignored.
//!
//! This type does no I/O and owns no timers; [`super::SosController`] does.

/// Whether an alert is real or a local drill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Live,
    /// Simulated locally; never reaches the service.
    Drill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SosState {
    Idle,
    Armed { remaining: u32 },
    Sending(AlertKind),
    Sent(AlertKind),
    Failed(String),
}

impl SosState {
    pub fn is_armed(&self) -> bool {
        matches!(self, SosState::Armed { .. })
    }

    /// A live alert is armed or sending: a new trigger is ignored.
    ///
    /// A drill in progress does not count; a real trigger always wins.
    pub fn is_busy(&self) -> bool {
        matches!(self, SosState::Armed { .. } | SosState::Sending(AlertKind::Live))
    }

    /// Sent or failed.
    pub fn is_settled(&self) -> bool {
        matches!(self, SosState::Sent(_) | SosState::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Already armed or sending.
    Ignored,
    /// Countdown started; ticks must carry `cycle`.
    Armed { cycle: u64 },
    /// Zero arming delay: send right away.
    Fire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not armed, or armed for a different cycle.
    Stale,
    Counting { remaining: u32 },
    /// Countdown reached zero; the machine is now sending.
    Expired,
}

#[derive(Debug, Clone)]
pub struct SosMachine {
    state: SosState,
    arming_delay: u32,
    cycle: u64,
}

impl SosMachine {
    pub fn new(arming_delay: u32) -> Self {
        Self {
            state: SosState::Idle,
            arming_delay,
            cycle: 0,
        }
    }

    pub fn state(&self) -> &SosState {
        &self.state
    }

    pub fn arming_delay(&self) -> u32 {
        self.arming_delay
    }

    /// Seconds left while armed; the full delay otherwise.
    pub fn remaining(&self) -> u32 {
        match self.state {
            SosState::Armed { remaining } => remaining,
            _ => self.arming_delay,
        }
    }

    pub fn trigger(&mut self) -> TriggerOutcome {
        if self.state.is_busy() {
            return TriggerOutcome::Ignored;
        }

        self.cycle += 1;
        if self.arming_delay == 0 {
            self.state = SosState::Sending(AlertKind::Live);
            TriggerOutcome::Fire
        } else {
            self.state = SosState::Armed {
                remaining: self.arming_delay,
            };
            TriggerOutcome::Armed { cycle: self.cycle }
        }
    }

    pub fn tick(&mut self, cycle: u64) -> TickOutcome {
        if cycle != self.cycle {
            return TickOutcome::Stale;
        }
        let SosState::Armed { remaining } = self.state else {
            return TickOutcome::Stale;
        };

        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.state = SosState::Sending(AlertKind::Live);
            TickOutcome::Expired
        } else {
            self.state = SosState::Armed { remaining };
            TickOutcome::Counting { remaining }
        }
    }

    /// Abort the countdown. Returns false unless armed.
    pub fn cancel(&mut self) -> bool {
        if !self.state.is_armed() {
            return false;
        }
        self.state = SosState::Idle;
        // Invalidate any tick still in flight.
        self.cycle += 1;
        true
    }

    /// Start a drill. Refused while a live alert is armed or sending, or
    /// while another drill is running.
    pub fn begin_drill(&mut self) -> bool {
        if self.state.is_busy() || self.state == SosState::Sending(AlertKind::Drill) {
            return false;
        }
        self.state = SosState::Sending(AlertKind::Drill);
        true
    }

    /// Record the outcome of a send. Ignored unless sending that kind.
    pub fn finish(&mut self, kind: AlertKind, result: Result<(), String>) -> bool {
        if self.state != SosState::Sending(kind) {
            return false;
        }
        self.state = match result {
            Ok(()) => SosState::Sent(kind),
            Err(message) => SosState::Failed(message),
        };
        true
    }

    /// Dismiss a sent or failed outcome.
    pub fn acknowledge(&mut self) -> bool {
        if !self.state.is_settled() {
            return false;
        }
        self.state = SosState::Idle;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed_cycle(machine: &mut SosMachine) -> u64 {
        match machine.trigger() {
            TriggerOutcome::Armed { cycle } => cycle,
            other => panic!("expected Armed, got {:?}", other),
        }
    }

    #[test]
    fn test_countdown_expires_after_n_ticks() {
        let mut machine = SosMachine::new(3);
        let cycle = armed_cycle(&mut machine);
        assert_eq!(machine.state(), &SosState::Armed { remaining: 3 });

        assert_eq!(machine.tick(cycle), TickOutcome::Counting { remaining: 2 });
        assert_eq!(machine.tick(cycle), TickOutcome::Counting { remaining: 1 });
        assert_eq!(machine.tick(cycle), TickOutcome::Expired);
        assert_eq!(machine.state(), &SosState::Sending(AlertKind::Live));

        // Further ticks cannot fire again.
        assert_eq!(machine.tick(cycle), TickOutcome::Stale);
    }

    #[test]
    fn test_cancel_at_any_point_prevents_fire() {
        for ticks_before_cancel in 0..3 {
            let mut machine = SosMachine::new(3);
            let cycle = armed_cycle(&mut machine);

            for _ in 0..ticks_before_cancel {
                machine.tick(cycle);
            }
            assert!(machine.cancel());
            assert_eq!(machine.state(), &SosState::Idle);
            assert_eq!(machine.remaining(), 3);

            for _ in 0..5 {
                assert_eq!(machine.tick(cycle), TickOutcome::Stale);
            }
            assert_eq!(machine.state(), &SosState::Idle);
        }
    }

    #[test]
    fn test_stale_tick_from_previous_arming() {
        let mut machine = SosMachine::new(3);
        let first = armed_cycle(&mut machine);
        machine.cancel();
        let second = armed_cycle(&mut machine);

        assert_ne!(first, second);
        assert_eq!(machine.tick(first), TickOutcome::Stale);
        assert_eq!(machine.state(), &SosState::Armed { remaining: 3 });
        assert_eq!(machine.tick(second), TickOutcome::Counting { remaining: 2 });
    }

    #[test]
    fn test_trigger_ignored_while_busy() {
        let mut machine = SosMachine::new(3);
        let cycle = armed_cycle(&mut machine);
        machine.tick(cycle);

        assert_eq!(machine.trigger(), TriggerOutcome::Ignored);
        assert_eq!(machine.state(), &SosState::Armed { remaining: 2 });

        machine.tick(cycle);
        machine.tick(cycle);
        assert_eq!(machine.trigger(), TriggerOutcome::Ignored);
        assert_eq!(machine.state(), &SosState::Sending(AlertKind::Live));
    }

    #[test]
    fn test_cancel_only_while_armed() {
        let mut machine = SosMachine::new(3);
        assert!(!machine.cancel());

        machine.begin_drill();
        assert!(!machine.cancel());
        assert_eq!(machine.state(), &SosState::Sending(AlertKind::Drill));
    }

    #[test]
    fn test_failure_allows_retry() {
        let mut machine = SosMachine::new(1);
        let cycle = armed_cycle(&mut machine);
        assert_eq!(machine.tick(cycle), TickOutcome::Expired);

        assert!(machine.finish(AlertKind::Live, Err("contact list empty".to_string())));
        assert_eq!(machine.state(), &SosState::Failed("contact list empty".to_string()));

        assert!(matches!(machine.trigger(), TriggerOutcome::Armed { .. }));
    }

    #[test]
    fn test_acknowledge_returns_to_idle() {
        let mut machine = SosMachine::new(0);
        assert_eq!(machine.trigger(), TriggerOutcome::Fire);
        assert!(!machine.acknowledge());

        machine.finish(AlertKind::Live, Ok(()));
        assert_eq!(machine.state(), &SosState::Sent(AlertKind::Live));
        assert!(machine.acknowledge());
        assert_eq!(machine.state(), &SosState::Idle);
    }

    #[test]
    fn test_acknowledge_after_failure() {
        let mut machine = SosMachine::new(0);
        machine.trigger();
        machine.finish(AlertKind::Live, Err("contact list empty".to_string()));

        assert!(machine.acknowledge());
        assert_eq!(machine.state(), &SosState::Idle);
        assert_eq!(machine.remaining(), 0);
        assert!(!machine.acknowledge());
    }

    #[test]
    fn test_trigger_during_drill_arms() {
        let mut machine = SosMachine::new(3);
        assert!(machine.begin_drill());
        assert!(!machine.begin_drill());

        let cycle = armed_cycle(&mut machine);
        assert_eq!(machine.state(), &SosState::Armed { remaining: 3 });

        // The abandoned drill reports in late.
        assert!(!machine.finish(AlertKind::Drill, Ok(())));
        assert_eq!(machine.state(), &SosState::Armed { remaining: 3 });

        // No drill while the live alert is armed.
        assert!(!machine.begin_drill());
        assert_eq!(machine.tick(cycle), TickOutcome::Counting { remaining: 2 });
    }

    #[test]
    fn test_zero_delay_trigger_during_drill_fires() {
        let mut machine = SosMachine::new(0);
        machine.begin_drill();

        assert_eq!(machine.trigger(), TriggerOutcome::Fire);
        assert_eq!(machine.state(), &SosState::Sending(AlertKind::Live));
        assert!(!machine.begin_drill());
    }

    #[test]
    fn test_finish_must_match_kind() {
        let mut machine = SosMachine::new(3);
        machine.begin_drill();

        assert!(!machine.finish(AlertKind::Live, Ok(())));
        assert!(machine.finish(AlertKind::Drill, Ok(())));
        assert_eq!(machine.state(), &SosState::Sent(AlertKind::Drill));
    }
}
