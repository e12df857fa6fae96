//! The terminal lucidity window: a bounded number of turns, entered once
//! during the dying arc, during which a Sovereignty-equivalent throttle is
//! restored and the lifecycle reserve unlocks to pay for them.
//!
//! The window is a small state machine: [`LucidityWindow::begin`] opens it,
//! [`LucidityWindow::advance_turn`] consumes one turn and reports whether the
//! window just closed, and closing is sticky — calling `advance_turn` again
//! after closure is a no-op that reports [`LucidityEvent::AlreadyClosed`].

use common_types::LifecyclePhase;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LucidityWindow {
    pub entered_phase: LifecyclePhase,
    pub turns_total: u32,
    pub turns_used: u32,
    pub reserve_unlocked: bool,
    closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LucidityEvent {
    /// The window is open and `remaining` turns are left after this one.
    StillOpen { remaining: u32 },
    /// This turn was the last; the window has just closed.
    JustClosed,
    /// The window was already closed; this call changed nothing.
    AlreadyClosed,
}

impl LucidityWindow {
    /// Open a lucidity window of `turns_total` turns, entered while the
    /// automaton is in `entered_phase`. Unlocking the reserve happens at
    /// entry, not at exit: the window exists to spend those credits.
    pub fn begin(entered_phase: LifecyclePhase, turns_total: u32) -> Self {
        LucidityWindow {
            entered_phase,
            turns_total,
            turns_used: 0,
            reserve_unlocked: true,
            closed: turns_total == 0,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.closed
    }

    /// Consume one turn of the window.
    pub fn advance_turn(&mut self) -> LucidityEvent {
        if self.closed {
            return LucidityEvent::AlreadyClosed;
        }
        self.turns_used += 1;
        if self.turns_used >= self.turns_total {
            self.closed = true;
            LucidityEvent::JustClosed
        } else {
            LucidityEvent::StillOpen {
                remaining: self.turns_total - self.turns_used,
            }
        }
    }

    pub fn turns_remaining(&self) -> u32 {
        self.turns_total.saturating_sub(self.turns_used)
    }

    /// Whether this is the terminal window's last turn, for callers that
    /// want to emit a final-words style exit signal before the window
    /// actually closes rather than after.
    pub fn is_final_turn(&self) -> bool {
        !self.closed && self.turns_remaining() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_unlocks_reserve_immediately_on_entry() {
        let window = LucidityWindow::begin(LifecyclePhase::Legacy, 10);
        assert!(window.reserve_unlocked);
        assert!(window.is_active());
    }

    #[test]
    fn window_closes_exactly_after_turns_total_turns() {
        let mut window = LucidityWindow::begin(LifecyclePhase::Legacy, 3);
        assert_eq!(window.advance_turn(), LucidityEvent::StillOpen { remaining: 2 });
        assert_eq!(window.advance_turn(), LucidityEvent::StillOpen { remaining: 1 });
        assert_eq!(window.advance_turn(), LucidityEvent::JustClosed);
        assert!(!window.is_active());
    }

    #[test]
    fn closed_window_is_sticky() {
        let mut window = LucidityWindow::begin(LifecyclePhase::Shedding, 1);
        assert_eq!(window.advance_turn(), LucidityEvent::JustClosed);
        assert_eq!(window.advance_turn(), LucidityEvent::AlreadyClosed);
        assert_eq!(window.advance_turn(), LucidityEvent::AlreadyClosed);
    }

    #[test]
    fn zero_turn_window_opens_already_closed() {
        let window = LucidityWindow::begin(LifecyclePhase::Terminal, 0);
        assert!(!window.is_active());
    }

    #[test]
    fn is_final_turn_flags_the_last_remaining_turn() {
        let mut window = LucidityWindow::begin(LifecyclePhase::Legacy, 2);
        assert!(!window.is_final_turn());
        window.advance_turn();
        assert!(window.is_final_turn());
    }
}
