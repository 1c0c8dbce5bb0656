//! Recording probe for tests.
//!
//! [`FakeProbe`] implements all three hardware traits over one shared
//! recorder, so a single instance can be handed to the transport as pin
//! access and timebase at once (clones share state). It logs every pin
//! transition as an [`Event`] and answers data-line samples from a
//! scripted bit queue; past the script the line floats high, like real
//! hardware with no target attached.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use bitvec::prelude::*;

use crate::probe::{ControlIo, PinDirection, ProbeError, SwdIo};
use crate::timing::Timebase;

/// One observable action of the device under test.
///
/// Consecutive quantum waits are coalesced into a single [`Event::Quanta`]
/// so traces stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Power(bool),
    Glitch(bool),
    Trigger(bool),
    Clock(bool),
    Swdio(bool),
    Direction(PinDirection),
    Quanta(u32),
    Settle(Duration),
}

#[derive(Debug, Clone, Copy)]
enum TriggerBehavior {
    /// The line sits at a fixed level.
    Level(bool),
    /// Low for the first `n` polls, then high.
    HighAfter(u32),
    /// Low for the first `n` polls, then the backend cancels the wait.
    CancelAfter(u32),
}

#[derive(Debug)]
struct FakeState {
    events: Vec<Event>,
    replies: BitVec<usize, Lsb0>,
    cursor: usize,
    trigger: TriggerBehavior,
    trigger_polls: u32,
    quanta_total: u64,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            replies: BitVec::new(),
            cursor: 0,
            trigger: TriggerBehavior::Level(false),
            trigger_polls: 0,
            quanta_total: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeProbe {
    state: Rc<RefCell<FakeState>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the trigger input at a level.
    pub fn set_trigger(&self, high: bool) {
        self.state.borrow_mut().trigger = TriggerBehavior::Level(high);
    }

    /// Keep the trigger low for `polls` samples, then raise it.
    pub fn set_trigger_after(&self, polls: u32) {
        let mut state = self.state.borrow_mut();
        state.trigger = TriggerBehavior::HighAfter(polls);
        state.trigger_polls = 0;
    }

    /// Keep the trigger low for `polls` samples, then fail the poll with
    /// [`ProbeError::Cancelled`].
    pub fn cancel_trigger_after(&self, polls: u32) {
        let mut state = self.state.borrow_mut();
        state.trigger = TriggerBehavior::CancelAfter(polls);
        state.trigger_polls = 0;
    }

    /// Queue levels the data line will answer with, in sample order.
    pub fn script_reply_bits(&self, bits: impl IntoIterator<Item = bool>) {
        self.state.borrow_mut().replies.extend(bits);
    }

    /// Queue a 3-bit acknowledgement, first-transmitted bit first.
    pub fn script_ack(&self, ack: u8) {
        self.script_reply_bits((0..3).map(|i| ack >> i & 1 == 1));
    }

    /// Queue a 32-bit data phase followed by its parity bit.
    pub fn script_word(&self, value: u32) {
        self.script_reply_bits((0..32).map(|i| value >> i & 1 == 1));
        self.script_reply_bits([value.count_ones() % 2 == 1]);
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    /// Total quanta waited since creation, across clears.
    pub fn quanta_total(&self) -> u64 {
        self.state.borrow().quanta_total
    }

    fn record(&self, event: Event) {
        self.state.borrow_mut().events.push(event);
    }
}

impl SwdIo for FakeProbe {
    fn set_clock(&mut self, high: bool) -> Result<(), ProbeError> {
        self.record(Event::Clock(high));
        Ok(())
    }

    fn set_swdio(&mut self, high: bool) -> Result<(), ProbeError> {
        self.record(Event::Swdio(high));
        Ok(())
    }

    fn swdio(&mut self) -> Result<bool, ProbeError> {
        let mut state = self.state.borrow_mut();
        let bit = state.replies.get(state.cursor).map(|bit| *bit);
        state.cursor += 1;
        Ok(bit.unwrap_or(true))
    }

    fn set_swdio_direction(&mut self, direction: PinDirection) -> Result<(), ProbeError> {
        self.record(Event::Direction(direction));
        Ok(())
    }
}

impl ControlIo for FakeProbe {
    fn set_power(&mut self, on: bool) -> Result<(), ProbeError> {
        self.record(Event::Power(on));
        Ok(())
    }

    fn set_glitch(&mut self, active: bool) -> Result<(), ProbeError> {
        self.record(Event::Glitch(active));
        Ok(())
    }

    fn trigger(&mut self) -> Result<bool, ProbeError> {
        let level = {
            let mut state = self.state.borrow_mut();
            let polls = state.trigger_polls;
            state.trigger_polls += 1;
            match state.trigger {
                TriggerBehavior::Level(level) => level,
                TriggerBehavior::HighAfter(n) => polls >= n,
                TriggerBehavior::CancelAfter(n) => {
                    if polls >= n {
                        return Err(ProbeError::Cancelled);
                    }
                    false
                }
            }
        };
        self.record(Event::Trigger(level));
        Ok(level)
    }
}

impl Timebase for FakeProbe {
    fn wait_quantum(&mut self) {
        let mut state = self.state.borrow_mut();
        state.quanta_total += 1;
        if let Some(Event::Quanta(count)) = state.events.last_mut() {
            *count += 1;
        } else {
            state.events.push(Event::Quanta(1));
        }
    }

    fn wait_settle(&mut self, interval: Duration) {
        self.record(Event::Settle(interval));
    }
}
