// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Side effects requested by the controller state machine.
//!
//! The controller never touches hardware. Every transition appends the
//! I/O it needs to an [`Effects`] list, which the runtime
//! ([`crate::device::Device`]) executes in order.

use heapless::Vec;
use serde::Serialize;

use crate::error::HalStatus;
use crate::protocol::{Frame, Payload};

/// Enough for the busiest reaction (callback + wake + transmit + two timers + terminal).
pub const MAX_EFFECTS: usize = 8;

/// Caller-chosen identifier returned with the result of a client command.
pub type ClientToken = u16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerId {
    /// Response deadline of the command in the window.
    CommandTimeout,
    /// Snooze idle deadline; expiry deasserts the wake line.
    Idle,
    /// Settling delay after crystal selection.
    XtalSettle,
}

/// Electrical level of the wake GPIO.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeLevel {
    Low,
    High,
}

/// Outcomes reported to the owning stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TerminalEvent {
    InitComplete,
    InitFailed,
    /// A vendor command is held until the stack hands over the bus.
    RequestControl,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Transmit(Frame),
    ArmTimer { timer: TimerId, timeout_ms: u32 },
    DisarmTimer(TimerId),
    SetWake(WakeLevel),
    Terminal { event: TerminalEvent, status: HalStatus },
    /// Response or notification for a client-issued command.
    CommandComplete {
        token: ClientToken,
        event: u8,
        payload: Payload,
    },
    /// Status-only completion (snooze mode).
    Status { token: ClientToken, status: HalStatus },
    ResetNotification { reason: u8, kind: u8 },
    PatchEvent { event: u8, payload: Payload },
    ChipIdentified { hw_id: u32, nvm_type: u8 },
}

/// Ordered effect list produced by one reaction.
#[derive(Debug, Default)]
pub struct Effects(Vec<Effect, MAX_EFFECTS>);

impl Effects {
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, effect: Effect) {
        if self.0.push(effect).is_err() {
            error!("effect list full, dropping effect");
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Effect> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Effect] {
        &self.0
    }

    /// Consume the list in execution order.
    pub fn drain(self) -> impl Iterator<Item = Effect> {
        self.0.into_iter()
    }

    /// Frames queued for the transport.
    pub fn transmitted(&self) -> impl Iterator<Item = &Frame> {
        self.0.iter().filter_map(|e| match e {
            Effect::Transmit(frame) => Some(frame),
            _ => None,
        })
    }
}
