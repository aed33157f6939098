// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command window: at most one command awaiting its response.
//!
//! The window owns the header snapshot of the in-flight command and the
//! continuation that consumes its result. Both are only reachable through
//! the operations below; a continuation leaves the window exactly once,
//! on the matching response or on timeout.

use crate::effect::{ClientToken, Effect, Effects, TimerId};
use crate::error::HalError;
use crate::protocol::{Command, HciCommand, Inbound, SentHeader, GID_CORE};

/// Default response deadline.
pub const COMMAND_TIMEOUT_MS: u32 = 2000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WindowKind {
    Free,
    /// Core-group NCI command.
    Cmd,
    /// Proprietary-group NCI command.
    VendorSpecific,
    /// HCI vendor command.
    Proprietary,
}

impl WindowKind {
    fn for_command(cmd: &Command) -> Self {
        match cmd {
            Command::Nci(pkt) if pkt.header.gid == GID_CORE => Self::Cmd,
            Command::Nci(_) => Self::VendorSpecific,
            Command::Hci(_) => Self::Proprietary,
        }
    }
}

/// Who consumes the result of the in-flight command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Continuation {
    /// Re-enter the config stage driver.
    Sequencer,
    /// Report to an external caller.
    Client(ClientToken),
    /// Sleep-mode command completion.
    Snooze,
}

/// Result of a matching response.
#[derive(Debug, PartialEq, Eq)]
pub struct Matched {
    pub header: SentHeader,
    pub continuation: Option<Continuation>,
}

/// Command abandoned by a timeout.
#[derive(Debug, PartialEq, Eq)]
pub struct Expired {
    pub header: SentHeader,
    pub continuation: Option<Continuation>,
}

struct Held {
    cmd: HciCommand,
    continuation: Option<Continuation>,
}

pub struct CommandWindow {
    kind: WindowKind,
    last_sent: Option<SentHeader>,
    continuation: Option<Continuation>,
    pending: Option<Held>,
    timeout_ms: u32,
}

impl CommandWindow {
    pub const fn new(timeout_ms: u32) -> Self {
        Self {
            kind: WindowKind::Free,
            last_sent: None,
            continuation: None,
            pending: None,
            timeout_ms,
        }
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    pub fn is_free(&self) -> bool {
        self.kind == WindowKind::Free
    }

    /// A new command may be issued: window free and nothing held.
    pub fn can_send(&self) -> bool {
        self.is_free() && self.pending.is_none()
    }

    pub fn last_sent(&self) -> Option<SentHeader> {
        self.last_sent
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Claim the window for `cmd` and queue its frame plus the response deadline.
    pub fn try_send(
        &mut self,
        cmd: &Command,
        continuation: Option<Continuation>,
        fx: &mut Effects,
    ) -> Result<(), HalError> {
        if !self.can_send() {
            error!("no command window ({:?})", self.kind);
            return Err(HalError::NoWindow);
        }
        self.send_unchecked(cmd, continuation, fx)
    }

    fn send_unchecked(
        &mut self,
        cmd: &Command,
        continuation: Option<Continuation>,
        fx: &mut Effects,
    ) -> Result<(), HalError> {
        if !self.is_free() {
            return Err(HalError::NoWindow);
        }
        let frame = cmd.to_frame()?;

        self.kind = WindowKind::for_command(cmd);
        self.last_sent = Some(cmd.sent_header());
        self.continuation = continuation;
        trace!("window -> {:?} for {:?}", self.kind, self.last_sent);

        fx.push(Effect::Transmit(frame));
        fx.push(Effect::ArmTimer {
            timer: TimerId::CommandTimeout,
            timeout_ms: self.timeout_ms,
        });
        Ok(())
    }

    /// Check whether `msg` answers the in-flight command. On a match the
    /// window is freed, the deadline disarmed and the continuation handed
    /// back. Anything else leaves the window untouched.
    pub fn on_inbound(&mut self, msg: &Inbound, fx: &mut Effects) -> Option<Matched> {
        if self.is_free() {
            return None;
        }
        let sent = self.last_sent?;
        let answered = match (msg, sent) {
            (Inbound::Nci(pkt), SentHeader::Nci { gid, oid }) => {
                pkt.is_response() && pkt.header.gid == gid && pkt.header.oid == oid
            }
            (Inbound::CommandComplete(cc), SentHeader::Hci { opcode }) => cc.opcode == opcode,
            _ => false,
        };
        if !answered {
            return None;
        }

        self.kind = WindowKind::Free;
        self.last_sent = None;
        fx.push(Effect::DisarmTimer(TimerId::CommandTimeout));
        Some(Matched {
            header: sent,
            continuation: self.continuation.take(),
        })
    }

    /// Response deadline expired: force the window free. The continuation
    /// is returned only so the caller can account for the lost command; it
    /// must not be run as if the command had completed.
    pub fn on_timeout(&mut self) -> Option<Expired> {
        if self.is_free() {
            return None;
        }
        let header = self.last_sent.take()?;
        self.kind = WindowKind::Free;
        warn!("command {:?} timed out", header);
        Some(Expired {
            header,
            continuation: self.continuation.take(),
        })
    }

    /// Park one HCI command until bus control is granted.
    pub fn hold(
        &mut self,
        cmd: HciCommand,
        continuation: Option<Continuation>,
    ) -> Result<(), HalError> {
        if !self.can_send() {
            return Err(HalError::NoWindow);
        }
        self.pending = Some(Held { cmd, continuation });
        Ok(())
    }

    /// Send the held command. If it cannot be sent its continuation is
    /// handed back with the error so the caller can report the failure.
    pub fn flush_pending(
        &mut self,
        fx: &mut Effects,
    ) -> Result<(), (HalError, Option<Continuation>)> {
        let Some(held) = self.pending.take() else {
            return Ok(());
        };
        let cmd = Command::Hci(held.cmd);
        self.send_unchecked(&cmd, held.continuation, fx)
            .map_err(|e| (e, held.continuation))
    }

    /// Drop the held command, returning its continuation.
    pub fn discard_pending(&mut self) -> Option<Continuation> {
        self.pending.take().and_then(|held| held.continuation)
    }

    /// Force everything back to the initial state.
    pub fn reset(&mut self) {
        self.kind = WindowKind::Free;
        self.last_sent = None;
        self.continuation = None;
        self.pending = None;
    }
}
