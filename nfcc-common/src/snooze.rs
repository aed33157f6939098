// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Snooze (low-power) control and wake line handling.
//!
//! In snooze mode the controller sleeps between transfers. The host asserts
//! the wake line before it sends and releases it once the link has been idle
//! for the idle timeout. Snooze never blocks traffic; only power mode does.

use serde::{Deserialize, Serialize};

use crate::controller::Controller;
use crate::effect::{ClientToken, Effect, Effects, TerminalEvent, TimerId, WakeLevel};
use crate::error::{HalError, HalStatus};
use crate::init_fsm::InitPhase;
use crate::protocol::{
    HciCommand, Payload, HCI_SUCCESS, HCI_WRITE_SLEEP_MODE, HCI_WRITE_SLEEP_MODE_LEN,
};
use crate::window::Continuation;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum PowerMode {
    Full,
    Low,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum SnoozeMode {
    None,
    Uart,
    SpiI2c,
}

impl SnoozeMode {
    /// Sleep mode byte of the write-sleep-mode command.
    pub fn wire_value(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Uart => 0x01,
            Self::SpiI2c => 0x08,
        }
    }
}

/// Which electrical transition asserts a wake line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum WakePolarity {
    /// High to low asserts.
    ActiveLow,
    /// Low to high asserts.
    ActiveHigh,
}

impl WakePolarity {
    pub fn wire_value(self) -> u8 {
        match self {
            Self::ActiveLow => 0,
            Self::ActiveHigh => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeAction {
    Assert,
    Deassert,
}

impl WakeAction {
    fn wire_value(self) -> u8 {
        match self {
            Self::Assert => 0,
            Self::Deassert => 1,
        }
    }
}

/// Electrical level for a wake action.
///
/// ```text
/// polarity      action     level
/// active low    assert     low
/// active low    deassert   high
/// active high   assert     high
/// active high   deassert   low
/// ```
///
/// The line is driven low when the action and polarity codes are equal.
pub fn wake_level(action: WakeAction, polarity: WakePolarity) -> WakeLevel {
    if action.wire_value() == polarity.wire_value() {
        WakeLevel::Low
    } else {
        WakeLevel::High
    }
}

/// Link activity reported to the wake logic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Activity {
    Tx,
    Rx,
    IdleTimeout,
}

/// Parameters of a snooze mode request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnoozeRequest {
    pub mode: SnoozeMode,
    /// Host idle threshold, 100 ms units.
    pub idle_threshold_host: u8,
    /// Controller idle threshold, 100 ms units.
    pub idle_threshold_chip: u8,
    pub nfc_wake_polarity: WakePolarity,
    pub host_wake_polarity: WakePolarity,
}

impl SnoozeRequest {
    /// HCI write-sleep-mode command. Parameters beyond the first five are zero.
    pub fn write_sleep_mode(&self) -> HciCommand {
        let mut raw = [0u8; HCI_WRITE_SLEEP_MODE_LEN];
        raw[0] = self.mode.wire_value();
        raw[1] = self.idle_threshold_host;
        raw[2] = self.idle_threshold_chip;
        raw[3] = self.nfc_wake_polarity.wire_value();
        raw[4] = self.host_wake_polarity.wire_value();
        HciCommand {
            opcode: HCI_WRITE_SLEEP_MODE,
            params: Payload::from_slice(&raw).unwrap_or_default(),
        }
    }
}

/// Power and snooze state plus the idle timer flag.
#[derive(Clone, Copy, Debug)]
pub struct LowPower {
    pub power_mode: PowerMode,
    pub snooze_mode: SnoozeMode,
    pub pending_snooze_mode: SnoozeMode,
    pub polarity: WakePolarity,
    pub idle_armed: bool,
    idle_timeout_ms: u32,
}

impl LowPower {
    pub const fn new(idle_timeout_ms: u32) -> Self {
        Self {
            power_mode: PowerMode::Full,
            snooze_mode: SnoozeMode::None,
            pending_snooze_mode: SnoozeMode::None,
            polarity: WakePolarity::ActiveLow,
            idle_armed: false,
            idle_timeout_ms,
        }
    }

    pub fn set_wake(&self, action: WakeAction, fx: &mut Effects) {
        trace!("wake {:?}", action);
        fx.push(Effect::SetWake(wake_level(action, self.polarity)));
    }

    fn arm_idle(&mut self, fx: &mut Effects) {
        self.idle_armed = true;
        fx.push(Effect::ArmTimer {
            timer: TimerId::Idle,
            timeout_ms: self.idle_timeout_ms,
        });
    }

    fn disarm_idle(&mut self, fx: &mut Effects) {
        self.idle_armed = false;
        fx.push(Effect::DisarmTimer(TimerId::Idle));
    }

    /// Drive the wake line for link activity. Returns whether traffic may
    /// reach the controller.
    pub fn on_activity(&mut self, activity: Activity, fx: &mut Effects) -> bool {
        if self.power_mode != PowerMode::Full {
            return false;
        }
        if self.snooze_mode == SnoozeMode::None {
            return true;
        }

        match activity {
            Activity::Tx | Activity::Rx => {
                if !self.idle_armed {
                    self.set_wake(WakeAction::Assert, fx);
                }
                // start or extend
                self.arm_idle(fx);
            }
            Activity::IdleTimeout => {
                self.idle_armed = false;
                self.set_wake(WakeAction::Deassert, fx);
            }
        }
        true
    }

    /// Commit the requested mode after the controller accepted it.
    fn commit(&mut self, fx: &mut Effects) {
        self.snooze_mode = self.pending_snooze_mode;
        self.set_wake(WakeAction::Assert, fx);
        if self.snooze_mode != SnoozeMode::None {
            self.arm_idle(fx);
        } else {
            self.disarm_idle(fx);
        }
    }

    pub fn reset(&mut self) {
        self.power_mode = PowerMode::Full;
        self.snooze_mode = SnoozeMode::None;
        self.pending_snooze_mode = SnoozeMode::None;
        self.idle_armed = false;
    }
}

impl Controller<'_> {
    /// Ask the controller to enter `req.mode`. The outcome goes to `token`.
    ///
    /// While the stack owns the bus (phase idle) the command is held and
    /// bus control is requested; [`Controller::grant_control`] sends it.
    pub fn request_snooze_mode(
        &mut self,
        req: SnoozeRequest,
        token: ClientToken,
        fx: &mut Effects,
    ) -> Result<(), HalError> {
        debug!("request snooze mode {:?}", req.mode);
        let cmd = req.write_sleep_mode();

        if self.phase == InitPhase::Idle {
            self.window.hold(cmd, Some(Continuation::Snooze))?;
            self.store_snooze_request(&req, token);
            self.phase = InitPhase::WaitControlDone;
            fx.push(Effect::Terminal {
                event: TerminalEvent::RequestControl,
                status: HalStatus::Ok,
            });
            return Ok(());
        }

        self.transmit(&cmd.into(), Some(Continuation::Snooze), fx)?;
        self.store_snooze_request(&req, token);
        Ok(())
    }

    fn store_snooze_request(&mut self, req: &SnoozeRequest, token: ClientToken) {
        self.lp.pending_snooze_mode = req.mode;
        self.lp.polarity = req.nfc_wake_polarity;
        self.snooze_token = Some(token);
    }

    /// The stack handed the bus back: send the held command.
    pub fn grant_control(&mut self, fx: &mut Effects) -> Result<(), HalError> {
        if self.phase != InitPhase::WaitControlDone {
            return Err(HalError::WrongState);
        }
        self.phase = InitPhase::Idle;

        if !self.window.has_pending() {
            return Ok(());
        }
        if !self.lp.on_activity(Activity::Tx, fx) {
            warn!("bus granted outside full power, held command dropped");
            if self.window.discard_pending() == Some(Continuation::Snooze) {
                self.report_snooze(HalStatus::Failed, fx);
            }
            return Err(HalError::PowerMode);
        }
        if let Err((e, continuation)) = self.window.flush_pending(fx) {
            error!("held command not sent: {:?}", e);
            if continuation == Some(Continuation::Snooze) {
                self.report_snooze(HalStatus::Failed, fx);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Write-sleep-mode completed with `status`.
    pub(crate) fn on_snooze_complete(&mut self, status: Option<u8>, fx: &mut Effects) {
        if status == Some(HCI_SUCCESS) {
            self.lp.commit(fx);
            debug!("snooze mode now {:?}", self.lp.snooze_mode);
            self.report_snooze(HalStatus::Ok, fx);
        } else {
            warn!("write sleep mode failed: {:?}", status);
            self.report_snooze(HalStatus::Failed, fx);
        }
    }

    pub(crate) fn report_snooze(&mut self, status: HalStatus, fx: &mut Effects) {
        if let Some(token) = self.snooze_token.take() {
            fx.push(Effect::Status { token, status });
        }
    }

    pub fn set_power_mode(&mut self, mode: PowerMode) {
        debug!("power mode {:?}", mode);
        self.lp.power_mode = mode;
    }
}
