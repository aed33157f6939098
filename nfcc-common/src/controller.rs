// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Controller state and the transitions shared by every component.
//!
//! [`Controller`] is pure: each method mutates state and appends the I/O it
//! needs to an [`Effects`] list. Bring-up lives in `init_fsm`, inbound
//! routing in `dispatch`, low-power handling in `snooze`.

use serde::Serialize;

use crate::config::DeviceInitConfig;
use crate::effect::{ClientToken, Effect, Effects, TimerId};
use crate::error::{HalError, HalStatus};
use crate::init_fsm::{xtal_index, ConfigStage, InitPhase, XtalIndex, VSC_FIRST_ENTRY};
use crate::protocol::{self, Command};
use crate::snooze::{Activity, LowPower, PowerMode, SnoozeMode, WakeAction, WakePolarity};
use crate::tlv::encode_config;
use crate::window::{CommandWindow, Continuation, WindowKind};

/// Chip identity learned during bring-up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipId {
    pub hw_id: u32,
    pub nvm_type: u8,
}

/// Read-only copy of the controller state for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    pub phase: InitPhase,
    pub stage: ConfigStage,
    pub window: WindowKind,
    pub pending_command: bool,
    pub power_mode: PowerMode,
    pub snooze_mode: SnoozeMode,
    pub pending_snooze_mode: SnoozeMode,
    pub wake_polarity: WakePolarity,
    pub idle_timer_armed: bool,
    pub xtal: XtalIndex,
    /// Crystal selection command used in the last bring-up.
    pub set_xtal_index: bool,
    pub chip: ChipId,
}

pub struct Controller<'a> {
    pub(crate) config: DeviceInitConfig<'a>,
    pub(crate) window: CommandWindow,
    pub(crate) phase: InitPhase,
    pub(crate) stage: ConfigStage,
    pub(crate) vsc_offset: usize,
    pub(crate) xtal: XtalIndex,
    pub(crate) set_xtal_index: bool,
    pub(crate) chip: ChipId,
    pub(crate) reinit_token: Option<ClientToken>,
    pub(crate) lp: LowPower,
    pub(crate) snooze_token: Option<ClientToken>,
}

impl<'a> Controller<'a> {
    pub fn new(config: DeviceInitConfig<'a>) -> Self {
        Self {
            window: CommandWindow::new(config.command_timeout_ms),
            lp: LowPower::new(config.idle_timeout_ms),
            xtal: xtal_index(config.xtal_freq_khz),
            set_xtal_index: config.set_xtal_index,
            config,
            phase: InitPhase::Idle,
            stage: ConfigStage::Lptd,
            vsc_offset: VSC_FIRST_ENTRY,
            chip: ChipId::default(),
            reinit_token: None,
            snooze_token: None,
        }
    }

    pub fn phase(&self) -> InitPhase {
        self.phase
    }

    pub fn stage(&self) -> ConfigStage {
        self.stage
    }

    pub fn window(&self) -> &CommandWindow {
        &self.window
    }

    pub fn low_power(&self) -> &LowPower {
        &self.lp
    }

    pub fn chip(&self) -> ChipId {
        self.chip
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            phase: self.phase,
            stage: self.stage,
            window: self.window.kind(),
            pending_command: self.window.has_pending(),
            power_mode: self.lp.power_mode,
            snooze_mode: self.lp.snooze_mode,
            pending_snooze_mode: self.lp.pending_snooze_mode,
            wake_polarity: self.lp.polarity,
            idle_timer_armed: self.lp.idle_armed,
            xtal: self.xtal,
            set_xtal_index: self.set_xtal_index,
            chip: self.chip,
        }
    }

    /// Send through the window, waking the controller first if needed.
    pub(crate) fn transmit(
        &mut self,
        cmd: &Command,
        continuation: Option<Continuation>,
        fx: &mut Effects,
    ) -> Result<(), HalError> {
        if !self.window.can_send() {
            error!("no command window for {:?}", cmd.sent_header());
            return Err(HalError::NoWindow);
        }
        if !self.lp.on_activity(Activity::Tx, fx) {
            warn!("send refused in {:?} power mode", self.lp.power_mode);
            return Err(HalError::PowerMode);
        }
        self.window.try_send(cmd, continuation, fx)
    }

    /// Send configuration TLVs. The response goes to `token`. Malformed
    /// TLVs are rejected before anything is sent.
    pub fn submit_config(
        &mut self,
        tlvs: &[u8],
        token: ClientToken,
        fx: &mut Effects,
    ) -> Result<(), HalError> {
        let pkt = encode_config(tlvs)?;
        self.transmit(&pkt.into(), Some(Continuation::Client(token)), fx)
    }

    /// Enable or disable the firmware FSM. The response goes to `token`.
    pub fn toggle_fw_fsm(
        &mut self,
        enable: bool,
        token: ClientToken,
        fx: &mut Effects,
    ) -> Result<(), HalError> {
        self.transmit(
            &protocol::set_fw_fsm(enable).into(),
            Some(Continuation::Client(token)),
            fx,
        )
    }

    /// Response deadline expired. The stored continuation is dropped
    /// without being run; an in-progress bring-up fails.
    pub fn on_command_timeout(&mut self, fx: &mut Effects) {
        let Some(expired) = self.window.on_timeout() else {
            return;
        };
        if expired.continuation == Some(Continuation::Snooze) {
            self.report_snooze(HalStatus::Failed, fx);
        }
        self.fail_in_progress(fx);
    }

    /// The transport refused the last frame.
    pub fn on_transport_failure(&mut self, fx: &mut Effects) {
        error!("transport send failed");
        let Some(lost) = self.window.on_timeout() else {
            return;
        };
        fx.push(Effect::DisarmTimer(TimerId::CommandTimeout));
        if lost.continuation == Some(Continuation::Snooze) {
            self.report_snooze(HalStatus::Failed, fx);
        }
        self.fail_in_progress(fx);
    }

    fn fail_in_progress(&mut self, fx: &mut Effects) {
        if !matches!(self.phase, InitPhase::Idle | InitPhase::Closing) {
            self.abort(fx);
        }
    }

    pub fn on_timer_expired(&mut self, timer: TimerId, fx: &mut Effects) {
        trace!("timer {:?} expired", timer);
        match timer {
            TimerId::CommandTimeout => self.on_command_timeout(fx),
            TimerId::Idle => {
                self.lp.idle_armed = false;
                self.lp.on_activity(Activity::IdleTimeout, fx);
            }
            TimerId::XtalSettle => {
                if self.phase == InitPhase::WaitXtalSettle {
                    self.send_reset(fx);
                }
            }
        }
    }

    /// Tear down: window, continuations, held command, timers and low-power
    /// state all return to their initial values.
    pub fn shutdown(&mut self, fx: &mut Effects) {
        debug!("shutdown");
        self.phase = InitPhase::Closing;

        if self.lp.power_mode == PowerMode::Full && self.lp.snooze_mode != SnoozeMode::None {
            self.lp.set_wake(WakeAction::Assert, fx);
        }

        self.window.reset();
        self.lp.reset();
        self.reinit_token = None;
        self.snooze_token = None;
        self.stage = ConfigStage::Lptd;
        self.vsc_offset = VSC_FIRST_ENTRY;

        fx.push(Effect::DisarmTimer(TimerId::CommandTimeout));
        fx.push(Effect::DisarmTimer(TimerId::Idle));
        fx.push(Effect::DisarmTimer(TimerId::XtalSettle));
    }
}
