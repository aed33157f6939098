// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Runtime driver: executes controller effects against real collaborators.
//!
//! [`Device`] owns a [`Controller`] plus the transport, wake line, timer
//! service and host callbacks. Each entry point runs one controller
//! reaction and then performs the queued effects in order.

use core::fmt::Debug;

use crate::config::DeviceInitConfig;
use crate::controller::{ChipId, Controller, DeviceSnapshot};
use crate::effect::{ClientToken, Effect, Effects, TerminalEvent, TimerId, WakeLevel};
use crate::error::{HalError, HalStatus};
use crate::framing::FrameAssembler;
use crate::init_fsm::{ConfigStage, InitPhase};
use crate::protocol::Inbound;
use crate::snooze::{PowerMode, SnoozeRequest};

/// Byte transport to the controller. Frames include the packet-type prefix.
pub trait Transport {
    type Error: Debug;

    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error>;
}

/// Wake GPIO.
pub trait WakeLine {
    fn set(&mut self, level: WakeLevel);
}

/// One-shot timers. Expiry must be reported back through
/// [`Device::on_timer_expired`]. Arming an armed timer restarts it.
pub trait TimerService {
    fn arm(&mut self, timer: TimerId, timeout_ms: u32);
    fn disarm(&mut self, timer: TimerId);
}

/// Owning stack and its collaborators (patch download, provisioning).
pub trait Host {
    /// Bring-up finished, failed, or a held command needs the bus.
    fn on_terminal_event(&mut self, event: TerminalEvent, status: HalStatus);

    /// Response to a command issued with `token`.
    fn on_command_complete(&mut self, _token: ClientToken, _event: u8, _payload: &[u8]) {}

    /// Status-only completion (snooze mode).
    fn on_status(&mut self, _token: ClientToken, _status: HalStatus) {}

    /// Controller reset itself.
    fn on_reset_notification(&mut self, _reason: u8, _kind: u8) {}

    /// Proprietary traffic for the patch-download owner.
    fn on_patch_event(&mut self, _event: u8, _payload: &[u8]) {}

    /// Build and patch information read during bring-up.
    fn on_chip_identified(&mut self, _hw_id: u32, _nvm_type: u8) {}
}

/// Wake line on an `embedded-hal` output pin.
#[cfg(feature = "embedded")]
pub struct WakePin<P>(pub P);

#[cfg(feature = "embedded")]
impl<P: embedded_hal::digital::OutputPin> WakeLine for WakePin<P> {
    fn set(&mut self, level: WakeLevel) {
        match level {
            WakeLevel::Low => self.0.set_low().ok(),
            WakeLevel::High => self.0.set_high().ok(),
        };
    }
}

pub struct Device<'a, T, W, S, H> {
    ctrl: Controller<'a>,
    rx: FrameAssembler,
    transport: T,
    wake: W,
    timers: S,
    host: H,
}

impl<'a, T, W, S, H> Device<'a, T, W, S, H>
where
    T: Transport,
    W: WakeLine,
    S: TimerService,
    H: Host,
{
    pub fn new(config: DeviceInitConfig<'a>, transport: T, wake: W, timers: S, host: H) -> Self {
        Self {
            ctrl: Controller::new(config),
            rx: FrameAssembler::new(),
            transport,
            wake,
            timers,
            host,
        }
    }

    pub fn controller(&self) -> &Controller<'a> {
        &self.ctrl
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn timers_mut(&mut self) -> &mut S {
        &mut self.timers
    }

    pub fn phase(&self) -> InitPhase {
        self.ctrl.phase()
    }

    pub fn stage(&self) -> ConfigStage {
        self.ctrl.stage()
    }

    pub fn chip(&self) -> ChipId {
        self.ctrl.chip()
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.ctrl.snapshot()
    }

    pub fn begin_initialization(&mut self) -> Result<(), HalError> {
        self.react(|c, fx| c.begin_initialization(fx))
    }

    pub fn notify_init_done(&mut self, status: HalStatus) -> Result<(), HalError> {
        self.react(|c, fx| c.notify_init_done(status, fx))
    }

    pub fn begin_reinitialization(&mut self, token: ClientToken) -> Result<(), HalError> {
        self.react(|c, fx| c.begin_reinitialization(token, fx))
    }

    pub fn submit_config(&mut self, tlvs: &[u8], token: ClientToken) -> Result<(), HalError> {
        self.react(|c, fx| c.submit_config(tlvs, token, fx))
    }

    pub fn toggle_fw_fsm(&mut self, enable: bool, token: ClientToken) -> Result<(), HalError> {
        self.react(|c, fx| c.toggle_fw_fsm(enable, token, fx))
    }

    pub fn request_snooze_mode(
        &mut self,
        req: SnoozeRequest,
        token: ClientToken,
    ) -> Result<(), HalError> {
        self.react(|c, fx| c.request_snooze_mode(req, token, fx))
    }

    pub fn grant_control(&mut self) -> Result<(), HalError> {
        self.react(|c, fx| c.grant_control(fx))
    }

    pub fn set_power_mode(&mut self, mode: PowerMode) {
        self.ctrl.set_power_mode(mode);
    }

    pub fn shutdown(&mut self) {
        self.react(|c, fx| c.shutdown(fx));
        self.rx.reset();
    }

    pub fn on_timer_expired(&mut self, timer: TimerId) {
        self.react(|c, fx| c.on_timer_expired(timer, fx));
    }

    /// Handle one already framed packet.
    pub fn on_packet(&mut self, msg: &Inbound) {
        self.react(|c, fx| c.on_inbound(msg, fx));
    }

    /// Feed raw bytes from the transport.
    pub fn on_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            match self.rx.push(b) {
                Some(Ok(msg)) => self.on_packet(&msg),
                Some(Err(e)) => warn!("dropping bad packet: {:?}", e),
                None => {}
            }
        }
    }

    fn react<R>(&mut self, f: impl FnOnce(&mut Controller<'a>, &mut Effects) -> R) -> R {
        let mut fx = Effects::new();
        let result = f(&mut self.ctrl, &mut fx);
        self.execute(fx);
        result
    }

    /// Perform effects in order. A refused frame feeds the failure back
    /// into the controller and its reaction is executed in turn.
    fn execute(&mut self, fx: Effects) {
        let mut queue = fx;
        loop {
            let mut follow_up = Effects::new();
            for effect in queue.drain() {
                self.perform(effect, &mut follow_up);
            }
            if follow_up.is_empty() {
                break;
            }
            queue = follow_up;
        }
    }

    fn perform(&mut self, effect: Effect, follow_up: &mut Effects) {
        match effect {
            Effect::Transmit(frame) => {
                if self.transport.send(&frame).is_err() {
                    error!("transport failed to send {} bytes", frame.len());
                    self.ctrl.on_transport_failure(follow_up);
                }
            }
            Effect::ArmTimer { timer, timeout_ms } => self.timers.arm(timer, timeout_ms),
            Effect::DisarmTimer(timer) => self.timers.disarm(timer),
            Effect::SetWake(level) => self.wake.set(level),
            Effect::Terminal { event, status } => self.host.on_terminal_event(event, status),
            Effect::CommandComplete {
                token,
                event,
                payload,
            } => self.host.on_command_complete(token, event, &payload),
            Effect::Status { token, status } => self.host.on_status(token, status),
            Effect::ResetNotification { reason, kind } => {
                self.host.on_reset_notification(reason, kind)
            }
            Effect::PatchEvent { event, payload } => self.host.on_patch_event(event, &payload),
            Effect::ChipIdentified { hw_id, nvm_type } => {
                self.host.on_chip_identified(hw_id, nvm_type)
            }
        }
    }
}
