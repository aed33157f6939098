// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host-side event loop around the controller runtime.

use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};

use nfcc_common::{
    ClientToken, Device, DeviceInitConfig, HalStatus, Host, TerminalEvent, TimerId, TimerService,
};

use crate::transport::{DtrWake, SerialLink};

/// One-shot deadlines backed by `Instant`.
#[derive(Debug, Default)]
pub struct Deadlines {
    armed: Vec<(TimerId, Instant)>,
}

impl Deadlines {
    /// Remove and return every timer whose deadline passed.
    pub fn expired(&mut self, now: Instant) -> Vec<TimerId> {
        let (due, pending): (Vec<_>, Vec<_>) =
            self.armed.drain(..).partition(|(_, at)| *at <= now);
        self.armed = pending;
        due.into_iter().map(|(timer, _)| timer).collect()
    }
}

impl TimerService for Deadlines {
    fn arm(&mut self, timer: TimerId, timeout_ms: u32) {
        self.disarm(timer);
        self.armed
            .push((timer, Instant::now() + Duration::from_millis(timeout_ms as u64)));
    }

    fn disarm(&mut self, timer: TimerId) {
        self.armed.retain(|(t, _)| *t != timer);
    }
}

/// What the controller reported back during a session.
#[derive(Debug, Default)]
pub struct Outcome {
    pub terminal: Option<(TerminalEvent, HalStatus)>,
    pub chip: Option<(u32, u8)>,
    pub completions: Vec<(ClientToken, u8, Vec<u8>)>,
    pub statuses: Vec<(ClientToken, HalStatus)>,
}

impl Outcome {
    pub fn completion(&self, token: ClientToken) -> Option<&(ClientToken, u8, Vec<u8>)> {
        self.completions.iter().find(|(t, _, _)| *t == token)
    }

    pub fn status(&self, token: ClientToken) -> Option<HalStatus> {
        self.statuses
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, s)| *s)
    }
}

impl Host for Outcome {
    fn on_terminal_event(&mut self, event: TerminalEvent, status: HalStatus) {
        log::debug!("terminal event {:?} ({:?})", event, status);
        self.terminal = Some((event, status));
    }

    fn on_command_complete(&mut self, token: ClientToken, event: u8, payload: &[u8]) {
        log::debug!("#{} event {:#04x}: {}", token, event, hex::encode(payload));
        self.completions.push((token, event, payload.to_vec()));
    }

    fn on_status(&mut self, token: ClientToken, status: HalStatus) {
        self.statuses.push((token, status));
    }

    fn on_reset_notification(&mut self, reason: u8, kind: u8) {
        log::warn!("controller reset (reason {:#04x}, type {:#04x})", reason, kind);
    }

    fn on_patch_event(&mut self, event: u8, payload: &[u8]) {
        log::info!("patch event {:#04x}: {}", event, hex::encode(payload));
    }

    fn on_chip_identified(&mut self, hw_id: u32, nvm_type: u8) {
        self.chip = Some((hw_id, nvm_type));
    }
}

pub type CtlDevice<'a> = Device<'a, SerialLink, DtrWake, Deadlines, Outcome>;

/// A controller runtime plus the loop that feeds it bytes and timer expiries.
pub struct Session<'a> {
    pub dev: CtlDevice<'a>,
    next_token: ClientToken,
}

impl<'a> Session<'a> {
    pub fn new(config: DeviceInitConfig<'a>, mut link: SerialLink, wake: DtrWake) -> Self {
        link.drain_rx();
        Self {
            dev: Device::new(config, link, wake, Deadlines::default(), Outcome::default()),
            next_token: 1,
        }
    }

    pub fn outcome(&self) -> &Outcome {
        self.dev.host()
    }

    pub fn port_name(&mut self) -> String {
        self.dev.transport_mut().port_name()
    }

    pub fn token(&mut self) -> ClientToken {
        let t = self.next_token;
        self.next_token = self.next_token.wrapping_add(1);
        t
    }

    /// Run the loop until `done` holds or `limit` passes.
    pub fn pump_until(
        &mut self,
        what: &str,
        limit: Duration,
        done: impl Fn(&Self) -> bool,
    ) -> Result<()> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        spinner.set_message(what.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        let start = Instant::now();
        let mut buf = [0u8; 512];
        while !done(self) {
            if start.elapsed() > limit {
                spinner.abandon_with_message(format!("{}: timed out", what));
                bail!("Timeout waiting for {}", what);
            }

            let n = self.dev.transport_mut().poll(&mut buf)?;
            if n > 0 {
                log::trace!("rx {}", hex::encode(&buf[..n]));
                self.dev.on_bytes(&buf[..n]);
            }

            for timer in self.dev.timers_mut().expired(Instant::now()) {
                self.dev.on_timer_expired(timer);
            }
        }

        spinner.finish_and_clear();
        Ok(())
    }
}
