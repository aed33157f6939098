// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial transport and wake line for a controller on a UART.

use anyhow::{Context, Result};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

use nfcc_common::{Transport, WakeLevel, WakeLine};

/// Default line rate of the controller UART.
pub const DEFAULT_BAUD: u32 = 115200;

/// Read timeout; bounds how late a timer expiry is noticed.
pub const POLL_INTERVAL_MS: u64 = 10;

/// UART link to the controller. Frames go out as-is, packet-type byte first.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    /// Open the port and return the link plus a wake line on the same port.
    pub fn open(port_name: &str, baud: u32) -> Result<(Self, DtrWake)> {
        let port = serialport::new(port_name, baud)
            .timeout(Duration::from_millis(POLL_INTERVAL_MS))
            .open()
            .with_context(|| format!("Failed to open serial port {}", port_name))?;
        let wake = port
            .try_clone()
            .with_context(|| format!("Failed to clone {} for the wake line", port_name))?;

        Ok((Self { port }, DtrWake { port: wake }))
    }

    /// Get the port name.
    pub fn port_name(&self) -> String {
        self.port.name().unwrap_or_else(|| "?".to_string())
    }

    /// Read whatever arrived within one poll interval.
    pub fn poll(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e).context("Serial read error"),
        }
    }

    /// Discard stale bytes left over from a previous session.
    pub fn drain_rx(&mut self) {
        let mut buf = [0u8; 64];
        while self.poll(&mut buf).unwrap_or(0) > 0 {}
    }
}

impl Transport for SerialLink {
    type Error = io::Error;

    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        log::trace!("tx {}", hex::encode(frame));
        self.port.write_all(frame)?;
        self.port.flush()
    }
}

/// Wake line wired to the DTR output of the serial adapter.
pub struct DtrWake {
    port: Box<dyn SerialPort>,
}

impl WakeLine for DtrWake {
    fn set(&mut self, level: WakeLevel) {
        log::debug!("wake line {:?}", level);
        if let Err(e) = self
            .port
            .write_data_terminal_ready(level == WakeLevel::High)
        {
            log::warn!("failed to drive DTR: {}", e);
        }
    }
}
