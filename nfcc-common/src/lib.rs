// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Bring-up and low-power control for NCI controllers.
//!
//! This crate supports both `no_std` (embedded) and `std` (host) environments:
//! - Default: `no_std`, no logging
//! - `std` feature: `std::error::Error` impls and `Vec` based helpers for host tools
//! - `defmt` / `log` features: select the logging backend
//! - `embedded` feature: wake line adapter for `embedded-hal` output pins

#![cfg_attr(not(any(feature = "std", test)), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod controller;
pub mod device;
pub mod dispatch;
pub mod effect;
pub mod error;
pub mod framing;
pub mod init_fsm;
pub mod protocol;
pub mod snooze;
pub mod tlv;
pub mod window;

// Re-export commonly used types
pub use config::DeviceInitConfig;
pub use controller::{ChipId, Controller, DeviceSnapshot};
pub use device::{Device, Host, TimerService, Transport, WakeLine};
pub use effect::{ClientToken, Effect, Effects, TerminalEvent, TimerId, WakeLevel};
pub use error::{HalError, HalStatus, TlvError};
pub use init_fsm::{ConfigStage, InitPhase, XtalIndex};
pub use protocol::{Command, Inbound, NciPacket};
pub use snooze::{PowerMode, SnoozeMode, SnoozeRequest, WakePolarity};

#[cfg(feature = "embedded")]
pub use device::WakePin;
