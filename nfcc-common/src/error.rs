// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Error and status types.

use core::fmt;

use serde::Serialize;

/// Structural problems found while walking a TLV configuration buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TlvError {
    /// Zero-length input. Sending nothing is a caller bug, not a no-op.
    Empty,
    /// More bytes than fit in one SET_CONFIG payload.
    TooLong { len: usize },
    /// Item at `offset` declares more value bytes than remain.
    Overrun { offset: usize },
    /// A single dangling byte at `offset` where a type/length pair should start.
    Truncated { offset: usize },
    /// Length-prefixed blob declares more bytes than the buffer holds.
    BlobShort { declared: usize, available: usize },
}

impl fmt::Display for TlvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty TLV buffer"),
            Self::TooLong { len } => write!(f, "TLV buffer too long ({} bytes)", len),
            Self::Overrun { offset } => write!(f, "TLV at offset {} overruns the buffer", offset),
            Self::Truncated { offset } => write!(f, "trailing partial TLV at offset {}", offset),
            Self::BlobShort {
                declared,
                available,
            } => write!(
                f,
                "config blob declares {} bytes but only {} are present",
                declared, available
            ),
        }
    }
}

/// Errors reported by the controller core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// A command is already awaiting its response (or a held command owns the slot).
    NoWindow,
    /// Operation not valid in the current bring-up phase.
    WrongState,
    /// Traffic is not allowed outside full power mode.
    PowerMode,
    /// Payload does not fit in one packet.
    FrameTooLong,
    /// Malformed configuration TLVs.
    Tlv(TlvError),
    /// Vendor start-up command table is malformed.
    BadVscTable,
    /// PLL table has no row for the selected crystal index.
    BadPllTable,
}

impl From<TlvError> for HalError {
    fn from(e: TlvError) -> Self {
        Self::Tlv(e)
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWindow => write!(f, "no command window"),
            Self::WrongState => write!(f, "operation not valid in current state"),
            Self::PowerMode => write!(f, "controller is not in full power mode"),
            Self::FrameTooLong => write!(f, "payload too long for one packet"),
            Self::Tlv(e) => write!(f, "bad TLV: {}", e),
            Self::BadVscTable => write!(f, "bad start-up VSC table"),
            Self::BadPllTable => write!(f, "PLL table too short for crystal index"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TlvError {}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// Outcome reported to the owning stack and to client callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalStatus {
    Ok,
    Failed,
}

impl HalStatus {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}
