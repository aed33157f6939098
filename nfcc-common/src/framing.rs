// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! UART packet reassembly.
//!
//! The controller's UART stream is a sequence of packets, each starting
//! with a packet-type byte followed by a self-describing header:
//! - NCI (`0x10`): 3-byte header, length in the third byte
//! - HCI event (`0x04`): 2-byte header, length in the second byte

use heapless::Vec as HeaplessVec;

use crate::protocol::{
    packet_type, FrameError, Inbound, HCI_EVT_HDR_SIZE, MAX_FRAME_SIZE, NCI_MSG_HDR_SIZE,
};

/// Accumulates bytes until one full packet is available.
pub struct FrameAssembler {
    buf: HeaplessVec<u8, MAX_FRAME_SIZE>,
}

impl FrameAssembler {
    pub const fn new() -> Self {
        Self {
            buf: HeaplessVec::new(),
        }
    }

    /// Drop any partially received packet.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Number of bytes buffered for the current packet.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Feed one byte. Returns a parsed packet (or a framing error) once the
    /// packet is complete; the buffer is then ready for the next one.
    pub fn push(&mut self, byte: u8) -> Option<Result<Inbound, FrameError>> {
        if self.buf.is_empty() && !is_known_type(byte) {
            return Some(Err(FrameError::UnknownPacketType(byte)));
        }

        if self.buf.push(byte).is_err() {
            self.buf.clear();
            return Some(Err(FrameError::Overflow));
        }

        let total = self.expected_len()?;
        if self.buf.len() < total {
            return None;
        }

        let result = Inbound::parse(&self.buf);
        self.buf.clear();
        Some(result)
    }

    /// Total packet length once enough of the header has arrived.
    fn expected_len(&self) -> Option<usize> {
        let (hdr, len_idx) = match self.buf[0] {
            packet_type::NCI => (NCI_MSG_HDR_SIZE, NCI_MSG_HDR_SIZE),
            _ => (HCI_EVT_HDR_SIZE, HCI_EVT_HDR_SIZE),
        };
        let len = *self.buf.get(len_idx)? as usize;
        Some(1 + hdr + len)
    }

    #[cfg(feature = "std")]
    /// Feed a chunk of bytes and collect every packet completed by it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<Inbound, FrameError>> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn is_known_type(byte: u8) -> bool {
    matches!(byte, packet_type::NCI | packet_type::HCI_EVENT)
}
