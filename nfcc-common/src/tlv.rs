// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Configuration TLV validation and SET_CONFIG encoding.
//!
//! A TLV buffer is a flat concatenation of `[type, length, value[length]]`
//! items. The whole buffer is rejected if any item is malformed; nothing is
//! ever sent for a partially valid buffer.

use crate::error::TlvError;
use crate::protocol::{oid, NciHeader, NciPacket, Payload, GID_CORE, NCI_MAX_PAYLOAD};

/// Largest TLV buffer that fits in one SET_CONFIG payload (one byte goes to the item count).
pub const MAX_TLV_BYTES: usize = NCI_MAX_PAYLOAD - 1;

const TLV_HDR_SIZE: usize = 2;

/// Walk the buffer and return the number of items.
pub fn validate(tlvs: &[u8]) -> Result<u8, TlvError> {
    if tlvs.is_empty() {
        return Err(TlvError::Empty);
    }
    if tlvs.len() > MAX_TLV_BYTES {
        return Err(TlvError::TooLong { len: tlvs.len() });
    }

    let mut offset = 0;
    let mut count: u8 = 0;
    while offset < tlvs.len() {
        let remaining = tlvs.len() - offset;
        if remaining < TLV_HDR_SIZE {
            return Err(TlvError::Truncated { offset });
        }
        let value_len = tlvs[offset + 1] as usize;
        if value_len > remaining - TLV_HDR_SIZE {
            return Err(TlvError::Overrun { offset });
        }
        offset += TLV_HDR_SIZE + value_len;
        count += 1;
    }

    Ok(count)
}

/// Build a CORE_SET_CONFIG command: `[item_count] ++ tlvs`.
pub fn encode_config(tlvs: &[u8]) -> Result<NciPacket, TlvError> {
    let count = validate(tlvs)?;

    let too_long = TlvError::TooLong { len: tlvs.len() };
    let mut payload = Payload::new();
    payload.push(count).map_err(|_| too_long)?;
    payload.extend_from_slice(tlvs).map_err(|_| too_long)?;

    Ok(NciPacket {
        header: NciHeader::command(GID_CORE, oid::CORE_SET_CONFIG),
        payload,
    })
}

/// Length-prefixed TLV blob as stored in board configuration:
/// `blob[0]` is the TLV byte count, the TLVs follow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigBlob<'a>(&'a [u8]);

impl<'a> ConfigBlob<'a> {
    pub const fn new(raw: &'a [u8]) -> Self {
        Self(raw)
    }

    /// A blob with declared size zero (or no bytes at all) means "nothing to send".
    pub fn is_present(&self) -> bool {
        self.declared_len() > 0
    }

    pub fn declared_len(&self) -> usize {
        self.0.first().copied().unwrap_or(0) as usize
    }

    /// The TLV bytes covered by the declared size.
    pub fn tlvs(&self) -> Result<&'a [u8], TlvError> {
        let declared = self.declared_len();
        self.0
            .get(1..1 + declared)
            .ok_or(TlvError::BlobShort {
                declared,
                available: self.0.len().saturating_sub(1),
            })
    }
}

/// Iterator over `(type, value)` items of an already validated buffer.
pub struct TlvIter<'a> {
    rest: &'a [u8],
}

impl<'a> TlvIter<'a> {
    pub fn new(tlvs: &'a [u8]) -> Result<Self, TlvError> {
        validate(tlvs)?;
        Ok(Self { rest: tlvs })
    }
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (&kind, rest) = self.rest.split_first()?;
        let (&len, rest) = rest.split_first()?;
        let (value, rest) = rest.split_at(len as usize);
        self.rest = rest;
        Some((kind, value))
    }
}
