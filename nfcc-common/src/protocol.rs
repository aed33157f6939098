// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! NCI and HCI wire types exchanged with the controller.
//!
//! NCI packets carry a three byte header:
//!
//! ```text
//! byte 0: MT (3 bits) | PBF (1 bit) | GID (4 bits)
//! byte 1: OID (6 bits)
//! byte 2: payload length
//! ```
//!
//! Sleep-mode configuration goes through a Bluetooth-style HCI vendor
//! command instead, answered by an HCI command-complete event. On the UART
//! every packet is prefixed with a packet-type byte (see [`packet_type`]).

use heapless::Vec;

use crate::error::HalError;

// --- Sizes ---

pub const NCI_MSG_HDR_SIZE: usize = 3;
pub const NCI_MAX_PAYLOAD: usize = 255;
pub const HCI_EVT_HDR_SIZE: usize = 2;

/// Packet type byte + NCI header + largest payload.
pub const MAX_FRAME_SIZE: usize = 1 + NCI_MSG_HDR_SIZE + NCI_MAX_PAYLOAD;

pub type Payload = Vec<u8, NCI_MAX_PAYLOAD>;
pub type Frame = Vec<u8, MAX_FRAME_SIZE>;

/// UART packet-type prefixes.
pub mod packet_type {
    pub const HCI_COMMAND: u8 = 0x01;
    pub const HCI_EVENT: u8 = 0x04;
    pub const NCI: u8 = 0x10;
}

// --- NCI groups and opcodes ---

pub const GID_CORE: u8 = 0x00;
pub const GID_PROP: u8 = 0x0F;

const GID_MASK: u8 = 0x0F;
const OID_MASK: u8 = 0x3F;
const MT_SHIFT: u8 = 5;

/// Opcodes used during bring-up.
pub mod oid {
    pub const CORE_RESET: u8 = 0x00;
    pub const CORE_SET_CONFIG: u8 = 0x02;

    pub const GET_BUILD_INFO: u8 = 0x04;
    pub const SET_FWFSM: u8 = 0x06;
    pub const GET_XTAL_INDEX_FROM_DH: u8 = 0x1D;
    pub const GET_PATCH_VERSION: u8 = 0x2D;
    pub const SECURE_PATCH_DOWNLOAD: u8 = 0x2E;
}

/// Proprietary event codes are the OID tagged with a response or notification bit.
pub const NCI_RSP_BIT: u8 = 0x40;
pub const NCI_NTF_BIT: u8 = 0x80;

pub const EVT_XTAL_INDEX: u8 = NCI_RSP_BIT | oid::GET_XTAL_INDEX_FROM_DH;
pub const EVT_GET_BUILD_INFO: u8 = NCI_RSP_BIT | oid::GET_BUILD_INFO;
pub const EVT_GET_PATCH_VERSION: u8 = NCI_RSP_BIT | oid::GET_PATCH_VERSION;
pub const EVT_SEC_PATCH_AUTH: u8 = NCI_NTF_BIT | oid::SECURE_PATCH_DOWNLOAD;

pub const NCI_STATUS_OK: u8 = 0x00;

/// CORE_RESET parameter: reset and keep configuration.
pub const RESET_TYPE_KEEP_CONFIG: u8 = 0x01;

// --- HCI ---

pub const HCI_WRITE_SLEEP_MODE: u16 = 0xFC27;
pub const HCI_WRITE_SLEEP_MODE_LEN: usize = 12;
pub const HCI_EVT_COMMAND_COMPLETE: u8 = 0x0E;
pub const HCI_SUCCESS: u8 = 0x00;

// --- Headers ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageType {
    Data,
    Command,
    Response,
    Notification,
}

impl MessageType {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Data),
            1 => Some(Self::Command),
            2 => Some(Self::Response),
            3 => Some(Self::Notification),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::Data => 0,
            Self::Command => 1,
            Self::Response => 2,
            Self::Notification => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NciHeader {
    pub mt: MessageType,
    pub gid: u8,
    pub oid: u8,
}

impl NciHeader {
    pub const fn new(mt: MessageType, gid: u8, oid: u8) -> Self {
        Self { mt, gid, oid }
    }

    pub const fn command(gid: u8, oid: u8) -> Self {
        Self::new(MessageType::Command, gid, oid)
    }

    /// First two header bytes (the length byte is added by the packet).
    pub fn to_bytes(self) -> [u8; 2] {
        [
            (self.mt.bits() << MT_SHIFT) | (self.gid & GID_MASK),
            self.oid & OID_MASK,
        ]
    }

    pub fn parse(b0: u8, b1: u8) -> Option<Self> {
        let mt = MessageType::from_bits(b0 >> MT_SHIFT)?;
        Some(Self {
            mt,
            gid: b0 & GID_MASK,
            oid: b1 & OID_MASK,
        })
    }
}

/// Identity of the command occupying the window, used to recognise its response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SentHeader {
    Nci { gid: u8, oid: u8 },
    Hci { opcode: u16 },
}

// --- Packets ---

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NciPacket {
    pub header: NciHeader,
    pub payload: Payload,
}

impl NciPacket {
    pub fn new(header: NciHeader, payload: &[u8]) -> Result<Self, HalError> {
        let payload = Payload::from_slice(payload).map_err(|_| HalError::FrameTooLong)?;
        Ok(Self { header, payload })
    }

    pub fn command(gid: u8, oid: u8, payload: &[u8]) -> Result<Self, HalError> {
        Self::new(NciHeader::command(gid, oid), payload)
    }

    /// Parse header + payload (no packet-type prefix). Trailing bytes beyond
    /// the declared length are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < NCI_MSG_HDR_SIZE {
            return Err(FrameError::Short);
        }
        let header = NciHeader::parse(bytes[0], bytes[1]).ok_or(FrameError::BadHeader)?;
        let len = bytes[2] as usize;
        if bytes.len() != NCI_MSG_HDR_SIZE + len {
            return Err(FrameError::LengthMismatch);
        }
        let payload =
            Payload::from_slice(&bytes[NCI_MSG_HDR_SIZE..]).map_err(|_| FrameError::Short)?;
        Ok(Self { header, payload })
    }

    /// Event code handed to callbacks: bare OID for the core group, OID
    /// tagged with the response/notification bit for the proprietary group.
    pub fn event_code(&self) -> u8 {
        if self.header.gid != GID_PROP {
            return self.header.oid;
        }
        match self.header.mt {
            MessageType::Notification => self.header.oid | NCI_NTF_BIT,
            _ => self.header.oid | NCI_RSP_BIT,
        }
    }

    /// First payload byte of a response (NCI status).
    pub fn status(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    pub fn is_response(&self) -> bool {
        self.header.mt == MessageType::Response
    }

    pub fn sent_header(&self) -> SentHeader {
        SentHeader::Nci {
            gid: self.header.gid,
            oid: self.header.oid,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HciCommand {
    pub opcode: u16,
    pub params: Payload,
}

/// HCI command-complete event. `params` holds the return parameters,
/// starting with the status byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandComplete {
    pub opcode: u16,
    pub params: Payload,
}

impl CommandComplete {
    pub fn status(&self) -> Option<u8> {
        self.params.first().copied()
    }
}

/// Outgoing command of either flavour.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Nci(NciPacket),
    Hci(HciCommand),
}

impl Command {
    pub fn sent_header(&self) -> SentHeader {
        match self {
            Self::Nci(pkt) => pkt.sent_header(),
            Self::Hci(cmd) => SentHeader::Hci { opcode: cmd.opcode },
        }
    }

    /// Serialize with the UART packet-type prefix.
    pub fn to_frame(&self) -> Result<Frame, HalError> {
        let mut frame = Frame::new();
        let res = match self {
            Self::Nci(pkt) => {
                let [b0, b1] = pkt.header.to_bytes();
                frame
                    .extend_from_slice(&[packet_type::NCI, b0, b1, pkt.payload.len() as u8])
                    .and_then(|_| frame.extend_from_slice(&pkt.payload))
            }
            Self::Hci(cmd) => {
                let [lo, hi] = cmd.opcode.to_le_bytes();
                frame
                    .extend_from_slice(&[packet_type::HCI_COMMAND, lo, hi, cmd.params.len() as u8])
                    .and_then(|_| frame.extend_from_slice(&cmd.params))
            }
        };
        res.map_err(|_| HalError::FrameTooLong)?;
        Ok(frame)
    }
}

impl From<NciPacket> for Command {
    fn from(pkt: NciPacket) -> Self {
        Self::Nci(pkt)
    }
}

impl From<HciCommand> for Command {
    fn from(cmd: HciCommand) -> Self {
        Self::Hci(cmd)
    }
}

/// Inbound traffic after framing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    Nci(NciPacket),
    CommandComplete(CommandComplete),
    /// Any other HCI event; not used during bring-up.
    HciEvent { code: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    Short,
    BadHeader,
    LengthMismatch,
    UnknownPacketType(u8),
    Overflow,
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Short => write!(f, "packet too short"),
            Self::BadHeader => write!(f, "bad packet header"),
            Self::LengthMismatch => write!(f, "length byte does not match packet size"),
            Self::UnknownPacketType(t) => write!(f, "unknown packet type {:#x}", t),
            Self::Overflow => write!(f, "packet exceeds buffer"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameError {}

impl Inbound {
    /// Parse one complete UART packet including its packet-type prefix.
    pub fn parse(frame: &[u8]) -> Result<Self, FrameError> {
        let (&kind, rest) = frame.split_first().ok_or(FrameError::Short)?;
        match kind {
            packet_type::NCI => NciPacket::from_bytes(rest).map(Self::Nci),
            packet_type::HCI_EVENT => parse_hci_event(rest),
            other => Err(FrameError::UnknownPacketType(other)),
        }
    }
}

fn parse_hci_event(bytes: &[u8]) -> Result<Inbound, FrameError> {
    if bytes.len() < HCI_EVT_HDR_SIZE {
        return Err(FrameError::Short);
    }
    let code = bytes[0];
    let len = bytes[1] as usize;
    let params = &bytes[HCI_EVT_HDR_SIZE..];
    if params.len() != len {
        return Err(FrameError::LengthMismatch);
    }
    if code != HCI_EVT_COMMAND_COMPLETE {
        return Ok(Inbound::HciEvent { code });
    }
    // num_packets (1) + opcode (2) precede the return parameters
    if params.len() < 3 {
        return Err(FrameError::Short);
    }
    let opcode = u16::from_le_bytes([params[1], params[2]]);
    let params = Payload::from_slice(&params[3..]).map_err(|_| FrameError::Overflow)?;
    Ok(Inbound::CommandComplete(CommandComplete { opcode, params }))
}

// --- Canned commands ---

pub fn core_reset() -> NciPacket {
    fixed_command(GID_CORE, oid::CORE_RESET, &[RESET_TYPE_KEEP_CONFIG])
}

pub fn get_build_info() -> NciPacket {
    fixed_command(GID_PROP, oid::GET_BUILD_INFO, &[])
}

pub fn get_patch_version() -> NciPacket {
    fixed_command(GID_PROP, oid::GET_PATCH_VERSION, &[])
}

pub fn set_fw_fsm(enable: bool) -> NciPacket {
    fixed_command(GID_PROP, oid::SET_FWFSM, &[enable as u8])
}

/// Crystal selection: `[index, freq_khz LE16]`.
pub fn set_xtal_index(index: u8, freq_khz: u16) -> NciPacket {
    let [lo, hi] = freq_khz.to_le_bytes();
    fixed_command(GID_PROP, oid::GET_XTAL_INDEX_FROM_DH, &[index, lo, hi])
}

// Fixed payloads are far below the packet limit.
fn fixed_command(gid: u8, oid: u8, payload: &[u8]) -> NciPacket {
    NciPacket {
        header: NciHeader::command(gid, oid),
        payload: Payload::from_slice(payload).unwrap_or_default(),
    }
}

// --- Response decoders ---

/// GET_BUILD_INFO response.
///
/// ```text
/// payload[0]       status
/// payload[1..24]   build strings and versions (not interpreted)
/// payload[24..28]  hardware id, little endian
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BuildInfo {
    pub hw_id: u32,
}

impl BuildInfo {
    pub const HW_ID_OFFSET: usize = 24;

    pub fn decode(payload: &[u8]) -> Option<Self> {
        let raw = payload.get(Self::HW_ID_OFFSET..Self::HW_ID_OFFSET + 4)?;
        Some(Self {
            hw_id: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
        })
    }
}

/// GET_PATCH_VERSION response.
///
/// ```text
/// payload[0]       status
/// payload[1..34]   patch/project versions and sizes (not interpreted)
/// payload[34]      NVM type
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PatchInfo {
    pub nvm_type: u8,
}

impl PatchInfo {
    pub const NVM_TYPE_OFFSET: usize = 34;

    pub fn decode(payload: &[u8]) -> Option<Self> {
        payload
            .get(Self::NVM_TYPE_OFFSET)
            .map(|&nvm_type| Self { nvm_type })
    }
}

/// CORE_RESET notification: `[reason, config status]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResetNotification {
    pub reason: u8,
    pub kind: u8,
}

impl ResetNotification {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        match payload {
            [reason, kind, ..] => Some(Self {
                reason: *reason,
                kind: *kind,
            }),
            _ => None,
        }
    }
}
