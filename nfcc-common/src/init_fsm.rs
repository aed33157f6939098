// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Bring-up sequencer.
//!
//! The stage selection is a pure function ([`next_config_step`]) over the
//! current stage and the board configuration, so the order of the config
//! sequence can be tested without a transport. The [`Controller`] methods
//! below apply a step: move the stage pointer, build the command and hand
//! it to the command window.

use serde::Serialize;

use crate::config::{DeviceInitConfig, PLL_ROW_LEN, PROXIMITY_RW_CFG, XTAL_SETTLE_MS};
use crate::controller::Controller;
use crate::effect::{ClientToken, Effect, Effects, TerminalEvent, TimerId};
use crate::error::{HalError, HalStatus};
use crate::protocol::{self, Command, NciPacket, NCI_STATUS_OK};
use crate::tlv::{encode_config, validate};
use crate::window::Continuation;

/// Offset of the first entry in a start-up VSC table (byte 0 is the size).
pub const VSC_FIRST_ENTRY: usize = 1;

/// Supported crystal frequencies in kHz, indexed by crystal index.
pub const XTAL_FREQS_KHZ: [u32; 9] = [
    9600, 13000, 16200, 19200, 24000, 26000, 38400, 52000, 37400,
];

/// Frequencies the controller handles without a crystal-index command.
const XTAL_NO_ADJUST_KHZ: [u32; 6] = [9600, 13000, 19200, 26000, 38400, 52000];

/// Crystal index lookup result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum XtalIndex {
    Index(u8),
    /// Frequency is not in the supported set.
    NoMatch,
}

impl XtalIndex {
    pub fn index(self) -> Option<u8> {
        match self {
            Self::Index(i) => Some(i),
            Self::NoMatch => None,
        }
    }
}

/// Exact-match lookup, no interpolation.
pub fn xtal_index(freq_khz: u32) -> XtalIndex {
    XTAL_FREQS_KHZ
        .iter()
        .position(|&f| f == freq_khz)
        .map_or(XtalIndex::NoMatch, |i| XtalIndex::Index(i as u8))
}

/// Whether the crystal must be selected explicitly before reset.
pub fn needs_xtal_command(freq_khz: u32) -> bool {
    !XTAL_NO_ADJUST_KHZ.contains(&freq_khz)
}

/// Bring-up phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum InitPhase {
    Idle,
    WaitXtalSet,
    WaitXtalSettle,
    WaitReset,
    WaitBuildInfo,
    WaitPatchInfo,
    /// Chip identified, patch download owned by the host.
    WaitAppComplete,
    WaitReinit,
    /// Config sequence running.
    WaitPostInit,
    WaitControlDone,
    Closing,
}

/// Config sequence stage pointer. Only moves forward within one sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum ConfigStage {
    Lptd,
    Pll,
    StartupConfig,
    ProximityRwConfig,
    FwFsm,
    StartupVsc,
    None,
}

/// The next command of the config sequence and the stage it leads to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigStep<'a> {
    SetConfig {
        tlvs: &'a [u8],
        next: ConfigStage,
    },
    FwFsm {
        enable: bool,
        next: ConfigStage,
    },
    Vsc {
        entry: &'a [u8],
        next_offset: usize,
        last: bool,
    },
    Complete,
}

/// Pick the first applicable stage at or after `stage`.
///
/// Assumes the tables passed [`validate_tables`]; a structural error found
/// here is still reported instead of sending a truncated command.
pub fn next_config_step<'a>(
    stage: ConfigStage,
    vsc_offset: usize,
    xtal: XtalIndex,
    cfg: &DeviceInitConfig<'a>,
) -> Result<ConfigStep<'a>, HalError> {
    if let Some(blob) = cfg.lptd.filter(|b| b.is_present()) {
        if stage <= ConfigStage::Lptd {
            return Ok(ConfigStep::SetConfig {
                tlvs: blob.tlvs()?,
                next: ConfigStage::Pll,
            });
        }
    }

    if let (Some(table), Some(index)) = (cfg.pll_table, xtal.index()) {
        if stage <= ConfigStage::Pll {
            return Ok(ConfigStep::SetConfig {
                tlvs: pll_row(table, index)?,
                next: ConfigStage::StartupConfig,
            });
        }
    }

    if let Some(blob) = cfg.startup.filter(|b| b.is_present()) {
        if stage <= ConfigStage::StartupConfig {
            return Ok(ConfigStep::SetConfig {
                tlvs: blob.tlvs()?,
                next: ConfigStage::ProximityRwConfig,
            });
        }
    }

    if cfg.proximity_rw_config && stage <= ConfigStage::ProximityRwConfig {
        return Ok(ConfigStep::SetConfig {
            tlvs: &PROXIMITY_RW_CFG,
            next: ConfigStage::FwFsm,
        });
    }

    if stage <= ConfigStage::FwFsm {
        return Ok(ConfigStep::FwFsm {
            enable: cfg.fw_fsm_multi_tech_response,
            next: ConfigStage::StartupVsc,
        });
    }

    if let Some(table) = cfg.startup_vsc.filter(|t| t.first().is_some_and(|&n| n > 0)) {
        if stage <= ConfigStage::StartupVsc {
            let (entry, next_offset, last) = vsc_entry(table, vsc_offset)?;
            return Ok(ConfigStep::Vsc {
                entry,
                next_offset,
                last,
            });
        }
    }

    Ok(ConfigStep::Complete)
}

/// Check every table the config sequence will send from: blob sizes and
/// their TLVs, the PLL row for `xtal`, and the whole VSC walk up to its
/// declared size.
pub fn validate_tables(cfg: &DeviceInitConfig<'_>, xtal: XtalIndex) -> Result<(), HalError> {
    for blob in [cfg.lptd, cfg.startup].into_iter().flatten() {
        if blob.is_present() {
            validate(blob.tlvs()?)?;
        }
    }

    if let (Some(table), Some(index)) = (cfg.pll_table, xtal.index()) {
        validate(pll_row(table, index)?)?;
    }

    if let Some(table) = cfg.startup_vsc.filter(|t| t.first().is_some_and(|&n| n > 0)) {
        let mut offset = VSC_FIRST_ENTRY;
        loop {
            let (_, next, last) = vsc_entry(table, offset)?;
            if last {
                break;
            }
            offset = next;
        }
    }

    Ok(())
}

/// TLV row for a crystal index.
pub fn pll_row(table: &[u8], index: u8) -> Result<&[u8], HalError> {
    let start = index as usize * PLL_ROW_LEN;
    table
        .get(start..start + PLL_ROW_LEN)
        .ok_or(HalError::BadPllTable)
}

/// Entry at `offset` of a VSC table: `(entry bytes, next offset, is last)`.
///
/// `table[0]` is the declared size of the entries that follow. An entry
/// whose bound runs past the declared size is rejected, never truncated.
pub fn vsc_entry(table: &[u8], offset: usize) -> Result<(&[u8], usize, bool), HalError> {
    let declared = *table.first().ok_or(HalError::BadVscTable)? as usize;
    if table.len() < declared + 1 {
        return Err(HalError::BadVscTable);
    }
    let len = *table.get(offset + 2).ok_or(HalError::BadVscTable)? as usize;
    // index of the last byte of this entry
    let end = offset + 2 + len;
    if end > declared {
        return Err(HalError::BadVscTable);
    }
    Ok((&table[offset..=end], end + 1, end == declared))
}

impl Controller<'_> {
    /// Start bring-up: optional crystal selection, then core reset.
    pub fn begin_initialization(&mut self, fx: &mut Effects) -> Result<(), HalError> {
        if !matches!(self.phase, InitPhase::Idle | InitPhase::Closing) {
            return Err(HalError::WrongState);
        }
        debug!("begin initialization");

        self.stage = ConfigStage::Lptd;
        self.vsc_offset = VSC_FIRST_ENTRY;
        self.xtal = xtal_index(self.config.xtal_freq_khz);
        self.set_xtal_index = self.config.set_xtal_index;

        if !self.set_xtal_index {
            self.send_reset(fx);
            return Ok(());
        }

        let freq = self.config.xtal_freq_khz;
        let Some(index) = self.xtal.index() else {
            error!("crystal frequency {} kHz has no index", freq);
            self.abort(fx);
            return Ok(());
        };

        if !needs_xtal_command(freq) {
            self.set_xtal_index = false;
            self.send_reset(fx);
            return Ok(());
        }

        // Every frequency needing the command fits in 16 bits.
        let freq = freq as u16;
        debug!("select crystal index {} for {} kHz", index, freq);
        self.phase = InitPhase::WaitXtalSet;
        self.sequencer_send(protocol::set_xtal_index(index, freq).into(), None, fx);
        Ok(())
    }

    /// Crystal selection acknowledged: let it settle, then reset.
    pub(crate) fn on_xtal_ack(&mut self, fx: &mut Effects) {
        self.phase = InitPhase::WaitXtalSettle;
        fx.push(Effect::ArmTimer {
            timer: TimerId::XtalSettle,
            timeout_ms: XTAL_SETTLE_MS,
        });
    }

    pub(crate) fn send_reset(&mut self, fx: &mut Effects) {
        self.phase = InitPhase::WaitReset;
        self.sequencer_send(protocol::core_reset().into(), None, fx);
    }

    /// The host finished its part of bring-up (patch download).
    pub fn notify_init_done(&mut self, status: HalStatus, fx: &mut Effects) -> Result<(), HalError> {
        if self.phase != InitPhase::WaitAppComplete {
            return Err(HalError::WrongState);
        }
        if !status.is_ok() {
            warn!("host reported init failure");
            self.abort(fx);
            return Ok(());
        }
        if let Err(e) = validate_tables(&self.config, self.xtal) {
            error!("board tables rejected: {:?}", e);
            self.abort(fx);
            return Ok(());
        }

        self.phase = InitPhase::WaitPostInit;
        self.stage = ConfigStage::Lptd;
        self.vsc_offset = VSC_FIRST_ENTRY;
        self.drive_config(fx);
        Ok(())
    }

    /// Reset the chip again and re-read its patch version. The patch
    /// version response goes to `token`.
    pub fn begin_reinitialization(
        &mut self,
        token: ClientToken,
        fx: &mut Effects,
    ) -> Result<(), HalError> {
        if self.phase != InitPhase::WaitAppComplete {
            return Err(HalError::WrongState);
        }
        self.phase = InitPhase::WaitReinit;
        self.reinit_token = Some(token);
        self.sequencer_send(protocol::core_reset().into(), None, fx);
        Ok(())
    }

    /// Run the first applicable config stage, or finish the sequence.
    pub(crate) fn drive_config(&mut self, fx: &mut Effects) {
        let step = match next_config_step(self.stage, self.vsc_offset, self.xtal, &self.config) {
            Ok(step) => step,
            Err(e) => {
                error!("config stage {:?}: {:?}", self.stage, e);
                self.abort(fx);
                return;
            }
        };
        trace!("config step at {:?}", self.stage);

        let cmd: Command = match step {
            ConfigStep::SetConfig { tlvs, next } => {
                self.stage = next;
                match encode_config(tlvs) {
                    Ok(pkt) => pkt.into(),
                    Err(e) => {
                        error!("config TLVs rejected: {:?}", e);
                        self.abort(fx);
                        return;
                    }
                }
            }
            ConfigStep::FwFsm { enable, next } => {
                self.stage = next;
                protocol::set_fw_fsm(enable).into()
            }
            ConfigStep::Vsc {
                entry,
                next_offset,
                last,
            } => {
                self.vsc_offset = next_offset;
                if last {
                    self.stage = ConfigStage::None;
                }
                match vsc_command(entry) {
                    Ok(pkt) => pkt.into(),
                    Err(e) => {
                        error!("start-up VSC at {}: {:?}", next_offset, e);
                        self.abort(fx);
                        return;
                    }
                }
            }
            ConfigStep::Complete => {
                self.finish(fx);
                return;
            }
        };

        self.sequencer_send(cmd, Some(Continuation::Sequencer), fx);
    }

    /// Response to a config stage command.
    pub(crate) fn on_config_response(&mut self, status: Option<u8>, fx: &mut Effects) {
        if self.phase != InitPhase::WaitPostInit {
            trace!("config response outside config sequence");
            return;
        }
        if status != Some(NCI_STATUS_OK) {
            error!("config stage {:?} rejected: {:?}", self.stage, status);
            self.abort(fx);
            return;
        }
        self.drive_config(fx);
    }

    fn finish(&mut self, fx: &mut Effects) {
        debug!("initialization complete");
        self.stage = ConfigStage::None;
        self.phase = InitPhase::Idle;
        fx.push(Effect::Terminal {
            event: TerminalEvent::InitComplete,
            status: HalStatus::Ok,
        });
    }

    /// Fatal failure during bring-up. No retry.
    pub(crate) fn abort(&mut self, fx: &mut Effects) {
        error!("initialization aborted in {:?}", self.phase);
        self.phase = InitPhase::Idle;
        self.stage = ConfigStage::Lptd;
        self.vsc_offset = VSC_FIRST_ENTRY;
        self.reinit_token = None;
        fx.push(Effect::Terminal {
            event: TerminalEvent::InitFailed,
            status: HalStatus::Failed,
        });
    }

    /// Issue a command on behalf of the sequencer; any failure is fatal.
    pub(crate) fn sequencer_send(
        &mut self,
        cmd: Command,
        continuation: Option<Continuation>,
        fx: &mut Effects,
    ) {
        if let Err(e) = self.transmit(&cmd, continuation, fx) {
            error!("sequencer send failed: {:?}", e);
            self.abort(fx);
        }
    }
}

/// VSC entries are raw NCI commands: header then length-prefixed payload.
fn vsc_command(entry: &[u8]) -> Result<NciPacket, HalError> {
    NciPacket::from_bytes(entry).map_err(|_| HalError::BadVscTable)
}
