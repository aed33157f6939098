// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Board configuration consumed by the bring-up sequence.

use crate::tlv::ConfigBlob;
use crate::window::COMMAND_TIMEOUT_MS;

/// Idle period after the last transfer before the wake line is released.
pub const IDLE_TIMEOUT_MS: u32 = 100;

/// Delay between the crystal-index acknowledgement and the core reset.
pub const XTAL_SETTLE_MS: u32 = 100;

/// Bytes per crystal row in the PLL table.
pub const PLL_ROW_LEN: usize = 16;

/// Proximity read/write config item: data-rate flag, AFI, smart poll.
pub const PROXIMITY_RW_CFG: [u8; 5] = [0xB9, 0x03, 0x02, 0x00, 0x01];

/// Board-specific inputs of the bring-up sequence.
///
/// Blobs are borrowed so that a firmware image can keep them in flash.
#[derive(Clone, Copy, Debug)]
pub struct DeviceInitConfig<'a> {
    pub xtal_freq_khz: u32,
    /// Select the crystal index with a proprietary command before reset.
    pub set_xtal_index: bool,
    pub lptd: Option<ConfigBlob<'a>>,
    /// Rows of [`PLL_ROW_LEN`] TLV bytes, one per crystal index.
    pub pll_table: Option<&'a [u8]>,
    pub startup: Option<ConfigBlob<'a>>,
    /// Vendor start-up commands: `[total_len, entries...]`, each entry
    /// `[hdr0, hdr1, len, payload[len]]`.
    pub startup_vsc: Option<&'a [u8]>,
    pub proximity_rw_config: bool,
    pub fw_fsm_multi_tech_response: bool,
    pub command_timeout_ms: u32,
    pub idle_timeout_ms: u32,
}

impl<'a> DeviceInitConfig<'a> {
    pub const fn new() -> Self {
        Self {
            xtal_freq_khz: 0,
            set_xtal_index: false,
            lptd: None,
            pll_table: None,
            startup: None,
            startup_vsc: None,
            proximity_rw_config: false,
            fw_fsm_multi_tech_response: false,
            command_timeout_ms: COMMAND_TIMEOUT_MS,
            idle_timeout_ms: IDLE_TIMEOUT_MS,
        }
    }

    pub const fn with_xtal(mut self, freq_khz: u32, set_index: bool) -> Self {
        self.xtal_freq_khz = freq_khz;
        self.set_xtal_index = set_index;
        self
    }

    pub const fn with_lptd(mut self, blob: &'a [u8]) -> Self {
        self.lptd = Some(ConfigBlob::new(blob));
        self
    }

    pub const fn with_pll_table(mut self, table: &'a [u8]) -> Self {
        self.pll_table = Some(table);
        self
    }

    pub const fn with_startup(mut self, blob: &'a [u8]) -> Self {
        self.startup = Some(ConfigBlob::new(blob));
        self
    }

    pub const fn with_startup_vsc(mut self, table: &'a [u8]) -> Self {
        self.startup_vsc = Some(table);
        self
    }

    pub const fn with_proximity_rw_config(mut self, enable: bool) -> Self {
        self.proximity_rw_config = enable;
        self
    }

    pub const fn with_fw_fsm_multi_tech_response(mut self, enable: bool) -> Self {
        self.fw_fsm_multi_tech_response = enable;
        self
    }

    pub const fn with_timeouts(mut self, command_ms: u32, idle_ms: u32) -> Self {
        self.command_timeout_ms = command_ms;
        self.idle_timeout_ms = idle_ms;
        self
    }
}

impl Default for DeviceInitConfig<'_> {
    fn default() -> Self {
        Self::new()
    }
}
