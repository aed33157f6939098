// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Board profile: the bring-up inputs of one board, loaded from JSON.
//!
//! Binary tables are hex strings:
//!
//! ```json
//! {
//!   "baud": 115200,
//!   "xtal_khz": 24000,
//!   "set_xtal_index": true,
//!   "lptd": "03280100",
//!   "startup_vsc": "042f100100",
//!   "fw_fsm_multi_tech_response": true
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

use nfcc_common::config::IDLE_TIMEOUT_MS;
use nfcc_common::window::COMMAND_TIMEOUT_MS;
use nfcc_common::DeviceInitConfig;

use crate::transport::DEFAULT_BAUD;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub baud: u32,
    pub xtal_khz: u32,
    pub set_xtal_index: bool,
    /// Length-prefixed LPTD TLV blob.
    #[serde(deserialize_with = "hex_opt")]
    pub lptd: Option<Vec<u8>>,
    /// Concatenated 16-byte PLL rows, one per crystal index.
    #[serde(deserialize_with = "hex_opt")]
    pub pll_table: Option<Vec<u8>>,
    /// Length-prefixed start-up TLV blob.
    #[serde(deserialize_with = "hex_opt")]
    pub startup: Option<Vec<u8>>,
    #[serde(deserialize_with = "hex_opt")]
    pub startup_vsc: Option<Vec<u8>>,
    pub proximity_rw_config: bool,
    pub fw_fsm_multi_tech_response: bool,
    pub command_timeout_ms: u32,
    pub idle_timeout_ms: u32,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            baud: DEFAULT_BAUD,
            xtal_khz: 19200,
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
}

impl Profile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid profile {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Borrowing view consumed by the controller.
    pub fn init_config(&self) -> DeviceInitConfig<'_> {
        let mut cfg = DeviceInitConfig::new()
            .with_xtal(self.xtal_khz, self.set_xtal_index)
            .with_proximity_rw_config(self.proximity_rw_config)
            .with_fw_fsm_multi_tech_response(self.fw_fsm_multi_tech_response)
            .with_timeouts(self.command_timeout_ms, self.idle_timeout_ms);
        if let Some(blob) = &self.lptd {
            cfg = cfg.with_lptd(blob);
        }
        if let Some(table) = &self.pll_table {
            cfg = cfg.with_pll_table(table);
        }
        if let Some(blob) = &self.startup {
            cfg = cfg.with_startup(blob);
        }
        if let Some(table) = &self.startup_vsc {
            cfg = cfg.with_startup_vsc(table);
        }
        cfg
    }
}

fn hex_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
    Option::<String>::deserialize(d)?
        .map(|s| hex::decode(s.replace(' ', "")).map_err(serde::de::Error::custom))
        .transpose()
}
