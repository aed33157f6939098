// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use nfcc_common::{SnoozeMode, SnoozeRequest, WakePolarity};

use crate::commands;
use crate::profile::Profile;
use crate::session::Session;
use crate::transport::SerialLink;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "nfcc-ctl")]
#[command(about = "Bring-up and low-power control for NCI controllers")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyUSB0)
    #[arg(short, long)]
    pub port: String,

    /// Board profile (JSON)
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Override the profile's crystal frequency in kHz
    #[arg(long)]
    pub xtal_khz: Option<u32>,

    /// Skip the bring-up sequence before running the command
    #[arg(long)]
    pub no_init: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the bring-up sequence and print the chip identity
    Init,

    /// Bring up the controller and print its state as JSON
    Status,

    /// Send configuration TLVs (hex)
    SetConfig {
        #[arg(value_name = "TLVS")]
        tlvs: String,
    },

    /// Enable or disable the firmware FSM
    FwFsm {
        #[arg(value_enum)]
        state: Switch,
    },

    /// Select the snooze mode
    Snooze {
        #[arg(short, long, value_enum, default_value = "uart")]
        mode: SnoozeArg,

        /// Host idle threshold (100 ms units)
        #[arg(long, default_value = "1")]
        idle_host: u8,

        /// Controller idle threshold (100 ms units)
        #[arg(long, default_value = "1")]
        idle_chip: u8,

        /// Polarity of the controller's wake input
        #[arg(long, value_enum, default_value = "active-low")]
        nfc_wake: PolarityArg,

        /// Polarity of the host's wake input
        #[arg(long, value_enum, default_value = "active-low")]
        host_wake: PolarityArg,
    },

    /// Reset the controller again and read its patch version
    Reinit,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SnoozeArg {
    None,
    Uart,
    SpiI2c,
}

impl From<SnoozeArg> for SnoozeMode {
    fn from(arg: SnoozeArg) -> Self {
        match arg {
            SnoozeArg::None => SnoozeMode::None,
            SnoozeArg::Uart => SnoozeMode::Uart,
            SnoozeArg::SpiI2c => SnoozeMode::SpiI2c,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolarityArg {
    ActiveLow,
    ActiveHigh,
}

impl From<PolarityArg> for WakePolarity {
    fn from(arg: PolarityArg) -> Self {
        match arg {
            PolarityArg::ActiveLow => WakePolarity::ActiveLow,
            PolarityArg::ActiveHigh => WakePolarity::ActiveHigh,
        }
    }
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let mut profile = match &cli.profile {
        Some(path) => Profile::load(path)?,
        None => Profile::default(),
    };
    if let Some(khz) = cli.xtal_khz {
        profile.xtal_khz = khz;
    }

    let (link, wake) = SerialLink::open(&cli.port, profile.baud)?;
    let mut session = Session::new(profile.init_config(), link, wake);

    // reinit parks the controller before the config sequence itself
    if !cli.no_init && !matches!(cli.command, Commands::Reinit) {
        commands::bring_up(&mut session)?;
    }

    match cli.command {
        Commands::Init => commands::init_report(&mut session),
        Commands::Status => commands::status(&session),
        Commands::SetConfig { tlvs } => commands::set_config(&mut session, &tlvs),
        Commands::FwFsm { state } => {
            commands::fw_fsm(&mut session, matches!(state, Switch::On))
        }
        Commands::Snooze {
            mode,
            idle_host,
            idle_chip,
            nfc_wake,
            host_wake,
        } => commands::snooze(
            &mut session,
            SnoozeRequest {
                mode: mode.into(),
                idle_threshold_host: idle_host,
                idle_threshold_chip: idle_chip,
                nfc_wake_polarity: nfc_wake.into(),
                host_wake_polarity: host_wake.into(),
            },
        ),
        Commands::Reinit => commands::reinit(&mut session),
    }
}
