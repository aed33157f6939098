// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Bring-up and low-power control tool for NCI controllers on a serial port.
//!
//! Usage:
//!   nfcc-ctl --port /dev/ttyUSB0 init
//!   nfcc-ctl --port /dev/ttyUSB0 --profile board.json status
//!   nfcc-ctl --port /dev/ttyUSB0 set-config 280100
//!   nfcc-ctl --port /dev/ttyUSB0 snooze --mode uart

mod cli;
mod commands;
mod profile;
mod session;
mod transport;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    cli::run(args)
}
