// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for controller operations.

use std::time::Duration;

use anyhow::{bail, Context, Result};

use nfcc_common::protocol::{PatchInfo, NCI_STATUS_OK};
use nfcc_common::tlv::TlvIter;
use nfcc_common::{ClientToken, HalStatus, InitPhase, SnoozeRequest, TerminalEvent};

use crate::session::Session;

/// Upper bound for reset, identification and the config sequence.
const BRING_UP_LIMIT: Duration = Duration::from_secs(15);
/// Upper bound for a single client command.
const COMMAND_LIMIT: Duration = Duration::from_secs(5);

/// Reset and identify the controller; leaves it waiting for the host's
/// part of bring-up.
fn identify(session: &mut Session) -> Result<()> {
    session
        .dev
        .begin_initialization()
        .context("Failed to start bring-up")?;
    session.pump_until("chip identification", BRING_UP_LIMIT, |s| {
        s.dev.phase() == InitPhase::WaitAppComplete || s.outcome().terminal.is_some()
    })?;

    if let Some((event, status)) = session.outcome().terminal {
        bail!("Bring-up failed: {:?} ({:?})", event, status);
    }
    Ok(())
}

/// Full bring-up. This tool carries no patch image, so the host side is
/// reported done as soon as the chip is identified.
pub fn bring_up(session: &mut Session) -> Result<()> {
    identify(session)?;
    session
        .dev
        .notify_init_done(HalStatus::Ok)
        .context("Failed to start configuration")?;
    session.pump_until("configuration", BRING_UP_LIMIT, |s| {
        s.outcome().terminal.is_some()
    })?;

    match session.outcome().terminal {
        Some((TerminalEvent::InitComplete, HalStatus::Ok)) => Ok(()),
        other => bail!("Configuration failed: {:?}", other),
    }
}

/// Wait for the response to a client command and return it.
fn await_response(session: &mut Session, token: ClientToken, what: &str) -> Result<(u8, Vec<u8>)> {
    session.pump_until(what, COMMAND_LIMIT, |s| s.outcome().completion(token).is_some())?;
    match session.outcome().completion(token) {
        Some((_, event, payload)) => Ok((*event, payload.clone())),
        None => bail!("No response to {}", what),
    }
}

fn check_status(what: &str, payload: &[u8]) -> Result<()> {
    match payload.first() {
        Some(&NCI_STATUS_OK) => Ok(()),
        Some(status) => bail!("{} failed: status {:#04x}", what, status),
        None => bail!("{} failed: empty response", what),
    }
}

/// Print the chip identity learned during bring-up.
pub fn init_report(session: &mut Session) -> Result<()> {
    let chip = session.dev.chip();
    let snap = session.dev.snapshot();

    println!("Controller ready on {}", session.port_name());
    println!("  HW id:    {:#010x}", chip.hw_id);
    println!("  NVM type: {:#04x}", chip.nvm_type);
    println!(
        "  Crystal:  {:?}{}",
        snap.xtal,
        if snap.set_xtal_index { " (selected)" } else { "" }
    );
    Ok(())
}

/// Print the controller state as JSON.
pub fn status(session: &Session) -> Result<()> {
    let json = serde_json::to_string_pretty(&session.dev.snapshot())?;
    println!("{}", json);
    Ok(())
}

/// Send configuration TLVs given as hex.
pub fn set_config(session: &mut Session, tlvs_hex: &str) -> Result<()> {
    let tlvs = hex::decode(tlvs_hex.replace(' ', ""))
        .with_context(|| format!("Invalid hex TLVs: {}", tlvs_hex))?;
    for (kind, value) in TlvIter::new(&tlvs).context("Malformed TLVs")? {
        log::debug!("  {:#04x} = {}", kind, hex::encode(value));
    }

    let token = session.token();
    session
        .dev
        .submit_config(&tlvs, token)
        .context("SET_CONFIG not sent")?;
    let (_, payload) = await_response(session, token, "SET_CONFIG")?;
    check_status("SET_CONFIG", &payload)?;

    println!("Configuration applied ({} bytes).", tlvs.len());
    Ok(())
}

/// Enable or disable the firmware FSM.
pub fn fw_fsm(session: &mut Session, enable: bool) -> Result<()> {
    let token = session.token();
    session
        .dev
        .toggle_fw_fsm(enable, token)
        .context("SET_FWFSM not sent")?;
    let (_, payload) = await_response(session, token, "SET_FWFSM")?;
    check_status("SET_FWFSM", &payload)?;

    println!("Firmware FSM {}.", if enable { "enabled" } else { "disabled" });
    Ok(())
}

/// Select a snooze mode. The tool owns the bus, so a control request is
/// granted immediately.
pub fn snooze(session: &mut Session, req: SnoozeRequest) -> Result<()> {
    let token = session.token();
    session
        .dev
        .request_snooze_mode(req, token)
        .context("Sleep mode command not sent")?;

    if session.dev.phase() == InitPhase::WaitControlDone {
        session
            .dev
            .grant_control()
            .context("Held sleep mode command not sent")?;
    }

    session.pump_until("sleep mode", COMMAND_LIMIT, |s| {
        s.outcome().status(token).is_some()
    })?;

    match session.outcome().status(token) {
        Some(HalStatus::Ok) => {
            let snap = session.dev.snapshot();
            println!("Snooze mode now {:?}.", snap.snooze_mode);
            Ok(())
        }
        other => bail!("Snooze mode change failed: {:?}", other),
    }
}

/// Reset the controller again after identification and read its patch
/// version through a client token.
pub fn reinit(session: &mut Session) -> Result<()> {
    identify(session)?;

    let token = session.token();
    session
        .dev
        .begin_reinitialization(token)
        .context("Failed to start re-initialization")?;
    let (event, payload) = await_response(session, token, "patch version")?;

    println!("Patch version response ({:#04x}): {}", event, hex::encode(&payload));
    if let Some(info) = PatchInfo::decode(&payload) {
        println!("  NVM type: {:#04x}", info.nvm_type);
    }
    Ok(())
}
