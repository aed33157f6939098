// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for the effect-executing runtime against recording collaborators.

use std::cell::RefCell;
use std::rc::Rc;

use nfcc_common::{
    ClientToken, Device, DeviceInitConfig, HalError, HalStatus, Host, InitPhase, SnoozeMode,
    SnoozeRequest, TerminalEvent, TimerId, TimerService, TlvError, Transport, WakeLevel, WakeLine,
    WakePolarity,
};

/// Everything the collaborators observed, in order.
#[derive(Debug, Default)]
struct Bench {
    sent: Vec<Vec<u8>>,
    fail_next_send: bool,
    wake: Vec<WakeLevel>,
    armed: Vec<TimerId>,
    disarmed: Vec<TimerId>,
    terminal: Vec<(TerminalEvent, HalStatus)>,
    completes: Vec<(ClientToken, u8, Vec<u8>)>,
    statuses: Vec<(ClientToken, HalStatus)>,
    resets: Vec<(u8, u8)>,
    patch: Vec<(u8, Vec<u8>)>,
    chip: Option<(u32, u8)>,
}

type Shared = Rc<RefCell<Bench>>;

struct Wire(Shared);
struct Pin(Shared);
struct Timers(Shared);
struct Stack(Shared);

impl Transport for Wire {
    type Error = &'static str;

    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        let mut b = self.0.borrow_mut();
        if b.fail_next_send {
            b.fail_next_send = false;
            return Err("unplugged");
        }
        b.sent.push(frame.to_vec());
        Ok(())
    }
}

impl WakeLine for Pin {
    fn set(&mut self, level: WakeLevel) {
        self.0.borrow_mut().wake.push(level);
    }
}

impl TimerService for Timers {
    fn arm(&mut self, timer: TimerId, _timeout_ms: u32) {
        self.0.borrow_mut().armed.push(timer);
    }

    fn disarm(&mut self, timer: TimerId) {
        self.0.borrow_mut().disarmed.push(timer);
    }
}

impl Host for Stack {
    fn on_terminal_event(&mut self, event: TerminalEvent, status: HalStatus) {
        self.0.borrow_mut().terminal.push((event, status));
    }

    fn on_command_complete(&mut self, token: ClientToken, event: u8, payload: &[u8]) {
        self.0
            .borrow_mut()
            .completes
            .push((token, event, payload.to_vec()));
    }

    fn on_status(&mut self, token: ClientToken, status: HalStatus) {
        self.0.borrow_mut().statuses.push((token, status));
    }

    fn on_reset_notification(&mut self, reason: u8, kind: u8) {
        self.0.borrow_mut().resets.push((reason, kind));
    }

    fn on_patch_event(&mut self, event: u8, payload: &[u8]) {
        self.0.borrow_mut().patch.push((event, payload.to_vec()));
    }

    fn on_chip_identified(&mut self, hw_id: u32, nvm_type: u8) {
        self.0.borrow_mut().chip = Some((hw_id, nvm_type));
    }
}

type TestDevice = Device<'static, Wire, Pin, Timers, Stack>;

fn device(config: DeviceInitConfig<'static>) -> (TestDevice, Shared) {
    let bench = Shared::default();
    let dev = Device::new(
        config,
        Wire(bench.clone()),
        Pin(bench.clone()),
        Timers(bench.clone()),
        Stack(bench.clone()),
    );
    (dev, bench)
}

/// NCI response frame with the given group, opcode and payload.
fn nci_rsp(gid: u8, oid: u8, payload: &[u8]) -> Vec<u8> {
    let mut f = vec![0x10, 0x40 | gid, oid, payload.len() as u8];
    f.extend_from_slice(payload);
    f
}

fn build_info() -> Vec<u8> {
    let mut p = vec![0u8; 28];
    p[24..28].copy_from_slice(&0x1234_5678u32.to_le_bytes());
    nci_rsp(0x0F, 0x04, &p)
}

fn patch_version() -> Vec<u8> {
    let mut p = vec![0u8; 40];
    p[34] = 0x07;
    nci_rsp(0x0F, 0x2D, &p)
}

/// Drive the device to `WaitAppComplete`, feeding responses in small chunks.
fn identify(dev: &mut TestDevice) {
    dev.begin_initialization().unwrap();
    for rsp in [nci_rsp(0x00, 0x00, &[0x00]), build_info(), patch_version()] {
        for chunk in rsp.chunks(3) {
            dev.on_bytes(chunk);
        }
    }
    assert_eq!(dev.phase(), InitPhase::WaitAppComplete);
}

// =============================================================================
// Bring-up
// =============================================================================

#[test]
fn test_bring_up_over_bytes() {
    let (mut dev, bench) = device(DeviceInitConfig::new());
    identify(&mut dev);
    assert_eq!(bench.borrow().chip, Some((0x1234_5678, 0x07)));
    assert_eq!(dev.chip().hw_id, 0x1234_5678);

    dev.notify_init_done(HalStatus::Ok).unwrap();
    assert_eq!(
        bench.borrow().sent.last().unwrap(),
        &vec![0x10, 0x2F, 0x06, 0x01, 0x00]
    );

    dev.on_bytes(&nci_rsp(0x0F, 0x06, &[0x00]));
    assert_eq!(dev.phase(), InitPhase::Idle);

    let b = bench.borrow();
    assert_eq!(b.terminal, vec![(TerminalEvent::InitComplete, HalStatus::Ok)]);
    // reset, build info, patch version, fw fsm
    assert_eq!(b.sent.len(), 4);
    assert_eq!(b.armed.len(), 4);
    assert!(b.armed.iter().all(|t| *t == TimerId::CommandTimeout));
    assert_eq!(b.disarmed.len(), 4);
    assert!(b.wake.is_empty());
}

#[test]
fn test_send_failure_aborts_bring_up() {
    let (mut dev, bench) = device(DeviceInitConfig::new());
    bench.borrow_mut().fail_next_send = true;

    assert!(dev.begin_initialization().is_ok());
    assert_eq!(dev.phase(), InitPhase::Idle);
    assert!(dev.controller().window().is_free());

    let b = bench.borrow();
    assert!(b.sent.is_empty());
    assert_eq!(b.terminal, vec![(TerminalEvent::InitFailed, HalStatus::Failed)]);
    assert_eq!(b.disarmed.last(), Some(&TimerId::CommandTimeout));
}

#[test]
fn test_response_timeout_aborts_bring_up() {
    let (mut dev, bench) = device(DeviceInitConfig::new());
    dev.begin_initialization().unwrap();
    dev.on_timer_expired(TimerId::CommandTimeout);

    assert_eq!(dev.phase(), InitPhase::Idle);
    assert_eq!(
        bench.borrow().terminal,
        vec![(TerminalEvent::InitFailed, HalStatus::Failed)]
    );

    // the system can be brought up again afterwards
    assert!(dev.begin_initialization().is_ok());
    assert_eq!(dev.phase(), InitPhase::WaitReset);
}

#[test]
fn test_rejected_reset_aborts() {
    let (mut dev, bench) = device(DeviceInitConfig::new());
    dev.begin_initialization().unwrap();
    dev.on_bytes(&nci_rsp(0x00, 0x00, &[0x03]));
    assert_eq!(
        bench.borrow().terminal,
        vec![(TerminalEvent::InitFailed, HalStatus::Failed)]
    );
    assert_eq!(bench.borrow().sent.len(), 1);
}

// =============================================================================
// Unsolicited traffic
// =============================================================================

#[test]
fn test_reset_notification_reaches_host() {
    let (mut dev, bench) = device(DeviceInitConfig::new());
    identify(&mut dev);
    dev.on_bytes(&[0x10, 0x60, 0x00, 0x02, 0x02, 0x01]);
    assert_eq!(bench.borrow().resets, vec![(0x02, 0x01)]);
    assert_eq!(dev.phase(), InitPhase::WaitAppComplete);
}

#[test]
fn test_patch_auth_notification_goes_to_patch_owner() {
    let (mut dev, bench) = device(DeviceInitConfig::new());
    identify(&mut dev);
    dev.on_bytes(&[0x10, 0x6F, 0x2E, 0x01, 0x00]);
    assert_eq!(bench.borrow().patch, vec![(0xAE, vec![0x00])]);
}

#[test]
fn test_garbage_is_skipped() {
    let (mut dev, bench) = device(DeviceInitConfig::new());
    identify(&mut dev);
    let mut bytes = vec![0xFF, 0x33];
    bytes.extend_from_slice(&[0x10, 0x60, 0x00, 0x02, 0x00, 0x00]);
    dev.on_bytes(&bytes);
    assert_eq!(bench.borrow().resets, vec![(0x00, 0x00)]);
}

// =============================================================================
// Client commands
// =============================================================================

#[test]
fn test_submit_config_round_trip() {
    let (mut dev, bench) = device(DeviceInitConfig::new());
    dev.submit_config(&[0x28, 0x01, 0x00], 5).unwrap();
    assert_eq!(
        bench.borrow().sent[0],
        vec![0x10, 0x20, 0x02, 0x04, 0x01, 0x28, 0x01, 0x00]
    );

    dev.on_bytes(&nci_rsp(0x00, 0x02, &[0x00]));
    assert_eq!(bench.borrow().completes, vec![(5, 0x02, vec![0x00])]);
}

#[test]
fn test_submit_config_rejects_malformed_tlvs() {
    let (mut dev, bench) = device(DeviceInitConfig::new());
    assert_eq!(
        dev.submit_config(&[0x28, 0x05, 0x00], 5),
        Err(HalError::Tlv(TlvError::Overrun { offset: 0 }))
    );
    assert!(bench.borrow().sent.is_empty());
}

#[test]
fn test_reinit_patch_version_goes_to_client() {
    let (mut dev, bench) = device(DeviceInitConfig::new());
    identify(&mut dev);
    dev.begin_reinitialization(11).unwrap();
    dev.on_bytes(&nci_rsp(0x00, 0x00, &[0x00]));
    dev.on_bytes(&patch_version());

    let b = bench.borrow();
    assert_eq!(b.completes.len(), 1);
    assert_eq!(b.completes[0].0, 11);
    assert_eq!(b.completes[0].1, 0x6D);
    assert_eq!(b.completes[0].2[34], 0x07);
}

// =============================================================================
// Snooze
// =============================================================================

#[test]
fn test_snooze_round_trip_drives_wake_pin() {
    let (mut dev, bench) = device(DeviceInitConfig::new());
    let req = SnoozeRequest {
        mode: SnoozeMode::Uart,
        idle_threshold_host: 1,
        idle_threshold_chip: 1,
        nfc_wake_polarity: WakePolarity::ActiveHigh,
        host_wake_polarity: WakePolarity::ActiveHigh,
    };
    dev.request_snooze_mode(req, 3).unwrap();
    assert_eq!(
        bench.borrow().terminal,
        vec![(TerminalEvent::RequestControl, HalStatus::Ok)]
    );

    dev.grant_control().unwrap();
    assert_eq!(bench.borrow().sent[0][..4], [0x01, 0x27, 0xFC, 0x0C]);

    dev.on_bytes(&[0x04, 0x0E, 0x04, 0x01, 0x27, 0xFC, 0x00]);
    assert_eq!(bench.borrow().statuses, vec![(3, HalStatus::Ok)]);
    assert_eq!(bench.borrow().wake, vec![WakeLevel::High]);

    dev.on_timer_expired(TimerId::Idle);
    assert_eq!(bench.borrow().wake, vec![WakeLevel::High, WakeLevel::Low]);

    // the next command wakes the controller first
    dev.toggle_fw_fsm(true, 4).unwrap();
    assert_eq!(
        bench.borrow().wake,
        vec![WakeLevel::High, WakeLevel::Low, WakeLevel::High]
    );
}

// =============================================================================
// Shutdown
// =============================================================================

#[test]
fn test_shutdown_discards_partial_packet() {
    let (mut dev, bench) = device(DeviceInitConfig::new());
    identify(&mut dev);
    dev.on_bytes(&[0x10, 0x60, 0x00]);
    dev.shutdown();
    assert_eq!(dev.phase(), InitPhase::Closing);

    dev.on_bytes(&[0x10, 0x60, 0x00, 0x02, 0x01, 0x00]);
    assert_eq!(bench.borrow().resets, vec![(0x01, 0x00)]);
    let b = bench.borrow();
    assert!(b.disarmed.contains(&TimerId::XtalSettle));
    assert!(b.disarmed.contains(&TimerId::Idle));
}
