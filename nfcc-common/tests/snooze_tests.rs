// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for snooze mode, wake line levels and power mode gating.

use nfcc_common::protocol::{CommandComplete, Inbound, Payload, HCI_WRITE_SLEEP_MODE};
use nfcc_common::snooze::{wake_level, Activity, LowPower, WakeAction};
use nfcc_common::{
    Controller, DeviceInitConfig, Effect, Effects, HalError, HalStatus, InitPhase, PowerMode,
    SnoozeMode, SnoozeRequest, TerminalEvent, TimerId, WakeLevel, WakePolarity,
};

fn request(mode: SnoozeMode, polarity: WakePolarity) -> SnoozeRequest {
    SnoozeRequest {
        mode,
        idle_threshold_host: 5,
        idle_threshold_chip: 3,
        nfc_wake_polarity: polarity,
        host_wake_polarity: WakePolarity::ActiveLow,
    }
}

fn command_complete(status: u8) -> Inbound {
    Inbound::CommandComplete(CommandComplete {
        opcode: HCI_WRITE_SLEEP_MODE,
        params: Payload::from_slice(&[status]).unwrap(),
    })
}

fn uart_snooze(polarity: WakePolarity) -> LowPower {
    let mut lp = LowPower::new(100);
    lp.snooze_mode = SnoozeMode::Uart;
    lp.polarity = polarity;
    lp
}

/// Hold, grant and complete a snooze request; returns the controller
/// with the mode committed.
fn enter_snooze(ctrl: &mut Controller<'_>, mode: SnoozeMode, polarity: WakePolarity) {
    let mut fx = Effects::new();
    ctrl.request_snooze_mode(request(mode, polarity), 1, &mut fx)
        .unwrap();
    let mut fx = Effects::new();
    ctrl.grant_control(&mut fx).unwrap();
    let mut fx = Effects::new();
    ctrl.on_inbound(&command_complete(0x00), &mut fx);
    assert_eq!(ctrl.low_power().snooze_mode, mode);
}

// =============================================================================
// Wake levels
// =============================================================================

#[test]
fn test_wake_level_truth_table() {
    use WakeAction::*;
    use WakePolarity::*;
    assert_eq!(wake_level(Assert, ActiveLow), WakeLevel::Low);
    assert_eq!(wake_level(Deassert, ActiveLow), WakeLevel::High);
    assert_eq!(wake_level(Assert, ActiveHigh), WakeLevel::High);
    assert_eq!(wake_level(Deassert, ActiveHigh), WakeLevel::Low);
}

#[test]
fn test_write_sleep_mode_params() {
    let cmd = request(SnoozeMode::SpiI2c, WakePolarity::ActiveHigh).write_sleep_mode();
    assert_eq!(cmd.opcode, HCI_WRITE_SLEEP_MODE);
    assert_eq!(
        &cmd.params[..],
        &[0x08, 5, 3, 1, 0, 0, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn test_write_sleep_mode_none() {
    let cmd = request(SnoozeMode::None, WakePolarity::ActiveLow).write_sleep_mode();
    assert_eq!(cmd.params[0], 0x00);
    assert_eq!(cmd.params.len(), 12);
}

// =============================================================================
// Idle timer
// =============================================================================

#[test]
fn test_first_activity_asserts_and_arms() {
    let mut lp = uart_snooze(WakePolarity::ActiveLow);
    let mut fx = Effects::new();
    assert!(lp.on_activity(Activity::Tx, &mut fx));
    assert_eq!(
        fx.as_slice(),
        &[
            Effect::SetWake(WakeLevel::Low),
            Effect::ArmTimer {
                timer: TimerId::Idle,
                timeout_ms: 100
            },
        ]
    );
    assert!(lp.idle_armed);
}

#[test]
fn test_activity_while_armed_only_extends() {
    let mut lp = uart_snooze(WakePolarity::ActiveLow);
    let mut fx = Effects::new();
    lp.on_activity(Activity::Tx, &mut fx);

    let mut fx = Effects::new();
    lp.on_activity(Activity::Rx, &mut fx);
    assert_eq!(
        fx.as_slice(),
        &[Effect::ArmTimer {
            timer: TimerId::Idle,
            timeout_ms: 100
        }]
    );
}

#[test]
fn test_idle_timeout_deasserts() {
    let mut lp = uart_snooze(WakePolarity::ActiveHigh);
    let mut fx = Effects::new();
    lp.on_activity(Activity::Tx, &mut fx);
    assert_eq!(fx.as_slice()[0], Effect::SetWake(WakeLevel::High));

    let mut fx = Effects::new();
    lp.on_activity(Activity::IdleTimeout, &mut fx);
    assert_eq!(fx.as_slice(), &[Effect::SetWake(WakeLevel::Low)]);
    assert!(!lp.idle_armed);

    // next transfer wakes the controller again
    let mut fx = Effects::new();
    lp.on_activity(Activity::Tx, &mut fx);
    assert_eq!(fx.as_slice()[0], Effect::SetWake(WakeLevel::High));
}

#[test]
fn test_no_snooze_means_no_wake_traffic() {
    let mut lp = LowPower::new(100);
    let mut fx = Effects::new();
    assert!(lp.on_activity(Activity::Tx, &mut fx));
    assert!(fx.is_empty());
}

#[test]
fn test_low_power_refuses_traffic() {
    let mut lp = uart_snooze(WakePolarity::ActiveLow);
    lp.power_mode = PowerMode::Low;
    let mut fx = Effects::new();
    assert!(!lp.on_activity(Activity::Tx, &mut fx));
    assert!(fx.is_empty());
}

// =============================================================================
// Snooze requests
// =============================================================================

#[test]
fn test_request_in_idle_holds_and_requests_control() {
    let mut ctrl = Controller::new(DeviceInitConfig::new());
    let mut fx = Effects::new();
    ctrl.request_snooze_mode(request(SnoozeMode::Uart, WakePolarity::ActiveLow), 4, &mut fx)
        .unwrap();

    assert_eq!(fx.transmitted().count(), 0);
    assert_eq!(
        fx.as_slice(),
        &[Effect::Terminal {
            event: TerminalEvent::RequestControl,
            status: HalStatus::Ok
        }]
    );
    assert_eq!(ctrl.phase(), InitPhase::WaitControlDone);
    let snap = ctrl.snapshot();
    assert!(snap.pending_command);
    assert_eq!(snap.pending_snooze_mode, SnoozeMode::Uart);
    assert_eq!(snap.snooze_mode, SnoozeMode::None);
}

#[test]
fn test_grant_sends_held_command() {
    let mut ctrl = Controller::new(DeviceInitConfig::new());
    let mut fx = Effects::new();
    ctrl.request_snooze_mode(request(SnoozeMode::Uart, WakePolarity::ActiveLow), 4, &mut fx)
        .unwrap();

    let mut fx = Effects::new();
    ctrl.grant_control(&mut fx).unwrap();
    assert_eq!(ctrl.phase(), InitPhase::Idle);
    let frames: Vec<_> = fx.transmitted().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(&frames[0][..5], &[0x01, 0x27, 0xFC, 0x0C, 0x01]);
    assert!(!ctrl.snapshot().pending_command);
}

#[test]
fn test_grant_without_request_is_wrong_state() {
    let mut ctrl = Controller::new(DeviceInitConfig::new());
    let mut fx = Effects::new();
    assert_eq!(ctrl.grant_control(&mut fx), Err(HalError::WrongState));
}

#[test]
fn test_success_commits_mode_and_reports() {
    let mut ctrl = Controller::new(DeviceInitConfig::new());
    let mut fx = Effects::new();
    ctrl.request_snooze_mode(request(SnoozeMode::SpiI2c, WakePolarity::ActiveHigh), 4, &mut fx)
        .unwrap();
    let mut fx = Effects::new();
    ctrl.grant_control(&mut fx).unwrap();

    let mut fx = Effects::new();
    ctrl.on_inbound(&command_complete(0x00), &mut fx);
    assert_eq!(ctrl.low_power().snooze_mode, SnoozeMode::SpiI2c);
    assert!(fx.iter().any(|e| *e == Effect::SetWake(WakeLevel::High)));
    assert!(fx.iter().any(|e| *e
        == Effect::ArmTimer {
            timer: TimerId::Idle,
            timeout_ms: 100
        }));
    assert!(fx.iter().any(|e| *e
        == Effect::Status {
            token: 4,
            status: HalStatus::Ok
        }));
}

#[test]
fn test_rejected_sleep_mode_keeps_previous_mode() {
    let mut ctrl = Controller::new(DeviceInitConfig::new());
    let mut fx = Effects::new();
    ctrl.request_snooze_mode(request(SnoozeMode::Uart, WakePolarity::ActiveLow), 4, &mut fx)
        .unwrap();
    let mut fx = Effects::new();
    ctrl.grant_control(&mut fx).unwrap();

    let mut fx = Effects::new();
    ctrl.on_inbound(&command_complete(0x0C), &mut fx);
    assert_eq!(ctrl.low_power().snooze_mode, SnoozeMode::None);
    assert_eq!(
        fx.as_slice(),
        &[Effect::DisarmTimer(TimerId::CommandTimeout), Effect::Status {
            token: 4,
            status: HalStatus::Failed
        }]
    );
}

#[test]
fn test_leaving_snooze_disarms_idle_timer() {
    let mut ctrl = Controller::new(DeviceInitConfig::new());
    enter_snooze(&mut ctrl, SnoozeMode::Uart, WakePolarity::ActiveLow);
    enter_snooze(&mut ctrl, SnoozeMode::None, WakePolarity::ActiveLow);
    assert!(!ctrl.low_power().idle_armed);
}

#[test]
fn test_snooze_timeout_reports_failure_without_abort() {
    let mut ctrl = Controller::new(DeviceInitConfig::new());
    let mut fx = Effects::new();
    ctrl.request_snooze_mode(request(SnoozeMode::Uart, WakePolarity::ActiveLow), 8, &mut fx)
        .unwrap();
    let mut fx = Effects::new();
    ctrl.grant_control(&mut fx).unwrap();

    let mut fx = Effects::new();
    ctrl.on_timer_expired(TimerId::CommandTimeout, &mut fx);
    assert_eq!(
        fx.as_slice(),
        &[Effect::Status {
            token: 8,
            status: HalStatus::Failed
        }]
    );
    assert!(ctrl.window().is_free());
}

#[test]
fn test_request_with_busy_window_fails_without_state_change() {
    let mut ctrl = Controller::new(DeviceInitConfig::new());
    let mut fx = Effects::new();
    ctrl.begin_initialization(&mut fx).unwrap();

    let mut fx = Effects::new();
    assert_eq!(
        ctrl.request_snooze_mode(request(SnoozeMode::Uart, WakePolarity::ActiveHigh), 1, &mut fx),
        Err(HalError::NoWindow)
    );
    let snap = ctrl.snapshot();
    assert_eq!(snap.pending_snooze_mode, SnoozeMode::None);
    assert_eq!(snap.wake_polarity, WakePolarity::ActiveLow);
    assert_eq!(ctrl.phase(), InitPhase::WaitReset);
}

// =============================================================================
// Power mode
// =============================================================================

#[test]
fn test_low_power_blocks_client_commands() {
    let mut ctrl = Controller::new(DeviceInitConfig::new());
    ctrl.set_power_mode(PowerMode::Low);
    let mut fx = Effects::new();
    assert_eq!(
        ctrl.toggle_fw_fsm(true, 1, &mut fx),
        Err(HalError::PowerMode)
    );
    assert!(ctrl.window().is_free());
}

#[test]
fn test_grant_in_low_power_drops_held_command() {
    let mut ctrl = Controller::new(DeviceInitConfig::new());
    let mut fx = Effects::new();
    ctrl.request_snooze_mode(request(SnoozeMode::Uart, WakePolarity::ActiveLow), 6, &mut fx)
        .unwrap();
    ctrl.set_power_mode(PowerMode::Low);

    let mut fx = Effects::new();
    assert_eq!(ctrl.grant_control(&mut fx), Err(HalError::PowerMode));
    assert_eq!(
        fx.as_slice(),
        &[Effect::Status {
            token: 6,
            status: HalStatus::Failed
        }]
    );
    assert!(!ctrl.snapshot().pending_command);
    assert_eq!(ctrl.phase(), InitPhase::Idle);
}

// =============================================================================
// Shutdown
// =============================================================================

#[test]
fn test_shutdown_wakes_snoozing_controller() {
    let mut ctrl = Controller::new(DeviceInitConfig::new());
    enter_snooze(&mut ctrl, SnoozeMode::Uart, WakePolarity::ActiveLow);

    let mut fx = Effects::new();
    ctrl.shutdown(&mut fx);
    assert_eq!(
        fx.as_slice(),
        &[
            Effect::SetWake(WakeLevel::Low),
            Effect::DisarmTimer(TimerId::CommandTimeout),
            Effect::DisarmTimer(TimerId::Idle),
            Effect::DisarmTimer(TimerId::XtalSettle),
        ]
    );
    let snap = ctrl.snapshot();
    assert_eq!(snap.phase, InitPhase::Closing);
    assert_eq!(snap.snooze_mode, SnoozeMode::None);
    assert!(!snap.idle_timer_armed);
}

#[test]
fn test_shutdown_without_snooze_leaves_wake_alone() {
    let mut ctrl = Controller::new(DeviceInitConfig::new());
    let mut fx = Effects::new();
    ctrl.shutdown(&mut fx);
    assert!(!fx.iter().any(|e| matches!(e, Effect::SetWake(_))));

    // a closed controller can be brought up again
    let mut fx = Effects::new();
    assert!(ctrl.begin_initialization(&mut fx).is_ok());
}
