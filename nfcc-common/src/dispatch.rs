// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Inbound message routing.
//!
//! Every inbound packet is first offered to the command window. The
//! routing decision itself ([`route`]) only looks at the packet, the
//! bring-up phase and whether the window handed back a continuation.

use crate::controller::Controller;
use crate::effect::{Effect, Effects};
use crate::init_fsm::InitPhase;
use crate::protocol::{
    self, oid, BuildInfo, CommandComplete, Inbound, MessageType, NciPacket, PatchInfo,
    ResetNotification, EVT_GET_BUILD_INFO, EVT_GET_PATCH_VERSION, EVT_SEC_PATCH_AUTH,
    EVT_XTAL_INDEX, GID_CORE, GID_PROP, NCI_STATUS_OK,
};
use crate::snooze::Activity;
use crate::window::Continuation;

/// Where an inbound NCI packet goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    /// Reset answered during bring-up.
    ResetComplete,
    /// Reset answered during re-initialization.
    ReinitResetComplete,
    /// Unsolicited controller reset; recovery signal for the patch owner.
    ResetNotification,
    XtalAck,
    BuildInfo,
    PatchInfo,
    /// Run the continuation handed back by the window.
    Continuation,
    /// Proprietary traffic for the patch-download owner.
    Patch,
    Drop,
}

pub fn route(pkt: &NciPacket, phase: InitPhase, has_continuation: bool) -> Route {
    let hdr = pkt.header;
    match hdr.gid {
        GID_CORE if hdr.oid == oid::CORE_RESET => match (hdr.mt, phase) {
            (MessageType::Notification, _) => Route::ResetNotification,
            (MessageType::Response, InitPhase::WaitReset) => Route::ResetComplete,
            (MessageType::Response, InitPhase::WaitReinit) => Route::ReinitResetComplete,
            _ if has_continuation => Route::Continuation,
            _ => Route::Drop,
        },
        GID_PROP => {
            let event = pkt.event_code();
            match (phase, event) {
                (_, EVT_SEC_PATCH_AUTH) => Route::Patch,
                (InitPhase::WaitXtalSet, EVT_XTAL_INDEX) => Route::XtalAck,
                (InitPhase::WaitBuildInfo, EVT_GET_BUILD_INFO) => Route::BuildInfo,
                (InitPhase::WaitPatchInfo, EVT_GET_PATCH_VERSION) => Route::PatchInfo,
                _ if has_continuation => Route::Continuation,
                _ => Route::Patch,
            }
        }
        _ if has_continuation => Route::Continuation,
        _ => Route::Drop,
    }
}

impl Controller<'_> {
    /// Handle one complete inbound packet.
    pub fn on_inbound(&mut self, msg: &Inbound, fx: &mut Effects) {
        self.lp.on_activity(Activity::Rx, fx);

        let continuation = self
            .window
            .on_inbound(msg, fx)
            .and_then(|m| m.continuation);

        match msg {
            Inbound::Nci(pkt) => self.on_nci(pkt, continuation, fx),
            Inbound::CommandComplete(cc) => self.on_command_complete(cc, continuation, fx),
            Inbound::HciEvent { code } => trace!("dropping HCI event {:#x}", code),
        }
    }

    fn on_nci(&mut self, pkt: &NciPacket, continuation: Option<Continuation>, fx: &mut Effects) {
        let r = route(pkt, self.phase, continuation.is_some());
        trace!("{:?} in {:?} -> {:?}", pkt.header, self.phase, r);

        match r {
            Route::ResetComplete | Route::ReinitResetComplete
                if pkt.status() != Some(NCI_STATUS_OK) =>
            {
                error!("reset rejected: {:?}", pkt.status());
                self.abort(fx);
            }
            Route::ResetComplete => {
                self.phase = InitPhase::WaitBuildInfo;
                self.sequencer_send(protocol::get_build_info().into(), None, fx);
            }
            Route::ReinitResetComplete => {
                self.phase = InitPhase::WaitAppComplete;
                let continuation = self.reinit_token.take().map(Continuation::Client);
                self.sequencer_send(protocol::get_patch_version().into(), continuation, fx);
            }
            Route::ResetNotification => match ResetNotification::decode(&pkt.payload) {
                Some(ntf) => fx.push(Effect::ResetNotification {
                    reason: ntf.reason,
                    kind: ntf.kind,
                }),
                None => warn!("short reset notification"),
            },
            Route::XtalAck => self.on_xtal_ack(fx),
            Route::BuildInfo => {
                let Some(info) = BuildInfo::decode(&pkt.payload) else {
                    error!("build info too short ({})", pkt.payload.len());
                    self.abort(fx);
                    return;
                };
                debug!("hw id {:#x}", info.hw_id);
                self.chip.hw_id = info.hw_id;
                self.phase = InitPhase::WaitPatchInfo;
                self.sequencer_send(protocol::get_patch_version().into(), None, fx);
            }
            Route::PatchInfo => {
                let Some(info) = PatchInfo::decode(&pkt.payload) else {
                    error!("patch info too short ({})", pkt.payload.len());
                    self.abort(fx);
                    return;
                };
                debug!("nvm type {:#x}", info.nvm_type);
                self.chip.nvm_type = info.nvm_type;
                self.phase = InitPhase::WaitAppComplete;
                fx.push(Effect::ChipIdentified {
                    hw_id: self.chip.hw_id,
                    nvm_type: self.chip.nvm_type,
                });
            }
            Route::Continuation => match continuation {
                Some(Continuation::Sequencer) => self.on_config_response(pkt.status(), fx),
                Some(Continuation::Client(token)) => fx.push(Effect::CommandComplete {
                    token,
                    event: pkt.event_code(),
                    payload: pkt.payload.clone(),
                }),
                Some(Continuation::Snooze) => warn!("sleep mode answered over NCI"),
                None => {}
            },
            Route::Patch => fx.push(Effect::PatchEvent {
                event: pkt.event_code(),
                payload: pkt.payload.clone(),
            }),
            Route::Drop => {}
        }
    }

    fn on_command_complete(
        &mut self,
        cc: &CommandComplete,
        continuation: Option<Continuation>,
        fx: &mut Effects,
    ) {
        match continuation {
            Some(Continuation::Snooze) => self.on_snooze_complete(cc.status(), fx),
            Some(other) => warn!("command complete {:#x} for {:?}", cc.opcode, other),
            None => trace!("unsolicited command complete {:#x}", cc.opcode),
        }
    }
}
