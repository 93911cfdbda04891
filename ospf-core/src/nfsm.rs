use std::time::Instant;

use ospf_packet::DbDescFlags;
use rand::Rng;
use strum_macros::Display;

use crate::config::RelayChangePolicy;
use crate::inst::{OspfInterface, OspfNotify};
use crate::link::LinkType;
use crate::lsdb::Lsdb;
use crate::neigh::Neighbor;
use crate::packet::{ospf_db_desc_send, ospf_hello_start_send, ospf_ls_req_send};
use crate::task::{TimerKind, TimerToken, timer_arm, timer_cancel};
use crate::{ospf_event_trace, ospf_fsm_trace};

#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Clone, Copy, Display)]
pub enum NfsmState {
    Down,
    Attempt,
    Init,
    TwoWay,
    ExStart,
    Exchange,
    Loading,
    Full,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Display)]
pub enum NfsmEvent {
    HelloReceived,
    Start,
    TwoWayReceived,
    NegotiationDone,
    ExchangeDone,
    BadLSReq,
    LoadingDone,
    AdjOk,
    SeqNumberMismatch,
    OneWayReceived,
    KillNbr,
    InactivityTimer,
    LLDown,
}

pub type NfsmFunc = fn(&mut OspfInterface, &mut Neighbor, Instant) -> Option<NfsmState>;

impl NfsmState {
    pub fn fsm(&self, ev: NfsmEvent) -> (NfsmFunc, Option<Self>) {
        use NfsmEvent::*;
        use NfsmState::*;

        match self {
            Down => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(Init)),
                Start => (ospf_nfsm_start, Some(Attempt)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(Down)),
                NegotiationDone => (ospf_nfsm_ignore, Some(Down)),
                ExchangeDone => (ospf_nfsm_ignore, Some(Down)),
                BadLSReq => (ospf_nfsm_ignore, Some(Down)),
                LoadingDone => (ospf_nfsm_ignore, Some(Down)),
                AdjOk => (ospf_nfsm_ignore, Some(Down)),
                SeqNumberMismatch => (ospf_nfsm_ignore, Some(Down)),
                OneWayReceived => (ospf_nfsm_ignore, Some(Down)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_inactivity_timer, Some(Down)),
                LLDown => (ospf_nfsm_ll_down, Some(Down)),
            },
            Attempt => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(Init)),
                Start => (ospf_nfsm_ignore, Some(Attempt)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(Attempt)),
                NegotiationDone => (ospf_nfsm_ignore, Some(Attempt)),
                ExchangeDone => (ospf_nfsm_ignore, Some(Attempt)),
                BadLSReq => (ospf_nfsm_ignore, Some(Attempt)),
                LoadingDone => (ospf_nfsm_ignore, Some(Attempt)),
                AdjOk => (ospf_nfsm_ignore, Some(Attempt)),
                SeqNumberMismatch => (ospf_nfsm_ignore, Some(Attempt)),
                OneWayReceived => (ospf_nfsm_ignore, Some(Attempt)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_inactivity_timer, Some(Down)),
                LLDown => (ospf_nfsm_ll_down, Some(Down)),
            },
            Init => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(Init)),
                Start => (ospf_nfsm_ignore, Some(Init)),
                TwoWayReceived => (ospf_nfsm_twoway_received, None),
                NegotiationDone => (ospf_nfsm_ignore, Some(Init)),
                ExchangeDone => (ospf_nfsm_ignore, Some(Init)),
                BadLSReq => (ospf_nfsm_ignore, Some(Init)),
                LoadingDone => (ospf_nfsm_ignore, Some(Init)),
                AdjOk => (ospf_nfsm_ignore, Some(Init)),
                SeqNumberMismatch => (ospf_nfsm_ignore, Some(Init)),
                OneWayReceived => (ospf_nfsm_ignore, Some(Init)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_inactivity_timer, Some(Down)),
                LLDown => (ospf_nfsm_ll_down, Some(Down)),
            },
            TwoWay => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(TwoWay)),
                Start => (ospf_nfsm_ignore, Some(TwoWay)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(TwoWay)),
                NegotiationDone => (ospf_nfsm_ignore, Some(TwoWay)),
                ExchangeDone => (ospf_nfsm_ignore, Some(TwoWay)),
                BadLSReq => (ospf_nfsm_ignore, Some(TwoWay)),
                LoadingDone => (ospf_nfsm_ignore, Some(TwoWay)),
                AdjOk => (ospf_nfsm_adj_ok, None),
                SeqNumberMismatch => (ospf_nfsm_ignore, Some(TwoWay)),
                OneWayReceived => (ospf_nfsm_oneway_received, Some(Init)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_inactivity_timer, Some(Down)),
                LLDown => (ospf_nfsm_ll_down, Some(Down)),
            },
            ExStart => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(ExStart)),
                Start => (ospf_nfsm_ignore, Some(ExStart)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(ExStart)),
                NegotiationDone => (ospf_nfsm_negotiation_done, Some(Exchange)),
                ExchangeDone => (ospf_nfsm_ignore, Some(ExStart)),
                BadLSReq => (ospf_nfsm_ignore, Some(ExStart)),
                LoadingDone => (ospf_nfsm_ignore, Some(ExStart)),
                AdjOk => (ospf_nfsm_adj_ok, None),
                SeqNumberMismatch => (ospf_nfsm_ignore, Some(ExStart)),
                OneWayReceived => (ospf_nfsm_oneway_received, Some(Init)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_inactivity_timer, Some(Down)),
                LLDown => (ospf_nfsm_ll_down, Some(Down)),
            },
            Exchange => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(Exchange)),
                Start => (ospf_nfsm_ignore, Some(Exchange)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(Exchange)),
                NegotiationDone => (ospf_nfsm_ignore, Some(Exchange)),
                ExchangeDone => (ospf_nfsm_exchange_done, None),
                BadLSReq => (ospf_nfsm_bad_ls_req, Some(ExStart)),
                LoadingDone => (ospf_nfsm_ignore, Some(Exchange)),
                AdjOk => (ospf_nfsm_adj_ok, None),
                SeqNumberMismatch => (ospf_nfsm_seq_number_mismatch, Some(ExStart)),
                OneWayReceived => (ospf_nfsm_oneway_received, Some(Init)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_inactivity_timer, Some(Down)),
                LLDown => (ospf_nfsm_ll_down, Some(Down)),
            },
            Loading => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(Loading)),
                Start => (ospf_nfsm_ignore, Some(Loading)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(Loading)),
                NegotiationDone => (ospf_nfsm_ignore, Some(Loading)),
                ExchangeDone => (ospf_nfsm_ignore, Some(Loading)),
                BadLSReq => (ospf_nfsm_bad_ls_req, Some(ExStart)),
                LoadingDone => (ospf_nfsm_ignore, Some(Full)),
                AdjOk => (ospf_nfsm_adj_ok, None),
                SeqNumberMismatch => (ospf_nfsm_seq_number_mismatch, Some(ExStart)),
                OneWayReceived => (ospf_nfsm_oneway_received, Some(Init)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_inactivity_timer, Some(Down)),
                LLDown => (ospf_nfsm_ll_down, Some(Down)),
            },
            Full => match ev {
                HelloReceived => (ospf_nfsm_hello_received, Some(Full)),
                Start => (ospf_nfsm_ignore, Some(Full)),
                TwoWayReceived => (ospf_nfsm_ignore, Some(Full)),
                NegotiationDone => (ospf_nfsm_ignore, Some(Full)),
                ExchangeDone => (ospf_nfsm_ignore, Some(Full)),
                BadLSReq => (ospf_nfsm_bad_ls_req, Some(ExStart)),
                LoadingDone => (ospf_nfsm_ignore, Some(Full)),
                AdjOk => (ospf_nfsm_adj_ok, None),
                SeqNumberMismatch => (ospf_nfsm_seq_number_mismatch, Some(ExStart)),
                OneWayReceived => (ospf_nfsm_oneway_received, Some(Init)),
                KillNbr => (ospf_nfsm_kill_nbr, Some(Down)),
                InactivityTimer => (ospf_nfsm_inactivity_timer, Some(Down)),
                LLDown => (ospf_nfsm_ll_down, Some(Down)),
            },
        }
    }
}

pub fn ospf_nfsm_ls_upd_timer_on(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    if nbr.timer.ls_upd.is_some() {
        return;
    }
    let token = TimerToken::new(TimerKind::LsUpd(oi.ifindex, nbr.addr()), nbr.id, nbr.epoch);
    timer_arm(oi.timers, &mut nbr.timer.ls_upd, oi.params.rxmt(), token);
}

pub fn ospf_nfsm_ls_req_timer_on(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    let token = TimerToken::new(TimerKind::LsReq(oi.ifindex, nbr.addr()), nbr.id, nbr.epoch);
    timer_arm(oi.timers, &mut nbr.timer.ls_req, oi.params.rxmt(), token);
}

pub fn ospf_nfsm_db_desc_timer_on(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    let token = TimerToken::new(TimerKind::DbDesc(oi.ifindex, nbr.addr()), nbr.id, nbr.epoch);
    timer_arm(oi.timers, &mut nbr.timer.db_desc, oi.params.rxmt(), token);
}

fn ospf_nfsm_timers_off(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    timer_cancel(oi.timers, &mut nbr.timer.inactivity);
    timer_cancel(oi.timers, &mut nbr.timer.db_desc);
    timer_cancel(oi.timers, &mut nbr.timer.ls_req);
    timer_cancel(oi.timers, &mut nbr.timer.ls_upd);
}

pub fn ospf_nfsm_reset_nbr(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    nbr.reset_lists();
    timer_cancel(oi.timers, &mut nbr.timer.ls_req);
    timer_cancel(oi.timers, &mut nbr.timer.ls_upd);
}

pub fn ospf_nfsm_timer_set(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    use NfsmState::*;
    match nbr.state {
        Down => {
            ospf_nfsm_timers_off(oi, nbr);
        }
        Attempt | Init | TwoWay => {
            timer_cancel(oi.timers, &mut nbr.timer.db_desc);
            timer_cancel(oi.timers, &mut nbr.timer.ls_req);
            timer_cancel(oi.timers, &mut nbr.timer.ls_upd);
        }
        ExStart => {
            timer_cancel(oi.timers, &mut nbr.timer.ls_req);
        }
        Exchange => {
            // Only the master retransmits DD packets.
            if !nbr.is_master() {
                timer_cancel(oi.timers, &mut nbr.timer.db_desc);
            }
        }
        Loading => {
            timer_cancel(oi.timers, &mut nbr.timer.db_desc);
        }
        Full => {
            timer_cancel(oi.timers, &mut nbr.timer.db_desc);
            timer_cancel(oi.timers, &mut nbr.timer.ls_req);
        }
    }
}

/// Whether an adjacency should be formed with the neighbor.
pub fn ospf_nfsm_adj_need(oi: &OspfInterface, nbr: &Neighbor) -> bool {
    // Point-to-point, point-to-multipoint and virtual links.
    if oi.params.link_type.is_always_adjacent() {
        return true;
    }
    // I'm DR or BDR.
    if oi.ident.is_dr_or_bdr() {
        return true;
    }
    // Neighbor is DR or BDR.
    let addr = nbr.addr();
    (oi.ident.has_dr() && addr == oi.ident.d_router)
        || (!oi.ident.bd_router.is_unspecified() && addr == oi.ident.bd_router)
}

pub fn ospf_nfsm_ignore(
    _oi: &mut OspfInterface,
    _nbr: &mut Neighbor,
    _now: Instant,
) -> Option<NfsmState> {
    None
}

pub fn ospf_nfsm_hello_received(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    _now: Instant,
) -> Option<NfsmState> {
    // Start or Restart Inactivity Timer.
    let token = TimerToken::new(
        TimerKind::Inactivity(oi.ifindex, nbr.addr()),
        nbr.id,
        nbr.epoch,
    );
    timer_arm(oi.timers, &mut nbr.timer.inactivity, oi.params.dead(), token);
    None
}

pub fn ospf_nfsm_start(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    now: Instant,
) -> Option<NfsmState> {
    ospf_hello_start_send(oi, nbr);
    ospf_nfsm_hello_received(oi, nbr, now)
}

pub fn ospf_nfsm_twoway_received(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    _now: Instant,
) -> Option<NfsmState> {
    if ospf_nfsm_adj_need(oi, nbr) {
        Some(NfsmState::ExStart)
    } else {
        Some(NfsmState::TwoWay)
    }
}

pub fn ospf_nfsm_negotiation_done(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    now: Instant,
) -> Option<NfsmState> {
    nbr.db_sum.clear();
    let mut lsdbs: Vec<&Lsdb> = vec![oi.lsdb];
    if oi.params.link_type != LinkType::Virtual {
        lsdbs.push(oi.lsdb_as);
    }
    for lsdb in lsdbs {
        for (_, lsa) in lsdb.iter() {
            if lsa.is_maxage() {
                nbr.ls_rxmt.add(lsa.h().clone(), now);
            } else {
                nbr.db_sum.push_back(lsa.header_at(now));
            }
        }
    }
    if !nbr.ls_rxmt.is_empty() {
        ospf_nfsm_ls_upd_timer_on(oi, nbr);
    }
    None
}

pub fn ospf_nfsm_exchange_done(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    _now: Instant,
) -> Option<NfsmState> {
    if nbr.ls_req.is_empty() {
        return Some(NfsmState::Full);
    }
    ospf_ls_req_send(oi, nbr);
    Some(NfsmState::Loading)
}

pub fn ospf_nfsm_bad_ls_req(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    _now: Instant,
) -> Option<NfsmState> {
    ospf_event_trace!(
        oi.tracing,
        Adjacency,
        "BadLSReq from {} on {}",
        nbr.router_id(),
        oi.ifindex
    );
    ospf_nfsm_reset_nbr(oi, nbr);
    None
}

pub fn ospf_nfsm_adj_ok(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    _now: Instant,
) -> Option<NfsmState> {
    let adj_need = ospf_nfsm_adj_need(oi, nbr);

    if nbr.state == NfsmState::TwoWay && adj_need {
        return Some(NfsmState::ExStart);
    }
    if nbr.state >= NfsmState::ExStart && !adj_need {
        match oi.relay_change {
            RelayChangePolicy::Reevaluate => {
                ospf_nfsm_reset_nbr(oi, nbr);
                return Some(NfsmState::TwoWay);
            }
            RelayChangePolicy::KeepEstablished => {}
        }
    }
    None
}

pub fn ospf_nfsm_seq_number_mismatch(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    _now: Instant,
) -> Option<NfsmState> {
    ospf_event_trace!(
        oi.tracing,
        Adjacency,
        "SeqNumberMismatch from {} on {}",
        nbr.router_id(),
        oi.ifindex
    );
    ospf_nfsm_reset_nbr(oi, nbr);
    None
}

pub fn ospf_nfsm_oneway_received(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    _now: Instant,
) -> Option<NfsmState> {
    ospf_nfsm_reset_nbr(oi, nbr);
    None
}

pub fn ospf_nfsm_kill_nbr(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    _now: Instant,
) -> Option<NfsmState> {
    ospf_nfsm_reset_nbr(oi, nbr);
    ospf_nfsm_timers_off(oi, nbr);
    None
}

pub fn ospf_nfsm_inactivity_timer(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    now: Instant,
) -> Option<NfsmState> {
    ospf_nfsm_kill_nbr(oi, nbr, now)
}

pub fn ospf_nfsm_ll_down(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    now: Instant,
) -> Option<NfsmState> {
    ospf_nfsm_kill_nbr(oi, nbr, now)
}

fn ospf_nfsm_change_state(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    state: NfsmState,
    now: Instant,
) {
    use NfsmState::*;

    nbr.ostate = nbr.state;
    nbr.state = state;
    nbr.state_change += 1;

    if nbr.state < nbr.ostate {
        nbr.options = 0u8.into();
    }

    // Crossing the TwoWay or the Full boundary changes what the election and
    // the origination layers see.
    let twoway = (nbr.ostate < TwoWay) != (nbr.state < TwoWay);
    let full = (nbr.ostate == Full) != (nbr.state == Full);
    if twoway || full {
        let _ = oi.notify.send(OspfNotify::NeighborChange {
            ifindex: oi.ifindex,
            router_id: nbr.router_id(),
            state: nbr.state,
        });
    }

    if nbr.ostate >= ExStart && nbr.state < ExStart {
        ospf_nfsm_reset_nbr(oi, nbr);
        nbr.dd.recv = None;
    }

    if nbr.state == ExStart {
        ospf_nfsm_reset_nbr(oi, nbr);
        if nbr.flags.dd_init() {
            *oi.db_desc_in += 1;
        }
        if nbr.dd.seqnum == 0 {
            let mut rng = rand::rng();
            nbr.dd.seqnum = rng.random();
        } else {
            nbr.dd.seqnum = nbr.dd.seqnum.wrapping_add(1);
        }
        nbr.dd.flags = DbDescFlags::new()
            .with_master(true)
            .with_more(true)
            .with_init(true);
        nbr.dd.recv = None;
        nbr.dd.last_sent = None;

        ospf_db_desc_send(oi, nbr);
    }

    if nbr.state == Down {
        ospf_nfsm_timers_off(oi, nbr);
        nbr.epoch += 1;
        nbr.dd.recv = None;
        nbr.dd.last_sent = None;
    }
}

pub fn ospf_nfsm(oi: &mut OspfInterface, nbr: &mut Neighbor, event: NfsmEvent, now: Instant) {
    // Decompose the result of the state function into the transition function
    // and next state.
    let (fsm_func, fsm_next_state) = nbr.state.fsm(event);

    // Determine the next state by prioritizing the computed state over the
    // FSM-provided next state.
    let next_state = fsm_func(oi, nbr, now).or(fsm_next_state);

    // If a state transition occurs, update the state.
    if let Some(new_state) = next_state {
        if new_state != nbr.state {
            ospf_fsm_trace!(
                oi.tracing,
                Nfsm,
                false,
                "NFSM {} on {}: {} -> {} ({})",
                nbr.router_id(),
                oi.ifindex,
                nbr.state,
                new_state,
                event
            );
            ospf_nfsm_change_state(oi, nbr, new_state, now);
        }
    }
    ospf_nfsm_timer_set(oi, nbr);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fsm_table_kill_events() {
        use NfsmEvent::*;
        use NfsmState::*;
        for state in [Down, Attempt, Init, TwoWay, ExStart, Exchange, Loading, Full] {
            for ev in [KillNbr, InactivityTimer, LLDown] {
                assert_eq!(state.fsm(ev).1, Some(Down), "{state} {ev}");
            }
        }
    }

    #[test]
    fn test_fsm_table_resets() {
        use NfsmEvent::*;
        use NfsmState::*;
        for state in [Exchange, Loading, Full] {
            assert_eq!(state.fsm(SeqNumberMismatch).1, Some(ExStart));
            assert_eq!(state.fsm(BadLSReq).1, Some(ExStart));
        }
        for state in [TwoWay, ExStart, Exchange, Loading, Full] {
            assert_eq!(state.fsm(OneWayReceived).1, Some(Init));
        }
        assert_eq!(Loading.fsm(LoadingDone).1, Some(Full));
        assert_eq!(Exchange.fsm(LoadingDone).1, Some(Exchange));
        assert_eq!(ExStart.fsm(NegotiationDone).1, Some(Exchange));
        assert_eq!(Init.fsm(TwoWayReceived).1, None);
        assert_eq!(Down.fsm(Start).1, Some(Attempt));
        assert_eq!(Down.fsm(HelloReceived).1, Some(Init));
    }

    #[test]
    fn test_state_order() {
        use NfsmState::*;
        assert!(Down < Attempt);
        assert!(TwoWay < ExStart);
        assert!(Exchange < Loading);
        assert!(Loading < Full);
        assert_eq!(ExStart.to_string(), "ExStart");
    }
}
