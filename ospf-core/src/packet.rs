use std::net::Ipv4Addr;
use std::time::Instant;

use ipnet::Ipv4Net;
use ospf_packet::*;

use crate::error::OspfError;
use crate::flood::ospf_flood;
use crate::ident::Identity;
use crate::inst::{Ospf, OspfInterface, OspfNotify};
use crate::link::{LinkType, OspfLink};
use crate::lsa::{LsaKey, LsaVersion, MAX_SEQUENCE_NUMBER, MIN_LS_ARRIVAL};
use crate::lsdb::{Lsdb, LsdbOutcome, RejectReason};
use crate::neigh::{DbDescRecv, Neighbor};
use crate::network::{ALL_D_ROUTERS, ALL_SPF_ROUTERS, Transport};
use crate::nfsm::{
    NfsmEvent, NfsmState, ospf_nfsm, ospf_nfsm_db_desc_timer_on, ospf_nfsm_ls_req_timer_on,
    ospf_nfsm_ls_upd_timer_on,
};
use crate::task::{TimerKind, TimerService, TimerToken, timer_arm, timer_cancel};
use crate::tracing::OspfTracing;
use crate::{ospf_event_trace, ospf_packet_trace};

// IPv4 header, OSPF header and the fixed part of each packet type.
const IPV4_HEADER_LEN: usize = 20;
const DB_DESC_FIXED_LEN: usize = 8;
const LS_UPD_FIXED_LEN: usize = 4;

fn ospf_payload_max(mtu: u16) -> usize {
    (mtu as usize).saturating_sub(IPV4_HEADER_LEN + OSPF_HEADER_LEN)
}

fn ospf_db_desc_max_headers(mtu: u16) -> usize {
    (ospf_payload_max(mtu).saturating_sub(DB_DESC_FIXED_LEN) / OSPF_LSA_HEADER_LEN).max(1)
}

fn ospf_ls_req_max_entries(mtu: u16) -> usize {
    (ospf_payload_max(mtu) / OSPF_LS_REQ_ENTRY_LEN).max(1)
}

fn ospf_ls_ack_max_headers(mtu: u16) -> usize {
    (ospf_payload_max(mtu) / OSPF_LSA_HEADER_LEN).max(1)
}

/// Split LSAs into LS Update payloads that fit the interface MTU. An LSA
/// larger than the MTU goes out alone.
pub fn ospf_ls_upd_split(lsas: Vec<OspfLsa>, mtu: u16) -> Vec<OspfLsUpdate> {
    let max = ospf_payload_max(mtu).saturating_sub(LS_UPD_FIXED_LEN);
    let mut updates = Vec::new();
    let mut upd = OspfLsUpdate::default();
    let mut size = 0;
    for lsa in lsas {
        let len = lsa.h.length as usize;
        if !upd.lsas.is_empty() && size + len > max {
            updates.push(std::mem::take(&mut upd));
            size = 0;
        }
        size += len;
        upd.lsas.push(lsa);
    }
    if !upd.lsas.is_empty() {
        updates.push(upd);
    }
    updates
}

pub fn ospf_ls_upd_send(
    transport: &mut dyn Transport,
    packet: impl Fn(Ospfv2Payload) -> Ospfv2Packet,
    ifindex: u32,
    dest: Ipv4Addr,
    lsas: Vec<OspfLsa>,
    mtu: u16,
) {
    for upd in ospf_ls_upd_split(lsas, mtu) {
        transport.send(ifindex, dest, packet(Ospfv2Payload::LsUpdate(upd)));
    }
}

fn netmask_to_plen(mask: Ipv4Addr) -> u8 {
    u32::from(mask).count_ones() as u8
}

fn ospf_hello_build(
    ident: &Identity,
    link_type: LinkType,
    hello_interval: u16,
    dead_interval: u32,
    options: OspfOptions,
) -> OspfHello {
    let mut hello = OspfHello::default();
    if link_type != LinkType::Virtual {
        hello.netmask = ident.prefix.netmask();
    }
    hello.hello_interval = hello_interval;
    hello.options = options;
    hello.priority = ident.priority;
    hello.router_dead_interval = dead_interval;
    hello.d_router = ident.d_router;
    hello.bd_router = ident.bd_router;
    hello
}

pub fn ospf_hello_packet(link: &OspfLink, router_id: Ipv4Addr, options: OspfOptions) -> Ospfv2Packet {
    let mut hello = ospf_hello_build(
        &link.ident,
        link.link_type(),
        link.params.hello_interval,
        link.params.dead_interval,
        options,
    );
    for (_, nbr) in link.nbrs.iter() {
        if nbr.state < NfsmState::Init {
            continue;
        }
        hello.neighbors.push(nbr.router_id());
    }
    Ospfv2Packet::new(&router_id, &link.area_id, Ospfv2Payload::Hello(hello))
}

pub fn ospf_hello_send(
    link: &mut OspfLink,
    router_id: Ipv4Addr,
    options: OspfOptions,
    transport: &mut dyn Transport,
    tracing: &OspfTracing,
) {
    ospf_packet_trace!(
        tracing,
        Hello,
        Send,
        "Send Hello on {} with hello_sent flag {}",
        link.name,
        link.flags.hello_sent()
    );

    let packet = ospf_hello_packet(link, router_id, options);
    if link.link_type().is_unicast() {
        for addr in link.nbrs.keys() {
            transport.send(link.index, *addr, packet.clone());
        }
    } else {
        transport.send(link.index, ALL_SPF_ROUTERS, packet);
    }
    link.flags.set_hello_sent(true);
}

/// Hello sent to an NBMA neighbor on the Start event. The neighbor list stays
/// empty until the neighbor has been heard from.
pub fn ospf_hello_start_send(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    let hello = ospf_hello_build(
        oi.ident,
        oi.params.link_type,
        oi.params.hello_interval,
        oi.params.dead_interval,
        oi.options,
    );
    ospf_packet_trace!(oi.tracing, Hello, Send, "Send Hello to {}", nbr.addr());
    let packet = oi.packet(Ospfv2Payload::Hello(hello));
    oi.transport.send(oi.ifindex, nbr.addr(), packet);
}

fn ospf_hello_twoway_check(router_id: &Ipv4Addr, hello: &OspfHello) -> bool {
    hello.neighbors.iter().any(|neighbor| router_id == neighbor)
}

fn ospf_hello_is_nbr_changed(nbr: &Neighbor, prev: &Identity) -> bool {
    let current = nbr.ident;
    let nbr_addr = nbr.addr();

    nbr_addr != prev.d_router && nbr_addr == current.d_router || // Non DR -> DR
        nbr_addr == prev.d_router && nbr_addr != current.d_router || // DR -> Non DR
        nbr_addr != prev.bd_router && nbr_addr == current.bd_router || // Non Backup -> Backup
        nbr_addr == prev.bd_router && nbr_addr != current.bd_router || // Backup -> Non Backup
        prev.priority != current.priority // Priority changed
}

pub fn ospf_hello_recv(
    top: &mut Ospf,
    ifindex: u32,
    src: Ipv4Addr,
    router_id: Ipv4Addr,
    hello: &OspfHello,
    now: Instant,
) {
    let known = top.neighbor(ifindex, &src).is_some();
    let id = if known { 0 } else { top.next_id() };
    let external = top
        .links
        .get(&ifindex)
        .and_then(|link| top.areas.get(&link.area_id))
        .is_none_or(|area| area.external_routing);
    let Some(link) = top.links.get_mut(&ifindex) else {
        return;
    };

    // Non PtoP interface's network mask check.
    if !matches!(link.link_type(), LinkType::PointToPoint | LinkType::Virtual)
        && netmask_to_plen(hello.netmask) != link.ident.prefix.prefix_len()
    {
        ospf_packet_trace!(
            top.tracing,
            Hello,
            Recv,
            "Hello from {}: netmask mismatch {}",
            src,
            hello.netmask
        );
        return;
    }
    if hello.hello_interval != link.params.hello_interval {
        ospf_packet_trace!(
            top.tracing,
            Hello,
            Recv,
            "Hello from {}: hello interval mismatch {}",
            src,
            hello.hello_interval
        );
        return;
    }
    if hello.router_dead_interval != link.params.dead_interval {
        ospf_packet_trace!(
            top.tracing,
            Hello,
            Recv,
            "Hello from {}: dead interval mismatch {}",
            src,
            hello.router_dead_interval
        );
        return;
    }
    if hello.options.external() != external {
        ospf_packet_trace!(top.tracing, Hello, Recv, "Hello from {}: E-bit mismatch", src);
        return;
    }

    let prefix = Ipv4Net::new(src, link.ident.prefix.prefix_len()).unwrap_or_default();
    let nbr = link
        .nbrs
        .entry(src)
        .or_insert_with(|| Neighbor::new(ifindex, id, prefix, &router_id));

    // Remember identity.
    let prev = nbr.ident;

    // Update identity.
    nbr.ident.router_id = router_id;
    nbr.ident.priority = hello.priority;
    nbr.ident.d_router = hello.d_router;
    nbr.ident.bd_router = hello.bd_router;
    let changed = known && ospf_hello_is_nbr_changed(nbr, &prev);

    top.nfsm_event(ifindex, src, NfsmEvent::HelloReceived, now);
    let event = if ospf_hello_twoway_check(&top.router_id, hello) {
        NfsmEvent::TwoWayReceived
    } else {
        NfsmEvent::OneWayReceived
    };
    top.nfsm_event(ifindex, src, event, now);

    if changed {
        if let Some(nbr) = top.neighbor(ifindex, &src) {
            let _ = top.notify.send(OspfNotify::NeighborChange {
                ifindex,
                router_id,
                state: nbr.state,
            });
        }
    }
}

pub fn ospf_db_desc_send(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    let mut dd = OspfDbDesc::default();

    dd.if_mtu = if oi.params.link_type == LinkType::Virtual {
        0
    } else {
        oi.params.mtu
    };
    dd.options = oi.options;

    // The initial DD carries no headers.
    if !nbr.dd.flags.init() {
        let max = ospf_db_desc_max_headers(oi.params.mtu);
        while dd.lsa_headers.len() < max {
            let Some(h) = nbr.db_sum.pop_front() else {
                break;
            };
            dd.lsa_headers.push(h);
        }
        if nbr.db_sum.is_empty() {
            nbr.dd.flags.set_more(false);
        }
    }
    dd.flags = nbr.dd.flags;
    dd.seqnum = nbr.dd.seqnum;

    ospf_packet_trace!(oi.tracing, Dd, Send, "Send DD to {}: {}", nbr.addr(), dd);
    nbr.dd.last_sent = Some(dd.clone());
    let packet = oi.packet(Ospfv2Payload::DbDesc(dd));
    oi.transport.send(oi.ifindex, nbr.addr(), packet);

    if nbr.is_master() {
        ospf_nfsm_db_desc_timer_on(oi, nbr);
    }
}

pub fn ospf_db_desc_resend(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    let Some(dd) = nbr.dd.last_sent.clone() else {
        return;
    };
    ospf_packet_trace!(oi.tracing, Dd, Send, "Resend DD to {}: {}", nbr.addr(), dd);
    let packet = oi.packet(Ospfv2Payload::DbDesc(dd));
    oi.transport.send(oi.ifindex, nbr.addr(), packet);

    if nbr.is_master() && matches!(nbr.state, NfsmState::ExStart | NfsmState::Exchange) {
        ospf_nfsm_db_desc_timer_on(oi, nbr);
    }
}

fn ospf_db_desc_proc(oi: &mut OspfInterface, nbr: &mut Neighbor, dd: &OspfDbDesc, now: Instant) {
    nbr.dd.recv = Some(DbDescRecv::from(dd));

    for h in dd.lsa_headers.iter() {
        let scope = h.ls_type.flood_scope();
        let as_refused = scope == FloodScope::As
            && (oi.params.link_type == LinkType::Virtual || !oi.options.external());
        if !Lsdb::is_supported(h.ls_type) || as_refused {
            ospf_packet_trace!(
                oi.tracing,
                Dd,
                Recv,
                "DD from {}: unexpected LS type {}",
                nbr.addr(),
                h.ls_type
            );
            ospf_nfsm(oi, nbr, NfsmEvent::SeqNumberMismatch, now);
            return;
        }
        let key = LsaKey::from(h);
        let newer = match oi.lookup(&key) {
            None => true,
            Some(lsa) => LsaVersion::from(h).is_newer(&lsa.version_at(now)),
        };
        if newer {
            nbr.ls_req_add(h);
        }
    }

    if nbr.is_master() {
        nbr.dd.seqnum = nbr.dd.seqnum.wrapping_add(1);

        // When both side does not have more, exchange is done.
        if !dd.flags.more() && !nbr.dd.flags.more() {
            ospf_nfsm(oi, nbr, NfsmEvent::ExchangeDone, now);
        } else {
            ospf_db_desc_send(oi, nbr);
        }
    } else {
        nbr.dd.seqnum = dd.seqnum;
        ospf_db_desc_send(oi, nbr);

        if !dd.flags.more() && !nbr.dd.flags.more() {
            ospf_nfsm(oi, nbr, NfsmEvent::ExchangeDone, now);
        }
    }
}

fn is_dd_dup(dd: &OspfDbDesc, prev: &Option<DbDescRecv>) -> bool {
    prev.is_some_and(|prev| prev == DbDescRecv::from(dd))
}

pub fn ospf_db_desc_recv(oi: &mut OspfInterface, nbr: &mut Neighbor, dd: &OspfDbDesc, now: Instant) {
    use NfsmState::*;

    // MTU check.
    if oi.params.link_type != LinkType::Virtual && dd.if_mtu > oi.params.mtu {
        ospf_packet_trace!(
            oi.tracing,
            Dd,
            Recv,
            "DD from {}: MTU {} exceeds {}",
            nbr.addr(),
            dd.if_mtu,
            oi.params.mtu
        );
        return;
    }

    match nbr.state {
        Down | Attempt | TwoWay => {
            return;
        }
        Init => {
            nbr.flags.set_dd_init(true);
            ospf_nfsm(oi, nbr, NfsmEvent::TwoWayReceived, now);
            nbr.flags.set_dd_init(false);
            if nbr.state != ExStart {
                return;
            }
        }
        _ => {}
    }

    match nbr.state {
        ExStart => {
            if dd.flags.is_all() && dd.lsa_headers.is_empty() && nbr.router_id() > oi.router_id {
                // Slave.
                nbr.dd.seqnum = dd.seqnum;
                nbr.dd.flags.set_master(false);
                nbr.dd.flags.set_init(false);
                nbr.options = dd.options;
            } else if !dd.flags.master()
                && !dd.flags.init()
                && dd.seqnum == nbr.dd.seqnum
                && nbr.router_id() < oi.router_id
            {
                // Master.
                nbr.dd.flags.set_init(false);
                nbr.options = dd.options;
            } else {
                ospf_packet_trace!(oi.tracing, Dd, Recv, "DD from {}: negotiation fails", nbr.addr());
                return;
            }
            ospf_nfsm(oi, nbr, NfsmEvent::NegotiationDone, now);
            ospf_db_desc_proc(oi, nbr, dd, now);
        }
        Exchange => {
            if is_dd_dup(dd, &nbr.dd.recv) {
                // The master discards duplicates, the slave answers them.
                if !nbr.is_master() {
                    ospf_db_desc_resend(oi, nbr);
                }
                return;
            }
            if dd.flags.master() == nbr.is_master() {
                ospf_packet_trace!(oi.tracing, Dd, Recv, "DD from {}: MS-bit mismatch", nbr.addr());
                ospf_nfsm(oi, nbr, NfsmEvent::SeqNumberMismatch, now);
                return;
            }
            if dd.flags.init() {
                ospf_packet_trace!(oi.tracing, Dd, Recv, "DD from {}: I-bit set", nbr.addr());
                ospf_nfsm(oi, nbr, NfsmEvent::SeqNumberMismatch, now);
                return;
            }
            if nbr.dd.recv.is_some_and(|recv| recv.options != dd.options) {
                ospf_packet_trace!(oi.tracing, Dd, Recv, "DD from {}: options mismatch", nbr.addr());
                ospf_nfsm(oi, nbr, NfsmEvent::SeqNumberMismatch, now);
                return;
            }
            let expected = if nbr.is_master() {
                nbr.dd.seqnum
            } else {
                nbr.dd.seqnum.wrapping_add(1)
            };
            if dd.seqnum != expected {
                ospf_packet_trace!(
                    oi.tracing,
                    Dd,
                    Recv,
                    "DD from {}: sequence number {} expected {}",
                    nbr.addr(),
                    dd.seqnum,
                    expected
                );
                ospf_nfsm(oi, nbr, NfsmEvent::SeqNumberMismatch, now);
                return;
            }
            ospf_db_desc_proc(oi, nbr, dd, now);
        }
        Loading | Full => {
            if is_dd_dup(dd, &nbr.dd.recv) {
                if !nbr.is_master() {
                    ospf_db_desc_resend(oi, nbr);
                }
                return;
            }
            ospf_nfsm(oi, nbr, NfsmEvent::SeqNumberMismatch, now);
        }
        _ => {}
    }
}

pub fn ospf_ls_req_send(oi: &mut OspfInterface, nbr: &mut Neighbor) {
    let max = ospf_ls_req_max_entries(oi.params.mtu);
    let mut req = OspfLsRequest::default();
    nbr.ls_req_sent = nbr.ls_req.keys().take(max).copied().collect();
    req.reqs = nbr.ls_req_sent.iter().map(|key| key.to_request()).collect();
    if req.reqs.is_empty() {
        return;
    }
    ospf_packet_trace!(
        oi.tracing,
        LsRequest,
        Send,
        "Send LS Request to {} ({} entries)",
        nbr.addr(),
        req.reqs.len()
    );
    let packet = oi.packet(Ospfv2Payload::LsRequest(req));
    oi.transport.send(oi.ifindex, nbr.addr(), packet);
    ospf_nfsm_ls_req_timer_on(oi, nbr);
}

pub fn ospf_ls_req_recv(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    req: &OspfLsRequest,
    now: Instant,
) {
    if nbr.state < NfsmState::Exchange {
        return;
    }
    let mut lsas = Vec::new();
    for entry in req.reqs.iter() {
        let key = LsaKey::from(entry);
        let found = oi
            .lookup(&key)
            .map(|lsa| lsa.for_transmit(now, oi.params.transmit_delay));
        let Some(lsa) = found else {
            ospf_packet_trace!(oi.tracing, LsRequest, Recv, "LS Request for unknown {}", key);
            ospf_nfsm(oi, nbr, NfsmEvent::BadLSReq, now);
            return;
        };
        lsas.push(lsa);
    }
    let (router_id, area_id) = (oi.router_id, oi.area_id);
    ospf_ls_upd_send(
        oi.transport,
        |payload| Ospfv2Packet::new(&router_id, &area_id, payload),
        oi.ifindex,
        nbr.addr(),
        lsas,
        oi.params.mtu,
    );
}

pub fn ospf_ls_ack_recv(oi: &mut OspfInterface, nbr: &mut Neighbor, ack: &OspfLsAck) {
    if nbr.state < NfsmState::Exchange {
        return;
    }
    for h in ack.lsa_headers.iter() {
        nbr.ls_rxmt.ack(h);
    }
    if nbr.ls_rxmt.is_empty() {
        timer_cancel(oi.timers, &mut nbr.timer.ls_upd);
    }
}

/// Retransmit LS Updates whose interval elapsed and rearm the timer.
pub fn ospf_ls_rxmt_send(
    oi: &mut OspfInterface,
    nbr: &mut Neighbor,
    now: Instant,
) -> Result<(), OspfError> {
    if nbr.state < NfsmState::Exchange || nbr.ls_rxmt.is_empty() {
        return Ok(());
    }
    let mut lsas = Vec::new();
    for key in nbr.ls_rxmt.due(now, oi.params.rxmt()) {
        let Some(lsa) = oi.lookup(&key) else {
            return Err(OspfError::DanglingRetransmit {
                key,
                nbr: nbr.addr(),
            });
        };
        lsas.push(lsa.for_transmit(now, oi.params.transmit_delay));
        nbr.ls_rxmt.touch(&key, now);
    }
    if !lsas.is_empty() {
        ospf_event_trace!(
            oi.tracing,
            Retransmit,
            "Retransmit {} LSAs to {}",
            lsas.len(),
            nbr.addr()
        );
        let (router_id, area_id) = (oi.router_id, oi.area_id);
        ospf_ls_upd_send(
            oi.transport,
            |payload| Ospfv2Packet::new(&router_id, &area_id, payload),
            oi.ifindex,
            nbr.addr(),
            lsas,
            oi.params.mtu,
        );
    }
    ospf_nfsm_ls_upd_timer_on(oi, nbr);
    Ok(())
}

pub fn ospf_ls_ack_delayed_add(link: &mut OspfLink, timers: &mut dyn TimerService, h: OspfLsaHeader) {
    link.ls_ack_delayed.push(h);
    if link.timer.ls_ack.is_none() {
        let token = TimerToken::new(TimerKind::LsAck(link.index), link.id, link.epoch);
        timer_arm(timers, &mut link.timer.ls_ack, link.params.ack(), token);
    }
}

pub fn ospf_ls_ack_delayed_send(
    link: &mut OspfLink,
    router_id: Ipv4Addr,
    transport: &mut dyn Transport,
    tracing: &OspfTracing,
) {
    if link.ls_ack_delayed.is_empty() {
        return;
    }
    let headers = std::mem::take(&mut link.ls_ack_delayed);
    let dests: Vec<Ipv4Addr> = match link.link_type() {
        LinkType::PointToPoint => vec![ALL_SPF_ROUTERS],
        LinkType::Broadcast => {
            if link.ident.is_dr_or_bdr() {
                vec![ALL_SPF_ROUTERS]
            } else {
                vec![ALL_D_ROUTERS]
            }
        }
        _ => link
            .nbrs
            .iter()
            .filter(|(_, nbr)| nbr.state >= NfsmState::Exchange)
            .map(|(addr, _)| *addr)
            .collect(),
    };
    ospf_packet_trace!(
        tracing,
        LsAck,
        Send,
        "Send delayed LS Ack on {} ({} headers)",
        link.name,
        headers.len()
    );
    for chunk in headers.chunks(ospf_ls_ack_max_headers(link.params.mtu)) {
        let ack = OspfLsAck {
            lsa_headers: chunk.to_vec(),
        };
        for dest in dests.iter() {
            let packet = Ospfv2Packet::new(
                &router_id,
                &link.area_id,
                Ospfv2Payload::LsAck(ack.clone()),
            );
            transport.send(link.index, *dest, packet);
        }
    }
}

fn ospf_ls_ack_direct_send(top: &mut Ospf, ifindex: u32, dest: Ipv4Addr, headers: Vec<OspfLsaHeader>) {
    let Some(link) = top.links.get(&ifindex) else {
        return;
    };
    ospf_packet_trace!(
        top.tracing,
        LsAck,
        Send,
        "Send direct LS Ack to {} ({} headers)",
        dest,
        headers.len()
    );
    for chunk in headers.chunks(ospf_ls_ack_max_headers(link.params.mtu)) {
        let ack = OspfLsAck {
            lsa_headers: chunk.to_vec(),
        };
        let packet = Ospfv2Packet::new(&top.router_id, &link.area_id, Ospfv2Payload::LsAck(ack));
        top.transport.send(ifindex, dest, packet);
    }
}

// Delayed ack for an LSA installed but not flooded back. A BDR only acks
// what it got from the DR.
fn ospf_ls_ack_delayed_maybe(top: &mut Ospf, ifindex: u32, src: Ipv4Addr, h: OspfLsaHeader) {
    let Some(link) = top.links.get_mut(&ifindex) else {
        return;
    };
    if link.ident.is_declared_bdr() && src != link.ident.d_router {
        return;
    }
    ospf_ls_ack_delayed_add(link, top.timers.as_mut(), h);
}

/// Process a received LS Update.
pub fn ospf_ls_upd_recv(
    top: &mut Ospf,
    ifindex: u32,
    src: Ipv4Addr,
    upd: &OspfLsUpdate,
    now: Instant,
) -> Result<(), OspfError> {
    let Some(link) = top.links.get(&ifindex) else {
        return Ok(());
    };
    let area_id = link.area_id;
    let is_virtual = link.is_virtual();
    let Some(nbr) = link.nbrs.get(&src) else {
        return Ok(());
    };
    if nbr.state < NfsmState::Exchange {
        ospf_packet_trace!(top.tracing, LsUpdate, Recv, "LS Update from {} in {}", src, nbr.state);
        return Ok(());
    }
    let external = top
        .areas
        .get(&area_id)
        .is_some_and(|area| area.external_routing);

    let mut acks = Vec::new();
    let mut sent_back = Vec::new();

    for lsa in upd.lsas.iter() {
        let key = LsaKey::from(&lsa.h);
        let scope = key.flood_scope();

        // Checksum and LS type.
        if !lsa.is_checksum_valid() {
            ospf_packet_trace!(top.tracing, LsUpdate, Recv, "Bad checksum {}", key);
            continue;
        }
        if !Lsdb::is_supported(key.ls_type) {
            ospf_packet_trace!(top.tracing, LsUpdate, Recv, "Unsupported LS type {}", key);
            continue;
        }
        if scope == FloodScope::As && (is_virtual || !external) {
            continue;
        }

        let version = LsaVersion::from(&lsa.h);
        let current = top
            .lookup(area_id, &key)
            .map(|lsa| (lsa.version_at(now), lsa.installed));

        // MaxAge LSA we do not hold, and nobody is exchanging.
        if version.is_maxage() && current.is_none() && !top.is_exchanging(area_id, scope) {
            acks.push(lsa.h.clone());
            continue;
        }

        let newer = match current {
            None => true,
            Some((cur, _)) => version.is_newer(&cur),
        };
        if newer {
            if let Some((_, installed)) = current {
                if now.saturating_duration_since(installed) < MIN_LS_ARRIVAL {
                    ospf_packet_trace!(top.tracing, LsUpdate, Recv, "MinLSArrival {}", key);
                    continue;
                }
            }
            top.rxmt_remove_all(area_id, &key);
            let outcome = match top.lsdb_mut(area_id, scope) {
                Some(lsdb) => lsdb.install(lsa.clone(), now),
                None => continue,
            };
            match outcome {
                LsdbOutcome::Rejected(RejectReason::SelfOriginated) => {
                    ospf_event_trace!(top.tracing, LsaOriginate, "Self-originated {} received", key);
                    top.db_changed(area_id, scope);
                    ospf_flood(top, area_id, key, None, now);
                }
                LsdbOutcome::Installed | LsdbOutcome::Refreshed => {
                    top.db_changed(area_id, scope);
                    let result = ospf_flood(top, area_id, key, Some((ifindex, src)), now);
                    if !result.flooded_back {
                        ospf_ls_ack_delayed_maybe(top, ifindex, src, lsa.h.clone());
                    }
                }
                _ => {}
            }
            continue;
        }

        let Some(link) = top.links.get_mut(&ifindex) else {
            break;
        };
        let is_bdr_from_dr = link.ident.is_declared_bdr() && src == link.ident.d_router;
        let Some(nbr) = link.nbrs.get_mut(&src) else {
            break;
        };

        // On the request list while not newer.
        if nbr.ls_req.contains_key(&key) {
            ospf_event_trace!(top.tracing, Adjacency, "BadLSReq: {} from {}", key, src);
            top.nfsm_event(ifindex, src, NfsmEvent::BadLSReq, now);
            break;
        }

        let Some((cur, _)) = current else {
            continue;
        };
        if version.is_same(&cur) {
            if nbr.ls_rxmt.remove(&key).is_some() {
                // Implied acknowledgment.
                if nbr.ls_rxmt.is_empty() {
                    timer_cancel(top.timers.as_mut(), &mut nbr.timer.ls_upd);
                }
                if is_bdr_from_dr {
                    ospf_ls_ack_delayed_add(link, top.timers.as_mut(), lsa.h.clone());
                }
            } else {
                acks.push(lsa.h.clone());
            }
            continue;
        }

        // Our copy is newer.
        if cur.is_maxage() && cur.seq == MAX_SEQUENCE_NUMBER {
            continue;
        }
        let recent = nbr
            .sent_back
            .get(&key)
            .is_some_and(|sent| now.saturating_duration_since(*sent) < MIN_LS_ARRIVAL);
        if recent {
            continue;
        }
        nbr.sent_back.insert(key, now);
        let delay = link.params.transmit_delay;
        if let Some(lsa) = top.lookup(area_id, &key) {
            sent_back.push(lsa.for_transmit(now, delay));
        }
    }

    if !acks.is_empty() {
        ospf_ls_ack_direct_send(top, ifindex, src, acks);
    }
    if !sent_back.is_empty() {
        if let Some(link) = top.links.get(&ifindex) {
            let (router_id, area_id, mtu) = (top.router_id, link.area_id, link.params.mtu);
            ospf_ls_upd_send(
                top.transport.as_mut(),
                |payload| Ospfv2Packet::new(&router_id, &area_id, payload),
                ifindex,
                src,
                sent_back,
                mtu,
            );
        }
    }

    // Everything asked for last time arrived: request the next batch now.
    if let Some((mut oi, nbr)) = top.ospf_interface(ifindex, &src) {
        let answered = nbr.ls_req_sent.is_empty() && !nbr.ls_req.is_empty();
        if nbr.state == NfsmState::Loading && answered {
            ospf_ls_req_send(&mut oi, nbr);
        }
    }
    Ok(())
}
