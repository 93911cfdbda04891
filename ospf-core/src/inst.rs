use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use ipnet::Ipv4Net;
use ospf_packet::*;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::area::OspfAreaMap;
use crate::config::{OspfConfig, OspfLinkConfig, RelayChangePolicy};
use crate::error::OspfError;
use crate::flood::ospf_flood;
use crate::ident::Identity;
use crate::link::{LinkParams, OspfLink};
use crate::lsa::{Lsa, LsaKey};
use crate::lsdb::{LsdbOutcome, Lsdb, RejectReason};
use crate::neigh::Neighbor;
use crate::network::Transport;
use crate::nfsm::{NfsmEvent, NfsmState, ospf_nfsm};
use crate::packet::{
    ospf_db_desc_recv, ospf_db_desc_resend, ospf_hello_recv, ospf_hello_send,
    ospf_ls_ack_delayed_send, ospf_ls_ack_recv, ospf_ls_req_recv, ospf_ls_req_send,
    ospf_ls_rxmt_send, ospf_ls_upd_recv,
};
use crate::task::{TimerHandle, TimerKind, TimerService, TimerToken, timer_arm, timer_cancel};
use crate::tracing::OspfTracing;
use crate::{
    ospf_database_trace, ospf_error, ospf_event_trace, ospf_info, ospf_packet_trace, ospf_warn,
};

/// Aging granularity of the databases.
pub const AGE_TICK: Duration = Duration::from_secs(1);

/// Events published to the routing table and election layers.
#[derive(Debug, Clone, PartialEq)]
pub enum OspfNotify {
    DatabaseChanged(Ipv4Addr),
    NeighborChange {
        ifindex: u32,
        router_id: Ipv4Addr,
        state: NfsmState,
    },
    SequenceWrap(LsaKey),
    AreaHalted(Ipv4Addr, String),
}

#[derive(Debug)]
pub enum Message {
    Recv(u32, Ipv4Addr, Ospfv2Packet),
    Timer(TimerHandle, TimerToken),
    LinkUp(u32),
    LinkDown(u32),
    Designated(u32, Ipv4Addr, Ipv4Addr),
}

#[derive(Debug, Default)]
pub struct OspfTimer {
    pub age: Option<TimerHandle>,
}

pub struct Ospf {
    pub router_id: Ipv4Addr,
    pub config: OspfConfig,
    pub links: BTreeMap<u32, OspfLink>,
    pub areas: OspfAreaMap,
    pub lsdb_as: Lsdb,
    pub tracing: OspfTracing,
    pub timers: Box<dyn TimerService>,
    pub transport: Box<dyn Transport>,
    pub notify: UnboundedSender<OspfNotify>,
    pub timer: OspfTimer,
    seq: u64,
}

// OSPF interface structure which points out upper layer struct members.
pub struct OspfInterface<'a> {
    pub router_id: Ipv4Addr,
    pub area_id: Ipv4Addr,
    pub ifindex: u32,
    pub ident: &'a Identity,
    pub params: &'a LinkParams,
    pub options: OspfOptions,
    pub lsdb: &'a Lsdb,
    pub lsdb_as: &'a Lsdb,
    pub timers: &'a mut dyn TimerService,
    pub transport: &'a mut dyn Transport,
    pub tracing: &'a OspfTracing,
    pub notify: &'a UnboundedSender<OspfNotify>,
    pub relay_change: RelayChangePolicy,
    pub db_desc_in: &'a mut usize,
}

impl OspfInterface<'_> {
    pub fn packet(&self, payload: Ospfv2Payload) -> Ospfv2Packet {
        Ospfv2Packet::new(&self.router_id, &self.area_id, payload)
    }

    /// Current record for the key in the database of its flooding scope.
    pub fn lookup(&self, key: &LsaKey) -> Option<&Lsa> {
        match key.flood_scope() {
            FloodScope::Area => self.lsdb.lookup(key),
            FloodScope::As => self.lsdb_as.lookup(key),
            _ => None,
        }
    }
}

/// Options we advertise in Hello and DD packets.
pub fn ospf_options(external: bool) -> OspfOptions {
    OspfOptions::new().with_external(external)
}

impl Ospf {
    pub fn new(
        config: OspfConfig,
        timers: Box<dyn TimerService>,
        transport: Box<dyn Transport>,
        notify: UnboundedSender<OspfNotify>,
    ) -> Result<Self, OspfError> {
        config.validate()?;
        let mut lsdb_as = Lsdb::new(config.router_id);
        lsdb_as.set_ls_refresh_time(config.ls_refresh_time);
        Ok(Self {
            router_id: config.router_id,
            config,
            links: BTreeMap::new(),
            areas: OspfAreaMap::new(),
            lsdb_as,
            tracing: OspfTracing::default(),
            timers,
            transport,
            notify,
            timer: OspfTimer::default(),
            seq: 0,
        })
    }

    pub(crate) fn next_id(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub fn ospf_interface<'a>(
        &'a mut self,
        ifindex: u32,
        src: &Ipv4Addr,
    ) -> Option<(OspfInterface<'a>, &'a mut Neighbor)> {
        let link = self.links.get_mut(&ifindex)?;
        let area = self.areas.get(&link.area_id)?;
        let nbr = link.nbrs.get_mut(src)?;
        let oi = OspfInterface {
            router_id: self.router_id,
            area_id: link.area_id,
            ifindex,
            ident: &link.ident,
            params: &link.params,
            options: ospf_options(area.external_routing),
            lsdb: &area.lsdb,
            lsdb_as: &self.lsdb_as,
            timers: self.timers.as_mut(),
            transport: self.transport.as_mut(),
            tracing: &self.tracing,
            notify: &self.notify,
            relay_change: self.config.relay_change,
            db_desc_in: &mut link.db_desc_in,
        };
        Some((oi, nbr))
    }

    /// Run one neighbor state machine event.
    pub fn nfsm_event(&mut self, ifindex: u32, addr: Ipv4Addr, ev: NfsmEvent, now: Instant) {
        if let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &addr) {
            ospf_nfsm(&mut oi, nbr, ev, now);
        }
        self.nbr_cleanup(ifindex, addr);
    }

    // Neighbors that went Down are forgotten unless statically configured.
    fn nbr_cleanup(&mut self, ifindex: u32, addr: Ipv4Addr) {
        let Some(link) = self.links.get_mut(&ifindex) else {
            return;
        };
        let remove = link
            .nbrs
            .get(&addr)
            .is_some_and(|nbr| nbr.state == NfsmState::Down && !nbr.flags.nbma_static());
        if remove {
            link.nbrs.remove(&addr);
        }
    }

    pub fn link_add(&mut self, config: &OspfLinkConfig) -> Result<(), OspfError> {
        config.validate(&self.config)?;
        if self.links.contains_key(&config.ifindex) {
            return Err(OspfError::config(format!(
                "interface {} already configured",
                config.name
            )));
        }
        let id = self.next_id();
        let mut link = OspfLink::from(&self.config, config, id);
        let area = self.areas.fetch(config.area, self.router_id);
        area.lsdb.set_ls_refresh_time(self.config.ls_refresh_time);
        area.links.insert(config.ifindex);
        for addr in config.neighbors.iter() {
            let id = self.next_id();
            link.nbrs_static.insert(*addr);
            link.nbrs.insert(*addr, ospf_static_nbr(&link, *addr, id));
        }
        ospf_info!("Interface {} added to area {}", config.name, config.area);
        self.links.insert(config.ifindex, link);
        Ok(())
    }

    pub fn link_up(&mut self, ifindex: u32, now: Instant) -> Result<(), OspfError> {
        let Some(link) = self.links.get_mut(&ifindex) else {
            return Err(OspfError::UnknownInterface { ifindex });
        };
        if link.enabled {
            return Ok(());
        }
        link.enabled = true;
        link.epoch += 1;
        let statics: Vec<Ipv4Addr> = link.nbrs_static.iter().copied().collect();
        ospf_info!("Interface {} up", link.name);

        self.hello_timer_expire(ifindex);
        for addr in statics {
            self.nfsm_event(ifindex, addr, NfsmEvent::Start, now);
        }
        Ok(())
    }

    pub fn link_down(&mut self, ifindex: u32, now: Instant) -> Result<(), OspfError> {
        let Some(link) = self.links.get_mut(&ifindex) else {
            return Err(OspfError::UnknownInterface { ifindex });
        };
        if !link.enabled {
            return Ok(());
        }
        let addrs: Vec<Ipv4Addr> = link.nbrs.keys().copied().collect();
        for addr in addrs {
            self.nfsm_event(ifindex, addr, NfsmEvent::LLDown, now);
        }
        let Some(link) = self.links.get_mut(&ifindex) else {
            return Ok(());
        };
        link.enabled = false;
        link.epoch += 1;
        link.flags.set_hello_sent(false);
        link.ls_ack_delayed.clear();
        timer_cancel(self.timers.as_mut(), &mut link.timer.hello);
        timer_cancel(self.timers.as_mut(), &mut link.timer.ls_ack);
        ospf_info!("Interface {} down", link.name);
        Ok(())
    }

    /// Apply an externally computed DR/BDR designation to an interface.
    pub fn set_designated(
        &mut self,
        ifindex: u32,
        d_router: Ipv4Addr,
        bd_router: Ipv4Addr,
        now: Instant,
    ) -> Result<(), OspfError> {
        let Some(link) = self.links.get_mut(&ifindex) else {
            return Err(OspfError::UnknownInterface { ifindex });
        };
        if link.ident.d_router == d_router && link.ident.bd_router == bd_router {
            return Ok(());
        }
        link.ident.d_router = d_router;
        link.ident.bd_router = bd_router;
        let addrs: Vec<Ipv4Addr> = link
            .nbrs
            .iter()
            .filter(|(_, nbr)| nbr.state >= NfsmState::TwoWay)
            .map(|(addr, _)| *addr)
            .collect();
        for addr in addrs {
            self.nfsm_event(ifindex, addr, NfsmEvent::AdjOk, now);
        }
        Ok(())
    }

    /// Configure a neighbor on an NBMA or virtual link.
    pub fn nbma_neighbor_add(
        &mut self,
        ifindex: u32,
        addr: Ipv4Addr,
        now: Instant,
    ) -> Result<(), OspfError> {
        let id = self.next_id();
        let Some(link) = self.links.get_mut(&ifindex) else {
            return Err(OspfError::UnknownInterface { ifindex });
        };
        if !link.nbrs_static.insert(addr) {
            return Ok(());
        }
        if !link.nbrs.contains_key(&addr) {
            let nbr = ospf_static_nbr(link, addr, id);
            link.nbrs.insert(addr, nbr);
        }
        if link.enabled {
            self.nfsm_event(ifindex, addr, NfsmEvent::Start, now);
        }
        Ok(())
    }

    fn area_check(&self, area_id: &Ipv4Addr) -> Result<(), OspfError> {
        let Some(area) = self.areas.get(area_id) else {
            return Err(OspfError::UnknownArea { area: *area_id });
        };
        if area.is_halted() {
            return Err(OspfError::AreaHalted { area: *area_id });
        }
        Ok(())
    }

    /// Originate a new instance of one of our LSAs and flood it.
    pub fn originate_lsa(
        &mut self,
        area_id: Ipv4Addr,
        ls_type: OspfLsType,
        ls_id: Ipv4Addr,
        options: OspfOptions,
        body: Bytes,
        now: Instant,
    ) -> Result<LsaKey, OspfError> {
        self.area_check(&area_id)?;
        let scope = ls_type.flood_scope();
        let origination = match scope {
            FloodScope::As => self.lsdb_as.originate(ls_type, ls_id, options, body, now),
            _ => {
                let Some(area) = self.areas.get_mut(&area_id) else {
                    return Err(OspfError::UnknownArea { area: area_id });
                };
                area.lsdb.originate(ls_type, ls_id, options, body, now)
            }
        };
        let key = origination.key;
        match origination.outcome {
            LsdbOutcome::Rejected(RejectReason::UnsupportedLsType) => {
                return Err(OspfError::config(format!(
                    "cannot originate LS type {}",
                    ls_type
                )));
            }
            LsdbOutcome::NoChange => return Ok(key),
            _ => {}
        }
        ospf_event_trace!(self.tracing, LsaOriginate, "Originate {}", key);
        if origination.seq_wrap {
            let _ = self.notify.send(OspfNotify::SequenceWrap(key));
        }
        self.db_changed(area_id, scope);
        ospf_flood(self, area_id, key, None, now);
        Ok(key)
    }

    /// Prematurely age one of our LSAs and flood the MaxAge instance.
    pub fn flush_lsa(&mut self, area_id: Ipv4Addr, key: LsaKey, now: Instant) -> Result<bool, OspfError> {
        self.area_check(&area_id)?;
        let scope = key.flood_scope();
        let flushed = match self.lsdb_mut(area_id, scope) {
            Some(lsdb) => lsdb.flush(&key, now),
            None => false,
        };
        if flushed {
            ospf_event_trace!(self.tracing, LsaFlush, "Flush {}", key);
            self.db_changed(area_id, scope);
            ospf_flood(self, area_id, key, None, now);
        }
        Ok(flushed)
    }

    pub fn lsdb_mut(&mut self, area_id: Ipv4Addr, scope: FloodScope) -> Option<&mut Lsdb> {
        match scope {
            FloodScope::Area => self.areas.get_mut(&area_id).map(|area| &mut area.lsdb),
            FloodScope::As => Some(&mut self.lsdb_as),
            _ => None,
        }
    }

    pub fn lookup(&self, area_id: Ipv4Addr, key: &LsaKey) -> Option<&Lsa> {
        match key.flood_scope() {
            FloodScope::Area => self.areas.get(&area_id)?.lsdb.lookup(key),
            FloodScope::As => self.lsdb_as.lookup(key),
            _ => None,
        }
    }

    /// Interfaces an LSA of the scope floods over.
    pub fn flood_links(&self, area_id: Ipv4Addr, scope: FloodScope) -> Vec<u32> {
        match scope {
            FloodScope::Area => self
                .areas
                .get(&area_id)
                .map(|area| area.links.iter().copied().collect())
                .unwrap_or_default(),
            FloodScope::As => self
                .areas
                .iter()
                .filter(|(_, area)| area.external_routing && !area.is_halted())
                .flat_map(|(_, area)| area.links.iter().copied())
                .filter(|ifindex| self.links.get(ifindex).is_some_and(|link| !link.is_virtual()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A neighbor on the scope's interfaces is in Exchange or Loading.
    pub fn is_exchanging(&self, area_id: Ipv4Addr, scope: FloodScope) -> bool {
        let links = match scope {
            FloodScope::As => self.links.keys().copied().collect(),
            _ => self.flood_links(area_id, scope),
        };
        links
            .iter()
            .filter_map(|ifindex| self.links.get(ifindex))
            .any(|link| link.is_exchanging())
    }

    /// Drop the key from every retransmission list of the scope.
    pub fn rxmt_remove_all(&mut self, area_id: Ipv4Addr, key: &LsaKey) {
        let links = match key.flood_scope() {
            FloodScope::As => self.links.keys().copied().collect(),
            scope => self.flood_links(area_id, scope),
        };
        for ifindex in links {
            let Some(link) = self.links.get_mut(&ifindex) else {
                continue;
            };
            for nbr in link.nbrs.values_mut() {
                if nbr.ls_rxmt.remove(key).is_some() && nbr.ls_rxmt.is_empty() {
                    timer_cancel(self.timers.as_mut(), &mut nbr.timer.ls_upd);
                }
            }
        }
    }

    pub fn db_changed(&self, area_id: Ipv4Addr, scope: FloodScope) {
        match scope {
            FloodScope::As => {
                for (area_id, _) in self.areas.iter() {
                    let _ = self.notify.send(OspfNotify::DatabaseChanged(*area_id));
                }
            }
            _ => {
                let _ = self.notify.send(OspfNotify::DatabaseChanged(area_id));
            }
        }
    }

    /// Log an error raised inside an area. Invariant violations halt it.
    pub fn area_error(&mut self, area_id: Ipv4Addr, err: OspfError) {
        if !err.is_fatal() {
            ospf_warn!("Area {}: {}", area_id, err);
            return;
        }
        ospf_error!("Area {} halted: {}", area_id, err);
        if let Some(area) = self.areas.get_mut(&area_id) {
            area.halted = Some(err.to_string());
        }
        let _ = self
            .notify
            .send(OspfNotify::AreaHalted(area_id, err.to_string()));
    }

    fn is_halted(&self, area_id: &Ipv4Addr) -> bool {
        self.areas.get(area_id).is_none_or(|area| area.is_halted())
    }

    pub fn recv(&mut self, ifindex: u32, src: Ipv4Addr, packet: Ospfv2Packet, now: Instant) {
        let Some(link) = self.links.get(&ifindex) else {
            ospf_warn!("Packet from {} on unknown interface {}", src, ifindex);
            return;
        };
        if !link.enabled {
            return;
        }
        let area_id = link.area_id;
        if packet.area_id != area_id {
            ospf_packet_trace!(
                self.tracing,
                Hello,
                Recv,
                "Area mismatch from {}: {} != {}",
                src,
                packet.area_id,
                area_id
            );
            return;
        }
        if packet.router_id == self.router_id || self.is_halted(&area_id) {
            return;
        }

        match packet.payload {
            Ospfv2Payload::Hello(ref hello) => {
                ospf_packet_trace!(self.tracing, Hello, Recv, "Hello from {}", src);
                ospf_hello_recv(self, ifindex, src, packet.router_id, hello, now);
            }
            Ospfv2Payload::DbDesc(ref dd) => {
                ospf_packet_trace!(self.tracing, Dd, Recv, "DD from {}: {}", src, dd);
                if let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &src) {
                    ospf_db_desc_recv(&mut oi, nbr, dd, now);
                }
                self.nbr_cleanup(ifindex, src);
            }
            Ospfv2Payload::LsRequest(ref req) => {
                ospf_packet_trace!(
                    self.tracing,
                    LsRequest,
                    Recv,
                    "LS Request from {} ({} entries)",
                    src,
                    req.reqs.len()
                );
                if let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &src) {
                    ospf_ls_req_recv(&mut oi, nbr, req, now);
                }
                self.nbr_cleanup(ifindex, src);
            }
            Ospfv2Payload::LsUpdate(ref upd) => {
                ospf_packet_trace!(
                    self.tracing,
                    LsUpdate,
                    Recv,
                    "LS Update from {} ({} LSAs)",
                    src,
                    upd.lsas.len()
                );
                if let Err(err) = ospf_ls_upd_recv(self, ifindex, src, upd, now) {
                    self.area_error(area_id, err);
                }
                self.nbr_cleanup(ifindex, src);
            }
            Ospfv2Payload::LsAck(ref ack) => {
                ospf_packet_trace!(
                    self.tracing,
                    LsAck,
                    Recv,
                    "LS Ack from {} ({} headers)",
                    src,
                    ack.lsa_headers.len()
                );
                if let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &src) {
                    ospf_ls_ack_recv(&mut oi, nbr, ack);
                }
            }
        }
    }

    fn hello_timer_expire(&mut self, ifindex: u32) {
        let Some(link) = self.links.get_mut(&ifindex) else {
            return;
        };
        let external = self
            .areas
            .get(&link.area_id)
            .is_none_or(|area| area.external_routing);
        ospf_hello_send(
            link,
            self.router_id,
            ospf_options(external),
            self.transport.as_mut(),
            &self.tracing,
        );
        let token = TimerToken::new(TimerKind::Hello(ifindex), link.id, link.epoch);
        timer_arm(
            self.timers.as_mut(),
            &mut link.timer.hello,
            link.params.hello(),
            token,
        );
    }

    /// Dispatch an expired timer. Stale firings are dropped.
    pub fn timer_expired(&mut self, handle: TimerHandle, token: TimerToken, now: Instant) {
        // A handle fires once; release it whether or not the firing is current.
        self.timers.cancel(handle);
        match token.kind {
            TimerKind::Age => {
                if self.timer.age != Some(handle) {
                    return;
                }
                self.timer.age = None;
                self.age_tick(now);
                let token = TimerToken::new(TimerKind::Age, 0, 0);
                timer_arm(self.timers.as_mut(), &mut self.timer.age, AGE_TICK, token);
            }
            TimerKind::Hello(ifindex) | TimerKind::LsAck(ifindex) => {
                let Some(link) = self.links.get_mut(&ifindex) else {
                    return;
                };
                if link.id != token.owner || link.epoch != token.epoch || !link.enabled {
                    return;
                }
                let slot = match token.kind {
                    TimerKind::Hello(_) => &mut link.timer.hello,
                    _ => &mut link.timer.ls_ack,
                };
                if *slot != Some(handle) {
                    return;
                }
                *slot = None;
                let area_id = link.area_id;
                if self.is_halted(&area_id) {
                    return;
                }
                match token.kind {
                    TimerKind::Hello(_) => self.hello_timer_expire(ifindex),
                    _ => {
                        if let Some(link) = self.links.get_mut(&ifindex) {
                            ospf_ls_ack_delayed_send(
                                link,
                                self.router_id,
                                self.transport.as_mut(),
                                &self.tracing,
                            );
                        }
                    }
                }
            }
            TimerKind::Inactivity(ifindex, addr)
            | TimerKind::DbDesc(ifindex, addr)
            | TimerKind::LsReq(ifindex, addr)
            | TimerKind::LsUpd(ifindex, addr) => {
                self.nbr_timer_expire(ifindex, addr, handle, token, now);
            }
        }
    }

    fn nbr_timer_expire(
        &mut self,
        ifindex: u32,
        addr: Ipv4Addr,
        handle: TimerHandle,
        token: TimerToken,
        now: Instant,
    ) {
        let Some(link) = self.links.get_mut(&ifindex) else {
            return;
        };
        let area_id = link.area_id;
        let Some(nbr) = link.nbrs.get_mut(&addr) else {
            return;
        };
        if nbr.id != token.owner || nbr.epoch != token.epoch {
            return;
        }
        let slot = match token.kind {
            TimerKind::Inactivity(..) => &mut nbr.timer.inactivity,
            TimerKind::DbDesc(..) => &mut nbr.timer.db_desc,
            TimerKind::LsReq(..) => &mut nbr.timer.ls_req,
            _ => &mut nbr.timer.ls_upd,
        };
        if *slot != Some(handle) {
            return;
        }
        *slot = None;
        if self.is_halted(&area_id) {
            return;
        }

        match token.kind {
            TimerKind::Inactivity(..) => {
                ospf_event_trace!(
                    self.tracing,
                    Adjacency,
                    "Inactivity timer expired for {} on {}",
                    addr,
                    ifindex
                );
                self.nfsm_event(ifindex, addr, NfsmEvent::InactivityTimer, now);
            }
            TimerKind::DbDesc(..) => {
                if let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &addr) {
                    ospf_db_desc_resend(&mut oi, nbr);
                }
            }
            TimerKind::LsReq(..) => {
                if let Some((mut oi, nbr)) = self.ospf_interface(ifindex, &addr) {
                    if matches!(nbr.state, NfsmState::Exchange | NfsmState::Loading) {
                        ospf_ls_req_send(&mut oi, nbr);
                    }
                }
            }
            _ => {
                let result = match self.ospf_interface(ifindex, &addr) {
                    Some((mut oi, nbr)) => ospf_ls_rxmt_send(&mut oi, nbr, now),
                    None => Ok(()),
                };
                if let Err(err) = result {
                    self.area_error(area_id, err);
                }
            }
        }
    }

    /// Arm the database aging tick.
    pub fn start(&mut self) {
        let token = TimerToken::new(TimerKind::Age, 0, 0);
        timer_arm(self.timers.as_mut(), &mut self.timer.age, AGE_TICK, token);
    }

    /// One aging step: advance ages, refresh our own LSAs, flood what reached
    /// MaxAge and remove what is no longer needed.
    pub fn age_tick(&mut self, now: Instant) {
        for area_id in self.areas.ids() {
            if self.is_halted(&area_id) {
                continue;
            }
            let Some(area) = self.areas.get_mut(&area_id) else {
                continue;
            };
            let expired = area.lsdb.age(now);
            let refreshed = area.lsdb.refresh_self_originated(now);
            self.age_flood(area_id, FloodScope::Area, expired, refreshed, now);
        }
        let expired = self.lsdb_as.age(now);
        let refreshed = self.lsdb_as.refresh_self_originated(now);
        let area_id = self.areas.ids().first().copied().unwrap_or(Ipv4Addr::UNSPECIFIED);
        self.age_flood(area_id, FloodScope::As, expired, refreshed, now);

        self.maxage_walk(now);
    }

    fn age_flood(
        &mut self,
        area_id: Ipv4Addr,
        scope: FloodScope,
        expired: Vec<LsaKey>,
        refreshed: Vec<LsaKey>,
        now: Instant,
    ) {
        if expired.is_empty() && refreshed.is_empty() {
            return;
        }
        for key in expired.iter() {
            ospf_database_trace!(self.tracing, Aging, "{} reached MaxAge", key);
            ospf_flood(self, area_id, *key, None, now);
        }
        for key in refreshed.iter() {
            ospf_event_trace!(self.tracing, LsaRefresh, "Refresh {}", key);
            ospf_flood(self, area_id, *key, None, now);
        }
        self.db_changed(area_id, scope);
    }

    fn rxmt_referenced(&self, links: &[u32]) -> BTreeSet<LsaKey> {
        links
            .iter()
            .filter_map(|ifindex| self.links.get(ifindex))
            .flat_map(|link| link.nbrs.values())
            .flat_map(|nbr| nbr.ls_rxmt.keys().copied())
            .collect()
    }

    /// Remove MaxAge records that are acknowledged everywhere.
    pub fn maxage_walk(&mut self, now: Instant) {
        for area_id in self.areas.ids() {
            if self.is_halted(&area_id) || self.is_exchanging(area_id, FloodScope::Area) {
                continue;
            }
            let links = self.flood_links(area_id, FloodScope::Area);
            let referenced = self.rxmt_referenced(&links);
            let Some(area) = self.areas.get_mut(&area_id) else {
                continue;
            };
            let walk = area.lsdb.maxage_walk(|key| referenced.contains(key), now);
            if walk.is_empty() {
                continue;
            }
            for key in walk.removed.iter() {
                ospf_database_trace!(self.tracing, Lsdb, "Removed {}", key);
            }
            for key in walk.reoriginated.iter() {
                ospf_event_trace!(self.tracing, LsaOriginate, "Sequence wrap done {}", key);
                ospf_flood(self, area_id, *key, None, now);
            }
            self.db_changed(area_id, FloodScope::Area);
        }

        if self.is_exchanging(Ipv4Addr::UNSPECIFIED, FloodScope::As) {
            return;
        }
        let links: Vec<u32> = self.links.keys().copied().collect();
        let referenced = self.rxmt_referenced(&links);
        let walk = self
            .lsdb_as
            .maxage_walk(|key| referenced.contains(key), now);
        if walk.is_empty() {
            return;
        }
        let area_id = self.areas.ids().first().copied().unwrap_or(Ipv4Addr::UNSPECIFIED);
        for key in walk.reoriginated.iter() {
            ospf_flood(self, area_id, *key, None, now);
        }
        self.db_changed(area_id, FloodScope::As);
    }

    pub fn neighbor(&self, ifindex: u32, addr: &Ipv4Addr) -> Option<&Neighbor> {
        self.links.get(&ifindex)?.nbrs.get(addr)
    }

    pub fn neighbor_state(&self, router_id: Ipv4Addr) -> Option<NfsmState> {
        self.links
            .values()
            .flat_map(|link| link.nbrs.values())
            .find(|nbr| nbr.router_id() == router_id)
            .map(|nbr| nbr.state)
    }

    /// Copy of the area database, in key order.
    pub fn database_snapshot(&self, area_id: Ipv4Addr) -> Vec<Lsa> {
        self.areas
            .get(&area_id)
            .map(|area| area.lsdb.iter().map(|(_, lsa)| lsa.clone()).collect())
            .unwrap_or_default()
    }

    pub fn database_snapshot_as(&self) -> Vec<Lsa> {
        self.lsdb_as.iter().map(|(_, lsa)| lsa.clone()).collect()
    }

    pub fn process_msg(&mut self, msg: Message, now: Instant) {
        let result = match msg {
            Message::Recv(ifindex, src, packet) => {
                self.recv(ifindex, src, packet, now);
                Ok(())
            }
            Message::Timer(handle, token) => {
                self.timer_expired(handle, token, now);
                Ok(())
            }
            Message::LinkUp(ifindex) => self.link_up(ifindex, now),
            Message::LinkDown(ifindex) => self.link_down(ifindex, now),
            Message::Designated(ifindex, d_router, bd_router) => {
                self.set_designated(ifindex, d_router, bd_router, now)
            }
        };
        if let Err(err) = result {
            ospf_warn!("{}", err);
        }
    }

    pub async fn event_loop(&mut self, mut rx: UnboundedReceiver<Message>) {
        self.start();
        while let Some(msg) = rx.recv().await {
            self.process_msg(msg, Instant::now());
        }
    }
}

fn ospf_static_nbr(link: &OspfLink, addr: Ipv4Addr, id: u64) -> Neighbor {
    let prefix = Ipv4Net::new(addr, link.ident.prefix.prefix_len()).unwrap_or_default();
    let mut nbr = Neighbor::new(link.index, id, prefix, &Ipv4Addr::UNSPECIFIED);
    nbr.flags.set_nbma_static(true);
    nbr
}

pub fn serve(mut ospf: Ospf, rx: UnboundedReceiver<Message>) {
    tokio::spawn(async move {
        ospf.event_loop(rx).await;
    });
}
