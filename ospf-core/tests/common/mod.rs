#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::time::Instant;

use bytes::Bytes;
use ospf_core::{
    LinkType, LsaKey, ManualTimers, NfsmState, Ospf, OspfConfig, OspfLinkConfig, OspfNotify,
    OspfTracing, Outbound, QueueTransport, TimerKind,
};
use ospf_packet::{OspfLsType, OspfOptions, Ospfv2Packet};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing_subscriber::EnvFilter;

pub const IFINDEX: u32 = 1;
pub const AREA0: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// Log to the test writer, filtered by `RUST_LOG`.
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One router with a single interface, driven by hand.
pub struct Router {
    pub ospf: Ospf,
    pub timers: ManualTimers,
    pub transport: QueueTransport,
    pub notify: UnboundedReceiver<OspfNotify>,
    pub router_id: Ipv4Addr,
    pub addr: Ipv4Addr,
}

impl Router {
    pub fn new(router_id: Ipv4Addr, prefix: &str, link_type: LinkType) -> Self {
        tracing_init();
        let timers = ManualTimers::new();
        let transport = QueueTransport::new();
        let (tx, notify) = mpsc::unbounded_channel();
        let mut ospf = Ospf::new(
            OspfConfig::new(router_id),
            Box::new(timers.clone()),
            Box::new(transport.clone()),
            tx,
        )
        .unwrap();
        ospf.tracing = OspfTracing::all();
        let prefix: ipnet::Ipv4Net = prefix.parse().unwrap();
        let link = OspfLinkConfig::new(IFINDEX, "eth0", AREA0, prefix, link_type);
        ospf.link_add(&link).unwrap();
        Self {
            ospf,
            timers,
            transport,
            notify,
            router_id,
            addr: prefix.addr(),
        }
    }

    /// Deliver the first armed timer of the kind, as if it expired.
    pub fn fire(&mut self, kind: TimerKind, now: Instant) -> bool {
        match self.timers.take(kind) {
            Some((handle, token)) => {
                self.ospf.timer_expired(handle, token, now);
                true
            }
            None => false,
        }
    }

    pub fn state(&self, peer: &Router) -> Option<NfsmState> {
        self.ospf
            .neighbor(IFINDEX, &peer.addr)
            .map(|nbr| nbr.state)
    }

    pub fn notifications(&mut self) -> Vec<OspfNotify> {
        let mut out = Vec::new();
        while let Ok(notify) = self.notify.try_recv() {
            out.push(notify);
        }
        out
    }

    pub fn originate(&mut self, ls_id: Ipv4Addr, body: &'static [u8], now: Instant) -> LsaKey {
        self.ospf
            .originate_lsa(
                AREA0,
                OspfLsType::Router,
                ls_id,
                OspfOptions::new().with_external(true),
                Bytes::from_static(body),
                now,
            )
            .unwrap()
    }
}

pub fn p2p_pair() -> (Router, Router) {
    let a = Router::new(
        Ipv4Addr::new(1, 1, 1, 1),
        "10.0.0.1/30",
        LinkType::PointToPoint,
    );
    let b = Router::new(
        Ipv4Addr::new(2, 2, 2, 2),
        "10.0.0.2/30",
        LinkType::PointToPoint,
    );
    (a, b)
}

/// Move everything `from` sent onto the wire into `to`, through the codec.
pub fn deliver(from: &Router, to: &mut Router, now: Instant) -> usize {
    let packets = from.transport.drain();
    let count = packets.len();
    for out in packets {
        let packet = wire(&out);
        to.ospf.recv(IFINDEX, from.addr, packet, now);
    }
    count
}

pub fn wire(out: &Outbound) -> Ospfv2Packet {
    Ospfv2Packet::parse(&out.encode()[..]).unwrap()
}

pub fn converge(a: &mut Router, b: &mut Router, now: Instant) {
    for _ in 0..32 {
        let moved = deliver(a, b, now) + deliver(b, a, now);
        if moved == 0 {
            return;
        }
    }
    panic!("routers did not settle");
}

/// Interfaces up, Hellos both ways, then the database exchange.
pub fn bring_up(a: &mut Router, b: &mut Router, now: Instant) {
    a.ospf.link_up(IFINDEX, now).unwrap();
    b.ospf.link_up(IFINDEX, now).unwrap();
    converge(a, b, now);
    a.fire(TimerKind::Hello(IFINDEX), now);
    b.fire(TimerKind::Hello(IFINDEX), now);
    converge(a, b, now);
}
