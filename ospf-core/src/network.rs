use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::BytesMut;
use ospf_packet::Ospfv2Packet;
use tokio::sync::mpsc::UnboundedSender;

pub const ALL_SPF_ROUTERS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 5);
pub const ALL_D_ROUTERS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 6);

/// Packet handed to the transport for one interface.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub ifindex: u32,
    pub dest: Ipv4Addr,
    pub packet: Ospfv2Packet,
}

impl Outbound {
    /// Wire encoding, length and checksum filled in.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.packet.emit(&mut buf);
        buf
    }
}

pub trait Transport: Send {
    fn send(&mut self, ifindex: u32, dest: Ipv4Addr, packet: Ospfv2Packet);
}

/// Hands packets to the socket writer task.
pub struct ChannelTransport {
    tx: UnboundedSender<Outbound>,
}

impl ChannelTransport {
    pub fn new(tx: UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, ifindex: u32, dest: Ipv4Addr, packet: Ospfv2Packet) {
        let _ = self.tx.send(Outbound {
            ifindex,
            dest,
            packet,
        });
    }
}

/// Transport that only queues packets. Clones share the queue, so a test can
/// hand one to the instance and drain the other.
#[derive(Debug, Default, Clone)]
pub struct QueueTransport {
    queue: Arc<Mutex<VecDeque<Outbound>>>,
}

impl QueueTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Outbound>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn drain(&self) -> Vec<Outbound> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Transport for QueueTransport {
    fn send(&mut self, ifindex: u32, dest: Ipv4Addr, packet: Ospfv2Packet) {
        self.lock().push_back(Outbound {
            ifindex,
            dest,
            packet,
        });
    }
}
