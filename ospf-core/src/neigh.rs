use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::net::Ipv4Addr;
use std::time::Instant;

use bitfield_struct::bitfield;
use ipnet::Ipv4Net;
use ospf_packet::*;

use crate::ident::Identity;
use crate::lsa::LsaKey;
use crate::nfsm::NfsmState;
use crate::rxmt::LsRetransmit;
use crate::task::TimerHandle;

/// Fields of a DD packet used for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbDescRecv {
    pub options: OspfOptions,
    pub flags: DbDescFlags,
    pub seqnum: u32,
}

impl From<&OspfDbDesc> for DbDescRecv {
    fn from(dd: &OspfDbDesc) -> Self {
        Self {
            options: dd.options,
            flags: dd.flags,
            seqnum: dd.seqnum,
        }
    }
}

#[derive(Debug, Default)]
pub struct DbDescState {
    pub seqnum: u32,
    pub flags: DbDescFlags,
    pub recv: Option<DbDescRecv>,
    pub last_sent: Option<OspfDbDesc>,
}

#[derive(Debug, Default)]
pub struct NeighborTimer {
    pub inactivity: Option<TimerHandle>,
    pub db_desc: Option<TimerHandle>,
    pub ls_req: Option<TimerHandle>,
    pub ls_upd: Option<TimerHandle>,
}

#[bitfield(u8, debug = true)]
pub struct NeighborFlags {
    pub dd_init: bool,
    pub nbma_static: bool,
    #[bits(6)]
    pub resvd: u8,
}

#[derive(Debug)]
pub struct Neighbor {
    pub ifindex: u32,
    pub id: u64,
    pub epoch: u64,
    pub ident: Identity,
    pub state: NfsmState,
    pub ostate: NfsmState,
    pub state_change: usize,
    pub options: OspfOptions,
    pub flags: NeighborFlags,
    pub dd: DbDescState,
    pub db_sum: VecDeque<OspfLsaHeader>,
    pub ls_req: BTreeMap<LsaKey, OspfLsaHeader>,
    // Entries of the last LS Request still unanswered.
    pub ls_req_sent: BTreeSet<LsaKey>,
    pub ls_rxmt: LsRetransmit,
    // Last time our newer copy was sent back for an identity.
    pub sent_back: BTreeMap<LsaKey, Instant>,
    pub timer: NeighborTimer,
}

impl Neighbor {
    pub fn new(ifindex: u32, id: u64, prefix: Ipv4Net, router_id: &Ipv4Addr) -> Self {
        let mut ident = Identity::new(*router_id);
        ident.prefix = prefix;
        Self {
            ifindex,
            id,
            epoch: 0,
            ident,
            state: NfsmState::Down,
            ostate: NfsmState::Down,
            state_change: 0,
            options: OspfOptions::default(),
            flags: NeighborFlags::new(),
            dd: DbDescState::default(),
            db_sum: VecDeque::new(),
            ls_req: BTreeMap::new(),
            ls_req_sent: BTreeSet::new(),
            ls_rxmt: LsRetransmit::new(),
            sent_back: BTreeMap::new(),
            timer: NeighborTimer::default(),
        }
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.ident.prefix.addr()
    }

    pub fn router_id(&self) -> Ipv4Addr {
        self.ident.router_id
    }

    pub fn is_master(&self) -> bool {
        self.dd.flags.master()
    }

    pub fn ls_req_add(&mut self, h: &OspfLsaHeader) {
        self.ls_req.insert(LsaKey::from(h), h.clone());
    }

    pub fn ls_req_remove(&mut self, key: &LsaKey) -> Option<OspfLsaHeader> {
        self.ls_req_sent.remove(key);
        self.ls_req.remove(key)
    }

    /// Drop the summary, request and retransmission lists.
    pub fn reset_lists(&mut self) {
        self.db_sum.clear();
        self.ls_req.clear();
        self.ls_req_sent.clear();
        self.ls_rxmt.clear();
        self.sent_back.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(seq: i32) -> OspfLsaHeader {
        let mut h = OspfLsaHeader::new(
            OspfLsType::Network,
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(2, 2, 2, 2),
        );
        h.ls_seq_number = seq;
        h
    }

    #[test]
    fn test_neighbor_new() {
        let nbr = Neighbor::new(
            3,
            9,
            "10.0.0.2/24".parse().unwrap(),
            &Ipv4Addr::new(2, 2, 2, 2),
        );
        assert_eq!(nbr.addr(), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(nbr.router_id(), Ipv4Addr::new(2, 2, 2, 2));
        assert_eq!(nbr.state, NfsmState::Down);
        assert!(!nbr.is_master());
    }

    #[test]
    fn test_request_list() {
        let mut nbr = Neighbor::new(
            3,
            9,
            "10.0.0.2/24".parse().unwrap(),
            &Ipv4Addr::new(2, 2, 2, 2),
        );
        nbr.ls_req_add(&header(1));
        nbr.ls_req_add(&header(2));
        assert_eq!(nbr.ls_req.len(), 1);
        let key = LsaKey::from(&header(2));
        assert_eq!(nbr.ls_req.get(&key).map(|h| h.ls_seq_number), Some(2));

        nbr.ls_rxmt.add(header(2), Instant::now());
        nbr.db_sum.push_back(header(2));
        nbr.reset_lists();
        assert!(nbr.ls_req.is_empty());
        assert!(nbr.ls_rxmt.is_empty());
        assert!(nbr.db_sum.is_empty());
        assert!(nbr.ls_req_remove(&key).is_none());
    }

    #[test]
    fn test_request_answered() {
        let mut nbr = Neighbor::new(
            3,
            9,
            "10.0.0.2/24".parse().unwrap(),
            &Ipv4Addr::new(2, 2, 2, 2),
        );
        let mut other = header(1);
        other.ls_id = Ipv4Addr::new(10, 0, 0, 3);
        nbr.ls_req_add(&header(1));
        nbr.ls_req_add(&other);
        let key = LsaKey::from(&header(1));
        nbr.ls_req_sent.insert(key);

        // Answering the outstanding entry leaves the rest of the list.
        nbr.ls_req_remove(&key);
        assert!(nbr.ls_req_sent.is_empty());
        assert_eq!(nbr.ls_req.len(), 1);

        nbr.ls_req_sent.insert(LsaKey::from(&other));
        nbr.reset_lists();
        assert!(nbr.ls_req_sent.is_empty());
    }
}
