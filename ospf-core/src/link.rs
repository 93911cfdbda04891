use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::time::Duration;

use bitfield_struct::bitfield;
use ospf_packet::OspfLsaHeader;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::config::{OspfConfig, OspfLinkConfig};
use crate::ident::Identity;
use crate::neigh::Neighbor;
use crate::nfsm::NfsmState;
use crate::task::TimerHandle;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LinkType {
    PointToPoint,
    #[default]
    Broadcast,
    Nbma,
    PointToMultipoint,
    Virtual,
}

impl LinkType {
    /// Links where a designated router relays flooding.
    pub fn is_relay_capable(&self) -> bool {
        matches!(self, LinkType::Broadcast | LinkType::Nbma)
    }

    /// Links where every neighbor becomes adjacent.
    pub fn is_always_adjacent(&self) -> bool {
        matches!(
            self,
            LinkType::PointToPoint | LinkType::PointToMultipoint | LinkType::Virtual
        )
    }

    /// Links where packets go to each neighbor separately.
    pub fn is_unicast(&self) -> bool {
        matches!(
            self,
            LinkType::Nbma | LinkType::PointToMultipoint | LinkType::Virtual
        )
    }
}

/// Interface parameters with instance defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkParams {
    pub link_type: LinkType,
    pub hello_interval: u16,
    pub dead_interval: u32,
    pub rxmt_interval: u16,
    pub transmit_delay: u16,
    pub ack_delay: u16,
    pub priority: u8,
    pub mtu: u16,
}

impl LinkParams {
    pub fn resolve(config: &OspfConfig, link: &OspfLinkConfig) -> Self {
        Self {
            link_type: link.link_type,
            hello_interval: link.hello_interval.unwrap_or(config.hello_interval),
            dead_interval: link.dead_interval.unwrap_or(config.dead_interval),
            rxmt_interval: link.rxmt_interval.unwrap_or(config.rxmt_interval),
            transmit_delay: link.transmit_delay.unwrap_or(config.transmit_delay),
            ack_delay: config.ack_delay,
            priority: link.priority.unwrap_or(config.priority),
            mtu: link.mtu.unwrap_or(config.mtu),
        }
    }

    pub fn hello(&self) -> Duration {
        Duration::from_secs(self.hello_interval as u64)
    }

    pub fn dead(&self) -> Duration {
        Duration::from_secs(self.dead_interval as u64)
    }

    pub fn rxmt(&self) -> Duration {
        Duration::from_secs(self.rxmt_interval as u64)
    }

    pub fn ack(&self) -> Duration {
        Duration::from_secs(self.ack_delay as u64)
    }
}

pub struct OspfLink {
    pub index: u32,
    pub name: String,
    pub enabled: bool,
    pub area_id: Ipv4Addr,
    pub ident: Identity,
    pub params: LinkParams,
    pub nbrs: BTreeMap<Ipv4Addr, Neighbor>,
    // Statically configured neighbors on NBMA and virtual links.
    pub nbrs_static: BTreeSet<Ipv4Addr>,
    pub flags: OspfLinkFlags,
    pub timer: LinkTimer,
    pub ls_ack_delayed: Vec<OspfLsaHeader>,
    pub id: u64,
    pub epoch: u64,
    pub state_change: usize,
    pub db_desc_in: usize,
}

#[derive(Debug, Default)]
pub struct LinkTimer {
    pub hello: Option<TimerHandle>,
    pub ls_ack: Option<TimerHandle>,
}

impl OspfLink {
    pub fn from(config: &OspfConfig, link: &OspfLinkConfig, id: u64) -> Self {
        let params = LinkParams::resolve(config, link);
        let mut ident = Identity::new(config.router_id);
        ident.prefix = link.prefix;
        ident.priority = params.priority;
        Self {
            index: link.ifindex,
            name: link.name.to_owned(),
            enabled: false,
            area_id: link.area,
            ident,
            params,
            nbrs: BTreeMap::new(),
            nbrs_static: BTreeSet::new(),
            flags: OspfLinkFlags::new(),
            timer: LinkTimer::default(),
            ls_ack_delayed: Vec::new(),
            id,
            epoch: 0,
            state_change: 0,
            db_desc_in: 0,
        }
    }

    pub fn link_type(&self) -> LinkType {
        self.params.link_type
    }

    pub fn is_virtual(&self) -> bool {
        self.params.link_type == LinkType::Virtual
    }

    /// Neighbors in Exchange or Loading hold up MaxAge removal.
    pub fn is_exchanging(&self) -> bool {
        self.nbrs
            .values()
            .any(|nbr| matches!(nbr.state, NfsmState::Exchange | NfsmState::Loading))
    }

    pub fn full_nbr_count(&self) -> usize {
        self.nbrs
            .values()
            .filter(|nbr| nbr.state == NfsmState::Full)
            .count()
    }
}

#[bitfield(u8, debug = true)]
pub struct OspfLinkFlags {
    pub hello_sent: bool,
    pub resvd1: bool,
    #[bits(6)]
    pub resvd2: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_link_type_roles() {
        assert!(LinkType::Broadcast.is_relay_capable());
        assert!(LinkType::Nbma.is_relay_capable());
        assert!(!LinkType::PointToPoint.is_relay_capable());
        assert!(!LinkType::Virtual.is_relay_capable());

        assert!(LinkType::PointToMultipoint.is_always_adjacent());
        assert!(!LinkType::Broadcast.is_always_adjacent());
        assert!(LinkType::Nbma.is_unicast());
        assert!(!LinkType::PointToPoint.is_unicast());
    }

    #[test]
    fn test_link_type_names() {
        assert_eq!(LinkType::PointToMultipoint.to_string(), "point-to-multipoint");
        assert_eq!(LinkType::from_str("nbma").unwrap(), LinkType::Nbma);
        assert_eq!(LinkType::default(), LinkType::Broadcast);
    }

    #[test]
    fn test_params_resolve() {
        let config = OspfConfig::new(Ipv4Addr::new(1, 1, 1, 1));
        let mut link = OspfLinkConfig::new(
            2,
            "eth0",
            Ipv4Addr::UNSPECIFIED,
            "10.0.0.1/24".parse().unwrap(),
            LinkType::PointToPoint,
        );
        link.hello_interval = Some(5);
        link.dead_interval = Some(20);
        let params = LinkParams::resolve(&config, &link);
        assert_eq!(params.hello_interval, 5);
        assert_eq!(params.dead(), Duration::from_secs(20));
        assert_eq!(params.rxmt_interval, config.rxmt_interval);
        assert_eq!(params.mtu, 1500);

        let oi = OspfLink::from(&config, &link, 7);
        assert_eq!(oi.index, 2);
        assert_eq!(oi.ident.addr(), Ipv4Addr::new(10, 0, 0, 1));
        assert!(!oi.enabled);
        assert_eq!(oi.full_nbr_count(), 0);
    }
}
