use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use crate::lsdb::Lsdb;

pub const AREA0: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

pub struct OspfArea {
    pub area_id: Ipv4Addr,
    pub lsdb: Lsdb,
    pub links: BTreeSet<u32>,
    // Set once an invariant violation stopped processing in this area.
    pub halted: Option<String>,
    pub external_routing: bool,
}

impl OspfArea {
    pub fn new(area_id: Ipv4Addr, router_id: Ipv4Addr) -> Self {
        Self {
            area_id,
            lsdb: Lsdb::new(router_id),
            links: BTreeSet::new(),
            halted: None,
            external_routing: true,
        }
    }

    pub fn is_backbone(&self) -> bool {
        self.area_id == AREA0
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }
}

#[derive(Default)]
pub struct OspfAreaMap {
    map: BTreeMap<Ipv4Addr, OspfArea>,
}

impl OspfAreaMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, area_id: &Ipv4Addr) -> Option<&OspfArea> {
        self.map.get(area_id)
    }

    pub fn get_mut(&mut self, area_id: &Ipv4Addr) -> Option<&mut OspfArea> {
        self.map.get_mut(area_id)
    }

    /// Area for the id, created on first use.
    pub fn fetch(&mut self, area_id: Ipv4Addr, router_id: Ipv4Addr) -> &mut OspfArea {
        self.map
            .entry(area_id)
            .or_insert_with(|| OspfArea::new(area_id, router_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Ipv4Addr, &OspfArea)> {
        self.map.iter()
    }

    pub fn ids(&self) -> Vec<Ipv4Addr> {
        self.map.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
