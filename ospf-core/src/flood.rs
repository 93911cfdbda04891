use std::cmp::Ordering;
use std::net::Ipv4Addr;
use std::time::Instant;

use ospf_packet::*;

use crate::inst::Ospf;
use crate::link::{LinkType, OspfLink};
use crate::lsa::{LsaKey, ospf_lsa_compare};
use crate::neigh::Neighbor;
use crate::network::{ALL_D_ROUTERS, ALL_SPF_ROUTERS};
use crate::nfsm::{NfsmEvent, NfsmState};
use crate::ospf_event_trace;
use crate::packet::ospf_ls_upd_send;
use crate::task::{TimerKind, TimerToken, timer_arm};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FloodResult {
    /// The LSA went back out the interface it arrived on.
    pub flooded_back: bool,
    /// Neighbors whose request list emptied while Loading.
    pub loading_done: Vec<(u32, Ipv4Addr)>,
}

// Consult the request list of a neighbor still synchronizing. Returns true
// when the neighbor must not receive the LSA.
fn ospf_flood_ls_req_check(nbr: &mut Neighbor, key: &LsaKey, h: &OspfLsaHeader) -> bool {
    let Some(req) = nbr.ls_req.get(key) else {
        return false;
    };
    match ospf_lsa_compare(h, req) {
        Ordering::Less => true,
        Ordering::Equal => {
            nbr.ls_req_remove(key);
            true
        }
        Ordering::Greater => {
            nbr.ls_req_remove(key);
            false
        }
    }
}

// Relay-capable links with a DR: a DROther only floods to the DR and BDR.
fn ospf_flood_relay_skip(link: &OspfLink, addr: &Ipv4Addr) -> bool {
    link.link_type().is_relay_capable()
        && link.ident.has_dr()
        && !link.ident.is_dr_or_bdr()
        && *addr != link.ident.d_router
        && *addr != link.ident.bd_router
}

/// Flood the current database copy of `key`. `source` is the interface and
/// neighbor address it was received from, `None` for local changes.
pub fn ospf_flood(
    top: &mut Ospf,
    area_id: Ipv4Addr,
    key: LsaKey,
    source: Option<(u32, Ipv4Addr)>,
    now: Instant,
) -> FloodResult {
    let mut result = FloodResult::default();
    let Some(lsa) = top.lookup(area_id, &key).cloned() else {
        return result;
    };
    let h = lsa.header_at(now);
    let scope = key.flood_scope();

    for ifindex in top.flood_links(area_id, scope) {
        let Some(link) = top.links.get_mut(&ifindex) else {
            continue;
        };
        if !link.enabled {
            continue;
        }

        let mut receivers = Vec::new();
        let relay: Vec<Ipv4Addr> = link
            .nbrs
            .keys()
            .filter(|addr| ospf_flood_relay_skip(link, addr))
            .copied()
            .collect();
        for (addr, nbr) in link.nbrs.iter_mut() {
            if nbr.state < NfsmState::Exchange {
                continue;
            }
            if nbr.state != NfsmState::Full {
                let skip = ospf_flood_ls_req_check(nbr, &key, &h);
                if nbr.state == NfsmState::Loading && nbr.ls_req.is_empty() {
                    result.loading_done.push((ifindex, *addr));
                }
                if skip {
                    continue;
                }
            }
            if source == Some((ifindex, *addr)) {
                continue;
            }
            if relay.contains(addr) {
                continue;
            }
            nbr.ls_rxmt.add(h.clone(), now);
            if nbr.timer.ls_upd.is_none() {
                let token = TimerToken::new(TimerKind::LsUpd(ifindex, *addr), nbr.id, nbr.epoch);
                timer_arm(
                    top.timers.as_mut(),
                    &mut nbr.timer.ls_upd,
                    link.params.rxmt(),
                    token,
                );
            }
            receivers.push(*addr);
        }
        if receivers.is_empty() {
            continue;
        }

        // Received here from the DR or BDR, or we are BDR: the DR floods it.
        if let Some((src_ifindex, src)) = source {
            if src_ifindex == ifindex
                && (src == link.ident.d_router
                    || src == link.ident.bd_router
                    || link.ident.is_declared_bdr())
            {
                continue;
            }
        }

        let dests = match link.link_type() {
            LinkType::PointToPoint => vec![ALL_SPF_ROUTERS],
            LinkType::Broadcast => {
                if link.ident.is_declared_dr() || !link.ident.has_dr() {
                    vec![ALL_SPF_ROUTERS]
                } else {
                    vec![ALL_D_ROUTERS]
                }
            }
            LinkType::Nbma | LinkType::PointToMultipoint | LinkType::Virtual => receivers,
        };
        ospf_event_trace!(
            top.tracing,
            Flooding,
            "Flood {} on {} to {:?}",
            key,
            link.name,
            dests
        );
        let (router_id, link_area, mtu) = (top.router_id, link.area_id, link.params.mtu);
        let out = lsa.for_transmit(now, link.params.transmit_delay);
        for dest in dests {
            ospf_ls_upd_send(
                top.transport.as_mut(),
                |payload| Ospfv2Packet::new(&router_id, &link_area, payload),
                ifindex,
                dest,
                vec![out.clone()],
                mtu,
            );
        }
        if source.is_some_and(|(src_ifindex, _)| src_ifindex == ifindex) {
            result.flooded_back = true;
        }
    }

    for (ifindex, addr) in result.loading_done.iter() {
        top.nfsm_event(*ifindex, *addr, NfsmEvent::LoadingDone, now);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OspfConfig, OspfLinkConfig};

    fn header(seq: i32) -> OspfLsaHeader {
        let mut h = OspfLsaHeader::new(
            OspfLsType::Router,
            Ipv4Addr::new(3, 3, 3, 3),
            Ipv4Addr::new(3, 3, 3, 3),
        );
        h.ls_seq_number = seq;
        h
    }

    fn neighbor() -> Neighbor {
        Neighbor::new(
            1,
            1,
            "10.0.0.2/24".parse().unwrap(),
            &Ipv4Addr::new(2, 2, 2, 2),
        )
    }

    #[test]
    fn test_ls_req_check() {
        let key = LsaKey::from(&header(5));

        // Requested instance is newer than what we flood.
        let mut nbr = neighbor();
        nbr.ls_req_add(&header(5));
        assert!(ospf_flood_ls_req_check(&mut nbr, &key, &header(4)));
        assert_eq!(nbr.ls_req.len(), 1);

        // Same instance satisfies the request.
        assert!(ospf_flood_ls_req_check(&mut nbr, &key, &header(5)));
        assert_eq!(nbr.ls_req.len(), 0);

        // Newer instance replaces the request and is flooded.
        nbr.ls_req_add(&header(5));
        assert!(!ospf_flood_ls_req_check(&mut nbr, &key, &header(6)));
        assert_eq!(nbr.ls_req.len(), 0);

        // Not requested at all.
        assert!(!ospf_flood_ls_req_check(&mut nbr, &key, &header(6)));
    }

    #[test]
    fn test_relay_skip() {
        let config = OspfConfig::new(Ipv4Addr::new(1, 1, 1, 1));
        let link_config = OspfLinkConfig::new(
            1,
            "eth0",
            Ipv4Addr::UNSPECIFIED,
            "10.0.0.1/24".parse().unwrap(),
            LinkType::Broadcast,
        );
        let mut link = OspfLink::from(&config, &link_config, 1);
        let dr = Ipv4Addr::new(10, 0, 0, 2);
        let other = Ipv4Addr::new(10, 0, 0, 3);

        // No DR elected yet.
        assert!(!ospf_flood_relay_skip(&link, &other));

        link.ident.d_router = dr;
        assert!(!ospf_flood_relay_skip(&link, &dr));
        assert!(ospf_flood_relay_skip(&link, &other));

        // As DR we flood to everyone.
        link.ident.d_router = Ipv4Addr::new(10, 0, 0, 1);
        assert!(!ospf_flood_relay_skip(&link, &other));
    }
}
