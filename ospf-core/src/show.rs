use std::fmt::{self, Write};
use std::net::Ipv4Addr;
use std::time::Instant;

use serde::Serialize;

use crate::inst::Ospf;
use crate::link::OspfLink;
use crate::lsa::Lsa;
use crate::neigh::Neighbor;

pub type ShowCallback = fn(&Ospf, Instant, bool) -> String;

const SHOW_PATHS: &[(&str, ShowCallback)] = &[
    ("/show/ip/ospf/interface", show_ospf_interface),
    ("/show/ip/ospf/neighbor", show_ospf_neighbor),
    ("/show/ip/ospf/neighbor/detail", show_ospf_neighbor_detail),
    ("/show/ip/ospf/database", show_ospf_database),
];

impl Ospf {
    /// Render a show command. Unknown paths return `None`.
    pub fn show(&self, path: &str, now: Instant, json: bool) -> Option<String> {
        SHOW_PATHS
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, cb)| cb(self, now, json))
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize: {}\"}}", e))
}

#[derive(Serialize)]
struct InterfaceJson {
    name: String,
    ifindex: u32,
    link_type: String,
    area: Ipv4Addr,
    address: String,
    priority: u8,
    d_router: Ipv4Addr,
    bd_router: Ipv4Addr,
    neighbors: usize,
    adjacent: usize,
}

fn render_link(out: &mut String, oi: &OspfLink) -> fmt::Result {
    writeln!(out, "{} ({}) area {}", oi.name, oi.link_type(), oi.area_id)?;
    writeln!(
        out,
        " {} priority {} DR: {} BDR: {}",
        oi.ident.prefix, oi.ident.priority, oi.ident.d_router, oi.ident.bd_router
    )?;
    writeln!(
        out,
        " Neighbor count is {}, adjacent neighbor count is {}",
        oi.nbrs.len(),
        oi.full_nbr_count()
    )
}

fn show_ospf_interface(ospf: &Ospf, _now: Instant, json: bool) -> String {
    let links = ospf.links.values().filter(|oi| oi.enabled);
    if json {
        let links: Vec<InterfaceJson> = links
            .map(|oi| InterfaceJson {
                name: oi.name.clone(),
                ifindex: oi.index,
                link_type: oi.link_type().to_string(),
                area: oi.area_id,
                address: oi.ident.prefix.to_string(),
                priority: oi.ident.priority,
                d_router: oi.ident.d_router,
                bd_router: oi.ident.bd_router,
                neighbors: oi.nbrs.len(),
                adjacent: oi.full_nbr_count(),
            })
            .collect();
        return to_json(&links);
    }
    let mut buf = String::new();
    for oi in links {
        let _ = render_link(&mut buf, oi);
    }
    buf
}

#[derive(Serialize)]
struct NeighborJson {
    router_id: Ipv4Addr,
    address: Ipv4Addr,
    interface: String,
    priority: u8,
    state: String,
    d_router: Ipv4Addr,
    bd_router: Ipv4Addr,
    db_summary: usize,
    ls_request: usize,
    ls_retransmit: usize,
    state_changes: usize,
}

fn neighbor_json(oi: &OspfLink, nbr: &Neighbor) -> NeighborJson {
    NeighborJson {
        router_id: nbr.router_id(),
        address: nbr.addr(),
        interface: oi.name.clone(),
        priority: nbr.ident.priority,
        state: nbr.state.to_string(),
        d_router: nbr.ident.d_router,
        bd_router: nbr.ident.bd_router,
        db_summary: nbr.db_sum.len(),
        ls_request: nbr.ls_req.len(),
        ls_retransmit: nbr.ls_rxmt.len(),
        state_changes: nbr.state_change,
    }
}

fn neighbors(ospf: &Ospf) -> impl Iterator<Item = (&OspfLink, &Neighbor)> {
    ospf.links
        .values()
        .filter(|oi| oi.enabled)
        .flat_map(|oi| oi.nbrs.values().map(move |nbr| (oi, nbr)))
}

fn render_nbr(out: &mut String, oi: &OspfLink, nbr: &Neighbor) -> fmt::Result {
    writeln!(
        out,
        "{:<15} {:>3} {:<8} {:<15} {}",
        nbr.router_id(),
        nbr.ident.priority,
        nbr.state,
        nbr.addr(),
        oi.name
    )
}

fn show_ospf_neighbor(ospf: &Ospf, _now: Instant, json: bool) -> String {
    if json {
        let nbrs: Vec<NeighborJson> = neighbors(ospf)
            .map(|(oi, nbr)| neighbor_json(oi, nbr))
            .collect();
        return to_json(&nbrs);
    }
    let mut buf = String::new();
    let _ = writeln!(buf, "Neighbor ID     Pri State    Address         Interface");
    for (oi, nbr) in neighbors(ospf) {
        let _ = render_nbr(&mut buf, oi, nbr);
    }
    buf
}

fn render_nbr_detail(out: &mut String, oi: &OspfLink, nbr: &Neighbor) -> fmt::Result {
    writeln!(
        out,
        r#" Neighbor {}, interface address {}
    In the area {} via interface {}
    Neighbor priority is {}, state is {}, {} state changes
    DR is {} BDR is {}
    Database summary list {}, Link state request list {}, Link state retransmission list {}"#,
        nbr.router_id(),
        nbr.addr(),
        oi.area_id,
        oi.name,
        nbr.ident.priority,
        nbr.state,
        nbr.state_change,
        nbr.ident.d_router,
        nbr.ident.bd_router,
        nbr.db_sum.len(),
        nbr.ls_req.len(),
        nbr.ls_rxmt.len()
    )
}

fn show_ospf_neighbor_detail(ospf: &Ospf, now: Instant, json: bool) -> String {
    if json {
        return show_ospf_neighbor(ospf, now, json);
    }
    let mut buf = String::new();
    for (oi, nbr) in neighbors(ospf) {
        let _ = render_nbr_detail(&mut buf, oi, nbr);
    }
    buf
}

#[derive(Serialize)]
struct LsaJson {
    ls_type: String,
    ls_id: Ipv4Addr,
    adv_router: Ipv4Addr,
    age: u16,
    seq: String,
    checksum: String,
    length: u16,
}

#[derive(Serialize)]
struct DatabaseJson {
    area: Option<Ipv4Addr>,
    lsas: Vec<LsaJson>,
}

fn lsa_json(lsa: &Lsa, now: Instant) -> LsaJson {
    let h = lsa.h();
    LsaJson {
        ls_type: h.ls_type.to_string(),
        ls_id: h.ls_id,
        adv_router: h.adv_router,
        age: lsa.age_at(now),
        seq: format!("0x{:08x}", h.ls_seq_number),
        checksum: format!("0x{:04x}", h.ls_checksum),
        length: h.length,
    }
}

fn render_database(out: &mut String, title: &str, db: &DatabaseJson) -> fmt::Result {
    writeln!(out, "\n{}\n", title)?;
    writeln!(
        out,
        "{:<16} {:<15} {:<15} {:>4} {:<10} {:<6}",
        "Type", "Link ID", "ADV Router", "Age", "Seq#", "CkSum"
    )?;
    for lsa in db.lsas.iter() {
        writeln!(
            out,
            "{:<16} {:<15} {:<15} {:>4} {:<10} {:<6}",
            lsa.ls_type, lsa.ls_id, lsa.adv_router, lsa.age, lsa.seq, lsa.checksum
        )?;
    }
    Ok(())
}

fn show_ospf_database(ospf: &Ospf, now: Instant, json: bool) -> String {
    let mut dbs: Vec<DatabaseJson> = ospf
        .areas
        .iter()
        .map(|(area_id, area)| DatabaseJson {
            area: Some(*area_id),
            lsas: area.lsdb.iter().map(|(_, lsa)| lsa_json(lsa, now)).collect(),
        })
        .collect();
    let external = ospf.database_snapshot_as();
    if !external.is_empty() {
        dbs.push(DatabaseJson {
            area: None,
            lsas: external.iter().map(|lsa| lsa_json(lsa, now)).collect(),
        });
    }
    if json {
        return to_json(&dbs);
    }
    let mut buf = String::new();
    let _ = writeln!(buf, "OSPF Router with ID ({})", ospf.router_id);
    for db in dbs.iter() {
        let title = match db.area {
            Some(area) => format!("Link State Database (Area {})", area),
            None => String::from("AS External Link States"),
        };
        let _ = render_database(&mut buf, &title, db);
    }
    buf
}
