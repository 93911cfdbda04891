use std::net::Ipv4Addr;

use bytes::BytesMut;
use hex_literal::hex;
use ospf_packet::*;

fn parse_emit(buf: &[u8]) -> Ospfv2Packet {
    let packet = Ospfv2Packet::parse(buf);
    assert!(packet.is_ok(), "{:?}", packet);
    let packet = packet.unwrap();

    let mut out = BytesMut::new();
    packet.emit(&mut out);
    assert_eq!(&out[..], buf);

    packet
}

#[test]
pub fn parse_hello() {
    const PACKET: &[u8] = &hex!(
        "
        02 01 00 2c c0 a8 aa 08 00 00 00 01 27 3b 00 00
        00 00 00 00 00 00 00 00 ff ff ff 00 00 0a 02 01
        00 00 00 28 c0 a8 aa 08 00 00 00 00
        "
    );
    let packet = parse_emit(PACKET);
    assert_eq!(packet.router_id, Ipv4Addr::new(192, 168, 170, 8));
    assert_eq!(packet.area_id, Ipv4Addr::new(0, 0, 0, 1));
    let Ospfv2Payload::Hello(hello) = packet.payload else {
        panic!("not a hello");
    };
    assert_eq!(hello.hello_interval, 10);
    assert_eq!(hello.router_dead_interval, 40);
    assert_eq!(hello.d_router, Ipv4Addr::new(192, 168, 170, 8));
    assert!(hello.neighbors.is_empty());
}

#[test]
pub fn parse_unknown_type() {
    const PACKET: &[u8] = &hex!(
        "
        02 06 00 2c c0 a8 aa 08 00 00 00 01 27 3b 00 00
        00 00 00 00 00 00 00 00 ff ff ff 00 00 0a 02 01
        00 00 00 28 c0 a8 aa 08 00 00 00 00
        "
    );
    let err = Ospfv2Packet::parse(PACKET).unwrap_err();
    assert_eq!(err, OspfParseError::UnknownPacketType { typ: 6 });
}

#[test]
pub fn parse_truncated() {
    const PACKET: &[u8] = &hex!(
        "
        02 01 00 2c c0 a8 aa 08 00 00 00 01 27 3b 00 00
        00 00 00 00 00 00 00 00 ff ff ff 00
        "
    );
    let err = Ospfv2Packet::parse(PACKET).unwrap_err();
    assert!(matches!(err, OspfParseError::InvalidPacketLength { .. }));
}

#[test]
pub fn parse_hello_with_neighbor() {
    const PACKET: &[u8] = &hex!(
        "
        01 00 5e 00 00 05 00 1c 42 d3 17 49 08 00 45 c0
        00 44 bb a1 00 00 01 59 11 f8 0b 00 00 03 e0 00
        00 05 02 01 00 30 0b 00 00 03 00 00 00 00 d9 91
        00 00 00 00 00 00 00 00 00 00 ff ff ff 00 00 0a
        02 01 00 00 00 28 0b 00 00 01 0b 00 00 03 01 01
        01 01
        "
    );
    let packet = parse_emit(&PACKET[34..]);
    let Ospfv2Payload::Hello(hello) = packet.payload else {
        panic!("not a hello");
    };
    assert_eq!(hello.neighbors, vec![Ipv4Addr::new(1, 1, 1, 1)]);
    assert_eq!(hello.bd_router, Ipv4Addr::new(11, 0, 0, 3));
}

#[test]
pub fn parse_db_desc() {
    const PACKET: &[u8] = &hex!(
        "
        02 02 00 20 c0 a8 aa 08 00 00 00 01 a0 52 00 00
        00 00 00 00 00 00 00 00 05 dc 02 07 41 77 a9 7e
        "
    );
    let packet = parse_emit(PACKET);
    let Ospfv2Payload::DbDesc(dd) = packet.payload else {
        panic!("not a db desc");
    };
    assert_eq!(dd.if_mtu, 1500);
    assert!(dd.flags.is_all());
    assert_eq!(dd.seqnum, 0x4177a97e);
    assert!(dd.lsa_headers.is_empty());
}

#[test]
pub fn parse_db_desc_lsa() {
    const PACKET: &[u8] = &hex!(
        "
        02 02 00 ac c0 a8 aa 03 00 00 00 01 f0 67 00 00
        00 00 00 00 00 00 00 00 05 dc 02 02 41 77 a9 7e
        00 01 02 01 c0 a8 aa 03 c0 a8 aa 03 80 00 00 01
        3a 9c 00 30 00 02 02 05 50 d4 10 00 c0 a8 aa 02
        80 00 00 01 2a 49 00 24 00 02 02 05 94 79 ab 00
        c0 a8 aa 02 80 00 00 01 34 a5 00 24 00 02 02 05
        c0 82 78 00 c0 a8 aa 02 80 00 00 01 d3 19 00 24
        00 02 02 05 c0 a8 00 00 c0 a8 aa 02 80 00 00 01
        37 08 00 24 00 02 02 05 c0 a8 01 00 c0 a8 aa 02
        80 00 00 01 2c 12 00 24 00 02 02 05 c0 a8 ac 00
        c0 a8 aa 02 80 00 00 01 33 41 00 24
        "
    );
    let packet = parse_emit(PACKET);
    let Ospfv2Payload::DbDesc(dd) = packet.payload else {
        panic!("not a db desc");
    };
    assert!(dd.flags.more());
    assert!(!dd.flags.master());
    assert_eq!(dd.lsa_headers.len(), 7);
    assert_eq!(dd.lsa_headers[0].ls_type, OspfLsType::Router);
    assert_eq!(dd.lsa_headers[0].ls_seq_number, 0x80000001_u32 as i32);
    assert_eq!(dd.lsa_headers[1].ls_type, OspfLsType::AsExternal);
}

#[test]
pub fn parse_ls_request_multi() {
    const PACKET: &[u8] = &hex!(
        "
        02 03 00 6c c0 a8 aa 08 00 00 00 01 75 95 00 00
        00 00 00 00 00 00 00 00 00 00 00 01 c0 a8 aa 03
        c0 a8 aa 03 00 00 00 05 50 d4 10 00 c0 a8 aa 02
        00 00 00 05 94 79 ab 00 c0 a8 aa 02 00 00 00 05
        c0 82 78 00 c0 a8 aa 02 00 00 00 05 c0 a8 00 00
        c0 a8 aa 02 00 00 00 05 c0 a8 01 00 c0 a8 aa 02
        00 00 00 05 c0 a8 ac 00 c0 a8 aa 02
        "
    );
    let packet = parse_emit(PACKET);
    let Ospfv2Payload::LsRequest(req) = packet.payload else {
        panic!("not an ls request");
    };
    assert_eq!(req.reqs.len(), 7);
    assert_eq!(req.reqs[0].ls_type, OspfLsType::Router);
    assert_eq!(req.reqs[6].ls_id, Ipv4Addr::new(192, 168, 172, 0));
}

#[test]
pub fn parse_ls_upd() {
    const PACKET: &[u8] = &hex!(
        "
        02 04 00 40 c0 a8 aa 08 00 00 00 01 96 1f 00 00
        00 00 00 00 00 00 00 00 00 00 00 01 03 e2 02 01
        c0 a8 aa 08 c0 a8 aa 08 80 00 0d c3 25 06 00 24
        02 00 00 01 c0 a8 aa 00 ff ff ff 00 03 00 00 0a
        "
    );
    let packet = parse_emit(PACKET);
    let Ospfv2Payload::LsUpdate(upd) = packet.payload else {
        panic!("not an ls update");
    };
    assert_eq!(upd.lsas.len(), 1);
    let lsa = &upd.lsas[0];
    assert_eq!(lsa.h.ls_age, 994);
    assert_eq!(lsa.body.len(), 16);
    assert!(lsa.is_checksum_valid());
}

#[test]
pub fn parse_ls_upd_multi() {
    const PACKET: &[u8] = &hex!(
        "
        02 04 01 24 c0 a8 aa 03 00 00 00 01 36 6b 00 00
        00 00 00 00 00 00 00 00 00 00 00 07 00 02 02 01
        c0 a8 aa 03 c0 a8 aa 03 80 00 00 01 3a 9c 00 30
        02 00 00 02 c0 a8 aa 00 ff ff ff 00 03 00 00 0a
        c0 a8 aa 00 ff ff ff 00 03 00 00 0a 00 03 02 05
        50 d4 10 00 c0 a8 aa 02 80 00 00 01 2a 49 00 24
        ff ff ff ff 80 00 00 14 00 00 00 00 00 00 00 00
        00 03 02 05 94 79 ab 00 c0 a8 aa 02 80 00 00 01
        34 a5 00 24 ff ff ff 00 80 00 00 14 c0 a8 aa 01
        00 00 00 00 00 03 02 05 c0 82 78 00 c0 a8 aa 02
        80 00 00 01 d3 19 00 24 ff ff ff 00 80 00 00 14
        00 00 00 00 00 00 00 00 00 03 02 05 c0 a8 00 00
        c0 a8 aa 02 80 00 00 01 37 08 00 24 ff ff ff 00
        80 00 00 14 00 00 00 00 00 00 00 00 00 03 02 05
        c0 a8 01 00 c0 a8 aa 02 80 00 00 01 2c 12 00 24
        ff ff ff 00 80 00 00 14 00 00 00 00 00 00 00 00
        00 03 02 05 c0 a8 ac 00 c0 a8 aa 02 80 00 00 01
        33 41 00 24 ff ff ff 00 80 00 00 14 c0 a8 aa 0a
        00 00 00 00
        "
    );
    let packet = parse_emit(PACKET);
    let Ospfv2Payload::LsUpdate(upd) = packet.payload else {
        panic!("not an ls update");
    };
    assert_eq!(upd.lsas.len(), 7);
    assert!(upd.lsas.iter().all(|lsa| lsa.is_checksum_valid()));
}

#[test]
pub fn parse_ls_ack() {
    const PACKET: &[u8] = &hex!(
        "
        02 05 00 2c c0 a8 aa 08 00 00 00 01 02 f2 00 00
        00 00 00 00 00 00 00 00 00 01 02 01 c0 a8 aa 03
        c0 a8 aa 03 80 00 00 02 38 9d 00 30
        "
    );
    let packet = parse_emit(PACKET);
    let Ospfv2Payload::LsAck(ack) = packet.payload else {
        panic!("not an ls ack");
    };
    assert_eq!(ack.lsa_headers.len(), 1);
    assert_eq!(ack.lsa_headers[0].ls_seq_number, 0x80000002_u32 as i32);
    assert_eq!(ack.lsa_headers[0].length, 48);
}

#[test]
pub fn emit_db_desc() {
    let mut flags = DbDescFlags::default();
    flags.set_init(true);
    flags.set_more(true);
    flags.set_master(true);
    let dd = OspfDbDesc {
        if_mtu: 1500,
        options: OspfOptions::from(0x02u8),
        flags,
        seqnum: 0x4177a97e,
        lsa_headers: Vec::new(),
    };
    let packet = Ospfv2Packet::new(
        &Ipv4Addr::new(192, 168, 170, 8),
        &Ipv4Addr::new(0, 0, 0, 1),
        Ospfv2Payload::DbDesc(dd),
    );
    let mut buf = BytesMut::new();
    packet.emit(&mut buf);
    assert_eq!(
        &buf[..],
        &hex!(
            "
            02 02 00 20 c0 a8 aa 08 00 00 00 01 a0 52 00 00
            00 00 00 00 00 00 00 00 05 dc 02 07 41 77 a9 7e
            "
        )
    );
}
