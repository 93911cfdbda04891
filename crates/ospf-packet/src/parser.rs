use std::net::Ipv4Addr;

use bitfield_struct::bitfield;
use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};
use internet_checksum::Checksum;
use nom::IResult;
use nom::number::complete::{be_u8, be_u16, be_u32, be_u64};

use super::util::{Emit, ParseBe, many0};
use super::{OspfLsType, OspfLsa, OspfLsaHeader, OspfParseError, OspfType};

// OSPF version.
const OSPF_VERSION: u8 = 2;

pub const OSPF_HEADER_LEN: usize = 24;
pub const OSPF_LS_REQ_ENTRY_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub struct Ospfv2Packet {
    pub version: u8,
    pub typ: OspfType,
    pub len: u16,
    pub router_id: Ipv4Addr,
    pub area_id: Ipv4Addr,
    pub checksum: u16,
    pub auth_type: u16,
    pub auth: u64,
    pub payload: Ospfv2Payload,
}

impl Ospfv2Packet {
    pub fn new(router_id: &Ipv4Addr, area_id: &Ipv4Addr, payload: Ospfv2Payload) -> Self {
        Self {
            version: OSPF_VERSION,
            typ: payload.typ(),
            len: 0,
            router_id: *router_id,
            area_id: *area_id,
            checksum: 0,
            auth_type: 0,
            auth: 0,
            payload,
        }
    }

    pub fn parse(input: &[u8]) -> Result<Self, OspfParseError> {
        if input.len() < OSPF_HEADER_LEN {
            return Err(OspfParseError::incomplete_data(OSPF_HEADER_LEN - input.len()));
        }
        let (rest, h) = Ospfv2Header::parse_be(input)?;
        if h.version != OSPF_VERSION {
            return Err(OspfParseError::InvalidVersion { found: h.version });
        }
        if (h.len as usize) < OSPF_HEADER_LEN || (h.len as usize) > input.len() {
            return Err(OspfParseError::invalid_packet_length(
                h.len as usize,
                input.len(),
            ));
        }
        if h.auth_type != 0 {
            return Err(OspfParseError::UnsupportedAuth {
                auth_type: h.auth_type,
            });
        }
        let body = &rest[..h.len as usize - OSPF_HEADER_LEN];
        let payload = Ospfv2Payload::parse_typ(body, h.typ)?;

        Ok(Self {
            version: h.version,
            typ: h.typ,
            len: h.len,
            router_id: h.router_id,
            area_id: h.area_id,
            checksum: h.checksum,
            auth_type: h.auth_type,
            auth: h.auth,
            payload,
        })
    }

    pub fn emit(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.put_u8(self.version);
        buf.put_u8(self.payload.typ().into());
        buf.put_u16(0);
        buf.put(&self.router_id.octets()[..]);
        buf.put(&self.area_id.octets()[..]);
        buf.put_u16(0);
        buf.put_u16(self.auth_type);
        buf.put_u64(self.auth);
        self.payload.emit(buf);

        // OSPF packet length.
        let len = (buf.len() - start) as u16;
        BigEndian::write_u16(&mut buf[start + 2..start + 4], len);

        // Update checksum.
        let mut cksum = Checksum::new();
        cksum.add_bytes(&buf[start..]);
        buf[start + 12..start + 14].copy_from_slice(&cksum.checksum());
    }
}

struct Ospfv2Header {
    version: u8,
    typ: OspfType,
    len: u16,
    router_id: Ipv4Addr,
    area_id: Ipv4Addr,
    checksum: u16,
    auth_type: u16,
    auth: u64,
}

impl Ospfv2Header {
    fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, version) = be_u8(input)?;
        let (input, typ) = OspfType::parse_be(input)?;
        let (input, len) = be_u16(input)?;
        let (input, router_id) = Ipv4Addr::parse_be(input)?;
        let (input, area_id) = Ipv4Addr::parse_be(input)?;
        let (input, checksum) = be_u16(input)?;
        let (input, auth_type) = be_u16(input)?;
        let (input, auth) = be_u64(input)?;
        let h = Self {
            version,
            typ,
            len,
            router_id,
            area_id,
            checksum,
            auth_type,
            auth,
        };
        Ok((input, h))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ospfv2Payload {
    Hello(OspfHello),
    DbDesc(OspfDbDesc),
    LsRequest(OspfLsRequest),
    LsUpdate(OspfLsUpdate),
    LsAck(OspfLsAck),
}

impl Ospfv2Payload {
    pub fn typ(&self) -> OspfType {
        use Ospfv2Payload::*;
        match self {
            Hello(_) => OspfType::Hello,
            DbDesc(_) => OspfType::DbDesc,
            LsRequest(_) => OspfType::LsRequest,
            LsUpdate(_) => OspfType::LsUpdate,
            LsAck(_) => OspfType::LsAck,
        }
    }

    fn parse_typ(input: &[u8], typ: OspfType) -> Result<Self, OspfParseError> {
        let payload = match typ {
            OspfType::Hello => Self::Hello(OspfHello::parse_be(input)?.1),
            OspfType::DbDesc => Self::DbDesc(OspfDbDesc::parse_be(input)?.1),
            OspfType::LsRequest => Self::LsRequest(OspfLsRequest::parse_be(input)?.1),
            OspfType::LsUpdate => Self::LsUpdate(OspfLsUpdate::parse_be(input)?.1),
            OspfType::LsAck => Self::LsAck(OspfLsAck::parse_be(input)?.1),
            OspfType::Unknown(typ) => return Err(OspfParseError::UnknownPacketType { typ }),
        };
        Ok(payload)
    }
}

impl Emit for Ospfv2Payload {
    fn emit(&self, buf: &mut BytesMut) {
        use Ospfv2Payload::*;
        match self {
            Hello(v) => v.emit(buf),
            DbDesc(v) => v.emit(buf),
            LsRequest(v) => v.emit(buf),
            LsUpdate(v) => v.emit(buf),
            LsAck(v) => v.emit(buf),
        }
    }
}

#[bitfield(u8, debug = true)]
#[derive(PartialEq, Eq, Hash)]
pub struct OspfOptions {
    pub multi_toplogy: bool,
    pub external: bool,
    pub multicast: bool,
    pub nssa: bool,
    pub lls_data: bool,
    pub demand_circuits: bool,
    pub o: bool,
    pub dn: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OspfHello {
    pub netmask: Ipv4Addr,
    pub hello_interval: u16,
    pub options: OspfOptions,
    pub priority: u8,
    pub router_dead_interval: u32,
    pub d_router: Ipv4Addr,
    pub bd_router: Ipv4Addr,
    pub neighbors: Vec<Ipv4Addr>,
}

impl Default for OspfHello {
    fn default() -> Self {
        Self {
            netmask: Ipv4Addr::UNSPECIFIED,
            hello_interval: 0,
            options: OspfOptions::default(),
            priority: 0,
            router_dead_interval: 0,
            d_router: Ipv4Addr::UNSPECIFIED,
            bd_router: Ipv4Addr::UNSPECIFIED,
            neighbors: Vec::new(),
        }
    }
}

impl OspfHello {
    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, netmask) = Ipv4Addr::parse_be(input)?;
        let (input, hello_interval) = be_u16(input)?;
        let (input, options) = be_u8(input)?;
        let (input, priority) = be_u8(input)?;
        let (input, router_dead_interval) = be_u32(input)?;
        let (input, d_router) = Ipv4Addr::parse_be(input)?;
        let (input, bd_router) = Ipv4Addr::parse_be(input)?;
        let (input, neighbors) = many0(Ipv4Addr::parse_be)(input)?;
        let hello = Self {
            netmask,
            hello_interval,
            options: options.into(),
            priority,
            router_dead_interval,
            d_router,
            bd_router,
            neighbors,
        };
        Ok((input, hello))
    }
}

impl Emit for OspfHello {
    fn emit(&self, buf: &mut BytesMut) {
        buf.put(&self.netmask.octets()[..]);
        buf.put_u16(self.hello_interval);
        buf.put_u8(self.options.into());
        buf.put_u8(self.priority);
        buf.put_u32(self.router_dead_interval);
        buf.put(&self.d_router.octets()[..]);
        buf.put(&self.bd_router.octets()[..]);
        for nbr in self.neighbors.iter() {
            buf.put(&nbr.octets()[..]);
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct OspfDbDesc {
    pub if_mtu: u16,
    pub options: OspfOptions,
    pub flags: DbDescFlags,
    pub seqnum: u32,
    pub lsa_headers: Vec<OspfLsaHeader>,
}

#[bitfield(u8, debug = true)]
#[derive(PartialEq, Eq)]
pub struct DbDescFlags {
    pub master: bool,
    pub more: bool,
    pub init: bool,
    pub oob_resync: bool,
    #[bits(4)]
    pub resvd: u8,
}

impl DbDescFlags {
    pub fn is_all(&self) -> bool {
        self.master() && self.more() && self.init()
    }
}

impl OspfDbDesc {
    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, if_mtu) = be_u16(input)?;
        let (input, options) = be_u8(input)?;
        let (input, flags) = be_u8(input)?;
        let (input, seqnum) = be_u32(input)?;
        let (input, lsa_headers) = many0(OspfLsaHeader::parse_be)(input)?;
        let dd = Self {
            if_mtu,
            options: options.into(),
            flags: flags.into(),
            seqnum,
            lsa_headers,
        };
        Ok((input, dd))
    }
}

impl Emit for OspfDbDesc {
    fn emit(&self, buf: &mut BytesMut) {
        buf.put_u16(self.if_mtu);
        buf.put_u8(self.options.into());
        buf.put_u8(self.flags.into());
        buf.put_u32(self.seqnum);
        for lsah in self.lsa_headers.iter() {
            lsah.emit(buf);
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct OspfLsRequest {
    pub reqs: Vec<OspfLsRequestEntry>,
}

#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq)]
pub struct OspfLsRequestEntry {
    pub ls_type: OspfLsType,
    pub ls_id: Ipv4Addr,
    pub adv_router: Ipv4Addr,
}

impl OspfLsRequest {
    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, reqs) = many0(OspfLsRequestEntry::parse_be)(input)?;
        Ok((input, Self { reqs }))
    }
}

impl Emit for OspfLsRequest {
    fn emit(&self, buf: &mut BytesMut) {
        for req in self.reqs.iter() {
            req.emit(buf);
        }
    }
}

impl OspfLsRequestEntry {
    pub fn new(ls_type: OspfLsType, ls_id: Ipv4Addr, adv_router: Ipv4Addr) -> Self {
        Self {
            ls_type,
            ls_id,
            adv_router,
        }
    }

    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, ls_type) = be_u32(input)?;
        let (input, ls_id) = Ipv4Addr::parse_be(input)?;
        let (input, adv_router) = Ipv4Addr::parse_be(input)?;
        Ok((input, Self::new(ls_type.into(), ls_id, adv_router)))
    }
}

impl Emit for OspfLsRequestEntry {
    fn emit(&self, buf: &mut BytesMut) {
        buf.put_u32(self.ls_type.into());
        buf.put(&self.ls_id.octets()[..]);
        buf.put(&self.adv_router.octets()[..]);
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct OspfLsUpdate {
    pub lsas: Vec<OspfLsa>,
}

impl OspfLsUpdate {
    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (mut input, num_adv) = be_u32(input)?;
        let mut lsas = Vec::new();
        for _ in 0..num_adv {
            let (rest, lsa) = OspfLsa::parse_be(input)?;
            lsas.push(lsa);
            input = rest;
        }
        Ok((input, Self { lsas }))
    }
}

impl Emit for OspfLsUpdate {
    fn emit(&self, buf: &mut BytesMut) {
        buf.put_u32(self.lsas.len() as u32);
        for lsa in self.lsas.iter() {
            lsa.emit(buf);
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct OspfLsAck {
    pub lsa_headers: Vec<OspfLsaHeader>,
}

impl OspfLsAck {
    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, lsa_headers) = many0(OspfLsaHeader::parse_be)(input)?;
        Ok((input, Self { lsa_headers }))
    }
}

impl Emit for OspfLsAck {
    fn emit(&self, buf: &mut BytesMut) {
        for h in self.lsa_headers.iter() {
            h.emit(buf);
        }
    }
}
