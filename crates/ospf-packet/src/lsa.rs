use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use nom::IResult;
use nom::error::{ErrorKind, make_error};
use nom::number::complete::{be_i32, be_u8, be_u16};

use super::util::{Emit, ParseBe, take_bytes};
use super::{OspfLsType, OspfOptions, lsa_checksum_calc, lsa_checksum_valid};

pub const OSPF_LSA_HEADER_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OspfLsaHeader {
    pub ls_age: u16,
    pub options: OspfOptions,
    pub ls_type: OspfLsType,
    pub ls_id: Ipv4Addr,
    pub adv_router: Ipv4Addr,
    pub ls_seq_number: i32,
    pub ls_checksum: u16,
    pub length: u16,
}

impl OspfLsaHeader {
    pub fn new(ls_type: OspfLsType, ls_id: Ipv4Addr, adv_router: Ipv4Addr) -> Self {
        Self {
            ls_age: 0,
            options: OspfOptions::default(),
            ls_type,
            ls_id,
            adv_router,
            ls_seq_number: 0,
            ls_checksum: 0,
            length: OSPF_LSA_HEADER_LEN as u16,
        }
    }

    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, ls_age) = be_u16(input)?;
        let (input, options) = be_u8(input)?;
        let (input, ls_type) = OspfLsType::parse_be(input)?;
        let (input, ls_id) = Ipv4Addr::parse_be(input)?;
        let (input, adv_router) = Ipv4Addr::parse_be(input)?;
        let (input, ls_seq_number) = be_i32(input)?;
        let (input, ls_checksum) = be_u16(input)?;
        let (input, length) = be_u16(input)?;
        let h = Self {
            ls_age,
            options: options.into(),
            ls_type,
            ls_id,
            adv_router,
            ls_seq_number,
            ls_checksum,
            length,
        };
        Ok((input, h))
    }
}

impl Emit for OspfLsaHeader {
    fn emit(&self, buf: &mut BytesMut) {
        buf.put_u16(self.ls_age);
        buf.put_u8(self.options.into());
        buf.put_u8(self.ls_type.into());
        buf.put(&self.ls_id.octets()[..]);
        buf.put(&self.adv_router.octets()[..]);
        buf.put_i32(self.ls_seq_number);
        buf.put_u16(self.ls_checksum);
        buf.put_u16(self.length);
    }
}

/// LSA with its body kept as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OspfLsa {
    pub h: OspfLsaHeader,
    pub body: Bytes,
}

impl OspfLsa {
    pub fn new(h: OspfLsaHeader, body: Bytes) -> Self {
        let mut lsa = Self { h, body };
        lsa.update();
        lsa
    }

    /// Recompute length and checksum after header or body change.
    pub fn update(&mut self) {
        self.h.length = (OSPF_LSA_HEADER_LEN + self.body.len()) as u16;
        self.h.ls_checksum = 0;
        let buf = self.to_bytes();
        self.h.ls_checksum = lsa_checksum_calc(&buf);
    }

    pub fn is_checksum_valid(&self) -> bool {
        lsa_checksum_valid(&self.to_bytes())
    }

    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(OSPF_LSA_HEADER_LEN + self.body.len());
        self.emit(&mut buf);
        buf
    }

    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, h) = OspfLsaHeader::parse_be(input)?;
        if (h.length as usize) < OSPF_LSA_HEADER_LEN {
            return Err(nom::Err::Error(make_error(input, ErrorKind::LengthValue)));
        }
        let (input, body) = take_bytes(input, h.length as usize - OSPF_LSA_HEADER_LEN)?;
        let body = Bytes::copy_from_slice(body);
        Ok((input, Self { h, body }))
    }
}

impl Emit for OspfLsa {
    fn emit(&self, buf: &mut BytesMut) {
        let start = buf.len();
        self.h.emit(buf);
        buf.put(&self.body[..]);
        let len = (buf.len() - start) as u16;
        BigEndian::write_u16(&mut buf[start + 18..start + 20], len);
    }
}
