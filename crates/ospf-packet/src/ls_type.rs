use std::fmt::Display;

use nom::IResult;
use nom::number::complete::be_u8;

/// LS type field of the LSA header.
#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub enum OspfLsType {
    #[default]
    Router,
    Network,
    Summary,
    SummaryAsbr,
    AsExternal,
    NssaAsExternal,
    OpaqueLinkLocal,
    OpaqueAreaLocal,
    OpaqueAsWide,
    Unknown(u8),
}

/// Where an LSA of a given type is flooded.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FloodScope {
    Link,
    Area,
    As,
    Unknown,
}

impl OspfLsType {
    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, typ) = be_u8(input)?;
        Ok((input, typ.into()))
    }

    pub fn flood_scope(&self) -> FloodScope {
        use OspfLsType::*;
        match self {
            Router | Network | Summary | SummaryAsbr | NssaAsExternal | OpaqueAreaLocal => {
                FloodScope::Area
            }
            AsExternal | OpaqueAsWide => FloodScope::As,
            OpaqueLinkLocal => FloodScope::Link,
            Unknown(_) => FloodScope::Unknown,
        }
    }
}

impl Display for OspfLsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use OspfLsType::*;
        let str = match self {
            Router => "Router",
            Network => "Network",
            Summary => "Summary",
            SummaryAsbr => "Summary ASBR",
            AsExternal => "AS External",
            NssaAsExternal => "NSSA AS External",
            OpaqueLinkLocal => "Opaque Link Local",
            OpaqueAreaLocal => "Opaque Area Local",
            OpaqueAsWide => "Opaque AS Wide",
            Unknown(_) => "Unknown",
        };
        write!(f, "{str}")
    }
}

impl From<OspfLsType> for u8 {
    fn from(typ: OspfLsType) -> Self {
        use OspfLsType::*;
        match typ {
            Router => 1,
            Network => 2,
            Summary => 3,
            SummaryAsbr => 4,
            AsExternal => 5,
            NssaAsExternal => 7,
            OpaqueLinkLocal => 9,
            OpaqueAreaLocal => 10,
            OpaqueAsWide => 11,
            Unknown(v) => v,
        }
    }
}

impl From<OspfLsType> for u32 {
    fn from(typ: OspfLsType) -> Self {
        let val: u8 = typ.into();
        val as u32
    }
}

impl From<u8> for OspfLsType {
    fn from(typ: u8) -> Self {
        use OspfLsType::*;
        match typ {
            1 => Router,
            2 => Network,
            3 => Summary,
            4 => SummaryAsbr,
            5 => AsExternal,
            7 => NssaAsExternal,
            9 => OpaqueLinkLocal,
            10 => OpaqueAreaLocal,
            11 => OpaqueAsWide,
            v => Unknown(v),
        }
    }
}

impl From<u32> for OspfLsType {
    fn from(typ: u32) -> Self {
        match u8::try_from(typ) {
            Ok(v) => v.into(),
            Err(_) => OspfLsType::Unknown(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flood_scope() {
        assert_eq!(OspfLsType::Router.flood_scope(), FloodScope::Area);
        assert_eq!(OspfLsType::AsExternal.flood_scope(), FloodScope::As);
        assert_eq!(OspfLsType::OpaqueLinkLocal.flood_scope(), FloodScope::Link);
        assert_eq!(OspfLsType::from(6u8).flood_scope(), FloodScope::Unknown);
    }

    #[test]
    fn test_ls_type_conversion() {
        let typ: OspfLsType = 5u8.into();
        assert_eq!(typ, OspfLsType::AsExternal);
        let val: u32 = OspfLsType::OpaqueAsWide.into();
        assert_eq!(val, 11);
        assert_eq!(OspfLsType::from(0x1_0001u32), OspfLsType::Unknown(0));
    }
}
