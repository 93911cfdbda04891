use std::net::Ipv4Addr;

use thiserror::Error;

use crate::lsa::LsaKey;

/// Errors surfaced by the OSPF core.
///
/// Protocol violations never show up here; they are absorbed by the neighbor
/// state machine. What remains are broken internal invariants, such as a
/// dangling retransmission entry, which halt the affected area, and operator
/// level problems.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OspfError {
    /// Retransmission list refers to an LSA the database does not hold
    #[error("Retransmission entry {key} of neighbor {nbr} is not in the database")]
    DanglingRetransmit { key: LsaKey, nbr: Ipv4Addr },

    /// Configuration value rejected
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Interface index not configured
    #[error("Unknown interface: {ifindex}")]
    UnknownInterface { ifindex: u32 },

    /// Area not configured
    #[error("Unknown area: {area}")]
    UnknownArea { area: Ipv4Addr },

    /// Area processing stopped after an invariant violation
    #[error("Area {area} is halted")]
    AreaHalted { area: Ipv4Addr },
}

impl OspfError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Errors that must stop the area they happened in.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OspfError::DanglingRetransmit { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ospf_packet::OspfLsType;

    #[test]
    fn test_dangling_retransmit_error() {
        let key = LsaKey::new(
            OspfLsType::Router,
            Ipv4Addr::new(1, 1, 1, 1),
            Ipv4Addr::new(1, 1, 1, 1),
        );
        let err = OspfError::DanglingRetransmit {
            key,
            nbr: Ipv4Addr::new(10, 0, 0, 2),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("10.0.0.2"));
    }

    #[test]
    fn test_config_error_not_fatal() {
        let err = OspfError::config("dead interval must exceed hello interval");
        assert!(!err.is_fatal());
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
