use thiserror::Error;

/// Errors raised while decoding OSPFv2 packets.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OspfParseError {
    /// Version field is not 2
    #[error("Invalid OSPF version: expected 2, found {found}")]
    InvalidVersion { found: u8 },

    /// Packet type outside 1..=5
    #[error("Unknown OSPF packet type: {typ}")]
    UnknownPacketType { typ: u8 },

    /// Header length disagrees with the buffer
    #[error("Invalid packet length: header says {expected}, buffer has {found}")]
    InvalidPacketLength { expected: usize, found: usize },

    /// LSA length shorter than its header
    #[error("Invalid LSA length: {length}")]
    InvalidLsaLength { length: u16 },

    /// Authentication other than null
    #[error("Unsupported authentication type: {auth_type}")]
    UnsupportedAuth { auth_type: u16 },

    /// Incomplete data during parsing
    #[error("Incomplete data: needed {needed} more bytes")]
    IncompleteData { needed: usize },

    /// Generic nom parsing error
    #[error("Nom parsing error: {message}")]
    NomError { message: String },
}

impl OspfParseError {
    pub fn invalid_packet_length(expected: usize, found: usize) -> Self {
        Self::InvalidPacketLength { expected, found }
    }

    pub fn incomplete_data(needed: usize) -> Self {
        Self::IncompleteData { needed }
    }

    pub fn nom_error(message: impl Into<String>) -> Self {
        Self::NomError {
            message: message.into(),
        }
    }
}

impl<I: std::fmt::Debug> From<nom::Err<nom::error::Error<I>>> for OspfParseError {
    fn from(err: nom::Err<nom::error::Error<I>>) -> Self {
        match err {
            nom::Err::Incomplete(nom::Needed::Size(n)) => Self::incomplete_data(n.get()),
            nom::Err::Incomplete(nom::Needed::Unknown) => Self::incomplete_data(0),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                Self::nom_error(format!("{:?} at {:?}", e.code, e.input))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_packet_length_error() {
        let err = OspfParseError::invalid_packet_length(44, 40);
        assert!(matches!(
            err,
            OspfParseError::InvalidPacketLength {
                expected: 44,
                found: 40
            }
        ));
        assert!(err.to_string().contains("header says 44"));
    }

    #[test]
    fn test_nom_error_conversion() {
        let input: &[u8] = &[0x01];
        let nom_err: nom::Err<nom::error::Error<&[u8]>> = nom::Err::Error(
            nom::error::Error::new(input, nom::error::ErrorKind::Eof),
        );
        let err: OspfParseError = nom_err.into();
        assert!(matches!(err, OspfParseError::NomError { .. }));
    }

    #[test]
    fn test_incomplete_conversion() {
        let nom_err: nom::Err<nom::error::Error<&[u8]>> =
            nom::Err::Incomplete(nom::Needed::new(4));
        let err: OspfParseError = nom_err.into();
        assert_eq!(err, OspfParseError::IncompleteData { needed: 4 });
    }
}
