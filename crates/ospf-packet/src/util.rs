use std::net::Ipv4Addr;

use bytes::BytesMut;
use nom::error::ParseError;
use nom::number::complete::be_u32;
use nom::{Err, IResult, Needed};

pub trait Emit {
    fn emit(&self, buf: &mut BytesMut);
}

pub trait ParseBe<T> {
    fn parse_be(input: &[u8]) -> IResult<&[u8], T>;
}

impl ParseBe<Ipv4Addr> for Ipv4Addr {
    fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        if input.len() < 4 {
            return Err(Err::Incomplete(Needed::new(4)));
        }
        let (input, addr) = be_u32(input)?;
        Ok((input, Self::from(addr)))
    }
}

pub fn take_bytes(input: &[u8], len: usize) -> IResult<&[u8], &[u8]> {
    if input.len() < len {
        return Err(Err::Incomplete(Needed::new(len - input.len())));
    }
    Ok((&input[len..], &input[..len]))
}

// many0 which stops at the first element that fails to parse instead of
// looping on empty input.
pub fn many0<'a, O, E: ParseError<&'a [u8]>>(
    parser: impl Fn(&'a [u8]) -> IResult<&'a [u8], O, E>,
) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], Vec<O>, E> {
    move |input| {
        let mut res = Vec::new();
        let mut remaining = input;

        while !remaining.is_empty() {
            match parser(remaining) {
                Ok((new_input, value)) => {
                    remaining = new_input;
                    res.push(value);
                }
                Err(_) => break,
            }
        }

        Ok((remaining, res))
    }
}
