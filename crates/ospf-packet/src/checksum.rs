// Offset of the checksum field once the 2 byte LS age is skipped.
const LSA_CHECKSUM_OFFSET: usize = 14;

/// Fletcher checksum of an encoded LSA (RFC 2328 12.1.7). `lsa` is the full
/// LSA including the header; the age and checksum fields are excluded.
pub fn lsa_checksum_calc(lsa: &[u8]) -> u16 {
    if lsa.len() < 20 {
        return 0;
    }
    let mut data = lsa[2..].to_vec();
    data[LSA_CHECKSUM_OFFSET] = 0;
    data[LSA_CHECKSUM_OFFSET + 1] = 0;

    let checksum = fletcher::calc_fletcher16(&data);
    let c0 = (checksum & 0x00FF) as i32;
    let c1 = ((checksum >> 8) & 0x00FF) as i32;

    let sop = (data.len() - LSA_CHECKSUM_OFFSET - 1) as i32;
    let mut x = (sop * c0 - c1) % 255;
    if x <= 0 {
        x += 255;
    }
    let mut y = 510 - c0 - x;
    if y > 255 {
        y -= 255;
    }
    ((x as u16) << 8) | (y as u16 & 0x00FF)
}

pub fn lsa_checksum_valid(lsa: &[u8]) -> bool {
    if lsa.len() < 20 {
        return false;
    }
    let stored = u16::from_be_bytes([lsa[16], lsa[17]]);
    lsa_checksum_calc(lsa) == stored
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTER_LSA: [u8; 36] = [
        0x03, 0xe2, 0x02, 0x01, 0xc0, 0xa8, 0xaa, 0x08, 0xc0, 0xa8, 0xaa, 0x08, 0x80, 0x00, 0x0d,
        0xc3, 0x25, 0x06, 0x00, 0x24, 0x02, 0x00, 0x00, 0x01, 0xc0, 0xa8, 0xaa, 0x00, 0xff, 0xff,
        0xff, 0x00, 0x03, 0x00, 0x00, 0x0a,
    ];

    #[test]
    fn test_lsa_checksum_calc() {
        assert_eq!(lsa_checksum_calc(&ROUTER_LSA), 0x2506);
        assert!(lsa_checksum_valid(&ROUTER_LSA));
    }

    #[test]
    fn test_lsa_checksum_ignores_age() {
        let mut lsa = ROUTER_LSA;
        lsa[0] = 0x0e;
        lsa[1] = 0x10;
        assert!(lsa_checksum_valid(&lsa));
        lsa[25] ^= 0x01;
        assert!(!lsa_checksum_valid(&lsa));
    }
}
