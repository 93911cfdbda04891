use std::cmp::Ordering;
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use bitfield_struct::bitfield;
use bytes::Bytes;
use ospf_packet::*;

// Architectural constants, RFC 2328 appendix B.
pub const MAX_AGE: u16 = 3600;
pub const MAX_AGE_DIFF: u16 = 900;
pub const LS_REFRESH_TIME: u16 = 1800;
pub const MIN_LS_ARRIVAL: Duration = Duration::from_secs(1);
pub const INITIAL_SEQUENCE_NUMBER: i32 = i32::MIN + 1;
pub const MAX_SEQUENCE_NUMBER: i32 = i32::MAX;

/// Identity of an LSA slot. Every version of one LSA shares the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LsaKey {
    pub ls_type: OspfLsType,
    pub ls_id: Ipv4Addr,
    pub adv_router: Ipv4Addr,
}

impl LsaKey {
    pub fn new(ls_type: OspfLsType, ls_id: Ipv4Addr, adv_router: Ipv4Addr) -> Self {
        Self {
            ls_type,
            ls_id,
            adv_router,
        }
    }

    pub fn flood_scope(&self) -> FloodScope {
        self.ls_type.flood_scope()
    }

    pub fn to_request(&self) -> OspfLsRequestEntry {
        OspfLsRequestEntry::new(self.ls_type, self.ls_id, self.adv_router)
    }
}

impl From<&OspfLsaHeader> for LsaKey {
    fn from(h: &OspfLsaHeader) -> Self {
        Self::new(h.ls_type, h.ls_id, h.adv_router)
    }
}

impl From<&OspfLsRequestEntry> for LsaKey {
    fn from(req: &OspfLsRequestEntry) -> Self {
        Self::new(req.ls_type, req.ls_id, req.adv_router)
    }
}

impl Display for LsaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.ls_type, self.ls_id, self.adv_router)
    }
}

/// The comparable part of an LSA header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LsaVersion {
    pub seq: i32,
    pub age: u16,
    pub checksum: u16,
    pub length: u16,
}

impl LsaVersion {
    pub fn is_maxage(&self) -> bool {
        self.age >= MAX_AGE
    }

    // RFC 2328 13.1.
    pub fn compare(&self, other: &LsaVersion) -> Ordering {
        match self.seq.cmp(&other.seq) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.checksum.cmp(&other.checksum) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match (self.is_maxage(), other.is_maxage()) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (true, true) => return Ordering::Equal,
            (false, false) => {}
        }
        if self.age.abs_diff(other.age) > MAX_AGE_DIFF {
            // Younger one wins.
            return other.age.cmp(&self.age);
        }
        Ordering::Equal
    }

    pub fn is_newer(&self, other: &LsaVersion) -> bool {
        self.compare(other) == Ordering::Greater
    }

    pub fn is_same(&self, other: &LsaVersion) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl From<&OspfLsaHeader> for LsaVersion {
    fn from(h: &OspfLsaHeader) -> Self {
        Self {
            seq: h.ls_seq_number,
            age: h.ls_age.min(MAX_AGE),
            checksum: h.ls_checksum,
            length: h.length,
        }
    }
}

pub fn ospf_lsa_compare(a: &OspfLsaHeader, b: &OspfLsaHeader) -> Ordering {
    LsaVersion::from(a).compare(&LsaVersion::from(b))
}

#[bitfield(u8, debug = true)]
pub struct LsaFlags {
    pub originated: bool,
    pub seq_wrap: bool,
    #[bits(6)]
    pub resvd: u8,
}

/// An installed LSA. The header age is the age at `stamp`; whole seconds are
/// folded into it on every aging tick.
#[derive(Debug, Clone)]
pub struct Lsa {
    pub data: OspfLsa,
    pub installed: Instant,
    pub stamp: Instant,
    pub flags: LsaFlags,
    // Body to originate once a sequence wrap flush completes.
    pub pending: Option<(OspfOptions, Bytes)>,
}

impl Lsa {
    pub fn new(data: OspfLsa, now: Instant) -> Self {
        Self {
            data,
            installed: now,
            stamp: now,
            flags: LsaFlags::new(),
            pending: None,
        }
    }

    pub fn h(&self) -> &OspfLsaHeader {
        &self.data.h
    }

    pub fn key(&self) -> LsaKey {
        LsaKey::from(&self.data.h)
    }

    pub fn version(&self) -> LsaVersion {
        LsaVersion::from(&self.data.h)
    }

    /// Version with the age as of `now`, used for all comparisons.
    pub fn version_at(&self, now: Instant) -> LsaVersion {
        let mut version = self.version();
        version.age = self.age_at(now);
        version
    }

    pub fn body(&self) -> &Bytes {
        &self.data.body
    }

    pub fn is_maxage(&self) -> bool {
        self.data.h.ls_age >= MAX_AGE
    }

    pub fn age_at(&self, now: Instant) -> u16 {
        if self.is_maxage() {
            return MAX_AGE;
        }
        let elapsed = now.saturating_duration_since(self.stamp).as_secs();
        let age = self.data.h.ls_age as u64 + elapsed;
        age.min(MAX_AGE as u64) as u16
    }

    /// Fold elapsed whole seconds into the header age. Returns true when the
    /// LSA reached MaxAge on this tick.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.is_maxage() {
            return false;
        }
        let elapsed = now.saturating_duration_since(self.stamp).as_secs();
        if elapsed == 0 {
            return false;
        }
        self.data.h.ls_age = self.age_at(now);
        self.stamp += Duration::from_secs(elapsed);
        self.is_maxage()
    }

    pub fn set_maxage(&mut self, now: Instant) {
        self.data.h.ls_age = MAX_AGE;
        self.stamp = now;
    }

    /// Header with the current age, as put into DD and Ack packets.
    pub fn header_at(&self, now: Instant) -> OspfLsaHeader {
        let mut h = self.data.h.clone();
        h.ls_age = self.age_at(now);
        h
    }

    /// Copy for an LS Update, aged by the interface transmit delay.
    pub fn for_transmit(&self, now: Instant, transmit_delay: u16) -> OspfLsa {
        let mut lsa = self.data.clone();
        lsa.h.ls_age = self.age_at(now).saturating_add(transmit_delay).min(MAX_AGE);
        lsa
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(seq: i32, age: u16, checksum: u16) -> LsaVersion {
        LsaVersion {
            seq,
            age,
            checksum,
            length: 36,
        }
    }

    #[test]
    fn test_sequence_wins() {
        let a = version(INITIAL_SEQUENCE_NUMBER + 1, 3000, 0x1111);
        let b = version(INITIAL_SEQUENCE_NUMBER, 0, 0xffff);
        assert!(a.is_newer(&b));
        assert!(!b.is_newer(&a));
    }

    #[test]
    fn test_sequence_is_signed() {
        let a = version(0, 0, 0);
        let b = version(INITIAL_SEQUENCE_NUMBER, 0, 0);
        assert!(a.is_newer(&b));
        let c = version(MAX_SEQUENCE_NUMBER, 0, 0);
        assert!(c.is_newer(&a));
    }

    #[test]
    fn test_checksum_breaks_tie() {
        let a = version(5, 10, 0x2000);
        let b = version(5, 10, 0x1000);
        assert!(a.is_newer(&b));
    }

    #[test]
    fn test_maxage_wins() {
        let a = version(5, MAX_AGE, 0x1000);
        let b = version(5, 10, 0x1000);
        assert!(a.is_newer(&b));
        assert!(!b.is_newer(&a));
    }

    #[test]
    fn test_age_difference_threshold() {
        let young = version(5, 10, 0x1000);
        let old = version(5, 10 + MAX_AGE_DIFF + 1, 0x1000);
        assert!(young.is_newer(&old));

        let close = version(5, 10 + MAX_AGE_DIFF, 0x1000);
        assert!(young.is_same(&close));
    }

    #[test]
    fn test_total_order_trichotomy() {
        let seqs = [INITIAL_SEQUENCE_NUMBER, -1, 0, 1, MAX_SEQUENCE_NUMBER];
        let ages = [0, 1, 899, 900, 901, 1800, 3599, MAX_AGE];
        let sums = [0x0000, 0x1234, 0xffff];
        let mut all = Vec::new();
        for seq in seqs {
            for age in ages {
                for sum in sums {
                    all.push(version(seq, age, sum));
                }
            }
        }
        for a in all.iter() {
            for b in all.iter() {
                let ab = a.is_newer(b);
                let ba = b.is_newer(a);
                let same = a.is_same(b);
                assert!(!(ab && ba), "{:?} {:?}", a, b);
                assert_eq!(ab as u8 + ba as u8 + same as u8, 1, "{:?} {:?}", a, b);
                assert_eq!(same, b.is_same(a));
            }
        }
    }

    #[test]
    fn test_lsa_tick() {
        let now = Instant::now();
        let h = OspfLsaHeader::new(
            OspfLsType::Router,
            Ipv4Addr::new(1, 1, 1, 1),
            Ipv4Addr::new(1, 1, 1, 1),
        );
        let mut lsa = Lsa::new(OspfLsa::new(h, Bytes::new()), now);
        assert!(!lsa.tick(now + Duration::from_millis(500)));
        assert_eq!(lsa.h().ls_age, 0);
        assert!(!lsa.tick(now + Duration::from_millis(1500)));
        assert_eq!(lsa.h().ls_age, 1);
        assert_eq!(lsa.age_at(now + Duration::from_millis(2100)), 2);
        assert!(lsa.tick(now + Duration::from_secs(MAX_AGE as u64 + 10)));
        assert_eq!(lsa.h().ls_age, MAX_AGE);
        assert!(!lsa.tick(now + Duration::from_secs(MAX_AGE as u64 + 20)));
    }

    #[test]
    fn test_for_transmit_clamps() {
        let now = Instant::now();
        let mut h = OspfLsaHeader::new(
            OspfLsType::Router,
            Ipv4Addr::new(1, 1, 1, 1),
            Ipv4Addr::new(1, 1, 1, 1),
        );
        h.ls_age = MAX_AGE - 1;
        let lsa = Lsa::new(OspfLsa::new(h, Bytes::new()), now);
        assert_eq!(lsa.for_transmit(now, 5).h.ls_age, MAX_AGE);
    }
}
