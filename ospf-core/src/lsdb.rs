use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::time::Instant;

use bytes::Bytes;
use ospf_packet::*;
use strum_macros::Display;

use crate::lsa::{
    INITIAL_SEQUENCE_NUMBER, LS_REFRESH_TIME, Lsa, LsaKey, LsaVersion, MAX_SEQUENCE_NUMBER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RejectReason {
    SelfOriginated,
    UnsupportedLsType,
}

/// Result of offering an LSA to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LsdbOutcome {
    Installed,
    Refreshed,
    NoChange,
    Rejected(RejectReason),
}

impl LsdbOutcome {
    /// The current record changed and must be flooded.
    pub fn is_change(&self) -> bool {
        matches!(self, LsdbOutcome::Installed | LsdbOutcome::Refreshed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origination {
    pub key: LsaKey,
    pub outcome: LsdbOutcome,
    pub seq_wrap: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaxAgeWalk {
    pub removed: Vec<LsaKey>,
    pub reoriginated: Vec<LsaKey>,
}

impl MaxAgeWalk {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.reoriginated.is_empty()
    }
}

#[derive(Debug)]
pub struct Lsdb {
    router_id: Ipv4Addr,
    tables: BTreeMap<LsaKey, Lsa>,
    maxage: BTreeSet<LsaKey>,
    ls_refresh_time: u16,
}

impl Lsdb {
    pub fn new(router_id: Ipv4Addr) -> Self {
        Self {
            router_id,
            tables: BTreeMap::new(),
            maxage: BTreeSet::new(),
            ls_refresh_time: LS_REFRESH_TIME,
        }
    }

    pub fn set_ls_refresh_time(&mut self, secs: u16) {
        self.ls_refresh_time = secs;
    }

    pub fn router_id(&self) -> Ipv4Addr {
        self.router_id
    }

    pub fn is_supported(ls_type: OspfLsType) -> bool {
        matches!(ls_type.flood_scope(), FloodScope::Area | FloodScope::As)
    }

    pub fn is_self(&self, key: &LsaKey) -> bool {
        key.adv_router == self.router_id
    }

    pub fn lookup(&self, key: &LsaKey) -> Option<&Lsa> {
        self.tables.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LsaKey, &Lsa)> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn maxage_keys(&self) -> impl Iterator<Item = &LsaKey> {
        self.maxage.iter()
    }

    /// Headers of every record with current ages, in key order.
    pub fn headers(&self, now: Instant) -> Vec<OspfLsaHeader> {
        self.tables.values().map(|lsa| lsa.header_at(now)).collect()
    }

    /// Offer a received LSA.
    pub fn install(&mut self, candidate: OspfLsa, now: Instant) -> LsdbOutcome {
        let key = LsaKey::from(&candidate.h);
        if !Self::is_supported(key.ls_type) {
            return LsdbOutcome::Rejected(RejectReason::UnsupportedLsType);
        }
        if self.is_self(&key) {
            return self.install_received_self(key, candidate, now);
        }
        self.store(key, candidate, now, false)
    }

    /// Install a locally built LSA. The caller has chosen the sequence number.
    pub fn install_self(&mut self, lsa: OspfLsa, now: Instant) -> LsdbOutcome {
        let key = LsaKey::from(&lsa.h);
        if !Self::is_supported(key.ls_type) {
            return LsdbOutcome::Rejected(RejectReason::UnsupportedLsType);
        }
        self.store(key, lsa, now, true)
    }

    fn store(&mut self, key: LsaKey, candidate: OspfLsa, now: Instant, local: bool) -> LsdbOutcome {
        let version = LsaVersion::from(&candidate.h);
        let outcome = match self.tables.get(&key) {
            None => LsdbOutcome::Installed,
            Some(current) => {
                if !version.is_newer(&current.version_at(now)) {
                    return LsdbOutcome::NoChange;
                }
                if current.body() == &candidate.body
                    && current.h().options == candidate.h.options
                    && current.is_maxage() == version.is_maxage()
                {
                    LsdbOutcome::Refreshed
                } else {
                    LsdbOutcome::Installed
                }
            }
        };
        let mut lsa = Lsa::new(candidate, now);
        lsa.flags.set_originated(local && !lsa.is_maxage());
        self.replace(key, lsa);
        outcome
    }

    fn replace(&mut self, key: LsaKey, lsa: Lsa) {
        if lsa.is_maxage() {
            self.maxage.insert(key);
        } else {
            self.maxage.remove(&key);
        }
        self.tables.insert(key, lsa);
    }

    // A neighbor holds an instance of our own LSA that we did not originate
    // in this incarnation, or that is newer than ours.
    fn install_received_self(&mut self, key: LsaKey, candidate: OspfLsa, now: Instant) -> LsdbOutcome {
        let version = LsaVersion::from(&candidate.h);
        let Some(current) = self.tables.get_mut(&key) else {
            let mut lsa = Lsa::new(candidate, now);
            lsa.set_maxage(now);
            self.replace(key, lsa);
            return LsdbOutcome::Rejected(RejectReason::SelfOriginated);
        };
        if !version.is_newer(&current.version_at(now)) {
            return LsdbOutcome::NoChange;
        }
        let active = current.flags.originated() && !current.is_maxage();
        if active && version.seq != MAX_SEQUENCE_NUMBER {
            let mut h = current.h().clone();
            h.ls_age = 0;
            h.ls_seq_number = version.seq + 1;
            let body = current.body().clone();
            let mut lsa = Lsa::new(OspfLsa::new(h, body), now);
            lsa.flags.set_originated(true);
            self.replace(key, lsa);
            return LsdbOutcome::Rejected(RejectReason::SelfOriginated);
        }

        // Flush the received instance. A pending wrap or an active body is
        // carried so it is originated again once the flush completes.
        let pending = if active {
            Some((current.h().options, current.body().clone()))
        } else {
            current.pending.take()
        };
        let mut lsa = Lsa::new(candidate, now);
        lsa.set_maxage(now);
        if pending.is_some() {
            lsa.flags.set_seq_wrap(true);
            lsa.pending = pending;
        }
        self.replace(key, lsa);
        LsdbOutcome::Rejected(RejectReason::SelfOriginated)
    }

    /// Originate a new instance of one of our LSAs.
    pub fn originate(
        &mut self,
        ls_type: OspfLsType,
        ls_id: Ipv4Addr,
        options: OspfOptions,
        body: Bytes,
        now: Instant,
    ) -> Origination {
        let key = LsaKey::new(ls_type, ls_id, self.router_id);
        let mut origination = Origination {
            key,
            outcome: LsdbOutcome::NoChange,
            seq_wrap: false,
        };
        if !Self::is_supported(ls_type) {
            origination.outcome = LsdbOutcome::Rejected(RejectReason::UnsupportedLsType);
            return origination;
        }
        let seq = match self.tables.get_mut(&key) {
            None => INITIAL_SEQUENCE_NUMBER,
            Some(current) if current.flags.seq_wrap() => {
                // Wrap flush in progress; the newest body goes out afterwards.
                current.pending = Some((options, body));
                return origination;
            }
            Some(current) if current.h().ls_seq_number == MAX_SEQUENCE_NUMBER => {
                current.set_maxage(now);
                current.flags.set_originated(false);
                current.flags.set_seq_wrap(true);
                current.pending = Some((options, body));
                self.maxage.insert(key);
                origination.outcome = LsdbOutcome::Installed;
                origination.seq_wrap = true;
                return origination;
            }
            Some(current) => current.h().ls_seq_number + 1,
        };
        let mut h = OspfLsaHeader::new(ls_type, ls_id, self.router_id);
        h.options = options;
        h.ls_seq_number = seq;
        origination.outcome = self.store(key, OspfLsa::new(h, body), now, true);
        origination
    }

    /// Advance ages. Returns the records that reached MaxAge on this tick.
    pub fn age(&mut self, now: Instant) -> Vec<LsaKey> {
        let mut expired = Vec::new();
        for (key, lsa) in self.tables.iter_mut() {
            if lsa.tick(now) {
                lsa.flags.set_originated(false);
                expired.push(*key);
            }
        }
        for key in expired.iter() {
            self.maxage.insert(*key);
        }
        expired
    }

    /// Originate fresh instances of our own LSAs that reached the refresh age.
    pub fn refresh_self_originated(&mut self, now: Instant) -> Vec<LsaKey> {
        let due: Vec<(LsaKey, OspfOptions, Bytes)> = self
            .tables
            .iter()
            .filter(|(_, lsa)| {
                lsa.flags.originated()
                    && !lsa.is_maxage()
                    && !lsa.flags.seq_wrap()
                    && lsa.age_at(now) >= self.ls_refresh_time
            })
            .map(|(key, lsa)| (*key, lsa.h().options, lsa.body().clone()))
            .collect();

        let mut refreshed = Vec::new();
        for (key, options, body) in due {
            let origination = self.originate(key.ls_type, key.ls_id, options, body, now);
            if origination.outcome.is_change() {
                refreshed.push(key);
            }
        }
        refreshed
    }

    /// Prematurely age one of our LSAs.
    pub fn flush(&mut self, key: &LsaKey, now: Instant) -> bool {
        if !self.is_self(key) {
            return false;
        }
        let Some(lsa) = self.tables.get_mut(key) else {
            return false;
        };
        if lsa.is_maxage() {
            return false;
        }
        lsa.set_maxage(now);
        lsa.flags.set_originated(false);
        lsa.flags.set_seq_wrap(false);
        lsa.pending = None;
        self.maxage.insert(*key);
        true
    }

    /// Remove MaxAge records no longer referenced. Records flushed for a
    /// sequence wrap come back at the initial sequence number instead.
    pub fn maxage_walk<F>(&mut self, referenced: F, now: Instant) -> MaxAgeWalk
    where
        F: Fn(&LsaKey) -> bool,
    {
        let mut walk = MaxAgeWalk::default();
        let keys: Vec<LsaKey> = self
            .maxage
            .iter()
            .filter(|key| !referenced(key))
            .copied()
            .collect();

        for key in keys {
            self.maxage.remove(&key);
            let Some(lsa) = self.tables.remove(&key) else {
                continue;
            };
            if !lsa.is_maxage() {
                self.tables.insert(key, lsa);
                continue;
            }
            match lsa.pending {
                Some((options, body)) if lsa.flags.seq_wrap() => {
                    let mut h = lsa.data.h.clone();
                    h.ls_age = 0;
                    h.options = options;
                    h.ls_seq_number = INITIAL_SEQUENCE_NUMBER;
                    let mut fresh = Lsa::new(OspfLsa::new(h, body), now);
                    fresh.flags.set_originated(true);
                    self.tables.insert(key, fresh);
                    walk.reoriginated.push(key);
                }
                _ => walk.removed.push(key),
            }
        }
        walk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsa::MAX_AGE;
    use std::time::Duration;

    fn rid() -> Ipv4Addr {
        Ipv4Addr::new(1, 1, 1, 1)
    }

    fn other() -> Ipv4Addr {
        Ipv4Addr::new(2, 2, 2, 2)
    }

    fn router_lsa(adv: Ipv4Addr, seq: i32, body: &'static [u8]) -> OspfLsa {
        let mut h = OspfLsaHeader::new(OspfLsType::Router, adv, adv);
        h.ls_seq_number = seq;
        h.options = OspfOptions::from(0x02u8);
        OspfLsa::new(h, Bytes::from_static(body))
    }

    const BODY1: &[u8] = &[0, 0, 0, 1, 10, 0, 0, 0, 255, 255, 255, 0, 3, 0, 0, 10];
    const BODY2: &[u8] = &[0, 0, 0, 1, 10, 0, 1, 0, 255, 255, 255, 0, 3, 0, 0, 10];

    #[test]
    fn test_install_refresh_duplicate() {
        let now = Instant::now();
        let mut lsdb = Lsdb::new(rid());
        let seq = INITIAL_SEQUENCE_NUMBER;

        let first = router_lsa(other(), seq, BODY1);
        assert_eq!(lsdb.install(first.clone(), now), LsdbOutcome::Installed);
        assert_eq!(lsdb.install(first.clone(), now), LsdbOutcome::NoChange);

        let second = router_lsa(other(), seq + 1, BODY1);
        assert_eq!(lsdb.install(second, now), LsdbOutcome::Refreshed);

        assert_eq!(lsdb.install(first, now), LsdbOutcome::NoChange);
        let key = LsaKey::new(OspfLsType::Router, other(), other());
        assert_eq!(lsdb.lookup(&key).map(|l| l.h().ls_seq_number), Some(seq + 1));
        assert_eq!(lsdb.len(), 1);
    }

    #[test]
    fn test_install_changed_body() {
        let now = Instant::now();
        let mut lsdb = Lsdb::new(rid());
        let seq = INITIAL_SEQUENCE_NUMBER;
        lsdb.install(router_lsa(other(), seq, BODY1), now);
        assert_eq!(
            lsdb.install(router_lsa(other(), seq + 1, BODY2), now),
            LsdbOutcome::Installed
        );
    }

    #[test]
    fn test_maxage_candidate_is_installed() {
        let now = Instant::now();
        let mut lsdb = Lsdb::new(rid());
        let seq = INITIAL_SEQUENCE_NUMBER;
        lsdb.install(router_lsa(other(), seq, BODY1), now);

        let mut flushed = router_lsa(other(), seq, BODY1);
        flushed.h.ls_age = MAX_AGE;
        assert_eq!(lsdb.install(flushed, now), LsdbOutcome::Installed);
        let key = LsaKey::new(OspfLsType::Router, other(), other());
        assert!(lsdb.maxage_keys().any(|k| *k == key));
    }

    #[test]
    fn test_unsupported_type() {
        let now = Instant::now();
        let mut lsdb = Lsdb::new(rid());
        let mut h = OspfLsaHeader::new(OspfLsType::OpaqueLinkLocal, other(), other());
        h.ls_seq_number = INITIAL_SEQUENCE_NUMBER;
        let lsa = OspfLsa::new(h, Bytes::new());
        assert_eq!(
            lsdb.install(lsa, now),
            LsdbOutcome::Rejected(RejectReason::UnsupportedLsType)
        );
        let mut h = OspfLsaHeader::new(OspfLsType::Unknown(42), other(), other());
        h.ls_seq_number = INITIAL_SEQUENCE_NUMBER;
        let lsa = OspfLsa::new(h, Bytes::new());
        assert_eq!(
            lsdb.install(lsa, now),
            LsdbOutcome::Rejected(RejectReason::UnsupportedLsType)
        );
        assert!(lsdb.is_empty());
    }

    #[test]
    fn test_self_originated_newer_forces_reorigination() {
        let now = Instant::now();
        let mut lsdb = Lsdb::new(rid());
        let origination = lsdb.originate(
            OspfLsType::Router,
            rid(),
            OspfOptions::from(0x02u8),
            Bytes::from_static(BODY1),
            now,
        );
        assert_eq!(origination.outcome, LsdbOutcome::Installed);

        let stale = router_lsa(rid(), INITIAL_SEQUENCE_NUMBER + 7, BODY2);
        assert_eq!(
            lsdb.install(stale, now),
            LsdbOutcome::Rejected(RejectReason::SelfOriginated)
        );
        let lsa = lsdb.lookup(&origination.key).unwrap();
        assert_eq!(lsa.h().ls_seq_number, INITIAL_SEQUENCE_NUMBER + 8);
        assert_eq!(lsa.body().as_ref(), BODY1);
        assert!(lsa.flags.originated());
        assert!(lsa.data.is_checksum_valid());
    }

    #[test]
    fn test_self_originated_same_is_no_change() {
        let now = Instant::now();
        let mut lsdb = Lsdb::new(rid());
        let origination = lsdb.originate(
            OspfLsType::Router,
            rid(),
            OspfOptions::from(0x02u8),
            Bytes::from_static(BODY1),
            now,
        );
        let copy = lsdb.lookup(&origination.key).unwrap().data.clone();
        assert_eq!(lsdb.install(copy, now), LsdbOutcome::NoChange);
    }

    #[test]
    fn test_self_originated_unknown_is_flushed() {
        let now = Instant::now();
        let mut lsdb = Lsdb::new(rid());
        let stale = router_lsa(rid(), INITIAL_SEQUENCE_NUMBER + 3, BODY1);
        let key = LsaKey::from(&stale.h);
        assert_eq!(
            lsdb.install(stale, now),
            LsdbOutcome::Rejected(RejectReason::SelfOriginated)
        );
        let lsa = lsdb.lookup(&key).unwrap();
        assert!(lsa.is_maxage());
        assert_eq!(lsa.h().ls_seq_number, INITIAL_SEQUENCE_NUMBER + 3);

        let walk = lsdb.maxage_walk(|_| false, now);
        assert_eq!(walk.removed, vec![key]);
        assert!(lsdb.is_empty());
    }

    #[test]
    fn test_aging_and_maxage_walk() {
        let now = Instant::now();
        let mut lsdb = Lsdb::new(rid());
        let mut lsa = router_lsa(other(), INITIAL_SEQUENCE_NUMBER, BODY1);
        lsa.h.ls_age = MAX_AGE - 2;
        let key = LsaKey::from(&lsa.h);
        lsdb.install(lsa, now);

        assert!(lsdb.age(now + Duration::from_secs(1)).is_empty());
        assert_eq!(lsdb.age(now + Duration::from_secs(2)), vec![key]);
        assert!(lsdb.age(now + Duration::from_secs(3)).is_empty());

        // Still referenced by a retransmission list.
        let walk = lsdb.maxage_walk(|k| *k == key, now);
        assert!(walk.is_empty());
        assert!(lsdb.lookup(&key).is_some());

        let walk = lsdb.maxage_walk(|_| false, now);
        assert_eq!(walk.removed, vec![key]);
        assert!(lsdb.lookup(&key).is_none());
    }

    #[test]
    fn test_refresh_self_originated() {
        let now = Instant::now();
        let mut lsdb = Lsdb::new(rid());
        let origination = lsdb.originate(
            OspfLsType::Router,
            rid(),
            OspfOptions::from(0x02u8),
            Bytes::from_static(BODY1),
            now,
        );
        lsdb.install(router_lsa(other(), INITIAL_SEQUENCE_NUMBER, BODY1), now);

        let early = now + Duration::from_secs(LS_REFRESH_TIME as u64 - 1);
        assert!(lsdb.refresh_self_originated(early).is_empty());

        let later = now + Duration::from_secs(LS_REFRESH_TIME as u64);
        assert_eq!(lsdb.refresh_self_originated(later), vec![origination.key]);
        let lsa = lsdb.lookup(&origination.key).unwrap();
        assert_eq!(lsa.h().ls_seq_number, INITIAL_SEQUENCE_NUMBER + 1);
        assert_eq!(lsa.age_at(later), 0);
    }

    #[test]
    fn test_sequence_wrap() {
        let now = Instant::now();
        let mut lsdb = Lsdb::new(rid());
        let mut h = OspfLsaHeader::new(OspfLsType::Router, rid(), rid());
        h.ls_seq_number = MAX_SEQUENCE_NUMBER;
        let key = LsaKey::from(&h);
        let outcome = lsdb.install_self(OspfLsa::new(h, Bytes::from_static(BODY1)), now);
        assert_eq!(outcome, LsdbOutcome::Installed);

        let origination = lsdb.originate(
            OspfLsType::Router,
            rid(),
            OspfOptions::default(),
            Bytes::from_static(BODY2),
            now,
        );
        assert!(origination.seq_wrap);
        let lsa = lsdb.lookup(&key).unwrap();
        assert!(lsa.is_maxage());
        assert_eq!(lsa.h().ls_seq_number, MAX_SEQUENCE_NUMBER);

        let walk = lsdb.maxage_walk(|k| *k == key, now);
        assert!(walk.is_empty());

        let walk = lsdb.maxage_walk(|_| false, now);
        assert_eq!(walk.reoriginated, vec![key]);
        let lsa = lsdb.lookup(&key).unwrap();
        assert_eq!(lsa.h().ls_seq_number, INITIAL_SEQUENCE_NUMBER);
        assert_eq!(lsa.h().ls_age, 0);
        assert_eq!(lsa.body().as_ref(), BODY2);
        assert!(lsa.flags.originated());
    }

    #[test]
    fn test_received_self_at_max_sequence() {
        let now = Instant::now();
        let mut lsdb = Lsdb::new(rid());
        let origination = lsdb.originate(
            OspfLsType::Router,
            rid(),
            OspfOptions::from(0x02u8),
            Bytes::from_static(BODY1),
            now,
        );
        let stale = router_lsa(rid(), MAX_SEQUENCE_NUMBER, BODY2);
        assert_eq!(
            lsdb.install(stale, now),
            LsdbOutcome::Rejected(RejectReason::SelfOriginated)
        );
        let lsa = lsdb.lookup(&origination.key).unwrap();
        assert!(lsa.is_maxage());
        assert!(lsa.flags.seq_wrap());

        let walk = lsdb.maxage_walk(|_| false, now);
        assert_eq!(walk.reoriginated, vec![origination.key]);
        let lsa = lsdb.lookup(&origination.key).unwrap();
        assert_eq!(lsa.h().ls_seq_number, INITIAL_SEQUENCE_NUMBER);
        assert_eq!(lsa.body().as_ref(), BODY1);
    }

    #[test]
    fn test_flush() {
        let now = Instant::now();
        let mut lsdb = Lsdb::new(rid());
        let origination = lsdb.originate(
            OspfLsType::Router,
            rid(),
            OspfOptions::default(),
            Bytes::from_static(BODY1),
            now,
        );
        assert!(lsdb.flush(&origination.key, now));
        assert!(!lsdb.flush(&origination.key, now));
        let lsa = lsdb.lookup(&origination.key).unwrap();
        assert!(lsa.is_maxage());
        assert!(!lsa.flags.originated());

        let foreign = LsaKey::new(OspfLsType::Router, other(), other());
        assert!(!lsdb.flush(&foreign, now));
    }
}
