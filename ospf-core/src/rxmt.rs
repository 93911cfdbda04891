use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use ospf_packet::OspfLsaHeader;

use crate::lsa::{LsaKey, LsaVersion};

#[derive(Debug, Clone)]
pub struct RetransmitEntry {
    pub h: OspfLsaHeader,
    pub sent: Instant,
}

/// LSAs flooded to one neighbor and not yet acknowledged.
#[derive(Debug, Default)]
pub struct LsRetransmit {
    entries: BTreeMap<LsaKey, RetransmitEntry>,
}

impl LsRetransmit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the exact instance sent. Replaces an older entry.
    pub fn add(&mut self, h: OspfLsaHeader, now: Instant) {
        let key = LsaKey::from(&h);
        self.entries.insert(key, RetransmitEntry { h, sent: now });
    }

    /// Process an acknowledgment. Only an ack for the instance on the list,
    /// or a newer one, clears the entry.
    pub fn ack(&mut self, h: &OspfLsaHeader) -> bool {
        let key = LsaKey::from(h);
        let Some(entry) = self.entries.get(&key) else {
            return false;
        };
        if LsaVersion::from(&entry.h).is_newer(&LsaVersion::from(h)) {
            return false;
        }
        self.entries.remove(&key);
        true
    }

    pub fn remove(&mut self, key: &LsaKey) -> Option<RetransmitEntry> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &LsaKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &LsaKey) -> Option<&RetransmitEntry> {
        self.entries.get(key)
    }

    /// Entries whose retransmission interval has elapsed.
    pub fn due(&self, now: Instant, interval: Duration) -> Vec<LsaKey> {
        self.entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.sent) >= interval)
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn touch(&mut self, key: &LsaKey, now: Instant) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.sent = now;
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &LsaKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
