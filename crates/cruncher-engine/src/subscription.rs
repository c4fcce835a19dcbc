// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A subscription: one modulus shared by a map of per-stream [`Entry`]
//! values (`SPEC_FULL.md` §4.3).

use std::collections::HashMap;
use std::sync::RwLock;

use cruncher_bigint::BigInt;

use crate::entry::{EngineError, Entry};
use crate::lock;

pub struct Subscription {
    modulus: BigInt,
    entries: RwLock<HashMap<u64, Entry>>,
}

impl Subscription {
    pub fn new(modulus: BigInt) -> Self {
        Subscription {
            modulus,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn modulus(&self) -> &BigInt {
        &self.modulus
    }

    /// Install (or replace) the entry for `stream_id`, building its table
    /// eagerly against the current modulus.
    pub fn add_entry(&self, stream_id: u64, base: BigInt, window_bits: u32, exponent_bits: u64) {
        let mut entry = Entry::new(base);
        entry.rebuild_table(window_bits, &self.modulus, exponent_bits);
        lock::write(&self.entries).insert(stream_id, entry);
    }

    /// `Ok(None)` for an unknown `stream_id` (the datum is a no-op per
    /// §4.4); `Ok(Some(_))` the local residue for a known one.
    pub fn exponentiate_stream(
        &self,
        stream_id: u64,
        exp: &BigInt,
        bit_budget: u64,
    ) -> Result<Option<BigInt>, EngineError> {
        let entries = lock::read(&self.entries);
        match entries.get(&stream_id) {
            None => Ok(None),
            Some(entry) => entry.exponentiate(exp, &self.modulus, bit_budget).map(Some),
        }
    }

    /// Delete the entry for `stream_id`, if any. No wire command reaches
    /// this directly today (only whole-subscription removal, `d`, is
    /// exposed), but it is part of the Subscription contract and Entry's
    /// state-machine terminal transition.
    pub fn remove_entry(&self, stream_id: u64) -> bool {
        lock::write(&self.entries).remove(&stream_id).is_some()
    }

    pub fn stream_count(&self) -> usize {
        lock::read(&self.entries).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_stream_is_none() {
        let sub = Subscription::new(BigInt::from_u64(101));
        assert_eq!(
            sub.exponentiate_stream(99, &BigInt::from_u64(5), 64)
                .unwrap(),
            None
        );
    }

    #[test]
    fn known_stream_exponentiates_against_the_subscription_modulus() {
        let sub = Subscription::new(BigInt::from_u64(101));
        sub.add_entry(7, BigInt::from_u64(2), 4, 16);
        let got = sub
            .exponentiate_stream(7, &BigInt::from_u64(10), 16)
            .unwrap()
            .unwrap();
        assert_eq!(got.to_hex(), "e");
    }

    #[test]
    fn replacing_an_entry_overwrites_the_previous_base() {
        let sub = Subscription::new(BigInt::from_u64(101));
        sub.add_entry(7, BigInt::from_u64(2), 0, 16);
        sub.add_entry(7, BigInt::from_u64(3), 0, 16);
        let got = sub
            .exponentiate_stream(7, &BigInt::from_u64(1), 16)
            .unwrap()
            .unwrap();
        assert_eq!(got.to_hex(), "3");
    }

    #[test]
    fn removed_entry_reverts_to_unknown_stream() {
        let sub = Subscription::new(BigInt::from_u64(101));
        sub.add_entry(7, BigInt::from_u64(2), 0, 16);
        assert!(sub.remove_entry(7));
        assert!(!sub.remove_entry(7));
        assert_eq!(
            sub.exponentiate_stream(7, &BigInt::from_u64(1), 16)
                .unwrap(),
            None
        );
    }
}
