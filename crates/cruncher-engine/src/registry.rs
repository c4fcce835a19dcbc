// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The registry: the single piece of mutable global state (`SPEC_FULL.md`
//! §4.5/§4.6, resolving §9's "global mutable registry" open question as a
//! typed handle rather than bare globals). One `RwLock` guards a pair of
//! ordered maps — subscriptions, and per-round computation sets — so that
//! reads (fan-out) and writes (subscribe/add/remove/new-round) never race.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use cruncher_bigint::BigInt;
use cruncher_proto::ReplyField;
use tracing::warn;

use crate::barrier::RoundBarrier;
use crate::computation::Computation;
use crate::entry::EngineError;
use crate::lock;
use crate::subscription::Subscription;

struct Round {
    computations: BTreeMap<u64, Computation>,
    barrier: Arc<RoundBarrier>,
}

#[derive(Default)]
struct State {
    subscriptions: BTreeMap<u64, Arc<Subscription>>,
    rounds: BTreeMap<u64, Round>,
}

pub struct Registry {
    state: RwLock<State>,
    worker_count: usize,
}

impl Registry {
    pub fn new(worker_count: usize) -> Self {
        Registry {
            state: RwLock::new(State::default()),
            worker_count,
        }
    }

    /// `s` — register or replace a subscription. Replacing drops the old
    /// `Arc<Subscription>` handle; any round already holding a clone of it
    /// (via an in-flight `Computation`) keeps it alive until that round is
    /// drained (§9's removal-during-an-active-round resolution).
    pub fn subscribe(&self, sub_id: u64, modulus: BigInt) {
        lock::write(&self.state)
            .subscriptions
            .insert(sub_id, Arc::new(Subscription::new(modulus)));
    }

    /// `a` — install an entry on an existing subscription. Returns `false`
    /// if `sub_id` is unknown (caller decides whether that is an error).
    /// Takes the registry's write lock, per §4.7: subscription-level
    /// mutation is only ever reached while the registry write lock is held.
    pub fn add_entry(
        &self,
        sub_id: u64,
        stream_id: u64,
        base: BigInt,
        window_bits: u32,
        exponent_bits: u64,
    ) -> bool {
        let state = lock::write(&self.state);
        match state.subscriptions.get(&sub_id) {
            Some(sub) => {
                sub.add_entry(stream_id, base, window_bits, exponent_bits);
                true
            }
            None => false,
        }
    }

    /// `d` — remove a subscription. Returns `false` if it was not present.
    pub fn remove_subscription(&self, sub_id: u64) -> bool {
        lock::write(&self.state)
            .subscriptions
            .remove(&sub_id)
            .is_some()
    }

    /// `c` — ensure `round` exists (creating it and backfilling a
    /// `Computation` per current subscription on first touch), record one
    /// more outstanding job against it, and return its barrier.
    pub fn open_round_for_contribution(&self, round: u64) -> Arc<RoundBarrier> {
        let mut state = lock::write(&self.state);
        let worker_count = self.worker_count;
        let subs: Vec<(u64, Arc<Subscription>)> = state
            .subscriptions
            .iter()
            .map(|(id, sub)| (*id, sub.clone()))
            .collect();
        let round_state = state.rounds.entry(round).or_insert_with(|| Round {
            computations: BTreeMap::new(),
            barrier: Arc::new(RoundBarrier::new()),
        });
        for (sub_id, sub) in subs {
            round_state
                .computations
                .entry(sub_id)
                .or_insert_with(|| Computation::new(sub, worker_count));
        }
        round_state.barrier.add_expected(1);
        round_state.barrier.clone()
    }

    /// Worker-side fan-out: fold one datum into every subscription's
    /// computation for `round`, in ascending `sub_id` order, under a single
    /// read lock. A missing round is unreachable in practice (the handoff
    /// that produced this job already created it); treated as a no-op.
    pub fn fan_out_datum(&self, round: u64, slot: usize, stream_id: u64, exp: &BigInt, bit_budget: u64) {
        let state = lock::read(&self.state);
        let Some(round_state) = state.rounds.get(&round) else {
            warn!(round, "fan-out for a round with no open computations");
            return;
        };
        for (sub_id, computation) in &round_state.computations {
            if let Err(EngineError::ExponentTooWide { actual, budget }) =
                computation.process_datum(slot, stream_id, exp, bit_budget)
            {
                warn!(
                    sub_id,
                    stream_id, round, actual, budget, "dropping contribution: exponent too wide"
                );
            }
        }
    }

    /// Barrier for `round`, if any contribution has been opened against it.
    pub fn round_barrier(&self, round: u64) -> Option<Arc<RoundBarrier>> {
        lock::read(&self.state)
            .rounds
            .get(&round)
            .map(|r| r.barrier.clone())
    }

    /// `r` — drain and remove `round`, returning its reply fields in
    /// ascending `sub_id` order. A round that never saw a `c` (or has
    /// already been drained) yields an empty reply rather than an error,
    /// per §7's "no corresponding `c`" no-op.
    pub fn drain_round(&self, round: u64) -> Vec<ReplyField> {
        let Some(round_state) = lock::write(&self.state).rounds.remove(&round) else {
            return Vec::new();
        };
        round_state
            .computations
            .iter()
            .map(|(sub_id, computation)| ReplyField {
                sub_id: *sub_id,
                result_hex: computation.produce_result().to_hex(),
            })
            .collect()
    }

    pub fn subscription_count(&self) -> usize {
        lock::read(&self.state).subscriptions.len()
    }
}
