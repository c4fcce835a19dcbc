// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A computation: one subscription's accumulator strip for a single round
//! (`SPEC_FULL.md` §4.4). There is one accumulator slot per worker thread;
//! only that worker ever touches its slot while the round is open, so the
//! `Mutex` around each is uncontended in the common case and exists only to
//! let [`Computation`] live behind a shared `&self`.

use std::sync::{Arc, Mutex};

use cruncher_bigint::BigInt;

use crate::entry::EngineError;
use crate::lock;
use crate::subscription::Subscription;

pub struct Computation {
    subscription: Arc<Subscription>,
    accumulators: Vec<Mutex<BigInt>>,
}

impl Computation {
    pub fn new(subscription: Arc<Subscription>, worker_count: usize) -> Self {
        let accumulators = (0..worker_count).map(|_| Mutex::new(BigInt::one())).collect();
        Computation {
            subscription,
            accumulators,
        }
    }

    /// Fold one datum into the accumulator owned by `slot` (the worker
    /// index). An unknown stream is a silent no-op, per §4.4.
    pub fn process_datum(
        &self,
        slot: usize,
        stream_id: u64,
        exp: &BigInt,
        bit_budget: u64,
    ) -> Result<(), EngineError> {
        let Some(local) = self
            .subscription
            .exponentiate_stream(stream_id, exp, bit_budget)?
        else {
            return Ok(());
        };
        let mut accum = lock::lock(&self.accumulators[slot]);
        *accum = accum.mulmod(&local, self.subscription.modulus());
        Ok(())
    }

    /// Fold every slot's accumulator into the final result for this round.
    pub fn produce_result(&self) -> BigInt {
        let modulus = self.subscription.modulus();
        self.accumulators.iter().fold(BigInt::one(), |acc, slot| {
            acc.mulmod(&lock::lock(slot), modulus)
        })
    }
}
