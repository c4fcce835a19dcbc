// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-round completion barrier (`SPEC_FULL.md` §4.6/§4.7): a countdown of
//! outstanding jobs, signalled by a `Condvar` once it reaches zero.

use std::sync::{Condvar, Mutex};

use crate::lock;

pub struct RoundBarrier {
    outstanding: Mutex<u64>,
    drained: Condvar,
}

impl RoundBarrier {
    pub fn new() -> Self {
        RoundBarrier {
            outstanding: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    /// Record `n` more jobs that must retire before this round is drained.
    pub fn add_expected(&self, n: u64) {
        *lock::lock(&self.outstanding) += n;
    }

    /// Called by a worker once it has fanned one job out to every
    /// subscription. Wakes `wait_until_drained` when this was the last one.
    pub fn retire_one(&self) {
        let mut outstanding = lock::lock(&self.outstanding);
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.drained.notify_all();
        }
    }

    /// Block until every job added via `add_expected` has retired.
    pub fn wait_until_drained(&self) {
        let guard = lock::lock(&self.outstanding);
        let _guard = self
            .drained
            .wait_while(guard, |outstanding| *outstanding > 0)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
    }
}

impl Default for RoundBarrier {
    fn default() -> Self {
        Self::new()
    }
}
