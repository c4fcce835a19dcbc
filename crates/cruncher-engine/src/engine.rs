// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The dispatcher-facing handle: a fixed worker-thread pool behind a
//! zero-capacity rendezvous channel (`SPEC_FULL.md` §4.5). Handing a job to
//! `submit_contribution` blocks until some idle worker accepts it, which is
//! exactly the semaphore-mailbox handoff the original design calls for,
//! expressed with a `sync_channel(0)` instead of a semaphore plus a mailbox
//! slot.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

use cruncher_bigint::BigInt;
use cruncher_proto::ReplyField;

use crate::barrier::RoundBarrier;
use crate::lock;
use crate::registry::Registry;

/// Exponents wider than this are rejected rather than silently truncated
/// (§9's exponent-bit-width resolution). 1024 bits covers the RSA-class
/// moduli this worker is built around with headroom to spare.
pub const DEFAULT_EXPONENT_BITS: u64 = 1024;

struct Job {
    round: u64,
    stream_id: u64,
    datum: BigInt,
    barrier: Arc<RoundBarrier>,
}

pub struct Engine {
    registry: Arc<Registry>,
    job_tx: SyncSender<Job>,
    bit_budget: u64,
    window_bits: u32,
    _workers: Vec<thread::JoinHandle<()>>,
}

impl Engine {
    /// Start a fixed pool of `worker_count` threads. `bit_budget` bounds
    /// every exponent this engine will accept, tabled or not; `window_bits`
    /// is the acceleration-table width applied to every entry (the `-z`
    /// flag — the wire protocol carries no per-entry table width).
    pub fn start(worker_count: usize, bit_budget: u64, window_bits: u32) -> Arc<Engine> {
        assert!(worker_count > 0, "a worker pool needs at least one thread");
        let registry = Arc::new(Registry::new(worker_count));
        let (job_tx, job_rx) = mpsc::sync_channel::<Job>(0);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let workers = (0..worker_count)
            .map(|slot| spawn_worker(slot, registry.clone(), job_rx.clone(), bit_budget))
            .collect();

        Arc::new(Engine {
            registry,
            job_tx,
            bit_budget,
            window_bits,
            _workers: workers,
        })
    }

    pub fn bit_budget(&self) -> u64 {
        self.bit_budget
    }

    pub fn worker_count(&self) -> usize {
        self._workers.len()
    }

    pub fn subscribe(&self, sub_id: u64, modulus: BigInt) {
        self.registry.subscribe(sub_id, modulus);
    }

    pub fn add_entry(&self, sub_id: u64, stream_id: u64, base: BigInt) -> bool {
        self.registry
            .add_entry(sub_id, stream_id, base, self.window_bits, self.bit_budget)
    }

    pub fn remove_subscription(&self, sub_id: u64) -> bool {
        self.registry.remove_subscription(sub_id)
    }

    /// Hand one datum to the pool. Blocks until a worker accepts it; the
    /// worker's eventual fan-out retires one slot of the round's barrier.
    pub fn submit_contribution(&self, round: u64, stream_id: u64, datum: BigInt) {
        let barrier = self.registry.open_round_for_contribution(round);
        let job = Job {
            round,
            stream_id,
            datum,
            barrier,
        };
        // The pool outlives every connection that can call this, so a send
        // failure here would mean every worker thread has already panicked
        // and unwound past its loop — there is nothing left to do but drop
        // the job.
        let _ = self.job_tx.send(job);
    }

    /// Wait for `round` to finish (if it was ever opened) and drain it.
    pub fn emit_result(&self, round: u64) -> Vec<ReplyField> {
        if let Some(barrier) = self.registry.round_barrier(round) {
            barrier.wait_until_drained();
        }
        self.registry.drain_round(round)
    }
}

fn spawn_worker(
    slot: usize,
    registry: Arc<Registry>,
    job_rx: Arc<Mutex<Receiver<Job>>>,
    bit_budget: u64,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name(format!("cruncher-worker-{slot}"))
        .spawn(move || loop {
            let job = {
                let rx = lock::lock(&job_rx);
                match rx.recv() {
                    Ok(job) => job,
                    Err(_) => return, // every sender dropped: shut down
                }
            };
            registry.fan_out_datum(job.round, slot, job.stream_id, &job.datum, bit_budget);
            job.barrier.retire_one();
        })
        .expect("failed to spawn worker thread")
}
