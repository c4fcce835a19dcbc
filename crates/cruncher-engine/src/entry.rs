// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixed-base windowed modular exponentiation (`SPEC_FULL.md` §4.2).
//!
//! An [`Entry`] pairs a base with an optional acceleration table. With no
//! table it falls back to general `modpow`; with a table of window width `k`
//! it walks the exponent `k` bits at a time, one `mulmod` per nonzero digit.

use cruncher_bigint::BigInt;

/// Largest window width a table will be built with. Sixteen means a table
/// entry span of up to 65535 precomputed residues per chunk, which is
/// already well past where a wider window stops paying for itself against
/// the cost of building it.
pub const MAX_WINDOW_BITS: u32 = 16;

/// Errors raised while exponentiating.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    /// The exponent was wider than the configured validation budget.
    #[error("exponent is {actual}-bit, wider than the {budget}-bit budget")]
    ExponentTooWide { actual: u64, budget: u64 },
}

#[derive(Clone, Debug)]
struct Table {
    k: u32,
    chunks: u32,
    /// `chunks` groups of `2^k - 1` residues each: group `c`, index `j`
    /// (0-based) holds `base^((j+1) * 2^(c*k)) mod modulus`.
    residues: Vec<BigInt>,
}

/// One base within a subscription, with its acceleration table.
#[derive(Clone, Debug)]
pub struct Entry {
    base: BigInt,
    table: Option<Table>,
}

impl Entry {
    /// A fresh entry with no table; `rebuild_table` installs one.
    pub fn new(base: BigInt) -> Self {
        Entry { base, table: None }
    }

    /// Current window width, or 0 if untabled.
    pub fn window_bits(&self) -> u32 {
        self.table.as_ref().map(|t| t.k).unwrap_or(0)
    }

    /// Replace the base, discarding any table built for the previous one.
    /// The caller is expected to follow up with `rebuild_table` against the
    /// new base before the entry is used again.
    pub fn set_base(&mut self, base: BigInt) {
        self.base = base;
        self.table = None;
    }

    /// (Re)build the acceleration table for a window of `k` bits, covering
    /// exponents up to `exponent_bits` wide. `k == 0` clears the table and
    /// falls back to general `modpow`.
    pub fn rebuild_table(&mut self, k: u32, modulus: &BigInt, exponent_bits: u64) {
        let k = k.min(MAX_WINDOW_BITS);
        if k == 0 {
            self.table = None;
            return;
        }
        let chunks = chunk_count(exponent_bits, k);
        let span = (1u64 << k) - 1;
        let mut residues = Vec::with_capacity(chunks as usize * span as usize);
        let mut x = self.base.clone();
        for _ in 0..chunks {
            let mut power = x.clone();
            for _ in 0..span {
                residues.push(power.clone());
                power = power.mulmod(&x, modulus);
            }
            x = power;
        }
        self.table = Some(Table { k, chunks, residues });
    }

    /// `base^exp mod modulus`, rejecting exponents wider than `bit_budget`.
    pub fn exponentiate(
        &self,
        exp: &BigInt,
        modulus: &BigInt,
        bit_budget: u64,
    ) -> Result<BigInt, EngineError> {
        let actual = exp.bit_length();
        if actual > bit_budget {
            return Err(EngineError::ExponentTooWide {
                actual,
                budget: bit_budget,
            });
        }
        let Some(table) = &self.table else {
            return Ok(self.base.modpow(exp, modulus));
        };
        let span = (1u64 << table.k) - 1;
        let mut working = exp.clone();
        let mut out = BigInt::one();
        for chunk in 0..table.chunks {
            let digit = working.low_bits(table.k);
            working = working.shr(table.k);
            if digit != 0 {
                let idx = chunk as u64 * span + (digit - 1);
                out = out.mulmod(&table.residues[idx as usize], modulus);
            }
        }
        Ok(out)
    }
}

fn chunk_count(bits: u64, k: u32) -> u32 {
    let k = k as u64;
    (bits.div_ceil(k)) as u32
}
