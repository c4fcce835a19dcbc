// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Thin large-integer adapter.
//!
//! The rest of this workspace never touches `num_bigint` directly; it goes
//! through the small surface exposed here (hex I/O, modular multiply/reduce/
//! exponentiate, shift, low-bit mask). Keeping the adapter this narrow means
//! the underlying bignum crate could be swapped without touching the engine
//! or protocol layers.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use std::fmt;

/// Errors surfaced by the adapter. Malformed hex is the only fallible path;
/// everything else is infallible given well-formed `BigInt` inputs.
#[derive(Debug, thiserror::Error)]
pub enum BigIntError {
    /// The input string contained a non-hex-digit byte.
    #[error("malformed hex string: {0:?}")]
    MalformedHex(String),
}

/// A non-negative arbitrary-precision integer.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BigInt(BigUint);

impl fmt::Debug for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BigInt({})", self.to_hex())
    }
}

impl BigInt {
    /// The constant zero.
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// The constant one.
    pub fn one() -> Self {
        Self(BigUint::one())
    }

    /// Build from a small unsigned constant.
    pub fn from_u64(value: u64) -> Self {
        Self(BigUint::from(value))
    }

    /// Parse a lower- or upper-case hex string (no `0x` prefix, no sign).
    /// An empty string decodes to zero, matching the adapter this is a thin
    /// wrapper over.
    pub fn from_hex(s: &str) -> Result<Self, BigIntError> {
        if s.is_empty() {
            return Ok(Self::zero());
        }
        BigUint::parse_bytes(s.as_bytes(), 16)
            .map(Self)
            .ok_or_else(|| BigIntError::MalformedHex(s.to_string()))
    }

    /// Emit as lower-case hex with no leading zeros (the canonical
    /// representation: zero itself encodes as `"0"`).
    pub fn to_hex(&self) -> String {
        if self.0.is_zero() {
            return "0".to_string();
        }
        let mut digits: Vec<u8> = self.0.to_radix_be(16);
        for d in &mut digits {
            *d = hex_digit(*d);
        }
        // SAFETY-free: every byte in `digits` is an ASCII hex digit.
        String::from_utf8(digits).expect("hex digits are valid UTF-8")
    }

    /// `true` if this value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Number of bits needed to represent this value (0 for zero).
    pub fn bit_length(&self) -> u64 {
        self.0.bits()
    }

    /// `(self * other) mod modulus`.
    pub fn mulmod(&self, other: &BigInt, modulus: &BigInt) -> BigInt {
        Self((&self.0 * &other.0) % &modulus.0)
    }

    /// `self mod modulus`.
    pub fn modulo(&self, modulus: &BigInt) -> BigInt {
        Self(&self.0 % &modulus.0)
    }

    /// `(self ^ exp) mod modulus`, general big exponent.
    pub fn modpow(&self, exp: &BigInt, modulus: &BigInt) -> BigInt {
        Self(self.0.modpow(&exp.0, &modulus.0))
    }

    /// `(self ^ exp) mod modulus` for a small unsigned exponent.
    pub fn modpow_u64(&self, exp: u64, modulus: &BigInt) -> BigInt {
        Self(self.0.modpow(&BigUint::from(exp), &modulus.0))
    }

    /// Return a new value equal to `self >> bits`. Does not mutate `self`.
    pub fn shr(&self, bits: u32) -> BigInt {
        Self(&self.0 >> bits)
    }

    /// Extract the low `k` bits as a small unsigned integer (`k <= 63`).
    /// This is the masking step used to pull one base-2^k digit out of a
    /// working exponent copy.
    pub fn low_bits(&self, k: u32) -> u64 {
        debug_assert!(k <= 63, "low_bits window must fit in a u64");
        let mask = BigUint::from((1u64 << k) - 1);
        let low = &self.0 & mask;
        low.iter_u64_digits().next().unwrap_or(0)
    }
}

fn hex_digit(nibble: u8) -> u8 {
    match nibble {
        0..=9 => b'0' + nibble,
        10..=15 => b'a' + (nibble - 10),
        _ => unreachable!("radix-16 digit out of range"),
    }
}
