// Copyright 2025 Ramble Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The RAM value domain
//!
//! Every value flowing through the engine is a single 64-bit machine word.
//! The word carries no type tag; RAM operators reinterpret it as a signed
//! integer, an unsigned integer, an IEEE-754 double, or a symbol handle,
//! apply the native operation, and reinterpret the result back. All
//! reinterpretations are bit-preserving.

/// The canonical machine word of the engine.
pub type RamDomain = i64;

/// Signed interpretation of a [`RamDomain`].
pub type RamSigned = i64;

/// Unsigned interpretation of a [`RamDomain`].
pub type RamUnsigned = u64;

/// Floating-point interpretation of a [`RamDomain`].
pub type RamFloat = f64;

/// The reserved nil record reference.
pub const NIL_RECORD: RamDomain = 0;

/// Smallest signed domain value. Used to span unconstrained index columns.
pub const MIN_SIGNED: RamSigned = RamSigned::MIN;

/// Largest signed domain value.
pub const MAX_SIGNED: RamSigned = RamSigned::MAX;

/// Shift amounts are masked to the word width.
pub const BIT_SHIFT_MASK: u32 = (RamDomain::BITS - 1) as u32;

/// Reinterpret a domain word as unsigned.
#[inline]
pub fn as_unsigned(value: RamDomain) -> RamUnsigned {
    value as RamUnsigned
}

/// Reinterpret an unsigned value as a domain word.
#[inline]
pub fn from_unsigned(value: RamUnsigned) -> RamDomain {
    value as RamDomain
}

/// Reinterpret a domain word as a float.
#[inline]
pub fn as_float(value: RamDomain) -> RamFloat {
    RamFloat::from_bits(value as u64)
}

/// Reinterpret a float as a domain word.
#[inline]
pub fn from_float(value: RamFloat) -> RamDomain {
    value.to_bits() as RamDomain
}

/// Encode a boolean as a domain word.
#[inline]
pub fn truth(value: bool) -> RamDomain {
    RamDomain::from(value)
}

/// The truthiness of a domain word. Zero is false, everything else true.
#[inline]
pub fn is_true(value: RamDomain) -> bool {
    value != 0
}
