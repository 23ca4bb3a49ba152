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

//! Tuple storage
//!
//! A tuple is a fixed-length sequence of domain words. Arities up to
//! [`INLINE_ARITY`] live inline on the stack; larger tuples spill to the
//! heap. Equality and ordering are plain lexicographic; ordering under a
//! column permutation is obtained by storing tuples pre-permuted inside
//! each index (see `relation::index`).

use smallvec::SmallVec;

use super::value::RamDomain;

/// Largest arity stored inline.
pub const INLINE_ARITY: usize = 6;

/// A relation tuple.
pub type Tuple = SmallVec<[RamDomain; INLINE_ARITY]>;

/// Build a tuple from a slice of domain words.
#[inline]
pub fn tuple_from(values: &[RamDomain]) -> Tuple {
    Tuple::from_slice(values)
}

/// Build a zero-filled tuple of the given arity.
#[inline]
pub fn tuple_of_arity(arity: usize) -> Tuple {
    let mut t = Tuple::new();
    t.resize(arity, 0);
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_from_slice() {
        let t = tuple_from(&[1, 2, 3]);
        assert_eq!(t.len(), 3);
        assert_eq!(t[1], 2);
    }

    #[test]
    fn test_tuple_of_arity() {
        let t = tuple_of_arity(4);
        assert_eq!(t.as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_lexicographic_ordering() {
        assert!(tuple_from(&[1, 2]) < tuple_from(&[1, 3]));
        assert!(tuple_from(&[1, 9]) < tuple_from(&[2, 0]));
        assert_eq!(tuple_from(&[5]), tuple_from(&[5]));
    }

    #[test]
    fn test_large_arity_spills() {
        let values: Vec<RamDomain> = (0..10).collect();
        let t = tuple_from(&values);
        assert_eq!(t.len(), 10);
        assert_eq!(t[9], 9);
    }
}
