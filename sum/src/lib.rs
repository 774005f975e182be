// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Three ways of computing `1 + 2 + ... + n`.
//!
//! All functions agree for every `n` up to `MAX_N`, the largest value whose sum fits in a `u64`.
//! Larger inputs overflow.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

/// Largest `n` for which `1 + 2 + ... + n` is representable as a `u64`.
pub const MAX_N: u64 = 6_074_000_999;

/// Sums the integers in `1..=n` one at a time.
pub fn sum_to_n_iterative(n: u64) -> u64 {
    let mut sum = 0;
    for i in 1..=n {
        sum += i;
    }
    sum
}

/// Sums the integers in `1..=n` with the closed formula `n * (n + 1) / 2`.
pub fn sum_to_n_formula(n: u64) -> u64 {
    // Halve whichever factor is even before multiplying so that the product cannot overflow
    // when the result itself fits.
    if n % 2 == 0 {
        (n / 2) * (n + 1)
    } else {
        n * ((n + 1) / 2)
    }
}

/// Sums the integers in `1..=n` recursively.
///
/// The even numbers in the range add up to twice the sum up to `n / 2` and the odd numbers add up
/// to the square of their count, so each call halves `n` and the recursion depth stays
/// logarithmic.
pub fn sum_to_n_recursive(n: u64) -> u64 {
    if n <= 1 {
        return n;
    }

    let half = n / 2;
    let even_part = 2 * sum_to_n_recursive(half) + half * half;
    if n % 2 == 0 {
        even_part
    } else {
        even_part + n
    }
}
