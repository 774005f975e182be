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

//! Command-line launcher that prints the sum of `1..=N` computed in every supported way.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use log::debug;
use std::env;
use std::process;
use sum_to_n::{sum_to_n_formula, sum_to_n_iterative, sum_to_n_recursive, MAX_N};

/// Value of `N` used when none is given.
const DEFAULT_N: u64 = 5;

/// Exit code for invalid invocations.
const USAGE_ERROR: i32 = 2;

/// Errors caused by invalid command-line arguments.
#[derive(Debug, PartialEq, thiserror::Error)]
enum UsageError {
    /// The argument is not a non-negative integer.
    #[error("Invalid N '{0}': must be a non-negative integer")]
    NotANumber(String),

    /// The argument is too large for its sum to be representable.
    #[error("Invalid N {0}: must be at most {max}", max = MAX_N)]
    TooLarge(u64),

    /// More than one argument was given.
    #[error("Too many arguments; usage: sum-to-n [N]")]
    TooManyArgs,
}

/// Obtains `N` from the command-line arguments `args`, which exclude the program name.
fn parse_n<I: Iterator<Item = String>>(mut args: I) -> Result<u64, UsageError> {
    let n = match args.next() {
        None => return Ok(DEFAULT_N),
        Some(arg) => arg.parse::<u64>().map_err(|_| UsageError::NotANumber(arg))?,
    };
    if args.next().is_some() {
        return Err(UsageError::TooManyArgs);
    }
    if n > MAX_N {
        return Err(UsageError::TooLarge(n));
    }
    Ok(n)
}

fn main() {
    env_logger::init();

    let n = match parse_n(env::args().skip(1)) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("sum-to-n: {}", e);
            process::exit(USAGE_ERROR);
        }
    };
    debug!("Computing sums up to {}", n);

    println!("iterative: {}", sum_to_n_iterative(n));
    println!("formula: {}", sum_to_n_formula(n));
    println!("recursive: {}", sum_to_n_recursive(n));
}
