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

//! Typed access to configuration stored in environment variables.
//!
//! Variables are named `<prefix>_<suffix>` so that one service can read several groups of
//! settings, such as `PGSQL_PROD_HOST` and `PGSQL_TEST_HOST`.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Result type for environment errors, which are human-readable messages.
type Result<T> = std::result::Result<T, String>;

/// Reads the variable `<prefix>_<suffix>` and parses it as a `T`.  Unset variables yield `None`.
fn lookup<T>(prefix: &str, suffix: &str) -> Result<(String, Option<T>)>
where
    T: FromStr,
    T::Err: Display,
{
    let name = format!("{}_{}", prefix, suffix);
    let raw = match env::var(&name) {
        Ok(raw) => raw,
        Err(env::VarError::NotPresent) => return Ok((name, None)),
        Err(env::VarError::NotUnicode(_)) => {
            return Err(format!("Environment variable {} is not valid UTF-8", name));
        }
    };
    match raw.parse::<T>() {
        Ok(value) => Ok((name, Some(value))),
        Err(e) => Err(format!("Cannot parse environment variable {}='{}': {}", name, raw, e)),
    }
}

/// Gets the mandatory variable `<prefix>_<suffix>` parsed as a `T`.
pub fn get_required_var<T>(prefix: &str, suffix: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(prefix, suffix)? {
        (_, Some(value)) => Ok(value),
        (name, None) => Err(format!("Required environment variable {} not present", name)),
    }
}

/// Gets the variable `<prefix>_<suffix>` parsed as a `T`, if set.
///
/// A variable that is set but does not parse is an error, not `None`.
pub fn get_optional_var<T>(prefix: &str, suffix: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    lookup(prefix, suffix).map(|(_, value)| value)
}
