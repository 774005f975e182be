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

//! Shared building blocks for the CRUD services in this workspace.
//!
//! A service is split into layers, each one living in a module of the same name:
//!
//! 1.  `model`: validated domain types.  Constructors reject invalid values so that the layers
//!     above never see them.
//!
//! 1.  `db`: free functions that receive an `Executor` and run one query per supported backend.
//!     PostgreSQL serves production traffic and SQLite backs the tests.
//!
//! 1.  `driver`: a `Driver` type that owns the injected `Db` and `Clock` and implements one method
//!     per operation, opening a transaction when an operation needs more than one query.
//!
//! 1.  `rest`: one axum handler per API that extracts the request, calls the driver and turns
//!     the outcome into a response with a JSON body.
//!
//! 1.  `main`: reads the configuration from the environment, connects to the database and serves.
//!
//! Every layer has its own error type (`ModelError`, `DbError`, `DriverError`, `RestError`), and
//! `From` conversions between them let `?` carry a failure up to the HTTP status that reports it.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

pub mod clocks;
pub mod db;
pub mod driver;
pub mod env;
pub mod model;
pub mod rest;
