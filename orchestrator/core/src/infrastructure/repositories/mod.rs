// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the `ClusterRepository` abstraction
//! defined in the domain layer.
//!
//! # Available Implementations
//!
//! - **SqliteClusterRepository** - One SQLite file per tenant

pub mod sqlite_cluster;

pub use sqlite_cluster::SqliteClusterRepository;
