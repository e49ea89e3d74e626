// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides mod functionality for the system.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements mod

pub mod service;
pub mod provisioning;
pub mod events;
pub mod runtime;
pub mod node_config;
pub mod repository;
pub mod ports;
pub mod auth;
pub mod dns;
pub mod path_sanitizer;
