// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`spinup-core`)
//!
//! HTTP surface that translates external requests into application
//! service calls. **No business logic lives here**: all real work is
//! delegated to application services in `crate::application`.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | `/createservice`, `/listcluster`, liveness endpoints |

pub mod api;
