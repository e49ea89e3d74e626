// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the spinup CLI

pub mod config;
pub mod serve;
pub mod token;

pub use self::config::ConfigCommand;
pub use self::serve::ServeArgs;
pub use self::token::TokenCommand;
