// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Host port range and probing contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Contiguous range `[start, end)` of host ports handed out to databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn len(&self) -> usize {
        usize::from(self.end.saturating_sub(self.start))
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && port < self.end
    }

    /// Candidates in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.start..self.end
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self { start: 5432, end: 5440 }
    }
}

/// What a connection attempt to a local port observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortStatus {
    /// Connection was actively refused: nothing is listening.
    Refused,
    /// Connection succeeded: something is listening.
    InUse,
    /// Any other outcome (timeout, unreachable, permission denied, ...).
    Indeterminate(String),
}

#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn probe(&self, port: u16) -> PortStatus;
}
