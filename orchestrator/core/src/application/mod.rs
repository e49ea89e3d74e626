// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod container_launcher;
pub mod provisioning;

// Re-export use cases for convenience
pub use container_launcher::ContainerLauncher;
pub use provisioning::{ProvisioningService, ProvisioningSettings, StandardProvisioningService};
