// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod repositories;
pub mod event_bus;
pub mod port_allocator;
pub mod compose_renderer;
pub mod docker_compose;
pub mod jwt;
pub mod cloudflare_dns;

pub use compose_renderer::{ComposeContext, ComposeRenderer, RenderError};
pub use port_allocator::{PortAllocator, PortLease, TcpPortProbe};
