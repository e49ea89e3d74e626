// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Port Allocator
//!
//! Finds an unused host port for a new database. A candidate counts as free
//! the first time a loopback connection to it is actively refused. Because
//! that observation is not exclusive, every accepted port is also entered in
//! an in-process reservation table so concurrent provisioning calls never
//! hand out the same port.
//!
//! A reservation lives until one of:
//! - the [`PortLease`] is dropped (any failure path),
//! - [`PortLease::release_when_bound`] sees the launched service listening,
//! - its TTL expires.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::domain::ports::{PortProbe, PortRange, PortStatus};
use crate::domain::provisioning::ProvisioningError;

const BIND_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Probes ports by dialing them on the loopback address.
pub struct TcpPortProbe {
    host: IpAddr,
    dial_timeout: Duration,
}

impl TcpPortProbe {
    pub fn new(dial_timeout: Duration) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            dial_timeout,
        }
    }
}

#[async_trait]
impl PortProbe for TcpPortProbe {
    async fn probe(&self, port: u16) -> PortStatus {
        match tokio::time::timeout(self.dial_timeout, TcpStream::connect((self.host, port))).await {
            Ok(Ok(_stream)) => PortStatus::InUse,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => PortStatus::Refused,
            Ok(Err(e)) => PortStatus::Indeterminate(e.to_string()),
            Err(_) => PortStatus::Indeterminate(format!(
                "no answer within {}ms",
                self.dial_timeout.as_millis()
            )),
        }
    }
}

/// Ports reserved by in-flight provisioning calls, keyed by port with the
/// instant the reservation lapses. Each reservation carries a ticket so an
/// expired lease cannot release a newer reservation of the same port.
struct ReservationTable {
    ttl: Duration,
    next_ticket: AtomicU64,
    entries: Mutex<HashMap<u16, Reservation>>,
}

#[derive(Debug, Clone, Copy)]
struct Reservation {
    ticket: u64,
    until: Instant,
}

impl ReservationTable {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            next_ticket: AtomicU64::new(0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn is_reserved(&self, port: u16) -> bool {
        let mut entries = self.entries.lock();
        Self::purge_expired(&mut entries);
        entries.contains_key(&port)
    }

    /// Insert `port` unless a live reservation already holds it.
    fn try_reserve(&self, port: u16) -> Option<u64> {
        let mut entries = self.entries.lock();
        Self::purge_expired(&mut entries);
        if entries.contains_key(&port) {
            return None;
        }
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        entries.insert(
            port,
            Reservation {
                ticket,
                until: Instant::now() + self.ttl,
            },
        );
        Some(ticket)
    }

    fn release(&self, port: u16, ticket: u64) {
        let mut entries = self.entries.lock();
        if entries.get(&port).is_some_and(|r| r.ticket == ticket) {
            entries.remove(&port);
        }
    }

    fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        Self::purge_expired(&mut entries);
        entries.len()
    }

    fn purge_expired(entries: &mut HashMap<u16, Reservation>) {
        let now = Instant::now();
        entries.retain(|port, reservation| {
            let live = reservation.until > now;
            if !live {
                warn!(port = *port, "Port reservation expired before release");
            }
            live
        });
    }
}

impl std::fmt::Debug for ReservationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationTable")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

pub struct PortAllocator {
    range: PortRange,
    probe: Arc<dyn PortProbe>,
    reservations: Arc<ReservationTable>,
}

impl PortAllocator {
    pub fn new(range: PortRange, probe: Arc<dyn PortProbe>, reservation_ttl: Duration) -> Self {
        Self {
            range,
            probe,
            reservations: Arc::new(ReservationTable::new(reservation_ttl)),
        }
    }

    pub fn range(&self) -> PortRange {
        self.range
    }

    pub fn probe(&self) -> Arc<dyn PortProbe> {
        self.probe.clone()
    }

    /// Number of live reservations.
    pub fn reserved_count(&self) -> usize {
        self.reservations.len()
    }

    /// Scan the range in ascending order and reserve the first port that is
    /// neither reserved nor answering.
    ///
    /// The table lock is never held across a probe.
    pub async fn allocate(&self) -> Result<PortLease, ProvisioningError> {
        for port in self.range.iter() {
            if self.reservations.is_reserved(port) {
                debug!(port, "Port reserved by another provisioning call");
                continue;
            }

            match self.probe.probe(port).await {
                PortStatus::Refused => {
                    if let Some(ticket) = self.reservations.try_reserve(port) {
                        info!(port, "Allocated port");
                        return Ok(PortLease {
                            port,
                            ticket,
                            reservations: self.reservations.clone(),
                        });
                    }
                    debug!(port, "Lost reservation race for port");
                }
                PortStatus::InUse => debug!(port, "Port in use"),
                PortStatus::Indeterminate(reason) => {
                    debug!(port, %reason, "Port state indeterminate, skipping")
                }
            }
        }

        warn!(
            start = self.range.start,
            end = self.range.end,
            "No free port in range"
        );
        Err(ProvisioningError::ResourceExhausted {
            start: self.range.start,
            end: self.range.end,
        })
    }
}

/// A reserved port. Dropping the lease releases the reservation.
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    ticket: u64,
    reservations: Arc<ReservationTable>,
}

impl PortLease {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Hold the reservation until the launched service is listening on the
    /// port or `timeout` passes, then release it. Returns whether the port
    /// was seen bound.
    pub async fn release_when_bound(self, probe: Arc<dyn PortProbe>, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if probe.probe(self.port).await == PortStatus::InUse {
                debug!(port = self.port, "Port bound, releasing reservation");
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(port = self.port, "Port not bound before confirmation timeout, releasing reservation");
                return false;
            }
            tokio::time::sleep(BIND_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.reservations.release(self.port, self.ticket);
    }
}
