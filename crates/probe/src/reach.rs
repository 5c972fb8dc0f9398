// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reachability probe.
//!
//! A host counts as reachable when at least one configured endpoint
//! answers ICMP or accepts a TCP connect on 53 or 443 within the
//! per-endpoint budget. Endpoints that are literal IPs never touch DNS,
//! so a broken resolver alone cannot make the host look unreachable.

use rvt_core::EndpointLatency;
use std::net::{IpAddr, SocketAddr};
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::debug;

/// Ports tried for the TCP leg of the probe.
const PROBE_PORTS: [u16; 2] = [443, 53];

/// Full probe result, recorded on the pending change.
#[derive(Debug, Clone)]
pub struct ReachReport {
    pub reachable: bool,
    pub endpoints: Vec<EndpointLatency>,
}

/// Probe all endpoints concurrently; one success makes the host reachable.
pub async fn reachable(endpoints: &[String], per_endpoint: Duration) -> ReachReport {
    let mut tasks = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let endpoint = endpoint.clone();
        tasks.push(tokio::spawn(async move {
            probe_endpoint(&endpoint, per_endpoint).await
        }));
    }

    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        // A panicked probe task counts as a failed endpoint
        if let Ok(latency) = task.await {
            results.push(latency);
        }
    }

    ReachReport { reachable: results.iter().any(|e| e.ok), endpoints: results }
}

async fn probe_endpoint(endpoint: &str, budget: Duration) -> EndpointLatency {
    let started = Instant::now();
    let ok = match endpoint.parse::<IpAddr>() {
        Ok(ip) => probe_ip(ip, budget).await,
        Err(_) => probe_hostname(endpoint, budget).await,
    };
    let latency_ms = ok.then(|| started.elapsed().as_millis() as u64);
    debug!(endpoint, ok, ?latency_ms, "probe endpoint finished");
    EndpointLatency { endpoint: endpoint.to_string(), ok, latency_ms }
}

/// Literal IP: TCP connects first, ICMP as the fallback leg.
async fn probe_ip(ip: IpAddr, budget: Duration) -> bool {
    if tcp_connect_any(ip, budget).await {
        return true;
    }
    ping(&ip.to_string(), budget).await
}

/// Hostname: resolution failure fails only this endpoint.
async fn probe_hostname(host: &str, budget: Duration) -> bool {
    for port in PROBE_PORTS {
        let addr = format!("{host}:{port}");
        let connect = async {
            let addrs = tokio::net::lookup_host(addr).await.ok()?;
            for addr in addrs {
                if tcp_connect(addr, budget).await {
                    return Some(());
                }
            }
            None
        };
        if matches!(timeout(budget, connect).await, Ok(Some(()))) {
            return true;
        }
    }
    false
}

async fn tcp_connect_any(ip: IpAddr, budget: Duration) -> bool {
    for port in PROBE_PORTS {
        if tcp_connect(SocketAddr::new(ip, port), budget).await {
            return true;
        }
    }
    false
}

async fn tcp_connect(addr: SocketAddr, budget: Duration) -> bool {
    matches!(timeout(budget, TcpStream::connect(addr)).await, Ok(Ok(_)))
}

/// One ICMP echo via the system ping binary (raw sockets without the
/// setup; the daemon runs as root but tests do not).
async fn ping(target: &str, budget: Duration) -> bool {
    let wait_secs = budget.as_secs().max(1).to_string();
    let child = tokio::process::Command::new("ping")
        .args(["-n", "-c", "1", "-W", &wait_secs, target])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match timeout(budget, child).await {
        Ok(Ok(status)) => status.success(),
        _ => false,
    }
}

#[cfg(test)]
#[path = "reach_tests.rs"]
mod tests;
