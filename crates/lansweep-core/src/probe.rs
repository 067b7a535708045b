//! Reachability probing.
//!
//! A probe is a single best-effort reachability check of one address with a
//! timeout; no retries. The production implementation shells out to the
//! system `ping` binary, but sweeps only depend on the [`Probe`] trait so
//! tests can script reachability.

use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::CoreError;

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub alive: bool,
    /// Round-trip time in milliseconds, when the target answered
    pub rtt_ms: Option<i32>,
}

impl ProbeReport {
    pub fn unreachable() -> Self {
        Self {
            alive: false,
            rtt_ms: None,
        }
    }
}

/// Capability to check whether a single address is reachable.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, ip: Ipv4Addr, probe_timeout: Duration) -> Result<ProbeReport, CoreError>;
}

/// Probe implementation backed by the system `ping` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct PingProbe;

#[async_trait]
impl Probe for PingProbe {
    async fn probe(&self, ip: Ipv4Addr, probe_timeout: Duration) -> Result<ProbeReport, CoreError> {
        let output = run_ping(ip, probe_timeout);

        // The deadline passed to ping is advisory; enforce it here too.
        let output = match timeout(probe_timeout + Duration::from_secs(1), output).await {
            Ok(result) => result?,
            Err(_) => return Ok(ProbeReport::unreachable()),
        };

        if !output.status.success() {
            return Ok(ProbeReport::unreachable());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(ProbeReport {
            alive: true,
            rtt_ms: parse_rtt_ms(&stdout),
        })
    }
}

async fn run_ping(ip: Ipv4Addr, probe_timeout: Duration) -> std::io::Result<std::process::Output> {
    let mut cmd = Command::new("ping");
    #[cfg(windows)]
    cmd.args(["-n", "1", "-w"])
        .arg(probe_timeout.as_millis().max(1).to_string());
    #[cfg(not(windows))]
    cmd.args(["-c", "1", "-W"])
        .arg(probe_timeout.as_secs().max(1).to_string());
    cmd.arg(ip.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    cmd.output().await
}

/// Parse the `time=...` field from ping output, rounded to whole ms.
fn parse_rtt_ms(stdout: &str) -> Option<i32> {
    let idx = stdout.find("time=")?;
    let rest = &stdout[idx + 5..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    let value: f64 = rest[..end].parse().ok()?;
    Some(value.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rtt_from_linux_output() {
        let out = "64 bytes from 192.168.1.1: icmp_seq=1 ttl=64 time=2.34 ms";
        assert_eq!(parse_rtt_ms(out), Some(2));
    }

    #[test]
    fn test_parse_rtt_rounds_up() {
        let out = "64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=6.81 ms";
        assert_eq!(parse_rtt_ms(out), Some(7));
    }

    #[test]
    fn test_parse_rtt_from_windows_output() {
        let out = "Reply from 192.168.1.1: bytes=32 time=4ms TTL=64";
        assert_eq!(parse_rtt_ms(out), Some(4));
    }

    #[test]
    fn test_parse_rtt_missing() {
        assert_eq!(parse_rtt_ms("Request timed out."), None);
    }
}
