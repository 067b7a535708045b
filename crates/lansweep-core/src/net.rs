//! Subnet enumeration and local address detection.
//!
//! Only /24 subnets are supported; anything else is rejected rather than
//! silently mis-enumerated.

use std::net::{IpAddr, Ipv4Addr};

use crate::error::SweepError;

/// Enumerate the host addresses of a /24 subnet (`.1` through `.254`).
///
/// The network and broadcast addresses are excluded.
pub fn subnet_hosts(cidr: &str) -> Result<Vec<Ipv4Addr>, SweepError> {
    let (base, mask) = cidr
        .split_once('/')
        .ok_or_else(|| SweepError::InvalidAddress(cidr.to_string()))?;

    if mask != "24" {
        return Err(SweepError::UnsupportedSubnet(cidr.to_string()));
    }

    let base: Ipv4Addr = base
        .parse()
        .map_err(|_| SweepError::InvalidAddress(cidr.to_string()))?;

    let [a, b, c, _] = base.octets();
    Ok((1..255).map(|d| Ipv4Addr::new(a, b, c, d)).collect())
}

/// Derive a /24 CIDR from an IPv4 address.
pub fn cidr_from_ip(ip: Ipv4Addr) -> String {
    let [a, b, c, _] = ip.octets();
    format!("{}.{}.{}.0/24", a, b, c)
}

/// Derive a /24 CIDR from this host's primary non-loopback IPv4 address.
pub fn local_cidr() -> Result<String, SweepError> {
    match local_ip_address::local_ip() {
        Ok(IpAddr::V4(ip)) if !ip.is_loopback() => Ok(cidr_from_ip(ip)),
        _ => Err(SweepError::NoSubnet),
    }
}

/// Extract an IPv4 address from a remote address string, unmapping
/// IPv6-mapped IPv4 (`::ffff:a.b.c.d`).
pub fn ipv4_from_remote(remote: &str) -> Option<String> {
    let stripped = remote.strip_prefix("::ffff:").unwrap_or(remote);
    if stripped.starts_with("::") {
        return None;
    }
    stripped.parse::<Ipv4Addr>().ok().map(|ip| ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subnet_hosts_enumerates_254_addresses() {
        let hosts = subnet_hosts("192.168.1.0/24").unwrap();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(hosts[253], Ipv4Addr::new(192, 168, 1, 254));
    }

    #[test]
    fn test_subnet_hosts_rejects_non_24_masks() {
        assert!(matches!(
            subnet_hosts("10.0.0.0/16"),
            Err(SweepError::UnsupportedSubnet(_))
        ));
        assert!(matches!(
            subnet_hosts("10.0.0.0/25"),
            Err(SweepError::UnsupportedSubnet(_))
        ));
    }

    #[test]
    fn test_subnet_hosts_rejects_garbage() {
        assert!(subnet_hosts("not-a-cidr").is_err());
        assert!(subnet_hosts("999.1.1.0/24").is_err());
    }

    #[test]
    fn test_cidr_from_ip() {
        assert_eq!(
            cidr_from_ip(Ipv4Addr::new(192, 168, 1, 42)),
            "192.168.1.0/24"
        );
    }

    #[test]
    fn test_ipv4_from_remote_unmaps_v6() {
        assert_eq!(
            ipv4_from_remote("::ffff:10.0.0.7"),
            Some("10.0.0.7".to_string())
        );
        assert_eq!(ipv4_from_remote("10.0.0.7"), Some("10.0.0.7".to_string()));
        assert_eq!(ipv4_from_remote("::1"), None);
    }
}
