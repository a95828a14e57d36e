// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Canonical forms of addresses, networks and MAC addresses

use ipnetwork::IpNetwork;
use ipnetwork::Ipv4Network;
use ipnetwork::Ipv6Network;
use std::net::IpAddr;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid IP address {0:?}")]
    Address(String),
    #[error("invalid network mask {mask:?} in {input:?}")]
    Mask { input: String, mask: String },
    #[error("invalid MAC address {0:?}")]
    Mac(String),
}

/// Parses `input` as `address`, `address/length` or `address/dotted-mask`.
/// A bare address gets a host-length mask.
pub fn parse_interface_address(input: &str) -> Result<IpNetwork, AddressError> {
    let input = input.trim();
    let (host, mask) = match input.split_once('/') {
        Some((host, mask)) => (host, Some(mask)),
        None => (input, None),
    };
    let addr: IpAddr = host
        .parse()
        .map_err(|_| AddressError::Address(input.to_owned()))?;
    let mask_error = || AddressError::Mask {
        input: input.to_owned(),
        mask: mask.unwrap_or_default().to_owned(),
    };
    let prefix = match (addr, mask) {
        (IpAddr::V4(_), None) => 32,
        (IpAddr::V6(_), None) => 128,
        (IpAddr::V4(_), Some(mask)) if mask.contains('.') => {
            let dotted: Ipv4Addr = mask.parse().map_err(|_| mask_error())?;
            ipnetwork::ipv4_mask_to_prefix(dotted).map_err(|_| mask_error())?
        }
        (_, Some(mask)) => mask.parse::<u8>().map_err(|_| mask_error())?,
    };
    IpNetwork::new(addr, prefix).map_err(|_| mask_error())
}

/// Canonical `address/length` string of an interface address.
pub fn canonical_ip(input: &str) -> Result<String, AddressError> {
    parse_interface_address(input).map(|net| net.to_string())
}

/// Canonical `network/length` string of a prefix: host bits are cleared.
pub fn canonical_prefix(input: &str) -> Result<String, AddressError> {
    let net = parse_interface_address(input)?;
    let network = match net {
        IpNetwork::V4(v4) => Ipv4Network::new(v4.network(), v4.prefix())
            .map(IpNetwork::V4),
        IpNetwork::V6(v6) => Ipv6Network::new(v6.network(), v6.prefix())
            .map(IpNetwork::V6),
    };
    network
        .map(|n| n.to_string())
        .map_err(|_| AddressError::Address(input.to_owned()))
}

/// Normalises a MAC address to uppercase colon-separated octets.  Accepts
/// `:`, `-` and `.` separators, or none at all.
pub fn canonical_mac(input: &str) -> Result<String, AddressError> {
    let digits: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();
    if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AddressError::Mac(input.to_owned()));
    }
    let upper = digits.to_ascii_uppercase();
    let octets: Vec<&str> = (0..6).map(|i| &upper[i * 2..i * 2 + 2]).collect();
    Ok(octets.join(":"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_canonical_ip() {
        assert_eq!(canonical_ip("10.0.0.1/24").unwrap(), "10.0.0.1/24");
        assert_eq!(
            canonical_ip("10.0.0.1/255.255.255.0").unwrap(),
            "10.0.0.1/24"
        );
        assert_eq!(canonical_ip("10.0.0.1").unwrap(), "10.0.0.1/32");
        assert_eq!(
            canonical_ip("2001:DB8:0:0::1/64").unwrap(),
            "2001:db8::1/64"
        );
        assert!(canonical_ip("10.0.0.300/24").is_err());
        assert!(canonical_ip("10.0.0.1/255.0.255.0").is_err());
        assert!(canonical_ip("10.0.0.1/33").is_err());
    }

    #[test]
    fn test_canonical_prefix() {
        assert_eq!(canonical_prefix("10.0.0.17/24").unwrap(), "10.0.0.0/24");
        assert_eq!(
            canonical_prefix("192.168.4.9/255.255.252.0").unwrap(),
            "192.168.4.0/22"
        );
        assert_eq!(
            canonical_prefix("2001:db8::1/64").unwrap(),
            "2001:db8::/64"
        );
    }

    #[test]
    fn test_canonical_mac() {
        assert_eq!(
            canonical_mac("aa-bb-cc-dd-ee-ff").unwrap(),
            "AA:BB:CC:DD:EE:FF"
        );
        assert_eq!(
            canonical_mac("aabb.ccdd.eeff").unwrap(),
            "AA:BB:CC:DD:EE:FF"
        );
        assert!(canonical_mac("aa:bb:cc").is_err());
        assert!(canonical_mac("gg:bb:cc:dd:ee:ff").is_err());
    }
}
