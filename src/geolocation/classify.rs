//! Static IP range classification.
//!
//! Non-globally-routable addresses never reach a provider: they classify to
//! a synthesized pseudo-location with a stable code, so the pseudo-country
//! buckets produced by traffic rollups stay comparable across runs.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::geolocation::GeoLocation;

/// Classify an address against the static special-range rules.
///
/// Returns `Some(pseudo-location)` for anything non-globally-routable,
/// `None` for addresses that should be resolved by a provider.
pub fn classify_special(ip: &IpAddr) -> Option<GeoLocation> {
    match ip {
        IpAddr::V4(v4) => classify_v4(v4),
        IpAddr::V6(v6) => classify_v6(v6),
    }
}

/// Whether the address is globally routable and therefore eligible for
/// provider resolution.
pub fn is_public_ip(ip: &IpAddr) -> bool {
    classify_special(ip).is_none()
}

fn classify_v4(ip: &Ipv4Addr) -> Option<GeoLocation> {
    let octets = ip.octets();

    if ip.is_private() {
        return Some(pseudo("Internal", "Internal Network"));
    }
    if ip.is_loopback() {
        return Some(pseudo("Loopback", "Loopback"));
    }
    if ip.is_link_local() {
        return Some(pseudo("LinkLocal", "Link-Local"));
    }
    if ip.is_broadcast() {
        return Some(pseudo("Broadcast", "Broadcast"));
    }
    if ip.is_multicast() {
        return Some(pseudo("Multicast", "Multicast"));
    }
    if ip.is_documentation() {
        return Some(pseudo("Reserved", "Reserved"));
    }
    // 0.0.0.0/8, shared CGNAT 100.64.0.0/10, IETF 192.0.0.0/24,
    // benchmarking 198.18.0.0/15, and 240.0.0.0/4.
    if octets[0] == 0
        || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        || (octets[0] == 192 && octets[1] == 0 && octets[2] == 0)
        || (octets[0] == 198 && (octets[1] & 0xfe) == 18)
        || octets[0] >= 240
    {
        return Some(pseudo("Reserved", "Reserved"));
    }

    None
}

fn classify_v6(ip: &Ipv6Addr) -> Option<GeoLocation> {
    // IPv4-mapped addresses classify as their embedded IPv4 address.
    if let Some(v4) = ip.to_ipv4_mapped() {
        return classify_v4(&v4);
    }

    if ip.is_loopback() {
        return Some(pseudo("IP6_LOOP", "IPv6 Loopback"));
    }
    if ip.is_multicast() {
        return Some(pseudo("IP6_MCAST", "IPv6 Multicast"));
    }

    let segments = ip.segments();
    if (segments[0] & 0xffc0) == 0xfe80 {
        return Some(pseudo("IP6_LINK", "IPv6 Link-Local"));
    }
    if (segments[0] & 0xffc0) == 0xfec0 {
        return Some(pseudo("IP6_SITE", "IPv6 Site-Local"));
    }
    if (segments[0] & 0xfe00) == 0xfc00 {
        return Some(pseudo("IP6_ULA", "IPv6 Unique Local"));
    }
    // Global unicast is 2000::/3; everything else is non-routable.
    if (segments[0] & 0xe000) != 0x2000 {
        return Some(pseudo("IP6_OTHER", "IPv6 Non-Global"));
    }

    None
}

fn pseudo(code: &str, name: &str) -> GeoLocation {
    GeoLocation {
        country_code: code.to_string(),
        country_name: name.to_string(),
        city: None,
        extra: Default::default(),
    }
}
