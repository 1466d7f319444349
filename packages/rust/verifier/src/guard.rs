//! Refuse to fetch local or private network addresses, on the first request
//! and on every redirect hop.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use reqwest::redirect;
use url::{Host, Url};

/// Check if a URL targets a non-public resource.
pub fn is_blocked_target(url: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return true;
    }

    match url.host() {
        Some(Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(Host::Domain(host)) => is_local_hostname(host),
        None => true,
    }
}

/// `localhost`, `*.localhost`, mDNS and internal-only names. A trailing
/// root dot is ignored.
fn is_local_hostname(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() || host == "localhost" {
        return true;
    }
    [".localhost", ".local", ".internal"]
        .iter()
        .any(|suffix| host.ends_with(suffix))
}

/// Check if an IP is in a loopback, private, link-local or otherwise
/// non-routable range. IPv4-mapped IPv6 addresses are judged as IPv4.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => ipv4_is_private(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => ipv4_is_private(&v4),
            None => ipv6_is_private(v6),
        },
    }
}

fn ipv4_is_private(v4: &Ipv4Addr) -> bool {
    let [a, b, c, _] = v4.octets();
    let shared_nat = a == 100 && (64..128).contains(&b);
    let ietf_reserved = a == 192 && b == 0 && c == 0;
    v4.is_loopback()
        || v4.is_private()
        || v4.is_link_local()
        || v4.is_broadcast()
        || v4.is_unspecified()
        || v4.is_multicast()
        || shared_nat
        || ietf_reserved
}

fn ipv6_is_private(v6: &Ipv6Addr) -> bool {
    let first = v6.segments()[0];
    let unique_local = first & 0xfe00 == 0xfc00;
    let link_local = first & 0xffc0 == 0xfe80;
    v6.is_loopback() || v6.is_unspecified() || v6.is_multicast() || unique_local || link_local
}

/// Why a redirect to `next` must not be followed, if it must not.
/// `visited` counts the URLs already requested, the original included.
pub(crate) fn refuse_redirect(
    next: &Url,
    visited: usize,
    max_redirects: usize,
    allow_private_hosts: bool,
) -> Option<&'static str> {
    if visited > max_redirects {
        Some("too many redirects")
    } else if !allow_private_hosts && is_blocked_target(next) {
        Some("redirect to non-public URL blocked")
    } else {
        None
    }
}

/// Redirect policy that re-applies the host guard to every hop.
pub(crate) fn redirect_policy(max_redirects: usize, allow_private_hosts: bool) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        match refuse_redirect(
            attempt.url(),
            attempt.previous().len(),
            max_redirects,
            allow_private_hosts,
        ) {
            Some(reason) => attempt.error(reason),
            None => attempt.follow(),
        }
    })
}
