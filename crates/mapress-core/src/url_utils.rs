use std::collections::HashSet;
use std::hash::Hash;

use url::{Host, Url};

/// Key used to group sources by publisher when scoring corroboration.
///
/// Falls back to the raw input if it cannot be parsed or has no host.
pub fn source_domain(input: &str) -> String {
    match Url::parse(input) {
        Ok(parsed) => parsed
            .host_str()
            .map(str::to_string)
            .unwrap_or_else(|| input.to_string()),
        Err(_) => input.to_string(),
    }
}

/// Hostname without a leading `www.`, for outlet labels.
pub fn display_host(input: &str) -> String {
    let host = source_domain(input);
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

/// Accept only public http(s) URLs. Private, loopback, link-local and `0.x`
/// IPv4 literals are refused.
pub fn safe_http_url(input: &str) -> Option<String> {
    let parsed = Url::parse(input).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    if let Some(Host::Ipv4(ip)) = parsed.host() {
        if ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.octets()[0] == 0 {
            return None;
        }
    }

    Some(parsed.to_string())
}

/// Keep the first item for every distinct key, preserving order.
pub fn dedupe_by_key<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect()
}
