use axum::http::HeaderMap;

/// Forwarding headers consulted in priority order.
pub const CLIENT_IP_HEADERS: [&str; 8] = [
    "x-forwarded-for",
    "x-real-ip",
    "x-client-ip",
    "cf-connecting-ip",
    "x-cluster-client-ip",
    "x-forwarded",
    "forwarded-for",
    "forwarded",
];

/// Originating client IP from proxy headers, or `None` when no header yields one.
pub fn get_client_ip(headers: &HeaderMap) -> Option<String> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        let raw = headers.get(*name)?.to_str().ok()?;
        let first = raw.split(',').next()?.trim();
        let candidate = if *name == "forwarded" {
            forwarded_for(first)
        } else {
            first
        };

        if candidate.is_empty() || candidate.eq_ignore_ascii_case("unknown") {
            None
        } else {
            Some(candidate.to_string())
        }
    })
}

/// Unwraps the `for=` parameter of an RFC 7239 element, falling back to the raw value.
fn forwarded_for(element: &str) -> &str {
    let Some(node) = element.split(';').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        key.trim().eq_ignore_ascii_case("for").then(|| value.trim())
    }) else {
        return element;
    };

    let node = node.trim_matches('"');
    if let Some(bracketed) = node.strip_prefix('[') {
        return bracketed.split(']').next().unwrap_or(bracketed);
    }
    match node.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            host
        }
        _ => node,
    }
}
