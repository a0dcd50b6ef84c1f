//! Account identifier helpers and the mergable-host policy
//!
//! Account identifiers look like `@localpart:domain`. The localpart is the
//! text between the sigil and the first `:`; the domain is everything after it.

/// Extract the localpart of an account identifier
///
/// Returns an empty string for empty or malformed input (no `:` separator).
#[must_use]
pub fn get_localpart(user_id: &str) -> &str {
    let mut chars = user_id.chars();
    if chars.next().is_none() {
        return "";
    }
    let rest = chars.as_str();
    match rest.find(':') {
        Some(idx) => &rest[..idx],
        None => "",
    }
}

/// Extract the domain of an account identifier, if any
#[must_use]
pub fn get_domain(user_id: &str) -> Option<&str> {
    user_id.split_once(':').map(|(_, domain)| domain)
}

/// Check a domain against one host pattern
///
/// Patterns ending in `*` match any domain starting with the prefix;
/// everything else must match exactly. Both comparisons ignore ASCII case.
#[must_use]
pub fn host_matches(pattern: &str, domain: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => {
            domain.len() >= prefix.len()
                && domain.is_char_boundary(prefix.len())
                && domain[..prefix.len()].eq_ignore_ascii_case(prefix)
        }
        None => domain.eq_ignore_ascii_case(pattern),
    }
}

/// Decide whether an account identifier is eligible for merging
#[must_use]
pub fn is_mergable_with<S: AsRef<str>>(patterns: &[S], user_id: &str) -> bool {
    if user_id.is_empty() {
        return false;
    }
    let Some(domain) = get_domain(user_id) else {
        return false;
    };
    patterns.iter().any(|p| host_matches(p.as_ref(), domain))
}

/// True when both identifiers share a (non-empty) localpart
#[inline]
#[must_use]
pub fn same_localpart(a: &str, b: &str) -> bool {
    let lp = get_localpart(a);
    !lp.is_empty() && lp == get_localpart(b)
}
