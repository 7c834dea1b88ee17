//! User-agent parsing into [`DeviceMetadata`].
//!
//! The heuristic parser below recognises the major browser and OS families
//! without an external regex database. Anything it cannot classify becomes
//! the `"Other"` family with no versions.

use crate::fingerprint::DeviceMetadata;

/// Family reported for unrecognised or missing user agents.
pub const OTHER_FAMILY: &str = "Other";

/// Turns a raw `User-Agent` header into device metadata.
pub trait UserAgentParser: Send + Sync {
    fn parse(&self, user_agent: &str) -> DeviceMetadata;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicUserAgentParser;

impl UserAgentParser for HeuristicUserAgentParser {
    fn parse(&self, user_agent: &str) -> DeviceMetadata {
        let (user_agent_family, ua_version) = detect_browser(user_agent);
        let (os_family, os_version) = detect_os(user_agent);
        let (user_agent_major, user_agent_minor) = split_version(ua_version.as_deref());
        let (os_major, os_minor) = split_version(os_version.as_deref());

        DeviceMetadata {
            os_family,
            os_major,
            os_minor,
            user_agent_family,
            user_agent_major,
            user_agent_minor,
        }
    }
}

/// Browser family and raw version. More specific tokens are checked first
/// because Chromium derivatives also advertise `Chrome/` and `Safari/`.
fn detect_browser(ua: &str) -> (String, Option<String>) {
    const BROWSERS: &[(&str, &str)] = &[
        ("Edg/", "Edge"),
        ("OPR/", "Opera"),
        ("Firefox/", "Firefox"),
        ("Chrome/", "Chrome"),
    ];

    for (token, family) in BROWSERS {
        if ua.contains(token) {
            return (family.to_string(), extract_version(ua, token));
        }
    }

    if ua.contains("Safari/") {
        return ("Safari".to_string(), extract_version(ua, "Version/"));
    }

    if ua.contains("curl/") {
        return ("curl".to_string(), extract_version(ua, "curl/"));
    }

    (OTHER_FAMILY.to_string(), None)
}

/// OS family and raw version. iOS precedes macOS ("like Mac OS X") and
/// Android precedes Linux ("Linux; Android").
fn detect_os(ua: &str) -> (String, Option<String>) {
    if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
        return ("iOS".to_string(), extract_version(ua, "OS "));
    }
    if ua.contains("Android") {
        return ("Android".to_string(), extract_version(ua, "Android "));
    }
    if ua.contains("Windows") {
        return ("Windows".to_string(), extract_version(ua, "Windows NT "));
    }
    if ua.contains("Mac OS X") {
        return ("Mac OS X".to_string(), extract_version(ua, "Mac OS X "));
    }
    if ua.contains("CrOS") {
        return ("Chrome OS".to_string(), None);
    }
    if ua.contains("Linux") {
        return ("Linux".to_string(), None);
    }
    (OTHER_FAMILY.to_string(), None)
}

/// Version digits following `prefix`, with `_` separators normalised to `.`.
fn extract_version(ua: &str, prefix: &str) -> Option<String> {
    let start = ua.find(prefix)? + prefix.len();
    let rest = &ua[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.' && c != '_')
        .unwrap_or(rest.len());
    let version = rest[..end].replace('_', ".");
    if version.is_empty() {
        None
    } else {
        Some(version)
    }
}

fn split_version(version: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(version) = version else {
        return (None, None);
    };
    let mut parts = version
        .split('.')
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    (parts.next(), parts.next())
}
