//! Request fingerprints: where a request came from and what sent it.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::geo::GeoLocator;
use crate::user_agent::UserAgentParser;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoMetadata {
    #[serde(default)]
    pub country_iso_code: Option<String>,
    #[serde(default)]
    pub subdivision_iso_code: Option<String>,
    #[serde(default)]
    pub city_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub os_family: String,
    pub os_major: Option<String>,
    pub os_minor: Option<String>,
    pub user_agent_family: String,
    pub user_agent_major: Option<String>,
    pub user_agent_minor: Option<String>,
}

/// Fingerprint of a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub ip: String,
    pub geo: GeoMetadata,
    pub device: DeviceMetadata,
}

impl RequestMetadata {
    /// Same location and same device. The IP is ignored: it changes across
    /// networks for the same physical device.
    pub fn same_origin(&self, other: &RequestMetadata) -> bool {
        self.geo == other.geo && self.device == other.device
    }
}

/// The parts of an incoming request a fingerprint is derived from.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Socket peer address, either `ip` or `ip:port`.
    pub remote_addr: Option<String>,
    /// Raw `X-Forwarded-For` header.
    pub forwarded_for: Option<String>,
    /// Raw `User-Agent` header.
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// First `X-Forwarded-For` hop, falling back to the socket address.
    ///
    /// Any client can set the header, so this is only fit for fingerprinting.
    /// Access decisions use [`trusted_client_addr`](Self::trusted_client_addr).
    pub fn client_ip(&self) -> Option<&str> {
        self.forwarded_for
            .as_deref()
            .and_then(|header| header.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .or(self.remote_addr.as_deref().map(str::trim))
    }

    /// Client address for access control.
    ///
    /// The socket peer, unless the peer lies in `trusted_proxies`. Then
    /// `X-Forwarded-For` is walked from the right, skipping further trusted
    /// proxies, and the first other hop is the client. A malformed hop, or a
    /// missing socket address, yields `None`.
    pub fn trusted_client_addr(&self, trusted_proxies: &[IpNetwork]) -> Option<IpAddr> {
        let is_trusted = |ip: IpAddr| trusted_proxies.iter().any(|net| net.contains(ip));

        let peer = self.remote_addr.as_deref().map(str::trim).and_then(parse_ip)?;
        if !is_trusted(peer) {
            return Some(peer);
        }

        let Some(header) = self.forwarded_for.as_deref() else {
            return Some(peer);
        };
        for hop in header.rsplit(',').map(str::trim).filter(|hop| !hop.is_empty()) {
            let ip = parse_ip(hop)?;
            if !is_trusted(ip) {
                return Some(ip);
            }
        }
        Some(peer)
    }
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

/// Derives [`RequestMetadata`] from a [`RequestContext`].
#[derive(Clone)]
pub struct FingerprintExtractor {
    geo: Arc<dyn GeoLocator>,
    user_agents: Arc<dyn UserAgentParser>,
}

impl FingerprintExtractor {
    pub fn new(geo: Arc<dyn GeoLocator>, user_agents: Arc<dyn UserAgentParser>) -> Self {
        Self { geo, user_agents }
    }

    /// `None` means the request cannot be fingerprinted and origin
    /// verification should be skipped. It is never an error.
    pub fn extract(&self, request: &RequestContext) -> Option<RequestMetadata> {
        let Some(raw_ip) = request.client_ip() else {
            tracing::warn!("Request has no client address; skipping fingerprint");
            return None;
        };

        let Some(ip) = parse_ip(raw_ip) else {
            tracing::warn!(ip = raw_ip, "Unparseable client address; skipping fingerprint");
            return None;
        };

        let Some(geo) = self.geo.locate(ip) else {
            tracing::warn!(%ip, "Client address not found in geo table; skipping fingerprint");
            return None;
        };

        let device = self
            .user_agents
            .parse(request.user_agent.as_deref().unwrap_or_default());

        Some(RequestMetadata {
            ip: ip.to_string(),
            geo,
            device,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::NetworkTableLocator;
    use crate::user_agent::{HeuristicUserAgentParser, OTHER_FAMILY};

    const FIREFOX: &str =
        "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

    fn london() -> GeoMetadata {
        GeoMetadata {
            country_iso_code: Some("GB".into()),
            subdivision_iso_code: Some("ENG".into()),
            city_name: Some("London".into()),
        }
    }

    fn extractor() -> FingerprintExtractor {
        let table = NetworkTableLocator::from_entries([
            ("81.2.69.0/24".parse().unwrap(), london()),
            ("2001:db8::/32".parse().unwrap(), GeoMetadata::default()),
        ]);
        FingerprintExtractor::new(Arc::new(table), Arc::new(HeuristicUserAgentParser))
    }

    fn context(remote: Option<&str>, forwarded: Option<&str>) -> RequestContext {
        RequestContext {
            remote_addr: remote.map(Into::into),
            forwarded_for: forwarded.map(Into::into),
            user_agent: Some(FIREFOX.into()),
        }
    }

    #[test]
    fn forwarded_for_first_hop_wins() {
        let ctx = context(Some("10.0.0.1"), Some("81.2.69.160 , 10.0.0.2, 10.0.0.3"));
        assert_eq!(ctx.client_ip(), Some("81.2.69.160"));

        let metadata = extractor().extract(&ctx).unwrap();
        assert_eq!(metadata.ip, "81.2.69.160");
        assert_eq!(metadata.geo, london());
        assert_eq!(metadata.device.user_agent_family, "Firefox");
    }

    #[test]
    fn falls_back_to_socket_address() {
        let ctx = context(Some("81.2.69.12:54321"), None);
        let metadata = extractor().extract(&ctx).unwrap();
        assert_eq!(metadata.ip, "81.2.69.12");
    }

    #[test]
    fn blank_forwarded_header_falls_back() {
        let ctx = context(Some("81.2.69.12"), Some("  "));
        assert_eq!(ctx.client_ip(), Some("81.2.69.12"));
    }

    #[test]
    fn untrusted_peer_ignores_forwarded_for() {
        let proxies: Vec<IpNetwork> = vec!["172.31.0.0/16".parse().unwrap()];
        let ctx = context(Some("198.51.100.7:40000"), Some("10.1.2.3"));
        assert_eq!(
            ctx.trusted_client_addr(&proxies),
            Some("198.51.100.7".parse().unwrap())
        );
        assert_eq!(
            ctx.trusted_client_addr(&[]),
            Some("198.51.100.7".parse().unwrap())
        );
        assert_eq!(context(None, Some("10.1.2.3")).trusted_client_addr(&proxies), None);
        assert_eq!(context(Some("garbage"), None).trusted_client_addr(&proxies), None);
    }

    #[test]
    fn trusted_proxy_chain_is_walked_from_the_right() {
        let proxies: Vec<IpNetwork> = vec!["172.31.0.0/16".parse().unwrap()];

        let single = context(Some("172.31.0.5:443"), Some("10.1.2.3"));
        assert_eq!(single.trusted_client_addr(&proxies), Some("10.1.2.3".parse().unwrap()));

        // The left-most hop came from the client and cannot be trusted.
        let spoofed = context(Some("172.31.0.5:443"), Some("10.1.2.3, 198.51.100.7, 172.31.9.9"));
        assert_eq!(
            spoofed.trusted_client_addr(&proxies),
            Some("198.51.100.7".parse().unwrap())
        );

        let bare = context(Some("[2001:db8::7]:443"), None);
        assert_eq!(
            bare.trusted_client_addr(&["2001:db8::/32".parse().unwrap()]),
            Some("2001:db8::7".parse().unwrap())
        );

        let malformed = context(Some("172.31.0.5"), Some("10.1.2.3, not-an-ip"));
        assert_eq!(malformed.trusted_client_addr(&proxies), None);
    }

    #[test]
    fn ipv6_socket_address() {
        let ctx = context(Some("[2001:db8::7]:443"), None);
        let metadata = extractor().extract(&ctx).unwrap();
        assert_eq!(metadata.ip, "2001:db8::7");
    }

    #[test]
    fn unresolvable_requests_are_skipped() {
        let extractor = extractor();
        assert!(extractor.extract(&context(None, None)).is_none());
        assert!(extractor.extract(&context(Some("garbage"), None)).is_none());
        assert!(extractor.extract(&context(Some("10.9.9.9"), None)).is_none());
    }

    #[test]
    fn missing_user_agent_is_other() {
        let mut ctx = context(Some("81.2.69.1"), None);
        ctx.user_agent = None;
        let metadata = extractor().extract(&ctx).unwrap();
        assert_eq!(metadata.device.user_agent_family, OTHER_FAMILY);
        assert_eq!(metadata.device.os_family, OTHER_FAMILY);
    }

    #[test]
    fn same_origin_ignores_ip() {
        let extractor = extractor();
        let a = extractor.extract(&context(Some("81.2.69.1"), None)).unwrap();
        let b = extractor.extract(&context(Some("81.2.69.200"), None)).unwrap();
        assert_ne!(a, b);
        assert!(a.same_origin(&b));

        let mut c = b.clone();
        c.device.user_agent_major = Some("99".into());
        assert!(!a.same_origin(&c));
    }
}
