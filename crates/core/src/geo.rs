//! IP geolocation.
//!
//! [`GeoLocator`] is the output contract of a GeoIP database. The shipped
//! [`NetworkTableLocator`] resolves addresses against a table of CIDR networks
//! (longest prefix wins), loaded from a JSON file of the form:
//!
//! ```json
//! [
//!   { "network": "81.2.69.0/24", "country_iso_code": "GB",
//!     "subdivision_iso_code": "ENG", "city_name": "London" }
//! ]
//! ```

use std::net::IpAddr;
use std::path::Path;

use ipnetwork::IpNetwork;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};
use crate::fingerprint::GeoMetadata;

pub trait GeoLocator: Send + Sync {
    /// `None` when the address is not in the database.
    fn locate(&self, ip: IpAddr) -> Option<GeoMetadata>;
}

#[derive(Debug, Deserialize)]
struct TableEntry {
    network: IpNetwork,
    #[serde(flatten)]
    geo: GeoMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkTableLocator {
    entries: Vec<(IpNetwork, GeoMetadata)>,
}

impl NetworkTableLocator {
    pub fn from_entries(entries: impl IntoIterator<Item = (IpNetwork, GeoMetadata)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let entries: Vec<TableEntry> = serde_json::from_str(json)
            .map_err(|e| CoreError::Validation(format!("Invalid geo table: {e}")))?;
        Ok(Self::from_entries(
            entries.into_iter().map(|entry| (entry.network, entry.geo)),
        ))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Internal(format!("Failed to read geo table {}: {e}", path.display()))
        })?;
        let locator = Self::from_json_str(&json)?;
        tracing::info!(path = %path.display(), networks = locator.len(), "Geo table loaded");
        Ok(locator)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl GeoLocator for NetworkTableLocator {
    fn locate(&self, ip: IpAddr) -> Option<GeoMetadata> {
        self.entries
            .iter()
            .filter(|(network, _)| network.contains(ip))
            .max_by_key(|(network, _)| network.prefix())
            .map(|(_, geo)| geo.clone())
    }
}
