//! Maps feed identifiers onto the site and asset registry.

use evac_core::errors::EvacError;
use evac_protocol::registry::{Site, TrackedAsset};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::storage::Registry;

#[derive(Debug, Error)]
pub enum SiteResolutionError {
    /// No site carries this network identifier. Caller error.
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
    /// The registry could not be queried. Server fault.
    #[error(transparent)]
    Storage(#[from] EvacError),
}

/// Outcome of looking up an observed device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetResolution {
    Found(TrackedAsset),
    /// Device seen but not provisioned; the scan is kept without linkage.
    Unregistered,
    /// The registry failed; the scan is kept without linkage and flagged.
    LookupFailed(String),
}

impl AssetResolution {
    pub fn asset_id(&self) -> Option<Uuid> {
        match self {
            AssetResolution::Found(asset) => Some(asset.id),
            _ => None,
        }
    }
}

pub async fn resolve_site<R>(registry: &R, network_id: &str) -> Result<Site, SiteResolutionError>
where
    R: Registry + ?Sized,
{
    match registry.find_site_by_network(network_id).await {
        Ok(Some(site)) => Ok(site),
        Ok(None) => Err(SiteResolutionError::UnknownNetwork(network_id.to_string())),
        Err(err) => {
            error!(%network_id, error = %err, "site lookup failed");
            Err(err.into())
        }
    }
}

pub async fn resolve_asset<R>(registry: &R, mac_address: &str) -> AssetResolution
where
    R: Registry + ?Sized,
{
    match registry.find_asset_by_mac(mac_address).await {
        Ok(Some(asset)) => AssetResolution::Found(asset),
        Ok(None) => AssetResolution::Unregistered,
        Err(err) => {
            warn!(%mac_address, error = %err, "asset lookup failed, storing scan without asset");
            AssetResolution::LookupFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn resolves_site_by_exact_network_id() {
        let storage = MemoryStorage::new();
        let site = Site {
            id: Uuid::new_v4(),
            external_id: "N_42".into(),
            name: "Quay".into(),
        };
        storage.add_site(site.clone());

        assert_eq!(resolve_site(&storage, "N_42").await.unwrap(), site);
        let err = resolve_site(&storage, "n_42").await.unwrap_err();
        assert!(matches!(err, SiteResolutionError::UnknownNetwork(id) if id == "n_42"));
    }

    #[tokio::test]
    async fn unknown_device_is_unregistered() {
        let storage = MemoryStorage::new();
        let asset = TrackedAsset {
            id: Uuid::new_v4(),
            mac_address: "AA:AA:AA:AA:AA:AA".into(),
            assigned_to: None,
        };
        storage.add_asset(asset.clone());

        let found = resolve_asset(&storage, "AA:AA:AA:AA:AA:AA").await;
        assert_eq!(found.asset_id(), Some(asset.id));
        assert_eq!(
            resolve_asset(&storage, "BB:BB:BB:BB:BB:BB").await,
            AssetResolution::Unregistered
        );
    }
}
