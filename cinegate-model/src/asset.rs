#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::account::ViewerAccount;
use crate::ids::AssetId;
use crate::resolution::ResolutionTier;

/// Catalog entry as seen by the entitlement engine. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Asset {
    pub id: AssetId,
    pub is_adult_only: bool,
}

impl Asset {
    pub fn new(id: impl Into<String>, is_adult_only: bool) -> Self {
        Self {
            id: AssetId::new(id),
            is_adult_only,
        }
    }
}

/// A single attempt to start playback.
///
/// `viewer` is `None` for anonymous requests, which are evaluated against
/// the Guest plan.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WatchRequest {
    pub viewer: Option<ViewerAccount>,
    pub asset: Asset,
    pub requested_resolution: ResolutionTier,
}

impl WatchRequest {
    pub fn anonymous(
        asset: Asset,
        requested_resolution: ResolutionTier,
    ) -> Self {
        Self {
            viewer: None,
            asset,
            requested_resolution,
        }
    }

    pub fn for_viewer(
        viewer: ViewerAccount,
        asset: Asset,
        requested_resolution: ResolutionTier,
    ) -> Self {
        Self {
            viewer: Some(viewer),
            asset,
            requested_resolution,
        }
    }
}
