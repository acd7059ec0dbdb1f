//! Composition errors

use daycycle_core::{AssetId, ConditionId, DayCycleError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComposeError {
    #[error("Unknown timeline asset: {0}")]
    UnknownAsset(AssetId),

    #[error("Invalid timeline asset {asset}: {reason}")]
    InvalidAsset { asset: AssetId, reason: String },

    #[error("No factory registered for condition {0}")]
    UnknownCondition(ConditionId),
}

impl From<ComposeError> for DayCycleError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::UnknownAsset(asset) => DayCycleError::UnknownAsset(asset),
            ComposeError::InvalidAsset { asset, reason } => {
                DayCycleError::InvalidAsset { asset, reason }
            }
            ComposeError::UnknownCondition(id) => DayCycleError::UnknownCondition(id),
        }
    }
}
