//! Audit-trail persistence port.

use async_trait::async_trait;

use voxcart_core::error::VoxcartError;
use voxcart_core::types::{ActionId, ActionRecord, ActionStatus, NewAction};
use voxcart_storage::ActionRepository;

/// Append/update-only store for agent audit actions.
#[async_trait]
pub trait ActionStore: Send + Sync {
    async fn create(&self, action: NewAction) -> Result<ActionId, VoxcartError>;

    async fn update_status(
        &self,
        id: ActionId,
        status: ActionStatus,
        detail: Option<String>,
    ) -> Result<(), VoxcartError>;

    async fn get_by_id(&self, id: ActionId) -> Result<Option<ActionRecord>, VoxcartError>;
}

#[async_trait]
impl ActionStore for ActionRepository {
    async fn create(&self, action: NewAction) -> Result<ActionId, VoxcartError> {
        ActionRepository::create(self, &action)
    }

    async fn update_status(
        &self,
        id: ActionId,
        status: ActionStatus,
        detail: Option<String>,
    ) -> Result<(), VoxcartError> {
        ActionRepository::update_status(self, id, status, detail.as_deref())
    }

    async fn get_by_id(&self, id: ActionId) -> Result<Option<ActionRecord>, VoxcartError> {
        ActionRepository::get_by_id(self, id)
    }
}
