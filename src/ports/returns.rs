use uuid::Uuid;

use crate::domain::aggregates::ReturnRequest;

use super::Error;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ReturnRepository: Send + Sync {
    async fn find_return(&self, id: Uuid) -> Result<Option<ReturnRequest>, Error>;
    async fn list_returns_by_order(&self, order_id: Uuid) -> Result<Vec<ReturnRequest>, Error>;
    async fn save_return(&self, request: &ReturnRequest) -> Result<(), Error>;
}
