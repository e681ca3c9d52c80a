use uuid::Uuid;

use crate::domain::aggregates::Order;
use crate::domain::value_objects::{PageRequest, Paginated};

use super::Error;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, Error>;
    /// Newest first.
    async fn list_orders_by_buyer(&self, buyer_id: Uuid, page: PageRequest) -> Result<Paginated<Order>, Error>;
    async fn list_orders(&self, page: PageRequest) -> Result<Paginated<Order>, Error>;
    async fn save_order(&self, order: &Order) -> Result<(), Error>;
}
