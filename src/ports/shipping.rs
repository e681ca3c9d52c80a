use uuid::Uuid;

use crate::domain::aggregates::OrderShipping;

use super::Error;

/// One shipping record per order.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ShippingRepository: Send + Sync {
    async fn find_shipping(&self, order_id: Uuid) -> Result<Option<OrderShipping>, Error>;
    /// Fails with [`Error::Duplicate`] when the order already has one.
    async fn insert_shipping(&self, shipping: &OrderShipping) -> Result<(), Error>;
    async fn update_shipping(&self, shipping: &OrderShipping) -> Result<(), Error>;
}
