use chrono::{DateTime, Utc};

use crate::domain::aggregates::{Cart, CartOwner};

use super::Error;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CartRepository: Send + Sync {
    async fn find_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, Error>;
    async fn save_cart(&self, cart: &Cart) -> Result<(), Error>;
    async fn delete_cart(&self, owner: &CartOwner) -> Result<(), Error>;
    /// Removes session carts last modified before `cutoff`, returning how many went.
    async fn delete_stale_session_carts(&self, cutoff: DateTime<Utc>) -> Result<u64, Error>;
}
