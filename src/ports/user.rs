use uuid::Uuid;

use crate::domain::aggregates::{Address, Follow, User};
use crate::domain::value_objects::{PageRequest, Paginated};

use super::Error;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, Error>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error>;
    async fn save_user(&self, user: &User) -> Result<(), Error>;
    async fn follow_exists(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool, Error>;
    async fn insert_follow(&self, follow: &Follow) -> Result<(), Error>;
    /// Returns whether an edge was removed.
    async fn delete_follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool, Error>;
    async fn count_followers(&self, user_id: Uuid) -> Result<i64, Error>;
    async fn count_following(&self, user_id: Uuid) -> Result<i64, Error>;
    /// Ids of users following `user_id`, most recent first.
    async fn list_followers(&self, user_id: Uuid, page: PageRequest) -> Result<Paginated<Uuid>, Error>;
    /// Ids of users `user_id` follows, most recent first.
    async fn list_following(&self, user_id: Uuid, page: PageRequest) -> Result<Paginated<Uuid>, Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AddressRepository: Send + Sync {
    async fn find_address(&self, id: Uuid) -> Result<Option<Address>, Error>;
    /// Default addresses first, then by creation time.
    async fn list_addresses(&self, user_id: Uuid) -> Result<Vec<Address>, Error>;
    /// Saving a default address clears the default flag on the user's
    /// other addresses of the same type in the same write.
    async fn save_address(&self, address: &Address) -> Result<(), Error>;
    async fn delete_address(&self, id: Uuid) -> Result<(), Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FavoriteRepository: Send + Sync {
    /// Returns whether the product was newly added.
    async fn add_favorite(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, Error>;
    /// Returns whether a favorite was removed.
    async fn remove_favorite(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, Error>;
    /// Product ids, most recently added first.
    async fn list_favorites(&self, user_id: Uuid, page: PageRequest) -> Result<Paginated<Uuid>, Error>;
}
