use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::aggregates::{Follow, PrivacySettings, User, UserError};
use crate::domain::value_objects::{PageRequest, Paginated};
use crate::ports::{self, UserRepository};
use crate::{EcommerceError, Result};

/// Public view of a user with follow counts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub followers: i64,
    pub following: i64,
    pub privacy: PrivacySettings,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub display_name: String,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self { Self { users } }

    pub async fn create_user(&self, email: &str, display_name: &str, company_id: Option<Uuid>) -> Result<User> {
        info!(%email, "creating user");
        let user = User::register(email, display_name, company_id)?;
        if self.users.find_user_by_email(user.email()).await?.is_some() {
            error!(email = %user.email(), "email already registered");
            return Err(EcommerceError::bad_request(format!("Email already registered: {}", user.email())));
        }
        match self.users.save_user(&user).await {
            Ok(()) => Ok(user),
            Err(ports::Error::Duplicate { .. }) => {
                Err(EcommerceError::bad_request(format!("Email already registered: {}", user.email())))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        info!(%user_id, "soft deleting user");
        let mut user = self.active_user(user_id).await?;
        user.soft_delete();
        self.users.save_user(&user).await?;
        Ok(())
    }

    /// Profile as seen by `viewer`; private profiles are only visible to their owner.
    pub async fn profile(&self, user_id: Uuid, viewer: Option<Uuid>) -> Result<Profile> {
        let user = self.active_user(user_id).await?;
        if !user.privacy().profile_public && viewer != Some(user_id) {
            return Err(EcommerceError::forbidden("This profile is private"));
        }
        self.to_profile(user).await
    }

    pub async fn update_profile(&self, user_id: Uuid, display_name: &str, bio: Option<String>) -> Result<Profile> {
        info!(%user_id, "updating profile");
        let mut user = self.active_user(user_id).await?;
        user.update_profile(display_name, bio)?;
        self.users.save_user(&user).await?;
        self.to_profile(user).await
    }

    pub async fn update_privacy(&self, user_id: Uuid, privacy: PrivacySettings) -> Result<Profile> {
        info!(%user_id, ?privacy, "updating privacy settings");
        let mut user = self.active_user(user_id).await?;
        user.update_privacy(privacy);
        self.users.save_user(&user).await?;
        self.to_profile(user).await
    }

    pub async fn follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<()> {
        info!(%follower_id, %followed_id, "follow");
        let follow = Follow::new(follower_id, followed_id)?;
        self.active_user(follower_id).await?;
        self.active_user(followed_id).await?;
        if self.users.follow_exists(follower_id, followed_id).await? {
            return Err(UserError::AlreadyFollowing.into());
        }
        match self.users.insert_follow(&follow).await {
            Ok(()) => Ok(()),
            Err(ports::Error::Duplicate { .. }) => Err(UserError::AlreadyFollowing.into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn unfollow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<()> {
        info!(%follower_id, %followed_id, "unfollow");
        if !self.users.delete_follow(follower_id, followed_id).await? {
            error!(%follower_id, %followed_id, "not following");
            return Err(UserError::NotFollowing.into());
        }
        Ok(())
    }

    pub async fn followers(&self, user_id: Uuid, viewer: Option<Uuid>, page: PageRequest) -> Result<Paginated<ProfileSummary>> {
        let user = self.active_user(user_id).await?;
        if !user.privacy().show_followers && viewer != Some(user_id) {
            return Err(EcommerceError::forbidden("Followers list is private"));
        }
        let ids = self.users.list_followers(user_id, page).await?;
        self.summaries(ids).await
    }

    pub async fn following(&self, user_id: Uuid, viewer: Option<Uuid>, page: PageRequest) -> Result<Paginated<ProfileSummary>> {
        let user = self.active_user(user_id).await?;
        if !user.privacy().show_following && viewer != Some(user_id) {
            return Err(EcommerceError::forbidden("Following list is private"));
        }
        let ids = self.users.list_following(user_id, page).await?;
        self.summaries(ids).await
    }

    async fn summaries(&self, ids: Paginated<Uuid>) -> Result<Paginated<ProfileSummary>> {
        let mut data = Vec::with_capacity(ids.data.len());
        for id in &ids.data {
            if let Some(user) = self.users.find_user(*id).await?.filter(|u| !u.is_deleted()) {
                data.push(ProfileSummary { id: user.id(), display_name: user.display_name().to_string() });
            }
        }
        Ok(Paginated { data, total: ids.total, page: ids.page, per_page: ids.per_page })
    }

    async fn to_profile(&self, user: User) -> Result<Profile> {
        Ok(Profile {
            id: user.id(),
            display_name: user.display_name().to_string(),
            bio: user.bio().map(str::to_string),
            followers: self.users.count_followers(user.id()).await?,
            following: self.users.count_following(user.id()).await?,
            privacy: user.privacy(),
        })
    }

    async fn active_user(&self, user_id: Uuid) -> Result<User> {
        self.users.find_user(user_id).await?.filter(|u| !u.is_deleted()).ok_or_else(|| {
            error!(%user_id, "user not found");
            EcommerceError::not_found(format!("User not found: {user_id}"))
        })
    }
}
