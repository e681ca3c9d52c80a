//! User, follow graph and address book

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: Uuid,
    email: String,
    display_name: String,
    bio: Option<String>,
    company_id: Option<Uuid>,
    privacy: PrivacySettings,
    deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacySettings {
    pub profile_public: bool,
    pub show_followers: bool,
    pub show_following: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self { Self { profile_public: true, show_followers: true, show_following: true } }
}

impl User {
    pub fn register(email: &str, display_name: impl Into<String>, company_id: Option<Uuid>) -> Result<Self, UserError> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') { return Err(UserError::InvalidEmail(email)); }
        let display_name = display_name.into();
        if display_name.trim().is_empty() { return Err(UserError::MissingDisplayName); }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), email, display_name, bio: None, company_id, privacy: PrivacySettings::default(),
            deleted: false, created_at: now, updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn email(&self) -> &str { &self.email }
    pub fn display_name(&self) -> &str { &self.display_name }
    pub fn bio(&self) -> Option<&str> { self.bio.as_deref() }
    pub fn company_id(&self) -> Option<Uuid> { self.company_id }
    pub fn privacy(&self) -> PrivacySettings { self.privacy }
    pub fn is_deleted(&self) -> bool { self.deleted }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn update_profile(&mut self, display_name: impl Into<String>, bio: Option<String>) -> Result<(), UserError> {
        let display_name = display_name.into();
        if display_name.trim().is_empty() { return Err(UserError::MissingDisplayName); }
        self.display_name = display_name;
        self.bio = bio.filter(|b| !b.trim().is_empty());
        self.touch();
        Ok(())
    }

    pub fn update_privacy(&mut self, privacy: PrivacySettings) { self.privacy = privacy; self.touch(); }

    pub fn soft_delete(&mut self) { self.deleted = true; self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Directed edge of the follow graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Follow {
    pub fn new(follower_id: Uuid, followed_id: Uuid) -> Result<Self, UserError> {
        if follower_id == followed_id { return Err(UserError::SelfFollow); }
        Ok(Self { follower_id, followed_id, created_at: Utc::now() })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressType { Shipping, Billing }

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Shipping => "SHIPPING", Self::Billing => "BILLING" }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SHIPPING" => Some(Self::Shipping),
            "BILLING" => Some(Self::Billing),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address_type: AddressType,
    pub recipient: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressDetails {
    pub address_type: AddressType,
    pub recipient: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

impl Address {
    pub fn new(user_id: Uuid, details: AddressDetails, is_default: bool) -> Self {
        let mut address = Self {
            id: Uuid::now_v7(), user_id, address_type: details.address_type, recipient: String::new(),
            line1: String::new(), line2: None, city: String::new(), postal_code: String::new(),
            country: String::new(), phone: None, is_default, created_at: Utc::now(),
        };
        address.update(details);
        address
    }

    pub fn update(&mut self, details: AddressDetails) {
        self.address_type = details.address_type;
        self.recipient = details.recipient;
        self.line1 = details.line1;
        self.line2 = details.line2;
        self.city = details.city;
        self.postal_code = details.postal_code;
        self.country = details.country.to_uppercase();
        self.phone = details.phone;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserError {
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("display name must not be empty")]
    MissingDisplayName,
    #[error("Users cannot follow themselves")]
    SelfFollow,
    #[error("User already follows this user")]
    AlreadyFollowing,
    #[error("User does not follow this user")]
    NotFollowing,
}
