//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::pricing::CartTotals;
use crate::domain::value_objects::{Quantity, SessionId};

/// Who a cart belongs to: an anonymous browser session or a signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    Session(SessionId),
    User(Uuid),
}

impl CartOwner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self { Self::User(id) => Some(*id), Self::Session(_) => None }
    }
    pub fn session_id(&self) -> Option<&SessionId> {
        match self { Self::Session(id) => Some(id), Self::User(_) => None }
    }
}

impl std::fmt::Display for CartOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::Session(id) => write!(f, "session:{id}"), Self::User(id) => write!(f, "user:{id}") }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    id: Uuid,
    owner: CartOwner,
    items: Vec<CartItem>,
    coupon_code: Option<String>,
    totals: CartTotals,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(owner: CartOwner) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), owner, items: vec![], coupon_code: None, totals: CartTotals::default(), created_at: now, updated_at: now }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn owner(&self) -> &CartOwner { &self.owner }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn coupon_code(&self) -> Option<&str> { self.coupon_code.as_deref() }
    pub fn totals(&self) -> &CartTotals { &self.totals }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn item(&self, item_id: Uuid) -> Option<&CartItem> { self.items.iter().find(|i| i.id == item_id) }
    pub fn item_for_product(&self, product_id: Uuid) -> Option<&CartItem> { self.items.iter().find(|i| i.product_id == product_id) }

    /// Adds `quantity` units, merging with an existing line for the product.
    /// The merged quantity must fit in `available` stock.
    pub fn add_item(&mut self, product_id: Uuid, quantity: u32, available: Quantity) -> Result<&CartItem, CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        let existing = self.items.iter().position(|i| i.product_id == product_id);
        let total = existing.map_or(quantity, |idx| self.items[idx].quantity.saturating_add(quantity));
        if !available.covers(total) {
            return Err(CartError::InsufficientStock { product_id, requested: total, available: available.value() });
        }
        let idx = match existing {
            Some(idx) => { self.items[idx].quantity = total; idx }
            None => {
                self.items.push(CartItem { id: Uuid::now_v7(), product_id, quantity, added_at: Utc::now() });
                self.items.len() - 1
            }
        };
        self.touch();
        Ok(&self.items[idx])
    }

    /// Sets a line's quantity; zero or less removes the line.
    pub fn update_quantity(&mut self, item_id: Uuid, quantity: i64, available: Quantity) -> Result<(), CartError> {
        let idx = self.items.iter().position(|i| i.id == item_id).ok_or(CartError::ItemNotFound(item_id))?;
        if quantity <= 0 {
            self.items.remove(idx);
        } else {
            let requested = u32::try_from(quantity).unwrap_or(u32::MAX);
            if !available.covers(requested) {
                return Err(CartError::InsufficientStock { product_id: self.items[idx].product_id, requested, available: available.value() });
            }
            self.items[idx].quantity = requested;
        }
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: Uuid) -> Result<CartItem, CartError> {
        let idx = self.items.iter().position(|i| i.id == item_id).ok_or(CartError::ItemNotFound(item_id))?;
        let removed = self.items.remove(idx);
        self.touch();
        Ok(removed)
    }

    /// Empties the cart; an applied coupon stays attached.
    pub fn clear(&mut self) { self.items.clear(); self.touch(); }

    /// Merges one line from another cart. Returns `false` when the merged
    /// quantity would exceed stock, in which case the cart is unchanged.
    pub fn merge_item(&mut self, product_id: Uuid, quantity: u32, available: Quantity) -> bool {
        quantity > 0 && self.add_item(product_id, quantity, available).is_ok()
    }

    /// Removes and returns the lines with the given ids.
    pub fn take_items(&mut self, item_ids: &[Uuid]) -> Vec<CartItem> {
        let (taken, kept) = std::mem::take(&mut self.items).into_iter().partition(|i| item_ids.contains(&i.id));
        self.items = kept;
        self.touch();
        taken
    }

    pub fn apply_coupon(&mut self, code: impl Into<String>) { self.coupon_code = Some(code.into()); self.touch(); }
    pub fn remove_coupon(&mut self) { self.coupon_code = None; self.touch(); }

    pub fn set_totals(&mut self, totals: CartTotals) { self.totals = totals; }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Invalid product ID or quantity")]
    InvalidQuantity,
    #[error("Cart Item not Found: {0}")]
    ItemNotFound(Uuid),
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: Uuid, requested: u32, available: u32 },
}
