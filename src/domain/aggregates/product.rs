//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{Quantity, Sku};
use crate::domain::events::{DomainEvent, ProductEvent};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    id: Uuid,
    sku: Sku,
    name: String,
    description: Option<String>,
    price: Decimal,
    offer_price: Option<Decimal>,
    shipping_cost: Option<Decimal>,
    each_additional_item_shipping_cost: Option<Decimal>,
    stock: Quantity,
    category_id: Option<Uuid>,
    author_id: Uuid,
    company_id: Option<Uuid>,
    status: ProductStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus { #[default] Draft, Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "DRAFT", Self::Active => "ACTIVE", Self::Archived => "ARCHIVED" }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "DRAFT" => Some(Self::Draft),
            "ACTIVE" => Some(Self::Active),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Editable product fields, shared by creation and update.
#[derive(Clone, Debug)]
pub struct ProductDetails {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub offer_price: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub each_additional_item_shipping_cost: Option<Decimal>,
    pub category_id: Option<Uuid>,
}

impl Product {
    pub fn create(sku: Sku, author_id: Uuid, company_id: Option<Uuid>, details: ProductDetails, stock: u32) -> Result<Self, ProductError> {
        Self::check(&details)?;
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut product = Self {
            id, sku: sku.clone(), name: details.name, description: details.description,
            price: details.price, offer_price: details.offer_price, shipping_cost: details.shipping_cost,
            each_additional_item_shipping_cost: details.each_additional_item_shipping_cost,
            stock: Quantity::new(stock), category_id: details.category_id, author_id, company_id,
            status: ProductStatus::Draft, created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, sku }));
        Ok(product)
    }

    /// Rebuilds a product from stored columns.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid, sku: Sku, details: ProductDetails, stock: u32, author_id: Uuid, company_id: Option<Uuid>,
        status: ProductStatus, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id, sku, name: details.name, description: details.description, price: details.price,
            offer_price: details.offer_price, shipping_cost: details.shipping_cost,
            each_additional_item_shipping_cost: details.each_additional_item_shipping_cost,
            stock: Quantity::new(stock), category_id: details.category_id, author_id, company_id,
            status, created_at, updated_at, events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn price(&self) -> Decimal { self.price }
    pub fn offer_price(&self) -> Option<Decimal> { self.offer_price }
    pub fn shipping_cost(&self) -> Option<Decimal> { self.shipping_cost }
    pub fn each_additional_item_shipping_cost(&self) -> Option<Decimal> { self.each_additional_item_shipping_cost }
    pub fn stock(&self) -> Quantity { self.stock }
    pub fn category_id(&self) -> Option<Uuid> { self.category_id }
    pub fn author_id(&self) -> Uuid { self.author_id }
    pub fn company_id(&self) -> Option<Uuid> { self.company_id }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_in_stock(&self) -> bool { !self.stock.is_zero() }
    pub fn is_purchasable(&self) -> bool { self.status == ProductStatus::Active }

    /// Price a buyer pays per unit: the offer price when one is set.
    pub fn effective_price(&self) -> Decimal { self.offer_price.unwrap_or(self.price) }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() { return Err(ProductError::MissingName); }
        self.status = ProductStatus::Active;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Published { product_id: self.id }));
        Ok(())
    }

    pub fn archive(&mut self) {
        self.status = ProductStatus::Archived;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Archived { product_id: self.id }));
    }

    pub fn update_details(&mut self, details: ProductDetails) -> Result<(), ProductError> {
        Self::check(&details)?;
        self.name = details.name;
        self.description = details.description;
        self.price = details.price;
        self.offer_price = details.offer_price;
        self.shipping_cost = details.shipping_cost;
        self.each_additional_item_shipping_cost = details.each_additional_item_shipping_cost;
        self.category_id = details.category_id;
        self.touch();
        Ok(())
    }

    /// Overwrites stock without raising events; storage adapters use it to
    /// keep the stored count when persisting other fields.
    pub(crate) fn set_stock(&mut self, stock: Quantity) { self.stock = stock; }

    pub fn add_inventory(&mut self, qty: u32) {
        self.stock = self.stock.add(qty);
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::InventoryAdded { product_id: self.id, quantity: qty }));
    }

    pub fn remove_inventory(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock = self.stock.subtract(qty).ok_or(ProductError::InsufficientInventory)?;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::InventoryRemoved { product_id: self.id, quantity: qty }));
        Ok(())
    }

    fn check(details: &ProductDetails) -> Result<(), ProductError> {
        if details.name.trim().is_empty() { return Err(ProductError::MissingName); }
        if details.price.is_sign_negative() { return Err(ProductError::NegativePrice); }
        if let Some(offer) = details.offer_price {
            if offer.is_sign_negative() || offer > details.price { return Err(ProductError::InvalidOfferPrice); }
        }
        let negative_shipping = [details.shipping_cost, details.each_additional_item_shipping_cost]
            .into_iter()
            .flatten()
            .any(|cost| cost.is_sign_negative());
        if negative_shipping { return Err(ProductError::NegativeShippingCost); }
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("product name must not be empty")]
    MissingName,
    #[error("product price must not be negative")]
    NegativePrice,
    #[error("offer price must be between zero and the regular price")]
    InvalidOfferPrice,
    #[error("shipping costs must not be negative")]
    NegativeShippingCost,
    #[error("insufficient inventory")]
    InsufficientInventory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(name: impl Into<String>, description: Option<String>, parent_id: Option<Uuid>) -> Self {
        let name = name.into();
        Self { id: Uuid::now_v7(), slug: slugify(&name), name, description, parent_id, created_at: Utc::now() }
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.slug = slugify(&self.name);
    }
}

pub fn slugify(name: &str) -> String {
    name.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}
