//! Public storefront: products and categories.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::error::ApiError;
use super::extract::{Path, Query};
use super::views::listing;
use super::AppState;
use crate::domain::aggregates::{Category, Product};
use crate::domain::value_objects::{PageRequest, Paginated};
use crate::ports::ProductQuery;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<Uuid>,
    pub search: Option<String>,
}

pub async fn list_products(
    State(s): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<Json<Paginated<Product>>, ApiError> {
    let query = ProductQuery {
        category_id: p.category,
        author_id: None,
        search: p.search.filter(|s| !s.trim().is_empty()),
        status: None,
        page: PageRequest::new(p.page, p.per_page),
    };
    Ok(Json(s.services.catalog.list_products(query).await?))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Product>, ApiError> {
    Ok(Json(s.services.catalog.get_product(id).await?))
}

pub async fn list_categories(State(s): State<AppState>) -> Result<Json<Paginated<Category>>, ApiError> {
    Ok(Json(listing(s.services.catalog.list_categories().await?)))
}

pub async fn get_category(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Category>, ApiError> {
    Ok(Json(s.services.catalog.get_category(id).await?))
}
