//! PostgreSQL store.
//!
//! Catalog tables are relational. The remaining aggregates are kept as JSONB
//! documents next to the columns they are looked up by.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::aggregates::{
    Address, Cart, CartOwner, Category, Coupon, Follow, Order, OrderShipping, Payment, Product, ProductDetails,
    ProductStatus, ReturnRequest, User,
};
use crate::domain::value_objects::{PageRequest, Paginated, Sku};
use crate::ports::{
    AddressRepository, CartRepository, CategoryRepository, CouponRepository, Error, FavoriteRepository,
    OrderRepository, PaymentRepository, ProductQuery, ProductRepository, ReturnRepository, ShippingRepository,
    UserRepository,
};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self { Self::Adapter(Box::new(err)) }
}

/// Maps a unique-constraint violation to [`Error::Duplicate`].
fn unique_violation(entity: &'static str, key: String) -> impl FnOnce(sqlx::Error) -> Error {
    move |err| match err.as_database_error().and_then(|d| d.code()) {
        Some(code) if code == "23505" => Error::Duplicate { entity, key },
        _ => err.into(),
    }
}

fn owner_key(owner: &CartOwner) -> (&'static str, String) {
    match owner {
        CartOwner::Session(id) => ("session", id.to_string()),
        CartOwner::User(id) => ("user", id.to_string()),
    }
}

/// Stock columns are `INTEGER`.
fn stock_param(field: &'static str, value: u32) -> Result<i32, Error> {
    i32::try_from(value).map_err(|_| Error::OutOfRange { field, value: u64::from(value) })
}

const PAGE_CLAUSE: &str = "LIMIT $2 OFFSET $3";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    description: Option<String>,
    price: Decimal,
    offer_price: Option<Decimal>,
    shipping_cost: Option<Decimal>,
    each_additional_item_shipping_cost: Option<Decimal>,
    stock: i32,
    category_id: Option<Uuid>,
    author_id: Uuid,
    company_id: Option<Uuid>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = Error;

    fn try_from(row: ProductRow) -> Result<Self, Error> {
        let sku = Sku::new(row.sku).map_err(|e| Error::Adapter(Box::new(e)))?;
        let details = ProductDetails {
            name: row.name, description: row.description, price: row.price, offer_price: row.offer_price,
            shipping_cost: row.shipping_cost, each_additional_item_shipping_cost: row.each_additional_item_shipping_cost,
            category_id: row.category_id,
        };
        Ok(Product::restore(
            row.id, sku, details, u32::try_from(row.stock).unwrap_or(0), row.author_id, row.company_id,
            ProductStatus::parse(&row.status).unwrap_or_default(), row.created_at, row.updated_at,
        ))
    }
}

#[async_trait::async_trait]
impl ProductRepository for PgStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, Error> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Product::try_from).transpose()
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Paginated<Product>, Error> {
        let filter = "WHERE ($1::text IS NULL OR status = $1) AND ($2::uuid IS NULL OR category_id = $2) \
                      AND ($3::text IS NULL OR name ILIKE $3 OR description ILIKE $3) \
                      AND ($4::uuid IS NULL OR author_id = $4)";
        let status = query.status.map(|s| s.as_str());
        let pattern = query.search.as_ref().map(|s| format!("%{}%", s.trim()));
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT * FROM products {filter} ORDER BY created_at DESC LIMIT $5 OFFSET $6"))
            .bind(status)
            .bind(query.category_id)
            .bind(&pattern)
            .bind(query.author_id)
            .bind(query.page.limit() as i64)
            .bind(query.page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;
        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products {filter}"))
            .bind(status)
            .bind(query.category_id)
            .bind(&pattern)
            .bind(query.author_id)
            .fetch_one(&self.pool)
            .await?;
        let products = rows.into_iter().map(Product::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Paginated::new(products, total.0, query.page))
    }

    async fn save_product(&self, p: &Product) -> Result<(), Error> {
        let stock = stock_param("stock", p.stock().value())?;
        sqlx::query(
            "INSERT INTO products (id, sku, name, description, price, offer_price, shipping_cost, \
             each_additional_item_shipping_cost, stock, category_id, author_id, company_id, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             ON CONFLICT (id) DO UPDATE SET name = $3, description = $4, price = $5, offer_price = $6, \
             shipping_cost = $7, each_additional_item_shipping_cost = $8, category_id = $10, \
             status = $13, updated_at = $15",
        )
        .bind(p.id())
        .bind(p.sku().as_str())
        .bind(p.name())
        .bind(p.description())
        .bind(p.price())
        .bind(p.offer_price())
        .bind(p.shipping_cost())
        .bind(p.each_additional_item_shipping_cost())
        .bind(stock)
        .bind(p.category_id())
        .bind(p.author_id())
        .bind(p.company_id())
        .bind(p.status().as_str())
        .bind(p.created_at())
        .bind(p.updated_at())
        .execute(&self.pool)
        .await
        .map_err(unique_violation("product sku", p.sku().to_string()))?;
        Ok(())
    }

    async fn reserve_stock(&self, product_id: Uuid, quantity: u32) -> Result<bool, Error> {
        let quantity = stock_param("quantity", quantity)?;
        let res = sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2")
            .bind(product_id)
            .bind(quantity)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn release_stock(&self, product_id: Uuid, quantity: u32) -> Result<(), Error> {
        let quantity = stock_param("quantity", quantity)?;
        sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
            .bind(product_id)
            .bind(quantity)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
    parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Category { id: r.id, name: r.name, slug: r.slug, description: r.description, parent_id: r.parent_id, created_at: r.created_at }
    }
}

#[async_trait::async_trait]
impl CategoryRepository for PgStore {
    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, Error> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Category::from))
    }

    async fn list_categories(&self) -> Result<Vec<Category>, Error> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn save_category(&self, c: &Category) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO categories (id, name, slug, description, parent_id, created_at) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET name = $2, slug = $3, description = $4, parent_id = $5",
        )
        .bind(c.id)
        .bind(&c.name)
        .bind(&c.slug)
        .bind(&c.description)
        .bind(c.parent_id)
        .bind(c.created_at)
        .execute(&self.pool)
        .await
        .map_err(unique_violation("category slug", c.slug.clone()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CartRepository for PgStore {
    async fn find_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, Error> {
        let (kind, key) = owner_key(owner);
        let row: Option<(Json<Cart>,)> = sqlx::query_as("SELECT doc FROM carts WHERE owner_kind = $1 AND owner_key = $2")
            .bind(kind)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(doc,)| doc.0))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), Error> {
        let (kind, key) = owner_key(cart.owner());
        sqlx::query(
            "INSERT INTO carts (id, owner_kind, owner_key, doc, updated_at) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (owner_kind, owner_key) DO UPDATE SET doc = $4, updated_at = $5",
        )
        .bind(cart.id())
        .bind(kind)
        .bind(key)
        .bind(Json(cart))
        .bind(cart.updated_at())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_cart(&self, owner: &CartOwner) -> Result<(), Error> {
        let (kind, key) = owner_key(owner);
        sqlx::query("DELETE FROM carts WHERE owner_kind = $1 AND owner_key = $2")
            .bind(kind)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_stale_session_carts(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let res = sqlx::query("DELETE FROM carts WHERE owner_kind = 'session' AND updated_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}

#[async_trait::async_trait]
impl CouponRepository for PgStore {
    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, Error> {
        let row: Option<(Json<Coupon>, i64)> = sqlx::query_as("SELECT doc, version FROM coupons WHERE code = $1")
            .bind(code.to_uppercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(doc, version)| {
            let mut coupon = doc.0;
            coupon.set_version(version);
            coupon
        }))
    }

    async fn list_coupons_by_author(&self, author_id: Uuid) -> Result<Vec<Coupon>, Error> {
        let rows: Vec<(Json<Coupon>, i64)> = sqlx::query_as("SELECT doc, version FROM coupons WHERE author_id = $1 ORDER BY code")
            .bind(author_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(doc, version)| {
                let mut coupon = doc.0;
                coupon.set_version(version);
                coupon
            })
            .collect())
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> Result<(), Error> {
        sqlx::query("INSERT INTO coupons (code, author_id, version, doc) VALUES ($1, $2, $3, $4)")
            .bind(coupon.code())
            .bind(coupon.author_id())
            .bind(coupon.version())
            .bind(Json(coupon))
            .execute(&self.pool)
            .await
            .map_err(unique_violation("coupon", coupon.code().to_string()))?;
        Ok(())
    }

    async fn update_coupon(&self, coupon: &Coupon) -> Result<Coupon, Error> {
        let mut updated = coupon.clone();
        updated.set_version(coupon.version() + 1);
        let res = sqlx::query("UPDATE coupons SET doc = $2, version = $3 WHERE code = $1 AND version = $4")
            .bind(coupon.code())
            .bind(Json(&updated))
            .bind(updated.version())
            .bind(coupon.version())
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::Conflict { entity: "coupon", key: coupon.code().to_string() });
        }
        Ok(updated)
    }
}

#[async_trait::async_trait]
impl OrderRepository for PgStore {
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, Error> {
        let row: Option<(Json<Order>,)> = sqlx::query_as("SELECT doc FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(doc,)| doc.0))
    }

    async fn list_orders_by_buyer(&self, buyer_id: Uuid, page: PageRequest) -> Result<Paginated<Order>, Error> {
        let rows: Vec<(Json<Order>,)> = sqlx::query_as(&format!("SELECT doc FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC {PAGE_CLAUSE}"))
            .bind(buyer_id)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE buyer_id = $1")
            .bind(buyer_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Paginated::new(rows.into_iter().map(|(doc,)| doc.0).collect(), total.0, page))
    }

    async fn list_orders(&self, page: PageRequest) -> Result<Paginated<Order>, Error> {
        let rows: Vec<(Json<Order>,)> = sqlx::query_as("SELECT doc FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders").fetch_one(&self.pool).await?;
        Ok(Paginated::new(rows.into_iter().map(|(doc,)| doc.0).collect(), total.0, page))
    }

    async fn save_order(&self, order: &Order) -> Result<(), Error> {
        sqlx::query("INSERT INTO orders (id, buyer_id, created_at, doc) VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO UPDATE SET doc = $4")
            .bind(order.id())
            .bind(order.buyer_id())
            .bind(order.created_at())
            .bind(Json(order))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReturnRepository for PgStore {
    async fn find_return(&self, id: Uuid) -> Result<Option<ReturnRequest>, Error> {
        let row: Option<(Json<ReturnRequest>,)> = sqlx::query_as("SELECT doc FROM return_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(doc,)| doc.0))
    }

    async fn list_returns_by_order(&self, order_id: Uuid) -> Result<Vec<ReturnRequest>, Error> {
        let rows: Vec<(Json<ReturnRequest>,)> = sqlx::query_as("SELECT doc FROM return_requests WHERE order_id = $1 ORDER BY requested_at")
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(doc,)| doc.0).collect())
    }

    async fn save_return(&self, request: &ReturnRequest) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO return_requests (id, order_id, requested_at, doc) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET doc = $4",
        )
        .bind(request.id())
        .bind(request.order_id())
        .bind(request.requested_at())
        .bind(Json(request))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PaymentRepository for PgStore {
    async fn find_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>, Error> {
        let row: Option<(Json<Payment>,)> = sqlx::query_as("SELECT doc FROM payments WHERE transaction_id = $1")
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(doc,)| doc.0))
    }

    async fn list_payments_by_order(&self, order_id: Uuid) -> Result<Vec<Payment>, Error> {
        let rows: Vec<(Json<Payment>,)> = sqlx::query_as("SELECT doc FROM payments WHERE order_id = $1 ORDER BY id")
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(doc,)| doc.0).collect())
    }

    async fn save_payment(&self, payment: &Payment) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO payments (id, order_id, transaction_id, doc) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET doc = $4",
        )
        .bind(payment.id())
        .bind(payment.order_id())
        .bind(payment.transaction_id())
        .bind(Json(payment))
        .execute(&self.pool)
        .await
        .map_err(unique_violation("payment transaction", payment.transaction_id().to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserRepository for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, Error> {
        let row: Option<(Json<User>,)> = sqlx::query_as("SELECT doc FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(doc,)| doc.0))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let row: Option<(Json<User>,)> = sqlx::query_as("SELECT doc FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(doc,)| doc.0))
    }

    async fn save_user(&self, user: &User) -> Result<(), Error> {
        sqlx::query("INSERT INTO users (id, email, doc) VALUES ($1, $2, $3) ON CONFLICT (id) DO UPDATE SET email = $2, doc = $3")
            .bind(user.id())
            .bind(user.email())
            .bind(Json(user))
            .execute(&self.pool)
            .await
            .map_err(unique_violation("user email", user.email().to_string()))?;
        Ok(())
    }

    async fn follow_exists(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool, Error> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)")
            .bind(follower_id)
            .bind(followed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn insert_follow(&self, follow: &Follow) -> Result<(), Error> {
        sqlx::query("INSERT INTO follows (follower_id, followed_id, created_at) VALUES ($1, $2, $3)")
            .bind(follow.follower_id)
            .bind(follow.followed_id)
            .bind(follow.created_at)
            .execute(&self.pool)
            .await
            .map_err(unique_violation("follow", format!("{}->{}", follow.follower_id, follow.followed_id)))?;
        Ok(())
    }

    async fn delete_follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool, Error> {
        let res = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2")
            .bind(follower_id)
            .bind(followed_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_followers(&self, user_id: Uuid) -> Result<i64, Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM follows WHERE followed_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn count_following(&self, user_id: Uuid) -> Result<i64, Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn list_followers(&self, user_id: Uuid, page: PageRequest) -> Result<Paginated<Uuid>, Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(&format!("SELECT follower_id FROM follows WHERE followed_id = $1 ORDER BY created_at DESC {PAGE_CLAUSE}"))
            .bind(user_id)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;
        let total = self.count_followers(user_id).await?;
        Ok(Paginated::new(rows.into_iter().map(|r| r.0).collect(), total, page))
    }

    async fn list_following(&self, user_id: Uuid, page: PageRequest) -> Result<Paginated<Uuid>, Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(&format!("SELECT followed_id FROM follows WHERE follower_id = $1 ORDER BY created_at DESC {PAGE_CLAUSE}"))
            .bind(user_id)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;
        let total = self.count_following(user_id).await?;
        Ok(Paginated::new(rows.into_iter().map(|r| r.0).collect(), total, page))
    }
}

#[async_trait::async_trait]
impl AddressRepository for PgStore {
    async fn find_address(&self, id: Uuid) -> Result<Option<Address>, Error> {
        let row: Option<(Json<Address>,)> = sqlx::query_as("SELECT doc FROM addresses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(doc,)| doc.0))
    }

    async fn list_addresses(&self, user_id: Uuid) -> Result<Vec<Address>, Error> {
        let rows: Vec<(Json<Address>,)> = sqlx::query_as("SELECT doc FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(doc,)| doc.0).collect())
    }

    async fn save_address(&self, a: &Address) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        if a.is_default {
            sqlx::query(
                "UPDATE addresses SET is_default = FALSE, doc = jsonb_set(doc, '{is_default}', 'false') \
                 WHERE user_id = $1 AND address_type = $2 AND id <> $3 AND is_default",
            )
            .bind(a.user_id)
            .bind(a.address_type.as_str())
            .bind(a.id)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(
            "INSERT INTO addresses (id, user_id, address_type, is_default, created_at, doc) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET address_type = $3, is_default = $4, doc = $6",
        )
        .bind(a.id)
        .bind(a.user_id)
        .bind(a.address_type.as_str())
        .bind(a.is_default)
        .bind(a.created_at)
        .bind(Json(a))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_address(&self, id: Uuid) -> Result<(), Error> {
        sqlx::query("DELETE FROM addresses WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl FavoriteRepository for PgStore {
    async fn add_favorite(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, Error> {
        let res = sqlx::query("INSERT INTO favorites (user_id, product_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn remove_favorite(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, Error> {
        let res = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_favorites(&self, user_id: Uuid, page: PageRequest) -> Result<Paginated<Uuid>, Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(&format!("SELECT product_id FROM favorites WHERE user_id = $1 ORDER BY created_at DESC {PAGE_CLAUSE}"))
            .bind(user_id)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM favorites WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Paginated::new(rows.into_iter().map(|r| r.0).collect(), total.0, page))
    }
}

#[async_trait::async_trait]
impl ShippingRepository for PgStore {
    async fn find_shipping(&self, order_id: Uuid) -> Result<Option<OrderShipping>, Error> {
        let row: Option<(Json<OrderShipping>,)> = sqlx::query_as("SELECT doc FROM order_shipping WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(doc,)| doc.0))
    }

    async fn insert_shipping(&self, shipping: &OrderShipping) -> Result<(), Error> {
        sqlx::query("INSERT INTO order_shipping (order_id, buyer_id, doc, updated_at) VALUES ($1, $2, $3, $4)")
            .bind(shipping.order_id())
            .bind(shipping.buyer_id())
            .bind(Json(shipping))
            .bind(shipping.updated_at())
            .execute(&self.pool)
            .await
            .map_err(unique_violation("order shipping", shipping.order_id().to_string()))?;
        Ok(())
    }

    async fn update_shipping(&self, shipping: &OrderShipping) -> Result<(), Error> {
        sqlx::query("UPDATE order_shipping SET doc = $2, updated_at = $3 WHERE order_id = $1")
            .bind(shipping.order_id())
            .bind(Json(shipping))
            .bind(shipping.updated_at())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::coupon::fixtures::{new_coupon, percent};
    use crate::domain::aggregates::order::fixtures::{order_in, order_item};
    use crate::domain::aggregates::product::fixtures::active_product;
    use crate::domain::aggregates::shipping::fixtures::details;
    use crate::domain::aggregates::{AddressDetails, AddressType, OrderStatus};
    use rstest::rstest;
    use speculoos::prelude::*;

    /// Runs against `DATABASE_URL` when it is set; otherwise the test passes vacuously.
    async fn store() -> Option<PgStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let store = PgStore::connect(&url, 2).await.unwrap();
        store.migrate().await.unwrap();
        Some(store)
    }

    fn unique_code() -> String {
        format!("PG{}", &Uuid::new_v4().simple().to_string()[..10]).to_uppercase()
    }

    #[rstest]
    #[case(0, Some(0))]
    #[case(2_147_483_647, Some(i32::MAX))]
    #[case(2_147_483_648, None)]
    #[case(u32::MAX, None)]
    fn test_stock_param_bounds(#[case] value: u32, #[case] expected: Option<i32>) {
        match (stock_param("stock", value), expected) {
            (Ok(v), Some(e)) => assert_eq!(v, e),
            (Err(Error::OutOfRange { field, value: got }), None) => {
                assert_eq!(field, "stock");
                assert_eq!(got, u64::from(value));
            }
            (other, _) => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_saving_stale_product_keeps_stock() {
        let Some(store) = store().await else { return };
        let mut stale = active_product(Uuid::new_v4(), Decimal::from(10), 5);
        store.save_product(&stale).await.unwrap();
        assert!(store.reserve_stock(stale.id(), 2).await.unwrap());
        assert!(!store.reserve_stock(stale.id(), 4).await.unwrap());

        stale.archive();
        store.save_product(&stale).await.unwrap();
        let stored = store.find_product(stale.id()).await.unwrap().unwrap();
        assert_eq!(stored.stock().value(), 3);
        assert_eq!(stored.status(), ProductStatus::Archived);

        store.release_stock(stale.id(), 2).await.unwrap();
        assert_eq!(store.find_product(stale.id()).await.unwrap().unwrap().stock().value(), 5);
    }

    #[tokio::test]
    async fn test_oversized_quantities_are_rejected() {
        let Some(store) = store().await else { return };
        let product = active_product(Uuid::new_v4(), Decimal::from(10), 5);
        store.save_product(&product).await.unwrap();

        let res = store.reserve_stock(product.id(), u32::MAX).await;
        assert_that!(res).is_err().matches(|e| matches!(e, Error::OutOfRange { field: "quantity", .. }));
        let res = store.release_stock(product.id(), u32::MAX).await;
        assert_that!(res).is_err().matches(|e| matches!(e, Error::OutOfRange { .. }));
        assert_eq!(store.find_product(product.id()).await.unwrap().unwrap().stock().value(), 5);

        let huge = active_product(Uuid::new_v4(), Decimal::from(10), u32::MAX);
        let res = store.save_product(&huge).await;
        assert_that!(res).is_err().matches(|e| matches!(e, Error::OutOfRange { field: "stock", .. }));
        assert_that!(store.find_product(huge.id()).await.unwrap()).is_none();
    }

    #[tokio::test]
    async fn test_coupon_version_conflict() {
        let Some(store) = store().await else { return };
        let coupon = Coupon::create(new_coupon(&unique_code(), percent(10)), Uuid::new_v4(), None).unwrap();
        store.insert_coupon(&coupon).await.unwrap();
        let res = store.insert_coupon(&coupon).await;
        assert_that!(res).is_err().matches(|e| matches!(e, Error::Duplicate { .. }));

        let updated = store.update_coupon(&coupon).await.unwrap();
        assert_eq!(updated.version(), coupon.version() + 1);
        let res = store.update_coupon(&coupon).await;
        assert_that!(res).is_err().matches(|e| matches!(e, Error::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_shipping_is_inserted_once() {
        let Some(store) = store().await else { return };
        let order = order_in(Uuid::new_v4(), vec![order_item(10, 1)], OrderStatus::Paid);
        store.save_order(&order).await.unwrap();
        let mut shipping = OrderShipping::create(&order, details("DHL", None)).unwrap();
        store.insert_shipping(&shipping).await.unwrap();
        let res = store.insert_shipping(&shipping).await;
        assert_that!(res).is_err().matches(|e| matches!(e, Error::Duplicate { .. }));

        shipping.update_details(details("DHL", Some("AB123"))).unwrap();
        store.update_shipping(&shipping).await.unwrap();
        let stored = store.find_shipping(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.details().tracking_number.as_deref(), Some("AB123"));
    }

    #[tokio::test]
    async fn test_favorites_are_idempotent() {
        let Some(store) = store().await else { return };
        let user = Uuid::new_v4();
        let product = active_product(Uuid::new_v4(), Decimal::from(10), 1);
        store.save_product(&product).await.unwrap();

        assert!(store.add_favorite(user, product.id()).await.unwrap());
        assert!(!store.add_favorite(user, product.id()).await.unwrap());
        assert_eq!(store.list_favorites(user, PageRequest::new(None, None)).await.unwrap().data, vec![product.id()]);
        assert!(store.remove_favorite(user, product.id()).await.unwrap());
        assert!(!store.remove_favorite(user, product.id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_single_default_address_per_type() {
        let Some(store) = store().await else { return };
        let user_id = Uuid::new_v4();
        let details = |address_type| AddressDetails {
            address_type, recipient: "Ann".into(), line1: "1 Main St".into(), line2: None, city: "Lyon".into(),
            postal_code: "69001".into(), country: "fr".into(), phone: None,
        };
        let first = Address::new(user_id, details(AddressType::Shipping), true);
        let billing = Address::new(user_id, details(AddressType::Billing), true);
        let second = Address::new(user_id, details(AddressType::Shipping), true);
        for a in [&first, &billing, &second] {
            store.save_address(a).await.unwrap();
        }

        let listed = store.list_addresses(user_id).await.unwrap();
        let defaults: Vec<Uuid> = listed.iter().filter(|a| a.is_default).map(|a| a.id).collect();
        assert_eq!(defaults.len(), 2);
        assert!(defaults.contains(&second.id) && defaults.contains(&billing.id));
        let demoted = store.find_address(first.id).await.unwrap().unwrap();
        assert!(!demoted.is_default);
    }
}
