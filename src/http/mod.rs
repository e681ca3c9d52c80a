//! HTTP surface: routing, extractors, error mapping and response views.

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::Services;

pub mod account;
pub mod admin;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod extract;
pub mod orders;
pub mod seller;
pub mod views;

pub use error::ApiError;
use extract::{Buyer, CartSession};

pub const SERVICE_NAME: &str = "ecommerce-backend";

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
}

impl AppState {
    pub fn new(services: Services) -> Self { Self { services: Arc::new(services) } }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": SERVICE_NAME})) }))
        .merge(public_routes())
        .nest("/buyer", buyer_routes())
        .nest("/seller", seller_routes())
        .nest("/admin", admin_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(catalog::list_products))
        .route("/api/products/:id", get(catalog::get_product))
        .route("/api/categories", get(catalog::list_categories))
        .route("/api/categories/:id", get(catalog::get_category))
        .route("/api/cart", get(cart::get::<CartSession>).delete(cart::clear::<CartSession>))
        .route("/api/cart/items", post(cart::add_item::<CartSession>))
        .route(
            "/api/cart/items/:item_id",
            put(cart::update_item::<CartSession>).delete(cart::remove_item::<CartSession>),
        )
        .route("/api/cart/coupon", post(cart::apply_coupon::<CartSession>).delete(cart::remove_coupon::<CartSession>))
        .route("/api/users/:id/profile", get(account::public_profile))
        .route("/api/users/:id/followers", get(account::followers))
        .route("/api/users/:id/following", get(account::following))
}

fn buyer_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart::get::<Buyer>).delete(cart::clear::<Buyer>))
        .route("/cart/items", post(cart::add_item::<Buyer>))
        .route("/cart/items/:item_id", put(cart::update_item::<Buyer>).delete(cart::remove_item::<Buyer>))
        .route("/cart/coupon", post(cart::apply_coupon::<Buyer>).delete(cart::remove_coupon::<Buyer>))
        .route("/cart/merge", post(cart::merge))
        .route("/orders", post(orders::checkout).get(orders::list))
        .route("/orders/:id", get(orders::get))
        .route("/orders/:id/cancel", post(orders::cancel))
        .route("/orders/:id/shipping", get(orders::shipping))
        .route("/orders/:id/returns", post(orders::request_return).get(orders::list_returns))
        .route("/payments", post(orders::pay))
        .route("/payments/finalize", post(orders::finalize_payment))
        .route("/profile", get(account::my_profile).put(account::update_profile))
        .route("/profile/privacy", put(account::update_privacy))
        .route("/follow/:user_id", post(account::follow).delete(account::unfollow))
        .route("/favorites", get(account::list_favorites))
        .route("/favorites/:product_id", post(account::add_favorite).delete(account::remove_favorite))
        .route("/addresses", get(account::list_addresses).post(account::add_address))
        .route("/addresses/default/:address_type", get(account::default_address))
        .route("/addresses/:id", put(account::update_address).delete(account::delete_address))
        .route("/addresses/:id/default", post(account::set_default_address))
}

fn seller_routes() -> Router<AppState> {
    Router::new()
        .route("/coupons", get(seller::list_coupons).post(seller::create_coupon))
        .route("/coupons/:code", delete(seller::deactivate_coupon))
        .route("/products", get(seller::list_products).post(seller::create_product))
        .route("/products/:id", put(seller::update_product).delete(seller::archive_product))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(admin::create_product))
        .route("/products/:id", put(admin::update_product).delete(admin::archive_product))
        .route("/products/:id/stock", post(admin::restock))
        .route("/categories", post(admin::create_category))
        .route("/categories/:id", put(admin::update_category))
        .route("/users", post(admin::create_user))
        .route("/users/:id", delete(admin::delete_user))
        .route("/orders", get(admin::list_orders))
        .route("/orders/:id/status", put(admin::update_order_status))
        .route("/orders/:id/shipping", post(admin::create_shipping).put(admin::update_shipping))
        .route("/orders/:id/shipping/tracking", post(admin::record_tracking))
        .route("/returns/:id/approve", post(admin::approve_return))
        .route("/returns/:id/reject", post(admin::reject_return))
        .route("/returns/:id/refund", post(admin::refund_return))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LogPublisher, MemoryStore, SandboxGateway};
    use crate::config::PricingConfig;
    use crate::domain::aggregates::order::fixtures::{order_in, order_item};
    use crate::domain::aggregates::product::fixtures::active_product;
    use crate::domain::aggregates::{OrderStatus, User};
    use crate::ports::{OrderRepository, ProductRepository, Repositories, UserRepository};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    struct TestApp {
        store: MemoryStore,
        app: Router,
    }

    impl TestApp {
        fn new() -> Self {
            let store = MemoryStore::new();
            let services = Services::new(
                Repositories::from_store(store.clone()),
                Arc::new(SandboxGateway::new()),
                Arc::new(LogPublisher),
                PricingConfig::default(),
            );
            Self { store, app: router(AppState::new(services)) }
        }

        async fn send(&self, req: Request<Body>) -> Response {
            self.app.clone().oneshot(req).await.unwrap()
        }
    }

    fn request(method: &str, uri: &str, headers: &[(&str, &str)], body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        match body {
            Some(v) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(v.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn decimal(v: &Value) -> Decimal { v.as_str().unwrap().parse().unwrap() }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let res = app.send(request("GET", "/health", &[], None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_anonymous_cart_issues_session() {
        let app = TestApp::new();
        let product = active_product(Uuid::new_v4(), Decimal::from(25), 4);
        app.store.save_product(&product).await.unwrap();

        let body = json!({"product_id": product.id(), "quantity": 2});
        let res = app.send(request("POST", "/api/cart/items", &[], Some(body))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let session = res.headers().get("x-cart-session").unwrap().to_str().unwrap().to_string();
        let cookie = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with(&format!("cart_session={session}")));
        let cart = json_body(res).await;
        assert_eq!(decimal(&cart["totals"]["subtotal"]), Decimal::from(50));

        let res = app.send(request("GET", "/api/cart", &[("x-cart-session", &session)], None)).await;
        assert!(res.headers().get("x-cart-session").is_none());
        assert_eq!(json_body(res).await["items"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_error_bodies() {
        let app = TestApp::new();
        let res = app.send(request("GET", "/api/cart", &[("x-cart-session", "abc")], None)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json_body(res).await;
        assert_eq!(body["message"], "Invalid session ID format");
        assert_eq!(body["error"], "Bad Request");
        assert!(body["timestamp"].is_string());

        let res = app.send(request("GET", &format!("/api/products/{}", Uuid::new_v4()), &[], None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let body = json!({"product_id": Uuid::new_v4(), "quantity": 0});
        let res = app.send(request("POST", "/api/cart/items", &[], Some(body))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app.send(request("GET", "/api/products/not-a-uuid", &[], None)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["status"], 400);
    }

    #[tokio::test]
    async fn test_role_guards() {
        let app = TestApp::new();
        let user = Uuid::new_v4().to_string();
        let res = app.send(request("GET", "/buyer/orders", &[], None)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let buyer = [("x-user-id", user.as_str()), ("x-user-roles", "BUYER")];
        let res = app.send(request("GET", "/seller/coupons", &buyer, None)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let res = app.send(request("GET", "/admin/orders", &buyer, None)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let admin = [("x-user-id", user.as_str()), ("x-user-roles", "ADMIN")];
        let res = app.send(request("GET", "/seller/coupons", &admin, None)).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_validation_failure_lists_fields() {
        let app = TestApp::new();
        let admin = Uuid::new_v4().to_string();
        let headers = [("x-user-id", admin.as_str()), ("x-user-roles", "ADMIN")];
        let body = json!({"email": "not-an-email", "display_name": ""});
        let res = app.send(request("POST", "/admin/users", &headers, Some(body))).await;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(res).await;
        assert_eq!(body["message"], "Validation failed");
        assert!(body["fieldErrors"]["email"].is_array());
        assert!(body["fieldErrors"]["display_name"].is_array());
    }

    #[tokio::test]
    async fn test_checkout_and_pay() {
        let app = TestApp::new();
        let buyer = User::register("ann@example.com", "Ann", None).unwrap();
        app.store.save_user(&buyer).await.unwrap();
        let product = active_product(Uuid::new_v4(), Decimal::from(50), 3);
        app.store.save_product(&product).await.unwrap();
        let id = buyer.id().to_string();
        let headers = [("x-user-id", id.as_str()), ("x-user-roles", "BUYER")];

        let body = json!({"product_id": product.id(), "quantity": 2});
        let res = app.send(request("POST", "/buyer/cart/items", &headers, Some(body))).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = app.send(request("POST", "/buyer/orders", &headers, None)).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let order = json_body(res).await;
        assert_eq!(decimal(&order["total"]), Decimal::from(120));
        let order_id = order["id"].as_str().unwrap().to_string();

        let wrong = json!({"order_id": order_id, "method": "STRIPE", "amount": "99"});
        let res = app.send(request("POST", "/buyer/payments", &headers, Some(wrong))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let pay = json!({"order_id": order_id, "method": "STRIPE", "amount": "120.00"});
        let res = app.send(request("POST", "/buyer/payments", &headers, Some(pay))).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(json_body(res).await["status"], "PENDING");

        let other = Uuid::new_v4().to_string();
        let res = app.send(request("GET", &format!("/buyer/orders/{order_id}"), &[("x-user-id", &other)], None)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_shipping_routes() {
        let app = TestApp::new();
        let buyer = Uuid::new_v4();
        let order = order_in(buyer, vec![order_item(10, 1)], OrderStatus::Paid);
        app.store.save_order(&order).await.unwrap();
        let admin = Uuid::new_v4().to_string();
        let admin = [("x-user-id", admin.as_str()), ("x-user-roles", "ADMIN")];
        let uri = format!("/admin/orders/{}/shipping", order.id());

        let bad = json!({"carrier": "DHL", "method": "express", "currency": "EURO", "price": "4.99"});
        let res = app.send(request("POST", &uri, &admin, Some(bad))).await;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json!({"carrier": "DHL", "method": "express", "currency": "eur", "price": "4.99", "tracking_number": "AB123"});
        let res = app.send(request("POST", &uri, &admin, Some(body.clone()))).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let res = app.send(request("POST", &uri, &admin, Some(body))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["message"], "Shipping details already exist for this order.");

        let tracking = json!({"carrier_status": "IN_TRANSIT"});
        let res = app.send(request("POST", &format!("{uri}/tracking"), &admin, Some(tracking))).await;
        assert_eq!(res.status(), StatusCode::OK);

        let id = buyer.to_string();
        let own = format!("/buyer/orders/{}/shipping", order.id());
        let res = app.send(request("GET", &own, &[("x-user-id", id.as_str())], None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["details"]["currency"], "EUR");
        assert_eq!(body["tracking"]["carrier_status"], "IN_TRANSIT");

        let other = Uuid::new_v4().to_string();
        let res = app.send(request("GET", &own, &[("x-user-id", other.as_str())], None)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_favorite_routes() {
        let app = TestApp::new();
        let product = active_product(Uuid::new_v4(), Decimal::from(25), 4);
        app.store.save_product(&product).await.unwrap();
        let id = Uuid::new_v4().to_string();
        let headers = [("x-user-id", id.as_str())];
        let uri = format!("/buyer/favorites/{}", product.id());

        let res = app.send(request("POST", &uri, &headers, None)).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let res = app.send(request("GET", "/buyer/favorites", &headers, None)).await;
        let body = json_body(res).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["id"], product.id().to_string());

        let res = app.send(request("DELETE", &uri, &headers, None)).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let res = app.send(request("DELETE", &uri, &headers, None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_seller_product_routes() {
        let app = TestApp::new();
        let seller = Uuid::new_v4().to_string();
        let seller = [("x-user-id", seller.as_str()), ("x-user-roles", "SELLER")];
        let rival = Uuid::new_v4().to_string();
        let rival = [("x-user-id", rival.as_str()), ("x-user-roles", "SELLER")];

        let body = json!({"name": "Lamp", "price": "30", "stock": 5, "author_id": Uuid::new_v4()});
        let res = app.send(request("POST", "/seller/products", &seller, Some(body))).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let product = json_body(res).await;
        assert_eq!(product["author_id"], seller[0].1);
        let uri = format!("/seller/products/{}", product["id"].as_str().unwrap());

        let res = app.send(request("GET", "/seller/products", &rival, None)).await;
        assert_eq!(json_body(res).await["total"], 0);
        let update = json!({"name": "Mine now", "price": "1"});
        let res = app.send(request("PUT", &uri, &rival, Some(update))).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let update = json!({"name": "Lamp", "price": "28", "status": "ACTIVE"});
        let res = app.send(request("PUT", &uri, &seller, Some(update))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = app.send(request("DELETE", &uri, &seller, None)).await;
        assert_eq!(json_body(res).await["status"], "ARCHIVED");
    }
}
