#![allow(dead_code)]

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::{self, Body},
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::{json, Value};
use storefront_api::{
    auth::{issue_token, ROLE_ADMIN, ROLE_USER},
    config::AppConfig,
    db,
    entities::{product, Product, ProductModel},
    errors::ServiceError,
    events::{self, EventSender},
    services::{
        carts::CartService,
        orders::OrderService,
        payments::{IntentMetadata, PaymentGateway, PaymentIntent},
    },
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only";

/// A recorded `create_intent` call.
#[derive(Debug, Clone)]
pub struct CreateCall {
    pub amount_cents: i64,
    pub currency: String,
    pub order_id: Uuid,
    pub user_id: Uuid,
}

/// In-process stand-in for the external payment processor. Records every
/// intent creation and serves created intents back on retrieval.
pub struct ScriptedGateway {
    calls: Mutex<Vec<CreateCall>>,
    intents: Mutex<Vec<PaymentIntent>>,
    counter: AtomicUsize,
    pub fail_create: AtomicBool,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            intents: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
            fail_create: AtomicBool::new(false),
        }
    }

    pub fn create_calls(&self) -> Vec<CreateCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: IntentMetadata,
    ) -> Result<PaymentIntent, ServiceError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ServiceError::PaymentGateway(
                "intent creation refused by test gateway".to_string(),
            ));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let intent = PaymentIntent {
            id: format!("pi_test_{}", n),
            client_secret: Some(format!("pi_test_{}_secret", n)),
            status: "requires_payment_method".to_string(),
            amount: amount_cents,
            currency: currency.to_string(),
        };

        self.calls.lock().unwrap().push(CreateCall {
            amount_cents,
            currency: currency.to_string(),
            order_id: metadata.order_id,
            user_id: metadata.user_id,
        });
        self.intents.lock().unwrap().push(intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, ServiceError> {
        self.intents
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == intent_id)
            .cloned()
            .ok_or_else(|| ServiceError::PaymentGateway(format!("no such intent: {}", intent_id)))
    }
}

/// Helper harness spinning up the application against a throwaway SQLite
/// database and a scripted payment gateway.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    pub gateway: Arc<ScriptedGateway>,
    pub user_id: Uuid,
    user_token: String,
    admin_token: String,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: tempfile::TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("storefront_test.db");

        let cfg = AppConfig {
            database_url: format!("sqlite://{}?mode=rwc", db_path.display()),
            jwt_secret: TEST_JWT_SECRET.to_string(),
            host: "127.0.0.1".to_string(),
            port: 18_080,
            environment: "test".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: 1,
            db_min_connections: 1,
            db_connect_timeout_secs: 5,
            payment_gateway_secret_key: None,
            payment_gateway_url: "http://gateway.invalid".to_string(),
            currency: "usd".to_string(),
            cors_allowed_origins: None,
        };

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(ScriptedGateway::new());
        let carts = Arc::new(CartService::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
        ));
        let orders = Arc::new(OrderService::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            carts.clone(),
            gateway.clone(),
            cfg.currency.clone(),
        ));

        let state = Arc::new(AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            carts,
            orders,
        });

        let router = Router::new()
            .nest("/api", storefront_api::api_routes())
            .with_state(state.clone());

        let user_id = Uuid::new_v4();
        let user_token =
            issue_token(user_id, ROLE_USER, TEST_JWT_SECRET, 3600).expect("issue user token");
        let admin_token =
            issue_token(Uuid::new_v4(), ROLE_ADMIN, TEST_JWT_SECRET, 3600).expect("issue admin token");

        Self {
            router,
            state,
            gateway,
            user_id,
            user_token,
            admin_token,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    pub fn token(&self) -> &str {
        &self.user_token
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    /// Bearer token for a different user than the default one.
    pub fn token_for(&self, user_id: Uuid) -> String {
        issue_token(user_id, ROLE_USER, TEST_JWT_SECRET, 3600).expect("issue token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests as the default user.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Seed an active product with the given price and stock.
    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> ProductModel {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(format!("{} seeded for integration tests", name)),
            price: Set(price),
            original_price: Set(None),
            category: Set(product::ProductCategory::Sports),
            brand: Set(Some("Acme".to_string())),
            images: Set(json!([format!(
                "https://cdn.example.com/{}.jpg",
                name.to_lowercase().replace(' ', "-")
            )])),
            stock: Set(stock),
            sizes: Set(json!([])),
            colors: Set(json!([])),
            rating_average: Set(Decimal::ZERO),
            rating_count: Set(0),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product for tests")
    }

    /// Current stock of a product, read straight from the database.
    pub async fn product_stock(&self, product_id: Uuid) -> i32 {
        Product::find_by_id(product_id)
            .one(&*self.state.db)
            .await
            .expect("load product")
            .expect("product exists")
            .stock
    }

    /// Add a line to the default user's cart through the API.
    pub async fn add_to_cart(&self, product_id: Uuid, quantity: i32) {
        let response = self
            .request_authenticated(
                Method::POST,
                "/api/cart/items",
                Some(json!({ "product_id": product_id, "quantity": quantity })),
            )
            .await;
        assert_eq!(response.status(), 200, "add_to_cart should succeed");
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Parse a decimal out of a JSON value, accepting both string and number
/// encodings, normalized to two places.
pub fn decimal(value: &Value) -> Decimal {
    let parsed = match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected a decimal, got {}", other),
    };
    parsed.round_dp(2)
}
