//! Integration tests for the AquaCycle HTTP API.
//!
//! The tests drive the full router (middleware, extractors, role checks and
//! the error envelope) in-process with `tower::ServiceExt::oneshot`. By
//! default the database pool is lazy and points at a closed port, so those
//! tests cover everything a request meets before its first query.
//!
//! The `lifecycle_postgres` tests start `PostgreSQL` in a container, run the
//! migrations and exercise the stock, order and dispatch workflows end to end.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p aquacycle-integration-tests
//! cargo test -p aquacycle-integration-tests --features postgres --test lifecycle_postgres
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

use aquacycle_core::{BranchId, Role, UserId, emergency::DEFAULT_BONUS_AMOUNT, geo::GeoDirectory};
use aquacycle_server::{
    config::{AppConfig, JwtConfig},
    db, routes,
    services::auth::{Claims, issue_token},
    state::AppState,
};

const JWT_SECRET: &str = "q8$Vn2!xR7@kL4#wZ9&pT1*mC6^hB3%d";

/// Configuration for an in-process server.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: SecretString::from("postgres://aquacycle@127.0.0.1:1/aquacycle_test"),
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 0,
        jwt: JwtConfig {
            secret: SecretString::from(JWT_SECRET),
            ttl_hours: 1,
        },
        geo_table: None,
        default_bonus: DEFAULT_BONUS_AMOUNT,
        recycling_reject_reverses_bin: true,
        log_json: false,
        cors_origin: Some("http://localhost:3000".to_owned()),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Router and state for one test.
pub struct TestApp {
    router: Router,
    state: AppState,
}

/// A response with its body parsed as JSON (`Value::Null` when empty or not
/// JSON).
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub text: String,
}

impl TestApp {
    /// Build the application with a lazy pool.
    ///
    /// # Panics
    ///
    /// Panics if the test database URL cannot be parsed.
    #[must_use]
    pub fn new() -> Self {
        let pool = db::create_lazy_pool(&test_config().database_url).expect("lazy pool");
        Self::with_pool(pool)
    }

    /// Build the application on an existing (usually migrated) pool.
    #[must_use]
    pub fn with_pool(pool: PgPool) -> Self {
        let state = AppState::new(test_config(), pool, GeoDirectory::default());
        Self {
            router: routes::app(state.clone()),
            state,
        }
    }

    /// Database pool behind the router.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        self.state.pool()
    }

    /// Mint a bearer token for `role`, optionally tied to a branch.
    ///
    /// # Panics
    ///
    /// Panics if the token cannot be signed.
    #[must_use]
    pub fn token(&self, role: Role, branch_id: Option<i32>) -> String {
        self.token_with_expiry(role, branch_id, 3600)
    }

    /// Mint a token whose expiry is `ttl_seconds` from now (negative for an
    /// already expired token).
    ///
    /// # Panics
    ///
    /// Panics if the token cannot be signed.
    #[must_use]
    pub fn token_with_expiry(&self, role: Role, branch_id: Option<i32>, ttl_seconds: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or_default();
        let claims = Claims {
            sub: UserId::new(42),
            role,
            branch_id: branch_id.map(BranchId::new),
            exp: now + ttl_seconds,
            iat: now,
        };
        issue_token(&claims, self.state.encoding_key()).expect("sign token")
    }

    /// Send a request, optionally with a bearer token and a raw JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_owned())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        self.dispatch(request).await
    }

    /// Send a prepared request.
    ///
    /// # Panics
    ///
    /// Panics if the body cannot be read.
    pub async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
            text,
        }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestResponse {
    /// Assert the error envelope shape and return its message.
    ///
    /// # Panics
    ///
    /// Panics if the body is not a failure envelope.
    #[must_use]
    pub fn error_message(&self) -> &str {
        assert_eq!(self.body["success"], false, "body: {}", self.text);
        self.body["message"].as_str().expect("message is a string")
    }
}
