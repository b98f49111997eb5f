//! Axum framework integration for dbspec.
//!
//! Wires the database settings of an application into
//! [Axum](https://github.com/tokio-rs/axum):
//!
//! - **State**: [`DatabaseSettings`] as router state
//! - **Request hooks**: [`DatabaseLayer`] optionally checks the connection
//!   before each request and always releases it afterwards
//! - **Extractor**: [`DatabaseConnection`] hands the request's connection to
//!   handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use axum::{Router, routing::get};
//! use dbspec_axum::{DatabaseConnection, DatabaseLayer, DatabaseSettingsBuilder};
//! use dbspec_sqlx::SqlxConnector;
//!
//! async fn health(DatabaseConnection(conn): DatabaseConnection<SqlxConnector>) -> String {
//!     format!("connected to {}", conn.environment())
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = DatabaseSettingsBuilder::new(SqlxConnector::new())
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let app = Router::new()
//!         .route("/health", get(health))
//!         .layer(DatabaseLayer::new(settings.clone()))
//!         .with_state(settings);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use http::request::Parts;
use thiserror::Error;
use tower::{Layer, Service};
use tracing::{debug, info, warn};

pub use dbspec_core::config::{EnvSource, StdEnvSource};
pub use dbspec_core::connection::{
    Bootstrap, Capability, ConnectionHandle, ConnectionSpec, Connector, Database, DatabaseSettings,
};
use dbspec_core::ConfigError;

/// Errors that can occur during dbspec-Axum integration.
#[derive(Error, Debug)]
pub enum DbspecAxumError {
    /// The database could not be reached, even after reconnecting.
    #[error("database connection failed: {0}")]
    ConnectionFailed(String),

    /// No database configuration has been applied.
    #[error("no database configured")]
    NotConfigured,

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl From<ConfigError> for DbspecAxumError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ConnectionEstablish(msg) => Self::ConnectionFailed(msg),
            ConfigError::NotConfigured => Self::NotConfigured,
            other => Self::ConfigError(other.to_string()),
        }
    }
}

impl IntoResponse for DbspecAxumError {
    fn into_response(self) -> Response {
        let status = match &self {
            DbspecAxumError::ConnectionFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            DbspecAxumError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            DbspecAxumError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Result type for dbspec-Axum operations.
pub type Result<T> = std::result::Result<T, DbspecAxumError>;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Tower layer installing the per-request database hooks.
///
/// Before a request the connection is verified when the settings ask for
/// it; a failed reconnect answers `503 Service Unavailable` without calling
/// the handler. After the response the request's connection is released,
/// whatever the handler returned.
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(DatabaseLayer::new(settings.clone()))
///     .with_state(settings);
/// ```
pub struct DatabaseLayer<C: Connector> {
    settings: DatabaseSettings<C>,
}

impl<C: Connector> Clone for DatabaseLayer<C> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
        }
    }
}

impl<C: Connector> DatabaseLayer<C> {
    /// Create a new layer.
    pub fn new(settings: DatabaseSettings<C>) -> Self {
        debug!(
            verify_before_request = settings.verify_before_request(),
            "DatabaseLayer created"
        );
        Self { settings }
    }

    /// Get the settings.
    pub fn settings(&self) -> &DatabaseSettings<C> {
        &self.settings
    }
}

impl<S, C: Connector> Layer<S> for DatabaseLayer<C> {
    type Service = DatabaseMiddleware<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        DatabaseMiddleware {
            inner,
            settings: self.settings.clone(),
        }
    }
}

/// Tower middleware service running the request hooks.
pub struct DatabaseMiddleware<S, C: Connector> {
    inner: S,
    settings: DatabaseSettings<C>,
}

impl<S: Clone, C: Connector> Clone for DatabaseMiddleware<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S, C, ReqBody> Service<Request<ReqBody>> for DatabaseMiddleware<S, C>
where
    S: Service<Request<ReqBody>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    C: Connector,
    ReqBody: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<std::result::Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        // The clone that was polled ready is the one that must be called.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let settings = self.settings.clone();

        Box::pin(async move {
            let database = settings.database();

            if settings.verify_before_request() && database.is_configured() {
                if let Err(error) = database.verify().await {
                    warn!(error = %error, "Database unavailable, rejecting request");
                    return Ok(DbspecAxumError::from(error).into_response());
                }
            }

            let mut handle = database.checkout().unwrap_or_default();
            if handle.is_established() {
                request.extensions_mut().insert(handle.clone());
            }

            let response = inner.call(request).await;
            database.release(&mut handle).await;
            response
        })
    }
}

/// Extractor for the request's database connection.
///
/// Uses the connection checked out by [`DatabaseLayer`] when the layer is
/// installed, and checks one out from the settings in the router state
/// otherwise.
///
/// # Example
///
/// ```rust,ignore
/// use dbspec_axum::DatabaseConnection;
///
/// async fn handler(DatabaseConnection(conn): DatabaseConnection<SqlxConnector>) -> &'static str {
///     // Use conn.pool()...
///     "OK"
/// }
/// ```
pub struct DatabaseConnection<C: Connector>(pub ConnectionHandle<C::Pool>);

impl<C: Connector> std::fmt::Debug for DatabaseConnection<C>
where
    C::Pool: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DatabaseConnection").field(&self.0).finish()
    }
}

impl<S, C> FromRequestParts<S> for DatabaseConnection<C>
where
    C: Connector,
    DatabaseSettings<C>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = DbspecAxumError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        if let Some(handle) = parts.extensions.get::<ConnectionHandle<C::Pool>>() {
            return Ok(DatabaseConnection(handle.clone()));
        }
        let settings = DatabaseSettings::<C>::from_ref(state);
        Ok(DatabaseConnection(settings.database().checkout()?))
    }
}

/// Builder for the database settings of an Axum application.
///
/// Runs startup discovery (`DATABASE_URL` and `config/database.yml`) and
/// connects if anything is configured.
///
/// # Example
///
/// ```rust,ignore
/// let settings = DatabaseSettingsBuilder::new(SqlxConnector::new())
///     .root("/srv/app")
///     .capability(Capability::Legacy)
///     .build()
///     .await?;
/// ```
pub struct DatabaseSettingsBuilder<C: Connector, E: EnvSource = StdEnvSource> {
    connector: C,
    bootstrap: Bootstrap<E>,
    verify_before_request: Option<bool>,
}

impl<C: Connector> DatabaseSettingsBuilder<C> {
    /// Create a builder reading the process environment.
    pub fn new(connector: C) -> Self {
        Self::with_bootstrap(connector, Bootstrap::new())
    }
}

impl<C: Connector, E: EnvSource> DatabaseSettingsBuilder<C, E> {
    /// Create a builder around an existing bootstrap.
    pub fn with_bootstrap(connector: C, bootstrap: Bootstrap<E>) -> Self {
        Self {
            connector,
            bootstrap,
            verify_before_request: None,
        }
    }

    /// Set the application root.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.bootstrap = self.bootstrap.root(root);
        self
    }

    /// Set the environment name.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.bootstrap = self.bootstrap.environment_name(environment);
        self
    }

    /// Set the URL decomposition capability.
    pub fn capability(mut self, capability: Capability) -> Self {
        self.bootstrap = self.bootstrap.capability(capability);
        self
    }

    /// Turn the pre-request liveness check on or off, overriding the
    /// capability default.
    pub fn verify_before_request(mut self, verify: bool) -> Self {
        self.verify_before_request = Some(verify);
        self
    }

    /// Discover configuration and build the settings.
    pub async fn build(self) -> Result<DatabaseSettings<C>> {
        let settings = DatabaseSettings::register(self.connector, &self.bootstrap).await?;
        let settings = match self.verify_before_request {
            Some(verify) => settings.with_verify_before_request(verify),
            None => settings,
        };

        info!(
            environment = settings.environment(),
            configured = settings.database().is_configured(),
            "Database settings ready"
        );
        Ok(settings)
    }
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        DatabaseConnection, DatabaseLayer, DatabaseMiddleware, DatabaseSettingsBuilder,
        DbspecAxumError, Result,
    };
    pub use dbspec_core::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, routing::get};
    use dbspec_core::config::MapEnvSource;
    use dbspec_core::mapping;
    use dbspec_core::testing::MemoryConnector;
    use tower::ServiceExt;

    type Settings = DatabaseSettings<MemoryConnector>;

    async fn configured(capability: Capability) -> Settings {
        let settings = DatabaseSettings::new(MemoryConnector::new(), capability, "test");
        let mut handle = settings
            .set_database(ConnectionSpec::Flat(mapping! {
                "adapter" => "sqlite3",
                "database" => "test.db",
            }))
            .await
            .unwrap();
        settings.database().release(&mut handle).await;
        settings
    }

    async fn handler(DatabaseConnection(conn): DatabaseConnection<MemoryConnector>) -> String {
        conn.environment().to_string()
    }

    fn app(settings: Settings) -> Router {
        Router::new()
            .route("/", get(handler))
            .layer(DatabaseLayer::new(settings.clone()))
            .with_state(settings)
    }

    fn request() -> Request<Body> {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_connection_released_after_response() {
        let settings = configured(Capability::Current).await;
        let response = app(settings.clone()).oneshot(request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"test");

        let connector = settings.database().connector();
        assert_eq!(connector.released(), 2);
        assert_eq!(connector.verified(), 0);
    }

    #[tokio::test]
    async fn test_legacy_capability_verifies_before_request() {
        let settings = configured(Capability::Legacy).await;
        app(settings.clone()).oneshot(request()).await.unwrap();
        assert_eq!(settings.database().connector().verified(), 1);
    }

    #[tokio::test]
    async fn test_failed_reconnect_is_service_unavailable() {
        let settings = configured(Capability::Legacy).await;
        let connector = settings.database().connector();
        connector.fail_next_verify();
        connector.fail_next_establish();

        let response = app(settings.clone()).oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(connector.released(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_recovers_request() {
        let settings = configured(Capability::Legacy).await;
        settings.database().connector().fail_next_verify();

        let response = app(settings.clone()).oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(settings.database().connector().established(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_database_rejects_extractor() {
        let settings = DatabaseSettings::new(MemoryConnector::new(), Capability::Legacy, "test");
        let response = app(settings).oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_extractor_without_layer_checks_out_from_state() {
        let settings = configured(Capability::Current).await;
        let app = Router::new().route("/", get(handler)).with_state(settings);
        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_builder_discovers_configuration() {
        let env = MapEnvSource::new()
            .set("DATABASE_URL", "sqlite3:db/test.sqlite3")
            .set("RACK_ENV", "test");
        let bootstrap = Bootstrap::with_source(env).root("/nonexistent");
        let settings = DatabaseSettingsBuilder::with_bootstrap(MemoryConnector::new(), bootstrap)
            .verify_before_request(true)
            .build()
            .await
            .unwrap();

        assert!(settings.verify_before_request());
        assert_eq!(settings.environment(), "test");
        assert!(settings.database().is_configured());
    }

    #[test]
    fn test_error_status_codes() {
        let response = DbspecAxumError::from(ConfigError::establish("refused")).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = DbspecAxumError::from(ConfigError::parse("bad yaml")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
