//! Applying a connection specification.
//!
//! [`Database`] owns the process-wide connection state: the configuration
//! registry built from the last applied spec and the pool the connector
//! opened for it. Each [`Database::apply`] replaces both wholesale.
//!
//! ```rust,ignore
//! let database = Database::new(SqlxConnector::new(), Capability::Current);
//! let mut handle = database.apply(spec, "production").await?;
//! // ... use the connection ...
//! database.release(&mut handle).await;
//! ```

use super::registry::{ConfigurationRegistry, DatabaseEntry, PRIMARY};
use super::spec::ConnectionSpec;
use super::target::ConnectionTarget;
use super::url::Capability;
use crate::error::{ConfigError, ConfigResult};
use crate::value::Mapping;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

/// The ORM-side collaborator that actually opens connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Shared connection pool handed out to requests.
    type Pool: Clone + Send + Sync + 'static;

    /// Open a pool for `target`.
    ///
    /// Failures are reported as [`ConfigError::ConnectionEstablish`].
    async fn establish(&self, target: &ConnectionTarget) -> ConfigResult<Self::Pool>;

    /// Check that `pool` can still reach the database.
    async fn verify(&self, pool: &Self::Pool) -> ConfigResult<()>;

    /// Return whatever a request had checked out back to `pool`.
    async fn release(&self, pool: &Self::Pool);

    /// Shut `pool` down. Called when a newer spec replaces it.
    async fn close(&self, pool: Self::Pool);
}

/// Lifecycle of a [`ConnectionHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandleState {
    /// Nothing has been established yet.
    #[default]
    Unestablished,
    /// Connected and usable.
    Established,
    /// Released; only a new apply or checkout gives a usable handle.
    Released,
}

/// A connection handed out by [`Database::apply`] or [`Database::checkout`].
#[derive(Debug, Clone)]
pub struct ConnectionHandle<P> {
    environment: String,
    pool: Option<P>,
    state: HandleState,
}

impl<P> Default for ConnectionHandle<P> {
    fn default() -> Self {
        Self {
            environment: String::new(),
            pool: None,
            state: HandleState::Unestablished,
        }
    }
}

impl<P> ConnectionHandle<P> {
    fn established(environment: String, pool: P) -> Self {
        Self {
            environment,
            pool: Some(pool),
            state: HandleState::Established,
        }
    }

    /// A handle that has never been connected.
    pub fn unestablished() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Whether the handle can be used.
    pub fn is_established(&self) -> bool {
        self.state == HandleState::Established
    }

    /// Environment the connection was established for.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// The pool, while established.
    pub fn pool(&self) -> Option<&P> {
        self.pool.as_ref()
    }
}

struct Active<P> {
    spec: ConnectionSpec,
    environment: String,
    registry: ConfigurationRegistry,
    target: ConnectionTarget,
    pool: P,
    generation: u64,
}

/// Process-wide database state: registry plus live pool.
///
/// Writers are [`apply`](Self::apply), [`reset`](Self::reset) and the
/// reconnect inside [`verify`](Self::verify). Reconfiguration is expected at
/// startup or from a test harness, not while requests are in flight.
pub struct Database<C: Connector> {
    connector: C,
    capability: Capability,
    state: RwLock<Option<Active<C::Pool>>>,
    generation: RwLock<u64>,
}

impl<C: Connector> std::fmt::Debug for Database<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Database")
            .field("capability", &self.capability)
            .field("environment", &state.as_ref().map(|a| a.environment.clone()))
            .field("spec", &state.as_ref().map(|a| a.spec.shape()))
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Database<C> {
    /// Create an unconfigured database around `connector`.
    pub fn new(connector: C, capability: Capability) -> Self {
        Self {
            connector,
            capability,
            state: RwLock::new(None),
            generation: RwLock::new(0),
        }
    }

    /// The capability URL decomposition runs with.
    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// The connector.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Whether a spec has been applied.
    pub fn is_configured(&self) -> bool {
        self.state.read().is_some()
    }

    /// The registry built by the last apply.
    pub fn registry(&self) -> Option<ConfigurationRegistry> {
        self.state.read().as_ref().map(|a| a.registry.clone())
    }

    /// The spec last applied.
    pub fn spec(&self) -> Option<ConnectionSpec> {
        self.state.read().as_ref().map(|a| a.spec.clone())
    }

    /// The environment the connection was established for.
    pub fn environment(&self) -> Option<String> {
        self.state.read().as_ref().map(|a| a.environment.clone())
    }

    /// The target the live pool is connected to.
    pub fn target(&self) -> Option<ConnectionTarget> {
        self.state.read().as_ref().map(|a| a.target.clone())
    }

    /// Apply `spec` for `environment` and establish a connection.
    ///
    /// Replaces the previous registry and pool entirely; the old pool is
    /// closed once the new one is up. On failure the previous state is left
    /// untouched.
    pub async fn apply(
        &self,
        spec: ConnectionSpec,
        environment: &str,
    ) -> ConfigResult<ConnectionHandle<C::Pool>> {
        let (registry, target) = self.plan(&spec, environment)?;
        info!(
            environment,
            shape = spec.shape(),
            adapter = target.adapter().unwrap_or("unknown"),
            database = target.database().unwrap_or(""),
            "Applying connection specification"
        );

        let pool = self.connector.establish(&target).await?;
        let generation = self.next_generation();
        let previous = self.state.write().replace(Active {
            spec,
            environment: environment.to_string(),
            registry,
            target,
            pool: pool.clone(),
            generation,
        });

        if let Some(previous) = previous {
            debug!(environment = %previous.environment, "Closing replaced connection pool");
            self.connector.close(previous.pool).await;
        }

        Ok(ConnectionHandle::established(environment.to_string(), pool))
    }

    /// Work out the registry and connection target for `spec`.
    fn plan(
        &self,
        spec: &ConnectionSpec,
        environment: &str,
    ) -> ConfigResult<(ConfigurationRegistry, ConnectionTarget)> {
        match spec {
            ConnectionSpec::PerEnvironment(configurations)
                if configurations.contains_key(environment) =>
            {
                let registry = ConfigurationRegistry::from_environments(configurations.clone());
                let entry = registry.default_for(environment).ok_or_else(|| {
                    ConfigError::InvalidEnvironmentEntry {
                        environment: environment.to_string(),
                    }
                })?;
                let target = ConnectionTarget::from_entry(entry, self.capability)?;
                Ok((registry, target))
            }
            // A mapping without the running environment is taken whole.
            ConnectionSpec::PerEnvironment(attributes) | ConnectionSpec::Flat(attributes) => {
                let target = flat_target(attributes, environment, self.capability)?;
                let registry = ConfigurationRegistry::single(environment, attributes.clone());
                Ok((registry, target))
            }
            ConnectionSpec::Url(url) => {
                let target = ConnectionTarget::from_url(environment, url, self.capability)?;
                let registry = ConfigurationRegistry::single(environment, target.attributes.clone());
                Ok((registry, target))
            }
        }
    }

    /// Hand out a handle on the live pool.
    pub fn checkout(&self) -> ConfigResult<ConnectionHandle<C::Pool>> {
        let state = self.state.read();
        let active = state.as_ref().ok_or(ConfigError::NotConfigured)?;
        Ok(ConnectionHandle::established(
            active.environment.clone(),
            active.pool.clone(),
        ))
    }

    /// Release `handle`.
    ///
    /// Safe on handles that were never established and on handles already
    /// released; neither does anything.
    pub async fn release(&self, handle: &mut ConnectionHandle<C::Pool>) {
        if handle.state != HandleState::Established {
            return;
        }
        if let Some(pool) = handle.pool.take() {
            self.connector.release(&pool).await;
        }
        handle.state = HandleState::Released;
    }

    /// Check the live pool and reconnect once if it is unreachable.
    ///
    /// A failed reconnect is returned to the caller.
    pub async fn verify(&self) -> ConfigResult<()> {
        let (pool, target, generation) = {
            let state = self.state.read();
            let active = state.as_ref().ok_or(ConfigError::NotConfigured)?;
            (active.pool.clone(), active.target.clone(), active.generation)
        };

        let Err(error) = self.connector.verify(&pool).await else {
            return Ok(());
        };
        warn!(error = %error, environment = %target.environment, "Connection check failed, reconnecting");

        let fresh = self.connector.establish(&target).await?;
        let replaced = {
            let mut state = self.state.write();
            match state.as_mut() {
                Some(active) if active.generation == generation => {
                    Ok(std::mem::replace(&mut active.pool, fresh))
                }
                _ => Err(fresh),
            }
        };

        match replaced {
            Ok(stale) => {
                info!(environment = %target.environment, "Reconnected");
                self.connector.close(stale).await;
            }
            // Another apply won the race; its pool stays.
            Err(unused) => {
                debug!("Connection state changed during reconnect");
                self.connector.close(unused).await;
            }
        }
        Ok(())
    }

    /// Close the pool and forget the registry.
    pub async fn reset(&self) {
        let previous = self.state.write().take();
        if let Some(previous) = previous {
            info!(environment = %previous.environment, "Resetting database state");
            self.connector.close(previous.pool).await;
        }
    }

    fn next_generation(&self) -> u64 {
        let mut generation = self.generation.write();
        *generation += 1;
        *generation
    }
}

fn flat_target(
    attributes: &Mapping,
    environment: &str,
    capability: Capability,
) -> ConfigResult<ConnectionTarget> {
    let entry = DatabaseEntry {
        environment,
        name: PRIMARY,
        attributes,
    };
    ConnectionTarget::from_entry(entry, capability)
}
