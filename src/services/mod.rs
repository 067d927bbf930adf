//! External collaborators consumed by the core through traits, with in-process
//! implementations so the service runs standalone.

/// Address validation, parsing and resolution
pub mod address;
/// TTL cache store
pub mod cache;
/// Booking notifications
pub mod notify;
/// Deferred trip transitions
pub mod tasks;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub use address::{AddressResolver, CachedAddressResolver, StreetDirectory};
pub use cache::{CacheStore, MemoryCache};
pub use notify::{DiscordNotifier, NoopNotifier, Notifier};
pub use tasks::{TaskRunner, TokioTaskRunner, TripAction};

use crate::config::settings::AppConfig;

/// Everything a core operation may need besides its arguments.
#[derive(Clone)]
pub struct Services {
    /// Database connection
    pub db: DatabaseConnection,
    /// Application settings
    pub config: Arc<AppConfig>,
    /// Derived-data cache
    pub cache: Arc<dyn CacheStore>,
    /// Pickup/dropoff resolver
    pub addresses: Arc<dyn AddressResolver>,
    /// Booking notification channel
    pub notifier: Arc<dyn Notifier>,
    /// Deferred transition runner
    pub tasks: Arc<dyn TaskRunner>,
}

impl Services {
    /// Wires the in-process implementations around `db`.
    ///
    /// Addresses resolve against the configured street directory through the shared
    /// cache; transitions run on a [`TokioTaskRunner`].
    #[must_use]
    pub fn standalone(
        db: DatabaseConnection,
        config: AppConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let directory: Arc<dyn AddressResolver> =
            Arc::new(StreetDirectory::new(config.street_directory()));
        let addresses = Arc::new(CachedAddressResolver::new(
            directory,
            Arc::clone(&cache),
            config.cache.address_ttl(),
        ));
        let tasks = Arc::new(TokioTaskRunner::new(db.clone(), Arc::clone(&cache)));

        Self {
            db,
            config: Arc::new(config),
            cache,
            addresses,
            notifier,
            tasks,
        }
    }
}
