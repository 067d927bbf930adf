//! Deferred trip transitions.
//!
//! Each trip gets two one-shot transitions: close booking at departure minus the
//! cutoff, and deactivate at arrival. Both are idempotent, so a transition that runs
//! twice (for example after a restart) is harmless.

use crate::{core::trip, errors::Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::{sync::Mutex, task::AbortHandle};
use tracing::{debug, error, info};

use super::cache::CacheStore;

/// A deferred state transition of one trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripAction {
    /// Stop accepting bookings.
    DisableBooking {
        /// Target trip
        trip_id: i64,
    },
    /// Deactivate the trip and its bookings, releasing their seats.
    Deactivate {
        /// Target trip
        trip_id: i64,
    },
}

impl TripAction {
    /// Trip the action applies to.
    #[must_use]
    pub const fn trip_id(self) -> i64 {
        match self {
            Self::DisableBooking { trip_id } | Self::Deactivate { trip_id } => trip_id,
        }
    }
}

impl fmt::Display for TripAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DisableBooking { trip_id } => write!(f, "disable_booking(trip {trip_id})"),
            Self::Deactivate { trip_id } => write!(f, "deactivate(trip {trip_id})"),
        }
    }
}

/// Runs trip transitions now or at a later instant.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Runs `action` at `run_at`; an instant in the past runs it immediately.
    async fn schedule(&self, action: TripAction, run_at: DateTime<Utc>) -> Result<()>;
    /// Runs `action` before returning.
    async fn run_now(&self, action: TripAction) -> Result<()>;
    /// Drops every pending transition of `trip_id`.
    async fn cancel(&self, trip_id: i64);
}

/// In-process runner: one sleeping tokio task per pending transition.
pub struct TokioTaskRunner {
    db: DatabaseConnection,
    cache: Arc<dyn CacheStore>,
    pending: Mutex<HashMap<i64, Vec<AbortHandle>>>,
}

impl TokioTaskRunner {
    /// Transitions run against `db` and invalidate entries in `cache`.
    #[must_use]
    pub fn new(db: DatabaseConnection, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            db,
            cache,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Number of transitions still waiting to fire.
    pub async fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .await
            .values()
            .flatten()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}

#[async_trait]
impl TaskRunner for TokioTaskRunner {
    async fn schedule(&self, action: TripAction, run_at: DateTime<Utc>) -> Result<()> {
        let Ok(delay) = (run_at - Utc::now()).to_std() else {
            return self.run_now(action).await;
        };

        let db = self.db.clone();
        let cache = Arc::clone(&self.cache);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = trip::apply_transition(&db, cache.as_ref(), action).await {
                error!(%action, error = %e, "Scheduled transition failed");
            }
        });

        let mut pending = self.pending.lock().await;
        pending.retain(|_, handles| {
            handles.retain(|h| !h.is_finished());
            !handles.is_empty()
        });
        pending
            .entry(action.trip_id())
            .or_default()
            .push(handle.abort_handle());
        debug!(%action, %run_at, "Transition scheduled");
        Ok(())
    }

    async fn run_now(&self, action: TripAction) -> Result<()> {
        info!(%action, "Running transition immediately");
        trip::apply_transition(&self.db, self.cache.as_ref(), action).await
    }

    async fn cancel(&self, trip_id: i64) {
        if let Some(handles) = self.pending.lock().await.remove(&trip_id) {
            for handle in &handles {
                handle.abort();
            }
            debug!(trip_id, count = handles.len(), "Cancelled pending transitions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{entities::Trip, services::cache::MemoryCache, test_utils};
    use chrono::Duration;
    use sea_orm::EntityTrait;

    #[test]
    fn test_action_trip_id() {
        assert_eq!(TripAction::DisableBooking { trip_id: 3 }.trip_id(), 3);
        assert_eq!(TripAction::Deactivate { trip_id: 4 }.trip_id(), 4);
    }

    #[tokio::test]
    async fn test_past_instant_runs_immediately() -> Result<()> {
        let (db, trip) = test_utils::setup_with_trip(2).await?;
        let runner = TokioTaskRunner::new(db.clone(), Arc::new(MemoryCache::new()));

        runner
            .schedule(
                TripAction::DisableBooking { trip_id: trip.id },
                Utc::now() - Duration::minutes(1),
            )
            .await?;

        let reloaded = Trip::find_by_id(trip.id).one(&db).await?;
        assert!(reloaded.is_some_and(|t| !t.is_bookable));
        assert_eq!(runner.pending_count().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_drops_pending_transitions() -> Result<()> {
        let (db, trip) = test_utils::setup_with_trip(2).await?;
        let runner = TokioTaskRunner::new(db.clone(), Arc::new(MemoryCache::new()));

        runner
            .schedule(
                TripAction::Deactivate { trip_id: trip.id },
                Utc::now() + Duration::hours(1),
            )
            .await?;
        assert_eq!(runner.pending_count().await, 1);

        runner.cancel(trip.id).await;
        assert_eq!(runner.pending_count().await, 0);

        let reloaded = Trip::find_by_id(trip.id).one(&db).await?;
        assert!(reloaded.is_some_and(|t| t.is_active));
        Ok(())
    }

    #[tokio::test]
    async fn test_fired_transitions_leave_no_entries() -> Result<()> {
        let (db, trip) = test_utils::setup_with_trip(2).await?;
        let runner = TokioTaskRunner::new(db.clone(), Arc::new(MemoryCache::new()));

        runner
            .schedule(
                TripAction::DisableBooking { trip_id: trip.id },
                Utc::now() + Duration::milliseconds(20),
            )
            .await?;
        for _ in 0..200 {
            if runner.pending_count().await == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(runner.pending_count().await, 0);

        let other_trip = trip.id + 1000;
        runner
            .schedule(
                TripAction::Deactivate { trip_id: other_trip },
                Utc::now() + Duration::hours(1),
            )
            .await?;
        let pending = runner.pending.lock().await;
        assert_eq!(pending.keys().copied().collect::<Vec<_>>(), vec![other_trip]);
        assert_eq!(pending[&other_trip].len(), 1);
        drop(pending);

        runner.cancel(other_trip).await;
        Ok(())
    }
}
