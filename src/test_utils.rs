//! Shared test utilities for `tripbook`.
//!
//! In-memory databases, fixtures with unique identifiers, and recording doubles for
//! the notification and task collaborators.

#![allow(clippy::unwrap_used, missing_docs)]

use crate::{
    config::settings::{AppConfig, CityStreets},
    core::{
        access::Actor,
        booking::{self, NewBooking},
        city, payment, pricing,
        trip::{self, NewTrip},
        user,
        vehicle::{self, NewVehicle},
    },
    entities::{
        Role, VehicleType, booking as booking_entity, city as city_entity, trip as trip_entity,
        user as user_entity, vehicle as vehicle_entity,
    },
    errors::{Error, Result},
    services::{
        CacheStore, CachedAddressResolver, MemoryCache, Notifier, Services, StreetDirectory,
        TaskRunner, TripAction,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, DatabaseConnection};
use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

static COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Routes `tracing` output to the test harness; `RUST_LOG` overrides the default level.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
///
/// One pooled connection: every `sqlite::memory:` connection is its own database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// A `SQLite` file under the temp dir, removed on drop together with its journal files.
pub struct TempDb {
    path: PathBuf,
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

/// Creates a file-backed database behind a pool of `connections` connections.
///
/// Unlike [`setup_test_db`], concurrent tasks get separate connections and really
/// contend for the `SQLite` write lock.
pub async fn setup_file_db(connections: u32) -> Result<(DatabaseConnection, TempDb)> {
    let path = std::env::temp_dir().join(format!(
        "tripbook-test-{}-{}.sqlite",
        std::process::id(),
        next_id()
    ));
    let guard = TempDb { path };
    let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", guard.path.display()));
    options
        .max_connections(connections)
        .min_connections(connections)
        .sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((db, guard))
}

/// An actor with every permission, not backed by a user row.
#[must_use]
pub const fn admin() -> Actor {
    Actor::new(0, Role::Admin)
}

/// Registers a user with a fresh phone number.
pub async fn create_test_user(db: &DatabaseConnection, role: Role) -> Result<user_entity::Model> {
    let phone = format!("+7900{:07}", next_id());
    user::create_user(db, &phone, "Test", "User", role).await
}

/// Registers a customer and returns it as an actor.
pub async fn customer_actor(db: &DatabaseConnection) -> Result<Actor> {
    let user = create_test_user(db, Role::Customer).await?;
    Ok(Actor::from(&user))
}

/// Registers a bus with `total_seats` seats and a fresh plate.
pub async fn create_test_vehicle(
    db: &DatabaseConnection,
    total_seats: i32,
) -> Result<vehicle_entity::Model> {
    let plate = format!("А{:03}ВС", next_id() % 1000);
    vehicle::create_vehicle(
        db,
        &admin(),
        NewVehicle {
            vehicle_type: VehicleType::Bus,
            license_plate: plate,
            total_seats,
            is_comfort: false,
            air_conditioning: true,
            allows_pets: false,
        },
        "125",
    )
    .await
}

/// Settings with a small street directory for two cities.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfig {
        streets: vec![
            CityStreets {
                city: "Vladivostok".to_string(),
                names: vec!["Светланская".to_string(), "Алеутская".to_string()],
            },
            CityStreets {
                city: "Nakhodka".to_string(),
                names: vec!["Ленинская".to_string(), "Портовая".to_string()],
            },
        ],
        ..AppConfig::default()
    }
}

/// The day after tomorrow at `hour:minute` UTC; always in the future.
#[must_use]
pub fn at_hour(hour: i64, minute: i64) -> DateTime<Utc> {
    let midnight = (Utc::now() + Duration::days(2))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    midnight + Duration::hours(hour) + Duration::minutes(minute)
}

/// A detached trip model for pricing tests.
#[must_use]
pub fn sample_trip_model(front: Decimal, middle: Decimal, back: Decimal) -> trip_entity::Model {
    trip_entity::Model {
        id: 1,
        vehicle_id: 1,
        driver_id: None,
        origin_city_id: 1,
        destination_city_id: 2,
        departure_time: at_hour(10, 0),
        arrival_time: at_hour(14, 0),
        front_seat_price: front,
        middle_seat_price: middle,
        back_seat_price: back,
        is_bookable: true,
        is_active: true,
        booking_cutoff_minutes: 60,
        created_at: Utc::now(),
    }
}

/// Keeps every notification instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    /// `(chat_id, message)` pairs in send order.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, chat_id: &str, message: &str) -> Result<()> {
        self.sent
            .lock()
            .await
            .push((chat_id.to_string(), message.to_string()));
        Ok(())
    }
}

/// Fails every delivery.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _chat_id: &str, _message: &str) -> Result<()> {
        Err(Error::validation("chat_id", "chat unreachable"))
    }
}

/// A call observed by [`RecordingTaskRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedTask {
    Scheduled(TripAction, DateTime<Utc>),
    RanNow(TripAction),
    Cancelled(i64),
}

/// Records transitions without running them.
#[derive(Default)]
pub struct RecordingTaskRunner {
    calls: Mutex<Vec<RecordedTask>>,
}

impl RecordingTaskRunner {
    pub async fn recorded(&self) -> Vec<RecordedTask> {
        self.calls.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.calls.lock().await.clear();
    }
}

#[async_trait]
impl TaskRunner for RecordingTaskRunner {
    async fn schedule(&self, action: TripAction, run_at: DateTime<Utc>) -> Result<()> {
        self.calls
            .lock()
            .await
            .push(RecordedTask::Scheduled(action, run_at));
        Ok(())
    }

    async fn run_now(&self, action: TripAction) -> Result<()> {
        self.calls.lock().await.push(RecordedTask::RanNow(action));
        Ok(())
    }

    async fn cancel(&self, trip_id: i64) {
        self.calls.lock().await.push(RecordedTask::Cancelled(trip_id));
    }
}

/// Handles on the doubles wired into a test [`Services`].
#[derive(Clone)]
pub struct Doubles {
    pub notifier: Arc<RecordingNotifier>,
    pub tasks: Arc<RecordingTaskRunner>,
}

/// Services over a fresh database with recording collaborators.
pub async fn setup_services() -> Result<(Services, Doubles)> {
    setup_services_on(setup_test_db().await?)
}

/// Services over `db` with recording collaborators.
pub fn setup_services_on(db: DatabaseConnection) -> Result<(Services, Doubles)> {
    init_test_tracing();
    let config = test_config();
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let directory = Arc::new(StreetDirectory::new(config.street_directory()));
    let addresses = Arc::new(CachedAddressResolver::new(
        directory,
        Arc::clone(&cache),
        config.cache.address_ttl(),
    ));
    let doubles = Doubles {
        notifier: Arc::new(RecordingNotifier::default()),
        tasks: Arc::new(RecordingTaskRunner::default()),
    };

    let services = Services {
        db,
        config: Arc::new(config),
        cache,
        addresses,
        notifier: Arc::clone(&doubles.notifier) as Arc<dyn Notifier>,
        tasks: Arc::clone(&doubles.tasks) as Arc<dyn TaskRunner>,
    };
    Ok((services, doubles))
}

/// A vehicle and two cities, ready for trips.
pub struct TripEnv {
    pub services: Services,
    pub doubles: Doubles,
    pub vehicle: vehicle_entity::Model,
    pub origin: city_entity::Model,
    pub destination: city_entity::Model,
}

pub async fn setup_trip_env(total_seats: i32) -> Result<TripEnv> {
    setup_trip_env_on(setup_test_db().await?, total_seats).await
}

pub async fn setup_trip_env_on(db: DatabaseConnection, total_seats: i32) -> Result<TripEnv> {
    let (services, doubles) = setup_services_on(db)?;
    let vehicle = create_test_vehicle(&services.db, total_seats).await?;
    let origin = city::create_city(&services, &admin(), "Vladivostok").await?;
    let destination = city::create_city(&services, &admin(), "Nakhodka").await?;
    Ok(TripEnv {
        services,
        doubles,
        vehicle,
        origin,
        destination,
    })
}

/// A trip request on the env's vehicle and cities, 1000 per seat in every zone.
#[must_use]
pub fn new_trip(env: &TripEnv, departure: DateTime<Utc>, arrival: DateTime<Utc>) -> NewTrip {
    NewTrip {
        vehicle_id: env.vehicle.id,
        driver_id: None,
        origin_city_id: env.origin.id,
        destination_city_id: env.destination.id,
        departure_time: departure,
        arrival_time: arrival,
        front_seat_price: Decimal::new(1000, 0),
        middle_seat_price: Decimal::new(1000, 0),
        back_seat_price: Decimal::new(1000, 0),
        booking_cutoff_minutes: None,
    }
}

/// A database holding one bookable trip from 10:00 to 14:00.
pub async fn setup_with_trip(total_seats: i32) -> Result<(DatabaseConnection, trip_entity::Model)> {
    let env = setup_trip_env(total_seats).await?;
    let trip = trip::create_trip(
        &env.services,
        &admin(),
        new_trip(&env, at_hour(10, 0), at_hour(14, 0)),
    )
    .await?;
    Ok((env.services.db, trip))
}

/// A bookable trip plus a customer whose chat is linked.
pub struct BookingEnv {
    pub services: Services,
    pub doubles: Doubles,
    pub trip: trip_entity::Model,
    pub customer: user_entity::Model,
    pub actor: Actor,
}

pub async fn setup_booking_env(total_seats: i32) -> Result<BookingEnv> {
    setup_booking_env_on(setup_test_db().await?, total_seats).await
}

/// [`setup_booking_env`] over a multi-connection file database, for races.
pub async fn setup_shared_booking_env(total_seats: i32) -> Result<(BookingEnv, TempDb)> {
    let (db, guard) = setup_file_db(8).await?;
    Ok((setup_booking_env_on(db, total_seats).await?, guard))
}

pub async fn setup_booking_env_on(db: DatabaseConnection, total_seats: i32) -> Result<BookingEnv> {
    let env = setup_trip_env_on(db, total_seats).await?;
    let trip = trip::create_trip(
        &env.services,
        &admin(),
        new_trip(&env, at_hour(10, 0), at_hour(14, 0)),
    )
    .await?;
    let customer = create_test_user(&env.services.db, Role::Customer).await?;
    let customer = user::link_chat(&env.services.db, customer.id, "555").await?;
    let actor = Actor::from(&customer);
    Ok(BookingEnv {
        services: env.services,
        doubles: env.doubles,
        trip,
        customer,
        actor,
    })
}

/// Books `seats` for the env's customer with a payment of the exact price.
pub async fn book_seats(ctx: &BookingEnv, seats: &[i32]) -> Result<booking_entity::Model> {
    let map = crate::core::trip_seat::seat_map(&ctx.services.db, ctx.trip.id).await?;
    let zones = map
        .iter()
        .filter(|e| seats.contains(&e.seat_number))
        .map(|e| e.seat_zone);
    let amount = pricing::total_price(&ctx.trip, zones);
    let payment = payment::record_payment(&ctx.services.db, &ctx.actor, amount, "card").await?;

    booking::create_booking(
        &ctx.services,
        &ctx.actor,
        NewBooking {
            trip_id: ctx.trip.id,
            seat_numbers: seats.to_vec(),
            pickup_location: "ул. Светланская, 10".to_string(),
            dropoff_location: "ул. Ленинская, 5".to_string(),
            payment_id: Some(payment.id),
        },
    )
    .await
}
