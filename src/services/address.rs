//! Address resolution for pickup and dropoff locations.
//!
//! Raw addresses are first checked for allowed characters, then parsed into street
//! type, street name, house number and optional building, and finally looked up in
//! a per-city street directory. The normalized form is what bookings persist:
//! `ул. Светланская, д. 10 к. 2`.

use crate::errors::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, LazyLock},
    time::Duration,
};
use tracing::{debug, instrument};

use super::cache::CacheStore;

/// Longest accepted raw address.
pub const MAX_ADDRESS_LEN: usize = 100;

#[allow(clippy::expect_used)] // Literal pattern, checked by tests
static ALLOWED_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[а-яА-ЯёЁa-zA-Z0-9\s\-,\.]+$").expect("address charset pattern is valid")
});

#[allow(clippy::expect_used)] // Literal pattern, checked by tests
static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?P<kind>улица|ул\.|проспект|пр\.|переулок|пер\.|набережная|наб\.|проезд|пр-д|шоссе|ш\.|бульвар|б-р)\s*)?(?P<street>.+?)[\s,]+(?:(?:д\.|дом)\s*)?(?P<house>[0-9]+)(?:\s*(?:корпус|к\.?)\s*(?P<building>[0-9]+))?\s*$",
    )
    .expect("address pattern is valid")
});

/// Kind of street, rendered by its standard abbreviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreetKind {
    /// улица
    Street,
    /// проспект
    Avenue,
    /// переулок
    Lane,
    /// набережная
    Embankment,
    /// проезд
    Passage,
    /// шоссе
    Highway,
    /// бульвар
    Boulevard,
}

impl StreetKind {
    fn parse(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "улица" | "ул." => Some(Self::Street),
            "проспект" | "пр." => Some(Self::Avenue),
            "переулок" | "пер." => Some(Self::Lane),
            "набережная" | "наб." => Some(Self::Embankment),
            "проезд" | "пр-д" => Some(Self::Passage),
            "шоссе" | "ш." => Some(Self::Highway),
            "бульвар" | "б-р" => Some(Self::Boulevard),
            _ => None,
        }
    }

    /// Standard abbreviation, e.g. `ул.`
    #[must_use]
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::Street => "ул.",
            Self::Avenue => "пр.",
            Self::Lane => "пер.",
            Self::Embankment => "наб.",
            Self::Passage => "пр-д",
            Self::Highway => "ш.",
            Self::Boulevard => "б-р",
        }
    }
}

/// An address split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    /// Street kind; plain street when omitted
    pub kind: StreetKind,
    /// Street name without the kind
    pub street: String,
    /// House number, at least 1
    pub house: u32,
    /// Building (корпус), at least 1
    pub building: Option<u32>,
}

impl fmt::Display for ParsedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}, д. {}", self.kind.abbreviation(), self.street, self.house)?;
        if let Some(building) = self.building {
            write!(f, " к. {building}")?;
        }
        Ok(())
    }
}

/// Rejects empty, overlong, or oddly-charactered input before any lookup.
pub fn validate_format(field: &str, raw: &str) -> Result<()> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::validation(field, "address is empty"));
    }
    if raw.chars().count() > MAX_ADDRESS_LEN {
        return Err(Error::validation(
            field,
            format!("address is longer than {MAX_ADDRESS_LEN} characters"),
        ));
    }
    if !ALLOWED_CHARS.is_match(raw) {
        return Err(Error::validation(field, "address contains invalid characters"));
    }
    Ok(())
}

/// Splits a raw address into parts. `None` when no house number can be found.
#[must_use]
pub fn parse_address(raw: &str) -> Option<ParsedAddress> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let caps = ADDRESS.captures(&collapsed)?;

    let kind = caps
        .name("kind")
        .and_then(|m| StreetKind::parse(m.as_str()))
        .unwrap_or(StreetKind::Street);
    let street = caps
        .name("street")?
        .as_str()
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string();
    let house = caps.name("house")?.as_str().parse::<u32>().ok()?;
    let building = match caps.name("building") {
        Some(m) => Some(m.as_str().parse::<u32>().ok()?),
        None => None,
    };

    if street.is_empty() || house == 0 || building == Some(0) {
        return None;
    }

    Some(ParsedAddress {
        kind,
        street,
        house,
        building,
    })
}

/// Resolves a raw address within a city to its normalized form.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// `Ok(None)` when the address does not exist in `city`.
    async fn resolve(&self, raw: &str, city: &str) -> Result<Option<String>>;
}

/// Resolver backed by a fixed list of streets per city.
#[derive(Debug, Clone, Default)]
pub struct StreetDirectory {
    streets: HashMap<String, Vec<String>>,
}

impl StreetDirectory {
    /// `streets` is keyed by lowercase city name.
    #[must_use]
    pub const fn new(streets: HashMap<String, Vec<String>>) -> Self {
        Self { streets }
    }

    fn find_street(&self, city: &str, street: &str) -> Option<&str> {
        let wanted = street.to_lowercase();
        self.streets
            .get(&city.trim().to_lowercase())?
            .iter()
            .find(|known| known.to_lowercase() == wanted)
            .map(String::as_str)
    }
}

#[async_trait]
impl AddressResolver for StreetDirectory {
    #[instrument(skip(self))]
    async fn resolve(&self, raw: &str, city: &str) -> Result<Option<String>> {
        let Some(mut parsed) = parse_address(raw) else {
            debug!("Address could not be parsed");
            return Ok(None);
        };
        let Some(canonical) = self.find_street(city, &parsed.street) else {
            debug!(street = %parsed.street, "Street not in directory");
            return Ok(None);
        };
        parsed.street = canonical.to_string();
        Ok(Some(parsed.to_string()))
    }
}

/// Caching decorator: hits are kept for the full TTL, misses for a quarter of it.
pub struct CachedAddressResolver {
    inner: Arc<dyn AddressResolver>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl CachedAddressResolver {
    /// Wraps `inner`, storing results in `cache`.
    #[must_use]
    pub fn new(inner: Arc<dyn AddressResolver>, cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    fn key(raw: &str, city: &str) -> String {
        format!(
            "address:{}:{}",
            city.trim().to_lowercase(),
            raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
        )
    }
}

#[async_trait]
impl AddressResolver for CachedAddressResolver {
    async fn resolve(&self, raw: &str, city: &str) -> Result<Option<String>> {
        let key = Self::key(raw, city);
        if let Some(cached) = self.cache.get(&key).await {
            debug!(%key, "Address cache hit");
            return Ok(serde_json::from_value(cached)?);
        }

        let resolved = self.inner.resolve(raw, city).await?;
        let ttl = if resolved.is_some() {
            self.ttl
        } else {
            self.ttl / 4
        };
        self.cache
            .set(&key, serde_json::to_value(&resolved)?, ttl)
            .await;
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::services::cache::MemoryCache;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn directory() -> StreetDirectory {
        let mut streets = HashMap::new();
        streets.insert(
            "vladivostok".to_string(),
            vec!["Светланская".to_string(), "Океанский".to_string()],
        );
        StreetDirectory::new(streets)
    }

    #[test]
    fn test_validate_format() {
        assert!(validate_format("pickup_location", "ул. Светланская, 10").is_ok());
        assert!(matches!(
            validate_format("pickup_location", "Светланская 10; DROP TABLE"),
            Err(Error::Validation { ref field, .. }) if field == "pickup_location"
        ));
        assert!(validate_format("dropoff_location", "   ").is_err());
        assert!(validate_format("dropoff_location", &"а".repeat(101)).is_err());
    }

    #[test]
    fn test_parse_full_address() {
        let parsed = parse_address("улица  Светланская, дом 10 к. 2").unwrap();
        assert_eq!(parsed.kind, StreetKind::Street);
        assert_eq!(parsed.street, "Светланская");
        assert_eq!(parsed.house, 10);
        assert_eq!(parsed.building, Some(2));
        assert_eq!(parsed.to_string(), "ул. Светланская, д. 10 к. 2");
    }

    #[test]
    fn test_parse_short_forms() {
        let parsed = parse_address("пр. Океанский 45").unwrap();
        assert_eq!(parsed.kind, StreetKind::Avenue);
        assert_eq!(parsed.to_string(), "пр. Океанский, д. 45");

        let bare = parse_address("Светланская 3").unwrap();
        assert_eq!(bare.kind, StreetKind::Street);
        assert_eq!(bare.building, None);
    }

    #[test]
    fn test_parse_rejects_missing_or_zero_house() {
        assert!(parse_address("ул. Светланская").is_none());
        assert!(parse_address("ул. Светланская 0").is_none());
        assert!(parse_address("ул. Светланская 5 к. 0").is_none());
    }

    #[tokio::test]
    async fn test_directory_resolves_case_insensitively() -> Result<()> {
        let resolver = directory();
        let resolved = resolver.resolve("ул. светланская 10", "Vladivostok").await?;
        assert_eq!(resolved.as_deref(), Some("ул. Светланская, д. 10"));

        assert!(resolver.resolve("ул. Ленина 1", "Vladivostok").await?.is_none());
        assert!(resolver.resolve("ул. Светланская 10", "Moscow").await?.is_none());
        Ok(())
    }

    struct CountingResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AddressResolver for CountingResolver {
        async fn resolve(&self, raw: &str, _city: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(raw.contains("10").then(|| raw.to_string()))
        }
    }

    #[tokio::test]
    async fn test_cached_resolver_caches_hits_and_misses() -> Result<()> {
        let inner = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedAddressResolver::new(
            Arc::clone(&inner) as Arc<dyn AddressResolver>,
            Arc::new(MemoryCache::new()),
            Duration::from_secs(60),
        );

        assert!(cached.resolve("Светланская 10", "A").await?.is_some());
        assert!(cached.resolve("Светланская  10", "a").await?.is_some());
        assert!(cached.resolve("Светланская 9", "A").await?.is_none());
        assert!(cached.resolve("Светланская 9", "A").await?.is_none());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        Ok(())
    }
}
