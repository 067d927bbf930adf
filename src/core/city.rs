//! City directory - trip endpoints, served through a read-through cached list.

use crate::{
    core::access::{self, Actor, Operation},
    entities::{City, city},
    errors::{Error, Result},
    services::{
        Services,
        cache::{self, CITIES_LIST_KEY},
    },
};
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QueryOrder, Set};
use tracing::{debug, info};

/// Finds a city by id.
pub async fn get_city<C>(db: &C, city_id: i64) -> Result<city::Model>
where
    C: ConnectionTrait,
{
    City::find_by_id(city_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::CityNotFound {
            city: city_id.to_string(),
        })
}

/// All cities ordered by name, served from the cache when fresh.
pub async fn list_cities(services: &Services) -> Result<Vec<city::Model>> {
    if let Some(cities) = cache::get_json(services.cache.as_ref(), CITIES_LIST_KEY).await {
        debug!("City list served from cache");
        return Ok(cities);
    }

    let cities = City::find()
        .order_by_asc(city::Column::Name)
        .all(&services.db)
        .await?;
    cache::set_json(
        services.cache.as_ref(),
        CITIES_LIST_KEY,
        &cities,
        services.config.cache.cities_ttl(),
    )
    .await?;
    Ok(cities)
}

/// Case-insensitive lookup by name.
pub async fn find_city_by_name(services: &Services, name: &str) -> Result<Option<city::Model>> {
    let wanted = name.trim().to_lowercase();
    Ok(list_cities(services)
        .await?
        .into_iter()
        .find(|c| c.name.to_lowercase() == wanted))
}

/// Adds a city and drops the cached list.
pub async fn create_city(services: &Services, actor: &Actor, name: &str) -> Result<city::Model> {
    access::authorize(actor, Operation::CreateCity)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "city name cannot be empty"));
    }
    if find_city_by_name(services, name).await?.is_some() {
        return Err(Error::validation("name", format!("city {name} already exists")));
    }

    let city = city::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(&services.db)
    .await?;
    services.cache.invalidate(CITIES_LIST_KEY).await;

    info!(city_id = city.id, name, "City created");
    Ok(city)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{self, admin};

    #[tokio::test]
    async fn test_create_city_invalidates_list() -> Result<()> {
        let (services, _) = test_utils::setup_services().await?;

        assert!(list_cities(&services).await?.is_empty());
        assert!(services.cache.get(CITIES_LIST_KEY).await.is_some());

        create_city(&services, &admin(), "Vladivostok").await?;
        assert!(services.cache.get(CITIES_LIST_KEY).await.is_none());

        let names: Vec<String> = list_cities(&services)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Vladivostok".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_reads_through_cache() -> Result<()> {
        let (services, _) = test_utils::setup_services().await?;
        create_city(&services, &admin(), "Artyom").await?;
        assert_eq!(list_cities(&services).await?.len(), 1);

        // Written behind the cache's back: the cached list stays until invalidated.
        city::ActiveModel {
            name: Set("Nakhodka".to_string()),
            ..Default::default()
        }
        .insert(&services.db)
        .await?;
        assert_eq!(list_cities(&services).await?.len(), 1);

        services.cache.invalidate(CITIES_LIST_KEY).await;
        assert_eq!(list_cities(&services).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_and_empty_names_rejected() -> Result<()> {
        let (services, _) = test_utils::setup_services().await?;
        create_city(&services, &admin(), "Ussuriysk").await?;

        let err = create_city(&services, &admin(), " ussuriysk ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "name"));
        assert!(create_city(&services, &admin(), "  ").await.is_err());
        Ok(())
    }
}
