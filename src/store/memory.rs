use crate::error_handler::ServiceError;
use crate::models::{
    GroupId, GroupSummary, MostWatered, Plant, PlantGroup, PlantId, PlantPhoto, PlantSchedule,
    UserId, UserSettings, WateringEvent, WateringHistoryEntry, WateringStats,
};
use crate::schedule::floor_days;
use crate::store::{most_watered, PlantStore};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    plants: Vec<Plant>,
    waterings: Vec<WateringEvent>,
    photos: Vec<PlantPhoto>,
    groups: Vec<PlantGroup>,
    settings: Vec<UserSettings>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn last_watered(&self, plant_id: PlantId) -> Option<NaiveDateTime> {
        self.waterings
            .iter()
            .filter(|w| w.plant_id == plant_id)
            .map(|w| w.watered_at)
            .max()
    }
}

/// In-memory plant store for tests. `set_unavailable(true)` makes every
/// call fail the way a lost database connection does.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ServiceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(ServiceError::PoolError(
                "Could not obtain connection from database pool.".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PlantStore for MemoryStore {
    async fn add_plant(
        &self,
        user_id: UserId,
        name: &str,
        interval_days: i32,
        plant_type: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<Plant, ServiceError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        if tables
            .plants
            .iter()
            .any(|p| p.user_id == user_id && p.name == name)
        {
            return Err(ServiceError::Conflict(
                "A record with that name already exists.".to_string(),
            ));
        }
        let plant = Plant {
            id: tables.next_id(),
            user_id,
            name: name.to_string(),
            interval_days,
            plant_type: plant_type.map(str::to_string),
            group_id: None,
            created_at: now,
        };
        tables.plants.push(plant.clone());
        Ok(plant)
    }

    async fn list_plants_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PlantSchedule>, ServiceError> {
        self.check()?;
        let tables = self.tables.lock().await;
        let mut plants: Vec<PlantSchedule> = tables
            .plants
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| PlantSchedule::from_plant(p.clone(), tables.last_watered(p.id)))
            .collect();
        plants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(plants)
    }

    async fn get_plant(
        &self,
        user_id: UserId,
        plant_id: PlantId,
    ) -> Result<Option<Plant>, ServiceError> {
        self.check()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .plants
            .iter()
            .find(|p| p.user_id == user_id && p.id == plant_id)
            .cloned())
    }

    async fn get_plant_by_name(
        &self,
        user_id: UserId,
        name: &str,
    ) -> Result<Option<Plant>, ServiceError> {
        self.check()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .plants
            .iter()
            .find(|p| p.user_id == user_id && p.name == name)
            .cloned())
    }

    async fn delete_plant(&self, user_id: UserId, plant_id: PlantId) -> Result<bool, ServiceError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        let before = tables.plants.len();
        tables
            .plants
            .retain(|p| !(p.user_id == user_id && p.id == plant_id));
        if tables.plants.len() == before {
            return Ok(false);
        }
        tables.waterings.retain(|w| w.plant_id != plant_id);
        tables.photos.retain(|p| p.plant_id != plant_id);
        Ok(true)
    }

    async fn record_watering(
        &self,
        plant_id: PlantId,
        at: NaiveDateTime,
    ) -> Result<WateringEvent, ServiceError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        let event = WateringEvent {
            id: tables.next_id(),
            plant_id,
            watered_at: at,
        };
        tables.waterings.push(event.clone());
        Ok(event)
    }

    async fn watering_history(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<WateringHistoryEntry>, ServiceError> {
        self.check()?;
        let tables = self.tables.lock().await;
        let mut entries: Vec<WateringHistoryEntry> = tables
            .waterings
            .iter()
            .filter_map(|w| {
                tables
                    .plants
                    .iter()
                    .find(|p| p.id == w.plant_id && p.user_id == user_id)
                    .map(|p| WateringHistoryEntry {
                        plant_name: p.name.clone(),
                        watered_at: w.watered_at,
                    })
            })
            .collect();
        entries.sort_by(|a, b| b.watered_at.cmp(&a.watered_at));
        entries.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(entries)
    }

    async fn add_photo(
        &self,
        plant_id: PlantId,
        file_id: &str,
        caption: Option<&str>,
        at: NaiveDateTime,
    ) -> Result<PlantPhoto, ServiceError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        let photo = PlantPhoto {
            id: tables.next_id(),
            plant_id,
            file_id: file_id.to_string(),
            caption: caption.map(str::to_string),
            uploaded_at: at,
        };
        tables.photos.push(photo.clone());
        Ok(photo)
    }

    async fn list_photos(&self, plant_id: PlantId) -> Result<Vec<PlantPhoto>, ServiceError> {
        self.check()?;
        let tables = self.tables.lock().await;
        let mut photos: Vec<PlantPhoto> = tables
            .photos
            .iter()
            .filter(|p| p.plant_id == plant_id)
            .cloned()
            .collect();
        photos.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(photos)
    }

    async fn create_group(
        &self,
        user_id: UserId,
        name: &str,
        now: NaiveDateTime,
    ) -> Result<PlantGroup, ServiceError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        let group = PlantGroup {
            id: tables.next_id(),
            user_id,
            name: name.to_string(),
            created_at: now,
        };
        tables.groups.push(group.clone());
        Ok(group)
    }

    async fn get_group_by_name(
        &self,
        user_id: UserId,
        name: &str,
    ) -> Result<Option<PlantGroup>, ServiceError> {
        self.check()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .groups
            .iter()
            .find(|g| g.user_id == user_id && g.name == name)
            .cloned())
    }

    async fn list_groups(&self, user_id: UserId) -> Result<Vec<GroupSummary>, ServiceError> {
        self.check()?;
        let tables = self.tables.lock().await;
        let mut groups: Vec<GroupSummary> = tables
            .groups
            .iter()
            .filter(|g| g.user_id == user_id)
            .map(|g| GroupSummary {
                id: g.id,
                name: g.name.clone(),
                plant_count: tables
                    .plants
                    .iter()
                    .filter(|p| p.group_id == Some(g.id))
                    .count() as i64,
            })
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn assign_plant_to_group(
        &self,
        user_id: UserId,
        plant_id: PlantId,
        group_id: Option<GroupId>,
    ) -> Result<bool, ServiceError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        match tables
            .plants
            .iter_mut()
            .find(|p| p.user_id == user_id && p.id == plant_id)
        {
            Some(plant) => {
                plant.group_id = group_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn watering_stats(
        &self,
        user_id: UserId,
        now: NaiveDateTime,
    ) -> Result<WateringStats, ServiceError> {
        self.check()?;
        let tables = self.tables.lock().await;
        let owned: Vec<&Plant> = tables
            .plants
            .iter()
            .filter(|p| p.user_id == user_id)
            .collect();
        let per_plant: Vec<(String, i64)> = owned
            .iter()
            .map(|p| {
                let n = tables
                    .waterings
                    .iter()
                    .filter(|w| w.plant_id == p.id)
                    .count() as i64;
                (p.name.clone(), n)
            })
            .collect();
        Ok(WateringStats {
            total_plants: owned.len() as i64,
            total_waterings: per_plant.iter().map(|(_, n)| n).sum(),
            days_active: owned
                .iter()
                .map(|p| p.created_at)
                .min()
                .map(|first| floor_days(now - first).max(0))
                .unwrap_or(0),
            most_watered: most_watered(per_plant).map(|(plant_name, waterings)| MostWatered {
                plant_name,
                waterings,
            }),
        })
    }

    async fn get_user_settings(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserSettings>, ServiceError> {
        self.check()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .settings
            .iter()
            .find(|s| s.user_id == user_id)
            .cloned())
    }

    async fn upsert_notification_settings(
        &self,
        user_id: UserId,
        enabled: bool,
        notification_time: &str,
    ) -> Result<UserSettings, ServiceError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        let settings = UserSettings {
            user_id,
            notifications_enabled: enabled,
            notification_time: notification_time.to_string(),
        };
        tables.settings.retain(|s| s.user_id != user_id);
        tables.settings.push(settings.clone());
        Ok(settings)
    }

    async fn list_notification_opted_in_users(&self) -> Result<Vec<UserId>, ServiceError> {
        self.check()?;
        let tables = self.tables.lock().await;
        let mut users: Vec<UserId> = tables
            .settings
            .iter()
            .filter(|s| s.notifications_enabled)
            .map(|s| s.user_id)
            .collect();
        users.sort();
        Ok(users)
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn deleting_a_plant_cascades() {
        let store = MemoryStore::new();
        let plant = store.add_plant(7, "Fern", 3, None, now()).await.unwrap();
        store.record_watering(plant.id, now()).await.unwrap();
        store.add_photo(plant.id, "file-1", None, now()).await.unwrap();

        assert!(!store.delete_plant(8, plant.id).await.unwrap());
        assert!(store.delete_plant(7, plant.id).await.unwrap());
        assert!(store.list_photos(plant.id).await.unwrap().is_empty());
        assert!(store.watering_history(7, 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lists_latest_watering_per_plant() {
        let store = MemoryStore::new();
        let plant = store.add_plant(7, "Fern", 3, None, now()).await.unwrap();
        store
            .record_watering(plant.id, now() - Duration::days(2))
            .await
            .unwrap();
        store.record_watering(plant.id, now()).await.unwrap();

        let listed = store.list_plants_for_user(7).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].last_watered_at, Some(now()));
    }

    #[tokio::test]
    async fn settings_are_upserted() {
        let store = MemoryStore::new();
        store.upsert_notification_settings(7, true, "09:00").await.unwrap();
        store.upsert_notification_settings(7, false, "10:00").await.unwrap();

        let settings = store.get_user_settings(7).await.unwrap().unwrap();
        assert!(!settings.notifications_enabled);
        assert_eq!(settings.notification_time, "10:00");
        assert!(store.list_notification_opted_in_users().await.unwrap().is_empty());
    }
}
