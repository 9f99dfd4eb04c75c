use crate::db::{PgPool, SqlitePool};
use crate::error_handler::ServiceError;
use crate::models::{
    GroupId, GroupSummary, MostWatered, NewPlant, NewPlantGroup, NewPlantPhoto,
    NewWateringEvent, Plant, PlantGroup, PlantId, PlantPhoto, PlantSchedule, UserId,
    UserSettings, WateringEvent, WateringHistoryEntry, WateringStats,
};
use crate::schedule::floor_days;
use crate::schema::{plant_groups, plant_photos, plants, user_settings, watering_log};
use crate::store::{most_watered, PlantStore};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::dsl::{count, max, min};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use std::collections::HashMap;

/// Plant store over a pooled diesel-async connection. The same queries run
/// against PostgreSQL and SQLite; the backend is fixed by the pool type.
#[derive(Clone)]
pub struct DieselStore<P> {
    pool: P,
}

impl<P> DieselStore<P> {
    pub fn new(pool: P) -> Self {
        DieselStore { pool }
    }
}

pub type PgStore = DieselStore<PgPool>;
pub type SqliteStore = DieselStore<SqlitePool>;

// diesel resolves query support per backend at compile time, so the body is
// stamped out once per pool type.
macro_rules! impl_plant_store {
    ($pool:ty) => {
        #[async_trait]
        impl PlantStore for DieselStore<$pool> {
            async fn add_plant(
                &self,
                user_id: UserId,
                name: &str,
                interval_days: i32,
                plant_type: Option<&str>,
                now: NaiveDateTime,
            ) -> Result<Plant, ServiceError> {
                let new_plant = NewPlant {
                    user_id,
                    name: name.to_string(),
                    interval_days,
                    plant_type: plant_type.map(str::to_string),
                    created_at: now,
                };

                let mut conn = self.pool.get().await?;

                let plant = diesel::insert_into(plants::table)
                    .values(&new_plant)
                    .get_result::<Plant>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                Ok(plant)
            }

            async fn list_plants_for_user(
                &self,
                user_id: UserId,
            ) -> Result<Vec<PlantSchedule>, ServiceError> {
                let mut conn = self.pool.get().await?;

                let plant_list = plants::table
                    .filter(plants::user_id.eq(user_id))
                    .order(plants::name.asc())
                    .select(Plant::as_select())
                    .load::<Plant>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                if plant_list.is_empty() {
                    return Ok(Vec::new());
                }

                let plant_ids: Vec<PlantId> = plant_list.iter().map(|p| p.id).collect();
                let last_waterings = watering_log::table
                    .filter(watering_log::plant_id.eq_any(plant_ids))
                    .group_by(watering_log::plant_id)
                    .select((watering_log::plant_id, max(watering_log::watered_at)))
                    .load::<(PlantId, Option<NaiveDateTime>)>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?
                    .into_iter()
                    .collect::<HashMap<_, _>>();

                Ok(plant_list
                    .into_iter()
                    .map(|plant| {
                        let last = last_waterings.get(&plant.id).copied().flatten();
                        PlantSchedule::from_plant(plant, last)
                    })
                    .collect())
            }

            async fn get_plant(
                &self,
                user_id: UserId,
                plant_id: PlantId,
            ) -> Result<Option<Plant>, ServiceError> {
                let mut conn = self.pool.get().await?;

                let plant = plants::table
                    .filter(plants::user_id.eq(user_id))
                    .filter(plants::id.eq(plant_id))
                    .select(Plant::as_select())
                    .first::<Plant>(&mut conn)
                    .await
                    .optional()
                    .map_err(ServiceError::from)?;

                Ok(plant)
            }

            async fn get_plant_by_name(
                &self,
                user_id: UserId,
                name: &str,
            ) -> Result<Option<Plant>, ServiceError> {
                let mut conn = self.pool.get().await?;

                let plant = plants::table
                    .filter(plants::user_id.eq(user_id))
                    .filter(plants::name.eq(name.to_string()))
                    .select(Plant::as_select())
                    .first::<Plant>(&mut conn)
                    .await
                    .optional()
                    .map_err(ServiceError::from)?;

                Ok(plant)
            }

            async fn delete_plant(
                &self,
                user_id: UserId,
                plant_id: PlantId,
            ) -> Result<bool, ServiceError> {
                let mut conn = self.pool.get().await?;

                // Children first: the SQLite backend may run without foreign key
                // enforcement. One transaction, so a failed delete keeps the history.
                conn.transaction::<bool, ServiceError, _>(|conn| {
                    async move {
                        let owned = plants::table
                            .filter(plants::user_id.eq(user_id))
                            .filter(plants::id.eq(plant_id))
                            .count()
                            .get_result::<i64>(conn)
                            .await?;
                        if owned == 0 {
                            return Ok(false);
                        }

                        diesel::delete(
                            watering_log::table.filter(watering_log::plant_id.eq(plant_id)),
                        )
                        .execute(conn)
                        .await?;
                        diesel::delete(
                            plant_photos::table.filter(plant_photos::plant_id.eq(plant_id)),
                        )
                        .execute(conn)
                        .await?;
                        let num_deleted = diesel::delete(
                            plants::table
                                .filter(plants::user_id.eq(user_id))
                                .filter(plants::id.eq(plant_id)),
                        )
                        .execute(conn)
                        .await?;

                        Ok(num_deleted > 0)
                    }
                    .scope_boxed()
                })
                .await
            }

            async fn record_watering(
                &self,
                plant_id: PlantId,
                at: NaiveDateTime,
            ) -> Result<WateringEvent, ServiceError> {
                let mut conn = self.pool.get().await?;

                let event = diesel::insert_into(watering_log::table)
                    .values(&NewWateringEvent {
                        plant_id,
                        watered_at: at,
                    })
                    .get_result::<WateringEvent>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                Ok(event)
            }

            async fn watering_history(
                &self,
                user_id: UserId,
                limit: i64,
            ) -> Result<Vec<WateringHistoryEntry>, ServiceError> {
                let mut conn = self.pool.get().await?;

                let rows = watering_log::table
                    .inner_join(plants::table)
                    .filter(plants::user_id.eq(user_id))
                    .order(watering_log::watered_at.desc())
                    .limit(limit)
                    .select((plants::name, watering_log::watered_at))
                    .load::<(String, NaiveDateTime)>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                Ok(rows
                    .into_iter()
                    .map(|(plant_name, watered_at)| WateringHistoryEntry {
                        plant_name,
                        watered_at,
                    })
                    .collect())
            }

            async fn add_photo(
                &self,
                plant_id: PlantId,
                file_id: &str,
                caption: Option<&str>,
                at: NaiveDateTime,
            ) -> Result<PlantPhoto, ServiceError> {
                let new_photo = NewPlantPhoto {
                    plant_id,
                    file_id: file_id.to_string(),
                    caption: caption.map(str::to_string),
                    uploaded_at: at,
                };

                let mut conn = self.pool.get().await?;

                let photo = diesel::insert_into(plant_photos::table)
                    .values(&new_photo)
                    .get_result::<PlantPhoto>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                Ok(photo)
            }

            async fn list_photos(&self, plant_id: PlantId) -> Result<Vec<PlantPhoto>, ServiceError> {
                let mut conn = self.pool.get().await?;

                let photos = plant_photos::table
                    .filter(plant_photos::plant_id.eq(plant_id))
                    .order(plant_photos::uploaded_at.desc())
                    .select(PlantPhoto::as_select())
                    .load::<PlantPhoto>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                Ok(photos)
            }

            async fn create_group(
                &self,
                user_id: UserId,
                name: &str,
                now: NaiveDateTime,
            ) -> Result<PlantGroup, ServiceError> {
                let new_group = NewPlantGroup {
                    user_id,
                    name: name.to_string(),
                    created_at: now,
                };

                let mut conn = self.pool.get().await?;

                let group = diesel::insert_into(plant_groups::table)
                    .values(&new_group)
                    .get_result::<PlantGroup>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                Ok(group)
            }

            async fn get_group_by_name(
                &self,
                user_id: UserId,
                name: &str,
            ) -> Result<Option<PlantGroup>, ServiceError> {
                let mut conn = self.pool.get().await?;

                let group = plant_groups::table
                    .filter(plant_groups::user_id.eq(user_id))
                    .filter(plant_groups::name.eq(name.to_string()))
                    .select(PlantGroup::as_select())
                    .first::<PlantGroup>(&mut conn)
                    .await
                    .optional()
                    .map_err(ServiceError::from)?;

                Ok(group)
            }

            async fn list_groups(&self, user_id: UserId) -> Result<Vec<GroupSummary>, ServiceError> {
                let mut conn = self.pool.get().await?;

                let groups = plant_groups::table
                    .filter(plant_groups::user_id.eq(user_id))
                    .order(plant_groups::name.asc())
                    .select(PlantGroup::as_select())
                    .load::<PlantGroup>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                let counts = plants::table
                    .filter(plants::user_id.eq(user_id))
                    .filter(plants::group_id.is_not_null())
                    .group_by(plants::group_id)
                    .select((plants::group_id, count(plants::id)))
                    .load::<(Option<GroupId>, i64)>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?
                    .into_iter()
                    .filter_map(|(group_id, plant_count)| group_id.map(|id| (id, plant_count)))
                    .collect::<HashMap<_, _>>();

                Ok(groups
                    .into_iter()
                    .map(|group| GroupSummary {
                        plant_count: counts.get(&group.id).copied().unwrap_or(0),
                        id: group.id,
                        name: group.name,
                    })
                    .collect())
            }

            async fn assign_plant_to_group(
                &self,
                user_id: UserId,
                plant_id: PlantId,
                group_id: Option<GroupId>,
            ) -> Result<bool, ServiceError> {
                let mut conn = self.pool.get().await?;

                let num_updated = diesel::update(
                    plants::table
                        .filter(plants::user_id.eq(user_id))
                        .filter(plants::id.eq(plant_id)),
                )
                .set(plants::group_id.eq(group_id))
                .execute(&mut conn)
                .await
                .map_err(ServiceError::from)?;

                Ok(num_updated > 0)
            }

            async fn watering_stats(
                &self,
                user_id: UserId,
                now: NaiveDateTime,
            ) -> Result<WateringStats, ServiceError> {
                let mut conn = self.pool.get().await?;

                let total_plants = plants::table
                    .filter(plants::user_id.eq(user_id))
                    .count()
                    .get_result::<i64>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                let first_plant_at = plants::table
                    .filter(plants::user_id.eq(user_id))
                    .select(min(plants::created_at))
                    .get_result::<Option<NaiveDateTime>>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                let per_plant = watering_log::table
                    .inner_join(plants::table)
                    .filter(plants::user_id.eq(user_id))
                    .group_by((plants::id, plants::name))
                    .select((plants::name, count(watering_log::id)))
                    .load::<(String, i64)>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                let total_waterings: i64 = per_plant.iter().map(|(_, n)| n).sum();

                Ok(WateringStats {
                    total_plants,
                    total_waterings,
                    days_active: first_plant_at
                        .map(|first| floor_days(now - first).max(0))
                        .unwrap_or(0),
                    most_watered: most_watered(per_plant).map(|(plant_name, waterings)| {
                        MostWatered {
                            plant_name,
                            waterings,
                        }
                    }),
                })
            }

            async fn get_user_settings(
                &self,
                user_id: UserId,
            ) -> Result<Option<UserSettings>, ServiceError> {
                let mut conn = self.pool.get().await?;

                let settings = user_settings::table
                    .filter(user_settings::user_id.eq(user_id))
                    .select(UserSettings::as_select())
                    .first::<UserSettings>(&mut conn)
                    .await
                    .optional()
                    .map_err(ServiceError::from)?;

                Ok(settings)
            }

            async fn upsert_notification_settings(
                &self,
                user_id: UserId,
                enabled: bool,
                notification_time: &str,
            ) -> Result<UserSettings, ServiceError> {
                let settings = UserSettings {
                    user_id,
                    notifications_enabled: enabled,
                    notification_time: notification_time.to_string(),
                };

                let mut conn = self.pool.get().await?;

                let stored = diesel::insert_into(user_settings::table)
                    .values(&settings)
                    .on_conflict(user_settings::user_id)
                    .do_update()
                    .set((
                        user_settings::notifications_enabled.eq(enabled),
                        user_settings::notification_time.eq(notification_time.to_string()),
                    ))
                    .get_result::<UserSettings>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                Ok(stored)
            }

            async fn list_notification_opted_in_users(&self) -> Result<Vec<UserId>, ServiceError> {
                let mut conn = self.pool.get().await?;

                let users = user_settings::table
                    .filter(user_settings::notifications_enabled.eq(true))
                    .order(user_settings::user_id.asc())
                    .select(user_settings::user_id)
                    .load::<UserId>(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                Ok(users)
            }

            async fn ping(&self) -> Result<(), ServiceError> {
                let mut conn = self.pool.get().await?;

                diesel::sql_query("SELECT 1")
                    .execute(&mut conn)
                    .await
                    .map_err(ServiceError::from)?;

                Ok(())
            }
        }
    };
}

impl_plant_store!(PgPool);
impl_plant_store!(SqlitePool);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_sqlite_pool;
    use crate::schema::user_settings;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 7, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    async fn sqlite_store(name: &str) -> SqliteStore {
        let path = std::env::temp_dir().join(format!(
            "plant-store-{}-{}.db",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let pool = create_sqlite_pool(&path.to_string_lossy()).await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn duplicate_plant_names_are_conflicts_per_user() {
        let store = sqlite_store("duplicates").await;
        store.add_plant(1, "Fern", 3, None, now()).await.unwrap();

        let err = store.add_plant(1, "Fern", 5, None, now()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        // Another user may reuse the name.
        store.add_plant(2, "Fern", 5, None, now()).await.unwrap();
        assert_eq!(store.list_plants_for_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listing_carries_the_latest_watering() {
        let store = sqlite_store("latest").await;
        let fern = store.add_plant(1, "Fern", 3, Some("fern"), now()).await.unwrap();
        store.add_plant(1, "Aloe", 10, None, now()).await.unwrap();
        let newest = now() - Duration::hours(2);
        store.record_watering(fern.id, newest).await.unwrap();
        store
            .record_watering(fern.id, now() - Duration::days(4))
            .await
            .unwrap();

        let plants = store.list_plants_for_user(1).await.unwrap();
        let names: Vec<&str> = plants.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Aloe", "Fern"]);
        assert_eq!(plants[0].last_watered_at, None);
        assert_eq!(plants[1].last_watered_at, Some(newest));
        assert_eq!(plants[1].plant_type.as_deref(), Some("fern"));

        let history = store.watering_history(1, 20).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].watered_at, newest);
    }

    #[tokio::test]
    async fn settings_upsert_keeps_one_row() {
        let store = sqlite_store("settings").await;
        store.upsert_notification_settings(1, true, "09:00").await.unwrap();
        store.upsert_notification_settings(1, false, "10:00").await.unwrap();
        let stored = store
            .upsert_notification_settings(1, true, "11:00")
            .await
            .unwrap();
        assert_eq!(stored.notification_time, "11:00");

        let mut conn = store.pool.get().await.unwrap();
        let rows = user_settings::table
            .count()
            .get_result::<i64>(&mut conn)
            .await
            .unwrap();
        drop(conn);
        assert_eq!(rows, 1);
        assert_eq!(store.list_notification_opted_in_users().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn deleting_a_plant_removes_its_history_and_photos() {
        let store = sqlite_store("cascade").await;
        let fern = store.add_plant(1, "Fern", 3, None, now()).await.unwrap();
        let ivy = store.add_plant(1, "Ivy", 2, None, now()).await.unwrap();
        store.record_watering(fern.id, now()).await.unwrap();
        store.record_watering(ivy.id, now()).await.unwrap();
        store.add_photo(fern.id, "file-1", None, now()).await.unwrap();

        assert!(!store.delete_plant(2, fern.id).await.unwrap());
        assert!(store.delete_plant(1, fern.id).await.unwrap());

        assert!(store.get_plant(1, fern.id).await.unwrap().is_none());
        assert!(store.list_photos(fern.id).await.unwrap().is_empty());
        let history = store.watering_history(1, 20).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].plant_name, "Ivy");
    }

    #[tokio::test]
    async fn groups_and_stats_come_from_sql() {
        let store = sqlite_store("stats").await;
        let fern = store
            .add_plant(1, "Fern", 3, None, now() - Duration::days(10))
            .await
            .unwrap();
        let ivy = store.add_plant(1, "Ivy", 2, None, now()).await.unwrap();
        for _ in 0..2 {
            store.record_watering(ivy.id, now()).await.unwrap();
        }
        store.record_watering(fern.id, now()).await.unwrap();

        let group = store.create_group(1, "Balcony", now()).await.unwrap();
        assert!(store
            .assign_plant_to_group(1, fern.id, Some(group.id))
            .await
            .unwrap());
        let groups = store.list_groups(1).await.unwrap();
        assert_eq!(groups[0].plant_count, 1);

        let stats = store.watering_stats(1, now()).await.unwrap();
        assert_eq!(stats.total_plants, 2);
        assert_eq!(stats.total_waterings, 3);
        assert_eq!(stats.days_active, 10);
        assert_eq!(
            stats.most_watered,
            Some(MostWatered {
                plant_name: "Ivy".to_string(),
                waterings: 2
            })
        );
        store.ping().await.unwrap();
    }
}
