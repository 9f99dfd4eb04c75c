pub mod diesel_store;
#[cfg(test)]
pub mod memory;

use crate::error_handler::ServiceError;
use crate::models::{
    GroupId, GroupSummary, Plant, PlantGroup, PlantId, PlantPhoto, PlantSchedule, UserId,
    UserSettings, WateringEvent, WateringHistoryEntry, WateringStats,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;

pub use diesel_store::{PgStore, SqliteStore};

pub const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// Persistence of plants, watering events, photos, groups and per-user
/// notification settings.
///
/// Every call checks out its own connection and commits on its own; nothing
/// spans calls. Timestamps are supplied by the caller so that the clock stays
/// injectable.
#[async_trait]
pub trait PlantStore: Send + Sync {
    async fn add_plant(
        &self,
        user_id: UserId,
        name: &str,
        interval_days: i32,
        plant_type: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<Plant, ServiceError>;

    /// The user's plants with their most recent watering, ordered by name.
    async fn list_plants_for_user(&self, user_id: UserId)
        -> Result<Vec<PlantSchedule>, ServiceError>;

    async fn get_plant(
        &self,
        user_id: UserId,
        plant_id: PlantId,
    ) -> Result<Option<Plant>, ServiceError>;

    async fn get_plant_by_name(
        &self,
        user_id: UserId,
        name: &str,
    ) -> Result<Option<Plant>, ServiceError>;

    /// Removes the plant together with its watering events and photos.
    /// Returns `false` when the user owns no such plant.
    async fn delete_plant(&self, user_id: UserId, plant_id: PlantId) -> Result<bool, ServiceError>;

    async fn record_watering(
        &self,
        plant_id: PlantId,
        at: NaiveDateTime,
    ) -> Result<WateringEvent, ServiceError>;

    /// Most recent waterings across all of the user's plants, newest first.
    async fn watering_history(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<WateringHistoryEntry>, ServiceError>;

    async fn add_photo(
        &self,
        plant_id: PlantId,
        file_id: &str,
        caption: Option<&str>,
        at: NaiveDateTime,
    ) -> Result<PlantPhoto, ServiceError>;

    /// Photos of a plant, newest first.
    async fn list_photos(&self, plant_id: PlantId) -> Result<Vec<PlantPhoto>, ServiceError>;

    async fn create_group(
        &self,
        user_id: UserId,
        name: &str,
        now: NaiveDateTime,
    ) -> Result<PlantGroup, ServiceError>;

    async fn get_group_by_name(
        &self,
        user_id: UserId,
        name: &str,
    ) -> Result<Option<PlantGroup>, ServiceError>;

    async fn list_groups(&self, user_id: UserId) -> Result<Vec<GroupSummary>, ServiceError>;

    /// The only in-place mutation a plant supports. `None` clears the group.
    async fn assign_plant_to_group(
        &self,
        user_id: UserId,
        plant_id: PlantId,
        group_id: Option<GroupId>,
    ) -> Result<bool, ServiceError>;

    async fn watering_stats(
        &self,
        user_id: UserId,
        now: NaiveDateTime,
    ) -> Result<WateringStats, ServiceError>;

    async fn get_user_settings(&self, user_id: UserId)
        -> Result<Option<UserSettings>, ServiceError>;

    /// Creates or replaces the single settings row of the user.
    async fn upsert_notification_settings(
        &self,
        user_id: UserId,
        enabled: bool,
        notification_time: &str,
    ) -> Result<UserSettings, ServiceError>;

    async fn list_notification_opted_in_users(&self) -> Result<Vec<UserId>, ServiceError>;

    async fn ping(&self) -> Result<(), ServiceError>;
}

/// Picks the most watered plant; ties go to the alphabetically first name so
/// the answer does not depend on row order.
pub(crate) fn most_watered(counts: Vec<(String, i64)>) -> Option<(String, i64)> {
    counts
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .fold(None, |best, (name, count)| match best {
            Some((best_name, best_count))
                if best_count > count || (best_count == count && best_name <= name) =>
            {
                Some((best_name, best_count))
            }
            _ => Some((name, count)),
        })
}
