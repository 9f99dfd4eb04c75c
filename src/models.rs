use crate::schema::{plant_groups, plant_photos, plants, user_settings, watering_log};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

// Chat platform user ids do not fit in 32 bits.
pub type UserId = i64;
pub type PlantId = i32;
pub type GroupId = i32;

pub const DEFAULT_NOTIFICATION_TIME: &str = "09:00";

// --- Plant Model ---
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = plants)]
#[diesel(check_for_backend(diesel::pg::Pg, diesel::sqlite::Sqlite))]
pub struct Plant {
    pub id: PlantId,
    pub user_id: UserId,
    pub name: String,
    #[diesel(column_name = watering_frequency_days)]
    pub interval_days: i32,
    pub plant_type: Option<String>,
    pub group_id: Option<GroupId>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = plants)]
pub struct NewPlant {
    pub user_id: UserId,
    pub name: String,
    #[diesel(column_name = watering_frequency_days)]
    pub interval_days: i32,
    pub plant_type: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A plant joined with its most recent watering: the row shape the schedule
/// evaluator and the dispatcher work on.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlantSchedule {
    pub id: PlantId,
    pub name: String,
    pub interval_days: i32,
    pub plant_type: Option<String>,
    pub group_id: Option<GroupId>,
    pub last_watered_at: Option<NaiveDateTime>,
}

impl PlantSchedule {
    pub fn from_plant(plant: Plant, last_watered_at: Option<NaiveDateTime>) -> Self {
        PlantSchedule {
            id: plant.id,
            name: plant.name,
            interval_days: plant.interval_days,
            plant_type: plant.plant_type,
            group_id: plant.group_id,
            last_watered_at,
        }
    }
}

// --- WateringEvent Model ---
#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = watering_log)]
#[diesel(belongs_to(Plant))]
#[diesel(check_for_backend(diesel::pg::Pg, diesel::sqlite::Sqlite))]
pub struct WateringEvent {
    pub id: i32,
    pub plant_id: PlantId,
    pub watered_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = watering_log)]
pub struct NewWateringEvent {
    pub plant_id: PlantId,
    pub watered_at: NaiveDateTime,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WateringHistoryEntry {
    pub plant_name: String,
    pub watered_at: NaiveDateTime,
}

// --- PlantPhoto Model ---
#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = plant_photos)]
#[diesel(belongs_to(Plant))]
#[diesel(check_for_backend(diesel::pg::Pg, diesel::sqlite::Sqlite))]
pub struct PlantPhoto {
    pub id: i32,
    pub plant_id: PlantId,
    /// Chat platform file reference; the image bytes are never stored here.
    pub file_id: String,
    pub caption: Option<String>,
    pub uploaded_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = plant_photos)]
pub struct NewPlantPhoto {
    pub plant_id: PlantId,
    pub file_id: String,
    pub caption: Option<String>,
    pub uploaded_at: NaiveDateTime,
}

// --- PlantGroup Model ---
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = plant_groups)]
#[diesel(check_for_backend(diesel::pg::Pg, diesel::sqlite::Sqlite))]
pub struct PlantGroup {
    pub id: GroupId,
    pub user_id: UserId,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = plant_groups)]
pub struct NewPlantGroup {
    pub user_id: UserId,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub id: GroupId,
    pub name: String,
    pub plant_count: i64,
}

// --- UserSettings Model ---
#[derive(Queryable, Selectable, Identifiable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = user_settings)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg, diesel::sqlite::Sqlite))]
pub struct UserSettings {
    pub user_id: UserId,
    pub notifications_enabled: bool,
    /// Preferred reminder time. Kept for display only: the dispatcher runs on
    /// a global period.
    pub notification_time: String,
}

// --- Stats ---
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MostWatered {
    pub plant_name: String,
    pub waterings: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WateringStats {
    pub total_plants: i64,
    pub total_waterings: i64,
    pub days_active: i64,
    pub most_watered: Option<MostWatered>,
}

impl WateringStats {
    pub fn average_per_plant(&self) -> Option<f64> {
        if self.total_plants > 0 {
            Some(self.total_waterings as f64 / self.total_plants as f64)
        } else {
            None
        }
    }
}
