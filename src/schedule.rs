//! Watering schedule evaluation.
//!
//! Pure functions over `(interval, last watering, now)`. All instants are
//! naive local times; nothing here reads a clock.

use crate::models::{PlantId, PlantSchedule};
use chrono::{Duration, NaiveDateTime};
use std::fmt;

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Sort key given to never-watered plants in the pending list. It ties with
/// plants overdue by exactly one day.
pub const NEVER_WATERED_SORT_KEY: i64 = -1;

/// Whole days in `delta`, rounded toward negative infinity: twelve hours
/// late is already `-1`.
pub fn floor_days(delta: Duration) -> i64 {
    match delta.num_microseconds() {
        Some(micros) => micros.div_euclid(MICROS_PER_DAY),
        None => delta.num_milliseconds().div_euclid(MICROS_PER_DAY / 1000),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WateringStatus {
    NeverWatered,
    Overdue { days: i64 },
    DueToday,
    OnSchedule { days: i64 },
}

impl WateringStatus {
    fn classify(days_until_due: i64) -> WateringStatus {
        match days_until_due {
            d if d < 0 => WateringStatus::Overdue { days: d.abs() },
            0 => WateringStatus::DueToday,
            d => WateringStatus::OnSchedule { days: d },
        }
    }

    /// Never watered, due today, or overdue.
    pub fn is_pending(&self) -> bool {
        !matches!(self, WateringStatus::OnSchedule { .. })
    }

    pub fn sort_key(&self) -> i64 {
        match *self {
            WateringStatus::NeverWatered => NEVER_WATERED_SORT_KEY,
            WateringStatus::Overdue { days } => -days,
            WateringStatus::DueToday => 0,
            WateringStatus::OnSchedule { days } => days,
        }
    }
}

impl fmt::Display for WateringStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WateringStatus::NeverWatered => write!(f, "never watered"),
            WateringStatus::Overdue { days } => write!(f, "overdue by {} days", days),
            WateringStatus::DueToday => write!(f, "due today"),
            WateringStatus::OnSchedule { days } => write!(f, "on schedule, due in {} days", days),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub status: WateringStatus,
    pub days_since_watered: Option<i64>,
    pub next_due: Option<NaiveDateTime>,
    pub days_until_due: Option<i64>,
}

pub fn evaluate(
    interval_days: i32,
    last_watered: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Evaluation {
    let Some(last) = last_watered else {
        return Evaluation {
            status: WateringStatus::NeverWatered,
            days_since_watered: None,
            next_due: None,
            days_until_due: None,
        };
    };

    let next_due = last
        .checked_add_signed(Duration::days(i64::from(interval_days)))
        .unwrap_or(NaiveDateTime::MAX);
    let days_until_due = floor_days(next_due - now);

    Evaluation {
        status: WateringStatus::classify(days_until_due),
        days_since_watered: Some(floor_days(now - last)),
        next_due: Some(next_due),
        days_until_due: Some(days_until_due),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPlant {
    pub plant_id: PlantId,
    pub name: String,
    pub status: WateringStatus,
}

/// Plants that are never watered or due today or earlier, most urgent
/// first. The sort is stable, so a never-watered plant and a plant overdue
/// by one day keep the order the store returned them in.
pub fn pending_plants(plants: &[PlantSchedule], now: NaiveDateTime) -> Vec<PendingPlant> {
    let mut pending: Vec<PendingPlant> = plants
        .iter()
        .filter_map(|plant| {
            let status = evaluate(plant.interval_days, plant.last_watered_at, now).status;
            status.is_pending().then(|| PendingPlant {
                plant_id: plant.id,
                name: plant.name.clone(),
                status,
            })
        })
        .collect();
    pending.sort_by_key(|plant| plant.status.sort_key());
    pending
}

/// Names of the pending plants in the order the store returned them.
pub fn pending_names(plants: &[PlantSchedule], now: NaiveDateTime) -> Vec<&str> {
    plants
        .iter()
        .filter(|plant| {
            evaluate(plant.interval_days, plant.last_watered_at, now)
                .status
                .is_pending()
        })
        .map(|plant| plant.name.as_str())
        .collect()
}
