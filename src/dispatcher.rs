//! Periodic watering reminders.
//!
//! The dispatcher sleeps for a fixed period, then scans every opted-in user
//! and sends one summary per user with pending plants. Nothing is persisted
//! between scans, so a plant that stays overdue is reminded on every tick.

use crate::error_handler::ServiceError;
use crate::health::HealthState;
use crate::messenger::{Messenger, MessengerError};
use crate::models::UserId;
use crate::schedule::pending_names;
use crate::store::PlantStore;
use crate::telegram::escape_markdown;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Source of "now" and of waiting, replaceable in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
    async fn sleep(&self, period: Duration);
}

/// Naive local wall clock; no timezone handling.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    async fn sleep(&self, period: Duration) {
        tokio::time::sleep(period).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherState {
    Sleeping,
    Scanning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub started_at: NaiveDateTime,
    pub users_scanned: usize,
    pub notified: usize,
    pub failed: usize,
}

pub struct NotificationDispatcher {
    store: Arc<dyn PlantStore>,
    messenger: Arc<dyn Messenger>,
    clock: Arc<dyn Clock>,
    health: Arc<HealthState>,
    period: Duration,
    send_timeout: Duration,
}

pub fn reminder_text(pending: &[&str]) -> String {
    let mut message = String::from("🔔 *Watering reminder:*\n\n");
    message.push_str("These plants need water:\n");
    for name in pending {
        message.push_str(&format!("💧 {}\n", escape_markdown(name)));
    }
    message.push_str("\nUse /water to log a watering.");
    message
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn PlantStore>,
        messenger: Arc<dyn Messenger>,
        clock: Arc<dyn Clock>,
        health: Arc<HealthState>,
        period: Duration,
        send_timeout: Duration,
    ) -> Self {
        NotificationDispatcher {
            store,
            messenger,
            clock,
            health,
            period,
            send_timeout,
        }
    }

    /// One pass over all opted-in users. A store failure aborts the whole
    /// pass; a delivery failure only affects its own user.
    pub async fn scan(&self) -> Result<ScanReport, ServiceError> {
        let started_at = self.clock.now();
        let users = self.store.list_notification_opted_in_users().await?;

        let mut outbox: Vec<(UserId, String)> = Vec::new();
        for user_id in &users {
            let plants = self.store.list_plants_for_user(*user_id).await?;
            let pending = pending_names(&plants, started_at);
            if !pending.is_empty() {
                outbox.push((*user_id, reminder_text(&pending)));
            }
        }

        let delivered = join_all(
            outbox
                .iter()
                .map(|(user_id, text)| self.deliver(*user_id, text)),
        )
        .await;
        let notified = delivered.iter().filter(|ok| **ok).count();

        Ok(ScanReport {
            started_at,
            users_scanned: users.len(),
            notified,
            failed: delivered.len() - notified,
        })
    }

    async fn deliver(&self, user_id: UserId, text: &str) -> bool {
        let outcome = tokio::time::timeout(
            self.send_timeout,
            self.messenger.send_message(user_id, text),
        )
        .await
        .unwrap_or(Err(MessengerError::Timeout(self.send_timeout)));

        match outcome {
            Ok(()) => true,
            Err(e) => {
                log::error!("Error sending notification to {}: {}", user_id, e);
                false
            }
        }
    }

    /// Sleep, scan, repeat. Errors are logged and the next tick proceeds.
    pub async fn run(self: Arc<Self>) {
        log::info!(
            "Notification dispatcher running every {}s",
            self.period.as_secs()
        );
        loop {
            self.health
                .set_dispatcher_state(DispatcherState::Sleeping)
                .await;
            self.clock.sleep(self.period).await;

            self.health
                .set_dispatcher_state(DispatcherState::Scanning)
                .await;
            match self.scan().await {
                Ok(report) => {
                    log::info!(
                        "Notification scan done: {} users, {} notified, {} failed",
                        report.users_scanned,
                        report.notified,
                        report.failed
                    );
                    self.health.record_scan(report).await;
                }
                Err(e) => log::error!("Error in notification loop: {}", e),
            }
        }
    }
}

/// Keeps the dispatcher alive: if its task ever panics or returns, it is
/// started again after a short delay.
pub fn run_supervised(dispatcher: Arc<NotificationDispatcher>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match tokio::spawn(dispatcher.clone().run()).await {
                Ok(()) => log::error!("Notification dispatcher exited unexpectedly"),
                Err(e) => log::error!("Notification dispatcher crashed: {}", e),
            }
            log::info!("Restarting notification dispatcher...");
            dispatcher.clock.sleep(RESTART_DELAY).await;
        }
    })
}
