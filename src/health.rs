use crate::dispatcher::{DispatcherState, ScanReport};
use crate::error_handler::ServiceError;
use crate::store::PlantStore;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Local, NaiveDateTime};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Snapshot {
    dispatcher: DispatcherState,
    last_scan: Option<ScanReport>,
    last_health_check: Option<NaiveDateTime>,
}

/// Liveness data shared by the dispatcher (writer) and the health endpoint
/// (reader). Constructed in `main` and handed to both.
#[derive(Debug)]
pub struct HealthState {
    started_at: DateTime<Local>,
    snapshot: RwLock<Snapshot>,
}

impl HealthState {
    pub fn new(started_at: DateTime<Local>) -> Self {
        HealthState {
            started_at,
            snapshot: RwLock::new(Snapshot {
                dispatcher: DispatcherState::Sleeping,
                last_scan: None,
                last_health_check: None,
            }),
        }
    }

    pub async fn set_dispatcher_state(&self, state: DispatcherState) {
        self.snapshot.write().await.dispatcher = state;
    }

    pub async fn record_scan(&self, report: ScanReport) {
        self.snapshot.write().await.last_scan = Some(report);
    }

    pub async fn dispatcher_state(&self) -> DispatcherState {
        self.snapshot.read().await.dispatcher
    }

    pub async fn last_scan(&self) -> Option<ScanReport> {
        self.snapshot.read().await.last_scan.clone()
    }

    async fn record_health_check(&self, at: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut snapshot = self.snapshot.write().await;
        snapshot.last_health_check.replace(at)
    }
}

pub async fn health_check_handler(
    health: web::Data<HealthState>,
    store: web::Data<dyn PlantStore>,
) -> Result<HttpResponse, ServiceError> {
    let now = Local::now();
    let previous_check = health.record_health_check(now.naive_local()).await;

    if let Err(e) = store.ping().await {
        log::error!("Health check could not reach the store: {}", e);
        return Err(ServiceError::PoolError(
            "Failed to check the plant store".to_string(),
        ));
    }

    let snapshot = health.snapshot.read().await.clone();
    log::debug!("Health check answered, previous one at {:?}", previous_check);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "bot": "running",
        "timestamp": now.naive_local(),
        "pid": std::process::id(),
        "uptime_seconds": (now - health.started_at).num_seconds(),
        "database": "ok",
        "dispatcher": snapshot.dispatcher,
        "last_scan": snapshot.last_scan,
        "previous_health_check": previous_check,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use actix_web::{test, App};
    use std::sync::Arc;

    fn app_data(store: Arc<MemoryStore>) -> (web::Data<HealthState>, web::Data<dyn PlantStore>) {
        let store: Arc<dyn PlantStore> = store;
        (
            web::Data::new(HealthState::new(Local::now())),
            web::Data::from(store),
        )
    }

    #[actix_web::test]
    async fn reports_ok_when_the_store_answers() {
        let (health, store) = app_data(Arc::new(MemoryStore::new()));
        let app = test::init_service(
            App::new()
                .app_data(health.clone())
                .app_data(store)
                .route("/health", web::get().to(health_check_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["bot"], "running");
        assert_eq!(body["dispatcher"], "sleeping");
        assert!(body["last_scan"].is_null());
        assert!(body["previous_health_check"].is_null());

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(!body["previous_health_check"].is_null());
    }

    #[actix_web::test]
    async fn reports_unavailable_when_the_store_is_down() {
        let memory = Arc::new(MemoryStore::new());
        memory.set_unavailable(true);
        let (health, store) = app_data(memory);
        let app = test::init_service(
            App::new()
                .app_data(health)
                .app_data(store)
                .route("/health", web::get().to(health_check_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::SERVICE_UNAVAILABLE);
    }
}
