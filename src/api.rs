use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::runner;
use crate::scheduler::RunReport;

pub struct AppState {
    pub config: AppConfig,
    running: AtomicBool,
    last_report: RwLock<Option<RunReport>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
            last_report: RwLock::new(None),
        }
    }
}

/// Marks a run as active until dropped, including when the run panics.
struct RunGuard {
    state: Arc<AppState>,
}

impl RunGuard {
    fn acquire(state: &Arc<AppState>) -> Option<Self> {
        if state.running.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(Self {
            state: state.clone(),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::SeqCst);
    }
}

#[derive(Serialize)]
pub struct ScrapeResponse {
    pub run_id: Option<String>,
    pub message: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub last_run: Option<RunReport>,
}

/// Starts a run in the background. Only one run may be active at a time.
pub async fn trigger_scrape(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ScrapeResponse>) {
    let Some(guard) = RunGuard::acquire(&state) else {
        return (
            StatusCode::CONFLICT,
            Json(ScrapeResponse {
                run_id: None,
                message: "A scrape is already running".to_string(),
            }),
        );
    };

    let run_id = Uuid::new_v4().to_string();
    info!(run_id = %run_id, "scrape endpoint triggered");

    let task_run_id = run_id.clone();
    tokio::spawn(async move {
        let state = guard.state.clone();
        match runner::run_once(&state.config).await {
            Ok(report) => {
                info!(run_id = %task_run_id, processed = report.processed, "scrape completed");
                *state.last_report.write().await = Some(report);
            }
            Err(e) => error!(run_id = %task_run_id, error = %e, "scrape failed"),
        }
        drop(guard);
    });

    (
        StatusCode::ACCEPTED,
        Json(ScrapeResponse {
            run_id: Some(run_id),
            message: "Scrape started".to_string(),
        }),
    )
}

pub async fn scrape_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.running.load(Ordering::SeqCst),
        last_run: state.last_report.read().await.clone(),
    })
}
