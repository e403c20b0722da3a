//! HTTP control surface: health probe, manual trigger and status.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use compliance_core::ScanRequest;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::coordinator::{AgentStatus, Coordinator};
use crate::error::AgentError;

/// Agent version reported by `/health`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
struct ControlState {
    coordinator: Coordinator,
    default_profile: Arc<str>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct ScanParams {
    profile: Option<String>,
    /// Datastream file name or absolute path; auto-detected when absent
    datastream: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub id: String,
    pub title: String,
    pub description: String,
}

/// Common SCAP Security Guide profiles offered to operators
const PROFILES: [(&str, &str, &str); 5] = [
    (
        "xccdf_org.ssgproject.content_profile_cis_level1_server",
        "CIS Level 1 Server",
        "CIS Benchmark Level 1 profile for servers",
    ),
    (
        "xccdf_org.ssgproject.content_profile_cis_level1_workstation",
        "CIS Level 1 Workstation",
        "CIS Benchmark Level 1 profile for workstations",
    ),
    (
        "xccdf_org.ssgproject.content_profile_cis_level2_server",
        "CIS Level 2 Server",
        "CIS Benchmark Level 2 profile for servers",
    ),
    (
        "xccdf_org.ssgproject.content_profile_cis_level2_workstation",
        "CIS Level 2 Workstation",
        "CIS Benchmark Level 2 profile for workstations",
    ),
    (
        "xccdf_org.ssgproject.content_profile_stig",
        "STIG Profile",
        "Security Technical Implementation Guide profile",
    ),
];

/// Build the control router.
pub fn router(coordinator: Coordinator, default_profile: &str) -> Router {
    let state = ControlState {
        coordinator,
        default_profile: Arc::from(default_profile),
    };
    Router::new()
        .route("/health", get(health))
        .route("/scan", post(trigger_scan))
        .route("/scan/profiles", get(list_profiles))
        .route("/status", get(status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> crate::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "control surface listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AgentError::Server(e.to_string()))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        timestamp: Utc::now(),
        version: VERSION.into(),
    })
}

fn invalid(error: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "status": "invalid",
            "error": error,
        })),
    )
        .into_response()
}

async fn trigger_scan(
    State(state): State<ControlState>,
    Query(params): Query<ScanParams>,
) -> Response {
    let profile = match params.profile {
        Some(p) if p.trim().is_empty() => return invalid("profile must not be empty"),
        Some(p) => p,
        None => state.default_profile.to_string(),
    };
    if params
        .datastream
        .as_deref()
        .is_some_and(|d| d.trim().is_empty())
    {
        return invalid("datastream must not be empty");
    }

    let mut request = ScanRequest::manual(profile.as_str());
    if let Some(datastream) = &params.datastream {
        request = request.with_datastream(datastream.as_str());
    }
    let ack = state.coordinator.request_scan(request);
    if ack.accepted {
        (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "status": "accepted",
                "job_id": ack.job_id,
                "profile": profile,
                "datastream": params.datastream.as_deref().unwrap_or("auto-detected"),
            })),
        )
            .into_response()
    } else {
        (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "status": "in_progress",
                "job_id": ack.job_id,
                "state": ack.state,
            })),
        )
            .into_response()
    }
}

async fn status(State(state): State<ControlState>) -> Json<AgentStatus> {
    Json(state.coordinator.status())
}

async fn list_profiles() -> Json<serde_json::Value> {
    let profiles: Vec<ProfileInfo> = PROFILES
        .iter()
        .map(|(id, title, description)| ProfileInfo {
            id: (*id).to_string(),
            title: (*title).to_string(),
            description: (*description).to_string(),
        })
        .collect();
    Json(serde_json::json!({ "profiles": profiles }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ContentLocator;
    use crate::testing::{coordinator, wait_for_terminal, FakeExecutor, FakeSubmitter};
    use serde_json::Value;

    async fn start(coordinator: Coordinator) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(coordinator, "default-profile");
        tokio::spawn(serve(listener, app, std::future::pending()));
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn health_reports_version() {
        let coordinator = coordinator(
            Arc::new(FakeExecutor::passing(1, 0)),
            Arc::new(FakeSubmitter::accepting()),
        );
        let base = start(coordinator).await;

        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: HealthResponse = resp.json().await.unwrap();
        assert_eq!(body.status, "healthy");
        assert_eq!(body.version, VERSION);
    }

    #[tokio::test]
    async fn manual_scan_is_accepted_then_conflicts() {
        let executor = Arc::new(FakeExecutor::passing(1, 0).gated());
        let coordinator = coordinator(executor.clone(), Arc::new(FakeSubmitter::accepting()));
        let base = start(coordinator.clone()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/scan?profile=stig"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["job_id"], 1);
        assert_eq!(body["profile"], "stig");

        let resp = client.post(format!("{base}/scan")).send().await.unwrap();
        assert_eq!(resp.status(), 409);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "in_progress");
        assert_eq!(body["job_id"], 1);

        // Health stays responsive while the scan is held.
        let resp = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client.get(format!("{base}/status")).send().await.unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["coordinator"], "busy");
        assert_eq!(body["job"]["id"], 1);
        assert_eq!(body["job"]["profile"], "stig");

        executor.release(1);
        wait_for_terminal(&coordinator, 1).await;

        let resp = client.get(format!("{base}/status")).send().await.unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["coordinator"], "idle");
        assert_eq!(body["job"]["state"], "submitted");
        assert_eq!(body["job"]["summary"]["pass"], 1);
    }

    #[tokio::test]
    async fn missing_profile_uses_default() {
        let coordinator = coordinator(
            Arc::new(FakeExecutor::passing(1, 0)),
            Arc::new(FakeSubmitter::accepting()),
        );
        let base = start(coordinator.clone()).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/scan"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["profile"], "default-profile");
        wait_for_terminal(&coordinator, 1).await;
    }

    #[tokio::test]
    async fn empty_profile_is_rejected() {
        let executor = Arc::new(FakeExecutor::passing(1, 0));
        let coordinator = coordinator(executor.clone(), Arc::new(FakeSubmitter::accepting()));
        let base = start(coordinator.clone()).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/scan?profile="))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        assert!(coordinator.status().job.is_none());
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn manual_scan_with_datastream() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ssg-debian12-ds.xml"), "<x/>").unwrap();
        let locator =
            ContentLocator::new(None, dir.path()).with_search_dirs(vec![dir.path().to_path_buf()]);
        let executor = Arc::new(FakeExecutor::passing(1, 0));
        let submitter = Arc::new(FakeSubmitter::accepting());
        let coordinator = Coordinator::builder(executor.clone(), submitter)
            .content(locator)
            .host_identifier("host-1")
            .build();
        let base = start(coordinator.clone()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/scan?profile=stig&datastream=ssg-debian12-ds.xml"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["datastream"], "ssg-debian12-ds.xml");

        wait_for_terminal(&coordinator, 1).await;
        assert_eq!(
            executor.last_content(),
            Some(dir.path().join("ssg-debian12-ds.xml"))
        );
        let body: Value = client
            .get(format!("{base}/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["job"]["datastream"], "ssg-debian12-ds.xml");
        assert_eq!(body["job"]["state"], "submitted");

        let resp = client
            .post(format!("{base}/scan?datastream="))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn lists_profiles() {
        let coordinator = coordinator(
            Arc::new(FakeExecutor::passing(1, 0)),
            Arc::new(FakeSubmitter::accepting()),
        );
        let base = start(coordinator).await;

        let body: Value = reqwest::get(format!("{base}/scan/profiles"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let profiles = body["profiles"].as_array().unwrap();
        assert_eq!(profiles.len(), 5);
        assert_eq!(
            profiles[4]["id"],
            "xccdf_org.ssgproject.content_profile_stig"
        );
    }
}
