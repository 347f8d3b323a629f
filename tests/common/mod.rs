#![allow(dead_code)]

use async_trait::async_trait;
use callcenter_router::config::{AppConfig, ServerArgs};
use callcenter_router::error::{TaskRouterError, TaskRouterResult};
use callcenter_router::memory::InMemoryTaskRouter;
use callcenter_router::provision::{ProvisionPlan, ProvisionReport, provision};
use callcenter_router::resources::{
    Activity, CreateTaskQueue, CreateWorker, CreateWorkflow, CreateWorkspace, TaskQueue,
    UpdateWorker, Worker, Workflow, Workspace,
};
use callcenter_router::server::AppState;
use callcenter_router::taskrouter::TaskRouterApi;
use std::sync::Arc;

pub const HOST_URL: &str = "https://calls.example.com";
pub const AUTH_TOKEN: &str = "test-auth-token";
pub const BOB_CONTACT: &str = "+123456789";
pub const TEST_USER_CONTACT: &str = "+447776736645";

pub fn test_config(validate_signatures: bool) -> AppConfig {
    let validate = if validate_signatures { "true" } else { "false" };
    AppConfig::from_lookup(ServerArgs::default(), |key| match key {
        "TWILIO_ACCOUNT_SID" => Some("AC00000000000000000000000000000000".to_string()),
        "TWILIO_AUTH_TOKEN" => Some(AUTH_TOKEN.to_string()),
        "HOST_URL" => Some(HOST_URL.to_string()),
        "TWILIO_VALIDATE_SIGNATURES" => Some(validate.to_string()),
        _ => None,
    })
    .expect("test config is valid")
}

/// Backend with nothing provisioned.
pub fn empty_state(validate_signatures: bool) -> (Arc<InMemoryTaskRouter>, AppState) {
    let backend = Arc::new(InMemoryTaskRouter::new());
    let state = AppState::new(
        test_config(validate_signatures),
        backend.clone() as Arc<dyn TaskRouterApi>,
    );
    (backend, state)
}

/// Backend provisioned with the default call-center layout; every worker starts Offline.
pub async fn provisioned_state(
    validate_signatures: bool,
) -> (Arc<InMemoryTaskRouter>, AppState, ProvisionReport) {
    let (backend, state) = empty_state(validate_signatures);
    let report = provision(backend.as_ref(), &ProvisionPlan::for_host(HOST_URL))
        .await
        .expect("provisioning succeeds");
    (backend, state, report)
}

pub async fn activity_of(
    backend: &InMemoryTaskRouter,
    report: &ProvisionReport,
    contact: &str,
) -> Option<String> {
    let worker_sid = &report.workers[contact];
    backend
        .fetch_worker(&report.workspace_sid, worker_sid)
        .await
        .expect("worker exists")
        .activity_name
}

/// Delegates to an in-memory backend but fails every worker listing with a 503.
pub struct BrokenWorkerListing {
    inner: Arc<InMemoryTaskRouter>,
}

#[async_trait]
impl TaskRouterApi for BrokenWorkerListing {
    async fn list_workspaces(&self) -> TaskRouterResult<Vec<Workspace>> {
        self.inner.list_workspaces().await
    }

    async fn create_workspace(&self, params: &CreateWorkspace) -> TaskRouterResult<Workspace> {
        self.inner.create_workspace(params).await
    }

    async fn list_workers(&self, workspace_sid: &str) -> TaskRouterResult<Vec<Worker>> {
        Err(TaskRouterError::Api {
            method: "GET".to_string(),
            url: format!("/v1/Workspaces/{}/Workers", workspace_sid),
            status: 503,
            code: None,
            message: "service unavailable".to_string(),
        })
    }

    async fn fetch_worker(&self, workspace_sid: &str, worker_sid: &str) -> TaskRouterResult<Worker> {
        self.inner.fetch_worker(workspace_sid, worker_sid).await
    }

    async fn create_worker(
        &self,
        workspace_sid: &str,
        params: &CreateWorker,
    ) -> TaskRouterResult<Worker> {
        self.inner.create_worker(workspace_sid, params).await
    }

    async fn update_worker(
        &self,
        workspace_sid: &str,
        worker_sid: &str,
        params: &UpdateWorker,
    ) -> TaskRouterResult<Worker> {
        self.inner.update_worker(workspace_sid, worker_sid, params).await
    }

    async fn list_activities(&self, workspace_sid: &str) -> TaskRouterResult<Vec<Activity>> {
        self.inner.list_activities(workspace_sid).await
    }

    async fn list_task_queues(&self, workspace_sid: &str) -> TaskRouterResult<Vec<TaskQueue>> {
        self.inner.list_task_queues(workspace_sid).await
    }

    async fn create_task_queue(
        &self,
        workspace_sid: &str,
        params: &CreateTaskQueue,
    ) -> TaskRouterResult<TaskQueue> {
        self.inner.create_task_queue(workspace_sid, params).await
    }

    async fn list_workflows(&self, workspace_sid: &str) -> TaskRouterResult<Vec<Workflow>> {
        self.inner.list_workflows(workspace_sid).await
    }

    async fn create_workflow(
        &self,
        workspace_sid: &str,
        params: &CreateWorkflow,
    ) -> TaskRouterResult<Workflow> {
        self.inner.create_workflow(workspace_sid, params).await
    }
}

/// Provisioned workspace whose worker listing is down; all other calls succeed.
pub async fn broken_worker_listing_state() -> AppState {
    let (backend, _state, _report) = provisioned_state(false).await;
    AppState::new(
        test_config(false),
        Arc::new(BrokenWorkerListing { inner: backend }) as Arc<dyn TaskRouterApi>,
    )
}
