//! In-process task-routing backend.
//!
//! Behaves like the hosted service for the calls this crate makes: generated
//! sids, default activities on new workspaces, insertion-ordered listings.
//! Used by the `--offline` mode and by tests.

use crate::error::{TaskRouterError, TaskRouterResult};
use crate::resources::{
    ACTIVITY_AVAILABLE, ACTIVITY_OFFLINE, Activity, CreateTaskQueue, CreateWorker,
    CreateWorkflow, CreateWorkspace, TaskQueue, UpdateWorker, Worker, Workflow, Workspace,
};
use crate::taskrouter::TaskRouterApi;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const DEFAULT_ACTIVITIES: [(&str, bool); 3] = [
    (ACTIVITY_OFFLINE, false),
    (ACTIVITY_AVAILABLE, true),
    ("Unavailable", false),
];

#[derive(Debug, Default)]
struct WorkspaceState {
    workspace: Option<Workspace>,
    workers: Vec<Worker>,
    activities: Vec<Activity>,
    task_queues: Vec<TaskQueue>,
    workflows: Vec<Workflow>,
}

#[derive(Debug, Default)]
struct State {
    workspaces: Vec<WorkspaceState>,
    next_id: u64,
}

impl State {
    fn sid(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{:032x}", prefix, self.next_id)
    }

    fn workspace_mut(&mut self, workspace_sid: &str) -> TaskRouterResult<&mut WorkspaceState> {
        self.workspaces
            .iter_mut()
            .find(|ws| ws.workspace.as_ref().is_some_and(|w| w.sid == workspace_sid))
            .ok_or_else(|| not_found(&format!("/v1/Workspaces/{workspace_sid}")))
    }
}

fn not_found(path: &str) -> TaskRouterError {
    TaskRouterError::Api {
        method: "GET".to_string(),
        url: format!("memory://{path}"),
        status: 404,
        code: Some(20404),
        message: "The requested resource was not found".to_string(),
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTaskRouter {
    state: Mutex<State>,
    requests: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryTaskRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of API calls served so far, including failed ones.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Make every following call fail with a 503 until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Counts the call and checks the outage switch before touching state.
    fn begin(&self, method: &str, path: &str) -> TaskRouterResult<std::sync::MutexGuard<'_, State>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TaskRouterError::Api {
                method: method.to_string(),
                url: format!("memory://{path}"),
                status: 503,
                code: None,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    /// Set a worker's activity directly by name, bypassing the API surface.
    pub fn set_worker_activity(&self, workspace_sid: &str, worker_sid: &str, activity: &str) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if let Ok(ws) = state.workspace_mut(workspace_sid) {
            let activity_sid = ws
                .activities
                .iter()
                .find(|a| a.friendly_name == activity)
                .map(|a| a.sid.clone());
            if let Some(worker) = ws.workers.iter_mut().find(|w| w.sid == worker_sid) {
                worker.activity_sid = activity_sid;
                worker.activity_name = Some(activity.to_string());
                worker.available = activity == ACTIVITY_AVAILABLE;
            }
        }
    }

    /// Drop an activity so lookups by its name fail.
    pub fn remove_activity(&self, workspace_sid: &str, activity: &str) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if let Ok(ws) = state.workspace_mut(workspace_sid) {
            ws.activities.retain(|a| a.friendly_name != activity);
        }
    }
}

#[async_trait]
impl TaskRouterApi for InMemoryTaskRouter {
    async fn list_workspaces(&self) -> TaskRouterResult<Vec<Workspace>> {
        let state = self.begin("GET", "/v1/Workspaces")?;
        Ok(state
            .workspaces
            .iter()
            .filter_map(|ws| ws.workspace.clone())
            .collect())
    }

    async fn create_workspace(&self, params: &CreateWorkspace) -> TaskRouterResult<Workspace> {
        let mut state = self.begin("POST", "/v1/Workspaces")?;
        let activities: Vec<Activity> = DEFAULT_ACTIVITIES
            .iter()
            .map(|(name, available)| Activity {
                sid: state.sid("WA"),
                friendly_name: name.to_string(),
                available: *available,
            })
            .collect();
        let workspace = Workspace {
            sid: state.sid("WS"),
            friendly_name: params.friendly_name.clone(),
            event_callback_url: params.event_callback_url.clone(),
            default_activity_sid: activities.first().map(|a| a.sid.clone()),
        };
        state.workspaces.push(WorkspaceState {
            workspace: Some(workspace.clone()),
            activities,
            ..WorkspaceState::default()
        });
        Ok(workspace)
    }

    async fn list_workers(&self, workspace_sid: &str) -> TaskRouterResult<Vec<Worker>> {
        let mut state = self.begin("GET", "/Workers")?;
        Ok(state.workspace_mut(workspace_sid)?.workers.clone())
    }

    async fn fetch_worker(
        &self,
        workspace_sid: &str,
        worker_sid: &str,
    ) -> TaskRouterResult<Worker> {
        let mut state = self.begin("GET", "/Workers")?;
        state
            .workspace_mut(workspace_sid)?
            .workers
            .iter()
            .find(|w| w.sid == worker_sid)
            .cloned()
            .ok_or_else(|| not_found(&format!("/Workers/{worker_sid}")))
    }

    async fn create_worker(
        &self,
        workspace_sid: &str,
        params: &CreateWorker,
    ) -> TaskRouterResult<Worker> {
        let mut state = self.begin("POST", "/Workers")?;
        let sid = state.sid("WK");
        let ws = state.workspace_mut(workspace_sid)?;
        let default_activity = ws
            .workspace
            .as_ref()
            .and_then(|w| w.default_activity_sid.clone())
            .and_then(|sid| ws.activities.iter().find(|a| a.sid == sid).cloned());
        let worker = Worker {
            sid,
            friendly_name: params.friendly_name.clone(),
            attributes: Some(params.attributes.clone()),
            activity_sid: default_activity.as_ref().map(|a| a.sid.clone()),
            activity_name: default_activity.as_ref().map(|a| a.friendly_name.clone()),
            available: default_activity.is_some_and(|a| a.available),
        };
        ws.workers.push(worker.clone());
        Ok(worker)
    }

    async fn update_worker(
        &self,
        workspace_sid: &str,
        worker_sid: &str,
        params: &UpdateWorker,
    ) -> TaskRouterResult<Worker> {
        let mut state = self.begin("POST", "/Workers")?;
        let ws = state.workspace_mut(workspace_sid)?;
        let activity = ws
            .activities
            .iter()
            .find(|a| a.sid == params.activity_sid)
            .cloned()
            .ok_or_else(|| not_found(&format!("/Activities/{}", params.activity_sid)))?;
        let worker = ws
            .workers
            .iter_mut()
            .find(|w| w.sid == worker_sid)
            .ok_or_else(|| not_found(&format!("/Workers/{worker_sid}")))?;
        worker.activity_sid = Some(activity.sid);
        worker.activity_name = Some(activity.friendly_name);
        worker.available = activity.available;
        Ok(worker.clone())
    }

    async fn list_activities(&self, workspace_sid: &str) -> TaskRouterResult<Vec<Activity>> {
        let mut state = self.begin("GET", "/Activities")?;
        Ok(state.workspace_mut(workspace_sid)?.activities.clone())
    }

    async fn list_task_queues(&self, workspace_sid: &str) -> TaskRouterResult<Vec<TaskQueue>> {
        let mut state = self.begin("GET", "/TaskQueues")?;
        Ok(state.workspace_mut(workspace_sid)?.task_queues.clone())
    }

    async fn create_task_queue(
        &self,
        workspace_sid: &str,
        params: &CreateTaskQueue,
    ) -> TaskRouterResult<TaskQueue> {
        let mut state = self.begin("POST", "/TaskQueues")?;
        let queue = TaskQueue {
            sid: state.sid("WQ"),
            friendly_name: params.friendly_name.clone(),
            target_workers: Some(params.target_workers.clone()),
        };
        state
            .workspace_mut(workspace_sid)?
            .task_queues
            .push(queue.clone());
        Ok(queue)
    }

    async fn list_workflows(&self, workspace_sid: &str) -> TaskRouterResult<Vec<Workflow>> {
        let mut state = self.begin("GET", "/Workflows")?;
        Ok(state.workspace_mut(workspace_sid)?.workflows.clone())
    }

    async fn create_workflow(
        &self,
        workspace_sid: &str,
        params: &CreateWorkflow,
    ) -> TaskRouterResult<Workflow> {
        let mut state = self.begin("POST", "/Workflows")?;
        let workflow = Workflow {
            sid: state.sid("WW"),
            friendly_name: params.friendly_name.clone(),
            configuration: Some(params.configuration.clone()),
        };
        state
            .workspace_mut(workspace_sid)?
            .workflows
            .push(workflow.clone());
        Ok(workflow)
    }
}
