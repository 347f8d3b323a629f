use crate::config::{AppConfig, Credentials};
use crate::error::{TaskRouterError, TaskRouterResult};
use crate::resources::{
    Activity, CreateTaskQueue, CreateWorker, CreateWorkflow, CreateWorkspace, TaskQueue,
    UpdateWorker, Worker, Workflow, Workspace,
};
use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

const PAGE_SIZE: u32 = 50;

/// Operations this service needs from the remote task-routing API.
///
/// List calls return every item across all pages, in the order the service
/// returned them.
#[async_trait]
pub trait TaskRouterApi: Send + Sync {
    async fn list_workspaces(&self) -> TaskRouterResult<Vec<Workspace>>;

    async fn create_workspace(&self, params: &CreateWorkspace) -> TaskRouterResult<Workspace>;

    async fn list_workers(&self, workspace_sid: &str) -> TaskRouterResult<Vec<Worker>>;

    async fn fetch_worker(&self, workspace_sid: &str, worker_sid: &str)
    -> TaskRouterResult<Worker>;

    async fn create_worker(
        &self,
        workspace_sid: &str,
        params: &CreateWorker,
    ) -> TaskRouterResult<Worker>;

    async fn update_worker(
        &self,
        workspace_sid: &str,
        worker_sid: &str,
        params: &UpdateWorker,
    ) -> TaskRouterResult<Worker>;

    async fn list_activities(&self, workspace_sid: &str) -> TaskRouterResult<Vec<Activity>>;

    async fn list_task_queues(&self, workspace_sid: &str) -> TaskRouterResult<Vec<TaskQueue>>;

    async fn create_task_queue(
        &self,
        workspace_sid: &str,
        params: &CreateTaskQueue,
    ) -> TaskRouterResult<TaskQueue>;

    async fn list_workflows(&self, workspace_sid: &str) -> TaskRouterResult<Vec<Workflow>>;

    async fn create_workflow(
        &self,
        workspace_sid: &str,
        params: &CreateWorkflow,
    ) -> TaskRouterResult<Workflow>;
}

/// HTTP client for the hosted TaskRouter v1 REST API.
#[derive(Debug, Clone)]
pub struct TwilioTaskRouter {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl TwilioTaskRouter {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        timeout: Option<std::time::Duration>,
    ) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let credentials = config
            .credentials
            .clone()
            .ok_or_else(|| anyhow::anyhow!("TaskRouter credentials are not configured"))?;
        Self::new(&config.api_base, credentials, config.request_timeout)
    }

    pub fn api_path(&self, api_path: &str) -> String {
        if api_path.starts_with('/') {
            format!("{}{}", self.base_url, api_path)
        } else {
            format!("{}/{}", self.base_url, api_path)
        }
    }

    async fn send<F: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        form: Option<&F>,
    ) -> TaskRouterResult<Value> {
        let mut request = self.client.request(method.clone(), url).basic_auth(
            &self.credentials.account_sid,
            Some(&self.credentials.auth_token),
        );
        if let Some(form) = form {
            request = request.form(form);
        }
        let resp = request
            .send()
            .await
            .map_err(|source| TaskRouterError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|source| TaskRouterError::Transport {
                url: url.to_string(),
                source,
            })?;
        if !status.is_success() {
            let error_body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            return Err(TaskRouterError::Api {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                code: error_body
                    .get("code")
                    .and_then(Value::as_u64)
                    .map(|c| c as u32),
                message: error_body
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or(body),
            });
        }
        serde_json::from_str(&body).map_err(|source| TaskRouterError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn fetch_one<T: DeserializeOwned>(&self, api_path: &str) -> TaskRouterResult<T> {
        let url = self.api_path(api_path);
        let value = self.send::<()>(Method::GET, &url, None).await?;
        decode(&url, value)
    }

    async fn post_form<F: Serialize, T: DeserializeOwned>(
        &self,
        api_path: &str,
        form: &F,
    ) -> TaskRouterResult<T> {
        let url = self.api_path(api_path);
        let value = self.send(Method::POST, &url, Some(form)).await?;
        decode(&url, value)
    }

    /// Follows `meta.next_page_url` until the collection is exhausted.
    async fn list_all<T: DeserializeOwned>(
        &self,
        api_path: &str,
        key: &str,
    ) -> TaskRouterResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(format!("{}?PageSize={}", self.api_path(api_path), PAGE_SIZE));
        while let Some(url) = next.take() {
            let page = self.send::<()>(Method::GET, &url, None).await?;
            let (mut page_items, next_page_url) = split_page::<T>(&url, page, key)?;
            items.append(&mut page_items);
            next = next_page_url;
        }
        Ok(items)
    }
}

fn decode<T: DeserializeOwned>(url: &str, value: Value) -> TaskRouterResult<T> {
    serde_json::from_value(value).map_err(|source| TaskRouterError::Decode {
        url: url.to_string(),
        source,
    })
}

/// Splits one list page into its items and the URL of the following page.
fn split_page<T: DeserializeOwned>(
    url: &str,
    mut page: Value,
    key: &str,
) -> TaskRouterResult<(Vec<T>, Option<String>)> {
    let items = match page.get_mut(key) {
        Some(items) => decode(url, items.take())?,
        None => Vec::new(),
    };
    let next_page_url = page
        .get("meta")
        .and_then(|meta| meta.get("next_page_url"))
        .and_then(Value::as_str)
        .filter(|next| !next.is_empty())
        .map(str::to_string);
    Ok((items, next_page_url))
}

#[async_trait]
impl TaskRouterApi for TwilioTaskRouter {
    async fn list_workspaces(&self) -> TaskRouterResult<Vec<Workspace>> {
        self.list_all("/v1/Workspaces", "workspaces").await
    }

    async fn create_workspace(&self, params: &CreateWorkspace) -> TaskRouterResult<Workspace> {
        self.post_form("/v1/Workspaces", params).await
    }

    async fn list_workers(&self, workspace_sid: &str) -> TaskRouterResult<Vec<Worker>> {
        self.list_all(&format!("/v1/Workspaces/{workspace_sid}/Workers"), "workers")
            .await
    }

    async fn fetch_worker(
        &self,
        workspace_sid: &str,
        worker_sid: &str,
    ) -> TaskRouterResult<Worker> {
        self.fetch_one(&format!("/v1/Workspaces/{workspace_sid}/Workers/{worker_sid}"))
            .await
    }

    async fn create_worker(
        &self,
        workspace_sid: &str,
        params: &CreateWorker,
    ) -> TaskRouterResult<Worker> {
        self.post_form(&format!("/v1/Workspaces/{workspace_sid}/Workers"), params)
            .await
    }

    async fn update_worker(
        &self,
        workspace_sid: &str,
        worker_sid: &str,
        params: &UpdateWorker,
    ) -> TaskRouterResult<Worker> {
        self.post_form(
            &format!("/v1/Workspaces/{workspace_sid}/Workers/{worker_sid}"),
            params,
        )
        .await
    }

    async fn list_activities(&self, workspace_sid: &str) -> TaskRouterResult<Vec<Activity>> {
        self.list_all(
            &format!("/v1/Workspaces/{workspace_sid}/Activities"),
            "activities",
        )
        .await
    }

    async fn list_task_queues(&self, workspace_sid: &str) -> TaskRouterResult<Vec<TaskQueue>> {
        self.list_all(
            &format!("/v1/Workspaces/{workspace_sid}/TaskQueues"),
            "task_queues",
        )
        .await
    }

    async fn create_task_queue(
        &self,
        workspace_sid: &str,
        params: &CreateTaskQueue,
    ) -> TaskRouterResult<TaskQueue> {
        self.post_form(&format!("/v1/Workspaces/{workspace_sid}/TaskQueues"), params)
            .await
    }

    async fn list_workflows(&self, workspace_sid: &str) -> TaskRouterResult<Vec<Workflow>> {
        self.list_all(
            &format!("/v1/Workspaces/{workspace_sid}/Workflows"),
            "workflows",
        )
        .await
    }

    async fn create_workflow(
        &self,
        workspace_sid: &str,
        params: &CreateWorkflow,
    ) -> TaskRouterResult<Workflow> {
        self.post_form(&format!("/v1/Workspaces/{workspace_sid}/Workflows"), params)
            .await
    }
}
