//! Startup provisioning of the remote workspace.
//!
//! Each entity is found by friendly name before it is created, so running the
//! routine again against the same account creates nothing new.

use crate::error::{TaskRouterError, TaskRouterResult};
use crate::resources::{
    CreateTaskQueue, CreateWorker, CreateWorkflow, CreateWorkspace, Product, WORKFLOW_NAME,
    WORKSPACE_NAME, WorkerAttributes, WorkflowConfiguration, Workspace,
};
use crate::taskrouter::TaskRouterApi;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSeed {
    pub name: String,
    pub product: Product,
    pub contact_uri: String,
}

impl WorkerSeed {
    pub fn new(name: &str, product: Product, contact_uri: &str) -> Self {
        WorkerSeed {
            name: name.to_string(),
            product,
            contact_uri: contact_uri.to_string(),
        }
    }
}

/// Everything the routine ensures exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionPlan {
    pub workspace_name: String,
    pub event_callback_url: String,
    pub workers: Vec<WorkerSeed>,
    pub products: Vec<Product>,
    pub workflow_name: String,
    pub default_product: Product,
    pub fallback_url: String,
}

impl ProvisionPlan {
    /// The call-center layout, with callback URLs under `host_url`.
    pub fn for_host(host_url: &str) -> Self {
        let host_url = host_url.trim_end_matches('/');
        ProvisionPlan {
            workspace_name: WORKSPACE_NAME.to_string(),
            event_callback_url: format!("{host_url}/callback/events"),
            workers: vec![
                WorkerSeed::new("Bob", Product::ProgrammableSms, "+123456789"),
                WorkerSeed::new("TestUser", Product::ProgrammableVoice, "+447776736645"),
            ],
            products: Product::ALL.to_vec(),
            workflow_name: WORKFLOW_NAME.to_string(),
            default_product: Product::ProgrammableVoice,
            fallback_url: format!("{host_url}/voicemail"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionReport {
    pub workspace_sid: String,
    /// Worker sid by contact address.
    pub workers: BTreeMap<String, String>,
    /// Task queue sid by skill name.
    pub task_queues: BTreeMap<String, String>,
    pub workflow_sid: String,
    /// Number of entities created by this run.
    pub created: usize,
}

pub async fn provision(
    api: &dyn TaskRouterApi,
    plan: &ProvisionPlan,
) -> TaskRouterResult<ProvisionReport> {
    let mut report = ProvisionReport::default();

    let workspace = find_or_create_workspace(api, plan, &mut report).await?;
    report.workspace_sid = workspace.sid.clone();

    for seed in &plan.workers {
        let sid = find_or_create_worker(api, &workspace.sid, seed, &mut report).await?;
        report.workers.insert(seed.contact_uri.clone(), sid);
    }

    find_or_create_task_queues(api, &workspace.sid, &plan.products, &mut report).await?;
    let workflow_sid = find_or_create_workflow(api, &workspace.sid, plan, &mut report).await?;
    report.workflow_sid = workflow_sid;

    log::info!(
        "Workspace setup completed: workspace={} workers={} queues={} workflow={} created={}",
        report.workspace_sid,
        report.workers.len(),
        report.task_queues.len(),
        report.workflow_sid,
        report.created
    );
    Ok(report)
}

async fn find_or_create_workspace(
    api: &dyn TaskRouterApi,
    plan: &ProvisionPlan,
    report: &mut ProvisionReport,
) -> TaskRouterResult<Workspace> {
    if let Some(ws) = api
        .list_workspaces()
        .await?
        .into_iter()
        .find(|ws| ws.friendly_name == plan.workspace_name)
    {
        log::info!("Found existing workspace: {}", ws.sid);
        return Ok(ws);
    }

    let ws = api
        .create_workspace(&CreateWorkspace {
            friendly_name: plan.workspace_name.clone(),
            event_callback_url: Some(plan.event_callback_url.clone()),
        })
        .await?;
    report.created += 1;
    log::info!("Created new workspace: {}", ws.sid);
    Ok(ws)
}

async fn find_or_create_worker(
    api: &dyn TaskRouterApi,
    workspace_sid: &str,
    seed: &WorkerSeed,
    report: &mut ProvisionReport,
) -> TaskRouterResult<String> {
    if let Some(worker) = api
        .list_workers(workspace_sid)
        .await?
        .into_iter()
        .find(|w| w.friendly_name == seed.name)
    {
        log::info!("Found existing worker '{}' with SID: {}", seed.name, worker.sid);
        return Ok(worker.sid);
    }

    let attributes =
        serde_json::to_string(&WorkerAttributes::new(seed.product, &seed.contact_uri)).map_err(
            |source| TaskRouterError::Encode {
                what: "worker attributes",
                source,
            },
        )?;
    let worker = api
        .create_worker(
            workspace_sid,
            &CreateWorker {
                friendly_name: seed.name.clone(),
                attributes,
            },
        )
        .await?;
    report.created += 1;
    log::info!("Worker '{}' created with SID: {}", seed.name, worker.sid);
    Ok(worker.sid)
}

async fn find_or_create_task_queues(
    api: &dyn TaskRouterApi,
    workspace_sid: &str,
    products: &[Product],
    report: &mut ProvisionReport,
) -> TaskRouterResult<()> {
    let existing: BTreeMap<String, String> = api
        .list_task_queues(workspace_sid)
        .await?
        .into_iter()
        .map(|q| (q.friendly_name, q.sid))
        .collect();

    for product in products {
        let name = product.as_str();
        if let Some(sid) = existing.get(name) {
            log::info!("Found existing task queue: {}", name);
            report.task_queues.insert(name.to_string(), sid.clone());
            continue;
        }
        let queue = api
            .create_task_queue(
                workspace_sid,
                &CreateTaskQueue {
                    friendly_name: name.to_string(),
                    target_workers: product.target_workers(),
                },
            )
            .await?;
        report.created += 1;
        log::info!("Created new task queue: {}", name);
        report.task_queues.insert(name.to_string(), queue.sid);
    }
    Ok(())
}

async fn find_or_create_workflow(
    api: &dyn TaskRouterApi,
    workspace_sid: &str,
    plan: &ProvisionPlan,
    report: &mut ProvisionReport,
) -> TaskRouterResult<String> {
    if let Some(workflow) = api
        .list_workflows(workspace_sid)
        .await?
        .into_iter()
        .find(|w| w.friendly_name == plan.workflow_name)
    {
        log::info!("Found existing workflow: {}", workflow.sid);
        return Ok(workflow.sid);
    }

    let queue_sid = |product: &Product| {
        report
            .task_queues
            .get(product.as_str())
            .cloned()
            .unwrap_or_default()
    };
    let queues: Vec<(Product, String)> = plan
        .products
        .iter()
        .map(|product| (*product, queue_sid(product)))
        .collect();
    let configuration = WorkflowConfiguration::for_queues(
        &queues,
        queue_sid(&plan.default_product),
        plan.fallback_url.clone(),
    );
    let configuration =
        serde_json::to_string(&configuration).map_err(|source| TaskRouterError::Encode {
            what: "workflow configuration",
            source,
        })?;

    let workflow = api
        .create_workflow(
            workspace_sid,
            &CreateWorkflow {
                friendly_name: plan.workflow_name.clone(),
                configuration,
            },
        )
        .await?;
    report.created += 1;
    log::info!("Created new workflow: {}", workflow.sid);
    Ok(workflow.sid)
}
