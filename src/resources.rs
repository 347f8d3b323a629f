use serde::{Deserialize, Serialize};

pub const WORKSPACE_NAME: &str = "Twilio Center Workspace";
pub const WORKFLOW_NAME: &str = "Tech Support Workflow";
pub const ACTIVITY_AVAILABLE: &str = "Available";
pub const ACTIVITY_OFFLINE: &str = "Offline";

/// Product a caller can ask for. Doubles as the worker skill name and the
/// task queue name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    ProgrammableSms,
    ProgrammableVoice,
}

impl Product {
    pub const ALL: [Product; 2] = [Product::ProgrammableSms, Product::ProgrammableVoice];

    pub fn from_digits(digits: &str) -> Option<Self> {
        match digits {
            "1" => Some(Product::ProgrammableSms),
            "2" => Some(Product::ProgrammableVoice),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Product::ProgrammableSms => "ProgrammableSMS",
            Product::ProgrammableVoice => "ProgrammableVoice",
        }
    }

    /// Target expression selecting the workers of this skill's queue.
    pub fn target_workers(&self) -> String {
        format!("products HAS '{}'", self.as_str())
    }

    /// Workflow filter expression matching tasks that selected this product.
    pub fn selection_expression(&self) -> String {
        format!("selected_product=='{}'", self.as_str())
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Workspace {
    pub sid: String,
    pub friendly_name: String,
    #[serde(default)]
    pub event_callback_url: Option<String>,
    #[serde(default)]
    pub default_activity_sid: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Worker {
    pub sid: String,
    pub friendly_name: String,
    /// JSON document, kept as the raw string the service returns.
    #[serde(default)]
    pub attributes: Option<String>,
    #[serde(default)]
    pub activity_sid: Option<String>,
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub available: bool,
}

impl Worker {
    pub fn parsed_attributes(&self) -> Option<Result<WorkerAttributes, serde_json::Error>> {
        self.attributes
            .as_deref()
            .map(serde_json::from_str::<WorkerAttributes>)
    }

    pub fn is_in_activity(&self, activity_name: &str) -> bool {
        self.activity_name.as_deref() == Some(activity_name)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct WorkerAttributes {
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_uri: Option<String>,
}

impl WorkerAttributes {
    pub fn new(product: Product, contact_uri: &str) -> Self {
        WorkerAttributes {
            products: vec![product.as_str().to_string()],
            contact_uri: Some(contact_uri.to_string()),
        }
    }

    pub fn has_product(&self, product: &str) -> bool {
        self.products.iter().any(|p| p == product)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Activity {
    pub sid: String,
    pub friendly_name: String,
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TaskQueue {
    pub sid: String,
    pub friendly_name: String,
    #[serde(default)]
    pub target_workers: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Workflow {
    pub sid: String,
    pub friendly_name: String,
    #[serde(default)]
    pub configuration: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CreateWorkspace {
    pub friendly_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CreateWorker {
    pub friendly_name: String,
    pub attributes: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateWorker {
    pub activity_sid: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTaskQueue {
    pub friendly_name: String,
    pub target_workers: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CreateWorkflow {
    pub friendly_name: String,
    pub configuration: String,
}

/// Routing configuration document stored on the workflow.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WorkflowConfiguration {
    pub task_routing: TaskRouting,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TaskRouting {
    pub filters: Vec<RoutingFilter>,
    pub default_filter: DefaultFilter,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RoutingFilter {
    pub expression: String,
    pub targets: Vec<RoutingTarget>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RoutingTarget {
    pub queue: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DefaultFilter {
    pub queue: String,
    pub fallback_url: String,
}

impl WorkflowConfiguration {
    /// One filter per product in `queues` order; unmatched tasks fall back to
    /// `default_queue` and the voicemail URL.
    pub fn for_queues(
        queues: &[(Product, String)],
        default_queue: String,
        fallback_url: String,
    ) -> Self {
        let filters = queues
            .iter()
            .map(|(product, queue_sid)| RoutingFilter {
                expression: product.selection_expression(),
                targets: vec![RoutingTarget {
                    queue: queue_sid.clone(),
                }],
            })
            .collect();
        WorkflowConfiguration {
            task_routing: TaskRouting {
                filters,
                default_filter: DefaultFilter {
                    queue: default_queue,
                    fallback_url,
                },
            },
        }
    }
}
