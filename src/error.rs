use crate::twiml::MessagingResponse;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

/// Errors raised while talking to the task-routing service.
#[derive(Debug, thiserror::Error)]
pub enum TaskRouterError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {message}")]
    Api {
        method: String,
        url: String,
        status: u16,
        code: Option<u32>,
        message: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("workspace '{0}' not found")]
    WorkspaceNotFound(String),

    #[error("worker with phone number '{0}' not found")]
    WorkerNotFound(String),

    #[error("activity '{0}' not found")]
    ActivityNotFound(String),
}

impl TaskRouterError {
    /// True when the remote call succeeded but the entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TaskRouterError::WorkspaceNotFound(_)
                | TaskRouterError::WorkerNotFound(_)
                | TaskRouterError::ActivityNotFound(_)
        ) || matches!(self, TaskRouterError::Api { status: 404, .. })
    }
}

pub type TaskRouterResult<T> = Result<T, TaskRouterError>;

/// A failed webhook request, rendered as a `<Message>` markup body.
#[derive(Debug)]
pub struct WebhookError {
    pub status: StatusCode,
    pub context: &'static str,
    pub source: TaskRouterError,
}

impl WebhookError {
    pub fn new(status: StatusCode, context: &'static str, source: TaskRouterError) -> Self {
        WebhookError {
            status,
            context,
            source,
        }
    }

    pub fn internal(context: &'static str, source: TaskRouterError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, context, source)
    }

    /// 404 when the entity is missing, 500 when the remote call itself failed.
    pub fn lookup(context: &'static str, source: TaskRouterError) -> Self {
        let status = if source.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, context, source)
    }
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.context, self.source)
    }
}

impl std::error::Error for WebhookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl ResponseError for WebhookError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        let body = MessagingResponse::new().message(self.to_string()).render();
        HttpResponse::build(self.status)
            .content_type(crate::twiml::CONTENT_TYPE)
            .body(body)
    }
}

/// 403 for a webhook whose provider signature is missing or wrong.
pub fn signature_rejected(reason: &'static str) -> actix_web::Error {
    let body = MessagingResponse::new().message(reason).render();
    let response = HttpResponse::Forbidden()
        .content_type(crate::twiml::CONTENT_TYPE)
        .body(body);
    actix_web::error::InternalError::from_response(reason, response).into()
}
