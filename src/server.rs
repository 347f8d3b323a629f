use crate::config::AppConfig;
use crate::error::{WebhookError, signature_rejected};
use crate::lookup;
use crate::resources::{ACTIVITY_AVAILABLE, ACTIVITY_OFFLINE, Product, WORKSPACE_NAME};
use crate::signature::{SIGNATURE_HEADER, verify_signature};
use crate::taskrouter::TaskRouterApi;
use crate::twiml::{CONTENT_TYPE, MessagingResponse, VoiceResponse};
use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, HttpResponse, HttpServer, get, post, web};
use futures::future::LocalBoxFuture;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

const WELCOME_PROMPT: &str =
    "Welcome to our service. For Programmable SMS, press 1. For Programmable Voice, press 2.";
const INVALID_SELECTION: &str =
    "Invalid selection. Please call again and select a valid option. Goodbye.";
const VOICEMAIL_PROMPT: &str = "We are sorry. All our agents are currently busy. Please leave a brief message after the beep. Your message will end automatically after 10 seconds, or you can press the pound key to finish.";
const VOICEMAIL_THANKS: &str = "Thank you for your message. Goodbye.";
const SMS_USAGE: &str =
    "Unrecognized command. Reply with 'on' to become available or 'off' to go offline.";

/// Shared, read-only handler dependencies.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub taskrouter: Arc<dyn TaskRouterApi>,
}

impl AppState {
    pub fn new(config: AppConfig, taskrouter: Arc<dyn TaskRouterApi>) -> Self {
        Self {
            config: Arc::new(config),
            taskrouter,
        }
    }

    fn api(&self) -> &dyn TaskRouterApi {
        self.taskrouter.as_ref()
    }

    /// Rejects requests whose provider signature does not match, when enabled.
    fn check_signature(
        &self,
        req: &HttpRequest,
        params: &[(String, String)],
    ) -> Result<(), actix_web::Error> {
        if !self.config.validate_signatures {
            return Ok(());
        }
        let Some(auth_token) = self.config.credentials.as_ref().map(|c| &c.auth_token) else {
            return Err(signature_rejected("Signature validation unavailable"));
        };
        let signature = req
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| req.path());
        let url = self.config.route_url(path);
        if verify_signature(auth_token, &url, params, signature) {
            Ok(())
        } else {
            log::warn!("Rejected request to {} with invalid signature", url);
            Err(signature_rejected("Invalid request signature"))
        }
    }
}

/// Form-encoded webhook body, signature-checked before it is decoded.
pub struct WebhookForm<T>(pub T);

impl<T: DeserializeOwned + 'static> FromRequest for WebhookForm<T> {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        let body = web::Bytes::from_request(&req, payload);
        Box::pin(async move {
            let body = body.await?;
            let params: Vec<(String, String)> =
                serde_urlencoded::from_bytes(&body).map_err(actix_web::error::ErrorBadRequest)?;
            if let Some(state) = req.app_data::<web::Data<AppState>>() {
                state.check_signature(&req, &params)?;
            }
            let form =
                serde_urlencoded::from_bytes::<T>(&body).map_err(actix_web::error::ErrorBadRequest)?;
            Ok(WebhookForm(form))
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CallEvent {
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GatherInput {
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
    #[serde(rename = "Digits", default)]
    pub digits: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SmsInput {
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskRouterEvent {
    #[serde(rename = "EventType", default)]
    pub event_type: String,
    #[serde(rename = "EventDescription", default)]
    pub event_description: Option<String>,
    #[serde(rename = "ResourceType", default)]
    pub resource_type: Option<String>,
    #[serde(rename = "ResourceSid", default)]
    pub resource_sid: Option<String>,
    #[serde(rename = "WorkerSid", default)]
    pub worker_sid: Option<String>,
}

/// Worker status change requested over SMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCommand {
    On,
    Off,
}

impl StatusCommand {
    /// Case-insensitive, ignoring surrounding whitespace.
    pub fn parse(body: &str) -> Option<Self> {
        match body.trim().to_lowercase().as_str() {
            "on" => Some(StatusCommand::On),
            "off" => Some(StatusCommand::Off),
            _ => None,
        }
    }

    pub fn activity_name(&self) -> &'static str {
        match self {
            StatusCommand::On => ACTIVITY_AVAILABLE,
            StatusCommand::Off => ACTIVITY_OFFLINE,
        }
    }

    fn confirmation(&self, phone_number: &str) -> String {
        match self {
            StatusCommand::On => format!("Worker {} is now available.", phone_number),
            StatusCommand::Off => format!("Worker {} is now offline.", phone_number),
        }
    }
}

fn xml(body: String) -> HttpResponse {
    HttpResponse::Ok().content_type(CONTENT_TYPE).body(body)
}

pub fn welcome_markup(config: &AppConfig) -> String {
    VoiceResponse::new()
        .gather(1, config.route_url("/enqueue"), WELCOME_PROMPT)
        .hangup()
        .render()
}

pub fn invalid_selection_markup() -> String {
    VoiceResponse::new().say(INVALID_SELECTION).hangup().render()
}

pub fn no_agent_markup(config: &AppConfig, product: Product) -> String {
    VoiceResponse::new()
        .say(format!(
            "We are sorry, no agents are currently available for {}. Redirecting you to voicemail.",
            product
        ))
        .redirect(config.route_url("/voicemail"))
        .render()
}

/// Narrates the hand-off to the agent and hangs up; no call transfer happens.
pub fn agent_found_markup(product: Product, worker_name: &str) -> String {
    VoiceResponse::new()
        .say(format!(
            "Thank you for calling. Please hold while we connect you to an agent skilled in {}.",
            product
        ))
        .pause(3)
        .say(format!("The available agent is {}.", worker_name))
        .pause(2)
        .say("Thanks for calling us today. Hope you have a nice day.")
        .hangup()
        .render()
}

pub fn voicemail_markup() -> String {
    VoiceResponse::new()
        .say(VOICEMAIL_PROMPT)
        .record(10, "#", "/voicemail-complete")
        .say(VOICEMAIL_THANKS)
        .hangup()
        .render()
}

pub fn voicemail_complete_markup() -> String {
    VoiceResponse::new().say(VOICEMAIL_THANKS).hangup().render()
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("Ok")
}

#[post("/incoming")]
pub async fn incoming_call(
    form: WebhookForm<CallEvent>,
    app_state: web::Data<AppState>,
) -> HttpResponse {
    log::info!("Incoming call {}", form.0.call_sid.as_deref().unwrap_or("-"));
    xml(welcome_markup(&app_state.config))
}

#[post("/enqueue")]
pub async fn enqueue_call(
    form: WebhookForm<GatherInput>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, WebhookError> {
    let input = form.0;
    let digits = input.digits.trim();
    let api = app_state.api();

    let workspace_sid = lookup::find_workspace_sid(api, WORKSPACE_NAME)
        .await
        .map_err(|e| {
            log::error!("Failed to resolve workspace: {}", e);
            WebhookError::internal("Error retrieving workspace", e)
        })?;

    let Some(product) = Product::from_digits(digits) else {
        log::info!("Invalid selection {:?} on call {:?}", digits, input.call_sid);
        return Ok(xml(invalid_selection_markup()));
    };

    let worker_sid = lookup::find_worker_by_skill_in_activity(
        api,
        &workspace_sid,
        product.as_str(),
        ACTIVITY_AVAILABLE,
    )
    .await
    .map_err(|e| {
        log::error!("Failed to list workers: {}", e);
        WebhookError::internal("Error finding an available worker", e)
    })?;

    match worker_sid {
        None => {
            log::info!("No available worker for {}, redirecting to voicemail", product);
            Ok(xml(no_agent_markup(&app_state.config, product)))
        }
        Some(worker_sid) => {
            let name = lookup::worker_name(api, &workspace_sid, &worker_sid).await;
            log::info!("Routing {} call to worker {} ({})", product, name, worker_sid);
            Ok(xml(agent_found_markup(product, &name)))
        }
    }
}

#[post("/sms")]
pub async fn update_worker_status(
    form: WebhookForm<SmsInput>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, WebhookError> {
    let input = form.0;
    let phone_number = input.from.trim();
    let api = app_state.api();

    let workspace_sid = lookup::find_workspace_sid(api, WORKSPACE_NAME)
        .await
        .map_err(|e| {
            log::error!("Failed to resolve workspace: {}", e);
            WebhookError::lookup("Error retrieving workspace", e)
        })?;
    let worker_sid = lookup::find_worker_sid_by_contact(api, &workspace_sid, phone_number)
        .await
        .map_err(|e| {
            log::error!("Failed to resolve worker for {}: {}", phone_number, e);
            WebhookError::lookup("Error finding worker", e)
        })?;

    let message = match StatusCommand::parse(&input.body) {
        Some(command) => {
            lookup::update_worker_activity(api, &workspace_sid, &worker_sid, command.activity_name())
                .await
                .map_err(|e| {
                    log::error!("Failed to update worker {}: {}", worker_sid, e);
                    WebhookError::internal("Error updating worker status", e)
                })?;
            command.confirmation(phone_number)
        }
        None => SMS_USAGE.to_string(),
    };

    Ok(xml(MessagingResponse::new().message(message).render()))
}

#[post("/voicemail")]
pub async fn redirect_to_voicemail(_form: WebhookForm<CallEvent>) -> HttpResponse {
    xml(voicemail_markup())
}

#[post("/voicemail-complete")]
pub async fn voicemail_complete(_form: WebhookForm<CallEvent>) -> HttpResponse {
    xml(voicemail_complete_markup())
}

#[post("/callback/events")]
pub async fn taskrouter_event(form: WebhookForm<TaskRouterEvent>) -> HttpResponse {
    let event = form.0;
    log::info!(
        "TaskRouter event {} resource={} worker={} {}",
        event.event_type,
        event.resource_sid.as_deref().unwrap_or("-"),
        event.worker_sid.as_deref().unwrap_or("-"),
        event.event_description.as_deref().unwrap_or("")
    );
    HttpResponse::Ok().finish()
}

/// Route table shared by the server and tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(incoming_call)
        .service(enqueue_call)
        .service(update_worker_status)
        .service(redirect_to_voicemail)
        .service(voicemail_complete)
        .service(taskrouter_event);
}

pub async fn startup(app_state: AppState) -> std::io::Result<()> {
    let host = app_state.config.host.clone();
    let port = app_state.config.port;
    let app_state = web::Data::new(app_state);

    log::info!("Starting server at {}:{}", host, port);

    HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(app_state.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run()
    .await?;

    std::io::Result::Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_commands_parse_case_insensitively() {
        assert_eq!(StatusCommand::parse("on"), Some(StatusCommand::On));
        assert_eq!(StatusCommand::parse("  ON \n"), Some(StatusCommand::On));
        assert_eq!(StatusCommand::parse("Off"), Some(StatusCommand::Off));
        assert_eq!(StatusCommand::parse("online"), None);
        assert_eq!(StatusCommand::parse(""), None);
        assert_eq!(StatusCommand::On.activity_name(), ACTIVITY_AVAILABLE);
        assert_eq!(StatusCommand::Off.activity_name(), ACTIVITY_OFFLINE);
    }

    #[test]
    fn agent_markup_narrates_without_transfer() {
        let xml = agent_found_markup(Product::ProgrammableVoice, "TestUser");
        assert!(xml.contains("skilled in ProgrammableVoice."));
        assert!(xml.contains(r#"<Pause length="3"/>"#));
        assert!(xml.contains("<Say>The available agent is TestUser.</Say>"));
        assert!(xml.ends_with("<Hangup/></Response>"));
        assert!(!xml.contains("<Dial"));
    }

    #[test]
    fn voicemail_markup_records_ten_seconds() {
        let xml = voicemail_markup();
        assert!(xml.contains(
            r##"<Record maxLength="10" finishOnKey="#" action="/voicemail-complete"/>"##
        ));
    }
}
