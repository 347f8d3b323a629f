//! Read-mostly queries over remote task-routing collections.
//!
//! Every helper re-queries the service and scans the returned list linearly.
//! The first match in service order wins; no priority, load or fairness
//! ordering is applied.

use crate::error::{TaskRouterError, TaskRouterResult};
use crate::resources::{UpdateWorker, Worker};
use crate::taskrouter::TaskRouterApi;

pub const UNKNOWN_WORKER_NAME: &str = "Unknown";

pub async fn find_workspace_sid(
    api: &dyn TaskRouterApi,
    friendly_name: &str,
) -> TaskRouterResult<String> {
    api.list_workspaces()
        .await?
        .into_iter()
        .find(|ws| ws.friendly_name == friendly_name)
        .map(|ws| ws.sid)
        .ok_or_else(|| TaskRouterError::WorkspaceNotFound(friendly_name.to_string()))
}

/// Worker whose `contact_uri` attribute equals `phone_number`.
pub async fn find_worker_sid_by_contact(
    api: &dyn TaskRouterApi,
    workspace_sid: &str,
    phone_number: &str,
) -> TaskRouterResult<String> {
    api.list_workers(workspace_sid)
        .await?
        .into_iter()
        .find(|worker| {
            worker_attributes(worker)
                .is_some_and(|attrs| attrs.contact_uri.as_deref() == Some(phone_number))
        })
        .map(|worker| worker.sid)
        .ok_or_else(|| TaskRouterError::WorkerNotFound(phone_number.to_string()))
}

/// First worker listing `skill` among its products, whatever its activity.
pub async fn find_worker_by_skill(
    api: &dyn TaskRouterApi,
    workspace_sid: &str,
    skill: &str,
) -> TaskRouterResult<Option<String>> {
    Ok(api
        .list_workers(workspace_sid)
        .await?
        .into_iter()
        .find(|worker| worker_attributes(worker).is_some_and(|attrs| attrs.has_product(skill)))
        .map(|worker| worker.sid))
}

/// First worker listing `skill` among its products whose current activity is
/// `activity_name`.
pub async fn find_worker_by_skill_in_activity(
    api: &dyn TaskRouterApi,
    workspace_sid: &str,
    skill: &str,
    activity_name: &str,
) -> TaskRouterResult<Option<String>> {
    Ok(api
        .list_workers(workspace_sid)
        .await?
        .into_iter()
        .filter(|worker| worker.activity_sid.is_some() && worker.is_in_activity(activity_name))
        .find(|worker| worker_attributes(worker).is_some_and(|attrs| attrs.has_product(skill)))
        .map(|worker| worker.sid))
}

/// Friendly name of a worker, or [`UNKNOWN_WORKER_NAME`] if it cannot be fetched.
pub async fn worker_name(api: &dyn TaskRouterApi, workspace_sid: &str, worker_sid: &str) -> String {
    match api.fetch_worker(workspace_sid, worker_sid).await {
        Ok(worker) => worker.friendly_name,
        Err(e) => {
            log::warn!("Failed to fetch worker details for {}: {}", worker_sid, e);
            UNKNOWN_WORKER_NAME.to_string()
        }
    }
}

pub async fn find_activity_sid(
    api: &dyn TaskRouterApi,
    workspace_sid: &str,
    activity_name: &str,
) -> TaskRouterResult<String> {
    api.list_activities(workspace_sid)
        .await?
        .into_iter()
        .find(|activity| activity.friendly_name == activity_name)
        .map(|activity| activity.sid)
        .ok_or_else(|| TaskRouterError::ActivityNotFound(activity_name.to_string()))
}

/// Move a worker into the activity called `activity_name`.
pub async fn update_worker_activity(
    api: &dyn TaskRouterApi,
    workspace_sid: &str,
    worker_sid: &str,
    activity_name: &str,
) -> TaskRouterResult<Worker> {
    let activity_sid = find_activity_sid(api, workspace_sid, activity_name).await?;
    let worker = api
        .update_worker(workspace_sid, worker_sid, &UpdateWorker { activity_sid })
        .await?;
    log::info!("Worker {} activity updated to {}", worker_sid, activity_name);
    Ok(worker)
}

/// Attributes of a worker, skipping workers whose JSON does not parse.
fn worker_attributes(worker: &Worker) -> Option<crate::resources::WorkerAttributes> {
    match worker.parsed_attributes()? {
        Ok(attrs) => Some(attrs),
        Err(e) => {
            log::warn!("Failed to parse attributes of worker {}: {}", worker.sid, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTaskRouter;
    use crate::resources::{
        ACTIVITY_AVAILABLE, ACTIVITY_OFFLINE, CreateWorker, CreateWorkspace, Product,
        WorkerAttributes,
    };

    async fn workspace(api: &InMemoryTaskRouter, name: &str) -> String {
        api.create_workspace(&CreateWorkspace {
            friendly_name: name.to_string(),
            event_callback_url: None,
        })
        .await
        .unwrap()
        .sid
    }

    async fn worker(api: &InMemoryTaskRouter, ws: &str, name: &str, attributes: &str) -> String {
        api.create_worker(
            ws,
            &CreateWorker {
                friendly_name: name.to_string(),
                attributes: attributes.to_string(),
            },
        )
        .await
        .unwrap()
        .sid
    }

    fn attrs(product: Product, contact: &str) -> String {
        serde_json::to_string(&WorkerAttributes::new(product, contact)).unwrap()
    }

    #[tokio::test]
    async fn finds_workspace_by_exact_name() {
        let api = InMemoryTaskRouter::new();
        workspace(&api, "Other").await;
        let sid = workspace(&api, "Twilio Center Workspace").await;
        assert_eq!(
            find_workspace_sid(&api, "Twilio Center Workspace").await.unwrap(),
            sid
        );
        let err = find_workspace_sid(&api, "twilio center workspace")
            .await
            .unwrap_err();
        assert!(matches!(err, TaskRouterError::WorkspaceNotFound(_)));
    }

    #[tokio::test]
    async fn finds_worker_by_contact_skipping_bad_attributes() {
        let api = InMemoryTaskRouter::new();
        let ws = workspace(&api, "W").await;
        worker(&api, &ws, "Broken", "not json").await;
        let bob = worker(&api, &ws, "Bob", &attrs(Product::ProgrammableSms, "+123456789")).await;
        assert_eq!(
            find_worker_sid_by_contact(&api, &ws, "+123456789").await.unwrap(),
            bob
        );
        let err = find_worker_sid_by_contact(&api, &ws, "+1999").await.unwrap_err();
        assert!(matches!(err, TaskRouterError::WorkerNotFound(n) if n == "+1999"));
    }

    #[tokio::test]
    async fn available_lookup_requires_skill_and_activity() {
        let api = InMemoryTaskRouter::new();
        let ws = workspace(&api, "W").await;
        let sms = worker(&api, &ws, "Bob", &attrs(Product::ProgrammableSms, "+1")).await;
        let voice_offline =
            worker(&api, &ws, "Ann", &attrs(Product::ProgrammableVoice, "+2")).await;
        let voice = worker(&api, &ws, "TestUser", &attrs(Product::ProgrammableVoice, "+3")).await;

        assert_eq!(
            find_worker_by_skill_in_activity(&api, &ws, "ProgrammableVoice", ACTIVITY_AVAILABLE)
                .await
                .unwrap(),
            None
        );

        api.set_worker_activity(&ws, &sms, ACTIVITY_AVAILABLE);
        api.set_worker_activity(&ws, &voice, ACTIVITY_AVAILABLE);
        assert_eq!(
            find_worker_by_skill_in_activity(&api, &ws, "ProgrammableVoice", ACTIVITY_AVAILABLE)
                .await
                .unwrap(),
            Some(voice.clone())
        );

        // Earlier workers in list order win once they become available.
        api.set_worker_activity(&ws, &voice_offline, ACTIVITY_AVAILABLE);
        assert_eq!(
            find_worker_by_skill_in_activity(&api, &ws, "ProgrammableVoice", ACTIVITY_AVAILABLE)
                .await
                .unwrap(),
            Some(voice_offline)
        );
        assert_eq!(
            find_worker_by_skill_in_activity(&api, &ws, "ProgrammableSMS", ACTIVITY_AVAILABLE)
                .await
                .unwrap(),
            Some(sms)
        );
    }

    #[tokio::test]
    async fn skill_lookup_ignores_activity() {
        let api = InMemoryTaskRouter::new();
        let ws = workspace(&api, "W").await;
        let bob = worker(&api, &ws, "Bob", &attrs(Product::ProgrammableSms, "+1")).await;
        assert_eq!(
            find_worker_by_skill(&api, &ws, "ProgrammableSMS").await.unwrap(),
            Some(bob)
        );
        assert_eq!(
            find_worker_by_skill(&api, &ws, "ProgrammableVoice").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn worker_name_falls_back_to_unknown() {
        let api = InMemoryTaskRouter::new();
        let ws = workspace(&api, "W").await;
        let bob = worker(&api, &ws, "Bob", "{}").await;
        assert_eq!(worker_name(&api, &ws, &bob).await, "Bob");
        assert_eq!(worker_name(&api, &ws, "WKmissing").await, UNKNOWN_WORKER_NAME);
    }

    #[tokio::test]
    async fn updates_activity_by_name() {
        let api = InMemoryTaskRouter::new();
        let ws = workspace(&api, "W").await;
        let bob = worker(&api, &ws, "Bob", "{}").await;
        let updated = update_worker_activity(&api, &ws, &bob, ACTIVITY_AVAILABLE)
            .await
            .unwrap();
        assert_eq!(updated.activity_name.as_deref(), Some(ACTIVITY_AVAILABLE));
        let updated = update_worker_activity(&api, &ws, &bob, ACTIVITY_OFFLINE)
            .await
            .unwrap();
        assert_eq!(updated.activity_name.as_deref(), Some(ACTIVITY_OFFLINE));

        let err = update_worker_activity(&api, &ws, &bob, "On Break")
            .await
            .unwrap_err();
        assert!(matches!(err, TaskRouterError::ActivityNotFound(n) if n == "On Break"));
    }
}
