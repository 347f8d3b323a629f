pub mod config;
pub mod error;
pub mod logging;
pub mod lookup;
pub mod memory;
pub mod provision;
pub mod resources;
pub mod server;
pub mod signature;
pub mod taskrouter;
pub mod twiml;

use anyhow::Context;
use config::AppConfig;
use memory::InMemoryTaskRouter;
use provision::{ProvisionPlan, provision};
use server::{AppState, startup};
use std::sync::Arc;
use taskrouter::{TaskRouterApi, TwilioTaskRouter};
use tokio::signal;

/// The webhook service: provisions the remote workspace, then serves routes.
pub struct CallCenter {
    config: AppConfig,
}

impl CallCenter {
    pub fn new(config: AppConfig) -> Self {
        CallCenter { config }
    }

    pub fn taskrouter(&self) -> anyhow::Result<Arc<dyn TaskRouterApi>> {
        if self.config.offline {
            log::warn!("Running offline against an in-memory task router");
            return Ok(Arc::new(InMemoryTaskRouter::new()));
        }
        let client = TwilioTaskRouter::from_config(&self.config)
            .context("Failed to build TaskRouter client")?;
        Ok(Arc::new(client))
    }

    /// Provisioning must succeed before the server binds its socket.
    pub async fn prepare(&self) -> anyhow::Result<AppState> {
        let taskrouter = self.taskrouter()?;
        if self.config.skip_provisioning {
            log::warn!("Skipping workspace provisioning");
        } else {
            let plan = ProvisionPlan::for_host(&self.config.host_url);
            let report = provision(taskrouter.as_ref(), &plan)
                .await
                .context("Workspace provisioning failed")?;
            log::info!(
                "Workspace {} ready with workflow {}",
                report.workspace_sid,
                report.workflow_sid
            );
        }
        Ok(AppState::new(self.config.clone(), taskrouter))
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let app_state = self.prepare().await?;
        tokio::select! {
            res = startup(app_state) => res.context("HTTP server failed"),
            _ = signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down");
                Ok(())
            }
        }
    }

    pub fn start(&self) -> anyhow::Result<()> {
        actix_web::rt::System::new().block_on(self.run())
    }
}
