//! Bulk operations across every registered bot

use api_models::models::BulkFailure;
use serde::Serialize;
use tracing::{error, info};

use crate::deploy::orchestrator::Deployer;
use crate::errors::ManagerError;
use crate::models::bot::Bot;
use crate::models::deployment::Deployment;

/// Outcome of a deploy-all run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkDeployReport {
    /// One finished record per bot that could be attempted
    pub deployments: Vec<Deployment>,

    /// Bots whose attempt could not be made at all
    pub failures: Vec<BulkFailure>,
}

async fn bots_in_registration_order(deployer: &Deployer) -> Result<Vec<Bot>, ManagerError> {
    let mut bots = deployer.store().list_bots().await?;
    bots.sort_by_key(|bot| bot.id);
    Ok(bots)
}

impl Deployer {
    /// Deploy every bot, one after the other. One bot's failure never stops the batch.
    pub async fn deploy_all(&self) -> Result<BulkDeployReport, ManagerError> {
        let bots = bots_in_registration_order(self).await?;
        info!("Deploying all {} bots", bots.len());

        let mut report = BulkDeployReport::default();
        for bot in bots {
            match self.deploy(&bot).await {
                Ok(deployment) => report.deployments.push(deployment),
                Err(e) => {
                    error!(bot_id = bot.id, "Deploy failed: {}", e);
                    report.failures.push(BulkFailure {
                        bot_id: bot.id,
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Delete every bot, removing each conventional container best-effort.
    /// Returns how many bots were deleted.
    pub async fn delete_all(&self) -> Result<usize, ManagerError> {
        let bots = bots_in_registration_order(self).await?;
        let mut deleted = 0;

        for bot in bots {
            match self.delete_bot(bot.id).await {
                Ok(()) => deleted += 1,
                Err(e) => error!(bot_id = bot.id, "Failed to delete bot: {}", e),
            }
        }

        info!("Deleted {} bots", deleted);
        Ok(deleted)
    }
}
