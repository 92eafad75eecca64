//! Per-bot deploy slots
//!
//! At most one deploy per bot id runs at a time: it owns the bot's workspace
//! and its `service-<id>` container namespace. Different bots never block
//! each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::errors::ManagerError;
use crate::models::bot::BotId;

/// What to do when the bot already has a deploy in flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Queue behind the running deploy
    #[default]
    Wait,

    /// Refuse with a conflict
    Reject,
}

/// Exclusive hold on a bot's deploy slot, released on drop
#[derive(Debug)]
pub struct DeployGuard {
    bot_id: BotId,
    _guard: OwnedMutexGuard<()>,
}

impl DeployGuard {
    pub fn bot_id(&self) -> BotId {
        self.bot_id
    }
}

/// Registry of per-bot slots
#[derive(Debug, Default)]
pub struct DeployLocks {
    slots: StdMutex<HashMap<BotId, Arc<Mutex<()>>>>,
}

impl DeployLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, bot_id: BotId) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(bot_id).or_default().clone()
    }

    /// Wait for the bot's slot
    pub async fn acquire(&self, bot_id: BotId) -> DeployGuard {
        let slot = self.slot(bot_id);
        if slot.try_lock().is_err() {
            debug!(bot_id, "Deploy in progress, waiting for slot");
        }
        DeployGuard {
            bot_id,
            _guard: slot.lock_owned().await,
        }
    }

    /// Take the bot's slot if it is free
    pub fn try_acquire(&self, bot_id: BotId) -> Option<DeployGuard> {
        let slot = self.slot(bot_id);
        slot.try_lock_owned().ok().map(|guard| DeployGuard {
            bot_id,
            _guard: guard,
        })
    }

    /// Take the bot's slot according to `policy`
    pub async fn acquire_with(
        &self,
        bot_id: BotId,
        policy: BusyPolicy,
    ) -> Result<DeployGuard, ManagerError> {
        match policy {
            BusyPolicy::Wait => Ok(self.acquire(bot_id).await),
            BusyPolicy::Reject => self.try_acquire(bot_id).ok_or_else(|| {
                ManagerError::Conflict(format!("bot {} already has a deploy in progress", bot_id))
            }),
        }
    }

    /// Whether the bot currently has a deploy in flight
    pub fn is_busy(&self, bot_id: BotId) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .get(&bot_id)
            .map(|slot| slot.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Drop the bot's slot once nobody holds or awaits it
    pub fn forget(&self, bot_id: BotId) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if slots
            .get(&bot_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&bot_id);
        }
    }

    /// Wait until every known slot is free
    pub async fn drain(&self) {
        let slots: Vec<Arc<Mutex<()>>> = {
            let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.values().cloned().collect()
        };
        let busy = slots.iter().filter(|slot| slot.try_lock().is_err()).count();
        if busy > 0 {
            debug!("Waiting for {} deploys to finish", busy);
        }
        join_all(slots.iter().map(|slot| slot.lock())).await;
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
