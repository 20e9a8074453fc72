//! Per-workspace single-flight for batch jobs.
//!
//! At most one migrate, repair, or disable runs per workspace at a time.
//! Different workspaces never contend. A lease is released when dropped,
//! including when the job holding it is cancelled or panics.

use crate::error::{EngineError, EngineResult};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Registry of workspaces with a job in flight.
#[derive(Clone, Default)]
pub struct WorkspaceLocks {
    active: Arc<Mutex<HashSet<String>>>,
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the workspace's lease, failing fast if it is held.
    pub fn try_acquire(&self, workspace_id: &str) -> EngineResult<WorkspaceLease> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(workspace_id.to_string()) {
            debug!("lease contention for workspace {workspace_id}");
            return Err(EngineError::JobInProgress(workspace_id.to_string()));
        }
        Ok(WorkspaceLease {
            workspace_id: workspace_id.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_locked(&self, workspace_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(workspace_id)
    }
}

/// Exclusive right to run a job on one workspace.
#[derive(Debug)]
pub struct WorkspaceLease {
    workspace_id: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl WorkspaceLease {
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }
}

impl Drop for WorkspaceLease {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.workspace_id);
    }
}
