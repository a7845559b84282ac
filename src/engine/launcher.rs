use super::cancel::CancellationFlag;
use super::error::EngineError;
use super::orchestrator::RunOrchestrator;
use crate::shared::ids::RunId;
use crate::store::WorkflowRunRecord;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// Launches runs on background threads with a fixed concurrency bound.
/// `launch` blocks the caller while the pool is saturated, so admission
/// order follows call order.
pub struct RunLauncher {
    orchestrator: Arc<RunOrchestrator>,
    max_concurrent: usize,
    gate: Arc<(Mutex<usize>, Condvar)>,
}

impl RunLauncher {
    pub fn new(orchestrator: Arc<RunOrchestrator>, max_concurrent: usize) -> Self {
        Self {
            orchestrator,
            max_concurrent: max_concurrent.max(1),
            gate: Arc::new((Mutex::new(0), Condvar::new())),
        }
    }

    pub fn active_runs(&self) -> usize {
        let (lock, _) = &*self.gate;
        match lock.lock() {
            Ok(active) => *active,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn launch(
        &self,
        run_id: RunId,
        cancel: CancellationFlag,
    ) -> JoinHandle<Result<WorkflowRunRecord, EngineError>> {
        self.acquire_permit();
        let orchestrator = Arc::clone(&self.orchestrator);
        let gate = Arc::clone(&self.gate);
        thread::spawn(move || {
            let _permit = Permit { gate };
            orchestrator.execute_run_now(&run_id, &cancel)
        })
    }

    fn acquire_permit(&self) {
        let (lock, cvar) = &*self.gate;
        let mut active = match lock.lock() {
            Ok(active) => active,
            Err(poisoned) => poisoned.into_inner(),
        };
        while *active >= self.max_concurrent {
            active = match cvar.wait(active) {
                Ok(active) => active,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        *active += 1;
    }
}

/// Releases the slot when the run thread exits, panics included.
struct Permit {
    gate: Arc<(Mutex<usize>, Condvar)>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.gate;
        let mut active = match lock.lock() {
            Ok(active) => active,
            Err(poisoned) => poisoned.into_inner(),
        };
        *active = active.saturating_sub(1);
        cvar.notify_one();
    }
}
