use std::sync::Arc;
use log::error;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere to run a request once it has been accepted.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Task);
}

/// Runs tasks on the tokio blocking pool, at most `workers` at a time.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    /// Must be called from within a tokio runtime.
    pub fn new(workers: usize) -> Self {
        Self {
            handle: Handle::current(),
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// One worker per available CPU.
    pub fn with_default_parallelism() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(workers)
    }
}

impl Executor for WorkerPool {
    fn execute(&self, task: Task) {
        let permits = self.permits.clone();
        self.handle.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            if let Err(err) = tokio::task::spawn_blocking(task).await {
                error!("worker task failed: {err}");
            }
        });
    }
}

/// Runs the task on the calling thread before returning.
#[derive(Debug, Default, Clone)]
pub struct Inline;

impl Executor for Inline {
    fn execute(&self, task: Task) {
        task()
    }
}
