//! Task-set ownership for one active role controller.
//!
//! Every periodic task and receive loop of a role is spawned through a
//! [`Lifecycle`]. Raising its stop signal is observed by each task at its
//! next wake-up; [`Lifecycle::shutdown`] raises the signal and then awaits
//! every handle, so a successor task set never overlaps with its predecessor.

use log::{debug, error};
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Receiving half of the stop signal, cloned into every task.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_raised(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal is raised or its owner is gone.
    pub async fn raised(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

pub struct Lifecycle {
    stop_tx: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            stop_tx,
            tasks: Vec::new(),
        }
    }

    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.stop_tx.subscribe(),
        }
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!("Spawning task {}", name);
        self.tasks.push((name, tokio::spawn(task)));
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Raises the stop signal and waits for every task to finish.
    pub async fn shutdown(self) {
        self.stop();
        for (name, handle) in self.tasks {
            match handle.await {
                Ok(()) => debug!("Task {} stopped", name),
                Err(e) => error!("Task {} ended abnormally: {}", name, e),
            }
        }
    }
}
