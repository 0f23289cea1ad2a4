//! Fixed-cadence background tasks.
//!
//! Each registered task gets its own tokio task ticking on an interval until
//! the scheduler is shut down. A tick never overlaps the previous one.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[async_trait]
pub trait PeriodicTask: Send + Sync {
    fn name(&self) -> &'static str;

    // Must handle its own failures; the next tick is the retry.
    async fn tick(&self);
}

pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    pub fn register(&mut self, period: Duration, task: Arc<dyn PeriodicTask>) {
        let mut stop = self.shutdown.subscribe();
        info!(task = task.name(), period_secs = period.as_secs_f64(), "periodic task registered");

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => task.tick().await,
                    _ = stop.changed() => break,
                }
            }
            debug!(task = task.name(), "periodic task stopped");
        });

        self.handles.push(handle);
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
