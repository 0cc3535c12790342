//! Background deletion of finished upstream projects.
//!
//! Every answered ask leaves a project behind on the Genspark side. When
//! `auto_delete_chat` is on, the streaming translator hands the project id to
//! a [`SessionReaper`]; a worker task issues the delete call off the response
//! path, so its outcome is only ever logged.

use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::upstream::UpstreamClient;

#[derive(Debug)]
pub struct DeleteJob {
    pub project_id: String,
    pub cookie: Arc<SecretString>,
}

/// Handle to the delete worker. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionReaper {
    tx: mpsc::UnboundedSender<DeleteJob>,
}

impl SessionReaper {
    /// Spawn the worker on the current Tokio runtime.
    pub fn spawn(client: UpstreamClient) -> Self {
        let (reaper, rx) = Self::channel();
        tokio::spawn(run_worker(client, rx));
        reaper
    }

    /// A reaper whose jobs are delivered to the returned receiver instead of
    /// a worker.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DeleteJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a project for deletion. Never blocks.
    pub fn schedule(&self, project_id: &str, cookie: Arc<SecretString>) {
        if project_id.is_empty() {
            debug!("no project id recorded, skipping delete");
            return;
        }
        let job = DeleteJob {
            project_id: project_id.to_string(),
            cookie,
        };
        if self.tx.send(job).is_err() {
            warn!(project_id, "session reaper is not running, project left behind");
        }
    }
}

async fn run_worker(client: UpstreamClient, mut rx: mpsc::UnboundedReceiver<DeleteJob>) {
    while let Some(job) = rx.recv().await {
        let client = client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.delete_project(&job.cookie, &job.project_id).await {
                warn!(error = %e, project_id = %job.project_id, "failed to delete upstream project");
            }
        });
    }
}

/// One-shot cleanup bound to the cookie that created the project.
#[derive(Debug)]
pub struct SessionCleanup {
    reaper: SessionReaper,
    cookie: Arc<SecretString>,
}

impl SessionCleanup {
    pub fn new(reaper: SessionReaper, cookie: Arc<SecretString>) -> Self {
        Self { reaper, cookie }
    }

    pub fn fire(self, project_id: Option<&str>) {
        self.reaper
            .schedule(project_id.unwrap_or_default(), self.cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn cookie() -> Arc<SecretString> {
        Arc::new(SecretString::from("session_id=abc".to_string()))
    }

    #[test]
    fn schedule_queues_job_with_cookie() {
        let (reaper, mut rx) = SessionReaper::channel();
        reaper.schedule("p1", cookie());

        let job = rx.try_recv().unwrap();
        assert_eq!(job.project_id, "p1");
        assert_eq!(job.cookie.expose_secret(), "session_id=abc");
    }

    #[test]
    fn empty_project_id_is_skipped() {
        let (reaper, mut rx) = SessionReaper::channel();
        SessionCleanup::new(reaper.clone(), cookie()).fire(None);
        reaper.schedule("", cookie());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn schedule_after_worker_exit_does_not_panic() {
        let (reaper, rx) = SessionReaper::channel();
        drop(rx);
        reaper.schedule("p1", cookie());
    }
}
