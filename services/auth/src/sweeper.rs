//! Scheduled removal of expired sessions

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info};

use crate::repositories::{SessionRepository, SessionStoreResult};

/// Periodically deletes expired sessions
#[derive(Clone)]
pub struct SessionSweeper {
    sessions: SessionRepository,
}

impl SessionSweeper {
    pub fn new(sessions: SessionRepository) -> Self {
        Self { sessions }
    }

    /// Run one sweep, returning the number of deleted sessions
    pub async fn sweep(&self) -> SessionStoreResult<u64> {
        let deleted = self.sessions.delete_expired().await?;
        info!(deleted, "Expired session sweep finished");
        Ok(deleted)
    }

    /// Start the sweep on a cron schedule (with seconds field)
    ///
    /// The returned scheduler must be kept alive for the job to keep running.
    pub async fn start(&self, schedule: &str) -> Result<JobScheduler, JobSchedulerError> {
        let sweeper = self.clone();

        let scheduler = JobScheduler::new().await?;

        let job = Job::new_async(schedule, move |_, _| {
            let sweeper = sweeper.clone();
            Box::pin(async move {
                if let Err(e) = sweeper.sweep().await {
                    error!("Failed to sweep expired sessions: {}", e);
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started session sweep scheduler with schedule: {}", schedule);
        Ok(scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewSession, SessionMetadata};
    use common::database::init_memory_pool;

    #[tokio::test]
    async fn test_sweep_removes_only_expired_sessions() {
        let sessions = SessionRepository::new(init_memory_pool().await.unwrap());
        for (id, ttl) in [("live", 24), ("expired", -2)] {
            sessions
                .create(&NewSession {
                    session_id: id.to_string(),
                    token: String::new(),
                    metadata: SessionMetadata {
                        profile_id: id.to_string(),
                        client_ip: None,
                    },
                    ttl_hours: ttl,
                })
                .await
                .unwrap();
        }

        let sweeper = SessionSweeper::new(sessions.clone());
        assert_eq!(sweeper.sweep().await.unwrap(), 1);
        assert!(sessions.get("live").await.unwrap().is_some());
        assert!(sessions.get("expired").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_schedule_is_rejected() {
        let sessions = SessionRepository::new(init_memory_pool().await.unwrap());
        let sweeper = SessionSweeper::new(sessions);
        assert!(sweeper.start("not a schedule").await.is_err());
    }
}
