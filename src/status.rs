//! Task status lookup and polling.
//!
//! [`D3Client::poll_status`] is a fixed-interval loop: check the deadline,
//! fetch one snapshot, report it, stop on `completed`/`failed`, otherwise wait
//! and go again. A snapshot is never merged with the previous one.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::client::D3Client;
use crate::error::{D3Error, Result};
use crate::models::{StatusQuery, TaskStatus};
use crate::observer::{BoxObserver, Observer};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Interval, deadline and update observer for [`D3Client::poll_status`]
///
/// An unset or zero interval means 2 seconds; an unset or zero timeout means
/// 5 minutes.
#[derive(Default)]
pub struct PollOptions {
    pub interval: Option<Duration>,
    pub timeout: Option<Duration>,
    on_update: Option<BoxObserver<TaskStatus>>,
}

impl std::fmt::Debug for PollOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollOptions")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}

impl PollOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Call `f` with every fetched snapshot; an error from `f` stops polling
    pub fn on_update<F>(self, f: F) -> Self
    where
        F: FnMut(&TaskStatus) -> Result<()> + Send + 'static,
    {
        self.observer(f)
    }

    pub fn observer(mut self, observer: impl Observer<TaskStatus> + 'static) -> Self {
        self.on_update = Some(Box::new(observer));
        self
    }
}

impl D3Client {
    /// Fetch the current status of a task, or of one file inside it
    pub async fn get_status(&self, query: &StatusQuery) -> Result<TaskStatus> {
        let main_task_id = query.main_task_id.trim();
        if main_task_id.is_empty() {
            return Err(D3Error::validation("main_task_id is required"));
        }

        let mut segments = vec!["status", main_task_id];
        if let Some(file_task_id) = query
            .file_task_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            segments.push(file_task_id);
        }

        self.get_json(&segments, "failed to get status").await
    }

    /// Poll until the task reaches `completed` or `failed`
    ///
    /// The deadline is checked before every fetch, so the loop can time out
    /// without having seen a final snapshot. Fetch and observer errors end the
    /// loop immediately. No sleep happens after a terminal snapshot.
    ///
    /// # Errors
    ///
    /// - `D3Error::Timeout` once `timeout` (5 minutes by default) has elapsed
    /// - any error from [`D3Client::get_status`] or from the update observer
    pub async fn poll_status(
        &self,
        query: &StatusQuery,
        options: PollOptions,
    ) -> Result<TaskStatus> {
        let PollOptions {
            interval,
            timeout,
            mut on_update,
        } = options;
        let interval = interval
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        let timeout = timeout
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_POLL_TIMEOUT);

        info!(
            "Polling task {} every {:?} (timeout {:?})",
            query.main_task_id, interval, timeout
        );

        let start = Instant::now();
        let mut attempt = 0u32;
        loop {
            if start.elapsed() > timeout {
                return Err(D3Error::Timeout { timeout });
            }

            attempt += 1;
            let status = self.get_status(query).await?;
            debug!(
                "Poll {} for task {}: {}",
                attempt, query.main_task_id, status.operation_status
            );

            if let Some(observer) = on_update.as_mut() {
                observer.notify(&status)?;
            }

            if status.is_terminal() {
                info!(
                    "Task {} finished as {} after {} poll(s)",
                    query.main_task_id, status.operation_status, attempt
                );
                return Ok(status);
            }

            sleep(interval).await;
        }
    }
}
