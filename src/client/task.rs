//! Asynchronous task protocol
//!
//! Long-running dashboard mutations answer `202 Accepted` with a task
//! descriptor `{name, metadata}`. The client then polls
//! `GET /api/task?name=<name>` until a finished task with the same name and
//! metadata shows up:
//!
//! ```text
//! Dispatched ──▶ Poll ──▶ Poll ──▶ ... ──▶ Completed { success | failure }
//!                 └─ executing / not yet visible ─┘
//! ```

use crate::context::OpContext;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::{decode, ApiRequest, CephClient};

/// Descriptor returned with `202 Accepted`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub name: String,
    #[serde(default)]
    pub metadata: Value,
}

/// One entry of the task listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub begin_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub ret_value: Option<Value>,
    #[serde(default)]
    pub exception: Option<Value>,
}

impl TaskInfo {
    fn matches(&self, handle: &TaskHandle) -> bool {
        self.name == handle.name && metadata_eq(&self.metadata, &handle.metadata)
    }

    /// Human-readable failure reason
    fn failure_message(&self) -> String {
        match &self.exception {
            Some(Value::Object(obj)) => obj
                .get("detail")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => match &self.ret_value {
                Some(v) if !v.is_null() => v.to_string(),
                _ => "task reported failure without detail".to_string(),
            },
            Some(other) => other.to_string(),
        }
    }

    /// Wall-clock duration, when both timestamps parse
    fn elapsed(&self) -> Option<chrono::Duration> {
        let begin = chrono::DateTime::parse_from_rfc3339(self.begin_time.as_deref()?).ok()?;
        let end = chrono::DateTime::parse_from_rfc3339(self.end_time.as_deref()?).ok()?;
        Some(end - begin)
    }
}

/// Absent metadata on either side is treated as an empty object
fn metadata_eq(a: &Value, b: &Value) -> bool {
    let empty = |v: &Value| v.is_null() || v.as_object().is_some_and(|o| o.is_empty());
    (empty(a) && empty(b)) || a == b
}

/// Response of `GET /api/task`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskList {
    #[serde(default)]
    pub executing_tasks: Vec<TaskInfo>,
    #[serde(default)]
    pub finished_tasks: Vec<TaskInfo>,
}

impl CephClient {
    /// Poll the task endpoint until `handle` completes, returning its
    /// `ret_value` on success. Each call owns its own ticker.
    pub(crate) async fn wait_for_task(&self, ctx: &OpContext, handle: &TaskHandle) -> Result<Value> {
        let mut ticker = tokio::time::interval(self.inner.task_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls = 0u32;

        loop {
            ctx.run(async {
                ticker.tick().await;
                Ok(())
            })
            .await?;
            polls += 1;

            let request = ApiRequest::get("task").query("name", &handle.name);
            let response = self.exchange(ctx, &request).await?;
            let tasks: TaskList = decode(&response.body)?;

            if let Some(done) = tasks.finished_tasks.iter().find(|t| t.matches(handle)) {
                return match done.success {
                    Some(true) => {
                        debug!(
                            "Task {} finished after {} polls ({:?})",
                            handle.name,
                            polls,
                            done.elapsed()
                        );
                        Ok(done.ret_value.clone().unwrap_or(Value::Null))
                    }
                    _ => Err(Error::TaskFailed {
                        task: handle.name.clone(),
                        message: done.failure_message(),
                    }),
                };
            }

            match tasks.executing_tasks.iter().find(|t| t.matches(handle)) {
                Some(running) => debug!(
                    "Task {} executing ({}%)",
                    handle.name,
                    running.progress.unwrap_or(0.0)
                ),
                None => debug!("Task {} not visible yet", handle.name),
            }
        }
    }
}
