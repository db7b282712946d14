// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Command execution
//!
//! Attenuation and frequency changes are admitted synchronously and run one
//! at a time on a worker task. Progress is reported through an optional
//! callback: QUEUED on admission, IN_PROGRESS when the worker starts, then
//! COMPLETED, FAILED or ABORTED.
//!
//! Commands do not take the sensor register lock. A command's effect shows
//! up in published state only after the register is refreshed.

use b5dc_device::B5dcFrequency;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::device_handle::DeviceHandle;

pub const TASK_QUEUED_MESSAGE: &str = "Task queued";
pub const COMMAND_NOT_ALLOWED_MESSAGE: &str = "Command is not allowed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Aborted,
    Rejected,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskStatus::Queued => "QUEUED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Aborted => "ABORTED",
            TaskStatus::Rejected => "REJECTED",
        })
    }
}

/// One progress report
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    pub progress: Option<String>,
    pub result: Option<String>,
}

impl TaskUpdate {
    fn status(status: TaskStatus) -> Self {
        Self {
            status,
            progress: None,
            result: None,
        }
    }

    fn progress(message: String) -> Self {
        Self {
            status: TaskStatus::InProgress,
            progress: Some(message),
            result: None,
        }
    }

    fn result(status: TaskStatus, message: String) -> Self {
        Self {
            status,
            progress: None,
            result: Some(message),
        }
    }
}

pub type TaskCallback = Arc<dyn Fn(TaskUpdate) + Send + Sync>;

#[derive(Debug, Clone)]
enum Command {
    SetAttenuation {
        attenuation_db: i64,
        register: String,
    },
    SetFrequency(B5dcFrequency),
}

struct QueuedTask {
    command: Command,
    callback: Option<TaskCallback>,
    /// Abort epoch at admission
    epoch: u64,
}

impl QueuedTask {
    fn report(&self, update: TaskUpdate) {
        if let Some(callback) = &self.callback {
            callback(update);
        }
    }
}

pub struct CommandExecutor {
    handle: Arc<DeviceHandle>,
    queue: mpsc::UnboundedSender<QueuedTask>,
    abort_epoch: Arc<AtomicU64>,
}

impl CommandExecutor {
    /// Create the executor and spawn its worker on `runtime`
    ///
    /// The worker exits when the executor is dropped.
    pub fn spawn(runtime: &Handle, handle: Arc<DeviceHandle>) -> Self {
        let (queue, receiver) = mpsc::unbounded_channel();
        let abort_epoch = Arc::new(AtomicU64::new(0));

        let worker = Worker {
            handle: Arc::clone(&handle),
            abort_epoch: Arc::clone(&abort_epoch),
        };
        runtime.spawn(worker.run(receiver));

        Self {
            handle,
            queue,
            abort_epoch,
        }
    }

    /// Admission predicate: a session and facade currently exist
    pub fn is_command_allowed(&self) -> bool {
        self.handle.is_ready()
    }

    /// Queue an attenuation change; range checking is left to the device
    pub fn set_attenuation(
        &self,
        attenuation_db: i64,
        register: &str,
        callback: Option<TaskCallback>,
    ) -> (TaskStatus, String) {
        self.submit(
            Command::SetAttenuation {
                attenuation_db,
                register: register.to_string(),
            },
            callback,
        )
    }

    /// Validate the frequency selector, then queue the change
    pub fn set_frequency(
        &self,
        frequency: i64,
        callback: Option<TaskCallback>,
    ) -> (TaskStatus, String) {
        let frequency = match B5dcFrequency::try_from(frequency) {
            Ok(frequency) => frequency,
            Err(e) => {
                error!(target: "b5dc-supervisor", "Invalid frequency value supplied: {}", e);
                return (
                    TaskStatus::Rejected,
                    format!(
                        "Invalid frequency value supplied: {}. Expected B5dcFrequency enum value \
                         (ie: B5dcFrequency.F_11_1_GHZ(1), B5dcFrequency.F_13_2_GHZ(2) or \
                         B5dcFrequency.F_13_86_GHZ(3))",
                        frequency
                    ),
                );
            }
        };

        self.submit(Command::SetFrequency(frequency), callback)
    }

    /// Mark every task admitted so far as aborted
    ///
    /// Tasks the worker has already started are unaffected.
    pub fn abort_commands(&self) -> (TaskStatus, String) {
        let epoch = self.abort_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        info!(target: "b5dc-supervisor", "Aborting queued commands (abort epoch {})", epoch);
        (TaskStatus::Completed, "Abort completed".to_string())
    }

    fn submit(&self, command: Command, callback: Option<TaskCallback>) -> (TaskStatus, String) {
        if !self.is_command_allowed() {
            return (TaskStatus::Rejected, COMMAND_NOT_ALLOWED_MESSAGE.to_string());
        }

        let task = QueuedTask {
            command,
            callback,
            epoch: self.abort_epoch.load(Ordering::SeqCst),
        };
        task.report(TaskUpdate::status(TaskStatus::Queued));

        if self.queue.send(task).is_err() {
            error!(target: "b5dc-supervisor", "Command worker is not running");
            return (TaskStatus::Rejected, COMMAND_NOT_ALLOWED_MESSAGE.to_string());
        }

        (TaskStatus::Queued, TASK_QUEUED_MESSAGE.to_string())
    }
}

struct Worker {
    handle: Arc<DeviceHandle>,
    abort_epoch: Arc<AtomicU64>,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<QueuedTask>) {
        while let Some(task) = receiver.recv().await {
            self.execute(task).await;
        }
        debug!(target: "b5dc-supervisor", "Command worker stopped");
    }

    async fn execute(&self, task: QueuedTask) {
        let progress = match &task.command {
            Command::SetAttenuation {
                attenuation_db,
                register,
            } => format!(
                "Called SetAttenuation with args (attenuation_db={}, attn_reg_name={})",
                attenuation_db, register
            ),
            Command::SetFrequency(frequency) => {
                format!("Called SetFrequency with arg (frequency={})", frequency)
            }
        };
        debug!(target: "b5dc-supervisor", "{}", progress);

        if task.epoch < self.abort_epoch.load(Ordering::SeqCst) {
            task.report(TaskUpdate::status(TaskStatus::Aborted));
            return;
        }

        task.report(TaskUpdate::progress(progress));

        let active = self.handle.current();
        let outcome = match (&task.command, &active) {
            (_, None) => Err("Connection not yet established or lost".to_string()),
            (
                Command::SetAttenuation {
                    attenuation_db,
                    register,
                },
                Some(active),
            ) => active
                .facade
                .set_attenuation(*attenuation_db, register)
                .await
                .map_err(|e| e.to_string()),
            (Command::SetFrequency(frequency), Some(active)) => active
                .facade
                .set_frequency(*frequency)
                .await
                .map_err(|e| e.to_string()),
        };

        let update = match (&task.command, outcome) {
            (
                Command::SetAttenuation {
                    attenuation_db,
                    register,
                },
                Ok(()),
            ) => TaskUpdate::result(
                TaskStatus::Completed,
                format!("SetAttenuation({}, {}) completed", attenuation_db, register),
            ),
            (Command::SetAttenuation { register, .. }, Err(e)) => {
                let message = format!(
                    "An error occured on setting the B5dc attenuation on {}: {}",
                    register, e
                );
                error!(target: "b5dc-supervisor", "{}", message);
                TaskUpdate::result(TaskStatus::Failed, message)
            }
            (Command::SetFrequency(frequency), Ok(())) => TaskUpdate::result(
                TaskStatus::Completed,
                format!("SetFrequency({}) completed", frequency),
            ),
            (Command::SetFrequency(_), Err(e)) => {
                let message = format!("An error occured on setting the B5dc frequency: {}", e);
                error!(target: "b5dc-supervisor", "{}", message);
                TaskUpdate::result(TaskStatus::Failed, message)
            }
        };

        task.report(update);
    }
}
