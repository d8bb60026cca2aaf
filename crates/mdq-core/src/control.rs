//! Control protocol spoken over the Unix socket while `mdq run` owns the scheduler.
//!
//! One JSON object per line in each direction: the client writes a
//! `ControlRequest`, the server answers with one `ControlResponse`.

use serde::{Deserialize, Serialize};

use crate::config::{DownloadConfig, DownloadConfigPatch};
use crate::model::{DownloadRequest, DownloadStatistics, DownloadTask, TaskFilter, TaskId};
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ControlRequest {
    Submit {
        request: DownloadRequest,
    },
    Pause {
        id: TaskId,
    },
    Resume {
        id: TaskId,
    },
    Cancel {
        id: TaskId,
        #[serde(default)]
        delete_file: bool,
    },
    Delete {
        id: TaskId,
        #[serde(default)]
        delete_file: bool,
    },
    List {
        #[serde(default)]
        filter: TaskFilter,
    },
    Get {
        id: TaskId,
    },
    Statistics,
    Config,
    UpdateConfig {
        patch: DownloadConfigPatch,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ControlResponse {
    Task { task: DownloadTask },
    Tasks { tasks: Vec<DownloadTask> },
    Statistics { statistics: DownloadStatistics },
    Config { config: DownloadConfig },
    Error { message: String },
}

impl ControlRequest {
    /// Run the request against `scheduler`. Scheduler errors become `Error` responses.
    pub fn apply(self, scheduler: &Scheduler) -> ControlResponse {
        let task = |r: Result<DownloadTask, crate::error::SchedulerError>| match r {
            Ok(task) => ControlResponse::Task { task },
            Err(e) => ControlResponse::Error {
                message: e.to_string(),
            },
        };
        match self {
            ControlRequest::Submit { request } => task(scheduler.submit(request)),
            ControlRequest::Pause { id } => task(scheduler.pause(&id)),
            ControlRequest::Resume { id } => task(scheduler.resume(&id)),
            ControlRequest::Cancel { id, delete_file } => task(scheduler.cancel(&id, delete_file)),
            ControlRequest::Delete { id, delete_file } => task(scheduler.delete(&id, delete_file)),
            ControlRequest::Get { id } => task(scheduler.get(&id)),
            ControlRequest::List { filter } => ControlResponse::Tasks {
                tasks: scheduler.list(&filter),
            },
            ControlRequest::Statistics => ControlResponse::Statistics {
                statistics: scheduler.statistics(),
            },
            ControlRequest::Config => ControlResponse::Config {
                config: scheduler.config(),
            },
            ControlRequest::UpdateConfig { patch } => match scheduler.update_config(&patch) {
                Ok(config) => ControlResponse::Config { config },
                Err(e) => ControlResponse::Error {
                    message: e.to_string(),
                },
            },
        }
    }
}

/// Serialize `msg` as one protocol line (with trailing newline).
pub fn encode_line<T: Serialize>(msg: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;

    #[test]
    fn request_wire_shape() {
        let line = encode_line(&ControlRequest::Cancel {
            id: "abc".to_string(),
            delete_file: true,
        })
        .unwrap();
        assert!(line.ends_with('\n'));
        let v: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(v["cmd"], "cancel");
        assert_eq!(v["id"], "abc");
        assert_eq!(v["delete_file"], true);

        let req: ControlRequest = serde_json::from_str(r#"{"cmd":"pause","id":"x"}"#).unwrap();
        assert!(matches!(req, ControlRequest::Pause { id } if id == "x"));
        let req: ControlRequest = serde_json::from_str(r#"{"cmd":"list"}"#).unwrap();
        assert!(matches!(req, ControlRequest::List { filter } if filter.statuses.is_empty()));
        let req: ControlRequest =
            serde_json::from_str(r#"{"cmd":"update_config","patch":{"wifi_only":true}}"#).unwrap();
        assert!(
            matches!(req, ControlRequest::UpdateConfig { patch } if patch.wifi_only == Some(true))
        );
    }

    #[test]
    fn filter_uses_snake_case_statuses() {
        let req: ControlRequest =
            serde_json::from_str(r#"{"cmd":"list","filter":{"statuses":["queued","paused"]}}"#)
                .unwrap();
        match req {
            ControlRequest::List { filter } => {
                assert_eq!(filter.statuses, [TaskStatus::Queued, TaskStatus::Paused])
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn error_response_shape() {
        let line = encode_line(&ControlResponse::Error {
            message: "unknown task: x".to_string(),
        })
        .unwrap();
        let back: ControlResponse = serde_json::from_str(&line).unwrap();
        assert!(matches!(back, ControlResponse::Error { message } if message.contains("x")));
    }
}
