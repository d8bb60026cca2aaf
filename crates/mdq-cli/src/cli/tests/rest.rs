//! Tests for status, pause, resume, cancel, remove and config.

use super::parse;
use crate::cli::{Cli, CliCommand, ConfigAction};
use clap::Parser;
use mdq_core::model::TaskStatus;

#[test]
fn cli_parse_status() {
    match parse(&["mdq", "status"]) {
        CliCommand::Status { states } => assert!(states.is_empty()),
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_status_filter() {
    match parse(&["mdq", "status", "--state", "queued", "--state", "failed"]) {
        CliCommand::Status { states } => {
            assert_eq!(states, [TaskStatus::Queued, TaskStatus::Failed])
        }
        _ => panic!("expected Status with filter"),
    }
}

#[test]
fn cli_parse_pause() {
    match parse(&["mdq", "pause", "0b6e"]) {
        CliCommand::Pause { id } => assert_eq!(id, "0b6e"),
        _ => panic!("expected Pause"),
    }
}

#[test]
fn cli_parse_resume() {
    match parse(&["mdq", "resume", "abc"]) {
        CliCommand::Resume { id } => assert_eq!(id, "abc"),
        _ => panic!("expected Resume"),
    }
}

#[test]
fn cli_parse_cancel_delete_file() {
    match parse(&["mdq", "cancel", "abc", "--delete-file"]) {
        CliCommand::Cancel { id, delete_file } => {
            assert_eq!(id, "abc");
            assert!(delete_file);
        }
        _ => panic!("expected Cancel"),
    }
}

#[test]
fn cli_parse_remove() {
    match parse(&["mdq", "remove", "99"]) {
        CliCommand::Remove { id, delete_file } => {
            assert_eq!(id, "99");
            assert!(!delete_file);
        }
        _ => panic!("expected Remove"),
    }
}

#[test]
fn cli_parse_config_set() {
    match parse(&["mdq", "config", "set", "max_concurrent_downloads", "4"]) {
        CliCommand::Config {
            action: ConfigAction::Set { key, value },
        } => {
            assert_eq!(key, "max_concurrent_downloads");
            assert_eq!(value, "4");
        }
        _ => panic!("expected Config Set"),
    }
}

#[test]
fn cli_parse_config_show() {
    assert!(matches!(
        parse(&["mdq", "config", "show"]),
        CliCommand::Config {
            action: ConfigAction::Show
        }
    ));
}

#[test]
fn cli_requires_task_id() {
    assert!(Cli::try_parse_from(["mdq", "pause"]).is_err());
}
