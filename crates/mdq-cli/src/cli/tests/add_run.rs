//! Tests for add and run subcommands.

use super::parse;
use crate::cli::commands::AddArgs;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use mdq_core::model::{Priority, Quality};

#[test]
fn cli_parse_add_defaults() {
    match parse(&["mdq", "add", "https://example.com/ep1.mp4"]) {
        CliCommand::Add {
            url,
            source_id,
            output,
            priority,
            quality,
            size,
            sha256,
            title,
        } => {
            assert_eq!(url, "https://example.com/ep1.mp4");
            assert!(source_id.is_none());
            assert!(output.is_none());
            assert_eq!(priority, Priority::Normal);
            assert_eq!(quality, Quality::Medium);
            assert!(size.is_none() && sha256.is_none() && title.is_none());
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_parse_add_all_flags() {
    match parse(&[
        "mdq",
        "add",
        "https://example.com/x",
        "--priority",
        "urgent",
        "--quality",
        "full_hd",
        "-o",
        "shows/x.mp4",
        "--source-id",
        "show-7",
        "--size",
        "2048",
        "--title",
        "Episode 7",
    ]) {
        CliCommand::Add {
            priority,
            quality,
            output,
            source_id,
            size,
            title,
            ..
        } => {
            assert_eq!(priority, Priority::Urgent);
            assert_eq!(quality, Quality::FullHd);
            assert_eq!(output.as_deref(), Some(std::path::Path::new("shows/x.mp4")));
            assert_eq!(source_id.as_deref(), Some("show-7"));
            assert_eq!(size, Some(2048));
            assert_eq!(title.as_deref(), Some("Episode 7"));
        }
        _ => panic!("expected Add with flags"),
    }
}

#[test]
fn cli_parse_add_priority_case_insensitive() {
    match parse(&["mdq", "add", "https://example.com/x", "--priority", "HIGH"]) {
        CliCommand::Add { priority, .. } => assert_eq!(priority, Priority::High),
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_rejects_unknown_priority() {
    assert!(Cli::try_parse_from(["mdq", "add", "https://example.com/x", "--priority", "asap"]).is_err());
}

#[test]
fn add_args_default_source_id_to_url() {
    let request = AddArgs {
        url: "https://example.com/a.mp4".to_string(),
        source_id: None,
        output: None,
        priority: Priority::Low,
        quality: Quality::Low,
        size: Some(10),
        sha256: None,
        title: Some("A".to_string()),
    }
    .into_request();
    assert_eq!(request.source_id, "https://example.com/a.mp4");
    assert_eq!(request.file_size, Some(10));
    assert_eq!(request.metadata.title.as_deref(), Some("A"));
    assert_eq!(request.priority, Priority::Low);
}

#[test]
fn cli_parse_run() {
    match parse(&["mdq", "run"]) {
        CliCommand::Run { watch } => assert!(!watch),
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_watch() {
    match parse(&["mdq", "run", "--watch"]) {
        CliCommand::Run { watch } => assert!(watch),
        _ => panic!("expected Run with --watch"),
    }
}
