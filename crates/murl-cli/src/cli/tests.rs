//! CLI parse tests.

use super::Cli;
use clap::Parser;
use std::path::PathBuf;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn cli_parse_url_only() {
    let cli = parse(&["mount-url", "http://example.com/file.bin"]);
    assert_eq!(cli.url, "http://example.com/file.bin");
    assert!(cli.dir.is_none());
}

#[test]
fn cli_parse_url_and_dir() {
    let cli = parse(&["mount-url", "https://example.com/a.iso", "/tmp/links"]);
    assert_eq!(cli.dir, Some(PathBuf::from("/tmp/links")));
}

#[test]
fn cli_parse_auth_flag() {
    let cli = parse(&[
        "mount-url",
        "http://example.com/f",
        "--auth",
        "user:p:ss",
    ]);
    assert_eq!(cli.auth.as_deref(), Some("user:p:ss"));
}

#[test]
fn cli_requires_url() {
    assert!(Cli::try_parse_from(["mount-url"]).is_err());
}

#[test]
fn cli_rejects_extra_positionals() {
    assert!(Cli::try_parse_from(["mount-url", "http://a/f", "/tmp", "extra"]).is_err());
}
