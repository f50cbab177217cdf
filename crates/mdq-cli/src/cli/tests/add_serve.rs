//! Tests for add and serve subcommands.

use super::parse;
use crate::cli::{playlist_hint, Cli, CliCommand, FormatArg};
use clap::Parser;

#[test]
fn cli_parse_add_defaults() {
    match parse(&["mdq", "add", "https://example.com/watch?v=1"]) {
        CliCommand::Add {
            url,
            format,
            quality,
            playlist,
            no_playlist,
        } => {
            assert_eq!(url, "https://example.com/watch?v=1");
            assert_eq!(format, FormatArg::Audio);
            assert_eq!(quality, "best");
            assert!(!playlist);
            assert!(!no_playlist);
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_parse_add_video_quality_playlist() {
    match parse(&[
        "mdq",
        "add",
        "https://example.com/playlist?list=PL1",
        "--format",
        "video",
        "--quality",
        "720",
        "--playlist",
    ]) {
        CliCommand::Add {
            format,
            quality,
            playlist,
            no_playlist,
            ..
        } => {
            assert_eq!(format, FormatArg::Video);
            assert_eq!(quality, "720");
            assert!(playlist);
            assert!(!no_playlist);
        }
        _ => panic!("expected Add with options"),
    }
}

#[test]
fn cli_parse_add_rejects_both_playlist_flags() {
    let res = Cli::try_parse_from([
        "mdq",
        "add",
        "https://example.com/x",
        "--playlist",
        "--no-playlist",
    ]);
    assert!(res.is_err());
}

#[test]
fn cli_parse_add_rejects_unknown_format() {
    assert!(Cli::try_parse_from(["mdq", "add", "https://example.com/x", "--format", "gif"]).is_err());
}

#[test]
fn playlist_hint_mapping() {
    assert_eq!(playlist_hint(false, false), None);
    assert_eq!(playlist_hint(true, false), Some(true));
    assert_eq!(playlist_hint(false, true), Some(false));
}

#[test]
fn cli_parse_serve_with_socket() {
    let cli = Cli::try_parse_from(["mdq", "serve", "--socket", "/tmp/mdq.sock"]).unwrap();
    assert!(matches!(cli.command, CliCommand::Serve));
    assert_eq!(cli.socket.as_deref(), Some(std::path::Path::new("/tmp/mdq.sock")));
}
