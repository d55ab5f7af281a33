//! # Transport Invocation
//!
//! Builds the command line for the transport binary under test. The
//! transport bridges its console (stdin/stdout, addressed as `file://con`)
//! and an `srt://` network address; which side gets the console decides
//! the probe's direction. NAK reports and linger are disabled so the
//! stream under test is the raw delivery order.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Console pseudo-address: the child's own stdin/stdout.
pub const CONSOLE: &str = "file://con";

/// Query attributes every invocation carries.
const BASE_QUERY: &str = "nakreport=0&linger=0";

// ─── Pipe Role ───────────────────────────────────────────────────────────────

/// Which end of the child's console the probe drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeRole {
    /// The probe writes units into the child's stdin.
    Feed,
    /// The probe reads units from the child's stdout.
    Tap,
}

// ─── Transport Command ───────────────────────────────────────────────────────

/// A fully-built transport invocation.
#[derive(Debug, Clone)]
pub struct TransportCmd {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub role: PipeRole,
}

impl TransportCmd {
    /// Caller side: console in, network out to the receiving peer.
    pub fn sender(program: &Path, ip: &str, port: u16, attrs: Option<&str>) -> Self {
        let uri = with_attrs(format!("srt://{ip}:{port}?{BASE_QUERY}"), attrs);
        TransportCmd {
            program: program.to_path_buf(),
            args: vec![CONSOLE.to_string(), uri],
            role: PipeRole::Feed,
        }
    }

    /// Listener side: network in, console out to the probe.
    pub fn receiver(program: &Path, port: u16, attrs: Option<&str>) -> Self {
        let uri = with_attrs(format!("srt://:{port}?{BASE_QUERY}"), attrs);
        TransportCmd {
            program: program.to_path_buf(),
            args: vec![uri, CONSOLE.to_string()],
            role: PipeRole::Tap,
        }
    }

    /// Caller side of a redundancy group: the same stream goes out over
    /// every node link, and the receiving group is expected to deduplicate.
    pub fn redundant_sender(program: &Path, nodes: &[String], attrs: Option<&str>) -> Self {
        let uri = with_attrs(format!("srt://*?type=redundancy&{BASE_QUERY}"), attrs);
        let mut args = vec![CONSOLE.to_string(), "-g".to_string(), uri];
        args.extend(nodes.iter().cloned());
        TransportCmd {
            program: program.to_path_buf(),
            args,
            role: PipeRole::Feed,
        }
    }

    /// Listener side of a redundancy group.
    pub fn redundant_receiver(program: &Path, port: u16, attrs: Option<&str>) -> Self {
        let uri = with_attrs(format!("srt://:{port}?groupconnect=true&{BASE_QUERY}"), attrs);
        TransportCmd {
            program: program.to_path_buf(),
            args: vec![uri, CONSOLE.to_string()],
            role: PipeRole::Tap,
        }
    }

    /// Build the `Command`, stdio not yet wired.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Append user attributes to a query URI, tolerating a stray leading
/// separator.
fn with_attrs(mut uri: String, attrs: Option<&str>) -> String {
    if let Some(attrs) = attrs {
        let attrs = attrs.trim_start_matches(['&', '?']);
        if !attrs.is_empty() {
            uri.push('&');
            uri.push_str(attrs);
        }
    }
    uri
}
