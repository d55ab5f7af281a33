//! # Transport Process
//!
//! Lifecycle of the transport child: spawn with the console wired to the
//! probe, a bounded readiness wait, and a stop sequence that escalates
//! from console EOF to SIGINT to SIGKILL.

use std::process::{Child, ChildStdin, ChildStdout, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::Context;

use crate::transport::{PipeRole, TransportCmd};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Startup allowance before the probe starts using the console.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

/// How long the child gets to exit after SIGINT before SIGKILL.
const STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// Poll cadence for child liveness.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

// ─── Transport Process ───────────────────────────────────────────────────────

/// A running transport child with the probe's end of its console.
pub struct TransportProcess {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
}

impl TransportProcess {
    /// Spawn the transport with stdio wired for the command's role. The
    /// unused console direction is discarded; stderr stays on the
    /// operator's terminal.
    pub fn spawn(cmd: &TransportCmd) -> anyhow::Result<Self> {
        let mut command = cmd.command();
        match cmd.role {
            PipeRole::Feed => command.stdin(Stdio::piped()).stdout(Stdio::null()),
            PipeRole::Tap => command.stdin(Stdio::null()).stdout(Stdio::piped()),
        };
        command.stderr(Stdio::inherit());

        tracing::info!(cmd = ?command, "spawning transport");
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start transport {:?}", cmd.program))?;

        let stdin = match cmd.role {
            PipeRole::Feed => Some(child.stdin.take().context("transport stdin unavailable")?),
            PipeRole::Tap => None,
        };
        let stdout = match cmd.role {
            PipeRole::Tap => Some(child.stdout.take().context("transport stdout unavailable")?),
            PipeRole::Feed => None,
        };

        Ok(TransportProcess {
            child: Some(child),
            stdin,
            stdout,
        })
    }

    /// Give the child `settle` to bring its sockets up, failing if it
    /// exits in that window. Liveness after settle is the readiness
    /// signal; the probe never parses the transport's console chatter.
    pub fn wait_ready(&mut self, settle: Duration) -> anyhow::Result<()> {
        let child = self.child.as_mut().context("transport already stopped")?;
        let deadline = Instant::now() + settle;
        loop {
            if let Some(status) = child.try_wait()? {
                anyhow::bail!("transport exited during startup: {status}");
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(POLL_INTERVAL));
        }
    }

    /// Writer end of the child's console (feed role).
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// Reader end of the child's console (tap role).
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Stop the child. Console EOF first so a feed-role transport can
    /// flush in-flight units, then SIGINT, then SIGKILL if it lingers.
    pub fn stop(&mut self) -> anyhow::Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        drop(self.stdin.take());
        drop(self.stdout.take());

        if let Ok(Some(status)) = child.try_wait() {
            tracing::debug!(%status, "transport already exited");
            return Ok(());
        }

        send_sigint(&child);
        match wait_with_timeout(&mut child, STOP_TIMEOUT) {
            Ok(status) => tracing::info!(%status, "transport stopped"),
            Err(_) => {
                tracing::warn!("transport ignored SIGINT, killing");
                child.kill().context("failed to kill transport")?;
                let status = child.wait()?;
                tracing::info!(%status, "transport killed");
            }
        }
        Ok(())
    }
}

impl Drop for TransportProcess {
    fn drop(&mut self) {
        // Reaching here without stop() means an error path; don't linger.
        if let Some(mut child) = self.child.take() {
            drop(self.stdin.take());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn send_sigint(child: &Child) {
    #[cfg(unix)]
    {
        let pid = child.id() as libc::pid_t;
        // SAFETY: `child.id()` is the OS pid of our own child. Sending
        // SIGINT is safe; if it already exited, kill returns ESRCH.
        unsafe {
            libc::kill(pid, libc::SIGINT);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child;
    }
}

/// Wait for the child to exit, polling with a deadline.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> anyhow::Result<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait()? {
            Some(status) => return Ok(status),
            None => {
                if Instant::now() >= deadline {
                    anyhow::bail!("timeout waiting for transport to exit");
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}
