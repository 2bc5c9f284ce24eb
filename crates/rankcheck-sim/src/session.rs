//! Scoped backend lifecycle.
//!
//! A [`BackendSession`] owns the exclusive borrow of a backend between setup
//! and teardown. Teardown runs exactly once on every exit path: explicitly
//! through [`BackendSession::close`], or from `Drop` when an error unwinds the
//! caller early. [`BackendSession::pause`] is the one way to leave the backend
//! running for inspection; it yields a [`PausedSession`] whose drop does
//! nothing.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::backend::{BackendParams, ExecutionBackend};

/// A backend between setup and teardown.
#[derive(Debug)]
pub struct BackendSession<'a, B: ExecutionBackend> {
    backend: &'a mut B,
    armed: bool,
}

impl<'a, B: ExecutionBackend> BackendSession<'a, B> {
    /// Run backend setup and start the session.
    ///
    /// # Errors
    ///
    /// Returns the setup error. Teardown has already run by then.
    pub fn open(backend: &'a mut B, params: &BackendParams) -> Result<Self> {
        // Armed before setup so a partial setup is still released.
        let session = Self {
            backend,
            armed: true,
        };
        info!(
            time_scale_factor = params.time_scale_factor,
            timestep_ms = params.timestep_ms,
            "backend setup"
        );
        session
            .backend
            .simulation_setup(params)
            .context("backend setup failed")?;
        Ok(session)
    }

    pub fn backend(&mut self) -> &mut B {
        &mut *self.backend
    }

    /// Tear down now and report the outcome.
    ///
    /// # Errors
    ///
    /// Returns the backend's teardown error.
    pub fn close(mut self) -> Result<()> {
        self.armed = false;
        info!("backend teardown");
        self.backend
            .simulation_teardown()
            .context("backend teardown failed")
    }

    /// Keep the backend in its post-run state instead of tearing it down.
    #[must_use]
    pub fn pause(mut self) -> PausedSession<'a, B> {
        self.armed = false;
        info!("backend paused, teardown deferred");
        PausedSession { session: self }
    }
}

impl<B: ExecutionBackend> Drop for BackendSession<'_, B> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        info!("backend teardown");
        if let Err(err) = self.backend.simulation_teardown() {
            warn!(error = %err, "backend teardown failed");
        }
    }
}

/// A session whose teardown was skipped on purpose.
///
/// Dropping it leaves the backend untouched.
#[derive(Debug)]
pub struct PausedSession<'a, B: ExecutionBackend> {
    session: BackendSession<'a, B>,
}

impl<B: ExecutionBackend> PausedSession<'_, B> {
    /// Inspect the post-run backend state.
    pub fn backend(&self) -> &B {
        &*self.session.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut *self.session.backend
    }

    /// End the pause and release the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend's teardown error.
    pub fn teardown(self) -> Result<()> {
        let mut session = self.session;
        info!("backend teardown after pause");
        session
            .backend
            .simulation_teardown()
            .context("backend teardown failed")
    }
}

/// Pause hook for interactive binaries: block until a line arrives on
/// `input`, so the paused backend can be inspected from outside.
///
/// # Errors
///
/// Fails if the prompt cannot be written or `input` cannot be read.
pub fn wait_for_line<R: BufRead, W: Write>(input: &mut R, prompt: &mut W) -> Result<()> {
    write!(prompt, "Backend paused. Press Enter to tear down... ")?;
    prompt.flush()?;
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("failed to read from stdin while paused")?;
    Ok(())
}

/// [`wait_for_line`] on the process's stdin and stderr.
///
/// # Errors
///
/// See [`wait_for_line`].
pub fn wait_for_enter() -> Result<()> {
    wait_for_line(&mut io::stdin().lock(), &mut io::stderr())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_for_line_consumes_one_line() {
        let mut input = io::Cursor::new(b"\nrest\n".to_vec());
        let mut prompt = Vec::new();
        wait_for_line(&mut input, &mut prompt).expect("line available");

        assert!(String::from_utf8_lossy(&prompt).contains("Press Enter"));
        let mut rest = String::new();
        input.read_line(&mut rest).expect("read");
        assert_eq!(rest, "rest\n");
    }
}
