//! Sudo grant held for the length of a run
//!
//! The grant is acquired once, before the first step, and renewed in the
//! background so long package installs never hit the sudo timeout:
//! 1. `sudo -v` prompts for the password (once)
//! 2. A thread refreshes the timestamp with `sudo -n -v` every minute
//! 3. On release the thread is stopped and the timestamp invalidated (`sudo -k`)

use converge::{KeepAlive, KeepAliveError};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the sudo timestamp is refreshed
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Keep-alive backed by the sudo timestamp
pub struct SudoKeepAlive {
    reason: String,
    interval: Duration,
    held: Arc<AtomicBool>,
    refresher: Option<(Sender<()>, JoinHandle<()>)>,
}

impl SudoKeepAlive {
    /// `reason` is shown before the password prompt
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            interval: REFRESH_INTERVAL,
            held: Arc::new(AtomicBool::new(false)),
            refresher: None,
        }
    }

    /// Flag that is true while the grant is held, shared with the signal handler
    pub fn held(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.held)
    }

    fn spawn_refresher(&self) -> Result<(Sender<()>, JoinHandle<()>), KeepAliveError> {
        let (stop, stopped) = mpsc::channel::<()>();
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("sudo-keepalive".into())
            .spawn(move || {
                // Disconnect counts as a stop too
                while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(interval) {
                    if !refresh() {
                        log::warn!("could not refresh sudo timestamp");
                    }
                }
            })
            .map_err(|e| KeepAliveError(format!("failed to start refresher: {e}")))?;

        Ok((stop, handle))
    }
}

fn refresh() -> bool {
    Command::new("sudo")
        .args(["-n", "-v"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

/// Invalidate the cached sudo timestamp
pub fn invalidate() {
    let _ = Command::new("sudo")
        .arg("-k")
        .stdin(Stdio::null())
        .status();
}

impl KeepAlive for SudoKeepAlive {
    fn acquire(&mut self) -> Result<(), KeepAliveError> {
        eprintln!();
        eprintln!("  Sudo required: {}", self.reason);
        eprintln!();

        let status = Command::new("sudo")
            .arg("-v")
            .status()
            .map_err(|e| KeepAliveError(format!("failed to execute sudo: {e}")))?;
        if !status.success() {
            return Err(KeepAliveError("sudo authentication failed".into()));
        }

        self.held.store(true, Ordering::SeqCst);
        match self.spawn_refresher() {
            Ok(refresher) => {
                self.refresher = Some(refresher);
                log::info!("sudo grant acquired, refreshing every {:?}", self.interval);
                Ok(())
            }
            Err(e) => {
                self.held.store(false, Ordering::SeqCst);
                invalidate();
                Err(e)
            }
        }
    }

    fn release(&mut self) {
        if let Some((stop, handle)) = self.refresher.take() {
            let _ = stop.send(());
            if handle.join().is_err() {
                log::warn!("sudo refresher thread panicked");
            }
        }
        if self.held.swap(false, Ordering::SeqCst) {
            invalidate();
            log::info!("sudo grant released");
        }
    }
}

impl Drop for SudoKeepAlive {
    fn drop(&mut self) {
        self.release();
    }
}
