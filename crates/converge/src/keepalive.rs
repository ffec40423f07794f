//! Keep-alive grants held for the duration of a run
//!
//! A provisioning pass may need a time-boxed grant (typically a sudo
//! timestamp) that must be renewed while steps run and released when the run
//! ends. [`KeepAliveScope`] ties the grant to a lexical scope so release
//! happens exactly once, whichever way the run exits.

use crate::error::KeepAliveError;

/// A time-boxed grant that must be kept alive and released explicitly
pub trait KeepAlive {
    /// Acquire the grant and start renewing it
    fn acquire(&mut self) -> Result<(), KeepAliveError>;

    /// Stop renewing and give the grant back
    fn release(&mut self);
}

/// No grant needed (already privileged, or nothing privileged to do)
pub struct NoKeepAlive;

impl KeepAlive for NoKeepAlive {
    fn acquire(&mut self) -> Result<(), KeepAliveError> {
        Ok(())
    }

    fn release(&mut self) {}
}

/// Scope guard: acquires on creation, releases on drop
pub struct KeepAliveScope<'a> {
    inner: &'a mut dyn KeepAlive,
}

impl<'a> KeepAliveScope<'a> {
    /// Acquire the grant; nothing is held if acquisition fails
    pub fn acquire(inner: &'a mut dyn KeepAlive) -> Result<Self, KeepAliveError> {
        inner.acquire()?;
        log::debug!("keep-alive grant acquired");
        Ok(Self { inner })
    }
}

impl Drop for KeepAliveScope<'_> {
    fn drop(&mut self) {
        self.inner.release();
        log::debug!("keep-alive grant released");
    }
}
