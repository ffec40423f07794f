//! Teardown on SIGINT, SIGTERM and SIGHUP

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

fn signal_name(sig: i32) -> &'static str {
    match sig {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        SIGHUP => "SIGHUP",
        _ => "UNKNOWN",
    }
}

/// Install the handlers; call once, before the sudo grant is acquired
///
/// On a signal the grant is invalidated if it is held and the process exits
/// with `128 + signal`.
pub fn install(grant_held: Arc<AtomicBool>) -> Result<(), std::io::Error> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                log::info!("received {}, cleaning up", signal_name(sig));
                if grant_held.swap(false, Ordering::SeqCst) {
                    crate::sudo::invalidate();
                }
                eprintln!();
                std::process::exit(128 + sig);
            }
        })?;

    Ok(())
}
