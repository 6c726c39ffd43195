use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Shared interrupt flag. Workers check it before taking each unit of work.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Routes Ctrl-C to `flag`. Call once per process.
pub fn install_interrupt_handler(flag: &CancelFlag) -> Result<()> {
    let flag = flag.clone();
    ctrlc::set_handler(move || {
        if !flag.is_cancelled() {
            warn!("interrupt received; finishing in-flight calls and writing a partial report");
        }
        flag.cancel();
    })
    .context("installing interrupt handler")
}
