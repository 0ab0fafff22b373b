//! Cooperative cancellation for in-flight transactions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{CustodyError, CustodyResult};

/// Shared flag checked by signing workers before each pre-image
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> CustodyResult<()> {
        if self.is_cancelled() {
            Err(CustodyError::cancelled("Transaction cancelled"))
        } else {
            Ok(())
        }
    }
}
