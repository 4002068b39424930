//! Single-flight guard: at most one loop invocation per session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::PilotError;

/// Try-acquire flag. Acquisition never waits; a held guard is reported as
/// [`PilotError::Busy`].
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Result<FlightPermit, PilotError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PilotError::Busy)?;
        Ok(FlightPermit {
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the lifetime of a run; releases the guard on drop.
#[derive(Debug)]
pub struct FlightPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let guard = SingleFlight::new();
        let permit = guard.try_acquire().unwrap();
        assert!(guard.is_busy());
        assert!(matches!(guard.try_acquire(), Err(PilotError::Busy)));

        drop(permit);
        assert!(!guard.is_busy());
        assert!(guard.try_acquire().is_ok());
    }

    #[test]
    fn clones_share_state() {
        let guard = SingleFlight::new();
        let other = guard.clone();
        let _permit = guard.try_acquire().unwrap();
        assert!(other.try_acquire().is_err());
    }
}
