//! EngineLibrary - explicitly owned mapping engine library handle
//!
//! Constructed once at startup, shared by reference with every facade, released at
//! shutdown (explicitly via [`EngineLibrary::terminate`] or on drop).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use contracts::{EngineConfig, EngineError};
use tracing::{debug, info, instrument};

use crate::error::{FacadeError, Result};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Mapping engine library handle
#[derive(Debug)]
pub struct EngineLibrary {
    handle: u64,
    config: EngineConfig,
    active: AtomicBool,
}

impl EngineLibrary {
    /// Initialize the engine library
    ///
    /// # Errors
    /// [`FacadeError::InitFailed`] if the configuration is unusable.
    #[instrument(name = "engine_library_init", skip(config), fields(map = %config.map_name))]
    pub fn init(config: EngineConfig) -> Result<Self> {
        if config.map_name.trim().is_empty() {
            return Err(FacadeError::init_failed("map name cannot be empty"));
        }

        let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        info!(handle, map = %config.map_name, "mapping engine library initialized");

        Ok(Self {
            handle,
            config,
            active: AtomicBool::new(true),
        })
    }

    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Release the library
    ///
    /// Idempotent; returns true only for the call that actually released it.
    pub fn terminate(&self) -> bool {
        let released = self.active.swap(false, Ordering::AcqRel);
        if released {
            info!(handle = self.handle, "mapping engine library terminated");
        }
        released
    }

    /// Fail with [`EngineError::Terminated`] once the library is released
    pub fn ensure_active(&self) -> std::result::Result<(), EngineError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(EngineError::Terminated)
        }
    }
}

impl Drop for EngineLibrary {
    fn drop(&mut self) {
        if self.terminate() {
            debug!(handle = self.handle, "library released on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_and_terminate() {
        let library = EngineLibrary::init(EngineConfig::default()).unwrap();
        assert!(library.is_active());
        assert!(library.ensure_active().is_ok());

        assert!(library.terminate());
        assert!(!library.terminate());
        assert_eq!(library.ensure_active(), Err(EngineError::Terminated));
    }

    #[test]
    fn test_init_rejects_blank_map_name() {
        let config = EngineConfig {
            map_name: "  ".into(),
            ..Default::default()
        };
        assert!(matches!(
            EngineLibrary::init(config),
            Err(FacadeError::InitFailed { .. })
        ));
    }

    #[test]
    fn test_handles_are_distinct() {
        let a = EngineLibrary::init(EngineConfig::default()).unwrap();
        let b = EngineLibrary::init(EngineConfig::default()).unwrap();
        assert_ne!(a.handle(), b.handle());
    }
}
