//! # Mapping Facade
//!
//! Async facade over an opaque, stateful mapping engine.
//!
//! - [`EngineLibrary`]: explicitly owned library handle (init / terminate)
//! - [`MapBuilder`]: synchronous engine boundary
//! - [`LockedMappingFacade`]: implements [`contracts::MappingEngine`] with try-lock
//!   semantics and per-call timeouts
//! - [`InMemoryMapBuilder`]: stand-in engine used when no native engine is linked

mod builder;
mod error;
mod facade;
mod in_memory;
mod library;

pub use builder::{MapBuilder, MapSnapshot};
pub use error::{FacadeError, Result};
pub use facade::LockedMappingFacade;
pub use in_memory::{InMemoryConfig, InMemoryMapBuilder};
pub use library::EngineLibrary;
