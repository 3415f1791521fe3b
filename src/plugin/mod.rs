//! The compile-load-swap pipeline.
//!
//! Source text goes in at the front door, the builder turns it into a
//! running module process, the resolver extracts and shape-checks the
//! exported handler, and the registry swaps it in for concurrent
//! readers.

pub mod builder;
pub mod error;
pub mod harness;
pub mod module;
pub mod protocol;
pub mod registry;
pub mod resolver;

pub use builder::ModuleBuilder;
pub use error::{BuildError, ResolutionError, StoreError};
pub use registry::HandlerRegistry;
pub use resolver::{resolve, InstalledHandler, SymbolShape};
