//! Trigscript – a small trigger scripting engine
//!
//! This crate compiles short imperative scripts into syntax trees and runs
//! them in response to host events:
//! - Lexer and recursive-descent parser producing a serializable AST
//! - Tree-walking interpreter with a per-node interrupt hook and step/depth ceilings
//! - Host-registered executors (`#Name`) and conditions (`?name`)
//! - Shared global variables (`global.name`)
//! - Per-actor cooldowns set by scripts and enforced before each activation
//! - Concurrent, fire-and-forget activations on the tokio blocking pool

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Lexer, parser, AST and interpreter
pub mod interpreter;

/// Trigger manager, registries and activation plumbing
pub mod runtime;

// Re-export key types for convenience
pub use interpreter::{CompileError, Script, Value};
pub use runtime::{Bindings, EngineConfig, Trigger, TriggerManager};

/// Current version of the trigscript crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
