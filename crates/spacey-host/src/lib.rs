// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-host
//!
//! The host-engine embedding contract the Spacey module layer is written
//! against.
//!
//! This crate does not evaluate expressions. It provides the pieces an
//! engine hands to a module loader:
//!
//! - Values with identity-bearing objects and functions
//! - A per-virtual-user [`Runtime`] with globals and call-stack capture
//! - Compiled [`Program`]s in the two module conventions
//! - The [`ModuleEnvironment`] seen by graph-module bodies
//!
//! ## Quick Start
//!
//! ```rust
//! use spacey_host::{Runtime, Script, Value};
//!
//! let mut rt = Runtime::new();
//! let script = Script::new("file:///main.js", |_| Ok(Value::from(3)));
//! assert_eq!(rt.run_script(&script).unwrap(), Value::from(3));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod function;
pub mod object;
pub mod program;
pub mod runtime;
pub mod value;

// Re-exports for convenience
pub use error::{Exception, Result};
pub use function::{Function, NATIVE_SOURCE, StackFrame};
pub use object::Object;
pub use program::{LiveBinding, ModuleEnvironment, ModuleSource, Program, Script};
pub use runtime::{Runtime, RuntimeId};
pub use value::Value;
