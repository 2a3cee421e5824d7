// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-modules
//!
//! Module resolution, linking and evaluation for Spacey script hosts.
//!
//! This crate turns specifiers written by scripts into loaded, linked and
//! evaluated modules:
//!
//! - A shared [`ModuleResolver`] that loads and compiles every locator once
//! - A per-runtime [`ModuleSystem`] that links, instantiates and evaluates
//!   module graphs, cycles included
//! - [`LegacyRequire`], the synchronous `require()` entry point
//! - Native modules through the [`HostModule`] contract or as plain values
//!
//! Two module conventions are supported: graph modules with static
//! `import`/`export` declarations, and factory modules wrapped in a function
//! receiving `(exports, module, exports)`.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use spacey_host::{ModuleSource, Program, Runtime, Value};
//! use spacey_modules::{
//!     Locator, MemoryLoader, ModuleResolver, ModuleSystem, ProgramTable, ResolverConfig,
//!     SourceData,
//! };
//!
//! let main = ModuleSource::new(|_, env| env.export("answer", Value::from(42))).exports(["answer"]);
//! let compiler = ProgramTable::new().with("main", Program::Module(main));
//! let config = ResolverConfig::default().with_base(Locator::parse("file:///app/").unwrap());
//! let resolver = Arc::new(ModuleResolver::new(
//!     config,
//!     Arc::new(MemoryLoader::new()),
//!     Arc::new(compiler),
//! ));
//!
//! let mut rt = Runtime::new();
//! let system = ModuleSystem::new(resolver, &rt);
//! let source = SourceData::new(Locator::parse("file:///app/main.js").unwrap(), "main");
//! let record = system.run(&mut rt, source).unwrap();
//!
//! let instance = system.instance(&record).unwrap();
//! assert_eq!(instance.get_binding_value("answer"), Value::from(42));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod config;
pub mod error;
pub mod exports;
pub mod instance;
pub mod loader;
pub mod locator;
pub mod record;
pub mod require;
pub mod resolver;
pub mod system;

// Re-exports for convenience
pub use compiler::{Compiler, ProgramTable};
pub use config::ResolverConfig;
pub use error::{LoadError, ModuleError, Result};
pub use exports::{BuiltinModule, ES_MODULE_MARKER, Exports, HostInstance, HostModule, to_es_module_exports};
pub use instance::{InstanceKind, ModuleInstance, Status};
pub use loader::{FsLoader, Loader, MemoryLoader, SourceData};
pub use locator::{Locator, STDIN_LOCATOR};
pub use record::{ModuleId, ModuleRecord, RecordKind, ResolvedBinding};
pub use require::LegacyRequire;
pub use resolver::ModuleResolver;
pub use system::ModuleSystem;
