// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiler collaborator

use dashmap::DashMap;
use spacey_host::{Exception, Program};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Turns source text into an executable program.
///
/// The returned [`Program`] variant tells whether the source follows the
/// import/export convention or the factory convention.
pub trait Compiler: Send + Sync {
    /// Compile `source`, naming the program `name`.
    fn compile(&self, source: &str, name: &str, is_builtin: bool) -> Result<Program, Exception>;
}

/// A compiler backed by a table of precompiled programs, keyed by their
/// source text.
///
/// Useful for hosts that ship pre-built bundles, and for exercising the
/// module layer without a parser.
#[derive(Debug, Default)]
pub struct ProgramTable {
    programs: DashMap<String, Program>,
    compilations: AtomicUsize,
}

impl ProgramTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the program produced for `source`.
    pub fn insert(&self, source: &str, program: Program) {
        self.programs.insert(source.trim().to_string(), program);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(self, source: &str, program: Program) -> Self {
        self.insert(source, program);
        self
    }

    /// Number of `compile` calls so far.
    pub fn compile_count(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }
}

impl Compiler for ProgramTable {
    fn compile(&self, source: &str, name: &str, _is_builtin: bool) -> Result<Program, Exception> {
        self.compilations.fetch_add(1, Ordering::SeqCst);
        self.programs
            .get(source.trim())
            .map(|entry| entry.value().with_name(name))
            .ok_or_else(|| Exception::syntax_error(format!("{name}: Unexpected token")))
    }
}
