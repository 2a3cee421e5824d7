// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module records
//!
//! A record is the compiled, linkable form of one module. Records are shared
//! by every runtime; per-runtime state lives in
//! [`ModuleInstance`](crate::instance::ModuleInstance).
//!
//! Four kinds of module exist:
//! - graph modules (import/export convention)
//! - factory modules (function-wrapped, `require()` convention)
//! - native modules following the [`HostModule`] contract
//! - plain native values

mod factory;
mod graph;
mod host;

pub use factory::{FactoryInstance, FactoryModule};
pub use graph::{GraphInstance, GraphModule};
pub use host::{NativeInstance, NativeModule, PlainInstance, PlainModule};

use crate::exports::HostModule;
use crate::instance::InstanceKind;
use spacey_host::{ModuleSource, Runtime, Script, Value};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`ModuleRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u64);

impl ModuleId {
    fn next() -> Self {
        Self(NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// Where an exported name lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinding {
    /// Module holding the binding
    pub module: ModuleId,
    /// Name of the binding inside that module
    pub binding_name: String,
}

/// The variant-specific part of a record.
pub enum RecordKind {
    /// Import/export convention
    Graph(GraphModule),
    /// Factory convention
    Factory(FactoryModule),
    /// Native module with a structured exports record
    Native(NativeModule),
    /// Native value exposed as is
    Plain(PlainModule),
}

/// One loadable module.
pub struct ModuleRecord {
    id: ModuleId,
    name: String,
    kind: RecordKind,
}

impl ModuleRecord {
    fn new(name: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            id: ModuleId::next(),
            name: name.into(),
            kind,
        }
    }

    /// A graph module compiled from `source`.
    pub fn graph(name: impl Into<String>, source: ModuleSource) -> Self {
        Self::new(name, RecordKind::Graph(GraphModule::new(source)))
    }

    /// A factory module compiled from `script`.
    pub fn factory(name: impl Into<String>, script: Script) -> Self {
        Self::new(name, RecordKind::Factory(FactoryModule::new(script)))
    }

    /// A native module following the module contract.
    pub fn native(name: impl Into<String>, module: Arc<dyn HostModule>) -> Self {
        Self::new(name, RecordKind::Native(NativeModule::new(module)))
    }

    /// A plain native value.
    pub fn plain(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, RecordKind::Plain(PlainModule::new(value)))
    }

    /// The record's identity.
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Locator or built-in name the record was resolved under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The variant-specific part.
    pub fn kind(&self) -> &RecordKind {
        &self.kind
    }

    /// Whether the module is natively provided.
    pub fn is_native(&self) -> bool {
        matches!(self.kind, RecordKind::Native(_) | RecordKind::Plain(_))
    }

    /// Statically known dependencies. Only graph modules have any; factory
    /// modules discover theirs while running.
    pub fn requested_modules(&self) -> &[String] {
        match &self.kind {
            RecordKind::Graph(graph) => graph.requested_modules(),
            RecordKind::Factory(_) | RecordKind::Native(_) | RecordKind::Plain(_) => &[],
        }
    }

    /// Create a fresh binding environment for one runtime. No module code
    /// runs here, except for native modules building their instance.
    pub fn instantiate(&self, rt: &mut Runtime) -> InstanceKind {
        match &self.kind {
            RecordKind::Graph(graph) => InstanceKind::Graph(graph.instantiate()),
            RecordKind::Factory(factory) => InstanceKind::Factory(factory.instantiate()),
            RecordKind::Native(native) => InstanceKind::Native(native.instantiate(rt)),
            RecordKind::Plain(plain) => InstanceKind::Plain(plain.instantiate()),
        }
    }

    /// Exported names.
    ///
    /// # Panics
    ///
    /// For factory and native modules the names are only known once a first
    /// instance exists (native) or a first body has finished (factory);
    /// asking earlier is a bug in the caller.
    pub fn exported_names(&self) -> Vec<String> {
        match &self.kind {
            RecordKind::Graph(graph) => graph.exported_names().to_vec(),
            RecordKind::Factory(factory) => factory.exported_names(&self.name),
            RecordKind::Native(native) => native.exported_names(&self.name),
            RecordKind::Plain(plain) => plain.exported_names(&self.name),
        }
    }

    /// Resolve an exported name to its binding. Re-exports are not
    /// supported, so bindings always live in this module.
    pub fn resolve_export(&self, name: &str) -> Option<ResolvedBinding> {
        let local = match &self.kind {
            RecordKind::Graph(graph) => graph.declares(name),
            RecordKind::Factory(_) | RecordKind::Native(_) | RecordKind::Plain(_) => true,
        };
        local.then(|| ResolvedBinding {
            module: self.id,
            binding_name: name.to_string(),
        })
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            RecordKind::Graph(_) => "graph",
            RecordKind::Factory(_) => "factory",
            RecordKind::Native(_) => "native",
            RecordKind::Plain(_) => "plain",
        };
        f.debug_struct("ModuleRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}
