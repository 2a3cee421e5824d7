// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-runtime module instances

use crate::error::ModuleError;
use crate::record::{FactoryInstance, GraphInstance, ModuleRecord, NativeInstance, PlainInstance};
use parking_lot::Mutex;
use spacey_host::{Object, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

/// Evaluation state of an instance.
#[derive(Debug, Clone)]
pub enum Status {
    /// Bindings exist; the body has not run
    Instantiated,
    /// The body is running
    Evaluating,
    /// The body ran to completion
    Evaluated,
    /// The body, or one of its dependencies, failed
    Failed(ModuleError),
}

/// The variant-specific part of an instance.
pub enum InstanceKind {
    /// See [`GraphInstance`]
    Graph(GraphInstance),
    /// See [`FactoryInstance`]
    Factory(FactoryInstance),
    /// See [`NativeInstance`]
    Native(NativeInstance),
    /// See [`PlainInstance`]
    Plain(PlainInstance),
}

/// One runtime's binding environment for a module record.
pub struct ModuleInstance {
    record: Arc<ModuleRecord>,
    kind: InstanceKind,
    status: Mutex<Status>,
    // specifier -> dependency, graph modules only
    imports: OnceLock<HashMap<String, Weak<ModuleInstance>>>,
    namespace: OnceLock<Object>,
}

impl ModuleInstance {
    pub(crate) fn new(record: Arc<ModuleRecord>, kind: InstanceKind) -> Self {
        let status = match kind {
            // nothing left to run
            InstanceKind::Native(_) | InstanceKind::Plain(_) => Status::Evaluated,
            InstanceKind::Graph(_) | InstanceKind::Factory(_) => Status::Instantiated,
        };
        Self {
            record,
            kind,
            status: Mutex::new(status),
            imports: OnceLock::new(),
            namespace: OnceLock::new(),
        }
    }

    /// The record this instance belongs to.
    pub fn record(&self) -> &Arc<ModuleRecord> {
        &self.record
    }

    /// The variant-specific part.
    pub fn kind(&self) -> &InstanceKind {
        &self.kind
    }

    /// Current evaluation state.
    pub fn status(&self) -> Status {
        self.status.lock().clone()
    }

    pub(crate) fn set_status(&self, status: Status) {
        *self.status.lock() = status;
    }

    /// Move from `Instantiated` to `Evaluating`. Returns the state found
    /// when the instance was already past that point.
    pub(crate) fn begin_evaluation(&self) -> Option<Status> {
        let mut status = self.status.lock();
        match &*status {
            Status::Instantiated => {
                *status = Status::Evaluating;
                None
            }
            other => Some(other.clone()),
        }
    }

    /// Whether the body ran to completion.
    pub fn is_evaluated(&self) -> bool {
        matches!(*self.status.lock(), Status::Evaluated)
    }

    /// Current value of an export binding.
    pub fn get_binding_value(&self, name: &str) -> Value {
        match &self.kind {
            InstanceKind::Graph(graph) => graph.get_binding_value(name),
            InstanceKind::Factory(factory) => factory.get_binding_value(name),
            InstanceKind::Native(native) => native.get_binding_value(name),
            InstanceKind::Plain(plain) => plain.get_binding_value(name),
        }
    }

    pub(crate) fn wire_imports(&self, imports: HashMap<String, Weak<ModuleInstance>>) {
        let _ = self.imports.set(imports);
    }

    /// The instance a graph module's specifier was linked to.
    pub(crate) fn imported(&self, specifier: &str) -> Option<Arc<ModuleInstance>> {
        self.imports.get()?.get(specifier)?.upgrade()
    }

    pub(crate) fn cached_namespace(&self) -> Option<Object> {
        self.namespace.get().cloned()
    }

    pub(crate) fn cache_namespace(&self, namespace: Object) -> Object {
        self.namespace.get_or_init(|| namespace).clone()
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("record", &self.record)
            .field("status", &*self.status.lock())
            .finish()
    }
}
