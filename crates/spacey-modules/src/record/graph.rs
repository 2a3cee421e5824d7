// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Import/export convention modules

use indexmap::IndexMap;
use parking_lot::RwLock;
use spacey_host::{ModuleEnvironment, ModuleSource, Runtime, Value};

/// A module with statically declared imports and exports.
pub struct GraphModule {
    source: ModuleSource,
}

impl GraphModule {
    pub(crate) fn new(source: ModuleSource) -> Self {
        Self { source }
    }

    /// The compiled module.
    pub fn source(&self) -> &ModuleSource {
        &self.source
    }

    /// Specifiers of the module's static imports.
    pub fn requested_modules(&self) -> &[String] {
        self.source.requested_modules()
    }

    /// Declared export names.
    pub fn exported_names(&self) -> &[String] {
        self.source.exported_names()
    }

    /// Whether `name` is a declared export.
    pub fn declares(&self, name: &str) -> bool {
        self.source.exported_names().iter().any(|n| n == name)
    }

    /// Whether evaluation would suspend on a top-level `await`.
    pub fn has_top_level_await(&self) -> bool {
        self.source.has_top_level_await()
    }

    pub(crate) fn instantiate(&self) -> GraphInstance {
        let bindings = self
            .exported_names()
            .iter()
            .map(|name| (name.clone(), Value::Undefined))
            .collect();
        GraphInstance {
            bindings: RwLock::new(bindings),
        }
    }
}

/// Export bindings of one runtime's graph module instance.
///
/// Every declared export starts out `undefined` and is written by the body
/// as it runs, so importers reading early see the value at that point.
pub struct GraphInstance {
    bindings: RwLock<IndexMap<String, Value>>,
}

impl GraphInstance {
    /// Current value of an export binding.
    pub fn get_binding_value(&self, name: &str) -> Value {
        self.bindings.read().get(name).cloned().unwrap_or_default()
    }

    /// Write an export binding. Returns `false` if `name` was never declared.
    pub fn set_binding(&self, name: &str, value: Value) -> bool {
        match self.bindings.write().get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub(crate) fn execute(
        &self,
        rt: &mut Runtime,
        module: &GraphModule,
        env: &dyn ModuleEnvironment,
    ) -> spacey_host::Result<()> {
        rt.run_module(module.source(), env)
    }
}
