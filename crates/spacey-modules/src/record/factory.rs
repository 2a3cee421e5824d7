// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Factory convention modules
//!
//! The compiled script evaluates to a wrapper function which is called with
//! `(exports, module, exports)`. Whatever `module.exports` holds once the
//! wrapper returns is the module's exports.

use crate::error::{ModuleError, Result};
use crate::exports::ES_MODULE_MARKER;
use parking_lot::RwLock;
use spacey_host::{Object, Runtime, Script, Value};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

/// A function-wrapped module.
pub struct FactoryModule {
    script: Script,
    exported_names: OnceLock<Vec<String>>,
}

impl FactoryModule {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            exported_names: OnceLock::new(),
        }
    }

    /// The compiled script.
    pub fn script(&self) -> &Script {
        &self.script
    }

    pub(crate) fn exported_names(&self, name: &str) -> Vec<String> {
        match self.exported_names.get() {
            Some(names) => names.clone(),
            None => panic!("exported names of {name} requested before its first evaluation"),
        }
    }

    pub(crate) fn instantiate(&self) -> FactoryInstance {
        FactoryInstance {
            exports: RwLock::new(Value::Object(Object::new())),
            es_module_marked: AtomicBool::new(false),
        }
    }
}

/// One runtime's instance of a factory module.
pub struct FactoryInstance {
    exports: RwLock<Value>,
    es_module_marked: AtomicBool,
}

impl FactoryInstance {
    /// Current exports value.
    pub fn exports(&self) -> Value {
        self.exports.read().clone()
    }

    /// Whether the exports carry a truthy `__esModule` marker.
    pub fn is_es_module_marked(&self) -> bool {
        self.es_module_marked.load(Ordering::Acquire)
    }

    /// Value of an export binding. `default` is the `default` property when
    /// there is one, otherwise the whole exports value.
    pub fn get_binding_value(&self, name: &str) -> Value {
        let exports = self.exports();
        match exports.get(name) {
            Some(value) => value,
            None if name == "default" => exports,
            None => Value::Undefined,
        }
    }

    pub(crate) fn execute(&self, rt: &mut Runtime, module: &FactoryModule, name: &str) -> Result<()> {
        let wrapper = rt.run_script(&module.script)?;
        if !wrapper.is_function() {
            panic!("factory module {name} did not evaluate to its wrapper function");
        }

        let exports = self.exports();
        let module_object = Object::new();
        module_object.set("exports", exports.clone());
        rt.call(
            &wrapper,
            &[exports.clone(), Value::Object(module_object.clone()), exports],
        )?;

        let exports = module_object.get("exports").unwrap_or_default();
        if exports.is_nullish() {
            return Err(ModuleError::InvalidExports(name.to_string()));
        }

        module.exported_names.get_or_init(|| exports.keys());
        let marked = exports.get(ES_MODULE_MARKER).is_some_and(|v| v.to_boolean());
        self.es_module_marked.store(marked, Ordering::Release);
        trace!("{name} exports {} names", exports.keys().len());
        *self.exports.write() = exports;
        Ok(())
    }
}
