// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Natively provided modules

use crate::exports::{Exports, HostInstance, HostModule, named_object};
use spacey_host::{Runtime, Value};
use std::sync::{Arc, OnceLock};

/// A native module following the [`HostModule`] contract.
pub struct NativeModule {
    module: Arc<dyn HostModule>,
    exported_names: OnceLock<Vec<String>>,
}

impl NativeModule {
    pub(crate) fn new(module: Arc<dyn HostModule>) -> Self {
        Self {
            module,
            exported_names: OnceLock::new(),
        }
    }

    pub(crate) fn exported_names(&self, name: &str) -> Vec<String> {
        match self.exported_names.get() {
            Some(names) => names.clone(),
            None => panic!("exported names of {name} requested before it was instantiated"),
        }
    }

    pub(crate) fn instantiate(&self, rt: &mut Runtime) -> NativeInstance {
        let instance = self.module.new_module_instance(rt);
        self.exported_names.get_or_init(|| {
            instance
                .exports()
                .named
                .map(|named| named.into_keys().collect())
                .unwrap_or_default()
        });
        NativeInstance {
            instance,
            default_export: OnceLock::new(),
        }
    }
}

/// One runtime's instance of a [`NativeModule`].
pub struct NativeInstance {
    instance: Box<dyn HostInstance>,
    default_export: OnceLock<Value>,
}

impl NativeInstance {
    /// The instance's exports record.
    pub fn exports(&self) -> Exports {
        self.instance.exports()
    }

    /// The default export. When the module declares none, an object holding
    /// every named export stands in; it is built once per instance.
    pub fn default_export(&self) -> Value {
        self.default_export
            .get_or_init(|| {
                let exports = self.instance.exports();
                match (exports.default, exports.named) {
                    (Some(default), _) => default,
                    (None, Some(named)) => Value::Object(named_object(&named)),
                    (None, None) => Value::Undefined,
                }
            })
            .clone()
    }

    /// Value of an export binding.
    pub fn get_binding_value(&self, name: &str) -> Value {
        if name == "default" {
            return self.default_export();
        }
        match self.instance.exports().named {
            Some(named) => named.get(name).cloned().unwrap_or_default(),
            None => self.default_export().get(name).unwrap_or_default(),
        }
    }
}

/// A native value exposed as a module without any structured exports.
pub struct PlainModule {
    value: Value,
    exported_names: OnceLock<Vec<String>>,
}

impl PlainModule {
    pub(crate) fn new(value: Value) -> Self {
        Self {
            value,
            exported_names: OnceLock::new(),
        }
    }

    pub(crate) fn exported_names(&self, name: &str) -> Vec<String> {
        match self.exported_names.get() {
            Some(names) => names.clone(),
            None => panic!("exported names of {name} requested before it was instantiated"),
        }
    }

    pub(crate) fn instantiate(&self) -> PlainInstance {
        let value = match &self.value {
            Value::Object(obj) => Value::Object(obj.shallow_copy()),
            other => other.clone(),
        };
        self.exported_names.get_or_init(|| value.keys());
        PlainInstance { value }
    }
}

/// One runtime's view of a [`PlainModule`]. Objects are copied per runtime
/// so one runtime's writes never show up in another.
pub struct PlainInstance {
    value: Value,
}

impl PlainInstance {
    /// The exposed value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Value of an export binding. `default` is always the whole value, even
    /// when it carries a `default` property of its own.
    pub fn get_binding_value(&self, name: &str) -> Value {
        if name == "default" {
            return self.value.clone();
        }
        self.value.get(name).unwrap_or_default()
    }
}
