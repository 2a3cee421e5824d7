// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Natively provided modules and export shape conversions

use indexmap::IndexMap;
use spacey_host::{Object, Runtime, Value};
use std::fmt;
use std::sync::Arc;

/// Property flagging an exports object as transpiled from import/export
/// syntax, so consumers pick `default` off it.
pub const ES_MODULE_MARKER: &str = "__esModule";

/// Exports of a natively provided module.
#[derive(Debug, Clone, Default)]
pub struct Exports {
    /// Named exports; `None` means the module has no explicit named mapping
    pub named: Option<IndexMap<String, Value>>,
    /// Default export
    pub default: Option<Value>,
}

impl Exports {
    /// Only named exports.
    pub fn named<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            named: Some(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            default: None,
        }
    }

    /// Only a default export.
    pub fn default_only(value: impl Into<Value>) -> Self {
        Self {
            named: None,
            default: Some(value.into()),
        }
    }

    /// Adds a default export.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// A native module following the module contract: every runtime gets its
/// own instance, which reports a structured [`Exports`] record.
pub trait HostModule: Send + Sync {
    /// Create the instance for one runtime.
    fn new_module_instance(&self, rt: &mut Runtime) -> Box<dyn HostInstance>;
}

/// One runtime's instance of a [`HostModule`].
pub trait HostInstance: Send + Sync {
    /// The instance's exports.
    fn exports(&self) -> Exports;
}

/// An entry of the built-in module table.
#[derive(Clone)]
pub enum BuiltinModule {
    /// A module following the [`HostModule`] contract
    Conforming(Arc<dyn HostModule>),
    /// Any other native value, exposed as is
    Plain(Value),
}

impl BuiltinModule {
    /// Wrap a conforming module.
    pub fn conforming(module: impl HostModule + 'static) -> Self {
        Self::Conforming(Arc::new(module))
    }

    /// Wrap a plain value.
    pub fn plain(value: impl Into<Value>) -> Self {
        Self::Plain(value.into())
    }
}

impl fmt::Debug for BuiltinModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conforming(_) => write!(f, "BuiltinModule::Conforming"),
            Self::Plain(value) => f.debug_tuple("BuiltinModule::Plain").field(value).finish(),
        }
    }
}

/// An object holding every named export.
pub fn named_object(named: &IndexMap<String, Value>) -> Object {
    named.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// Flatten exports into the single value `require()` hands back.
///
/// - named only: an object of the named exports
/// - default only: the default export
/// - both: the named exports plus `default` and a `__esModule` marker, so
///   code written for either convention works against the same value
pub fn to_es_module_exports(exports: &Exports) -> Value {
    match (&exports.named, &exports.default) {
        (None, default) => default.clone().unwrap_or_default(),
        (Some(named), None) => Value::Object(named_object(named)),
        (Some(named), Some(default)) => {
            let result = named_object(named);
            result.set("default", default.clone());
            result.set(ES_MODULE_MARKER, true);
            Value::Object(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_only() {
        let value = to_es_module_exports(&Exports::named([("x", 1), ("y", 2)]));
        let obj = value.as_object().unwrap();
        assert_eq!(obj.keys(), vec!["x", "y"]);
        assert!(!obj.has(ES_MODULE_MARKER));
    }

    #[test]
    fn test_default_only() {
        let value = to_es_module_exports(&Exports::default_only("dflt"));
        assert_eq!(value, Value::from("dflt"));
    }

    #[test]
    fn test_both() {
        let default = Object::new();
        let exports = Exports::named([("x", 1)]).with_default(default.clone());
        let value = to_es_module_exports(&exports);
        let obj = value.as_object().unwrap();
        assert_eq!(obj.get("x"), Some(Value::from(1)));
        assert_eq!(obj.get("default"), Some(Value::Object(default)));
        assert_eq!(obj.get(ES_MODULE_MARKER), Some(Value::Boolean(true)));
    }

    #[test]
    fn test_empty_named_mapping_still_counts() {
        let exports = Exports {
            named: Some(IndexMap::new()),
            default: None,
        };
        let value = to_es_module_exports(&exports);
        assert!(value.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_nothing() {
        assert!(to_es_module_exports(&Exports::default()).is_undefined());
    }
}
