// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script object representation.

use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// A script object.
///
/// Cloning an `Object` clones the handle, not the properties: every clone
/// observes the same property map, and [`Object::ptr_eq`] reports whether two
/// handles are the same object. Properties keep insertion order, which is the
/// order `keys()` reports them in.
#[derive(Clone, Default)]
pub struct Object {
    properties: Arc<RwLock<IndexMap<String, Value>>>,
}

impl Object {
    /// Creates a new empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a property value, `None` when the property does not exist.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.properties.read().get(key).cloned()
    }

    /// Sets a property value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.write().insert(key.into(), value.into());
    }

    /// Deletes a property, returning whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.properties.write().shift_remove(key).is_some()
    }

    /// Checks if a property exists.
    pub fn has(&self, key: &str) -> bool {
        self.properties.read().contains_key(key)
    }

    /// Own property names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.properties.read().keys().cloned().collect()
    }

    /// Number of own properties.
    pub fn len(&self) -> usize {
        self.properties.read().len()
    }

    /// Whether the object has no own properties.
    pub fn is_empty(&self) -> bool {
        self.properties.read().is_empty()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.properties, &other.properties)
    }

    /// A new object holding the same property values.
    pub fn shallow_copy(&self) -> Object {
        let properties = self.properties.read().clone();
        Object {
            properties: Arc::new(RwLock::new(properties)),
        }
    }

    /// Snapshot of all own properties.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.properties
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let properties = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Object {
            properties: Arc::new(RwLock::new(properties)),
        }
    }
}

// Objects may reference themselves, so only the keys are printed.
impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("keys", &self.keys())
            .finish()
    }
}
