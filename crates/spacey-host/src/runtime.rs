// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Execution context of one virtual user.

use crate::error::{Exception, Result};
use crate::function::{Function, StackFrame};
use crate::object::Object;
use crate::program::{ModuleEnvironment, ModuleSource, Script};
use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeId(u64);

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rt#{}", self.0)
    }
}

/// A runtime owns the global object and the call stack of one independent
/// execution. Runtimes are never shared; every frame pushed by `call`,
/// `run_script` or `run_module` is popped again before they return.
pub struct Runtime {
    id: RuntimeId,
    global: Object,
    frames: Vec<StackFrame>,
}

impl Runtime {
    /// Creates a new runtime with an empty global object.
    pub fn new() -> Self {
        Self {
            id: RuntimeId(NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed)),
            global: Object::new(),
            frames: Vec::new(),
        }
    }

    /// The runtime's identity.
    pub fn id(&self) -> RuntimeId {
        self.id
    }

    /// The global object.
    pub fn global_object(&self) -> &Object {
        &self.global
    }

    /// Defines a global binding.
    pub fn set_global(&self, name: &str, value: impl Into<Value>) {
        self.global.set(name, value);
    }

    /// Reads a global binding, `undefined` when missing.
    pub fn get_global(&self, name: &str) -> Value {
        self.global.get(name).unwrap_or_default()
    }

    /// Calls a function value.
    pub fn call(&mut self, callee: &Value, args: &[Value]) -> Result<Value> {
        match callee {
            Value::Function(func) => self.call_function(func, args),
            other => Err(Exception::type_error(format!(
                "{} is not a function",
                other.type_of()
            ))),
        }
    }

    /// Calls a function, recording a frame for it.
    pub fn call_function(&mut self, func: &Function, args: &[Value]) -> Result<Value> {
        self.frames.push(StackFrame::for_call(func));
        let result = func.invoke(self, args);
        self.frames.pop();
        result
    }

    /// Runs a factory-style script's top-level code.
    pub fn run_script(&mut self, script: &Script) -> Result<Value> {
        self.frames.push(StackFrame::top_level(script.name()));
        let result = (script.body())(self);
        self.frames.pop();
        result
    }

    /// Runs a graph-style module body against its environment.
    pub fn run_module(&mut self, module: &ModuleSource, env: &dyn ModuleEnvironment) -> Result<()> {
        self.frames.push(StackFrame::top_level(module.name()));
        let result = (module.body())(self, env);
        self.frames.pop();
        result
    }

    /// Captures up to `limit` frames, innermost first.
    pub fn capture_call_stack(&self, limit: usize) -> Vec<StackFrame> {
        self.frames.iter().rev().take(limit).cloned().collect()
    }

    /// Source name of the innermost frame.
    pub fn current_source(&self) -> Option<&str> {
        self.frames.last().map(StackFrame::src_name)
    }

    /// Number of active frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.id)
            .field("depth", &self.frames.len())
            .finish()
    }
}
