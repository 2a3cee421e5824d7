// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiled programs and the module-embedding contract.
//!
//! A compiler turns source text into a [`Program`]. The variant tells the
//! module layer which convention the source follows:
//!
//! - [`Program::Script`] - factory style. Running the script yields the
//!   wrapper function that is later invoked with `(exports, module, exports)`.
//! - [`Program::Module`] - graph style. The static import list and declared
//!   export names are known up front; the body reads imports and writes
//!   exports through a [`ModuleEnvironment`].

use crate::error::Result;
use crate::function::Function;
use crate::runtime::Runtime;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Body of a factory-style script.
pub type ScriptBody = dyn Fn(&mut Runtime) -> Result<Value> + Send + Sync;

/// Body of a graph-style module.
pub type ModuleBody = dyn Fn(&mut Runtime, &dyn ModuleEnvironment) -> Result<()> + Send + Sync;

/// A compiled program.
#[derive(Clone, Debug)]
pub enum Program {
    /// Factory-style script
    Script(Script),
    /// Graph-style module
    Module(ModuleSource),
}

impl Program {
    /// Whether the program uses the import/export convention.
    pub fn is_module(&self) -> bool {
        matches!(self, Program::Module(_))
    }

    /// Name the program was compiled under.
    pub fn name(&self) -> &str {
        match self {
            Program::Script(script) => script.name(),
            Program::Module(module) => module.name(),
        }
    }

    /// The same program under a different name.
    pub fn with_name(&self, name: impl Into<String>) -> Program {
        match self {
            Program::Script(script) => Program::Script(script.with_name(name)),
            Program::Module(module) => Program::Module(module.with_name(name)),
        }
    }
}

/// A factory-style script.
#[derive(Clone)]
pub struct Script {
    name: String,
    body: Arc<ScriptBody>,
}

impl Script {
    /// Creates a script from its top-level body.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Runtime) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    /// Creates a script whose completion value is a wrapper function around
    /// `factory`, defined in whatever source the script runs as.
    ///
    /// This is the shape compilers give factory-convention sources.
    pub fn factory<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&mut Runtime, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let factory = Arc::new(factory);
        Self::new(name, move |rt| {
            let factory = Arc::clone(&factory);
            let source = rt.current_source().unwrap_or_default().to_string();
            Ok(Value::Function(Function::new("", source, move |rt, args| {
                factory(rt, args)
            })))
        })
    }

    /// Script name, reported by its top-level frame.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The same body under a different name.
    pub fn with_name(&self, name: impl Into<String>) -> Script {
        Script {
            name: name.into(),
            body: Arc::clone(&self.body),
        }
    }

    pub(crate) fn body(&self) -> &ScriptBody {
        &*self.body
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script").field("name", &self.name).finish()
    }
}

/// A graph-style module.
#[derive(Clone)]
pub struct ModuleSource {
    name: String,
    requested: Vec<String>,
    exports: Vec<String>,
    top_level_await: bool,
    body: Arc<ModuleBody>,
}

impl ModuleSource {
    /// Creates a module from its body. Use the builder methods to declare
    /// imports and exports.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&mut Runtime, &dyn ModuleEnvironment) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: String::new(),
            requested: Vec::new(),
            exports: Vec::new(),
            top_level_await: false,
            body: Arc::new(body),
        }
    }

    /// Declares the static import specifiers, in source order.
    pub fn requests<I, S>(mut self, specifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested = specifiers.into_iter().map(Into::into).collect();
        self
    }

    /// Declares the exported binding names.
    pub fn exports<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exports = names.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the body as awaiting at its top level.
    pub fn top_level_await(mut self, value: bool) -> Self {
        self.top_level_await = value;
        self
    }

    /// Module name, reported by its top-level frame.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The same module under a different name.
    pub fn with_name(&self, name: impl Into<String>) -> ModuleSource {
        ModuleSource {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Static import specifiers.
    pub fn requested_modules(&self) -> &[String] {
        &self.requested
    }

    /// Declared export names.
    pub fn exported_names(&self) -> &[String] {
        &self.exports
    }

    /// Whether evaluation would suspend on top-level await.
    pub fn has_top_level_await(&self) -> bool {
        self.top_level_await
    }

    pub(crate) fn body(&self) -> &ModuleBody {
        &*self.body
    }
}

impl fmt::Debug for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSource")
            .field("name", &self.name)
            .field("requested", &self.requested)
            .field("exports", &self.exports)
            .field("top_level_await", &self.top_level_await)
            .finish()
    }
}

/// What a graph-module body sees while it runs.
pub trait ModuleEnvironment {
    /// Assigns a declared export binding.
    fn export(&self, name: &str, value: Value) -> Result<()>;

    /// Reads an imported binding's current value.
    fn import(&self, specifier: &str, name: &str) -> Result<Value>;

    /// A handle reading an imported binding whenever it is asked, for code
    /// that runs after the body returned.
    fn binding(&self, specifier: &str, name: &str) -> Result<LiveBinding>;

    /// The namespace object of an imported module (`import * as ns`).
    fn namespace(&self, specifier: &str) -> Result<Value>;
}

/// A live view of another module's exported slot.
#[derive(Clone)]
pub struct LiveBinding {
    read: Arc<dyn Fn() -> Value + Send + Sync>,
}

impl LiveBinding {
    /// Creates a binding backed by `read`.
    pub fn new<F>(read: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            read: Arc::new(read),
        }
    }

    /// The slot's current value.
    pub fn get(&self) -> Value {
        (self.read)()
    }
}

impl fmt::Debug for LiveBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LiveBinding").field(&self.get()).finish()
    }
}
