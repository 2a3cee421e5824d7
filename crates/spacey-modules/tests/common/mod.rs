// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Shared fixtures for the integration tests

#![allow(dead_code)]

use spacey_host::{ModuleSource, Program, Runtime, Script, Value};
use spacey_modules::{
    BuiltinModule, LegacyRequire, Locator, MemoryLoader, ModuleRecord, ModuleResolver, ModuleSystem,
    ProgramTable, ResolverConfig, SourceData,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const BASE: &str = "file:///a/";

/// In-memory sources with their precompiled programs.
pub struct Fixture {
    pub loader: Arc<MemoryLoader>,
    pub compiler: Arc<ProgramTable>,
    builtins: Vec<(String, BuiltinModule)>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            loader: Arc::new(MemoryLoader::new()),
            compiler: Arc::new(ProgramTable::new()),
            builtins: Vec::new(),
        }
    }

    fn add(&self, locator: &str, program: Program) {
        let text = source_text(locator);
        self.loader.insert(locator, text.clone());
        self.compiler.insert(&text, program);
    }

    /// Register a graph module at `locator`.
    pub fn graph(&self, locator: &str, module: ModuleSource) -> &Self {
        self.add(locator, Program::Module(module));
        self
    }

    /// Register a factory module at `locator`.
    pub fn factory<F>(&self, locator: &str, body: F) -> &Self
    where
        F: Fn(&mut Runtime, &[Value]) -> spacey_host::Result<Value> + Send + Sync + 'static,
    {
        self.add(locator, Program::Script(Script::factory("", body)));
        self
    }

    pub fn builtin(mut self, name: &str, module: BuiltinModule) -> Self {
        self.builtins.push((name.to_string(), module));
        self
    }

    pub fn resolver(&self) -> Arc<ModuleResolver> {
        let config = ResolverConfig::default().with_base(Locator::parse(BASE).unwrap());
        let resolver = self
            .builtins
            .iter()
            .fold(
                ModuleResolver::new(config, self.loader.clone(), self.compiler.clone()),
                |resolver, (name, module)| resolver.with_builtin(name.clone(), module.clone()),
            );
        Arc::new(resolver)
    }
}

/// The source text registered for `locator`.
pub fn source_text(locator: &str) -> String {
    format!("// source of {locator}")
}

/// The root unit for the module at `locator`.
pub fn source(locator: &str) -> SourceData {
    SourceData::new(Locator::parse(locator).unwrap(), source_text(locator))
}

/// One virtual user: a runtime with its module system and `require`.
pub struct Vu {
    pub rt: Runtime,
    pub system: Arc<ModuleSystem>,
    pub require: Arc<LegacyRequire>,
}

impl Vu {
    pub fn new(resolver: Arc<ModuleResolver>) -> Self {
        let rt = Runtime::new();
        let pwd = resolver.base().clone();
        let system = Arc::new(ModuleSystem::new(resolver, &rt));
        let require = Arc::new(LegacyRequire::new(Arc::clone(&system), pwd));
        require.install(&rt);
        Self { rt, system, require }
    }

    pub fn run(&mut self, locator: &str) -> spacey_modules::Result<Arc<ModuleRecord>> {
        self.system.run(&mut self.rt, source(locator))
    }

    /// Read an export of an instantiated module.
    pub fn export(&self, record: &ModuleRecord, name: &str) -> Value {
        self.system
            .instance(record)
            .expect("module is instantiated")
            .get_binding_value(name)
    }
}

/// Call the global `require` the way script code does.
pub fn require(rt: &mut Runtime, specifier: &str) -> spacey_host::Result<Value> {
    let require = rt.get_global("require");
    rt.call(&require, &[Value::from(specifier)])
}

/// Counts how often a module body ran.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
