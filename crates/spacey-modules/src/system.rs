// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Linking, instantiation and evaluation for one runtime
//!
//! Running a module happens in three passes over its dependency graph:
//!
//! 1. **Link** resolves every statically requested specifier, depth first.
//! 2. **Instantiate** creates the binding environment of every linked module
//!    before any body runs, so modules in a cycle can see each other's
//!    export slots.
//! 3. **Evaluate** runs bodies in dependency order. A module already being
//!    evaluated is skipped, which is what ends a cycle. Modules of a cycle
//!    only count as evaluated once the whole cycle has run; if any of them
//!    fails, all of them fail with the same error.
//!
//! No lock is held while a body runs: bodies may call back in through
//! `require`.

use crate::error::{ModuleError, Result};
use crate::instance::{InstanceKind, ModuleInstance, Status};
use crate::loader::SourceData;
use crate::record::{ModuleId, ModuleRecord, RecordKind};
use crate::resolver::ModuleResolver;
use parking_lot::Mutex;
use spacey_host::{Exception, LiveBinding, ModuleEnvironment, Object, Runtime, RuntimeId, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

type Dependencies = Vec<(String, Arc<ModuleRecord>)>;

/// Observable result of evaluating a module.
#[derive(Debug, Clone)]
enum Evaluation {
    Fulfilled,
    Rejected(ModuleError),
    // waiting on a top-level await
    Pending,
}

/// Depth-first bookkeeping of one evaluation pass.
///
/// A module that finished its body while part of a cycle stays on the stack
/// until the first module of that cycle is done, so that a later failure in
/// the cycle reaches it too.
#[derive(Default)]
struct Walk {
    stack: Vec<Arc<ModuleInstance>>,
    // module -> (visit index, lowest index reachable from it)
    frames: HashMap<ModuleId, (usize, usize)>,
    next: usize,
}

impl Walk {
    fn enter(&mut self, instance: &Arc<ModuleInstance>) -> usize {
        let index = self.next;
        self.next += 1;
        self.frames.insert(instance.record().id(), (index, index));
        self.stack.push(Arc::clone(instance));
        index
    }

    /// Lowest reachable index of a module still on the stack.
    fn ancestor(&self, id: ModuleId) -> Option<usize> {
        self.frames.get(&id).map(|&(_, ancestor)| ancestor)
    }

    fn set_ancestor(&mut self, id: ModuleId, ancestor: usize) {
        if let Some(frame) = self.frames.get_mut(&id) {
            frame.1 = ancestor;
        }
    }

    /// Pop every module entered since `id`, marking them evaluated.
    fn complete(&mut self, id: ModuleId) {
        while let Some(instance) = self.stack.pop() {
            let popped = instance.record().id();
            self.frames.remove(&popped);
            instance.set_status(Status::Evaluated);
            if popped == id {
                break;
            }
        }
    }

    /// Fail every module still on the stack.
    fn fail(&mut self, err: ModuleError) -> Evaluation {
        for instance in self.stack.drain(..) {
            instance.set_status(Status::Failed(err.clone()));
        }
        self.frames.clear();
        Evaluation::Rejected(err)
    }
}

/// The module graph of one runtime.
pub struct ModuleSystem {
    resolver: Arc<ModuleResolver>,
    runtime: RuntimeId,
    instances: Mutex<HashMap<ModuleId, Arc<ModuleInstance>>>,
    // records whose host instance is being built right now
    instantiating: Mutex<HashSet<ModuleId>>,
    linked: Mutex<HashMap<ModuleId, Result<Dependencies>>>,
}

impl ModuleSystem {
    /// Create the module system of `rt`, drawing records from `resolver`.
    pub fn new(resolver: Arc<ModuleResolver>, rt: &Runtime) -> Self {
        Self {
            resolver,
            runtime: rt.id(),
            instances: Mutex::new(HashMap::new()),
            instantiating: Mutex::new(HashSet::new()),
            linked: Mutex::new(HashMap::new()),
        }
    }

    /// The shared resolver.
    pub fn resolver(&self) -> &Arc<ModuleResolver> {
        &self.resolver
    }

    /// Run a root source.
    ///
    /// The bytes are registered under the source's own locator first, so a
    /// module importing the root gets the same record back.
    ///
    /// # Panics
    ///
    /// If evaluation suspends on a top-level `await`, which has no way to
    /// resume.
    pub fn run(&self, rt: &mut Runtime, source: SourceData) -> Result<Arc<ModuleRecord>> {
        let pwd = source.locator.dir();
        let specifier = source.locator.as_str();
        self.resolver.resolve_loaded(&pwd, specifier, source.data)?;
        let record = self.resolver.resolve(&pwd, specifier)?;
        self.evaluate(rt, &record)?;
        Ok(record)
    }

    /// Every locator and built-in name resolved so far.
    pub fn imported(&self) -> Vec<String> {
        self.resolver.imported()
    }

    /// This runtime's instance of `record`, if it was instantiated.
    pub fn instance(&self, record: &ModuleRecord) -> Option<Arc<ModuleInstance>> {
        self.instances.lock().get(&record.id()).cloned()
    }

    /// Resolve the static dependencies of `record`, transitively.
    ///
    /// A module is linked once; later calls return the first outcome. A
    /// failure reaches every module that depends on the failed one.
    pub fn link(&self, record: &Arc<ModuleRecord>) -> Result<()> {
        self.link_module(record, &mut HashSet::new())
    }

    /// Link, instantiate and evaluate `record` in `rt`.
    ///
    /// # Panics
    ///
    /// If `rt` is not the runtime this system was created for, if
    /// evaluation suspends on a top-level `await`, or if a native module
    /// requests itself while its instance is being built.
    pub fn evaluate(&self, rt: &mut Runtime, record: &Arc<ModuleRecord>) -> Result<Arc<ModuleInstance>> {
        self.check_runtime(rt);
        self.link(record)?;
        let instance = self.instantiate(rt, record);
        match self.evaluate_module(rt, &instance, &mut Walk::default()) {
            Evaluation::Fulfilled => Ok(instance),
            Evaluation::Rejected(err) => Err(err),
            Evaluation::Pending => panic!("top-level await is not supported ({})", record.name()),
        }
    }

    /// An object holding the current value of every export of `instance`.
    ///
    /// Built once the module is evaluated and reused afterwards. While the
    /// module is still evaluating, a fresh snapshot is built on every call.
    pub fn namespace_object(&self, instance: &ModuleInstance) -> Object {
        if let Some(namespace) = instance.cached_namespace() {
            return namespace;
        }
        let names = match instance.kind() {
            // names are only fixed once the body finishes
            InstanceKind::Factory(factory) if !instance.is_evaluated() => factory.exports().keys(),
            _ => instance.record().exported_names(),
        };
        let namespace: Object = names
            .into_iter()
            .map(|name| {
                let value = instance.get_binding_value(&name);
                (name, value)
            })
            .collect();
        if instance.is_evaluated() {
            instance.cache_namespace(namespace)
        } else {
            namespace
        }
    }

    fn check_runtime(&self, rt: &Runtime) {
        if rt.id() != self.runtime {
            panic!("module system of {} used with {}", self.runtime, rt.id());
        }
    }

    fn link_module(&self, record: &Arc<ModuleRecord>, visiting: &mut HashSet<ModuleId>) -> Result<()> {
        if let Some(outcome) = self.linked.lock().get(&record.id()) {
            return outcome.as_ref().map(|_| ()).map_err(Clone::clone);
        }
        // a cycle back to a module still being linked
        if !visiting.insert(record.id()) {
            return Ok(());
        }

        let outcome = self.link_dependencies(record, visiting);
        let result = outcome.as_ref().map(|_| ()).map_err(Clone::clone);
        self.linked.lock().insert(record.id(), outcome);
        result
    }

    fn link_dependencies(&self, record: &Arc<ModuleRecord>, visiting: &mut HashSet<ModuleId>) -> Result<Dependencies> {
        let requested = record.requested_modules();
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let base = self.resolver.reverse_path(Some(record));
        let mut dependencies = Vec::with_capacity(requested.len());
        for specifier in requested {
            let dependency = self.resolver.resolve(&base, specifier)?;
            self.link_module(&dependency, visiting)?;
            dependencies.push((specifier.clone(), dependency));
        }
        Ok(dependencies)
    }

    fn dependencies(&self, record: &ModuleRecord) -> Result<Dependencies> {
        match self.linked.lock().get(&record.id()) {
            Some(outcome) => outcome.clone(),
            None => Ok(Vec::new()),
        }
    }

    fn instantiate(&self, rt: &mut Runtime, root: &Arc<ModuleRecord>) -> Arc<ModuleInstance> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![Arc::clone(root)];
        while let Some(record) = stack.pop() {
            if !seen.insert(record.id()) {
                continue;
            }
            let dependencies = self.dependencies(&record).unwrap_or_default();
            stack.extend(dependencies.into_iter().map(|(_, dep)| dep));
            order.push(record);
        }

        // every environment exists before any import table is wired
        for record in &order {
            self.instance_or_create(rt, record);
        }
        for record in &order {
            if !matches!(record.kind(), RecordKind::Graph(_)) {
                continue;
            }
            let instance = self.instance_or_create(rt, record);
            let imports = self
                .dependencies(record)
                .unwrap_or_default()
                .into_iter()
                .map(|(specifier, dep)| (specifier, Arc::downgrade(&self.instance_or_create(rt, &dep))))
                .collect();
            instance.wire_imports(imports);
        }

        self.instance_or_create(rt, root)
    }

    fn instance_or_create(&self, rt: &mut Runtime, record: &Arc<ModuleRecord>) -> Arc<ModuleInstance> {
        if let Some(instance) = self.instance(record) {
            return instance;
        }
        // native modules may run code while building their instance,
        // including require() of other modules but never of themselves
        if !self.instantiating.lock().insert(record.id()) {
            panic!("module {} requested while its instance is being built", record.name());
        }
        debug!("Instantiating {} in {}", record.name(), rt.id());
        let kind = record.instantiate(rt);
        self.instantiating.lock().remove(&record.id());

        let instance = Arc::new(ModuleInstance::new(Arc::clone(record), kind));
        Arc::clone(self.instances.lock().entry(record.id()).or_insert(instance))
    }

    fn evaluate_module(&self, rt: &mut Runtime, instance: &Arc<ModuleInstance>, walk: &mut Walk) -> Evaluation {
        match instance.begin_evaluation() {
            None => {}
            Some(Status::Evaluated | Status::Evaluating) => return Evaluation::Fulfilled,
            Some(Status::Failed(err)) => return Evaluation::Rejected(err),
            Some(Status::Instantiated) => unreachable!("begin_evaluation leaves no instance instantiated"),
        }

        let record = Arc::clone(instance.record());
        let index = walk.enter(instance);
        let mut ancestor = index;

        // a module inside a cycle may have linked fine while its partner failed
        let dependencies = match self.dependencies(&record) {
            Ok(dependencies) => dependencies,
            Err(err) => return walk.fail(err),
        };
        for (_, dependency) in dependencies {
            let dependency = self.instance_or_create(rt, &dependency);
            match self.evaluate_module(rt, &dependency, walk) {
                Evaluation::Fulfilled => {
                    if let Some(reached) = walk.ancestor(dependency.record().id()) {
                        ancestor = ancestor.min(reached);
                    }
                }
                Evaluation::Rejected(err) => return walk.fail(err),
                Evaluation::Pending => return Evaluation::Pending,
            }
        }

        debug!("Evaluating {}", record.name());
        let result = match (record.kind(), instance.kind()) {
            (RecordKind::Graph(module), InstanceKind::Graph(graph)) => {
                if module.has_top_level_await() {
                    return Evaluation::Pending;
                }
                let env = Environment {
                    system: self,
                    instance,
                };
                graph.execute(rt, module, &env).map_err(ModuleError::from)
            }
            (RecordKind::Factory(module), InstanceKind::Factory(factory)) => {
                factory.execute(rt, module, record.name())
            }
            (RecordKind::Native(_), InstanceKind::Native(_)) | (RecordKind::Plain(_), InstanceKind::Plain(_)) => {
                Ok(())
            }
            _ => panic!("instance of {} does not match its record", record.name()),
        };

        if let Err(err) = result {
            debug!("Evaluation of {} failed: {err}", record.name());
            return walk.fail(err);
        }
        walk.set_ancestor(record.id(), ancestor);
        if ancestor == index {
            walk.complete(record.id());
        }
        Evaluation::Fulfilled
    }
}

impl std::fmt::Debug for ModuleSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleSystem")
            .field("runtime", &self.runtime)
            .field("instances", &self.instances.lock().len())
            .finish()
    }
}

/// What a graph-module body sees while it runs.
struct Environment<'a> {
    system: &'a ModuleSystem,
    instance: &'a Arc<ModuleInstance>,
}

impl Environment<'_> {
    fn dependency(&self, specifier: &str) -> spacey_host::Result<Arc<ModuleInstance>> {
        self.instance.imported(specifier).ok_or_else(|| {
            Exception::syntax_error(format!(
                "'{specifier}' is not imported by {}",
                self.instance.record().name()
            ))
        })
    }
}

impl ModuleEnvironment for Environment<'_> {
    fn export(&self, name: &str, value: Value) -> spacey_host::Result<()> {
        let written = match self.instance.kind() {
            InstanceKind::Graph(graph) => graph.set_binding(name, value),
            _ => false,
        };
        if written {
            Ok(())
        } else {
            Err(Exception::type_error(format!(
                "'{name}' is not an export of {}",
                self.instance.record().name()
            )))
        }
    }

    fn import(&self, specifier: &str, name: &str) -> spacey_host::Result<Value> {
        self.binding(specifier, name).map(|binding| binding.get())
    }

    fn binding(&self, specifier: &str, name: &str) -> spacey_host::Result<LiveBinding> {
        let dependency = self.dependency(specifier)?;
        if dependency.record().resolve_export(name).is_none() {
            return Err(Exception::syntax_error(format!(
                "The requested module '{specifier}' does not provide an export named '{name}'"
            )));
        }
        let target = Arc::downgrade(&dependency);
        let name = name.to_string();
        Ok(LiveBinding::new(move || {
            target
                .upgrade()
                .map(|instance| instance.get_binding_value(&name))
                .unwrap_or_default()
        }))
    }

    fn namespace(&self, specifier: &str) -> spacey_host::Result<Value> {
        let dependency = self.dependency(specifier)?;
        Ok(Value::Object(self.system.namespace_object(&dependency)))
    }
}
