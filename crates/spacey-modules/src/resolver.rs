// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module resolution and the shared record cache
//!
//! Every distinct locator is loaded and compiled at most once per resolver,
//! however many runtimes share it. Failures are cached too: a module that
//! could not be loaded stays unloadable for the lifetime of the resolver.

use crate::compiler::Compiler;
use crate::config::ResolverConfig;
use crate::error::{LoadError, ModuleError, Result};
use crate::exports::BuiltinModule;
use crate::loader::Loader;
use crate::locator::Locator;
use crate::record::{ModuleId, ModuleRecord};
use bytes::Bytes;
use dashmap::DashMap;
use spacey_host::Program;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

type Outcome = std::result::Result<Arc<ModuleRecord>, ModuleError>;

/// Resolves specifiers to module records.
///
/// The cache is keyed by canonical locator, or by name for built-in modules.
/// Each key owns a slot that is filled exactly once, so concurrent misses on
/// the same key wait for a single load instead of racing.
pub struct ModuleResolver {
    config: ResolverConfig,
    builtins: HashMap<String, BuiltinModule>,
    loader: Arc<dyn Loader>,
    compiler: Arc<dyn Compiler>,
    cache: DashMap<String, Arc<OnceLock<Outcome>>>,
    locators: DashMap<ModuleId, Locator>,
}

impl ModuleResolver {
    /// Create a resolver with an empty built-in table.
    pub fn new(config: ResolverConfig, loader: Arc<dyn Loader>, compiler: Arc<dyn Compiler>) -> Self {
        Self {
            config,
            builtins: HashMap::new(),
            loader,
            compiler,
            cache: DashMap::new(),
            locators: DashMap::new(),
        }
    }

    /// Register a built-in module under `name`.
    ///
    /// # Panics
    ///
    /// If `name` lies outside the configured built-in namespace, since it
    /// could never be resolved.
    pub fn with_builtin(mut self, name: impl Into<String>, module: BuiltinModule) -> Self {
        let name = name.into();
        assert!(
            self.config.is_builtin(&name),
            "built-in module {name} is outside the {} namespace",
            self.config.builtin_namespace
        );
        self.builtins.insert(name, module);
        self
    }

    /// The resolver's configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The process base directory.
    pub fn base(&self) -> &Locator {
        &self.config.base
    }

    /// Resolve `specifier` relative to the directory `base`.
    pub fn resolve(&self, base: &Locator, specifier: &str) -> Result<Arc<ModuleRecord>> {
        if self.config.is_builtin(specifier) {
            return self.slot(specifier).get_or_init(|| self.builtin(specifier)).clone();
        }

        let locator = Locator::resolve(base, specifier)?;
        let slot = self.slot(locator.as_str());
        if let Some(outcome) = slot.get() {
            trace!("Cache hit for {locator}");
            return outcome.clone();
        }

        slot.get_or_init(|| {
            debug!("Loading {locator} (requested as {specifier:?})");
            let data = self.loader.load(&locator, specifier)?;
            self.compile(&locator, &data)
        })
        .clone()
    }

    /// Register source bytes acquired elsewhere, such as the root script of
    /// a run. If the locator was already resolved, the cached outcome wins.
    pub fn resolve_loaded(&self, base: &Locator, specifier: &str, data: Bytes) -> Result<Arc<ModuleRecord>> {
        let locator = Locator::resolve(base, specifier)?;
        self.slot(locator.as_str())
            .get_or_init(|| self.compile(&locator, &data))
            .clone()
    }

    /// Directory that relative specifiers requested by `referencing` resolve
    /// against; the process base when there is no referencing module.
    ///
    /// # Panics
    ///
    /// If `referencing` was never produced by this resolver from a locator.
    pub fn reverse_path(&self, referencing: Option<&ModuleRecord>) -> Locator {
        let Some(record) = referencing else {
            return self.config.base.clone();
        };
        match self.locators.get(&record.id()) {
            Some(locator) => self.base_for(&locator),
            None => panic!("module {} was not resolved from a locator", record.name()),
        }
    }

    /// Directory that specifiers requested from `locator` resolve against.
    pub fn base_for(&self, locator: &Locator) -> Locator {
        if locator.is_stdin() {
            self.config.base.clone()
        } else {
            locator.dir()
        }
    }

    /// The locator a record was resolved under, if it came from source.
    pub fn locator_of(&self, record: &ModuleRecord) -> Option<Locator> {
        self.locators.get(&record.id()).map(|entry| entry.value().clone())
    }

    /// Every cache key seen so far, failed ones and built-in names included,
    /// sorted.
    pub fn imported(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.cache.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    fn slot(&self, key: &str) -> Arc<OnceLock<Outcome>> {
        // the map guard must not outlive this call; filling a slot can take a while
        Arc::clone(&self.cache.entry(key.to_string()).or_default())
    }

    fn builtin(&self, name: &str) -> Outcome {
        debug!("Resolving built-in module {name}");
        let record = match self.builtins.get(name) {
            Some(BuiltinModule::Conforming(module)) => ModuleRecord::native(name, Arc::clone(module)),
            Some(BuiltinModule::Plain(value)) => ModuleRecord::plain(name, value.clone()),
            None => return Err(ModuleError::UnknownModule(name.to_string())),
        };
        Ok(Arc::new(record))
    }

    fn compile(&self, locator: &Locator, data: &[u8]) -> Outcome {
        let source = std::str::from_utf8(data).map_err(|e| LoadError::Encoding {
            locator: locator.to_string(),
            reason: e.to_string(),
        })?;
        debug!("Compiling {locator} ({} bytes)", data.len());
        let program = self
            .compiler
            .compile(source, locator.as_str(), false)
            .map_err(|e| ModuleError::Compile {
                name: locator.to_string(),
                source: e,
            })?;

        let record = match program.with_name(locator.as_str()) {
            Program::Module(module) => ModuleRecord::graph(locator.as_str(), module),
            Program::Script(script) => ModuleRecord::factory(locator.as_str(), script),
        };
        let record = Arc::new(record);
        self.locators.insert(record.id(), locator.clone());
        Ok(record)
    }
}

impl std::fmt::Debug for ModuleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleResolver")
            .field("config", &self.config)
            .field("builtins", &self.builtins.keys().collect::<Vec<_>>())
            .field("cached", &self.cache.len())
            .finish()
    }
}
