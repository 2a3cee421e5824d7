// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The legacy `require()` entry point
//!
//! Relative specifiers resolve against the file most recently entered
//! through `require`, not against the file the call is written in. Scripts
//! depend on this, so it is kept.
//!
//! The base is tracked in two ways: a pointer updated around every call, and
//! a walk of the call stack. When the two disagree a warning is logged and
//! the stack wins.

use crate::error::{ModuleError, Result};
use crate::exports::to_es_module_exports;
use crate::instance::InstanceKind;
use crate::locator::Locator;
use crate::record::RecordKind;
use crate::system::ModuleSystem;
use parking_lot::Mutex;
use spacey_host::{Exception, Function, Runtime, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the global `require` function, as it shows up in stack frames.
pub const REQUIRE_FUNCTION: &str = "require";

/// `require()` for one runtime.
#[derive(Debug)]
pub struct LegacyRequire {
    system: Arc<ModuleSystem>,
    current: Mutex<Locator>,
}

impl LegacyRequire {
    /// Create the require function of `system`'s runtime. `pwd` is the
    /// directory of the root script.
    pub fn new(system: Arc<ModuleSystem>, pwd: Locator) -> Self {
        Self {
            system,
            current: Mutex::new(pwd),
        }
    }

    /// The module system requests go through.
    pub fn system(&self) -> &Arc<ModuleSystem> {
        &self.system
    }

    /// Directory of the file currently being required, as tracked across
    /// calls.
    pub fn tracked_base(&self) -> Locator {
        self.current.lock().clone()
    }

    /// Define the global `require` function in `rt`.
    pub fn install(self: &Arc<Self>, rt: &Runtime) {
        let this = Arc::clone(self);
        let require = Function::native(REQUIRE_FUNCTION, move |rt, args| {
            let specifier = match args.first() {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => Value::Undefined.to_string(),
            };
            this.require(rt, &specifier).map_err(Exception::from)
        });
        rt.set_global(REQUIRE_FUNCTION, require);
    }

    /// Load `specifier` and return what the caller sees as its exports.
    ///
    /// - native modules with structured exports: flattened, see
    ///   [`to_es_module_exports`]
    /// - factory modules: the final `module.exports`
    /// - everything else: the namespace object
    pub fn require(&self, rt: &mut Runtime, specifier: &str) -> Result<Value> {
        if specifier.is_empty() {
            return Err(ModuleError::EmptySpecifier);
        }

        let resolver = Arc::clone(self.system.resolver());
        let tracked = self.tracked_base();
        let _restore = if resolver.config().is_builtin(specifier) {
            None
        } else {
            let locator = Locator::resolve(&tracked, specifier)?;
            *self.current.lock() = locator.dir();
            Some(Restore {
                slot: &self.current,
                previous: tracked.clone(),
            })
        };

        let depth = resolver.config().stack_depth;
        let mut parent = current_module_script(rt);
        let requiring_file = previous_requiring_file(rt, depth);
        if parent != requiring_file {
            warn!(
                "requiring {specifier} got two different module scripts {:?} and {:?}",
                parent, requiring_file
            );
            parent = requiring_file;
        }

        let base = parent
            .and_then(|src| Locator::resolve(resolver.base(), &src).ok())
            .map(|locator| resolver.base_for(&locator))
            .unwrap_or_else(|| resolver.base().clone());
        if base != tracked && !resolver.config().is_builtin(specifier) {
            warn!("requiring {specifier}: tracked base {tracked} disagrees with call stack base {base}");
        }

        let record = resolver.resolve(&base, specifier)?;
        debug!("require({specifier:?}) -> {}", record.name());
        let instance = self.system.evaluate(rt, &record)?;
        let exports = match (record.kind(), instance.kind()) {
            (RecordKind::Native(_), InstanceKind::Native(native)) => to_es_module_exports(&native.exports()),
            (RecordKind::Factory(_), InstanceKind::Factory(factory)) => factory.exports(),
            (RecordKind::Graph(_), _) | (RecordKind::Plain(_), _) => {
                Value::Object(self.system.namespace_object(&instance))
            }
            _ => panic!("instance of {} does not match its record", record.name()),
        };
        Ok(exports)
    }

    /// Directory of the file most recently entered through `require`,
    /// recovered from the call stack. Used by helpers that open files
    /// relative to the requiring script.
    pub fn currently_required_module(&self, rt: &Runtime) -> Locator {
        let resolver = self.system.resolver();
        previous_requiring_file(rt, resolver.config().stack_depth)
            .and_then(|src| Locator::parse(&src).ok())
            .map(|locator| resolver.base_for(&locator))
            .unwrap_or_else(|| self.tracked_base())
    }
}

struct Restore<'a> {
    slot: &'a Mutex<Locator>,
    previous: Locator,
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = self.previous.clone();
    }
}

/// Source of the code calling `require`. The innermost frame is `require`
/// itself.
fn current_module_script(rt: &Runtime) -> Option<String> {
    rt.capture_call_stack(2)
        .get(1)
        .map(|frame| frame.src_name().to_string())
}

/// Source of the code the last active `require` call entered; the
/// outermost frame when there is none.
///
/// # Panics
///
/// If the stack is at least `depth` frames deep without an earlier
/// `require`, since the answer could lie beyond what was captured.
fn previous_requiring_file(rt: &Runtime, depth: usize) -> Option<String> {
    let frames = rt.capture_call_stack(depth);
    // the first frame is the current require
    let entered = frames
        .windows(2)
        .find(|pair| pair[1].is_native() && pair[1].func_name() == REQUIRE_FUNCTION);
    if let Some(pair) = entered {
        return Some(pair[0].src_name().to_string());
    }
    if frames.len() >= depth {
        panic!("call stack deeper than {depth} frames while looking for the requiring file");
    }
    frames.last().map(|frame| frame.src_name().to_string())
}
