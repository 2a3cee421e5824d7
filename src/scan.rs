// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! A compiler that reads module structure off the source text
//!
//! Nothing is evaluated. Sources with `import`/`export` statements become
//! graph modules declaring what they import and export. Everything else is a
//! factory module whose body repeats each literal `require('...')` call, so
//! the module graph is walked the same way running the script would.

use regex::Regex;
use spacey_host::{Exception, ModuleSource, Program, Script, Value};
use spacey_modules::Compiler;
use std::sync::LazyLock;

static IMPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*(?:import|export)\s[^'";]*?\bfrom\s+['"]([^'"]+)['"]"#).expect("valid regex")
});

static IMPORT_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*import\s+['"]([^'"]+)['"]"#).expect("valid regex"));

static EXPORT_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*export\s+(?:async\s+)?(?:const|let|var|function\*?|class)\s+([A-Za-z_$][\w$]*)"#)
        .expect("valid regex")
});

static EXPORT_DEFAULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*export\s+default\b"#).expect("valid regex"));

static EXPORT_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*export\s*\{([^}]*)\}"#).expect("valid regex"));

static REQUIRE_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\brequire\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid regex"));

/// Classifies sources and extracts their dependencies.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanCompiler;

impl ScanCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Compiler for ScanCompiler {
    fn compile(&self, source: &str, name: &str, _is_builtin: bool) -> Result<Program, Exception> {
        let mut requested = Vec::new();
        for cap in IMPORT_FROM.captures_iter(source).chain(IMPORT_BARE.captures_iter(source)) {
            push_unique(&mut requested, &cap[1]);
        }

        let mut exported = Vec::new();
        if EXPORT_DEFAULT.is_match(source) {
            push_unique(&mut exported, "default");
        }
        for cap in EXPORT_DECLARATION.captures_iter(source) {
            push_unique(&mut exported, &cap[1]);
        }
        for cap in EXPORT_LIST.captures_iter(source) {
            for entry in cap[1].split(',') {
                let exported_name = match entry.split_once(" as ") {
                    Some((_, alias)) => alias.trim(),
                    None => entry.trim(),
                };
                if !exported_name.is_empty() {
                    push_unique(&mut exported, exported_name);
                }
            }
        }

        let is_graph = !requested.is_empty()
            || !exported.is_empty()
            || source.lines().any(|line| line.trim_start().starts_with("import "));
        if is_graph {
            let module = ModuleSource::new(|_, _| Ok(()))
                .requests(requested)
                .exports(exported)
                .with_name(name);
            return Ok(Program::Module(module));
        }

        let mut required = Vec::new();
        for cap in REQUIRE_CALL.captures_iter(source) {
            push_unique(&mut required, &cap[1]);
        }
        Ok(Program::Script(Script::factory(name, move |rt, _| {
            let require = rt.get_global("require");
            for specifier in &required {
                rt.call(&require, &[Value::from(specifier.as_str())])?;
            }
            Ok(Value::Undefined)
        })))
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}
