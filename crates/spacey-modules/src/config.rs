// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Resolver configuration

use crate::error::{ModuleError, Result};
use crate::locator::Locator;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default built-in namespace.
pub const DEFAULT_NAMESPACE: &str = "spacey";

/// Default limit on frames captured by the legacy require stack walk.
pub const DEFAULT_STACK_DEPTH: usize = 1000;

/// Configuration for a [`ModuleResolver`](crate::resolver::ModuleResolver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Process base directory; the stdin entry point resolves against it
    pub base: Locator,

    /// Reserved prefix of built-in modules
    pub builtin_namespace: String,

    /// Maximum frames captured when walking the call stack, at least 2
    pub stack_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base: current_dir_locator(),
            builtin_namespace: DEFAULT_NAMESPACE.to_string(),
            stack_depth: DEFAULT_STACK_DEPTH,
        }
    }
}

impl ResolverConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Self::parse(input, "<inline>")
    }

    /// Read a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ModuleError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    fn parse(input: &str, path: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).map_err(|e| ModuleError::Config {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        if !config.base.as_str().ends_with('/') {
            return Err(ModuleError::Config {
                path: path.to_string(),
                reason: format!("base must be a directory locator, got {}", config.base),
            });
        }
        // require() needs its own frame and the one that called it
        if config.stack_depth < 2 {
            return Err(ModuleError::Config {
                path: path.to_string(),
                reason: format!("stack_depth must be at least 2, got {}", config.stack_depth),
            });
        }
        Ok(config)
    }

    /// Set the base directory.
    pub fn with_base(mut self, base: Locator) -> Self {
        self.base = base;
        self
    }

    /// Set the built-in namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.builtin_namespace = namespace.into();
        self
    }

    /// Whether `specifier` names a built-in module.
    pub fn is_builtin(&self, specifier: &str) -> bool {
        match specifier.strip_prefix(self.builtin_namespace.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }
}

fn current_dir_locator() -> Locator {
    std::env::current_dir()
        .ok()
        .and_then(|dir| Locator::from_directory_path(&dir).ok())
        .unwrap_or_else(|| Locator::parse("file:///").expect("root locator is a valid URL"))
}
