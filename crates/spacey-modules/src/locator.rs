// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Canonical module locations

use crate::error::{ModuleError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Locator of the entry point read from standard input.
pub const STDIN_LOCATOR: &str = "file:///-";

/// A canonical absolute module location.
///
/// Directory locators end with `/`; everything relative is resolved against
/// a directory locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(Url);

impl Locator {
    /// Parse an absolute URL.
    pub fn parse(input: &str) -> Result<Self> {
        Url::parse(input)
            .map(Self)
            .map_err(|e| ModuleError::invalid_specifier(input, e))
    }

    /// Locator of an absolute file path.
    pub fn from_file_path(path: &Path) -> Result<Self> {
        Url::from_file_path(path).map(Self).map_err(|_| {
            ModuleError::invalid_specifier(path.display().to_string(), "not an absolute path")
        })
    }

    /// Directory locator of an absolute directory path.
    pub fn from_directory_path(path: &Path) -> Result<Self> {
        Url::from_directory_path(path).map(Self).map_err(|_| {
            ModuleError::invalid_specifier(path.display().to_string(), "not an absolute path")
        })
    }

    /// The synthetic entry point used for scripts read from stdin.
    pub fn stdin() -> Self {
        Self(Url::parse(STDIN_LOCATOR).expect("stdin locator is a valid URL"))
    }

    /// Whether this is the synthetic stdin entry point.
    pub fn is_stdin(&self) -> bool {
        self.0.as_str() == STDIN_LOCATOR
    }

    /// The directory containing this locator (`file:///a/b.js` -> `file:///a/`).
    /// A directory locator is its own directory.
    pub fn dir(&self) -> Locator {
        match self.0.join("./") {
            Ok(url) => Self(url),
            // cannot-be-a-base URLs have no directory
            Err(_) => self.clone(),
        }
    }

    /// Resolve a specifier against a base directory.
    ///
    /// - `./x`, `../x` and `/x` are joined onto `base`
    /// - `scheme://...` is taken as is; only `file` and `https` are allowed,
    ///   and a remote base may not reach into local files
    /// - anything else is a remote location without its scheme
    pub fn resolve(base: &Locator, specifier: &str) -> Result<Locator> {
        if specifier.is_empty() {
            return Err(ModuleError::invalid_specifier(
                specifier,
                "local or remote path required",
            ));
        }

        if specifier.starts_with('.') || specifier.starts_with('/') {
            return base
                .0
                .join(specifier)
                .map(Self)
                .map_err(|e| ModuleError::invalid_specifier(specifier, e));
        }

        if specifier.contains("://") {
            let url = Url::parse(specifier).map_err(|e| ModuleError::invalid_specifier(specifier, e))?;
            match url.scheme() {
                "file" | "https" => {}
                other => {
                    return Err(ModuleError::invalid_specifier(
                        specifier,
                        format!("only supported schemes for imports are file and https, {specifier} has `{other}`"),
                    ));
                }
            }
            if url.scheme() == "file" && base.scheme() == "https" {
                return Err(ModuleError::invalid_specifier(
                    specifier,
                    format!("origin ({base}) not allowed to load local file: {specifier}"),
                ));
            }
            return Ok(Self(url));
        }

        Url::parse(&format!("https://{specifier}"))
            .map(Self)
            .map_err(|e| ModuleError::invalid_specifier(specifier, e))
    }

    /// URL scheme.
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// The locator as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The underlying URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Local path of a `file` locator.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.scheme() != "file" {
            return None;
        }
        self.0.to_file_path().ok()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<Url> for Locator {
    fn from(url: Url) -> Self {
        Self(url)
    }
}
