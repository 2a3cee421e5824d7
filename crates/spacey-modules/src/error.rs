// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for module resolution, linking and evaluation

use spacey_host::Exception;
use thiserror::Error;

/// Result type for module operations
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Errors that can occur while resolving, loading, compiling, linking or
/// evaluating modules.
///
/// Errors are `Clone` because failed resolutions are cached and handed back
/// unchanged to every later request for the same module.
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    /// `require("")`
    #[error("require() can't be used with an empty specifier")]
    EmptySpecifier,

    /// The specifier could not be turned into a locator
    #[error("Error resolving module '{specifier}': {reason}")]
    InvalidSpecifier {
        /// Module specifier as written
        specifier: String,
        /// Reason for failure
        reason: String,
    },

    /// Name inside the built-in namespace that no host module answers to
    #[error("unknown module: {0}")]
    UnknownModule(String),

    /// Source could not be acquired
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The compiler rejected the source
    #[error("{source}")]
    Compile {
        /// Name the source was compiled under
        name: String,
        /// The compiler's report
        source: Exception,
    },

    /// A factory module left nullish exports behind
    #[error("exports must be an object in module '{0}'")]
    InvalidExports(String),

    /// A module body threw
    #[error("{0}")]
    Evaluation(Exception),

    /// Configuration could not be read
    #[error("Invalid configuration in '{path}': {reason}")]
    Config {
        /// Configuration file
        path: String,
        /// Reason for failure
        reason: String,
    },
}

impl ModuleError {
    /// Create a resolution error
    pub fn invalid_specifier(specifier: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidSpecifier {
            specifier: specifier.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors reported by a [`Loader`](crate::loader::Loader).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Nothing exists at the locator
    #[error("The moduleSpecifier \"{specifier}\" couldn't be found on local disk. Make sure that you've specified the right path to the file. ({locator})")]
    NotFound {
        /// Locator that was looked up
        locator: String,
        /// Specifier as written
        specifier: String,
    },

    /// The source exists but could not be read
    #[error("Error reading '{locator}': {reason}")]
    Io {
        /// Locator that was read
        locator: String,
        /// Reason for failure
        reason: String,
    },

    /// The source was read but is not UTF-8 text
    #[error("Source at '{locator}' is not valid UTF-8: {reason}")]
    Encoding {
        /// Locator that was read
        locator: String,
        /// Reason for failure
        reason: String,
    },

    /// The loader has no transport for the locator's scheme
    #[error("Loading '{0}' is not supported")]
    UnsupportedScheme(String),
}

// Errors thrown through script code come back out as the error that went in,
// so that every module waiting on a failed one sees the same failure.
impl From<ModuleError> for Exception {
    fn from(err: ModuleError) -> Self {
        match err {
            ModuleError::Evaluation(exception) => exception,
            other => Exception::host(other),
        }
    }
}

impl From<Exception> for ModuleError {
    fn from(exception: Exception) -> Self {
        match exception.downcast_host::<ModuleError>() {
            Some(err) => err.clone(),
            None => ModuleError::Evaluation(exception),
        }
    }
}
