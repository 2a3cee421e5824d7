// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Exceptions thrown by script code.

use crate::value::Value;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Result type for operations that run script code
pub type Result<T> = std::result::Result<T, Exception>;

/// Errors that propagate through script execution.
#[derive(Debug, Clone, Error)]
pub enum Exception {
    /// A value thrown by script code
    #[error("Uncaught {0}")]
    Thrown(Value),

    /// Type error (wrong value type)
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Syntax error reported while compiling source
    #[error("SyntaxError: {0}")]
    SyntaxError(String),

    /// A native error travelling through script frames
    #[error("{0}")]
    Host(Arc<dyn StdError + Send + Sync>),
}

impl Exception {
    /// Create a new TypeError
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a new SyntaxError
    pub fn syntax_error(msg: impl Into<String>) -> Self {
        Self::SyntaxError(msg.into())
    }

    /// Wrap a native error so it can be thrown through script code.
    pub fn host<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Host(Arc::new(err))
    }

    /// Recover the native error carried by [`Exception::Host`].
    pub fn downcast_host<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Self::Host(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<Value> for Exception {
    fn from(value: Value) -> Self {
        Self::Thrown(value)
    }
}
