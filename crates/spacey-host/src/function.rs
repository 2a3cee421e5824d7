// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Callable values.

use crate::error::Exception;
use crate::runtime::Runtime;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Source name reported by frames of native functions.
pub const NATIVE_SOURCE: &str = "<native>";

/// Signature shared by every callable body.
pub type NativeFunction =
    dyn Fn(&mut Runtime, &[Value]) -> Result<Value, Exception> + Send + Sync;

struct Inner {
    name: String,
    /// Source the function was defined in; `None` for native functions
    source: Option<String>,
    body: Box<NativeFunction>,
}

/// A callable value - either compiled from a script or supplied natively.
///
/// Functions compare by identity. The source name ends up in the call stack
/// whenever the function is invoked through [`Runtime::call`].
#[derive(Clone)]
pub struct Function {
    inner: Arc<Inner>,
}

impl Function {
    /// Creates a function defined in the script named `source`.
    pub fn new<F>(name: impl Into<String>, source: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Runtime, &[Value]) -> Result<Value, Exception> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                source: Some(source.into()),
                body: Box::new(body),
            }),
        }
    }

    /// Creates a native function.
    pub fn native<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Runtime, &[Value]) -> Result<Value, Exception> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                source: None,
                body: Box::new(body),
            }),
        }
    }

    /// The function name, empty for anonymous functions.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The source name frames of this function report.
    pub fn source(&self) -> &str {
        self.inner.source.as_deref().unwrap_or(NATIVE_SOURCE)
    }

    /// Whether the function is supplied natively.
    pub fn is_native(&self) -> bool {
        self.inner.source.is_none()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Runs the body without touching the call stack.
    ///
    /// Use [`Runtime::call`] unless the caller has already pushed a frame.
    pub(crate) fn invoke(&self, rt: &mut Runtime, args: &[Value]) -> Result<Value, Exception> {
        (self.inner.body)(rt, args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "NativeFunction({})", self.name())
        } else {
            write!(f, "Function({} @ {})", self.name(), self.source())
        }
    }
}

/// A single entry of a captured call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    func_name: String,
    src_name: String,
    native: bool,
}

impl StackFrame {
    /// A frame for top-level code of the named source.
    pub fn top_level(src_name: impl Into<String>) -> Self {
        Self {
            func_name: String::new(),
            src_name: src_name.into(),
            native: false,
        }
    }

    /// A frame for a call to `func`.
    pub fn for_call(func: &Function) -> Self {
        Self {
            func_name: func.name().to_string(),
            src_name: func.source().to_string(),
            native: func.is_native(),
        }
    }

    /// Name of the executing function, empty for top-level code.
    pub fn func_name(&self) -> &str {
        &self.func_name
    }

    /// Name of the source the executing code was defined in.
    pub fn src_name(&self) -> &str {
        &self.src_name
    }

    /// Whether the frame belongs to a native function.
    pub fn is_native(&self) -> bool {
        self.native
    }
}
