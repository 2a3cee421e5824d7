// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Source acquisition

use crate::error::LoadError;
use crate::locator::Locator;
use bytes::Bytes;
use dashmap::DashMap;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Maps a resolved locator to raw source bytes.
///
/// `specifier` is the string as written by the requesting code and is only
/// used for error reporting. Failing to find a source is a normal error.
pub trait Loader: Send + Sync {
    /// Load the source at `locator`.
    fn load(&self, locator: &Locator, specifier: &str) -> Result<Bytes, LoadError>;
}

/// A unit of source whose bytes were acquired up front, such as the root
/// script of a run.
#[derive(Debug, Clone)]
pub struct SourceData {
    /// Where the source lives
    pub locator: Locator,
    /// The raw source
    pub data: Bytes,
}

impl SourceData {
    /// Create a new source unit
    pub fn new(locator: Locator, data: impl Into<Bytes>) -> Self {
        Self {
            locator,
            data: data.into(),
        }
    }
}

/// Loads `file://` locators from the local filesystem.
///
/// Remote locators are refused; fetching sources over the network is left to
/// hosts that bring their own loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl FsLoader {
    /// Create a filesystem loader
    pub fn new() -> Self {
        Self
    }
}

impl Loader for FsLoader {
    fn load(&self, locator: &Locator, specifier: &str) -> Result<Bytes, LoadError> {
        let Some(path) = locator.to_file_path() else {
            return Err(LoadError::UnsupportedScheme(locator.to_string()));
        };

        debug!("Loading {}", path.display());
        match std::fs::read(&path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(LoadError::NotFound {
                locator: locator.to_string(),
                specifier: specifier.to_string(),
            }),
            Err(e) => Err(LoadError::Io {
                locator: locator.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// An in-memory table of sources.
///
/// Counts every load so callers can check how often sources were fetched.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    sources: DashMap<String, Bytes>,
    loads: AtomicUsize,
}

impl MemoryLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the source at `locator`.
    pub fn insert(&self, locator: &str, data: impl Into<Bytes>) {
        self.sources.insert(locator.to_string(), data.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(self, locator: &str, data: impl Into<Bytes>) -> Self {
        self.insert(locator, data);
        self
    }

    /// Number of `load` calls so far, failed ones included.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Loader for MemoryLoader {
    fn load(&self, locator: &Locator, specifier: &str) -> Result<Bytes, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.sources
            .get(locator.as_str())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LoadError::NotFound {
                locator: locator.to_string(),
                specifier: specifier.to_string(),
            })
    }
}
