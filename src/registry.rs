//! Bundles loaded out of an indexed archive.
//!
//! A [`BundleRegistry`] is owned by whoever loads bundles and passed to the
//! code that needs them; there is no process-wide table.

use std::collections::HashMap;

use crate::zip::{ArchiveError, ArchiveIndex, LoadRequest};

/// How a bundle's bytes are made available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Copy the entry into memory.
    Memory,
    /// Keep only the offset and size; the consumer reads the file itself.
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleData {
    Memory(Vec<u8>),
    File(LoadRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedBundle {
    pub name: String,
    pub data: BundleData,
}

impl LoadedBundle {
    /// Payload length in bytes.
    pub fn size(&self) -> u64 {
        match &self.data {
            BundleData::Memory(bytes) => bytes.len() as u64,
            BundleData::File(request) => request.size,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("bundle {name} is already loaded")]
    AlreadyLoaded { name: String },

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

#[derive(Debug, Default)]
pub struct BundleRegistry {
    bundles: HashMap<String, LoadedBundle>,
}

impl BundleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the entry `name` of `index` and register it under that name.
    pub fn load(
        &mut self,
        index: &ArchiveIndex,
        name: &str,
        mode: LoadMode,
    ) -> Result<&LoadedBundle, RegistryError> {
        if self.bundles.contains_key(name) {
            return Err(RegistryError::AlreadyLoaded {
                name: name.to_string(),
            });
        }

        let data = match mode {
            LoadMode::Memory => BundleData::Memory(index.read(name)?),
            LoadMode::File => BundleData::File(index.load_request(name)?),
        };
        tracing::debug!(name, ?mode, "loaded bundle");

        let bundle = self
            .bundles
            .entry(name.to_string())
            .or_insert(LoadedBundle {
                name: name.to_string(),
                data,
            });
        Ok(bundle)
    }

    pub fn get(&self, name: &str) -> Option<&LoadedBundle> {
        self.bundles.get(name)
    }

    /// Remove one bundle, returning it if it was loaded.
    pub fn unload(&mut self, name: &str) -> Option<LoadedBundle> {
        self.bundles.remove(name)
    }

    /// Remove every bundle. Returns how many were loaded.
    pub fn unload_all(&mut self) -> usize {
        let count = self.bundles.len();
        self.bundles.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}
