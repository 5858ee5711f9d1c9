//! Session facade over the registry, descriptor store, and decoder.
//!
//! An [`Inspector`] owns one [`TypeRegistry`] and exposes the full
//! load/inspect/decode surface: register root directories, load descriptor
//! files (by path or by name resolved against the roots), list registered
//! message types, decode payload bytes against a type, and reset back to a
//! clean session.
//!
//! Loading is sequential; decoding only reads the registry, so an
//! `&Inspector` may be shared across threads once loading is complete.

use std::path::Path;

use tracing::debug;

use crate::decode::{decode_payload, DecodedContent, PayloadMode};
use crate::descriptor::parse_descriptor_set;
use crate::error::{Error, Result};
use crate::registry::TypeRegistry;

/// A descriptor-loading and payload-decoding session.
#[derive(Debug, Default)]
pub struct Inspector {
    registry: TypeRegistry,
}

impl Inspector {
    /// Creates an inspector with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the underlying registry.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Adds a search root for [`load_file`](Self::load_file).
    pub fn register_root(&mut self, dir: impl AsRef<Path>) {
        self.registry.register_root(dir.as_ref().to_path_buf());
    }

    /// Loads a serialized descriptor-set file and registers every type it
    /// declares.
    ///
    /// Files may be loaded in any order; references into files loaded later
    /// resolve once those files arrive. A failed load leaves previously
    /// registered types untouched.
    pub fn parse_file_descriptor(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::file_not_found(path));
        }
        let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;

        let files = parse_descriptor_set(&data)?;
        debug!(
            "parsed '{}': {} file descriptor(s)",
            path.display(),
            files.len()
        );
        for file in files {
            self.registry.install(file);
        }
        Ok(())
    }

    /// Loads a descriptor file by name, resolved against the registered
    /// roots in registration order.
    pub fn load_file(&mut self, name: &str) -> Result<()> {
        let Some(path) = self.registry.resolve_import(name) else {
            return Err(Error::file_not_found(name));
        };
        self.parse_file_descriptor(path)
    }

    /// Unregisters the types declared by the named descriptor files.
    ///
    /// Unknown names are ignored; returns how many files were removed.
    pub fn remove_files<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        names
            .iter()
            .filter(|name| self.registry.remove_file(name.as_ref()))
            .count()
    }

    /// All registered message type names, in insertion order.
    pub fn all_message_types(&self) -> &[String] {
        self.registry.all_message_types()
    }

    /// Decodes payload bytes against a registered message type.
    ///
    /// Returns one [`DecodedContent`] per frame. An unregistered type name
    /// yields a single error content flagged as missing schema; per-frame
    /// decode errors never abort sibling frames.
    pub fn decode(&self, type_name: &str, data: &[u8], mode: PayloadMode) -> Vec<DecodedContent> {
        decode_payload(&self.registry, type_name, data, mode)
    }

    /// Clears all registered types and roots, returning the session to its
    /// initial empty state. Never fails.
    pub fn reset_all(&mut self) {
        self.registry.reset();
    }
}
