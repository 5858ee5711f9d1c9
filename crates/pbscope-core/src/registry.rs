//! Type registry and root-directory resolution.
//!
//! The registry is the single index from fully-qualified type name to
//! descriptor. It is an explicitly constructed value, passed by reference
//! into the decoder and renderer; there is no process-wide singleton, so
//! tests and sessions stay independent.
//!
//! Loading is additive: registering a name that already exists replaces the
//! descriptor (last write wins) while keeping its original position in the
//! insertion-order listing. [`TypeRegistry::reset`] returns the registry to
//! its initial empty state, including registered root directories.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::descriptor::{EnumDescriptor, FileRecord, MessageDescriptor, ParsedFile};

/// Index from fully-qualified type name to descriptor.
///
/// Mutation happens only while loading descriptor files; the decode path
/// takes `&TypeRegistry` and may run concurrently once loading is done.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    messages: HashMap<String, MessageDescriptor>,
    enums: HashMap<String, EnumDescriptor>,
    message_order: Vec<String>,
    files: HashMap<String, FileRecord>,
    roots: Vec<PathBuf>,
}

impl TypeRegistry {
    /// Creates an empty registry with no roots registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers all types a parsed descriptor file declares.
    ///
    /// Re-installing a file (or another file declaring the same names)
    /// replaces the previous descriptors.
    pub fn install(&mut self, file: ParsedFile) {
        let ParsedFile {
            record,
            messages,
            enums,
        } = file;

        debug!(
            "installing '{}': {} message(s), {} enum(s), {} import(s)",
            record.name,
            messages.len(),
            enums.len(),
            record.imports.len()
        );

        for message in messages {
            self.register_message(message);
        }
        for enum_type in enums {
            self.enums.insert(enum_type.full_name().to_string(), enum_type);
        }
        self.files.insert(record.name.clone(), record);
    }

    fn register_message(&mut self, message: MessageDescriptor) {
        let name = message.full_name().to_string();
        if self.messages.insert(name.clone(), message).is_none() {
            self.message_order.push(name);
        }
    }

    /// Looks up a message descriptor by fully-qualified name.
    pub fn lookup_message(&self, name: &str) -> Option<&MessageDescriptor> {
        self.messages.get(name)
    }

    /// Looks up an enum descriptor by fully-qualified name.
    pub fn lookup_enum(&self, name: &str) -> Option<&EnumDescriptor> {
        self.enums.get(name)
    }

    /// Returns the record of a loaded descriptor file, if present.
    pub fn file(&self, name: &str) -> Option<&FileRecord> {
        self.files.get(name)
    }

    /// All registered message type names, in insertion order.
    pub fn all_message_types(&self) -> &[String] {
        &self.message_order
    }

    /// Number of registered message types
    pub fn message_count(&self) -> usize {
        self.message_order.len()
    }

    /// Removes every type a previously-loaded descriptor file declared.
    ///
    /// Returns false when no file of that name was loaded. Types that were
    /// re-declared by a later file stay registered under the later file's
    /// definition only if that file is still loaded; removal here simply
    /// drops the names this file recorded.
    pub fn remove_file(&mut self, name: &str) -> bool {
        let Some(record) = self.files.remove(name) else {
            return false;
        };
        for message in &record.messages {
            if self.messages.remove(message).is_some() {
                self.message_order.retain(|n| n != message);
            }
        }
        for enum_type in &record.enums {
            self.enums.remove(enum_type);
        }
        debug!("removed '{}' and its declared types", name);
        true
    }

    /// Adds a search root for import resolution. Roots are probed in
    /// registration order.
    pub fn register_root(&mut self, dir: impl Into<PathBuf>) {
        self.roots.push(dir.into());
    }

    /// Registered search roots, in registration order
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolves a referenced file name against the registered roots.
    ///
    /// First existing match wins. Returns None when no root contains the
    /// file.
    pub fn resolve_import(&self, name: &str) -> Option<PathBuf> {
        self.roots.iter().map(|root| root.join(name)).find(|p| p.is_file())
    }

    /// Clears all registered types, file records, and roots.
    ///
    /// Safe to call at any session boundary; never fails.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.enums.clear();
        self.message_order.clear();
        self.files.clear();
        self.roots.clear();
    }
}
