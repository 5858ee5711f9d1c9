//! # pbscope-core
//!
//! A library for decoding raw Protocol Buffers payloads against compiled
//! descriptor sets, with no generated message code.
//!
//! Given serialized `FileDescriptorSet` binaries (as produced by
//! `protoc --descriptor_set_out`), this crate builds an in-memory type
//! registry spanning multiple interdependent descriptor files and decodes
//! arbitrary wire-format bytes into a structured, human-readable form by
//! consulting that registry at runtime.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`descriptor`]: descriptor-set deserialization and the in-memory model
//! - [`registry`]: type registry and root-directory import resolution
//! - [`decode`]: wire-format parsing and descriptor-driven decoding
//! - [`render`]: JSON-like rendering with well-known-type handling
//! - [`inspector`]: session facade tying the above together
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use pbscope_core::{Inspector, PayloadMode};
//!
//! let mut inspector = Inspector::new();
//! inspector.parse_file_descriptor("./google.common.desc")?;
//! inspector.parse_file_descriptor("./book.desc")?;
//!
//! let data = std::fs::read("./payload.bin")?;
//! for content in inspector.decode("com.proxyman.BookInfo", &data, PayloadMode::Auto) {
//!     match content.raw_text {
//!         Some(text) => println!("{}", text),
//!         None => eprintln!("{}", content.error.unwrap_or_default()),
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Ordering and resolution
//!
//! Descriptor files may be loaded in any order. Type references between
//! files are kept as name strings and resolved against the registry at
//! decode time; fields whose types are still unresolved decode to preserved
//! raw bytes rather than errors.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod decode;
pub mod descriptor;
pub mod error;
pub mod inspector;
pub mod registry;
pub mod render;

// Re-export primary types for convenience
pub use decode::{
    decode_message, decode_payload, detect_framing, DecodedContent, DecodedField, DecodedMessage,
    DecodedValue, FramingStrategy, PayloadMode, UnknownValue,
};
pub use descriptor::{
    Cardinality, EnumDescriptor, FieldDescriptor, FieldKind, FileRecord, MessageDescriptor,
    ParsedFile,
};
pub use error::{Error, Result};
pub use inspector::Inspector;
pub use registry::TypeRegistry;
pub use render::Renderer;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;
