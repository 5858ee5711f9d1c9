//! Error types for the pbscope-core library.
//!
//! This module provides comprehensive error handling using the `thiserror` crate,
//! with detailed error variants for different failure modes.
//!
//! Load-time errors (`FileNotFound`, `FileRead`, `MalformedDescriptor`) abort the
//! current load call only; types registered by earlier loads stay valid. Wire-level
//! errors are scoped to the message frame being decoded.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pbscope operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all pbscope operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input file does not exist
    #[error("file not found: '{path}'")]
    FileNotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Descriptor binary could not be deserialized
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(#[from] prost::DecodeError),

    /// Descriptor binary deserialized but declared no file descriptors
    #[error("descriptor set contains no file descriptors")]
    NoDescriptors,

    /// Requested message type is not present in the registry
    #[error("unresolved message type '{name}': no loaded descriptor declares it")]
    UnresolvedType {
        /// Fully-qualified type name that failed to resolve
        name: String,
    },

    /// Structural corruption inside a wire-format message body
    #[error("malformed wire data at offset {offset}: {details}")]
    MalformedWireData {
        /// Byte offset within the current frame
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Failed to decode varint
    #[error("failed to decode varint at offset {offset}: buffer too small or invalid encoding")]
    VarintDecode {
        /// Byte offset where the error occurred
        offset: usize,
    },

    /// Observed wire type is not among the recognized categories
    #[error("unsupported wire type {value} at offset {offset}")]
    UnsupportedWireType {
        /// The raw wire type bits
        value: u8,
        /// Byte offset of the tag that carried it
        offset: usize,
    },

    /// Invalid field number in a tag
    #[error("invalid field number {number}: must be between 1 and {max}")]
    InvalidFieldNumber {
        /// The invalid field number
        number: u32,
        /// Maximum valid field number
        max: u32,
    },
}

impl Error {
    /// Creates a new file-not-found error
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new unresolved-type error
    pub fn unresolved_type(name: impl Into<String>) -> Self {
        Self::UnresolvedType { name: name.into() }
    }

    /// Creates a new wire format error
    pub fn malformed_wire_data(offset: usize, details: impl Into<String>) -> Self {
        Self::MalformedWireData {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new varint decode error
    pub fn varint_decode(offset: usize) -> Self {
        Self::VarintDecode { offset }
    }

    /// Creates a new unsupported-wire-type error
    pub fn unsupported_wire_type(value: u8, offset: usize) -> Self {
        Self::UnsupportedWireType { value, offset }
    }

    /// Returns true if this error is scoped to a single message frame.
    ///
    /// Frame-scoped errors fail the message being decoded without affecting
    /// sibling frames in a delimited stream or previously-registered types.
    pub fn is_frame_scoped(&self) -> bool {
        matches!(
            self,
            Self::MalformedWireData { .. }
                | Self::VarintDecode { .. }
                | Self::UnsupportedWireType { .. }
                | Self::InvalidFieldNumber { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::file_not_found("/missing/data.desc");
        assert!(err.to_string().contains("file not found"));
        assert!(err.to_string().contains("/missing/data.desc"));

        let err = Error::unresolved_type("com.example.Missing");
        assert!(err.to_string().contains("com.example.Missing"));
    }

    #[test]
    fn test_is_frame_scoped() {
        assert!(Error::malformed_wire_data(3, "length past end of buffer").is_frame_scoped());
        assert!(Error::varint_decode(0).is_frame_scoped());
        assert!(Error::unsupported_wire_type(3, 7).is_frame_scoped());
        assert!(!Error::file_not_found("/tmp/x.desc").is_frame_scoped());
        assert!(!Error::unresolved_type("a.B").is_frame_scoped());
    }
}
