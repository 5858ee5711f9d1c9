//! In-memory descriptor model and descriptor-set deserialization.
//!
//! This module turns serialized `FileDescriptorSet`/`FileDescriptorProto`
//! binaries (as produced by `protoc --descriptor_set_out`) into the flat,
//! name-indexed model the rest of the crate works with.
//!
//! Type references between messages are kept as fully-qualified name strings
//! rather than direct links. They are resolved against the [`TypeRegistry`]
//! at decode time, so descriptor files may be loaded in any order and
//! references into not-yet-loaded files are tolerated.
//!
//! [`TypeRegistry`]: crate::registry::TypeRegistry

use std::collections::HashMap;

use prost::Message;
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    FileDescriptorSet,
};

use crate::error::{Error, Result};

/// Declared field type, with message/enum references kept as name strings.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// 64-bit IEEE float, wire type I64
    Double,
    /// 32-bit IEEE float, wire type I32
    Float,
    /// Signed varint (two's complement encoding)
    Int32,
    /// Signed varint (two's complement encoding)
    Int64,
    /// Unsigned varint
    Uint32,
    /// Unsigned varint
    Uint64,
    /// Signed varint (zigzag encoding)
    Sint32,
    /// Signed varint (zigzag encoding)
    Sint64,
    /// Fixed 4 bytes, unsigned
    Fixed32,
    /// Fixed 8 bytes, unsigned
    Fixed64,
    /// Fixed 4 bytes, signed
    Sfixed32,
    /// Fixed 8 bytes, signed
    Sfixed64,
    /// Varint 0/1
    Bool,
    /// Length-delimited UTF-8
    String,
    /// Length-delimited raw bytes
    Bytes,
    /// Nested message, referenced by fully-qualified name
    Message(std::string::String),
    /// Enum, referenced by fully-qualified name
    Enum(std::string::String),
}

impl FieldKind {
    /// Returns true for numeric scalar kinds that may appear in a packed run.
    pub fn is_packable(&self) -> bool {
        !matches!(
            self,
            FieldKind::String | FieldKind::Bytes | FieldKind::Message(_)
        )
    }
}

/// Field cardinality as declared in the descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Singular, may be absent
    Optional,
    /// Proto2 required
    Required,
    /// Repeated (including map fields)
    Repeated,
}

/// A single field declaration within a message.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field number, unique within the owning message
    pub number: u32,
    /// Declared field name (snake_case)
    pub name: String,
    /// JSON name used for rendering (lower-camel)
    pub json_name: String,
    /// Declared type
    pub kind: FieldKind,
    /// Cardinality
    pub cardinality: Cardinality,
    /// Whether repeated scalar occurrences are packed by default
    pub packed: bool,
    /// Index into the owning message's oneof list, if any
    pub oneof_index: Option<usize>,
}

/// A message type declaration.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    full_name: String,
    fields: Vec<FieldDescriptor>,
    oneofs: Vec<String>,
    map_entry: bool,
    by_number: HashMap<u32, usize>,
}

impl MessageDescriptor {
    /// Creates a descriptor from its parts, indexing fields by number.
    pub fn new(
        full_name: String,
        fields: Vec<FieldDescriptor>,
        oneofs: Vec<String>,
        map_entry: bool,
    ) -> Self {
        let mut by_number = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            // Field numbers are unique per message; keep the first on a
            // malformed duplicate.
            by_number.entry(field.number).or_insert(i);
        }
        Self {
            full_name,
            fields,
            oneofs,
            map_entry,
            by_number,
        }
    }

    /// Fully-qualified type name (package + nesting, dot-separated)
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by its wire-format field number.
    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    /// Oneof group names declared by this message
    pub fn oneofs(&self) -> &[String] {
        &self.oneofs
    }

    /// True when this message is the synthetic entry type of a map field.
    pub fn is_map_entry(&self) -> bool {
        self.map_entry
    }
}

/// An enum type declaration.
#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    full_name: String,
    values: Vec<(i32, String)>,
    by_number: HashMap<i32, usize>,
}

impl EnumDescriptor {
    /// Creates a descriptor from declared (number, name) pairs.
    ///
    /// Numbers need not be unique (aliases); the first-declared name wins
    /// for display.
    pub fn new(full_name: String, values: Vec<(i32, String)>) -> Self {
        let mut by_number = HashMap::with_capacity(values.len());
        for (i, (number, _)) in values.iter().enumerate() {
            by_number.entry(*number).or_insert(i);
        }
        Self {
            full_name,
            values,
            by_number,
        }
    }

    /// Fully-qualified type name
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Declared values in declaration order
    pub fn values(&self) -> &[(i32, String)] {
        &self.values
    }

    /// Symbolic name for a wire value, if declared.
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.by_number.get(&number).map(|&i| self.values[i].1.as_str())
    }
}

/// Identity and declarations of one loaded descriptor file.
///
/// Immutable once parsed; the registry keeps one record per file so types
/// can be removed again by file name.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Descriptor file name as recorded by the compiler (e.g. `book.proto`)
    pub name: String,
    /// Package declared by the file
    pub package: String,
    /// Fully-qualified message names declared by the file, in declaration order
    pub messages: Vec<String>,
    /// Fully-qualified enum names declared by the file
    pub enums: Vec<String>,
    /// Import names the file depends on
    pub imports: Vec<String>,
}

/// One descriptor file converted to the in-memory model.
#[derive(Debug)]
pub struct ParsedFile {
    /// File identity and declaration lists
    pub record: FileRecord,
    /// Message descriptors in declaration (pre-)order
    pub messages: Vec<MessageDescriptor>,
    /// Enum descriptors in declaration order
    pub enums: Vec<EnumDescriptor>,
}

/// Deserializes descriptor-set bytes into parsed files.
///
/// Accepts a `FileDescriptorSet` (the usual `protoc` output) or a bare
/// `FileDescriptorProto`.
pub fn parse_descriptor_set(data: &[u8]) -> Result<Vec<ParsedFile>> {
    if let Ok(set) = FileDescriptorSet::decode(data) {
        if !set.file.is_empty() {
            return Ok(set.file.iter().map(convert_file).collect());
        }
    }

    let proto = FileDescriptorProto::decode(data)?;
    if proto.name().is_empty() && proto.message_type.is_empty() && proto.enum_type.is_empty() {
        return Err(Error::NoDescriptors);
    }
    Ok(vec![convert_file(&proto)])
}

fn convert_file(proto: &FileDescriptorProto) -> ParsedFile {
    let package = proto.package().to_string();
    let proto3 = proto.syntax() == "proto3";

    let mut messages = Vec::new();
    let mut enums = Vec::new();
    for message in &proto.message_type {
        convert_message(message, &package, proto3, &mut messages, &mut enums);
    }
    for enum_type in &proto.enum_type {
        enums.push(convert_enum(enum_type, &package));
    }

    let record = FileRecord {
        name: proto.name().to_string(),
        package,
        messages: messages.iter().map(|m| m.full_name().to_string()).collect(),
        enums: enums.iter().map(|e| e.full_name().to_string()).collect(),
        imports: proto.dependency.clone(),
    };

    ParsedFile {
        record,
        messages,
        enums,
    }
}

fn convert_message(
    proto: &DescriptorProto,
    scope: &str,
    proto3: bool,
    messages: &mut Vec<MessageDescriptor>,
    enums: &mut Vec<EnumDescriptor>,
) {
    let full_name = qualify(scope, proto.name());
    let oneofs = proto
        .oneof_decl
        .iter()
        .map(|o| o.name().to_string())
        .collect();
    let fields = proto
        .field
        .iter()
        .map(|f| convert_field(f, proto3))
        .collect();
    let map_entry = proto
        .options
        .as_ref()
        .map_or(false, |o| o.map_entry.unwrap_or(false));

    messages.push(MessageDescriptor::new(
        full_name.clone(),
        fields,
        oneofs,
        map_entry,
    ));

    // Nested declarations are registered flat under their qualified names,
    // parent first. Map entry types are kept: the decoder looks them up by
    // name like any other message.
    for nested in &proto.nested_type {
        convert_message(nested, &full_name, proto3, messages, enums);
    }
    for enum_type in &proto.enum_type {
        enums.push(convert_enum(enum_type, &full_name));
    }
}

fn convert_field(proto: &FieldDescriptorProto, proto3: bool) -> FieldDescriptor {
    use prost_types::field_descriptor_proto::{Label, Type};

    let kind = match proto.r#type() {
        Type::Double => FieldKind::Double,
        Type::Float => FieldKind::Float,
        Type::Int64 => FieldKind::Int64,
        Type::Uint64 => FieldKind::Uint64,
        Type::Int32 => FieldKind::Int32,
        Type::Fixed64 => FieldKind::Fixed64,
        Type::Fixed32 => FieldKind::Fixed32,
        Type::Bool => FieldKind::Bool,
        Type::String => FieldKind::String,
        Type::Bytes => FieldKind::Bytes,
        Type::Uint32 => FieldKind::Uint32,
        Type::Sfixed32 => FieldKind::Sfixed32,
        Type::Sfixed64 => FieldKind::Sfixed64,
        Type::Sint32 => FieldKind::Sint32,
        Type::Sint64 => FieldKind::Sint64,
        Type::Group | Type::Message => FieldKind::Message(strip_leading_dot(proto.type_name())),
        Type::Enum => FieldKind::Enum(strip_leading_dot(proto.type_name())),
    };

    let cardinality = match proto.label() {
        Label::Repeated => Cardinality::Repeated,
        Label::Required => Cardinality::Required,
        Label::Optional => Cardinality::Optional,
    };

    let packed = proto
        .options
        .as_ref()
        .and_then(|o| o.packed)
        .unwrap_or(proto3 && cardinality == Cardinality::Repeated && kind.is_packable());

    let json_name = if proto.json_name().is_empty() {
        to_lower_camel_case(proto.name())
    } else {
        proto.json_name().to_string()
    };

    FieldDescriptor {
        number: proto.number().max(0) as u32,
        name: proto.name().to_string(),
        json_name,
        kind,
        cardinality,
        packed,
        oneof_index: proto.oneof_index.map(|i| i.max(0) as usize),
    }
}

fn convert_enum(proto: &EnumDescriptorProto, scope: &str) -> EnumDescriptor {
    let values = proto
        .value
        .iter()
        .map(|v| (v.number(), v.name().to_string()))
        .collect();
    EnumDescriptor::new(qualify(scope, proto.name()), values)
}

/// Joins a scope (package or enclosing message) with a simple name.
fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

/// Descriptor type references carry a leading dot when fully qualified.
fn strip_leading_dot(name: &str) -> String {
    name.strip_prefix('.').unwrap_or(name).to_string()
}

/// Convert a snake_case name to lowerCamelCase
pub(crate) fn to_lower_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;

    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}
