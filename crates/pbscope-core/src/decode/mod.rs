//! Descriptor-driven wire decoding.
//!
//! The decoder walks raw wire-format bytes field by field, resolving each
//! field number against a [`MessageDescriptor`] from the registry and
//! recursing into nested, repeated and map values. Nothing here depends on
//! generated message types.
//!
//! Unknown field numbers, wire-type mismatches against the declared kind,
//! and references to types the registry cannot resolve all degrade to
//! preserved [`UnknownValue`]s; only structural corruption (bad varint,
//! length past the end of the buffer, group wire types) fails a frame, and
//! then only that frame.

mod wire;

use std::collections::HashMap;

use bytes::Bytes;
use tracing::trace;

use crate::descriptor::{Cardinality, FieldDescriptor, FieldKind, MessageDescriptor};
use crate::error::{Error, Result};
use crate::registry::TypeRegistry;
use crate::render::Renderer;

pub use wire::{decode_zigzag32, decode_zigzag64, WireReader, WireType};

/// Nesting bound for recursive message decoding
pub const MAX_DECODE_DEPTH: usize = 100;

/// Raw payload of a field that could not be resolved against a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum UnknownValue {
    /// Varint payload
    Varint(u64),
    /// Fixed 8-byte payload
    Fixed64(u64),
    /// Fixed 4-byte payload
    Fixed32(u32),
    /// Length-delimited payload, preserved as-is
    Bytes(Bytes),
}

/// One decoded value, tagged by its resolved shape.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// Bool scalar
    Bool(bool),
    /// 32-bit signed scalar (int32, sint32, sfixed32)
    Int32(i32),
    /// 64-bit signed scalar (int64, sint64, sfixed64)
    Int64(i64),
    /// 32-bit unsigned scalar (uint32, fixed32)
    UInt32(u32),
    /// 64-bit unsigned scalar (uint64, fixed64)
    UInt64(u64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// UTF-8 string (invalid sequences replaced)
    String(String),
    /// Raw bytes
    Bytes(Bytes),
    /// Enum value with its symbolic name when resolvable
    Enum {
        /// Wire value
        number: i32,
        /// Declared name, if the enum descriptor is loaded and declares it
        name: Option<String>,
    },
    /// Nested message
    Message(DecodedMessage),
    /// Repeated field occurrences, in wire order
    Repeated(Vec<DecodedValue>),
    /// Map entries as (key, value) pairs, in wire order
    Map(Vec<(DecodedValue, DecodedValue)>),
    /// Preserved payload of an unresolvable field
    Unknown(UnknownValue),
}

/// A decoded field: number, resolved JSON name (None for unknown fields),
/// and value.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    /// Wire-format field number
    pub number: u32,
    /// JSON (lower-camel) name when the field resolved against the descriptor
    pub name: Option<String>,
    /// Decoded value
    pub value: DecodedValue,
}

/// A decoded message: known fields in descriptor declaration order, then
/// unknown fields in first-appearance order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Fully-qualified type name of the descriptor used
    pub type_name: String,
    /// Decoded fields
    pub fields: Vec<DecodedField>,
}

impl DecodedMessage {
    /// Looks up a decoded field by number.
    pub fn field(&self, number: u32) -> Option<&DecodedField> {
        self.fields.iter().find(|f| f.number == number)
    }
}

/// How a payload buffer frames its message(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadMode {
    /// Trial single-message parse, falling back to delimited frames
    #[default]
    Auto,
    /// The whole buffer is one message
    Single,
    /// The buffer is a sequence of varint-length-prefixed messages
    Delimited,
}

/// Framing detected for a payload buffer. Advisory: an explicit
/// [`PayloadMode`] always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingStrategy {
    /// One bare message
    Single,
    /// Varint-length-prefixed frames
    MultiFramed,
}

/// Result for one decoded frame: rendered text or a frame-scoped error.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedContent {
    /// Rendered text, present on success
    pub raw_text: Option<String>,
    /// Error description, present on failure
    pub error: Option<String>,
    /// True when the requested root type was not registered at all
    pub missing_schema: bool,
}

impl DecodedContent {
    fn text(raw_text: String) -> Self {
        Self {
            raw_text: Some(raw_text),
            error: None,
            missing_schema: false,
        }
    }

    fn from_error(error: &Error) -> Self {
        Self {
            raw_text: None,
            error: Some(error.to_string()),
            missing_schema: false,
        }
    }

    fn missing_schema(error: &Error) -> Self {
        Self {
            raw_text: None,
            error: Some(error.to_string()),
            missing_schema: true,
        }
    }

    /// True when this frame decoded successfully
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Decodes one wire-format message frame against a descriptor.
pub fn decode_message(
    registry: &TypeRegistry,
    desc: &MessageDescriptor,
    data: &[u8],
) -> Result<DecodedMessage> {
    decode_message_at(registry, desc, data, 0)
}

fn decode_message_at(
    registry: &TypeRegistry,
    desc: &MessageDescriptor,
    data: &[u8],
    depth: usize,
) -> Result<DecodedMessage> {
    if depth > MAX_DECODE_DEPTH {
        return Err(Error::malformed_wire_data(
            0,
            format!("message nesting exceeds {} levels", MAX_DECODE_DEPTH),
        ));
    }

    let mut reader = WireReader::new(data);
    let mut known: HashMap<u32, Vec<DecodedValue>> = HashMap::new();
    let mut unknown: Vec<(u32, UnknownValue)> = Vec::new();

    while !reader.is_empty() {
        let tag_offset = reader.position();
        let (number, wire_type) = reader.read_tag()?;

        if matches!(wire_type, WireType::StartGroup | WireType::EndGroup) {
            return Err(Error::unsupported_wire_type(wire_type as u8, tag_offset));
        }

        match desc.field_by_number(number) {
            Some(field) => match decode_field_value(registry, field, wire_type, &mut reader, depth)? {
                FieldValue::One(value) => known.entry(number).or_default().push(value),
                FieldValue::Packed(values) => known.entry(number).or_default().extend(values),
                FieldValue::Unresolved(value) => unknown.push((number, value)),
            },
            None => {
                trace!(
                    "field {} not declared by {}, preserving raw payload",
                    number,
                    desc.full_name()
                );
                unknown.push((number, read_unknown_value(&mut reader, wire_type)?));
            }
        }
    }

    Ok(assemble(registry, desc, known, unknown))
}

enum FieldValue {
    One(DecodedValue),
    Packed(Vec<DecodedValue>),
    Unresolved(UnknownValue),
}

fn decode_field_value(
    registry: &TypeRegistry,
    field: &FieldDescriptor,
    wire_type: WireType,
    reader: &mut WireReader<'_>,
    depth: usize,
) -> Result<FieldValue> {
    if wire_type == expected_wire_type(&field.kind) {
        return Ok(FieldValue::One(decode_single(
            registry,
            &field.kind,
            reader,
            depth,
        )?));
    }

    // Packed runs are accepted for any packable scalar, whether or not the
    // descriptor marks the field packed.
    if wire_type == WireType::Len && field.kind.is_packable() {
        let run = reader.read_len_prefixed()?;
        let mut sub = WireReader::new(run);
        let mut values = Vec::new();
        while !sub.is_empty() {
            values.push(decode_single(registry, &field.kind, &mut sub, depth)?);
        }
        return Ok(FieldValue::Packed(values));
    }

    // Declared kind and observed wire type disagree: preserve, never fail.
    trace!(
        "wire type {:?} does not match declared kind of field '{}', preserving",
        wire_type,
        field.name
    );
    Ok(FieldValue::Unresolved(read_unknown_value(reader, wire_type)?))
}

fn expected_wire_type(kind: &FieldKind) -> WireType {
    match kind {
        FieldKind::Int32
        | FieldKind::Int64
        | FieldKind::Uint32
        | FieldKind::Uint64
        | FieldKind::Sint32
        | FieldKind::Sint64
        | FieldKind::Bool
        | FieldKind::Enum(_) => WireType::Varint,
        FieldKind::Fixed64 | FieldKind::Sfixed64 | FieldKind::Double => WireType::I64,
        FieldKind::Fixed32 | FieldKind::Sfixed32 | FieldKind::Float => WireType::I32,
        FieldKind::String | FieldKind::Bytes | FieldKind::Message(_) => WireType::Len,
    }
}

fn decode_single(
    registry: &TypeRegistry,
    kind: &FieldKind,
    reader: &mut WireReader<'_>,
    depth: usize,
) -> Result<DecodedValue> {
    let value = match kind {
        FieldKind::Double => DecodedValue::Double(f64::from_bits(reader.read_fixed64()?)),
        FieldKind::Float => DecodedValue::Float(f32::from_bits(reader.read_fixed32()?)),
        FieldKind::Int32 => DecodedValue::Int32(reader.read_varint()? as i64 as i32),
        FieldKind::Int64 => DecodedValue::Int64(reader.read_varint()? as i64),
        FieldKind::Uint32 => DecodedValue::UInt32(reader.read_varint()? as u32),
        FieldKind::Uint64 => DecodedValue::UInt64(reader.read_varint()?),
        FieldKind::Sint32 => DecodedValue::Int32(decode_zigzag32(reader.read_varint()?)),
        FieldKind::Sint64 => DecodedValue::Int64(decode_zigzag64(reader.read_varint()?)),
        FieldKind::Fixed32 => DecodedValue::UInt32(reader.read_fixed32()?),
        FieldKind::Fixed64 => DecodedValue::UInt64(reader.read_fixed64()?),
        FieldKind::Sfixed32 => DecodedValue::Int32(reader.read_fixed32()? as i32),
        FieldKind::Sfixed64 => DecodedValue::Int64(reader.read_fixed64()? as i64),
        FieldKind::Bool => DecodedValue::Bool(reader.read_varint()? != 0),
        FieldKind::String => {
            let bytes = reader.read_len_prefixed()?;
            DecodedValue::String(String::from_utf8_lossy(bytes).into_owned())
        }
        FieldKind::Bytes => DecodedValue::Bytes(Bytes::copy_from_slice(reader.read_len_prefixed()?)),
        FieldKind::Enum(name) => {
            let number = reader.read_varint()? as i64 as i32;
            let symbol = registry
                .lookup_enum(name)
                .and_then(|e| e.name_of(number))
                .map(str::to_string);
            DecodedValue::Enum {
                number,
                name: symbol,
            }
        }
        FieldKind::Message(name) => {
            let payload = reader.read_len_prefixed()?;
            match registry.lookup_message(name) {
                Some(nested) => DecodedValue::Message(decode_message_at(
                    registry,
                    nested,
                    payload,
                    depth + 1,
                )?),
                None => {
                    trace!("message type '{}' unresolved, preserving raw payload", name);
                    DecodedValue::Unknown(UnknownValue::Bytes(Bytes::copy_from_slice(payload)))
                }
            }
        }
    };
    Ok(value)
}

fn read_unknown_value(reader: &mut WireReader<'_>, wire_type: WireType) -> Result<UnknownValue> {
    match wire_type {
        WireType::Varint => Ok(UnknownValue::Varint(reader.read_varint()?)),
        WireType::I64 => Ok(UnknownValue::Fixed64(reader.read_fixed64()?)),
        WireType::I32 => Ok(UnknownValue::Fixed32(reader.read_fixed32()?)),
        WireType::Len => Ok(UnknownValue::Bytes(Bytes::copy_from_slice(
            reader.read_len_prefixed()?,
        ))),
        WireType::StartGroup | WireType::EndGroup => Err(Error::unsupported_wire_type(
            wire_type as u8,
            reader.position(),
        )),
    }
}

/// Assembles buckets into declaration order, unknown fields trailing.
fn assemble(
    registry: &TypeRegistry,
    desc: &MessageDescriptor,
    mut known: HashMap<u32, Vec<DecodedValue>>,
    unknown: Vec<(u32, UnknownValue)>,
) -> DecodedMessage {
    let mut fields = Vec::new();

    for field in desc.fields() {
        let Some(mut values) = known.remove(&field.number) else {
            continue;
        };
        let value = if let Some(entry) = map_entry_descriptor(registry, field) {
            DecodedValue::Map(
                values
                    .into_iter()
                    .filter_map(|v| entry_to_pair(v, entry))
                    .collect(),
            )
        } else if field.cardinality == Cardinality::Repeated {
            DecodedValue::Repeated(values)
        } else {
            // Last occurrence wins for singular fields.
            values.pop().expect("bucket is non-empty")
        };
        fields.push(DecodedField {
            number: field.number,
            name: Some(field.json_name.clone()),
            value,
        });
    }

    let mut unknown_order: Vec<u32> = Vec::new();
    let mut unknown_buckets: HashMap<u32, Vec<DecodedValue>> = HashMap::new();
    for (number, value) in unknown {
        if !unknown_buckets.contains_key(&number) {
            unknown_order.push(number);
        }
        unknown_buckets
            .entry(number)
            .or_default()
            .push(DecodedValue::Unknown(value));
    }
    for number in unknown_order {
        let mut values = unknown_buckets.remove(&number).expect("bucket was recorded");
        let value = if values.len() == 1 {
            values.pop().expect("single value")
        } else {
            DecodedValue::Repeated(values)
        };
        fields.push(DecodedField {
            number,
            name: None,
            value,
        });
    }

    DecodedMessage {
        type_name: desc.full_name().to_string(),
        fields,
    }
}

fn map_entry_descriptor<'r>(
    registry: &'r TypeRegistry,
    field: &FieldDescriptor,
) -> Option<&'r MessageDescriptor> {
    match &field.kind {
        FieldKind::Message(name) => registry.lookup_message(name).filter(|d| d.is_map_entry()),
        _ => None,
    }
}

fn entry_to_pair(
    value: DecodedValue,
    entry: &MessageDescriptor,
) -> Option<(DecodedValue, DecodedValue)> {
    let DecodedValue::Message(mut message) = value else {
        return None;
    };
    let mut key = None;
    let mut val = None;
    for field in message.fields.drain(..) {
        match field.number {
            1 => key = Some(field.value),
            2 => val = Some(field.value),
            _ => {}
        }
    }
    // Entries may omit a key or value on the wire; fall back to defaults.
    Some((
        key.unwrap_or_else(|| default_for(entry, 1)),
        val.unwrap_or_else(|| default_for(entry, 2)),
    ))
}

fn default_for(entry: &MessageDescriptor, number: u32) -> DecodedValue {
    entry
        .field_by_number(number)
        .map(|f| default_value(&f.kind))
        .unwrap_or(DecodedValue::Unknown(UnknownValue::Varint(0)))
}

fn default_value(kind: &FieldKind) -> DecodedValue {
    match kind {
        FieldKind::Bool => DecodedValue::Bool(false),
        FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => DecodedValue::Int32(0),
        FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => DecodedValue::Int64(0),
        FieldKind::Uint32 | FieldKind::Fixed32 => DecodedValue::UInt32(0),
        FieldKind::Uint64 | FieldKind::Fixed64 => DecodedValue::UInt64(0),
        FieldKind::Float => DecodedValue::Float(0.0),
        FieldKind::Double => DecodedValue::Double(0.0),
        FieldKind::String => DecodedValue::String(String::new()),
        FieldKind::Bytes => DecodedValue::Bytes(Bytes::new()),
        FieldKind::Enum(_) => DecodedValue::Enum {
            number: 0,
            name: None,
        },
        FieldKind::Message(name) => DecodedValue::Message(DecodedMessage {
            type_name: name.clone(),
            fields: Vec::new(),
        }),
    }
}

/// Decodes a payload buffer against a registered type and renders each frame.
///
/// Always returns one [`DecodedContent`] per frame; per-frame errors never
/// abort sibling frames. Decoding an unregistered type yields a single
/// missing-schema error content.
pub fn decode_payload(
    registry: &TypeRegistry,
    type_name: &str,
    data: &[u8],
    mode: PayloadMode,
) -> Vec<DecodedContent> {
    let Some(desc) = registry.lookup_message(type_name) else {
        return vec![DecodedContent::missing_schema(&Error::unresolved_type(
            type_name,
        ))];
    };

    match mode {
        PayloadMode::Single => vec![decode_frame(registry, desc, data)],
        PayloadMode::Delimited => decode_delimited(registry, desc, data),
        PayloadMode::Auto => match try_frame(registry, desc, data) {
            Ok(content) => vec![content],
            Err(single_error) => {
                let frames = decode_delimited(registry, desc, data);
                match frames.first() {
                    Some(first) if first.is_ok() => frames,
                    _ => vec![DecodedContent::from_error(&single_error)],
                }
            }
        },
    }
}

fn try_frame(
    registry: &TypeRegistry,
    desc: &MessageDescriptor,
    data: &[u8],
) -> Result<DecodedContent> {
    let message = decode_message(registry, desc, data)?;
    Ok(DecodedContent::text(Renderer::new(registry).render(&message)))
}

fn decode_frame(registry: &TypeRegistry, desc: &MessageDescriptor, data: &[u8]) -> DecodedContent {
    match try_frame(registry, desc, data) {
        Ok(content) => content,
        Err(error) => DecodedContent::from_error(&error),
    }
}

fn decode_delimited(
    registry: &TypeRegistry,
    desc: &MessageDescriptor,
    data: &[u8],
) -> Vec<DecodedContent> {
    let mut results = Vec::new();
    let mut reader = WireReader::new(data);
    while !reader.is_empty() {
        match reader.read_len_prefixed() {
            Ok(frame) => results.push(decode_frame(registry, desc, frame)),
            Err(error) => {
                // The stream itself is broken past this point; report and stop.
                results.push(DecodedContent::from_error(&error));
                break;
            }
        }
    }
    results
}

/// Determines whether a buffer looks like one bare message or a delimited
/// stream of them.
pub fn detect_framing(registry: &TypeRegistry, type_name: &str, data: &[u8]) -> FramingStrategy {
    let Some(desc) = registry.lookup_message(type_name) else {
        return FramingStrategy::Single;
    };
    if decode_message(registry, desc, data).is_ok() {
        return FramingStrategy::Single;
    }
    let mut reader = WireReader::new(data);
    match reader.read_len_prefixed() {
        Ok(frame) if decode_message(registry, desc, frame).is_ok() => FramingStrategy::MultiFramed,
        _ => FramingStrategy::Single,
    }
}
