//! Rendering decoded messages as human-readable text.
//!
//! The output is a compact JSON-like form: field names as declared (in
//! lower-camel convention), nested messages as braces, repeated fields as
//! ordered lists, maps as objects keyed by the key's textual form, bytes as
//! base64, enums by symbolic name when resolvable. Field order follows the
//! descriptor's declaration order, not the order fields appeared on the
//! wire.
//!
//! ## Well-known types
//!
//! - `google.protobuf.Any` is expanded: the type URL is resolved against
//!   the registry, the packed bytes are re-decoded, and the result is
//!   emitted as an `@type`-tagged object. Unresolvable payloads fall back
//!   to the raw type URL plus base64 bytes.
//! - `google.protobuf.Timestamp` renders as an RFC3339 string with
//!   nanosecond precision.
//! - `google.protobuf.Duration` renders as a canonical seconds string.

use std::fmt::Write as FmtWrite;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat};

use crate::decode::{decode_message, DecodedField, DecodedMessage, DecodedValue, UnknownValue};
use crate::registry::TypeRegistry;

/// Fully-qualified name of the Any wrapper
pub const ANY: &str = "google.protobuf.Any";
/// Fully-qualified name of the Timestamp wrapper
pub const TIMESTAMP: &str = "google.protobuf.Timestamp";
/// Fully-qualified name of the Duration wrapper
pub const DURATION: &str = "google.protobuf.Duration";

/// Renders decoded messages against the registry they were decoded with.
///
/// The registry is only read; rendering an `Any` payload re-enters the
/// decoder with the embedded type.
#[derive(Debug)]
pub struct Renderer<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> Renderer<'a> {
    /// Creates a renderer over a registry.
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self { registry }
    }

    /// Renders a decoded message to its textual form.
    pub fn render(&self, message: &DecodedMessage) -> String {
        let mut out = String::new();
        self.write_message(&mut out, message)
            .expect("String write cannot fail");
        out
    }

    fn write_message(&self, out: &mut String, message: &DecodedMessage) -> std::fmt::Result {
        if let Some(token) = self.wrapper_token(message) {
            return out.write_str(&token);
        }
        if message.type_name == ANY {
            return self.write_any(out, message);
        }
        self.write_fields(out, message)
    }

    /// Scalar-like rendering for wrapper types, quoted and escaped.
    ///
    /// Returns None when the message is not a wrapper or its fields do not
    /// have the expected shape, in which case it renders as a plain object.
    fn wrapper_token(&self, message: &DecodedMessage) -> Option<String> {
        match message.type_name.as_str() {
            TIMESTAMP => {
                let seconds = scalar_i64(message, 1)?;
                let nanos = scalar_i64(message, 2)?;
                let nanos = u32::try_from(nanos).ok()?;
                let rendered = DateTime::from_timestamp(seconds, nanos)?
                    .to_rfc3339_opts(SecondsFormat::Nanos, true);
                Some(format!("\"{}\"", rendered))
            }
            DURATION => {
                let seconds = scalar_i64(message, 1)?;
                let nanos = scalar_i64(message, 2)?;
                Some(format!("\"{}\"", format_duration(seconds, nanos)))
            }
            _ => None,
        }
    }

    fn write_any(&self, out: &mut String, message: &DecodedMessage) -> std::fmt::Result {
        let Some((type_url, payload)) = any_parts(message) else {
            return self.write_fields(out, message);
        };

        let type_name = type_url.rsplit('/').next().unwrap_or(type_url.as_str());
        if let Some(desc) = self.registry.lookup_message(type_name) {
            if let Ok(embedded) = decode_message(self.registry, desc, &payload) {
                out.write_str("{\"@type\":\"")?;
                write_escaped(out, &type_url)?;
                out.write_char('"')?;
                if let Some(token) = self.wrapper_token(&embedded) {
                    out.write_str(",\"value\":")?;
                    out.write_str(&token)?;
                } else {
                    for field in &embedded.fields {
                        out.write_char(',')?;
                        self.write_field(out, field)?;
                    }
                }
                return out.write_char('}');
            }
        }

        // Type URL unresolvable or payload corrupt: keep the raw pair.
        out.write_str("{\"@type\":\"")?;
        write_escaped(out, &type_url)?;
        out.write_str("\",\"value\":\"")?;
        out.write_str(&BASE64.encode(&payload))?;
        out.write_str("\"}")
    }

    fn write_fields(&self, out: &mut String, message: &DecodedMessage) -> std::fmt::Result {
        out.write_char('{')?;
        for (i, field) in message.fields.iter().enumerate() {
            if i > 0 {
                out.write_char(',')?;
            }
            self.write_field(out, field)?;
        }
        out.write_char('}')
    }

    fn write_field(&self, out: &mut String, field: &DecodedField) -> std::fmt::Result {
        out.write_char('"')?;
        match &field.name {
            Some(name) => write_escaped(out, name)?,
            None => write!(out, "{}", field.number)?,
        }
        out.write_str("\":")?;
        self.write_value(out, &field.value)
    }

    fn write_value(&self, out: &mut String, value: &DecodedValue) -> std::fmt::Result {
        match value {
            DecodedValue::Bool(v) => write!(out, "{}", v),
            DecodedValue::Int32(v) => write!(out, "{}", v),
            DecodedValue::Int64(v) => write!(out, "{}", v),
            DecodedValue::UInt32(v) => write!(out, "{}", v),
            DecodedValue::UInt64(v) => write!(out, "{}", v),
            DecodedValue::Float(v) => write_float(out, f64::from(*v)),
            DecodedValue::Double(v) => write_float(out, *v),
            DecodedValue::String(v) => {
                out.write_char('"')?;
                write_escaped(out, v)?;
                out.write_char('"')
            }
            DecodedValue::Bytes(v) => {
                out.write_char('"')?;
                out.write_str(&BASE64.encode(v))?;
                out.write_char('"')
            }
            DecodedValue::Enum { number, name } => match name {
                Some(name) => {
                    out.write_char('"')?;
                    write_escaped(out, name)?;
                    out.write_char('"')
                }
                None => write!(out, "{}", number),
            },
            DecodedValue::Message(message) => self.write_message(out, message),
            DecodedValue::Repeated(values) => {
                out.write_char('[')?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        out.write_char(',')?;
                    }
                    self.write_value(out, v)?;
                }
                out.write_char(']')
            }
            DecodedValue::Map(entries) => {
                out.write_char('{')?;
                for (i, (key, val)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.write_char(',')?;
                    }
                    self.write_map_key(out, key)?;
                    out.write_char(':')?;
                    self.write_value(out, val)?;
                }
                out.write_char('}')
            }
            DecodedValue::Unknown(unknown) => self.write_unknown(out, unknown),
        }
    }

    // Object keys are always quoted, whatever the key's scalar type.
    fn write_map_key(&self, out: &mut String, key: &DecodedValue) -> std::fmt::Result {
        out.write_char('"')?;
        match key {
            DecodedValue::String(v) => write_escaped(out, v)?,
            DecodedValue::Bool(v) => write!(out, "{}", v)?,
            DecodedValue::Int32(v) => write!(out, "{}", v)?,
            DecodedValue::Int64(v) => write!(out, "{}", v)?,
            DecodedValue::UInt32(v) => write!(out, "{}", v)?,
            DecodedValue::UInt64(v) => write!(out, "{}", v)?,
            other => {
                // Keys are scalar by construction; anything else degrades
                // to its value form, quoted.
                let mut buf = String::new();
                self.write_value(&mut buf, other)?;
                write_escaped(out, &buf)?;
            }
        }
        out.write_char('"')
    }

    fn write_unknown(&self, out: &mut String, unknown: &UnknownValue) -> std::fmt::Result {
        match unknown {
            UnknownValue::Varint(v) => write!(out, "{}", v),
            UnknownValue::Fixed64(v) => write!(out, "{}", v),
            UnknownValue::Fixed32(v) => write!(out, "{}", v),
            UnknownValue::Bytes(v) => {
                out.write_char('"')?;
                out.write_str(&BASE64.encode(v))?;
                out.write_char('"')
            }
        }
    }
}

fn any_parts(message: &DecodedMessage) -> Option<(String, Bytes)> {
    let type_url = match message.field(1).map(|f| &f.value) {
        Some(DecodedValue::String(url)) if !url.is_empty() => url.clone(),
        _ => return None,
    };
    let payload = match message.field(2).map(|f| &f.value) {
        Some(DecodedValue::Bytes(bytes)) => bytes.clone(),
        None => Bytes::new(),
        _ => return None,
    };
    Some((type_url, payload))
}

fn scalar_i64(message: &DecodedMessage, number: u32) -> Option<i64> {
    match message.field(number).map(|f| &f.value) {
        Some(DecodedValue::Int64(v)) => Some(*v),
        Some(DecodedValue::Int32(v)) => Some(i64::from(*v)),
        Some(DecodedValue::UInt32(v)) => Some(i64::from(*v)),
        Some(DecodedValue::UInt64(v)) => i64::try_from(*v).ok(),
        None => Some(0),
        _ => None,
    }
}

/// Canonical duration text: seconds with a 3/6/9-digit fraction.
fn format_duration(seconds: i64, nanos: i64) -> String {
    let sign = if seconds < 0 || nanos < 0 { "-" } else { "" };
    let seconds = seconds.unsigned_abs();
    let nanos = nanos.unsigned_abs();
    let frac = if nanos == 0 {
        String::new()
    } else if nanos % 1_000_000 == 0 {
        format!(".{:03}", nanos / 1_000_000)
    } else if nanos % 1_000 == 0 {
        format!(".{:06}", nanos / 1_000)
    } else {
        format!(".{:09}", nanos)
    };
    format!("{}{}{}s", sign, seconds, frac)
}

fn write_float(out: &mut String, value: f64) -> std::fmt::Result {
    if value.is_nan() {
        out.write_str("\"NaN\"")
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            out.write_str("\"Infinity\"")
        } else {
            out.write_str("\"-Infinity\"")
        }
    } else {
        write!(out, "{}", value)
    }
}

/// Escape a string for the JSON-like output
fn write_escaped(out: &mut String, s: &str) -> std::fmt::Result {
    for c in s.chars() {
        match c {
            '\\' => out.write_str("\\\\")?,
            '"' => out.write_str("\\\"")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            _ if c.is_control() => write!(out, "\\u{:04x}", c as u32)?,
            _ => out.write_char(c)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::PayloadMode;
    use crate::descriptor::{
        Cardinality, FieldDescriptor, FieldKind, FileRecord, MessageDescriptor, ParsedFile,
    };
    use pretty_assertions::assert_eq;

    fn field_desc(name: &str, number: u32, kind: FieldKind) -> FieldDescriptor {
        FieldDescriptor {
            number,
            name: name.to_string(),
            json_name: crate::descriptor::to_lower_camel_case(name),
            kind,
            cardinality: Cardinality::Optional,
            packed: false,
            oneof_index: None,
        }
    }

    fn install(registry: &mut TypeRegistry, file: &str, messages: Vec<MessageDescriptor>) {
        let record = FileRecord {
            name: file.to_string(),
            package: String::new(),
            messages: messages.iter().map(|m| m.full_name().to_string()).collect(),
            enums: Vec::new(),
            imports: Vec::new(),
        };
        registry.install(ParsedFile {
            record,
            messages,
            enums: Vec::new(),
        });
    }

    fn well_known_registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        install(
            &mut registry,
            "google/protobuf/any.proto",
            vec![MessageDescriptor::new(
                ANY.to_string(),
                vec![
                    field_desc("type_url", 1, FieldKind::String),
                    field_desc("value", 2, FieldKind::Bytes),
                ],
                Vec::new(),
                false,
            )],
        );
        install(
            &mut registry,
            "google/protobuf/timestamp.proto",
            vec![MessageDescriptor::new(
                TIMESTAMP.to_string(),
                vec![
                    field_desc("seconds", 1, FieldKind::Int64),
                    field_desc("nanos", 2, FieldKind::Int32),
                ],
                Vec::new(),
                false,
            )],
        );
        registry
    }

    fn varint(mut value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
        out
    }

    fn varint_field(field: u32, value: u64) -> Vec<u8> {
        let mut out = varint(((field << 3) as u64) | 0);
        out.extend(varint(value));
        out
    }

    fn len_field(field: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = varint((((field << 3) | 2) as u32) as u64);
        out.extend(varint(payload.len() as u64));
        out.extend_from_slice(payload);
        out
    }

    fn message(type_name: &str, fields: Vec<DecodedField>) -> DecodedMessage {
        DecodedMessage {
            type_name: type_name.to_string(),
            fields,
        }
    }

    fn named(number: u32, name: &str, value: DecodedValue) -> DecodedField {
        DecodedField {
            number,
            name: Some(name.to_string()),
            value,
        }
    }

    #[test]
    fn test_render_scalars_and_order() {
        let registry = TypeRegistry::new();
        let msg = message(
            "Book",
            vec![
                named(1, "title", DecodedValue::String("Really Interesting Book".into())),
                named(2, "pageCount", DecodedValue::Int32(320)),
                named(3, "inStock", DecodedValue::Bool(true)),
            ],
        );
        assert_eq!(
            Renderer::new(&registry).render(&msg),
            r#"{"title":"Really Interesting Book","pageCount":320,"inStock":true}"#
        );
    }

    #[test]
    fn test_render_bytes_as_base64_and_enum_by_name() {
        let registry = TypeRegistry::new();
        let msg = message(
            "M",
            vec![
                named(1, "data", DecodedValue::Bytes(Bytes::from_static(b"hello"))),
                named(
                    2,
                    "status",
                    DecodedValue::Enum {
                        number: 1,
                        name: Some("ACTIVE".into()),
                    },
                ),
                named(
                    3,
                    "other",
                    DecodedValue::Enum {
                        number: 9,
                        name: None,
                    },
                ),
            ],
        );
        assert_eq!(
            Renderer::new(&registry).render(&msg),
            r#"{"data":"aGVsbG8=","status":"ACTIVE","other":9}"#
        );
    }

    #[test]
    fn test_render_repeated_map_and_unknown() {
        let registry = TypeRegistry::new();
        let msg = message(
            "M",
            vec![
                named(
                    1,
                    "ids",
                    DecodedValue::Repeated(vec![DecodedValue::Int32(1), DecodedValue::Int32(2)]),
                ),
                named(
                    2,
                    "labels",
                    DecodedValue::Map(vec![
                        (DecodedValue::String("a".into()), DecodedValue::Int32(1)),
                        (DecodedValue::Int64(7), DecodedValue::Bool(false)),
                    ]),
                ),
                DecodedField {
                    number: 99,
                    name: None,
                    value: DecodedValue::Unknown(UnknownValue::Varint(5)),
                },
            ],
        );
        assert_eq!(
            Renderer::new(&registry).render(&msg),
            r#"{"ids":[1,2],"labels":{"a":1,"7":false},"99":5}"#
        );
    }

    #[test]
    fn test_render_timestamp_rfc3339() {
        let registry = TypeRegistry::new();
        let msg = message(
            TIMESTAMP,
            vec![
                named(1, "seconds", DecodedValue::Int64(1655951934)),
                named(2, "nanos", DecodedValue::Int32(814669013)),
            ],
        );
        assert_eq!(
            Renderer::new(&registry).render(&msg),
            "\"2022-06-23T02:38:54.814669013Z\""
        );
    }

    #[test]
    fn test_render_duration() {
        let registry = TypeRegistry::new();
        let msg = message(
            DURATION,
            vec![
                named(1, "seconds", DecodedValue::Int64(3)),
                named(2, "nanos", DecodedValue::Int32(500_000_000)),
            ],
        );
        assert_eq!(Renderer::new(&registry).render(&msg), "\"3.500s\"");
    }

    #[test]
    fn test_format_duration_fractions() {
        assert_eq!(format_duration(1, 0), "1s");
        assert_eq!(format_duration(0, 1), "0.000000001s");
        assert_eq!(format_duration(-1, 0), "-1s");
        assert_eq!(format_duration(2, 250_000), "2.000250s");
    }

    #[test]
    fn test_any_expands_embedded_timestamp() {
        let registry = well_known_registry();

        // Wire bytes of a Timestamp{seconds, nanos}
        let mut ts = varint_field(1, 1655951934);
        ts.extend(varint_field(2, 814669013));

        let msg = message(
            ANY,
            vec![
                named(
                    1,
                    "typeUrl",
                    DecodedValue::String("type.googleapis.com/google.protobuf.Timestamp".into()),
                ),
                named(2, "value", DecodedValue::Bytes(Bytes::from(ts))),
            ],
        );
        assert_eq!(
            Renderer::new(&registry).render(&msg),
            r#"{"@type":"type.googleapis.com/google.protobuf.Timestamp","value":"2022-06-23T02:38:54.814669013Z"}"#
        );
    }

    #[test]
    fn test_any_flattens_plain_message() {
        let mut registry = well_known_registry();
        install(
            &mut registry,
            "book.proto",
            vec![MessageDescriptor::new(
                "com.example.BookInfo".to_string(),
                vec![field_desc("title", 1, FieldKind::String)],
                Vec::new(),
                false,
            )],
        );

        let payload = len_field(1, b"Flat");
        let msg = message(
            ANY,
            vec![
                named(
                    1,
                    "typeUrl",
                    DecodedValue::String("type.googleapis.com/com.example.BookInfo".into()),
                ),
                named(2, "value", DecodedValue::Bytes(Bytes::from(payload))),
            ],
        );
        assert_eq!(
            Renderer::new(&registry).render(&msg),
            r#"{"@type":"type.googleapis.com/com.example.BookInfo","title":"Flat"}"#
        );
    }

    #[test]
    fn test_any_unresolvable_falls_back_to_base64() {
        let registry = TypeRegistry::new();
        let msg = message(
            ANY,
            vec![
                named(
                    1,
                    "typeUrl",
                    DecodedValue::String("type.googleapis.com/no.Such".into()),
                ),
                named(2, "value", DecodedValue::Bytes(Bytes::from_static(b"\x08\x01"))),
            ],
        );
        assert_eq!(
            Renderer::new(&registry).render(&msg),
            r#"{"@type":"type.googleapis.com/no.Such","value":"CAE="}"#
        );
    }

    #[test]
    fn test_escaping_and_floats() {
        let registry = TypeRegistry::new();
        let msg = message(
            "M",
            vec![
                named(1, "text", DecodedValue::String("a\"b\\c\nd".into())),
                named(2, "ratio", DecodedValue::Double(0.5)),
                named(3, "bad", DecodedValue::Double(f64::NAN)),
            ],
        );
        assert_eq!(
            Renderer::new(&registry).render(&msg),
            "{\"text\":\"a\\\"b\\\\c\\nd\",\"ratio\":0.5,\"bad\":\"NaN\"}"
        );
    }

    #[test]
    fn test_end_to_end_any_timestamp_via_decoder() {
        // ClustersConfigDump-shaped: a message whose field is an Any that
        // wraps a Timestamp, decoded from raw wire bytes.
        let mut registry = well_known_registry();
        install(
            &mut registry,
            "dump.proto",
            vec![MessageDescriptor::new(
                "envoy.admin.v3.ClustersConfigDump".to_string(),
                vec![
                    field_desc("version_info", 1, FieldKind::String),
                    field_desc("cluster", 2, FieldKind::Message(ANY.to_string())),
                ],
                Vec::new(),
                false,
            )],
        );

        let mut ts = varint_field(1, 1655951934);
        ts.extend(varint_field(2, 814669013));
        let mut any = len_field(1, b"type.googleapis.com/google.protobuf.Timestamp");
        any.extend(len_field(2, &ts));
        let mut data = len_field(1, b"Proxy 3.5.0");
        data.extend(len_field(2, &any));

        let contents = crate::decode::decode_payload(
            &registry,
            "envoy.admin.v3.ClustersConfigDump",
            &data,
            PayloadMode::Auto,
        );
        assert_eq!(contents.len(), 1);
        assert_eq!(
            contents[0].raw_text.as_deref().unwrap(),
            r#"{"versionInfo":"Proxy 3.5.0","cluster":{"@type":"type.googleapis.com/google.protobuf.Timestamp","value":"2022-06-23T02:38:54.814669013Z"}}"#
        );
    }
}
