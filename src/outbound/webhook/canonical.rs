//! Deterministic JSON rendering used as the signed representation of a payload.
//!
//! Object keys are sorted at every depth, items are separated by `", "`, keys
//! from values by `": "`, and everything outside printable ASCII is written as
//! a `\uXXXX` escape. The output matches `json.dumps(obj, sort_keys=True)`, so
//! subscribers on the most common verifier stacks can recompute the exact bytes.

use std::io;

use serde::Serialize;
use serde::ser::Error as _;
use serde_json::ser::Formatter;
use serde_json::{Map, Serializer, Value};

/// Render any serializable value in canonical form
pub fn to_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    canonicalize(&value)
}

/// Render an already-built JSON value in canonical form
pub fn canonicalize(value: &Value) -> Result<String, serde_json::Error> {
    let sorted = sort_keys(value);

    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, AsciiSpacedFormatter);
    sorted.serialize(&mut serializer)?;

    String::from_utf8(buf).map_err(serde_json::Error::custom)
}

/// Recursively rebuild objects in key order, independent of how `Map` is backed.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            // Byte order of UTF-8 keys equals code point order.
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// serde_json formatter with `", "` / `": "` separators and ASCII-only strings.
///
/// Quotes, backslashes and control characters are escaped by serde_json
/// before fragments reach this formatter.
struct AsciiSpacedFormatter;

impl Formatter for AsciiSpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if matches!(ch, ' '..='~') {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}
