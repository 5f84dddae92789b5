//! Universal Binary JSON encoding of a JSON value tree.
//!
//! Integers take the smallest marker that holds them. Floats that survive a
//! round trip through `f32` are written as `d` (float32), all others as `D`.
//! Multi-byte numbers are big-endian.

use serde_json::{Map, Number, Value};

pub(super) fn to_vec(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.push(b'Z'),
        Value::Bool(true) => out.push(b'T'),
        Value::Bool(false) => out.push(b'F'),
        Value::Number(number) => write_number(out, number),
        Value::String(text) => {
            out.push(b'S');
            write_string(out, text);
        }
        Value::Array(items) => {
            out.push(b'[');
            for item in items {
                write_value(out, item);
            }
            out.push(b']');
        }
        Value::Object(map) => write_object(out, map),
    }
}

fn write_object(out: &mut Vec<u8>, map: &Map<String, Value>) {
    out.push(b'{');
    for (key, value) in map {
        // Keys omit the `S` marker.
        write_string(out, key);
        write_value(out, value);
    }
    out.push(b'}');
}

fn write_number(out: &mut Vec<u8>, number: &Number) {
    if let Some(int) = number.as_i64() {
        write_int(out, int);
    } else if let Some(uint) = number.as_u64() {
        // Above i64::MAX; UBJSON has no unsigned 64-bit marker.
        out.push(b'H');
        write_string(out, &uint.to_string());
    } else if let Some(float) = number.as_f64() {
        let narrow = float as f32;
        if f64::from(narrow) == float {
            out.push(b'd');
            out.extend_from_slice(&narrow.to_be_bytes());
        } else {
            out.push(b'D');
            out.extend_from_slice(&float.to_be_bytes());
        }
    }
}

fn write_int(out: &mut Vec<u8>, value: i64) {
    if let Ok(value) = i8::try_from(value) {
        out.push(b'i');
        out.extend_from_slice(&value.to_be_bytes());
    } else if let Ok(value) = u8::try_from(value) {
        out.push(b'U');
        out.push(value);
    } else if let Ok(value) = i16::try_from(value) {
        out.push(b'I');
        out.extend_from_slice(&value.to_be_bytes());
    } else if let Ok(value) = i32::try_from(value) {
        out.push(b'l');
        out.extend_from_slice(&value.to_be_bytes());
    } else {
        out.push(b'L');
        out.extend_from_slice(&value.to_be_bytes());
    }
}

/// Length-prefixed UTF-8 payload, without a type marker.
fn write_string(out: &mut Vec<u8>, text: &str) {
    write_int(out, text.len() as i64);
    out.extend_from_slice(text.as_bytes());
}
