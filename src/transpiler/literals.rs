//! Typed literal spellings and backend type names.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::ast::{ParamType, PrimitiveKind, Value};
use crate::error::{CompileError, CompileResult};

/// Write a constant as a literal the backend parses back to the same type.
pub(crate) fn write_literal(value: &Value, sql: &mut String) {
    match value {
        Value::Binary(bytes) => {
            sql.push_str("decode('");
            sql.push_str(&STANDARD.encode(bytes));
            sql.push_str("', 'base64')");
        }
        Value::Boolean(b) => sql.push_str(if *b { "TRUE" } else { "FALSE" }),
        Value::Byte(n) => {
            sql.push_str(&n.to_string());
            sql.push_str("::int2");
        }
        Value::SByte(n) => write_signed(i64::from(*n), "int2", sql),
        Value::Int16(n) => write_signed(i64::from(*n), "int2", sql),
        Value::Int32(n) => sql.push_str(&n.to_string()),
        Value::Int64(n) => write_signed(*n, "int8", sql),
        Value::Decimal(d) => {
            if d.is_sign_negative() && !d.is_zero() {
                sql.push_str(&format!("({})::numeric", d));
            } else {
                sql.push_str(&format!("{}::numeric", d));
            }
        }
        Value::Double(f) => write_float(*f, f.is_sign_negative(), "float8", sql),
        Value::Single(f) => write_float(f64::from(*f), f.is_sign_negative(), "float4", sql),
        Value::DateTime(ts) => {
            sql.push_str("TIMESTAMP '");
            sql.push_str(&ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string());
            sql.push('\'');
        }
        Value::DateTimeOffset(ts) => {
            sql.push_str("TIMESTAMP WITH TIME ZONE '");
            sql.push_str(&ts.format("%Y-%m-%dT%H:%M:%S%.6f%:z").to_string());
            sql.push('\'');
        }
        Value::Guid(uuid) => {
            sql.push('\'');
            sql.push_str(&uuid.hyphenated().to_string());
            sql.push_str("'::uuid");
        }
        Value::String(s) => {
            sql.push_str("E'");
            sql.push_str(&s.replace('\\', "\\\\").replace('\'', "\\'"));
            sql.push('\'');
        }
        Value::Time(micros) => {
            sql.push_str("INTERVAL '");
            sql.push_str(&format_interval(*micros));
            sql.push('\'');
        }
    }
}

fn write_signed(n: i64, ty: &str, sql: &mut String) {
    if n < 0 {
        sql.push_str(&format!("({})::{}", n, ty));
    } else {
        sql.push_str(&format!("{}::{}", n, ty));
    }
}

fn write_float(f: f64, negative: bool, ty: &str, sql: &mut String) {
    if f.is_nan() {
        sql.push_str(&format!("'NaN'::{}", ty));
    } else if f == f64::INFINITY {
        sql.push_str(&format!("'Infinity'::{}", ty));
    } else if f == f64::NEG_INFINITY {
        sql.push_str(&format!("'-Infinity'::{}", ty));
    } else if negative && f != 0.0 {
        sql.push_str(&format!("({})::{}", f, ty));
    } else {
        sql.push_str(&format!("{}::{}", f, ty));
    }
}

/// `[-]HH:MM:SS[.ffffff]`; hours are not folded into days.
fn format_interval(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    let fraction = abs % 1_000_000;
    let seconds = abs / 1_000_000;
    let mut out = format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    );
    if fraction != 0 {
        out.push_str(&format!(".{:06}", fraction));
    }
    out
}

/// Backend type name for a primitive kind.
pub(crate) fn db_type(kind: PrimitiveKind) -> CompileResult<&'static str> {
    Ok(match kind {
        PrimitiveKind::Boolean => "bool",
        PrimitiveKind::Byte | PrimitiveKind::SByte | PrimitiveKind::Int16 => "int2",
        PrimitiveKind::Int32 => "int4",
        PrimitiveKind::Int64 => "int8",
        PrimitiveKind::String => "text",
        PrimitiveKind::Decimal => "numeric",
        PrimitiveKind::Single => "float4",
        PrimitiveKind::Double => "float8",
        PrimitiveKind::DateTime => "timestamp",
        PrimitiveKind::DateTimeOffset => "timestamptz",
        PrimitiveKind::Time => "interval",
        PrimitiveKind::Binary => "bytea",
        PrimitiveKind::Guid => "uuid",
        PrimitiveKind::Geography | PrimitiveKind::Geometry | PrimitiveKind::HierarchyId => {
            return Err(CompileError::UnsupportedType(kind.to_string()));
        }
    })
}

/// Type tag of a bound parameter; vectors are arrays of their element type.
pub(crate) fn param_db_type(ty: ParamType) -> CompileResult<String> {
    Ok(match ty {
        ParamType::Scalar(kind) => db_type(kind)?.to_string(),
        ParamType::Vector(kind) => format!("{}[]", db_type(kind)?),
    })
}

/// Placeholder written into a non-nullable column that has no source.
pub(crate) fn default_literal(kind: PrimitiveKind) -> CompileResult<&'static str> {
    Ok(match kind {
        PrimitiveKind::Byte
        | PrimitiveKind::Decimal
        | PrimitiveKind::Double
        | PrimitiveKind::Single
        | PrimitiveKind::SByte
        | PrimitiveKind::Int16
        | PrimitiveKind::Int32
        | PrimitiveKind::Int64 => "0",
        PrimitiveKind::Boolean => "false",
        PrimitiveKind::Binary => "E''",
        PrimitiveKind::DateTime | PrimitiveKind::DateTimeOffset => "'00010101'",
        PrimitiveKind::Guid => "'00000000-0000-0000-0000-000000000000'",
        PrimitiveKind::String => "''",
        PrimitiveKind::Time => "'0'",
        PrimitiveKind::Geography | PrimitiveKind::Geometry | PrimitiveKind::HierarchyId => {
            return Err(CompileError::UnsupportedType(kind.to_string()));
        }
    })
}
