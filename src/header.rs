//! The textual header is an external collaborator (spec.md §1): the core
//! only consumes a layout parser/printer through the [`HeaderIo`] trait.
//! This module supplies that trait plus a minimal line-oriented
//! implementation sufficient to round-trip a [`Layout`] — it does not
//! attempt ASCII round-trip fidelity with any existing header dialect
//! (explicitly out of scope per spec.md's Non-goals).

use std::io::{BufRead, Write};

use crate::layout::{ArrayDef, ByteOrderKind, DataMode, FieldDef, Layout, ScalarType};

/// Parses and emits the textual header that precedes a file's binary
/// pages. `PageEngine`/`Codec` never parse header text themselves; they
/// call into an implementation of this trait.
pub trait HeaderIo {
    /// Parse a complete layout from `reader`, positioned at the start of
    /// the header.
    fn read_layout<R: BufRead>(&self, reader: &mut R) -> crate::Result<Layout>;

    /// Emit `layout`'s textual header to `writer`.
    fn write_layout<W: Write>(&self, writer: &mut W, layout: &Layout) -> crate::Result<()>;
}

/// A minimal line-oriented header reader/writer:
///
/// ```text
/// byte_order little
/// data_mode binary
/// column_major false
/// fixed_row_count false
/// fixed_row_increment 1000
/// parameter step i32
/// parameter run_id i32 fixed=7
/// column x i32
/// column y f64
/// ```
///
/// One directive per line, whitespace-separated fields, blank lines and
/// lines starting with `#` ignored. A parameter may carry a trailing
/// `fixed=<value>` token (spec.md §3's `fixed_value`, parsed via
/// [`crate::tokenizer`] rather than stored on the binary wire); the value
/// itself cannot contain whitespace in this minimal dialect. Good enough
/// to round-trip everything `Layout` tracks; not an attempt to replicate
/// any ASCII dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextHeader;

impl HeaderIo for PlainTextHeader {
    fn read_layout<R: BufRead>(&self, reader: &mut R) -> crate::Result<Layout> {
        let mut byte_order = ByteOrderKind::Unspecified;
        let mut data_mode = DataMode::Binary;
        let mut column_major = false;
        let mut fixed_row_count = false;
        let mut fixed_row_increment = 1000u32;
        let mut description = None;
        let mut contents = None;
        let mut pending_defs: Vec<(&str, FieldDef)> = Vec::new();
        let mut pending_arrays: Vec<ArrayDef> = Vec::new();

        for line in reader.lines() {
            let line = line.map_err(|e| crate::SddsError::Io(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "end" {
                break;
            }
            let mut parts = line.split_whitespace();
            let directive = parts.next().unwrap_or("");
            let rest: Vec<&str> = parts.collect();

            match directive {
                "byte_order" => {
                    byte_order = match rest.first().copied() {
                        Some("big") => ByteOrderKind::Big,
                        Some("little") => ByteOrderKind::Little,
                        _ => ByteOrderKind::Unspecified,
                    };
                }
                "data_mode" => {
                    data_mode = match rest.first().copied() {
                        Some("ascii") => DataMode::Ascii,
                        _ => DataMode::Binary,
                    };
                }
                "column_major" => column_major = rest.first() == Some(&"true"),
                "fixed_row_count" => fixed_row_count = rest.first() == Some(&"true"),
                "fixed_row_increment" => {
                    fixed_row_increment = rest
                        .first()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| crate::SddsError::Format("bad fixed_row_increment".into()))?;
                }
                "description" => description = Some(rest.join(" ")),
                "contents" => contents = Some(rest.join(" ")),
                "parameter" | "column" => {
                    let name = rest
                        .first()
                        .ok_or_else(|| crate::SddsError::Format("missing field name".into()))?;
                    let ty = rest
                        .get(1)
                        .ok_or_else(|| crate::SddsError::Format("missing field type".into()))?;
                    let scalar_type = parse_scalar_type(ty)?;
                    let mut def = FieldDef::new(*name, scalar_type);
                    if directive == "parameter" {
                        if let Some(value) = rest.get(2).and_then(|tok| tok.strip_prefix("fixed=")) {
                            def.fixed_value = Some(value.to_string());
                        }
                    }
                    pending_defs.push((directive, def));
                }
                "array" => {
                    let name = rest
                        .first()
                        .ok_or_else(|| crate::SddsError::Format("missing array name".into()))?;
                    let ty = rest
                        .get(1)
                        .ok_or_else(|| crate::SddsError::Format("missing array type".into()))?;
                    let dims: usize = rest
                        .get(2)
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| crate::SddsError::Format("missing array dimension count".into()))?;
                    pending_arrays.push(ArrayDef {
                        field: FieldDef::new(*name, parse_scalar_type(ty)?),
                        dimension_count: dims,
                    });
                }
                other => {
                    return Err(crate::SddsError::Schema(format!(
                        "unknown header directive: {other}"
                    )))
                }
            }
        }

        let mut layout = Layout::new(byte_order, data_mode);
        layout.description = description;
        layout.contents = contents;
        layout.column_major = column_major;
        layout.fixed_row_count = fixed_row_count;
        layout.fixed_row_increment = fixed_row_increment;
        for (kind, def) in pending_defs {
            match kind {
                "parameter" => layout.define_parameter(def)?,
                "column" => layout.define_column(def)?,
                _ => unreachable!(),
            }
        }
        for def in pending_arrays {
            layout.define_array(def)?;
        }
        Ok(layout)
    }

    fn write_layout<W: Write>(&self, writer: &mut W, layout: &Layout) -> crate::Result<()> {
        let io_err = |e: std::io::Error| crate::SddsError::Io(e.to_string());

        let order = match layout.declared_byte_order {
            ByteOrderKind::Big => "big",
            ByteOrderKind::Little => "little",
            ByteOrderKind::Unspecified => "unspecified",
        };
        writeln!(writer, "byte_order {order}").map_err(io_err)?;
        writeln!(
            writer,
            "data_mode {}",
            if layout.data_mode == DataMode::Ascii { "ascii" } else { "binary" }
        )
        .map_err(io_err)?;
        writeln!(writer, "column_major {}", layout.column_major).map_err(io_err)?;
        writeln!(writer, "fixed_row_count {}", layout.fixed_row_count).map_err(io_err)?;
        writeln!(writer, "fixed_row_increment {}", layout.fixed_row_increment).map_err(io_err)?;
        if let Some(d) = &layout.description {
            writeln!(writer, "description {d}").map_err(io_err)?;
        }
        if let Some(c) = &layout.contents {
            writeln!(writer, "contents {c}").map_err(io_err)?;
        }
        for p in layout.parameters() {
            match &p.fixed_value {
                Some(fv) => writeln!(writer, "parameter {} {} fixed={}", p.name, type_name(p.scalar_type), fv)
                    .map_err(io_err)?,
                None => writeln!(writer, "parameter {} {}", p.name, type_name(p.scalar_type)).map_err(io_err)?,
            }
        }
        for a in layout.arrays() {
            writeln!(
                writer,
                "array {} {} {}",
                a.field.name,
                type_name(a.field.scalar_type),
                a.dimension_count
            )
            .map_err(io_err)?;
        }
        for c in layout.columns() {
            writeln!(writer, "column {} {}", c.name, type_name(c.scalar_type)).map_err(io_err)?;
        }
        writeln!(writer, "end").map_err(io_err)?;
        Ok(())
    }
}

fn type_name(t: ScalarType) -> &'static str {
    match t {
        ScalarType::I16 => "i16",
        ScalarType::U16 => "u16",
        ScalarType::I32 => "i32",
        ScalarType::U32 => "u32",
        ScalarType::I64 => "i64",
        ScalarType::U64 => "u64",
        ScalarType::F32 => "f32",
        ScalarType::F64 => "f64",
        ScalarType::F80 => "f80",
        ScalarType::Char => "char",
        ScalarType::Str => "string",
    }
}

fn parse_scalar_type(s: &str) -> crate::Result<ScalarType> {
    Ok(match s {
        "i16" => ScalarType::I16,
        "u16" => ScalarType::U16,
        "i32" => ScalarType::I32,
        "u32" => ScalarType::U32,
        "i64" => ScalarType::I64,
        "u64" => ScalarType::U64,
        "f32" => ScalarType::F32,
        "f64" => ScalarType::F64,
        "f80" => ScalarType::F80,
        "char" => ScalarType::Char,
        "string" => ScalarType::Str,
        other => return Err(crate::SddsError::Schema(format!("unknown scalar type: {other}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trip_simple_layout() {
        let mut layout = Layout::new(ByteOrderKind::Little, DataMode::Binary);
        layout.define_parameter(FieldDef::new("step", ScalarType::I32)).unwrap();
        layout.define_column(FieldDef::new("x", ScalarType::I32)).unwrap();
        layout.define_column(FieldDef::new("y", ScalarType::F64)).unwrap();

        let mut buf = Vec::new();
        PlainTextHeader.write_layout(&mut buf, &layout).unwrap();

        let mut cursor = Cursor::new(buf);
        let parsed = PlainTextHeader.read_layout(&mut cursor).unwrap();

        assert_eq!(parsed.declared_byte_order, ByteOrderKind::Little);
        assert_eq!(parsed.parameters().len(), 1);
        assert_eq!(parsed.columns().len(), 2);
        assert_eq!(parsed.columns()[1].scalar_type, ScalarType::F64);
    }

    #[test]
    fn round_trips_a_fixed_value_parameter() {
        let mut layout = Layout::new(ByteOrderKind::Little, DataMode::Binary);
        let mut step = FieldDef::new("step", ScalarType::I32);
        step.fixed_value = Some("7".to_string());
        layout.define_parameter(step).unwrap();

        let mut buf = Vec::new();
        PlainTextHeader.write_layout(&mut buf, &layout).unwrap();

        let mut cursor = Cursor::new(buf);
        let parsed = PlainTextHeader.read_layout(&mut cursor).unwrap();
        assert_eq!(parsed.parameters()[0].fixed_value.as_deref(), Some("7"));
    }

    #[test]
    fn unknown_directive_is_schema_error() {
        let mut cursor = Cursor::new(b"bogus thing\nend\n".to_vec());
        let err = PlainTextHeader.read_layout(&mut cursor).unwrap_err();
        assert!(matches!(err, crate::SddsError::Schema(_)));
    }
}
