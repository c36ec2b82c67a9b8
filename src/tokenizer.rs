//! String tokenizer for parameter fixed values (spec.md §1): one of the
//! three external collaborators the core consumes (alongside [`crate::header::HeaderIo`]
//! and a file-locator callback). A parameter's `fixed_value` is a literal
//! string baked into the header; it is never stored on the binary wire
//! (spec.md §3) and is parsed into a typed [`Value`] through this trait
//! rather than re-encoded on every read.

use crate::codec::Value;
use crate::layout::ScalarType;

/// Parses a fixed-value string into a typed [`Value`] for the declared
/// `ScalarType`.
pub trait FixedValueParser {
    fn parse(&self, text: &str, scalar_type: ScalarType) -> crate::Result<Value>;
}

/// Whitespace-trimmed primitive parser: numeric types go through their
/// `FromStr` impl, `Char` takes the first byte, `Str` is the text as-is.
/// Good enough for a handful of fixed-value parameters; not an attempt to
/// replicate any existing expression/RPN calculator dialect (out of scope
/// per spec.md §1).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFixedValueParser;

impl FixedValueParser for DefaultFixedValueParser {
    fn parse(&self, text: &str, scalar_type: ScalarType) -> crate::Result<Value> {
        let text = text.trim();
        match scalar_type {
            ScalarType::I16 => text.parse::<i16>().map(Value::I16).map_err(|e| parse_err("i16", text, e)),
            ScalarType::U16 => text.parse::<u16>().map(Value::U16).map_err(|e| parse_err("u16", text, e)),
            ScalarType::I32 => text.parse::<i32>().map(Value::I32).map_err(|e| parse_err("i32", text, e)),
            ScalarType::U32 => text.parse::<u32>().map(Value::U32).map_err(|e| parse_err("u32", text, e)),
            ScalarType::I64 => text.parse::<i64>().map(Value::I64).map_err(|e| parse_err("i64", text, e)),
            ScalarType::U64 => text.parse::<u64>().map(Value::U64).map_err(|e| parse_err("u64", text, e)),
            ScalarType::F32 => text.parse::<f32>().map(Value::F32).map_err(|e| parse_err("f32", text, e)),
            ScalarType::F64 | ScalarType::F80 => {
                text.parse::<f64>().map(Value::F64).map_err(|e| parse_err("f64", text, e))
            }
            ScalarType::Char => text
                .bytes()
                .next()
                .map(Value::Char)
                .ok_or_else(|| crate::SddsError::Schema(format!("empty fixed value for a char parameter: {text:?}"))),
            ScalarType::Str => Ok(Value::Str(text.to_string())),
        }
    }
}

fn parse_err(type_name: &str, text: &str, e: impl std::fmt::Display) -> crate::SddsError {
    crate::SddsError::Schema(format!("fixed value {text:?} is not a valid {type_name}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_numeric_type() {
        let p = DefaultFixedValueParser;
        assert_eq!(p.parse("7", ScalarType::I32).unwrap(), Value::I32(7));
        assert_eq!(p.parse("  7  ", ScalarType::I32).unwrap(), Value::I32(7));
        assert_eq!(p.parse("3.5", ScalarType::F64).unwrap(), Value::F64(3.5));
        assert_eq!(p.parse("3.5", ScalarType::F80).unwrap(), Value::F64(3.5));
        assert_eq!(p.parse("65000", ScalarType::U16).unwrap(), Value::U16(65000));
    }

    #[test]
    fn parses_char_and_string() {
        let p = DefaultFixedValueParser;
        assert_eq!(p.parse("Q", ScalarType::Char).unwrap(), Value::Char(b'Q'));
        assert_eq!(p.parse("hello", ScalarType::Str).unwrap(), Value::Str("hello".into()));
    }

    #[test]
    fn rejects_malformed_numeric_text() {
        let p = DefaultFixedValueParser;
        let err = p.parse("not-a-number", ScalarType::I32).unwrap_err();
        assert!(matches!(err, crate::SddsError::Schema(_)));
    }

    #[test]
    fn rejects_empty_char_fixed_value() {
        let p = DefaultFixedValueParser;
        let err = p.parse("", ScalarType::Char).unwrap_err();
        assert!(matches!(err, crate::SddsError::Schema(_)));
    }
}
