//! In-memory schema: parameter, array, column, and associate definitions,
//! plus the data-mode and byte-order flags that govern how a file's pages
//! are encoded (spec.md §3, §4.3).

use std::collections::HashMap;

pub use crate::byteorder::ByteOrderKind;

/// Closed tag set of scalar types carried on the wire (spec.md §3). Every
/// variant has a fixed on-wire size except `Str`, which is length-prefixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// 80-bit extended precision, read-only on hosts with a 64-bit
    /// `long double`; narrowed to `f64` on read (spec.md §4.1, §4.4).
    F80,
    Char,
    Str,
}

impl ScalarType {
    /// Fixed on-wire size in bytes, or `None` for `Str` (length-prefixed).
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            ScalarType::I16 | ScalarType::U16 => Some(2),
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => Some(4),
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => Some(8),
            ScalarType::F80 => Some(crate::constants::F80_RECORD_SIZE),
            ScalarType::Char => Some(1),
            ScalarType::Str => None,
        }
    }

    /// Whether aggregate statistics (`sparse_statistics`) are defined for
    /// this type. Only floating-point scalars support aggregation
    /// (spec.md §4.5 "Aggregates are defined only on f32/f64/f80").
    pub fn supports_statistics(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64 | ScalarType::F80)
    }
}

/// Whether data in a page is row-major or column-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    Ascii,
    Binary,
}

/// A single parameter, array, or column definition. Fields beyond `name`
/// and `scalar_type` are optional metadata carried through to readers but
/// never required for decoding.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub scalar_type: ScalarType,
    pub units: Option<String>,
    pub symbol: Option<String>,
    pub description: Option<String>,
    pub format: Option<String>,
    /// Skipped on read (spec.md §4.3).
    pub write_only: bool,
    /// Parameters only: a literal value baked into the header instead of
    /// stored on the binary wire (spec.md §3); parsed via the external
    /// string tokenizer and never re-encoded.
    pub fixed_value: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        FieldDef {
            name: name.into(),
            scalar_type,
            units: None,
            symbol: None,
            description: None,
            format: None,
            write_only: false,
            fixed_value: None,
        }
    }
}

/// An array definition. `dimension_count` is fixed per definition; actual
/// per-page dimensions are read from the wire (spec.md §3, §6.1).
#[derive(Debug, Clone)]
pub struct ArrayDef {
    pub field: FieldDef,
    pub dimension_count: usize,
}

/// An associate definition: a cross-reference to another SDDS file's
/// column/parameter, carried as metadata only (never contributes bytes to
/// a page). Treated as an opaque name/value-pair bag here since the
/// binary page engine never touches associate payloads directly.
#[derive(Debug, Clone)]
pub struct AssociateDef {
    pub name: String,
    pub filename: String,
    pub path: Option<String>,
    pub description: Option<String>,
    pub contents: Option<String>,
    pub sdds: bool,
}

/// The immutable-during-a-page schema for one file (spec.md §3).
#[derive(Debug, Clone)]
pub struct Layout {
    pub description: Option<String>,
    pub contents: Option<String>,
    pub version: u32,
    pub declared_byte_order: ByteOrderKind,
    pub data_mode: DataMode,
    pub column_major: bool,
    pub fixed_row_count: bool,
    pub fixed_row_increment: u32,

    parameters: Vec<FieldDef>,
    arrays: Vec<ArrayDef>,
    columns: Vec<FieldDef>,
    associates: Vec<AssociateDef>,

    parameter_index: HashMap<String, usize>,
    array_index: HashMap<String, usize>,
    column_index: HashMap<String, usize>,

    /// Sum of per-column on-wire sizes for one fixed-width row, with
    /// `Str` columns contributing `4 + max_string_length` (spec.md §4.3).
    /// `None` until computed by [`Layout::fixed_row_stride`], or always
    /// `None` if any column is `Str` (row stride is not fixed then).
    fixed_row_stride: Option<usize>,
}

impl Layout {
    /// Begin building a layout for a file with the given declared byte
    /// order and data mode. Definitions are added with `define_*` and the
    /// layout becomes immutable once handed to a page engine.
    pub fn new(declared_byte_order: ByteOrderKind, data_mode: DataMode) -> Self {
        Layout {
            description: None,
            contents: None,
            version: 3,
            declared_byte_order,
            data_mode,
            column_major: false,
            fixed_row_count: false,
            fixed_row_increment: 1000,
            parameters: Vec::new(),
            arrays: Vec::new(),
            columns: Vec::new(),
            associates: Vec::new(),
            parameter_index: HashMap::new(),
            array_index: HashMap::new(),
            column_index: HashMap::new(),
            fixed_row_stride: None,
        }
    }

    /// Add a parameter definition. Fails with [`crate::SddsError::Schema`]
    /// on a duplicate name within the parameter sequence.
    pub fn define_parameter(&mut self, def: FieldDef) -> crate::Result<()> {
        if self.parameter_index.contains_key(&def.name) {
            return Err(crate::SddsError::Schema(format!(
                "duplicate parameter name: {}",
                def.name
            )));
        }
        self.parameter_index.insert(def.name.clone(), self.parameters.len());
        self.parameters.push(def);
        Ok(())
    }

    /// Add an array definition. Fails on a duplicate name.
    pub fn define_array(&mut self, def: ArrayDef) -> crate::Result<()> {
        if self.array_index.contains_key(&def.field.name) {
            return Err(crate::SddsError::Schema(format!(
                "duplicate array name: {}",
                def.field.name
            )));
        }
        self.array_index.insert(def.field.name.clone(), self.arrays.len());
        self.arrays.push(def);
        Ok(())
    }

    /// Add a column definition. Fails on a duplicate name, or if
    /// `column_major` is set and the column is string-typed (invariant 2).
    pub fn define_column(&mut self, def: FieldDef) -> crate::Result<()> {
        if self.column_major && def.scalar_type == ScalarType::Str {
            return Err(crate::SddsError::Format(format!(
                "column {} is string-typed but the layout is column-major (invariant 2)",
                def.name
            )));
        }
        if self.column_index.contains_key(&def.name) {
            return Err(crate::SddsError::Schema(format!(
                "duplicate column name: {}",
                def.name
            )));
        }
        self.column_index.insert(def.name.clone(), self.columns.len());
        self.columns.push(def);
        self.fixed_row_stride = None;
        Ok(())
    }

    /// Add an associate definition (metadata only).
    pub fn define_associate(&mut self, def: AssociateDef) {
        self.associates.push(def);
    }

    pub fn parameters(&self) -> &[FieldDef] {
        &self.parameters
    }

    pub fn arrays(&self) -> &[ArrayDef] {
        &self.arrays
    }

    pub fn columns(&self) -> &[FieldDef] {
        &self.columns
    }

    pub fn associates(&self) -> &[AssociateDef] {
        &self.associates
    }

    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameter_index.get(name).copied()
    }

    pub fn array_index(&self, name: &str) -> Option<usize> {
        self.array_index.get(name).copied()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    /// Compute (and cache) the fixed per-row byte stride for row-major
    /// fixed-width layouts, or `None` if any column is `Str` (spec.md
    /// §4.3: "with string columns contributing 4 + max_string_length").
    /// `max_len` supplies the assumed maximum string length for any
    /// `Str` column; pass `None` if the layout has no string columns.
    pub fn fixed_row_stride(&mut self, max_string_length: Option<usize>) -> Option<usize> {
        if let Some(stride) = self.fixed_row_stride {
            return Some(stride);
        }
        let mut total = 0usize;
        for col in &self.columns {
            match col.scalar_type.fixed_size() {
                Some(size) => total += size,
                None => match max_string_length {
                    Some(max_len) => total += 4 + max_len,
                    None => return None,
                },
            }
        }
        self.fixed_row_stride = Some(total);
        Some(total)
    }
}
