//! Static record schemas.
//!
//! A [`RecordSchema`] is an ordered list of named [`Field`]s drawn from a
//! small type vocabulary. Any field may be nullable. Types that can be
//! bulk-loaded implement [`Record`], pushing one [`Value`] per field in
//! schema order.

use crate::codec::RowEncoder;
use crate::error::EncodeError;

/// Wire type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 text (`TEXT`).
    String,
    /// 32-bit signed integer (`INTEGER`).
    Int,
    /// 64-bit signed integer (`BIGINT`).
    Long,
    /// 32-bit float (`REAL`).
    Float,
    /// 64-bit float (`DOUBLE PRECISION`).
    Double,
    /// Boolean (`BOOLEAN`).
    Boolean,
}

/// One named field of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Column name.
    pub name: &'static str,
    /// Wire type.
    pub kind: FieldKind,
    /// Whether the field accepts [`Value::Null`].
    pub nullable: bool,
}

impl Field {
    /// A field that must always carry a value.
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    /// A field that may be null.
    pub const fn nullable(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }
}

/// Ordered field list describing one kind of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSchema {
    /// Schema name, carried in the stream header.
    pub name: &'static str,
    /// Fields in wire order.
    pub fields: &'static [Field],
}

impl RecordSchema {
    /// Comma-separated column names in wire order.
    pub fn column_list(&self) -> String {
        self.fields
            .iter()
            .map(|f| f.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Self-description written into the stream header, e.g.
    /// `buildcomp_change(game_id, player_id, ...)`.
    pub fn tag(&self) -> String {
        format!("{}({})", self.name, self.column_list())
    }

    /// The `COPY` statement that loads this schema's stream into `table`.
    pub fn copy_statement(&self, table: &str) -> String {
        format!(
            "COPY {table} ({}) FROM STDIN WITH (FORMAT binary)",
            self.column_list()
        )
    }
}

/// A single field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// Text.
    Str(&'a str),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Boolean.
    Bool(bool),
    /// The null branch of a nullable field.
    Null,
}

impl Value<'_> {
    /// The field kind this value encodes, `None` for null.
    pub const fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Str(_) => Some(FieldKind::String),
            Self::Int(_) => Some(FieldKind::Int),
            Self::Long(_) => Some(FieldKind::Long),
            Self::Float(_) => Some(FieldKind::Float),
            Self::Double(_) => Some(FieldKind::Double),
            Self::Bool(_) => Some(FieldKind::Boolean),
            Self::Null => None,
        }
    }

    /// Short name of the value's kind, used in error messages.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Bool(_) => "boolean",
            Self::Null => "null",
        }
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Self::Str(v)
    }
}

impl From<i32> for Value<'_> {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for Value<'_> {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for Value<'_> {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl<'a, T: Into<Value<'a>>> From<Option<T>> for Value<'a> {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A type that can be streamed into a bulk load.
pub trait Record {
    /// The fixed schema every instance encodes against.
    fn schema() -> &'static RecordSchema;

    /// Push one value per schema field, in schema order.
    fn encode_fields(&self, row: &mut RowEncoder<'_>) -> Result<(), EncodeError>;
}
