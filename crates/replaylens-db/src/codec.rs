//! Binary `COPY` encoding.
//!
//! The stream is `PostgreSQL`'s binary copy format, tagged with the
//! record schema in the header extension area:
//!
//! ```text
//! [SIGNATURE "PGCOPY\n\xff\r\n\0"] [FLAGS i32 = 0] [EXT LEN i32] [SCHEMA TAG]
//! [FIELD COUNT i16] ([LEN i32] [BYTES])*   -- one tuple per record
//! [TRAILER i16 = -1]
//! ```
//!
//! All integers are big-endian. A nullable field is a union of a value
//! branch and the null sentinel, a length of `-1` with no payload.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::EncodeError;
use crate::schema::{Field, Record, RecordSchema, Value};

/// Fixed 11-byte signature opening every binary copy stream.
pub const SIGNATURE: &[u8; 11] = b"PGCOPY\n\xff\r\n\0";

/// Length written in place of a payload for null values.
const NULL_LENGTH: i32 = -1;

/// Field count written after the last tuple.
const TRAILER: i16 = -1;

/// Encodes records of one schema into a binary copy stream.
///
/// Encoded bytes accumulate in an internal buffer which the caller drains
/// with [`take`](Self::take).
#[derive(Debug)]
pub struct CopyEncoder {
    schema: &'static RecordSchema,
    field_count: i16,
    buf: BytesMut,
    rows: u64,
}

impl CopyEncoder {
    /// Start a stream for `schema`, writing the header.
    pub fn new(schema: &'static RecordSchema) -> Result<Self, EncodeError> {
        let field_count = i16::try_from(schema.fields.len())
            .map_err(|_overflow| EncodeError::TooLarge("field count"))?;
        let tag = schema.tag();
        let tag_len =
            i32::try_from(tag.len()).map_err(|_overflow| EncodeError::TooLarge("schema tag"))?;

        let mut buf =
            BytesMut::with_capacity(SIGNATURE.len().saturating_add(8).saturating_add(tag.len()));
        buf.put_slice(SIGNATURE);
        buf.put_i32(0);
        buf.put_i32(tag_len);
        buf.put_slice(tag.as_bytes());

        Ok(Self {
            schema,
            field_count,
            buf,
            rows: 0,
        })
    }

    /// Append one record.
    ///
    /// On error nothing of the record remains in the buffer.
    pub fn encode<R: Record>(&mut self, record: &R) -> Result<(), EncodeError> {
        let row_start = self.buf.len();
        self.buf.put_i16(self.field_count);

        let mut row = RowEncoder {
            schema: self.schema,
            buf: &mut self.buf,
            index: 0,
        };
        let written = record.encode_fields(&mut row).and_then(|()| row.finish());

        match written {
            Ok(()) => {
                self.rows = self.rows.saturating_add(1);
                Ok(())
            }
            Err(e) => {
                self.buf.truncate(row_start);
                Err(e)
            }
        }
    }

    /// Append the end-of-stream trailer.
    pub fn finish(&mut self) {
        self.buf.put_i16(TRAILER);
    }

    /// Drain the bytes encoded so far.
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Number of bytes waiting to be drained.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Number of records encoded.
    pub const fn rows(&self) -> u64 {
        self.rows
    }

    /// The schema this stream encodes.
    pub const fn schema(&self) -> &'static RecordSchema {
        self.schema
    }
}

/// Writes the fields of a single tuple, checking each against the schema.
#[derive(Debug)]
pub struct RowEncoder<'a> {
    schema: &'static RecordSchema,
    buf: &'a mut BytesMut,
    index: usize,
}

impl RowEncoder<'_> {
    /// Write the next field's value.
    pub fn push<'v>(&mut self, value: impl Into<Value<'v>>) -> Result<(), EncodeError> {
        let value = value.into();
        let field = self.next_field()?;

        match value.kind() {
            None if field.nullable => {
                self.buf.put_i32(NULL_LENGTH);
            }
            None => {
                return Err(EncodeError::UnexpectedNull { field: field.name });
            }
            Some(kind) if kind != field.kind => {
                return Err(EncodeError::TypeMismatch {
                    field: field.name,
                    expected: field.kind,
                    found: value.kind_name(),
                });
            }
            Some(_) => write_payload(self.buf, field, value)?,
        }

        self.index = self.index.saturating_add(1);
        Ok(())
    }

    fn next_field(&self) -> Result<&'static Field, EncodeError> {
        self.schema
            .fields
            .get(self.index)
            .ok_or(EncodeError::FieldCount {
                schema: self.schema.name,
                expected: self.schema.fields.len(),
                found: self.index.saturating_add(1),
            })
    }

    const fn finish(&self) -> Result<(), EncodeError> {
        if self.index == self.schema.fields.len() {
            Ok(())
        } else {
            Err(EncodeError::FieldCount {
                schema: self.schema.name,
                expected: self.schema.fields.len(),
                found: self.index,
            })
        }
    }
}

fn write_payload(buf: &mut BytesMut, field: &Field, value: Value<'_>) -> Result<(), EncodeError> {
    match value {
        Value::Str(s) => {
            let len =
                i32::try_from(s.len()).map_err(|_overflow| EncodeError::TooLarge(field.name))?;
            buf.put_i32(len);
            buf.put_slice(s.as_bytes());
        }
        Value::Int(v) => {
            buf.put_i32(4);
            buf.put_i32(v);
        }
        Value::Long(v) => {
            buf.put_i32(8);
            buf.put_i64(v);
        }
        Value::Float(v) => {
            buf.put_i32(4);
            buf.put_f32(v);
        }
        Value::Double(v) => {
            buf.put_i32(8);
            buf.put_f64(v);
        }
        Value::Bool(v) => {
            buf.put_i32(1);
            buf.put_u8(u8::from(v));
        }
        Value::Null => buf.put_i32(NULL_LENGTH),
    }
    Ok(())
}
