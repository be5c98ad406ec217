//! Binary encoding of entity fields.
//!
//! Layout:
//! - field count (4 bytes, little-endian)
//! - per field: name length (2 bytes LE), UTF-8 name, value tag (1 byte),
//!   value payload

use crate::decimal::Decimal;
use crate::error::Error;
use crate::value::Value;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueTag {
    Null = 0,
    Bool = 1,
    Int32 = 2,
    Int64 = 3,
    Float64 = 5,
    String = 6,
    Uuid = 8,
    Timestamp = 9,
    Decimal = 17,
}

impl TryFrom<u8> for ValueTag {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ValueTag::Null),
            1 => Ok(ValueTag::Bool),
            2 => Ok(ValueTag::Int32),
            3 => Ok(ValueTag::Int64),
            5 => Ok(ValueTag::Float64),
            6 => Ok(ValueTag::String),
            8 => Ok(ValueTag::Uuid),
            9 => Ok(ValueTag::Timestamp),
            17 => Ok(ValueTag::Decimal),
            _ => Err(Error::InvalidData(format!("unknown value tag: {value}"))),
        }
    }
}

/// Encode a list of field name/value pairs to bytes.
pub fn encode_entity(fields: &[(String, Value)]) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::with_capacity(16 * fields.len() + 4);

    let count = u32::try_from(fields.len())
        .map_err(|_| Error::InvalidData("too many fields".into()))?;
    buf.extend_from_slice(&count.to_le_bytes());

    for (name, value) in fields {
        let len = u16::try_from(name.len())
            .map_err(|_| Error::InvalidData(format!("field name too long: {name}")))?;
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        encode_value(&mut buf, value)?;
    }

    Ok(buf)
}

/// Decode bytes back to field name/value pairs.
pub fn decode_entity(data: &[u8]) -> Result<Vec<(String, Value)>, Error> {
    let mut reader = Reader::new(data);
    let count = reader.u32()? as usize;

    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        let name = reader.field_name()?.to_string();
        let value = reader.value()?;
        fields.push((name, value));
    }

    Ok(fields)
}

/// Get a single field value by name, skipping the payloads of other fields.
pub fn get_field(data: &[u8], field_name: &str) -> Result<Option<Value>, Error> {
    let mut reader = Reader::new(data);
    let count = reader.u32()?;

    for _ in 0..count {
        if reader.field_name()? == field_name {
            return reader.value().map(Some);
        }
        reader.skip_value()?;
    }

    Ok(None)
}

fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), Error> {
    match value {
        Value::Null => buf.push(ValueTag::Null as u8),
        Value::Bool(b) => {
            buf.push(ValueTag::Bool as u8);
            buf.push(u8::from(*b));
        }
        Value::Int32(n) => {
            buf.push(ValueTag::Int32 as u8);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Value::Int64(n) => {
            buf.push(ValueTag::Int64 as u8);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Value::Float64(f) => {
            buf.push(ValueTag::Float64 as u8);
            buf.extend_from_slice(&f.to_le_bytes());
        }
        Value::Decimal(d) => {
            buf.push(ValueTag::Decimal as u8);
            buf.extend_from_slice(&d.mantissa().to_le_bytes());
            buf.push(d.scale());
        }
        Value::String(s) => {
            let len = u32::try_from(s.len())
                .map_err(|_| Error::InvalidData("string too long".into()))?;
            buf.push(ValueTag::String as u8);
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Uuid(uuid) => {
            buf.push(ValueTag::Uuid as u8);
            buf.extend_from_slice(uuid);
        }
        Value::Timestamp(ts) => {
            buf.push(ValueTag::Timestamp as u8);
            buf.extend_from_slice(&ts.to_le_bytes());
        }
    }
    Ok(())
}

/// Bounds-checked cursor over encoded entity bytes.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                Error::InvalidData(format!("truncated entity data at offset {}", self.pos))
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let bytes = self.take(N)?;
        bytes.try_into().map_err(|_| Error::InvalidKey)
    }

    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, Error> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, Error> {
        self.array().map(u32::from_le_bytes)
    }

    fn i64(&mut self) -> Result<i64, Error> {
        self.array().map(i64::from_le_bytes)
    }

    fn field_name(&mut self) -> Result<&'a str, Error> {
        let len = self.u16()? as usize;
        std::str::from_utf8(self.take(len)?)
            .map_err(|_| Error::InvalidData("invalid UTF-8 in field name".into()))
    }

    fn value(&mut self) -> Result<Value, Error> {
        let value = match ValueTag::try_from(self.u8()?)? {
            ValueTag::Null => Value::Null,
            ValueTag::Bool => Value::Bool(self.u8()? != 0),
            ValueTag::Int32 => Value::Int32(self.array().map(i32::from_le_bytes)?),
            ValueTag::Int64 => Value::Int64(self.i64()?),
            ValueTag::Float64 => Value::Float64(self.array().map(f64::from_le_bytes)?),
            ValueTag::Decimal => {
                let mantissa = self.i64()?;
                let scale = self.u8()?;
                let decimal = Decimal::new(mantissa, scale)
                    .map_err(|e| Error::InvalidData(e.to_string()))?;
                Value::Decimal(decimal)
            }
            ValueTag::String => {
                let len = self.u32()? as usize;
                let s = std::str::from_utf8(self.take(len)?)
                    .map_err(|_| Error::InvalidData("invalid UTF-8 in string value".into()))?;
                Value::String(s.to_string())
            }
            ValueTag::Uuid => Value::Uuid(self.array()?),
            ValueTag::Timestamp => Value::Timestamp(self.i64()?),
        };
        Ok(value)
    }

    fn skip_value(&mut self) -> Result<(), Error> {
        let size = match ValueTag::try_from(self.u8()?)? {
            ValueTag::Null => 0,
            ValueTag::Bool => 1,
            ValueTag::Int32 => 4,
            ValueTag::Int64 | ValueTag::Float64 | ValueTag::Timestamp => 8,
            ValueTag::Decimal => 9,
            ValueTag::Uuid => 16,
            ValueTag::String => self.u32()? as usize,
        };
        self.take(size).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_fields() -> Vec<(String, Value)> {
        vec![
            ("id".to_string(), Value::Uuid([7u8; 16])),
            ("name".to_string(), Value::String("Lamp".to_string())),
            ("price".to_string(), Value::Decimal("19.99".parse().unwrap())),
            ("stock".to_string(), Value::Int32(12)),
            ("featured".to_string(), Value::Bool(true)),
            ("rating".to_string(), Value::Float64(4.5)),
            ("views".to_string(), Value::Int64(-3)),
            ("description".to_string(), Value::Null),
            ("created_at".to_string(), Value::Timestamp(1_700_000_000_000_000)),
        ]
    }

    #[test]
    fn test_encode_decode_all_types() {
        let fields = product_fields();
        let encoded = encode_entity(&fields).unwrap();
        assert_eq!(decode_entity(&encoded).unwrap(), fields);
    }

    #[test]
    fn test_get_field_skips_others() {
        let encoded = encode_entity(&product_fields()).unwrap();

        assert_eq!(
            get_field(&encoded, "stock").unwrap(),
            Some(Value::Int32(12))
        );
        assert_eq!(
            get_field(&encoded, "created_at").unwrap(),
            Some(Value::Timestamp(1_700_000_000_000_000))
        );
        assert_eq!(get_field(&encoded, "description").unwrap(), Some(Value::Null));
        assert_eq!(get_field(&encoded, "missing").unwrap(), None);
    }

    #[test]
    fn test_empty_entity() {
        let encoded = encode_entity(&[]).unwrap();
        assert_eq!(encoded.len(), 4);
        assert!(decode_entity(&encoded).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_data_is_an_error() {
        let encoded = encode_entity(&product_fields()).unwrap();

        assert!(decode_entity(&encoded[..encoded.len() - 3]).is_err());
        assert!(decode_entity(&encoded[..2]).is_err());
        assert!(get_field(&encoded[..10], "created_at").is_err());
    }

    #[test]
    fn test_unknown_tag() {
        let mut encoded = encode_entity(&[("x".to_string(), Value::Null)]).unwrap();
        let last = encoded.len() - 1;
        encoded[last] = 200;

        assert!(matches!(decode_entity(&encoded), Err(Error::InvalidData(_))));
    }
}
