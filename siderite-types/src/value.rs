//! Generic representation of any AMQP 1.0 value

use bytes::{BufMut, Bytes, BytesMut};
use ordered_float::OrderedFloat;

use crate::codec::{Decode, DecodeError, Encode};
use crate::format_code as fc;
use crate::primitives::{Array, Binary, OrderedMap, Symbol, Timestamp, Uuid};

/// The descriptor of a described type, either a numeric code or a
/// symbolic name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Descriptor {
    /// A numeric descriptor code
    Code(u64),
    /// A symbolic descriptor name
    Name(Symbol),
}

impl Encode for Descriptor {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Descriptor::Code(code) => code.encode(buf),
            Descriptor::Name(name) => name.encode(buf),
        }
    }
}

impl Decode for Descriptor {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::ULONG | fc::SMALL_ULONG | fc::ULONG_0 => {
                Ok(Descriptor::Code(u64::decode_body(code, buf)?))
            }
            fc::SYM8 | fc::SYM32 => Ok(Descriptor::Name(Symbol::decode_body(code, buf)?)),
            _ => Err(DecodeError::InvalidDescriptor),
        }
    }
}

/// A described value: a descriptor paired with the value it annotates
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Described<T> {
    pub descriptor: Descriptor,
    pub value: T,
}

impl<T: Encode> Encode for Described<T> {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(fc::DESCRIBED);
        self.descriptor.encode(buf);
        self.value.encode(buf);
    }
}

impl<T: Decode> Decode for Described<T> {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        if code != fc::DESCRIBED {
            return Err(DecodeError::UnexpectedFormatCode(code));
        }
        let descriptor = Descriptor::decode(buf)?;
        let value = T::decode(buf)?;
        Ok(Described { descriptor, value })
    }
}

/// Any value expressible in the AMQP 1.0 type system.
///
/// Floats are wrapped in [`OrderedFloat`] so that values can serve as
/// map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Bool(bool),
    Ubyte(u8),
    Ushort(u16),
    Uint(u32),
    Ulong(u64),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    Char(char),
    Timestamp(Timestamp),
    Uuid(Uuid),
    Binary(Binary),
    String(String),
    Symbol(Symbol),
    List(Vec<Value>),
    Map(OrderedMap<Value, Value>),
    Array(Array<Value>),
    Described(Box<Described<Value>>),
}

impl Value {
    /// Whether this is the null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Ulong(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl Encode for Value {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Value::Null => buf.put_u8(fc::NULL),
            Value::Bool(v) => v.encode(buf),
            Value::Ubyte(v) => v.encode(buf),
            Value::Ushort(v) => v.encode(buf),
            Value::Uint(v) => v.encode(buf),
            Value::Ulong(v) => v.encode(buf),
            Value::Byte(v) => v.encode(buf),
            Value::Short(v) => v.encode(buf),
            Value::Int(v) => v.encode(buf),
            Value::Long(v) => v.encode(buf),
            Value::Float(v) => v.0.encode(buf),
            Value::Double(v) => v.0.encode(buf),
            Value::Char(v) => v.encode(buf),
            Value::Timestamp(v) => v.encode(buf),
            Value::Uuid(v) => v.encode(buf),
            Value::Binary(v) => v.encode(buf),
            Value::String(v) => v.encode(buf),
            Value::Symbol(v) => v.encode(buf),
            Value::List(v) => v.encode(buf),
            Value::Map(v) => v.encode(buf),
            Value::Array(v) => encode_value_array(v, buf),
            Value::Described(v) => v.encode(buf),
        }
    }
}

// Array elements share a single constructor, so a generic value array
// pins each element type to its widest encoding.
fn encode_value_array(array: &Array<Value>, buf: &mut BytesMut) {
    let ctor = match array.0.first() {
        None | Some(Value::Null) => fc::NULL,
        Some(Value::Bool(_)) => fc::BOOLEAN,
        Some(Value::Ubyte(_)) => fc::UBYTE,
        Some(Value::Ushort(_)) => fc::USHORT,
        Some(Value::Uint(_)) => fc::UINT,
        Some(Value::Ulong(_)) => fc::ULONG,
        Some(Value::Byte(_)) => fc::BYTE,
        Some(Value::Short(_)) => fc::SHORT,
        Some(Value::Int(_)) => fc::INT,
        Some(Value::Long(_)) => fc::LONG,
        Some(Value::Float(_)) => fc::FLOAT,
        Some(Value::Double(_)) => fc::DOUBLE,
        Some(Value::Char(_)) => fc::CHAR,
        Some(Value::Timestamp(_)) => fc::TIMESTAMP,
        Some(Value::Uuid(_)) => fc::UUID,
        Some(Value::Binary(_)) => fc::VBIN32,
        Some(Value::String(_)) => fc::STR32,
        Some(Value::Symbol(_)) => fc::SYM32,
        Some(Value::List(_)) => fc::LIST32,
        Some(Value::Map(_)) => fc::MAP32,
        Some(Value::Array(_)) => fc::ARRAY32,
        Some(Value::Described(_)) => fc::DESCRIBED,
    };

    let mut body = BytesMut::new();
    body.put_u8(ctor);
    for value in &array.0 {
        encode_array_element(value, ctor, &mut body);
    }

    // size counts the count field and the body
    if array.len() <= u8::MAX as usize && body.len() + 1 <= u8::MAX as usize {
        buf.put_u8(fc::ARRAY8);
        buf.put_u8((body.len() + 1) as u8);
        buf.put_u8(array.len() as u8);
    } else {
        buf.put_u8(fc::ARRAY32);
        buf.put_u32((body.len() + 4) as u32);
        buf.put_u32(array.len() as u32);
    }
    buf.put_slice(&body);
}

fn encode_array_element(value: &Value, ctor: u8, buf: &mut BytesMut) {
    match (value, ctor) {
        (Value::Null, fc::NULL) => {}
        (Value::Bool(v), fc::BOOLEAN) => buf.put_u8(*v as u8),
        (Value::Ubyte(v), fc::UBYTE) => buf.put_u8(*v),
        (Value::Ushort(v), fc::USHORT) => buf.put_u16(*v),
        (Value::Uint(v), fc::UINT) => buf.put_u32(*v),
        (Value::Ulong(v), fc::ULONG) => buf.put_u64(*v),
        (Value::Byte(v), fc::BYTE) => buf.put_i8(*v),
        (Value::Short(v), fc::SHORT) => buf.put_i16(*v),
        (Value::Int(v), fc::INT) => buf.put_i32(*v),
        (Value::Long(v), fc::LONG) => buf.put_i64(*v),
        (Value::Float(v), fc::FLOAT) => buf.put_f32(v.0),
        (Value::Double(v), fc::DOUBLE) => buf.put_f64(v.0),
        (Value::Char(v), fc::CHAR) => buf.put_u32(*v as u32),
        (Value::Timestamp(v), fc::TIMESTAMP) => buf.put_i64(v.0),
        (Value::Uuid(v), fc::UUID) => buf.put_slice(&v.0),
        (Value::Binary(v), fc::VBIN32) => {
            buf.put_u32(v.len() as u32);
            buf.put_slice(v);
        }
        (Value::String(v), fc::STR32) => {
            buf.put_u32(v.len() as u32);
            buf.put_slice(v.as_bytes());
        }
        (Value::Symbol(v), fc::SYM32) => {
            buf.put_u32(v.0.len() as u32);
            buf.put_slice(v.0.as_bytes());
        }
        (Value::List(v), fc::LIST32) => {
            let mut inner = BytesMut::new();
            for item in v {
                item.encode(&mut inner);
            }
            buf.put_u32((inner.len() + 4) as u32);
            buf.put_u32(v.len() as u32);
            buf.put_slice(&inner);
        }
        (Value::Map(v), fc::MAP32) => {
            let mut inner = BytesMut::new();
            for (k, val) in v.0.iter() {
                k.encode(&mut inner);
                val.encode(&mut inner);
            }
            buf.put_u32((inner.len() + 4) as u32);
            buf.put_u32((v.0.len() * 2) as u32);
            buf.put_slice(&inner);
        }
        (Value::Array(v), fc::ARRAY32) => {
            let mut inner = BytesMut::new();
            encode_value_array(v, &mut inner);
            // strip the nested constructor; the body is reused as-is
            buf.put_slice(&inner[1..]);
        }
        (Value::Described(v), fc::DESCRIBED) => {
            v.descriptor.encode(buf);
            v.value.encode(buf);
        }
        // a heterogeneous array cannot be encoded; fall back to null
        _ => {}
    }
}

impl Decode for Value {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::NULL => Ok(Value::Null),
            fc::BOOLEAN | fc::BOOLEAN_TRUE | fc::BOOLEAN_FALSE => {
                Ok(Value::Bool(bool::decode_body(code, buf)?))
            }
            fc::UBYTE => Ok(Value::Ubyte(u8::decode_body(code, buf)?)),
            fc::USHORT => Ok(Value::Ushort(u16::decode_body(code, buf)?)),
            fc::UINT | fc::SMALL_UINT | fc::UINT_0 => {
                Ok(Value::Uint(u32::decode_body(code, buf)?))
            }
            fc::ULONG | fc::SMALL_ULONG | fc::ULONG_0 => {
                Ok(Value::Ulong(u64::decode_body(code, buf)?))
            }
            fc::BYTE => Ok(Value::Byte(i8::decode_body(code, buf)?)),
            fc::SHORT => Ok(Value::Short(i16::decode_body(code, buf)?)),
            fc::INT | fc::SMALL_INT => Ok(Value::Int(i32::decode_body(code, buf)?)),
            fc::LONG | fc::SMALL_LONG => Ok(Value::Long(i64::decode_body(code, buf)?)),
            fc::FLOAT => Ok(Value::Float(OrderedFloat(f32::decode_body(code, buf)?))),
            fc::DOUBLE => Ok(Value::Double(OrderedFloat(f64::decode_body(code, buf)?))),
            fc::DECIMAL32 | fc::DECIMAL64 | fc::DECIMAL128 => {
                Err(DecodeError::Unsupported(code))
            }
            fc::CHAR => Ok(Value::Char(char::decode_body(code, buf)?)),
            fc::TIMESTAMP => Ok(Value::Timestamp(Timestamp::decode_body(code, buf)?)),
            fc::UUID => Ok(Value::Uuid(Uuid::decode_body(code, buf)?)),
            fc::VBIN8 | fc::VBIN32 => Ok(Value::Binary(Binary::decode_body(code, buf)?)),
            fc::STR8 | fc::STR32 => Ok(Value::String(String::decode_body(code, buf)?)),
            fc::SYM8 | fc::SYM32 => Ok(Value::Symbol(Symbol::decode_body(code, buf)?)),
            fc::LIST0 | fc::LIST8 | fc::LIST32 => {
                Ok(Value::List(Vec::<Value>::decode_body(code, buf)?))
            }
            fc::MAP8 | fc::MAP32 => Ok(Value::Map(OrderedMap::decode_body(code, buf)?)),
            fc::ARRAY8 | fc::ARRAY32 => {
                Ok(Value::Array(Array::<Value>::decode_body(code, buf)?))
            }
            fc::DESCRIBED => Ok(Value::Described(Box::new(Described::decode_body(
                code, buf,
            )?))),
            _ => Err(DecodeError::InvalidFormatCode(code)),
        }
    }
}

/// Reads a value from a buffer, used by consumers that hold raw section
/// bytes
pub fn decode_value(buf: &mut Bytes) -> Result<Value, DecodeError> {
    Value::decode(buf)
}
