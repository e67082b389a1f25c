//! Encode/decode of the AMQP 1.0 primitive and composite encodings.
//!
//! [`Encode`] appends the smallest valid encoding of a value to a
//! [`BytesMut`]; [`Decode`] consumes exactly one encoded value from a
//! [`Bytes`] and accepts every width variant regardless of what encode
//! would have chosen.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::format_code as fc;
use crate::primitives::{Array, Binary, OrderedMap, Symbol, Timestamp, Uuid};
use crate::value::Descriptor;

/// Errors found while decoding
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The buffer ended before the encoded value did
    #[error("buffer is truncated")]
    Truncated,

    /// A format code that is not defined by the specification
    #[error("invalid format code 0x{0:02x}")]
    InvalidFormatCode(u8),

    /// A valid format code in a position where it is not allowed
    #[error("unexpected format code 0x{0:02x}")]
    UnexpectedFormatCode(u8),

    /// A format code that is recognized but not supported
    #[error("unsupported format code 0x{0:02x}")]
    Unsupported(u8),

    /// A described type header that is not a valid descriptor
    #[error("malformed descriptor")]
    InvalidDescriptor,

    /// A descriptor code that does not name a known composite type
    #[error("unknown descriptor code 0x{0:02x}")]
    UnknownDescriptor(u64),

    /// A mandatory composite field was omitted or null
    #[error("mandatory field {0:?} is omitted")]
    MandatoryFieldOmitted(&'static str),

    /// A string or symbol that is not valid UTF-8
    #[error("invalid utf-8")]
    InvalidUtf8,

    /// A size prefix that exceeds the remaining buffer
    #[error("length out of range")]
    InvalidLength,

    /// A value outside the domain of the decoded type
    #[error("invalid value for {0}")]
    InvalidValue(&'static str),
}

/// Appends the AMQP 1.0 encoding of a value to a buffer.
///
/// The encoding chosen is deterministic for a given value: the smallest
/// valid width wins.
pub trait Encode {
    /// Appends the encoded value, constructor included
    fn encode(&self, buf: &mut BytesMut);
}

/// Decodes a value from its AMQP 1.0 encoding.
pub trait Decode: Sized {
    /// Consumes one constructor byte and the value body
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let code = take_u8(buf)?;
        Self::decode_body(code, buf)
    }

    /// Decodes the value body given an already-consumed constructor.
    ///
    /// This is the entry point used for array elements, where one
    /// constructor is shared by all elements.
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError>;
}

/// Element type usable inside an AMQP array: all elements share one
/// constructor, so variable-width types pin their widest encoding.
pub trait ArrayElement: Encode + Decode {
    /// The shared constructor byte
    fn array_constructor() -> u8;

    /// Appends the element body without a constructor
    fn encode_element(&self, buf: &mut BytesMut);
}

/* -------------------------------- helpers -------------------------------- */

pub(crate) fn take_u8(buf: &mut Bytes) -> Result<u8, DecodeError> {
    if buf.remaining() < 1 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_u8())
}

pub(crate) fn take_u16(buf: &mut Bytes) -> Result<u16, DecodeError> {
    if buf.remaining() < 2 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_u16())
}

pub(crate) fn take_u32(buf: &mut Bytes) -> Result<u32, DecodeError> {
    if buf.remaining() < 4 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_u32())
}

pub(crate) fn take_u64(buf: &mut Bytes) -> Result<u64, DecodeError> {
    if buf.remaining() < 8 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_u64())
}

pub(crate) fn take_bytes(buf: &mut Bytes, len: usize) -> Result<Bytes, DecodeError> {
    if buf.remaining() < len {
        return Err(DecodeError::InvalidLength);
    }
    Ok(buf.split_to(len))
}

pub(crate) fn peek_code(buf: &Bytes) -> Result<u8, DecodeError> {
    buf.first().copied().ok_or(DecodeError::Truncated)
}

/* ------------------------------- primitives ------------------------------ */

impl Encode for bool {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            true => buf.put_u8(fc::BOOLEAN_TRUE),
            false => buf.put_u8(fc::BOOLEAN_FALSE),
        }
    }
}

impl Decode for bool {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::BOOLEAN_TRUE => Ok(true),
            fc::BOOLEAN_FALSE => Ok(false),
            fc::BOOLEAN => match take_u8(buf)? {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(DecodeError::InvalidValue("boolean")),
            },
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl ArrayElement for bool {
    fn array_constructor() -> u8 {
        fc::BOOLEAN
    }

    fn encode_element(&self, buf: &mut BytesMut) {
        buf.put_u8(*self as u8);
    }
}

impl Encode for u8 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(fc::UBYTE);
        buf.put_u8(*self);
    }
}

impl Decode for u8 {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::UBYTE => take_u8(buf),
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl Encode for u16 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(fc::USHORT);
        buf.put_u16(*self);
    }
}

impl Decode for u16 {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::USHORT => take_u16(buf),
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl Encode for u32 {
    fn encode(&self, buf: &mut BytesMut) {
        match *self {
            0 => buf.put_u8(fc::UINT_0),
            v if v <= u8::MAX as u32 => {
                buf.put_u8(fc::SMALL_UINT);
                buf.put_u8(v as u8);
            }
            v => {
                buf.put_u8(fc::UINT);
                buf.put_u32(v);
            }
        }
    }
}

impl Decode for u32 {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::UINT_0 => Ok(0),
            fc::SMALL_UINT => Ok(take_u8(buf)? as u32),
            fc::UINT => take_u32(buf),
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl ArrayElement for u32 {
    fn array_constructor() -> u8 {
        fc::UINT
    }

    fn encode_element(&self, buf: &mut BytesMut) {
        buf.put_u32(*self);
    }
}

impl Encode for u64 {
    fn encode(&self, buf: &mut BytesMut) {
        match *self {
            0 => buf.put_u8(fc::ULONG_0),
            v if v <= u8::MAX as u64 => {
                buf.put_u8(fc::SMALL_ULONG);
                buf.put_u8(v as u8);
            }
            v => {
                buf.put_u8(fc::ULONG);
                buf.put_u64(v);
            }
        }
    }
}

impl Decode for u64 {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::ULONG_0 => Ok(0),
            fc::SMALL_ULONG => Ok(take_u8(buf)? as u64),
            fc::ULONG => take_u64(buf),
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl Encode for i8 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(fc::BYTE);
        buf.put_i8(*self);
    }
}

impl Decode for i8 {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::BYTE => Ok(take_u8(buf)? as i8),
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl Encode for i16 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(fc::SHORT);
        buf.put_i16(*self);
    }
}

impl Decode for i16 {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::SHORT => Ok(take_u16(buf)? as i16),
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl Encode for i32 {
    fn encode(&self, buf: &mut BytesMut) {
        match *self {
            v if v >= i8::MIN as i32 && v <= i8::MAX as i32 => {
                buf.put_u8(fc::SMALL_INT);
                buf.put_i8(v as i8);
            }
            v => {
                buf.put_u8(fc::INT);
                buf.put_i32(v);
            }
        }
    }
}

impl Decode for i32 {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::SMALL_INT => Ok(take_u8(buf)? as i8 as i32),
            fc::INT => Ok(take_u32(buf)? as i32),
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl Encode for i64 {
    fn encode(&self, buf: &mut BytesMut) {
        match *self {
            v if v >= i8::MIN as i64 && v <= i8::MAX as i64 => {
                buf.put_u8(fc::SMALL_LONG);
                buf.put_i8(v as i8);
            }
            v => {
                buf.put_u8(fc::LONG);
                buf.put_i64(v);
            }
        }
    }
}

impl Decode for i64 {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::SMALL_LONG => Ok(take_u8(buf)? as i8 as i64),
            fc::LONG => Ok(take_u64(buf)? as i64),
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl Encode for f32 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(fc::FLOAT);
        buf.put_f32(*self);
    }
}

impl Decode for f32 {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::FLOAT => Ok(f32::from_bits(take_u32(buf)?)),
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl Encode for f64 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(fc::DOUBLE);
        buf.put_f64(*self);
    }
}

impl Decode for f64 {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::DOUBLE => Ok(f64::from_bits(take_u64(buf)?)),
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl Encode for char {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(fc::CHAR);
        buf.put_u32(*self as u32);
    }
}

impl Decode for char {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::CHAR => {
                char::from_u32(take_u32(buf)?).ok_or(DecodeError::InvalidValue("char"))
            }
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl Encode for Timestamp {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(fc::TIMESTAMP);
        buf.put_i64(self.0);
    }
}

impl Decode for Timestamp {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::TIMESTAMP => Ok(Timestamp(take_u64(buf)? as i64)),
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl Encode for Uuid {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(fc::UUID);
        buf.put_slice(&self.0);
    }
}

impl Decode for Uuid {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::UUID => {
                let bytes = take_bytes(buf, 16)?;
                let mut inner = [0u8; 16];
                inner.copy_from_slice(&bytes);
                Ok(Uuid(inner))
            }
            _ => Err(DecodeError::UnexpectedFormatCode(code)),
        }
    }
}

impl Encode for Binary {
    fn encode(&self, buf: &mut BytesMut) {
        if self.len() <= u8::MAX as usize {
            buf.put_u8(fc::VBIN8);
            buf.put_u8(self.len() as u8);
        } else {
            buf.put_u8(fc::VBIN32);
            buf.put_u32(self.len() as u32);
        }
        buf.put_slice(self);
    }
}

impl Decode for Binary {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        let len = match code {
            fc::VBIN8 => take_u8(buf)? as usize,
            fc::VBIN32 => take_u32(buf)? as usize,
            _ => return Err(DecodeError::UnexpectedFormatCode(code)),
        };
        take_bytes(buf, len)
    }
}

impl ArrayElement for Binary {
    fn array_constructor() -> u8 {
        fc::VBIN32
    }

    fn encode_element(&self, buf: &mut BytesMut) {
        buf.put_u32(self.len() as u32);
        buf.put_slice(self);
    }
}

impl Encode for String {
    fn encode(&self, buf: &mut BytesMut) {
        self.as_str().encode(buf)
    }
}

impl Encode for &str {
    fn encode(&self, buf: &mut BytesMut) {
        let bytes = self.as_bytes();
        if bytes.len() <= u8::MAX as usize {
            buf.put_u8(fc::STR8);
            buf.put_u8(bytes.len() as u8);
        } else {
            buf.put_u8(fc::STR32);
            buf.put_u32(bytes.len() as u32);
        }
        buf.put_slice(bytes);
    }
}

impl Decode for String {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        let len = match code {
            fc::STR8 => take_u8(buf)? as usize,
            fc::STR32 => take_u32(buf)? as usize,
            _ => return Err(DecodeError::UnexpectedFormatCode(code)),
        };
        let bytes = take_bytes(buf, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }
}

impl ArrayElement for String {
    fn array_constructor() -> u8 {
        fc::STR32
    }

    fn encode_element(&self, buf: &mut BytesMut) {
        buf.put_u32(self.len() as u32);
        buf.put_slice(self.as_bytes());
    }
}

impl Encode for Symbol {
    fn encode(&self, buf: &mut BytesMut) {
        let bytes = self.0.as_bytes();
        if bytes.len() <= u8::MAX as usize {
            buf.put_u8(fc::SYM8);
            buf.put_u8(bytes.len() as u8);
        } else {
            buf.put_u8(fc::SYM32);
            buf.put_u32(bytes.len() as u32);
        }
        buf.put_slice(bytes);
    }
}

impl Decode for Symbol {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        let len = match code {
            fc::SYM8 => take_u8(buf)? as usize,
            fc::SYM32 => take_u32(buf)? as usize,
            _ => return Err(DecodeError::UnexpectedFormatCode(code)),
        };
        let bytes = take_bytes(buf, len)?;
        let s = String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)?;
        Ok(Symbol(s))
    }
}

impl ArrayElement for Symbol {
    fn array_constructor() -> u8 {
        fc::SYM32
    }

    fn encode_element(&self, buf: &mut BytesMut) {
        buf.put_u32(self.0.len() as u32);
        buf.put_slice(self.0.as_bytes());
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Some(value) => value.encode(buf),
            None => buf.put_u8(fc::NULL),
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match code {
            fc::NULL => Ok(None),
            _ => T::decode_body(code, buf).map(Some),
        }
    }
}

/* ------------------------- variable-size containers ----------------------- */

fn put_compound_header(
    buf: &mut BytesMut,
    body: &[u8],
    count: usize,
    code8: u8,
    code32: u8,
) {
    // size field counts the count field plus the body
    if count <= u8::MAX as usize && body.len() + 1 <= u8::MAX as usize {
        buf.put_u8(code8);
        buf.put_u8((body.len() + 1) as u8);
        buf.put_u8(count as u8);
    } else {
        buf.put_u8(code32);
        buf.put_u32((body.len() + 4) as u32);
        buf.put_u32(count as u32);
    }
    buf.put_slice(body);
}

fn take_compound_body(
    code: u8,
    buf: &mut Bytes,
    code8: u8,
    code32: u8,
) -> Result<(Bytes, usize), DecodeError> {
    let (size, count) = match code {
        c if c == code8 => (take_u8(buf)? as usize, take_u8(buf)? as usize),
        c if c == code32 => (take_u32(buf)? as usize, take_u32(buf)? as usize),
        _ => return Err(DecodeError::UnexpectedFormatCode(code)),
    };
    let count_width = if code == code8 { 1 } else { 4 };
    let body_len = size
        .checked_sub(count_width)
        .ok_or(DecodeError::InvalidLength)?;
    let body = take_bytes(buf, body_len)?;
    Ok((body, count))
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, buf: &mut BytesMut) {
        if self.is_empty() {
            buf.put_u8(fc::LIST0);
            return;
        }
        let mut body = BytesMut::new();
        for item in self {
            item.encode(&mut body);
        }
        put_compound_header(buf, &body, self.len(), fc::LIST8, fc::LIST32);
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        if code == fc::LIST0 {
            return Ok(Vec::new());
        }
        let (mut body, count) = take_compound_body(code, buf, fc::LIST8, fc::LIST32)?;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(T::decode(&mut body)?);
        }
        Ok(items)
    }
}

impl<K, V> Encode for OrderedMap<K, V>
where
    K: Encode,
    V: Encode,
{
    fn encode(&self, buf: &mut BytesMut) {
        let mut body = BytesMut::new();
        for (k, v) in self.0.iter() {
            k.encode(&mut body);
            v.encode(&mut body);
        }
        put_compound_header(buf, &body, self.0.len() * 2, fc::MAP8, fc::MAP32);
    }
}

impl<K, V> Decode for OrderedMap<K, V>
where
    K: Decode + std::hash::Hash + Eq,
    V: Decode,
{
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        let (mut body, count) = take_compound_body(code, buf, fc::MAP8, fc::MAP32)?;
        if count % 2 != 0 {
            return Err(DecodeError::InvalidValue("map"));
        }
        let mut map = OrderedMap::new();
        for _ in 0..count / 2 {
            let key = K::decode(&mut body)?;
            let value = V::decode(&mut body)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<T: ArrayElement> Encode for Array<T> {
    fn encode(&self, buf: &mut BytesMut) {
        let mut body = BytesMut::new();
        body.put_u8(T::array_constructor());
        for item in &self.0 {
            item.encode_element(&mut body);
        }
        put_compound_header(buf, &body, self.0.len(), fc::ARRAY8, fc::ARRAY32);
    }
}

impl<T: Decode> Decode for Array<T> {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        let (mut body, count) = take_compound_body(code, buf, fc::ARRAY8, fc::ARRAY32)?;
        let ctor = take_u8(&mut body)?;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(T::decode_body(ctor, &mut body)?);
        }
        Ok(Array(items))
    }
}

/* ------------------------------- composites ------------------------------- */

/// Writes a described-type descriptor with a numeric code
pub fn encode_descriptor_code(code: u64, buf: &mut BytesMut) {
    buf.put_u8(fc::DESCRIBED);
    code.encode(buf);
}

/// Consumes a described-type header and returns the descriptor
pub fn decode_descriptor(buf: &mut Bytes) -> Result<Descriptor, DecodeError> {
    let code = take_u8(buf)?;
    if code != fc::DESCRIBED {
        return Err(DecodeError::UnexpectedFormatCode(code));
    }
    Descriptor::decode(buf)
}

/// Reads the descriptor code at the head of the buffer without consuming
/// it. Returns `None` if the buffer does not start with a described type.
pub fn peek_descriptor_code(buf: &Bytes) -> Result<Option<u64>, DecodeError> {
    if buf.is_empty() {
        return Err(DecodeError::Truncated);
    }
    if buf[0] != fc::DESCRIBED {
        return Ok(None);
    }
    let mut probe = buf.clone();
    probe.advance(1);
    match Descriptor::decode(&mut probe)? {
        Descriptor::Code(code) => Ok(Some(code)),
        Descriptor::Name(_) => Ok(None),
    }
}

/// Serializes a composite (described list) value field by field.
///
/// Fields are appended in their specification order; trailing null
/// fields are trimmed from the encoded list, as the specification
/// permits for omitted optional fields.
pub struct CompositeEncoder {
    body: BytesMut,
    count: u32,
    pending_nulls: u32,
}

impl CompositeEncoder {
    /// Creates an empty composite list
    pub fn new() -> Self {
        Self {
            body: BytesMut::new(),
            count: 0,
            pending_nulls: 0,
        }
    }

    fn flush_nulls(&mut self) {
        for _ in 0..self.pending_nulls {
            self.body.put_u8(fc::NULL);
            self.count += 1;
        }
        self.pending_nulls = 0;
    }

    /// Appends one field
    pub fn field<T: Encode>(&mut self, value: &T) -> &mut Self {
        self.flush_nulls();
        value.encode(&mut self.body);
        self.count += 1;
        self
    }

    /// Appends one optional field; `None` becomes a null that is
    /// trimmed if no later field follows
    pub fn optional<T: Encode>(&mut self, value: &Option<T>) -> &mut Self {
        match value {
            Some(v) => self.field(v),
            None => {
                self.pending_nulls += 1;
                self
            }
        }
    }

    /// Writes the descriptor and the finished list into `dst`
    pub fn finish(self, descriptor_code: u64, dst: &mut BytesMut) {
        encode_descriptor_code(descriptor_code, dst);
        if self.count == 0 {
            dst.put_u8(fc::LIST0);
        } else {
            put_compound_header(dst, &self.body, self.count as usize, fc::LIST8, fc::LIST32);
        }
    }
}

impl Default for CompositeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Deserializes a composite (described list) value field by field.
///
/// Missing trailing fields read as `None`; unknown extra fields are
/// ignored when the decoder is dropped.
pub struct CompositeDecoder {
    body: Bytes,
    remaining: usize,
}

impl CompositeDecoder {
    /// Consumes the list header following an already-consumed descriptor
    pub fn new(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let code = take_u8(buf)?;
        if code == fc::LIST0 {
            return Ok(Self {
                body: Bytes::new(),
                remaining: 0,
            });
        }
        let (body, count) = take_compound_body(code, buf, fc::LIST8, fc::LIST32)?;
        Ok(Self {
            body,
            remaining: count,
        })
    }

    /// Reads the next field; `None` if the field was null or the list
    /// ended early
    pub fn field<T: Decode>(&mut self) -> Result<Option<T>, DecodeError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        if peek_code(&self.body)? == fc::NULL {
            self.body.advance(1);
            return Ok(None);
        }
        T::decode(&mut self.body).map(Some)
    }

    /// Reads a mandatory field, failing when it is null or absent
    pub fn required<T: Decode>(&mut self, name: &'static str) -> Result<T, DecodeError> {
        self.field()?.ok_or(DecodeError::MandatoryFieldOmitted(name))
    }

    /// Reads an optional field with a protocol-defined default
    pub fn field_or_default<T: Decode + Default>(&mut self) -> Result<T, DecodeError> {
        Ok(self.field()?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: Encode + Decode + PartialEq + std::fmt::Debug>(value: T) {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        let mut bytes = buf.freeze();
        let decoded = T::decode(&mut bytes).unwrap();
        assert_eq!(decoded, value);
        assert!(bytes.is_empty());
    }

    #[test]
    fn uint_width_ladder() {
        let mut buf = BytesMut::new();
        0u32.encode(&mut buf);
        assert_eq!(&buf[..], &[fc::UINT_0]);

        let mut buf = BytesMut::new();
        200u32.encode(&mut buf);
        assert_eq!(&buf[..], &[fc::SMALL_UINT, 200]);

        let mut buf = BytesMut::new();
        1000u32.encode(&mut buf);
        assert_eq!(&buf[..], &[fc::UINT, 0, 0, 0x03, 0xe8]);
    }

    #[test]
    fn decode_accepts_all_widths() {
        let mut bytes = Bytes::from_static(&[fc::UINT, 0, 0, 0, 5]);
        assert_eq!(u32::decode(&mut bytes).unwrap(), 5);

        let mut bytes = Bytes::from_static(&[fc::SMALL_UINT, 5]);
        assert_eq!(u32::decode(&mut bytes).unwrap(), 5);

        let mut bytes = Bytes::from_static(&[fc::UINT_0]);
        assert_eq!(u32::decode(&mut bytes).unwrap(), 0);
    }

    #[test]
    fn primitive_roundtrips() {
        roundtrip(true);
        roundtrip(false);
        roundtrip(0x42u8);
        roundtrip(0xbeefu16);
        roundtrip(u32::MAX);
        roundtrip(u64::MAX);
        roundtrip(-1i8);
        roundtrip(-300i16);
        roundtrip(i32::MIN);
        roundtrip(i64::MIN);
        roundtrip('Ω');
        roundtrip(Timestamp(1_600_000_000_000));
        roundtrip(Uuid([7u8; 16]));
        roundtrip(String::from("hello"));
        roundtrip(String::from_utf8(vec![b'x'; 300]).unwrap());
        roundtrip(Symbol::from("amqp:link:stolen"));
        roundtrip(Binary::from_static(b"payload"));
        roundtrip(Some(17u32));
        roundtrip(Option::<u32>::None);
    }

    #[test]
    fn list_and_map_roundtrips() {
        roundtrip(Vec::<u32>::new());
        roundtrip(vec![1u32, 2, 3]);
        let mut map = OrderedMap::new();
        map.insert(Symbol::from("b"), 2u32);
        map.insert(Symbol::from("a"), 1u32);
        roundtrip(map);
        roundtrip(Array::from(vec![Symbol::from("PLAIN"), Symbol::from("EXTERNAL")]));
    }

    #[test]
    fn truncated_buffer_errors() {
        let mut bytes = Bytes::from_static(&[fc::UINT, 0, 0]);
        assert!(matches!(
            u32::decode(&mut bytes),
            Err(DecodeError::Truncated)
        ));

        let mut bytes = Bytes::from_static(&[fc::STR8, 10, b'a']);
        assert!(matches!(
            String::decode(&mut bytes),
            Err(DecodeError::InvalidLength)
        ));
    }

    #[test]
    fn unknown_format_code_errors() {
        let mut bytes = Bytes::from_static(&[0xff]);
        assert!(u32::decode(&mut bytes).is_err());
    }

    #[test]
    fn composite_trailing_null_trimming() {
        let mut encoder = CompositeEncoder::new();
        encoder
            .field(&String::from("first"))
            .optional(&Option::<u32>::None)
            .optional(&Option::<u32>::None);
        let mut dst = BytesMut::new();
        encoder.finish(0x99, &mut dst);

        let mut bytes = dst.freeze();
        let descriptor = decode_descriptor(&mut bytes).unwrap();
        assert_eq!(descriptor, Descriptor::Code(0x99));
        let mut decoder = CompositeDecoder::new(&mut bytes).unwrap();
        // trailing nulls were trimmed from the encoded list
        assert_eq!(decoder.remaining, 1);
        assert_eq!(
            decoder.required::<String>("first").unwrap(),
            String::from("first")
        );
        // missing trailing fields decode as None
        assert_eq!(decoder.field::<u32>().unwrap(), None);
        assert_eq!(decoder.field::<u32>().unwrap(), None);
    }

    #[test]
    fn composite_interior_null_preserved() {
        let mut encoder = CompositeEncoder::new();
        encoder
            .optional(&Option::<u32>::None)
            .field(&String::from("second"));
        let mut dst = BytesMut::new();
        encoder.finish(0x17, &mut dst);

        let mut bytes = dst.freeze();
        decode_descriptor(&mut bytes).unwrap();
        let mut decoder = CompositeDecoder::new(&mut bytes).unwrap();
        assert_eq!(decoder.field::<u32>().unwrap(), None);
        assert_eq!(
            decoder.required::<String>("second").unwrap(),
            String::from("second")
        );
    }
}
