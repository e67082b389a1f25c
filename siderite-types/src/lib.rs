//! AMQP 1.0 data types and wire codec.
//!
//! This crate implements the AMQP 1.0 type system (primitive encodings,
//! described types, composite lists) and the protocol-defined composite
//! types built on top of it: the performatives, the SASL frame bodies,
//! messaging types, and the transaction extension types.
//!
//! Encoding always picks the smallest valid width for a value; decoding
//! accepts every width variant the specification allows.

pub mod codec;
pub mod definitions;
pub mod format_code;
pub mod messaging;
pub mod performatives;
pub mod primitives;
pub mod sasl;
pub mod states;
pub mod transaction;
pub mod value;

pub use codec::{Decode, DecodeError, Encode};
