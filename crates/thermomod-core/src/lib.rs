//! Modbus TCP framing and holding-register codec.
//!
//! `thermomod-core` encodes and decodes the small slice of Modbus that a
//! register-polling sensor needs: MBAP frames, the Read Holding Registers
//! request/response pair and exception responses. Decoding is zero-copy and
//! the crate builds without `std`.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

#[cfg(feature = "std")]
extern crate std;

pub mod encoding;
pub mod error;
pub mod frame;
pub mod pdu;

pub use error::{DecodeError, EncodeError};
