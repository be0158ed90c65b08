// Copyright (C) 2020 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! STUN message envelope
//!
//! Parsing and writing of the [RFC5389] message envelope: the fixed 20 byte header, the
//! interleaved class/method type field, and the TLV framed attribute section.  Attribute values
//! are treated as opaque bytes and handed to pluggable value codecs through the
//! [`attribute::Attribute`] trait and an [`attribute::AttributeRegistry`].
//!
//! [RFC5389]: https://tools.ietf.org/html/rfc5389
//!
//! ## Examples
//!
//! ```
//! use stun_envelope::codec::MessageCodec;
//! use stun_envelope::message::{Message, MessageClass, BINDING};
//!
//! let request = Message::builder_request(BINDING).finish();
//! let codec = MessageCodec::default();
//! let data = codec.encode(&request).unwrap();
//!
//! let decoded = codec.decode(&data).unwrap();
//! assert!(decoded.is_method_supported());
//! assert_eq!(decoded.consumed(), data.len());
//! assert_eq!(decoded.message().class(), MessageClass::Request);
//! assert_eq!(decoded.message().transaction_id(), request.transaction_id());
//! ```

use std::error::Error;
use std::str::FromStr;

pub mod attribute;
pub mod codec;
pub mod message;

/// The transport family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TransportType {
    /// The UDP transport
    Udp,
    /// The TCP transport
    Tcp,
    /// TLS over TCP
    Tls,
}

impl TransportType {
    /// The default STUN port for UDP and TCP.
    pub const DEFAULT_PORT: u16 = 3478;
    /// The default STUN port for TLS.
    pub const DEFAULT_TLS_PORT: u16 = 5349;

    /// The port a STUN server listens on by default for this transport.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::TransportType;
    /// assert_eq!(TransportType::Udp.default_port(), 3478);
    /// assert_eq!(TransportType::Tls.default_port(), 5349);
    /// ```
    pub fn default_port(self) -> u16 {
        match self {
            TransportType::Udp | TransportType::Tcp => Self::DEFAULT_PORT,
            TransportType::Tls => Self::DEFAULT_TLS_PORT,
        }
    }

    /// Whether this transport delivers a byte stream rather than datagrams.  A short read on a
    /// stream may become a complete message once more data arrives.
    pub fn is_stream(self) -> bool {
        !matches!(self, TransportType::Udp)
    }
}

/// Errors when parsing a [`TransportType`]
#[derive(Debug)]
pub enum ParseTransportTypeError {
    /// The string is not one of `UDP`, `TCP` or `TLS`.
    UnknownTransport,
}

impl Error for ParseTransportTypeError {}

impl std::fmt::Display for ParseTransportTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for TransportType {
    type Err = ParseTransportTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UDP" => Ok(TransportType::Udp),
            "TCP" => Ok(TransportType::Tcp),
            "TLS" => Ok(TransportType::Tls),
            _ => Err(ParseTransportTypeError::UnknownTransport),
        }
    }
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            TransportType::Udp => f.pad("UDP"),
            TransportType::Tcp => f.pad("TCP"),
            TransportType::Tls => f.pad("TLS"),
        }
    }
}

pub mod prelude {
    pub use crate::attribute::{Attribute, AttributeExt, AttributeFromRaw, AttributeToRaw};
}
