// Copyright (C) 2020 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! STUN Attributes
//!
//! The TLV framing of STUN attributes from [RFC5389].  At this layer an attribute is a
//! [`RawAttribute`]: a 16-bit type, a 16-bit length and the value bytes.  Padding to a four
//! byte boundary is skipped when reading and written as zeroes.
//!
//! Giving meaning to the value is left to value codecs.  A value codec is a type implementing
//! [`Attribute`] together with `From<&A> for RawAttribute` and `TryFrom<&RawAttribute>`, and can
//! be added to an [`AttributeRegistry`] so that a [`MessageCodec`](crate::codec::MessageCodec)
//! checks it on decode.
//!
//! [RFC5389]: https://tools.ietf.org/html/rfc5389
//!
//! # Examples
//!
//! A value codec for the 32-bit LIFETIME attribute of TURN:
//!
//! ```
//! # use stun_envelope::prelude::*;
//! use byteorder::{BigEndian, ByteOrder};
//! use stun_envelope::attribute::{Attribute, AttributeRegistry, AttributeType, RawAttribute};
//! use stun_envelope::message::{Message, StunParseError, BINDING};
//!
//! #[derive(Debug)]
//! struct Lifetime(u32);
//!
//! impl Attribute for Lifetime {
//!     const TYPE: AttributeType = AttributeType::new(0x000D);
//!
//!     fn length(&self) -> u16 {
//!         4
//!     }
//! }
//! impl From<&Lifetime> for RawAttribute {
//!     fn from(value: &Lifetime) -> RawAttribute {
//!         RawAttribute::new(Lifetime::TYPE, &value.0.to_be_bytes())
//!     }
//! }
//! impl TryFrom<&RawAttribute> for Lifetime {
//!     type Error = StunParseError;
//!     fn try_from(raw: &RawAttribute) -> Result<Self, Self::Error> {
//!         raw.check_type_and_len(Self::TYPE, 4..=4)?;
//!         Ok(Self(BigEndian::read_u32(raw.value())))
//!     }
//! }
//!
//! let raw = RawAttribute::from(&Lifetime(600));
//! assert_eq!(raw.to_bytes(), [0x00, 0x0D, 0x00, 0x04, 0x00, 0x00, 0x02, 0x58]);
//!
//! let mut builder = Message::builder_request(BINDING);
//! builder.add_attribute(&Lifetime(600)).unwrap();
//! let msg = Message::from_bytes(&builder.finish().to_bytes().unwrap()).unwrap();
//! assert_eq!(msg.attribute::<Lifetime>().unwrap().0, 600);
//!
//! // registered so that a codec checks it
//! let mut registry = AttributeRegistry::rfc5389();
//! registry.register_typed::<Lifetime>("LIFETIME");
//! assert!(registry.check(msg.raw_attribute(Lifetime::TYPE).unwrap()).is_ok());
//! ```

mod fingerprint;
pub use fingerprint::Fingerprint;
mod list;
pub use list::{AttributeIter, AttributeList};
mod registry;
pub use registry::{AttributeCodec, AttributeRegistry, TypedCodec};
mod software;
pub use software::Software;

use crate::message::{StunParseError, StunWriteError};

use byteorder::{BigEndian, ByteOrder};

/// The type of an [`Attribute`] in a STUN [`Message`](crate::message::Message)
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct AttributeType(u16);

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#x}: {})", self.0, self.0, self.name())
    }
}

impl AttributeType {
    /// MAPPED-ADDRESS
    pub const MAPPED_ADDRESS: AttributeType = AttributeType(0x0001);
    /// USERNAME
    pub const USERNAME: AttributeType = AttributeType(0x0006);
    /// MESSAGE-INTEGRITY
    pub const MESSAGE_INTEGRITY: AttributeType = AttributeType(0x0008);
    /// ERROR-CODE
    pub const ERROR_CODE: AttributeType = AttributeType(0x0009);
    /// UNKNOWN-ATTRIBUTES
    pub const UNKNOWN_ATTRIBUTES: AttributeType = AttributeType(0x000A);
    /// REALM
    pub const REALM: AttributeType = AttributeType(0x0014);
    /// NONCE
    pub const NONCE: AttributeType = AttributeType(0x0015);
    /// MESSAGE-INTEGRITY-SHA256
    pub const MESSAGE_INTEGRITY_SHA256: AttributeType = AttributeType(0x001C);
    /// XOR-MAPPED-ADDRESS
    pub const XOR_MAPPED_ADDRESS: AttributeType = AttributeType(0x0020);
    /// SOFTWARE
    pub const SOFTWARE: AttributeType = AttributeType(0x8022);
    /// ALTERNATE-SERVER
    pub const ALTERNATE_SERVER: AttributeType = AttributeType(0x8023);
    /// FINGERPRINT
    pub const FINGERPRINT: AttributeType = AttributeType(0x8028);

    /// The attribute type with code `code`.  Any 16-bit code is accepted.
    ///
    /// # Examples
    /// ```
    /// # use stun_envelope::attribute::AttributeType;
    /// let atype = AttributeType::new(0x8022);
    /// assert_eq!(atype, AttributeType::SOFTWARE);
    /// assert_eq!(atype.value(), 0x8022);
    /// ```
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// The 16-bit type code
    pub fn value(&self) -> u16 {
        self.0
    }

    /// The RFC 5389 name of this type, or "unknown".  Names of other types come from an
    /// [`AttributeRegistry`].
    ///
    /// # Examples
    /// ```
    /// # use stun_envelope::attribute::*;
    /// assert_eq!(Software::TYPE.name(), "SOFTWARE");
    /// assert_eq!(AttributeType::new(0x7777).name(), "unknown");
    /// ```
    pub fn name(self) -> &'static str {
        match self {
            Self::MAPPED_ADDRESS => "MAPPED-ADDRESS",
            Self::USERNAME => "USERNAME",
            Self::MESSAGE_INTEGRITY => "MESSAGE-INTEGRITY",
            Self::ERROR_CODE => "ERROR-CODE",
            Self::UNKNOWN_ATTRIBUTES => "UNKNOWN-ATTRIBUTES",
            Self::REALM => "REALM",
            Self::NONCE => "NONCE",
            Self::MESSAGE_INTEGRITY_SHA256 => "MESSAGE-INTEGRITY-SHA256",
            Self::XOR_MAPPED_ADDRESS => "XOR-MAPPED-ADDRESS",
            Self::SOFTWARE => "SOFTWARE",
            Self::ALTERNATE_SERVER => "ALTERNATE-SERVER",
            Self::FINGERPRINT => "FINGERPRINT",
            _ => "unknown",
        }
    }

    /// Codes in 0x0000..=0x7FFF are comprehension-required: an agent that does not understand
    /// one must not process the message.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::AttributeType;
    /// assert_eq!(AttributeType::new(0x0).comprehension_required(), true);
    /// assert_eq!(AttributeType::new(0x8000).comprehension_required(), false);
    /// ```
    pub fn comprehension_required(self) -> bool {
        self.0 < 0x8000
    }

    /// Whether this attribute covers the bytes that precede it in a message and must therefore
    /// be placed at the end of the attribute list.
    pub fn is_ending(self) -> bool {
        matches!(
            self,
            Self::MESSAGE_INTEGRITY | Self::MESSAGE_INTEGRITY_SHA256 | Self::FINGERPRINT
        )
    }
}
impl From<u16> for AttributeType {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<AttributeType> for u16 {
    fn from(atype: AttributeType) -> Self {
        atype.0
    }
}

/// The four byte header that starts every attribute frame: type code and value length
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AttributeHeader {
    atype: AttributeType,
    length: u16,
}

impl AttributeHeader {
    /// The length of an attribute header
    pub const LENGTH: usize = 4;

    fn parse(data: &[u8]) -> Result<Self, StunParseError> {
        if data.len() < Self::LENGTH {
            return Err(StunParseError::TruncatedAttribute {
                offset: 0,
                expected: Self::LENGTH,
                actual: data.len(),
            });
        }
        let ret = Self {
            atype: BigEndian::read_u16(&data[0..2]).into(),
            length: BigEndian::read_u16(&data[2..4]),
        };
        Ok(ret)
    }

    fn write_into(&self, ret: &mut [u8]) {
        BigEndian::write_u16(&mut ret[0..2], self.atype.into());
        BigEndian::write_u16(&mut ret[2..4], self.length);
    }

    /// The type code
    pub fn get_type(&self) -> AttributeType {
        self.atype
    }

    /// The value length, excluding padding
    pub fn length(&self) -> u16 {
        self.length
    }
}
impl TryFrom<&[u8]> for AttributeHeader {
    type Error = StunParseError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        AttributeHeader::parse(value)
    }
}

/// A value codec for one attribute type
pub trait Attribute: std::fmt::Debug {
    /// The type code this value codec handles
    const TYPE: AttributeType;

    /// Number of value bytes, excluding the attribute header and any padding.
    fn length(&self) -> u16;
}

/// Conversion of a value codec into its frame.  Implemented for every [`Attribute`] with a
/// `From<&A> for RawAttribute` implementation.
pub trait AttributeToRaw: Attribute {
    /// Frame this value
    fn to_raw(&self) -> RawAttribute;
}
impl<T: Attribute> AttributeToRaw for T
where
    RawAttribute: for<'a> From<&'a T>,
{
    fn to_raw(&self) -> RawAttribute {
        RawAttribute::from(self)
    }
}

/// Conversion of a frame into a value codec.  Implemented for every [`Attribute`] with a
/// `TryFrom<&RawAttribute>` implementation.
pub trait AttributeFromRaw<E>: Attribute + for<'a> TryFrom<&'a RawAttribute, Error = E> {
    /// Interpret the value of `raw`
    fn from_raw(raw: &RawAttribute) -> Result<Self, E>
    where
        Self: Sized;
}

impl<E, T: Attribute + for<'a> TryFrom<&'a RawAttribute, Error = E>> AttributeFromRaw<E> for T {
    fn from_raw(raw: &RawAttribute) -> Result<T, E> {
        T::try_from(raw)
    }
}

/// Round `len` up to the next multiple of four
pub(crate) fn padded_attr_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Wire size helpers for attributes
pub trait AttributeExt {
    /// Bytes occupied in a [`Message`](crate::message::Message): header, value and padding.
    fn padded_len(&self) -> usize;
}

impl<A: Attribute> AttributeExt for A {
    fn padded_len(&self) -> usize {
        AttributeHeader::LENGTH + padded_attr_len(self.length() as usize)
    }
}

/// A single TLV framed attribute: the header and the opaque value bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    header: AttributeHeader,
    value: Vec<u8>,
}

impl std::fmt::Display for RawAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let atype = self.get_type();
        if atype == Software::TYPE {
            if let Ok(software) = Software::try_from(self) {
                return write!(f, "{software}");
            }
        } else if atype == Fingerprint::TYPE {
            if let Ok(fingerprint) = Fingerprint::try_from(self) {
                return write!(f, "{fingerprint}");
            }
        }
        write!(f, "{atype} {:02x?}", self.value)
    }
}

impl RawAttribute {
    /// Create a new [`RawAttribute`]
    ///
    /// # Panics
    ///
    /// If `data` is longer than can be described by the 16-bit length field.  Use
    /// [`RawAttribute::try_new`] for untrusted sizes.
    pub fn new(atype: AttributeType, data: &[u8]) -> Self {
        match Self::try_new(atype, data) {
            Ok(raw) => raw,
            Err(_) => panic!("attribute value of {} bytes is too large", data.len()),
        }
    }

    /// Create a new [`RawAttribute`], failing if the value cannot be described by the 16-bit
    /// length field.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::{RawAttribute, AttributeType};
    /// assert!(RawAttribute::try_new(AttributeType::new(1), &[0; 8]).is_ok());
    /// assert!(RawAttribute::try_new(AttributeType::new(1), &vec![0; 0x10000]).is_err());
    /// ```
    pub fn try_new(atype: AttributeType, data: &[u8]) -> Result<Self, StunWriteError> {
        let length = u16::try_from(data.len()).map_err(|_| StunWriteError::OutOfRange {
            value: data.len(),
            min: 0,
            max: u16::MAX as usize,
        })?;
        Ok(Self {
            header: AttributeHeader { atype, length },
            value: data.to_vec(),
        })
    }

    /// Parse one attribute frame from the start of `data` returning the attribute and the
    /// number of bytes it occupies including padding.
    ///
    /// `offset` is only used for error reporting and is the position of `data` within the
    /// enclosing message.
    pub(crate) fn parse_frame(data: &[u8], offset: usize) -> Result<(Self, usize), StunParseError> {
        let header = AttributeHeader::parse(data).map_err(|_| StunParseError::TruncatedAttribute {
            offset,
            expected: AttributeHeader::LENGTH,
            actual: data.len(),
        })?;
        let value_end = AttributeHeader::LENGTH + header.length() as usize;
        let padded_len = AttributeHeader::LENGTH + padded_attr_len(header.length() as usize);
        if padded_len > data.len() {
            return Err(StunParseError::TruncatedAttribute {
                offset,
                expected: padded_len,
                actual: data.len(),
            });
        }
        // padding is skipped without checking its contents
        Ok((
            Self {
                header,
                value: data[AttributeHeader::LENGTH..value_end].to_vec(),
            },
            padded_len,
        ))
    }

    /// Deserialize a `RawAttribute` from bytes.  The data must contain the complete padded
    /// attribute.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::{RawAttribute, AttributeType};
    /// let data = &[0, 1, 0, 2, 5, 6, 0, 0];
    /// let attr = RawAttribute::from_bytes(data).unwrap();
    /// assert_eq!(attr.get_type(), AttributeType::new(1));
    /// assert_eq!(attr.length(), 2);
    /// assert_eq!(attr.value(), &[5, 6]);
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self, StunParseError> {
        Self::parse_frame(data, 0).map(|(attr, _len)| attr)
    }

    /// Serialize a `RawAttribute` to bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::{RawAttribute, AttributeType};
    /// let attr = RawAttribute::new(AttributeType::new(1), &[5, 6]);
    /// assert_eq!(attr.to_bytes(), &[0, 1, 0, 2, 5, 6, 0, 0]);
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut vec = vec![0; self.padded_len()];
        self.write_into_unchecked(&mut vec);
        vec
    }

    /// Write this [`RawAttribute`] into a byte slice.  Returns the number of bytes written.
    pub fn write_into(&self, dest: &mut [u8]) -> Result<usize, StunWriteError> {
        let len = self.padded_len();
        if len > dest.len() {
            return Err(StunWriteError::TooSmall {
                expected: len,
                actual: dest.len(),
            });
        }
        Ok(self.write_into_unchecked(dest))
    }

    // `dest` must hold at least `padded_len()` bytes
    fn write_into_unchecked(&self, dest: &mut [u8]) -> usize {
        let frame_len = self.padded_len();
        let value_end = AttributeHeader::LENGTH + self.value.len();
        self.header.write_into(dest);
        dest[AttributeHeader::LENGTH..value_end].copy_from_slice(&self.value);
        dest[value_end..frame_len].fill(0);
        frame_len
    }

    /// The type code from the frame header
    pub fn get_type(&self) -> AttributeType {
        self.header.get_type()
    }

    /// The frame header
    pub fn header(&self) -> AttributeHeader {
        self.header
    }

    /// The value length from the frame header, excluding padding
    pub fn length(&self) -> u16 {
        self.header.length()
    }

    /// The opaque value bytes, without any padding
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Consume this [`RawAttribute`] returning the value bytes
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    /// Check that this frame is of type `atype` and its value length is in `allowed_range`.
    /// Value codecs call this first in their `TryFrom<&RawAttribute>`.
    pub fn check_type_and_len(
        &self,
        atype: AttributeType,
        allowed_range: impl std::ops::RangeBounds<usize>,
    ) -> Result<(), StunParseError> {
        if self.header.get_type() != atype {
            return Err(StunParseError::WrongAttributeImplementation);
        }
        check_len(self.value.len(), allowed_range)
    }
}

impl AttributeExt for RawAttribute {
    fn padded_len(&self) -> usize {
        AttributeHeader::LENGTH + padded_attr_len(self.length() as usize)
    }
}

fn check_len(
    len: usize,
    allowed_range: impl std::ops::RangeBounds<usize>,
) -> Result<(), StunParseError> {
    use std::ops::Bound;

    let min = match allowed_range.start_bound() {
        Bound::Included(&n) => n,
        Bound::Excluded(&n) => n + 1,
        Bound::Unbounded => 0,
    };
    if len < min {
        return Err(StunParseError::Truncated {
            expected: min,
            actual: len,
        });
    }
    match allowed_range.end_bound() {
        Bound::Included(&max) if len > max => Err(StunParseError::TooLarge {
            expected: max,
            actual: len,
        }),
        Bound::Excluded(&end) if len >= end => Err(StunParseError::TooLarge {
            expected: end.saturating_sub(1),
            actual: len,
        }),
        _ => Ok(()),
    }
}

impl From<RawAttribute> for Vec<u8> {
    fn from(f: RawAttribute) -> Self {
        f.to_bytes()
    }
}
