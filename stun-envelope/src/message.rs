// Copyright (C) 2020 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! STUN Messages
//!
//! Provides types for generating, parsing, and manipulating the STUN message envelope as
//! specified in [RFC5389].
//!
//! A [`Message`] owns its header fields and an [`AttributeList`] of opaque
//! [`RawAttribute`]s.  Converting to a concrete attribute implementation (e.g. [`Software`])
//! is left to the caller.
//!
//! [RFC5389]: https://tools.ietf.org/html/rfc5389
//!
//! ## Examples
//!
//! ### Parse a STUN [`Message`]
//!
//! ```
//! use stun_envelope::attribute::{AttributeType, RawAttribute};
//! use stun_envelope::message::{Message, MessageType, MessageClass, BINDING};
//!
//! let msg_data = [
//!     0x00, 0x01, 0x00, 0x08, // method, class and length
//!     0x21, 0x12, 0xA4, 0x42, // Fixed STUN magic bytes
//!     0x00, 0x00, 0x00, 0x00, // \
//!     0x00, 0x00, 0x00, 0x00, // } transaction ID
//!     0x00, 0x00, 0x73, 0x92, // /
//!     0x80, 0x99, 0x00, 0x03, // unknown comprehension-optional attribute header
//!     0x01, 0x02, 0x03, 0x00  // attribute value and one byte of padding
//! ];
//! let msg = Message::from_bytes(&msg_data).unwrap();
//!
//! // the various parts of a message can be retreived
//! assert_eq!(msg.get_type(), MessageType::from_class_method(MessageClass::Request, BINDING));
//! assert_eq!(msg.transaction_id(), 0x7392.into());
//! assert_eq!(msg.length(), 8);
//!
//! // Attributes are retrieved as raw values.
//! let msg_attr = msg.raw_attribute(AttributeType::new(0x8099)).unwrap();
//! assert_eq!(msg_attr, &RawAttribute::new(AttributeType::new(0x8099), &[1, 2, 3]));
//! ```
//!
//! ### Generating a [`Message`]
//!
//! ```
//! use stun_envelope::attribute::Software;
//! use stun_envelope::message::{Message, BINDING};
//!
//! // Automatically generates a transaction ID.
//! let mut msg = Message::builder_request(BINDING);
//!
//! let software = Software::new("stun").unwrap();
//! msg.add_attribute(&software).unwrap();
//! let msg = msg.finish();
//!
//! let attribute_data = [
//!     0x80, 0x22, 0x00, 0x04, // attribute type (0x8022) and length (0x0004)
//!     0x73, 0x74, 0x75, 0x6E, // s t u n
//! ];
//!
//! let msg_data = msg.to_bytes().unwrap();
//! // ignores the randomly generated transaction id
//! assert_eq!(msg_data[20..], attribute_data);
//! ```

use std::convert::TryFrom;

use byteorder::{BigEndian, ByteOrder};

use crate::attribute::*;

use tracing::{trace, warn};

/// The value of the magic cookie (in network byte order) as specified in RFC5389.
pub const MAGIC_COOKIE: u32 = 0x2112A442;

/// The method in a STUN [`Message`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Method(u16);

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#x}: {})", self.0, self.0, self.name())
    }
}

impl Method {
    /// Create a new [`Method`] from an existing value
    ///
    /// Note: the value passed in is not encoded as in a stun message
    ///
    /// Panics if the value is out of range (>= 0x1000)
    ///
    /// # Examples
    /// ```
    /// # use stun_envelope::message::Method;
    /// assert_eq!(Method::new(0x123).value(), 0x123);
    /// ```
    pub const fn new(val: u16) -> Self {
        if val >= 0x1000 {
            panic!("Method value is out of range!");
        }
        Self(val)
    }

    /// Create a new [`Method`] returning an error if the value does not fit in 12 bits.
    ///
    /// # Examples
    /// ```
    /// # use stun_envelope::message::Method;
    /// assert_eq!(Method::try_new(0xfff).unwrap().value(), 0xfff);
    /// assert!(Method::try_new(0x1000).is_err());
    /// ```
    pub fn try_new(val: u16) -> Result<Self, StunWriteError> {
        if val >= 0x1000 {
            return Err(StunWriteError::OutOfRange {
                value: val as usize,
                min: 0,
                max: 0xfff,
            });
        }
        Ok(Self(val))
    }

    /// Return the integer value of this [`Method`]
    ///
    /// Note: the value returned is not encoded as in a stun message
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Returns a human readable name of this `Method` or "unknown"
    ///
    /// # Examples
    /// ```
    /// # use stun_envelope::message::{Method, BINDING};
    /// assert_eq!(BINDING.name(), "BINDING");
    /// assert_eq!(Method::new(0x3).name(), "unknown");
    /// ```
    pub fn name(self) -> &'static str {
        match self {
            BINDING => "BINDING",
            _ => "unknown",
        }
    }
}

#[cfg(feature = "arbitrary")]
impl<'a> arbitrary::Arbitrary<'a> for Method {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self(u.int_in_range(0..=0xfff)?))
    }
}

/// The value of the binding message type.  Can be used in either a request or an indication
/// message.
pub const BINDING: Method = Method::new(0x0001);

/// Possible errors when parsing a STUN message.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StunParseError {
    /// Not a STUN message.
    #[error("The provided data is not a STUN message")]
    NotStun,
    /// More data is needed before the message can be parsed
    #[error("Not enough data available to parse the message, expected {}, actual {}", .expected, .actual)]
    Incomplete {
        /// The expected number of bytes
        expected: usize,
        /// The encountered number of bytes
        actual: usize,
    },
    /// The message type has the reserved top bits set
    #[error("Invalid message type {:#06x}", .0)]
    MalformedType(u16),
    /// An attribute extends past the end of the message
    #[error("Attribute at offset {} is truncated, expected {}, actual {}", .offset, .expected, .actual)]
    TruncatedAttribute {
        /// The offset of the attribute within the message
        offset: usize,
        /// The expected number of bytes
        expected: usize,
        /// The encountered number of bytes
        actual: usize,
    },
    /// Bytes at the end of the attribute section that cannot form an attribute
    #[error("{} trailing bytes at offset {}", .remaining, .offset)]
    TrailingGarbage {
        /// The offset of the trailing bytes within the message
        offset: usize,
        /// The number of trailing bytes
        remaining: usize,
    },
    /// The value has been truncated
    #[error("Not enough data available to parse the value, expected {}, actual {}", .expected, .actual)]
    Truncated {
        /// The expected number of bytes
        expected: usize,
        /// The encountered number of bytes
        actual: usize,
    },
    /// Too many bytes for this data
    #[error("Too many bytes for this data, expected {}, actual {}", .expected, .actual)]
    TooLarge {
        /// The expected number of bytes
        expected: usize,
        /// The encountered number of bytes
        actual: usize,
    },
    /// An attribute was not found in the message
    #[error("Missing attribute {}", .0)]
    MissingAttribute(AttributeType),
    /// Fingerprint does not match the data.
    #[error("Fingerprint does not match")]
    FingerprintMismatch,
    /// The attribute contains invalid data
    #[error("The attribute contains invalid data")]
    InvalidAttributeData,
    /// A registered attribute codec rejected the attribute
    #[error("Attribute {} was rejected by its codec", .0)]
    InvalidAttribute(AttributeType),
    /// The attribute does not parse this data
    #[error("Cannot parse with this attribute")]
    WrongAttributeImplementation,
}

/// Errors produced when writing a STUN message
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StunWriteError {
    /// The message already has this attribute
    #[error("The attribute already exists in the message")]
    AttributeExists(AttributeType),
    /// The fingerprint attribute already exists. Cannot write any further attributes
    #[error("The message already contains a fingerprint attribute")]
    FingerprintExists,
    /// A message integrity attribute already exists. Cannot write any further attributes
    #[error("The message already contains a message intregrity attribute")]
    MessageIntegrityExists,
    /// The attributes do not fit in the 16-bit length field of the message header
    #[error("The message is too large, maximum {}, actual {}", .expected, .actual)]
    MessageTooLarge {
        /// The maximum number of bytes
        expected: usize,
        /// The encountered number of bytes
        actual: usize,
    },
    /// Too many bytes for this data
    #[error("Too many bytes for this data, expected {}, actual {}", .expected, .actual)]
    TooLarge {
        /// The expeced number of bytes
        expected: usize,
        /// The encountered number of bytes
        actual: usize,
    },
    /// The destination is too small
    #[error("Not enough space available to write the data, expected {}, actual {}", .expected, .actual)]
    TooSmall {
        /// The expected number of bytes
        expected: usize,
        /// The encountered number of bytes
        actual: usize,
    },
    /// Out of range input provided
    #[error("Out of range input provided")]
    OutOfRange {
        /// The value provided.
        value: usize,
        /// The minimum allowed value.
        min: usize,
        /// The maximum allowed value.
        max: usize,
    },
}

/// The class of a [`Message`].
///
/// There are four classes of [`Message`]s within the STUN protocol:
///
///  - [Request][`MessageClass::Request`] indicates that a request is being made and a
///    response is expected.
///  - An [Indication][`MessageClass::Indication`] is a fire and forget [`Message`] where
///    no response is required or expected.
///  - [Success][`MessageClass::Success`] indicates that a [Request][`MessageClass::Request`]
///    was successfully handled.
///  - [Error][`MessageClass::Error`] class indicates that an error was produced.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum MessageClass {
    /// A request that is expecting a response of either Success, or Error.
    Request,
    /// A request that does not expect a response.
    Indication,
    /// A success response to a previous Request.
    Success,
    /// An error response to a previous Request.
    Error,
}

impl MessageClass {
    /// Returns whether this [`MessageClass`] is of a response type.  i.e. is either
    /// [`MessageClass::Success`] or [`MessageClass::Error`].
    pub fn is_response(self) -> bool {
        matches!(self, MessageClass::Success | MessageClass::Error)
    }

    fn to_bits(self) -> u16 {
        match self {
            MessageClass::Request => 0x000,
            MessageClass::Indication => 0x010,
            MessageClass::Success => 0x100,
            MessageClass::Error => 0x110,
        }
    }
}

/// The type of a [`Message`].  A combination of a [`MessageClass`] and a STUN method.
///
/// The two class bits are interleaved with the twelve method bits:
///
/// ```text
///  13 12 11 10  9  8  7  6  5  4  3  2  1  0
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |M |M |M |M |M |C |M |M |M |C |M |M |M |M |
/// |11|10|9 |8 |7 |1 |6 |5 |4 |0 |3 |2 |1 |0 |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MessageType(u16);

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MessageType(class: {:?}, method: {})",
            self.class(),
            self.method(),
        )
    }
}

impl MessageType {
    /// Create a new [`MessageType`] from the provided [`MessageClass`] and method
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::message::{MessageType, MessageClass, BINDING};
    /// let mtype = MessageType::from_class_method(MessageClass::Success, BINDING);
    /// assert_eq!(mtype.value(), 0x0101);
    /// assert_eq!(mtype.has_class(MessageClass::Success), true);
    /// assert_eq!(mtype.has_method(BINDING), true);
    /// ```
    pub fn from_class_method(class: MessageClass, method: Method) -> Self {
        let class_bits = MessageClass::to_bits(class);
        let method = method.value();
        let method_bits = method & 0xf | (method & 0x70) << 1 | (method & 0xf80) << 2;
        Self(class_bits | method_bits)
    }

    /// Decompose a 16-bit message type word.
    ///
    /// # Errors
    ///
    /// [`StunParseError::MalformedType`] if either of the top two bits are set.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::message::{MessageType, MessageClass, BINDING, StunParseError};
    /// let mtype = MessageType::from_value(0x0111).unwrap();
    /// assert_eq!(mtype.class(), MessageClass::Error);
    /// assert_eq!(mtype.method(), BINDING);
    /// assert!(matches!(MessageType::from_value(0x4001), Err(StunParseError::MalformedType(0x4001))));
    /// ```
    pub fn from_value(value: u16) -> Result<Self, StunParseError> {
        if value & 0xc000 != 0 {
            return Err(StunParseError::MalformedType(value));
        }
        Ok(Self(value))
    }

    /// The 16-bit message type word as written in a [`Message`]
    pub fn value(self) -> u16 {
        self.0
    }

    /// Retrieves the class of a [`MessageType`]
    pub fn class(self) -> MessageClass {
        let class = (self.0 & 0x10) >> 4 | (self.0 & 0x100) >> 7;
        match class {
            0x0 => MessageClass::Request,
            0x1 => MessageClass::Indication,
            0x2 => MessageClass::Success,
            0x3 => MessageClass::Error,
            _ => unreachable!(),
        }
    }

    /// Returns whether class of a [`MessageType`] is equal to the provided [`MessageClass`]
    pub fn has_class(self, cls: MessageClass) -> bool {
        self.class() == cls
    }

    /// Returns whether the class of a [`MessageType`] indicates a response [`Message`]
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::message::{MessageType, MessageClass, BINDING};
    /// assert_eq!(MessageType::from_class_method(MessageClass::Indication, BINDING)
    ///     .is_response(), false);
    /// assert_eq!(MessageType::from_class_method(MessageClass::Request, BINDING)
    ///     .is_response(), false);
    /// assert_eq!(MessageType::from_class_method(MessageClass::Success, BINDING)
    ///     .is_response(), true);
    /// assert_eq!(MessageType::from_class_method(MessageClass::Error, BINDING)
    ///     .is_response(), true);
    /// ```
    pub fn is_response(self) -> bool {
        self.class().is_response()
    }

    /// Returns the method of a [`MessageType`]
    pub fn method(self) -> Method {
        Method::new(self.0 & 0xf | (self.0 & 0xe0) >> 1 | (self.0 & 0x3e00) >> 2)
    }

    /// Returns whether the method of a [`MessageType`] is equal to the provided value
    pub fn has_method(self, method: Method) -> bool {
        self.method() == method
    }

    /// Convert a [`MessageType`] to network bytes
    pub fn write_into(&self, dest: &mut [u8]) {
        BigEndian::write_u16(dest, self.0);
    }

    /// Convert a [`MessageType`] to network bytes
    pub fn to_bytes(self) -> Vec<u8> {
        let mut ret = vec![0; 2];
        BigEndian::write_u16(&mut ret[0..2], self.0);
        ret
    }

    /// Convert a set of network bytes into a [`MessageType`] or return an error
    pub fn from_bytes(data: &[u8]) -> Result<Self, StunParseError> {
        if data.len() < 2 {
            return Err(StunParseError::Incomplete {
                expected: 2,
                actual: data.len(),
            });
        }
        let data = BigEndian::read_u16(data);
        if data & 0xc000 != 0x0 {
            /* not a stun packet */
            return Err(StunParseError::NotStun);
        }
        Ok(Self(data))
    }
}
impl TryFrom<&[u8]> for MessageType {
    type Error = StunParseError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        MessageType::from_bytes(value)
    }
}

/// A unique transaction identifier for each message and it's (possible) response.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct TransactionId {
    id: u128,
}

impl TransactionId {
    /// Generate a new random STUN transaction identifier.
    pub fn generate() -> TransactionId {
        use rand::Rng;
        let mut rng = rand::rng();
        rng.random::<u128>().into()
    }

    /// The 12 bytes of this transaction identifier in network order
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::message::TransactionId;
    /// let tid = TransactionId::from(0x0102);
    /// assert_eq!(tid.to_bytes(), [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 2]);
    /// assert_eq!(TransactionId::from(tid.to_bytes()), tid);
    /// ```
    pub fn to_bytes(self) -> [u8; 12] {
        let mut ret = [0; 12];
        BigEndian::write_uint128(&mut ret, self.id, 12);
        ret
    }
}

impl From<u128> for TransactionId {
    fn from(id: u128) -> Self {
        Self {
            id: id & 0xffff_ffff_ffff_ffff_ffff_ffff,
        }
    }
}
impl From<[u8; 12]> for TransactionId {
    fn from(bytes: [u8; 12]) -> Self {
        Self {
            id: BigEndian::read_uint128(&bytes, 12),
        }
    }
}
impl From<TransactionId> for u128 {
    fn from(id: TransactionId) -> Self {
        id.id
    }
}
impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.id)
    }
}

#[cfg(feature = "arbitrary")]
impl<'a> arbitrary::Arbitrary<'a> for TransactionId {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(<u128 as arbitrary::Arbitrary>::arbitrary(u)?.into())
    }
}

/// The fixed length header of a STUN message.  Allows reading the message header for a quick
/// check if this message is a valid STUN message.  Can also be used to expose the length of the
/// complete message without needing to receive the entire message.
#[derive(Debug)]
pub struct MessageHeader {
    mtype: MessageType,
    transaction_id: TransactionId,
    length: u16,
}

impl MessageHeader {
    /// The length of the STUN message header.
    pub const LENGTH: usize = 20;

    /// Deserialize a `MessageHeader`
    ///
    /// The type and magic cookie are checked as soon as enough bytes are available for them,
    /// so data from another protocol is rejected with [`StunParseError::NotStun`] even when it
    /// is shorter than a full header.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::message::{MessageHeader, MessageType, MessageClass, BINDING};
    /// let msg_data = [0, 1, 0, 8, 33, 18, 164, 66, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 232];
    /// let message = MessageHeader::from_bytes(&msg_data).unwrap();
    /// assert_eq!(message.get_type(), MessageType::from_class_method(MessageClass::Request, BINDING));
    /// assert_eq!(message.transaction_id(), 1000.into());
    /// assert_eq!(message.data_length(), 8);
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self, StunParseError> {
        if !data.is_empty() && data[0] & 0xc0 != 0 {
            warn!("message type {:#04x}.. has the top bits set", data[0]);
            return Err(StunParseError::NotStun);
        }
        if data.len() > 4 {
            let end = data.len().min(8);
            let cookie = MAGIC_COOKIE.to_be_bytes();
            if data[4..end] != cookie[..end - 4] {
                warn!(
                    "malformed cookie constant {:#x} != stored data {:02x?}",
                    MAGIC_COOKIE,
                    &data[4..end]
                );
                return Err(StunParseError::NotStun);
            }
        }
        if data.len() < Self::LENGTH {
            return Err(StunParseError::Incomplete {
                expected: Self::LENGTH,
                actual: data.len(),
            });
        }
        let mtype = MessageType::from_bytes(data)?;
        let mlength = BigEndian::read_u16(&data[2..]);
        let tid = BigEndian::read_u128(&data[4..]);

        Ok(Self {
            mtype,
            transaction_id: tid.into(),
            length: mlength,
        })
    }

    /// The number of bytes of content in this [`MessageHeader`]. Adding both `data_length()`
    /// and [`MessageHeader::LENGTH`] will result in the size of the complete STUN message.
    pub fn data_length(&self) -> u16 {
        self.length
    }

    /// The [`TransactionId`] of this [`MessageHeader`]
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// The [`MessageType`] of this [`MessageHeader`]
    pub fn get_type(&self) -> MessageType {
        self.mtype
    }

    fn new(mtype: MessageType, transaction_id: TransactionId, length: u16) -> Self {
        Self {
            mtype,
            transaction_id,
            length,
        }
    }

    fn write_into(&self, dest: &mut [u8]) {
        self.mtype.write_into(&mut dest[..2]);
        let transaction: u128 = self.transaction_id.into();
        let tid = (MAGIC_COOKIE as u128) << 96 | transaction & 0xffff_ffff_ffff_ffff_ffff_ffff;
        BigEndian::write_u128(&mut dest[4..20], tid);
        BigEndian::write_u16(&mut dest[2..4], self.length);
    }
}

/// The largest attribute section that can be described by the message header
const MAX_ATTRIBUTES_LENGTH: usize = u16::MAX as usize;

fn check_attributes_length(len: usize) -> Result<u16, StunWriteError> {
    u16::try_from(len).map_err(|_| StunWriteError::MessageTooLarge {
        expected: MAX_ATTRIBUTES_LENGTH,
        actual: len,
    })
}

/// The structure that encapsulates the entirety of a STUN message
///
/// Contains the [`MessageType`], a transaction ID, and an [`AttributeList`].  The length field
/// of the header is always derived from the attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    mtype: MessageType,
    transaction_id: TransactionId,
    attributes: AttributeList,
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Message(class: {:?}, method: {}, transaction: {}, attributes: ",
            self.class(),
            self.method(),
            self.transaction_id()
        )?;
        write!(f, "[")?;
        for (i, a) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
        }
        write!(f, "]")?;
        write!(f, ")")
    }
}

impl Message {
    /// Create a new [`MessageBuilder`] with the provided [`MessageType`] and transaction ID
    ///
    /// Note you probably want to use one of the other helper constructors instead.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::message::{Message, MessageType, MessageClass, BINDING};
    /// let mtype = MessageType::from_class_method(MessageClass::Indication, BINDING);
    /// let message = Message::builder(mtype, 0.into()).finish();
    /// let message = Message::from_bytes(&message.to_bytes().unwrap()).unwrap();
    /// assert!(message.has_class(MessageClass::Indication));
    /// assert!(message.has_method(BINDING));
    /// ```
    pub fn builder(mtype: MessageType, transaction_id: TransactionId) -> MessageBuilder {
        MessageBuilder {
            message: Message {
                mtype,
                transaction_id,
                attributes: AttributeList::new(),
            },
        }
    }

    /// Create a new request [`Message`] of the provided method with a random transaction ID
    pub fn builder_request(method: Method) -> MessageBuilder {
        Message::builder(
            MessageType::from_class_method(MessageClass::Request, method),
            TransactionId::generate(),
        )
    }

    /// Create a new indication [`Message`] of the provided method with a random transaction ID
    pub fn builder_indication(method: Method) -> MessageBuilder {
        Message::builder(
            MessageType::from_class_method(MessageClass::Indication, method),
            TransactionId::generate(),
        )
    }

    /// Create a new success [`Message`] response from the provided request
    ///
    /// # Panics
    ///
    /// When a non-request [`Message`] is passed as the original input [`Message`]
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::message::{Message, MessageClass, BINDING};
    /// let request = Message::builder_request(BINDING).finish();
    /// let success = Message::builder_success(&request).finish();
    /// assert!(success.has_class(MessageClass::Success));
    /// assert!(success.has_method(BINDING));
    /// assert_eq!(success.transaction_id(), request.transaction_id());
    /// ```
    pub fn builder_success(orig: &Message) -> MessageBuilder {
        if !orig.has_class(MessageClass::Request) {
            panic!(
                "A success response message was attempted to be created from a non-request message"
            );
        }
        Message::builder(
            MessageType::from_class_method(MessageClass::Success, orig.method()),
            orig.transaction_id(),
        )
    }

    /// Create a new error [`Message`] response from the provided request
    ///
    /// # Panics
    ///
    /// When a non-request [`Message`] is passed as the original input [`Message`]
    pub fn builder_error(orig: &Message) -> MessageBuilder {
        if !orig.has_class(MessageClass::Request) {
            panic!(
                "An error response message was attempted to be created from a non-request message"
            );
        }
        Message::builder(
            MessageType::from_class_method(MessageClass::Error, orig.method()),
            orig.transaction_id(),
        )
    }

    /// Continue building on this [`Message`], e.g. to append a FINGERPRINT to a received
    /// message before forwarding it.
    pub fn into_builder(self) -> MessageBuilder {
        MessageBuilder { message: self }
    }

    /// Retrieve the [`MessageType`] of a [`Message`]
    pub fn get_type(&self) -> MessageType {
        self.mtype
    }

    /// Retrieve the [`MessageClass`] of a [`Message`]
    pub fn class(&self) -> MessageClass {
        self.get_type().class()
    }

    /// Returns whether the [`Message`] is of the specified [`MessageClass`]
    pub fn has_class(&self, cls: MessageClass) -> bool {
        self.class() == cls
    }

    /// Returns whether the [`Message`] is a response
    ///
    /// This means that the [`Message`] has a class of either success or error
    pub fn is_response(&self) -> bool {
        self.class().is_response()
    }

    /// Retrieves the method of the [`Message`]
    pub fn method(&self) -> Method {
        self.get_type().method()
    }

    /// Returns whether the [`Message`] is of the specified method
    pub fn has_method(&self, method: Method) -> bool {
        self.method() == method
    }

    /// Retrieves the 96-bit transaction ID of the [`Message`]
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// The magic cookie of the [`Message`].  Always [`MAGIC_COOKIE`].
    pub fn cookie(&self) -> u32 {
        MAGIC_COOKIE
    }

    /// The length of the attribute section as written in the message header
    pub fn length(&self) -> usize {
        self.attributes.total_wire_size()
    }

    /// The length of the complete message when written, including the header
    pub fn wire_len(&self) -> usize {
        MessageHeader::LENGTH + self.length()
    }

    /// The attributes of this [`Message`] in order
    pub fn attributes(&self) -> &AttributeList {
        &self.attributes
    }

    /// Iterate over the attributes of this [`Message`] in order
    pub fn iter_attributes(&self) -> AttributeIter<'_> {
        self.attributes.iter()
    }

    /// Retrieve the first [`RawAttribute`] of the provided type
    pub fn raw_attribute(&self, atype: AttributeType) -> Option<&RawAttribute> {
        self.attributes.find_first(atype)
    }

    /// Retrieve the first attribute of type `A` parsed with its value codec
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::Software;
    /// # use stun_envelope::message::{Message, BINDING};
    /// let mut builder = Message::builder_request(BINDING);
    /// builder.add_attribute(&Software::new("stun").unwrap()).unwrap();
    /// let message = builder.finish();
    /// assert_eq!(message.attribute::<Software>().unwrap().as_str(), "stun");
    /// ```
    pub fn attribute<A: AttributeFromRaw<StunParseError>>(&self) -> Result<A, StunParseError> {
        self.raw_attribute(A::TYPE)
            .ok_or(StunParseError::MissingAttribute(A::TYPE))
            .and_then(|raw| A::from_raw(raw))
    }

    /// Returns whether the message contains an attribute of the provided type
    pub fn has_attribute(&self, atype: AttributeType) -> bool {
        self.attributes.contains(atype)
    }

    /// Deserialize a `Message`
    ///
    /// Only the first `20 + length` bytes of `data` are read.  Use [`Message::parse`] to
    /// retrieve the number of bytes consumed.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::{RawAttribute, AttributeType};
    /// # use stun_envelope::message::{Message, MessageType, MessageClass, BINDING};
    /// let msg_data = vec![0, 1, 0, 8, 33, 18, 164, 66, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 232, 0, 1, 0, 1, 3, 0, 0, 0];
    /// let message = Message::from_bytes(&msg_data).unwrap();
    /// let attr = RawAttribute::new(1.into(), &[3]);
    /// let msg_attr = message.raw_attribute(1.into()).unwrap();
    /// assert_eq!(msg_attr, &attr);
    /// assert_eq!(message.get_type(), MessageType::from_class_method(MessageClass::Request, BINDING));
    /// assert_eq!(message.transaction_id(), 1000.into());
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self, StunParseError> {
        Self::parse(data).map(|(msg, _consumed)| msg)
    }

    /// Deserialize a `Message` from the start of `data` returning the message and the number of
    /// bytes it occupied.
    ///
    /// [`StunParseError::Incomplete`] is returned if `data` does not yet contain the whole
    /// message.  Stream based transports should retain the data and retry once more has
    /// arrived.
    #[tracing::instrument(
        name = "message_from_bytes",
        level = "trace",
        skip(data),
        fields(
            data.len = data.len()
        )
    )]
    pub fn parse(data: &[u8]) -> Result<(Self, usize), StunParseError> {
        let header = MessageHeader::from_bytes(data)?;
        let mlength = header.data_length() as usize;
        let msg_len = mlength + MessageHeader::LENGTH;
        if msg_len > data.len() {
            trace!(
                "advertised size {} is larger than the available data {}",
                msg_len,
                data.len()
            );
            return Err(StunParseError::Incomplete {
                expected: msg_len,
                actual: data.len(),
            });
        }

        let attributes = AttributeList::parse(
            &data[MessageHeader::LENGTH..msg_len],
            MessageHeader::LENGTH,
        )?;

        if let Some(idx) = attributes.position(Fingerprint::TYPE) {
            if idx + 1 < attributes.len() {
                warn!(
                    "{} attributes found after FINGERPRINT",
                    attributes.len() - idx - 1
                );
            }
        }

        let msg = Message {
            mtype: header.get_type(),
            transaction_id: header.transaction_id(),
            attributes,
        };
        trace!("parsed {msg}");
        Ok((msg, msg_len))
    }

    /// Serialize this [`Message`] into a newly allocated buffer
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::message::{Message, MessageType, MessageClass, BINDING};
    /// let mtype = MessageType::from_class_method(MessageClass::Success, BINDING);
    /// let message = Message::builder(mtype, 0.into()).finish();
    /// assert_eq!(
    ///     message.to_bytes().unwrap(),
    ///     [0x01, 0x01, 0x00, 0x00, 0x21, 0x12, 0xA4, 0x42, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
    /// );
    /// ```
    pub fn to_bytes(&self) -> Result<Vec<u8>, StunWriteError> {
        check_attributes_length(self.length())?;
        let mut ret = vec![0; self.wire_len()];
        self.write_into(&mut ret)?;
        Ok(ret)
    }

    /// Serialize this [`Message`] into `dest` returning the number of bytes written
    #[tracing::instrument(
        name = "message_write_into",
        level = "trace",
        skip(self, dest),
        fields(
            msg.transaction = %self.transaction_id(),
            dest.len = dest.len()
        )
    )]
    pub fn write_into(&self, dest: &mut [u8]) -> Result<usize, StunWriteError> {
        let length = check_attributes_length(self.length())?;
        let len = self.wire_len();
        if len > dest.len() {
            return Err(StunWriteError::TooSmall {
                expected: len,
                actual: dest.len(),
            });
        }
        MessageHeader::new(self.mtype, self.transaction_id, length).write_into(dest);
        self.attributes
            .write_into(&mut dest[MessageHeader::LENGTH..len])?;
        trace!("wrote {len} bytes");
        Ok(len)
    }

    fn prefix_with_length(
        &self,
        index: usize,
        covered_len: usize,
    ) -> Result<Vec<u8>, StunWriteError> {
        let length = check_attributes_length(covered_len)?;
        let mut ret = vec![0; MessageHeader::LENGTH + self.attributes.wire_size_before(index)];
        MessageHeader::new(self.mtype, self.transaction_id, length).write_into(&mut ret);
        self.attributes
            .write_prefix_into(index, &mut ret[MessageHeader::LENGTH..])?;
        Ok(ret)
    }

    /// The bytes preceding the attribute at `index` with the header length adjusted to end with
    /// that attribute.  This is the data a FINGERPRINT or MESSAGE-INTEGRITY attribute at `index`
    /// covers once this message is written.  Padding is always zero here, so checking a received
    /// message must use [`Message::covered_bytes`] on the bytes as received instead.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::AttributeType;
    /// # use stun_envelope::message::{Message, MessageType, MessageClass, BINDING};
    /// let mtype = MessageType::from_class_method(MessageClass::Request, BINDING);
    /// let mut builder = Message::builder(mtype, 0.into());
    /// builder.add_raw_attribute(AttributeType::new(0x8001), &[1]).unwrap();
    /// builder.add_raw_attribute(AttributeType::new(0x8002), &[2]).unwrap();
    /// let message = builder.finish();
    ///
    /// let prefix = message.prefix_bytes(1).unwrap();
    /// // header and the first attribute only
    /// assert_eq!(prefix.len(), 20 + 8);
    /// // but the length includes the second attribute
    /// assert_eq!(&prefix[2..4], &[0, 16]);
    /// ```
    pub fn prefix_bytes(&self, index: usize) -> Result<Vec<u8>, StunWriteError> {
        if index >= self.attributes.len() {
            return Err(StunWriteError::OutOfRange {
                value: index,
                min: 0,
                max: self.attributes.len().saturating_sub(1),
            });
        }
        self.prefix_with_length(index, self.attributes.wire_size_before(index + 1))
    }

    /// The bytes of this message with the header length adjusted to include a further
    /// attribute with a value of `value_len` bytes.  This is the data an attribute appended to
    /// this message must cover.
    pub fn pending_prefix_bytes(&self, value_len: u16) -> Result<Vec<u8>, StunWriteError> {
        let pending = AttributeHeader::LENGTH + padded_attr_len(value_len as usize);
        self.prefix_with_length(self.attributes.len(), self.length() + pending)
    }

    /// The received bytes covered by the first attribute of type `atype` in the message at the
    /// start of `data`, together with that attribute.
    ///
    /// The covered bytes are copied exactly as received, padding included, with only the
    /// header length patched to end with the matching attribute.  Use this to check a
    /// FINGERPRINT or MESSAGE-INTEGRITY value of a received message.
    /// [`prefix_bytes`](Self::prefix_bytes) is the equivalent for a message being sent.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::AttributeType;
    /// # use stun_envelope::message::{Message, BINDING};
    /// let mut builder = Message::builder_request(BINDING);
    /// builder.add_raw_attribute(AttributeType::new(0x8001), &[1]).unwrap();
    /// builder.add_raw_attribute(AttributeType::new(0x8002), &[2]).unwrap();
    /// let data = builder.finish().to_bytes().unwrap();
    ///
    /// let (covered, attr) = Message::covered_bytes(&data, AttributeType::new(0x8002)).unwrap();
    /// assert_eq!(attr.value(), &[2]);
    /// assert_eq!(&covered[..2], &data[..2]);
    /// assert_eq!(&covered[2..4], &[0, 16]);
    /// assert_eq!(&covered[4..], &data[4..28]);
    /// ```
    pub fn covered_bytes(
        data: &[u8],
        atype: AttributeType,
    ) -> Result<(Vec<u8>, RawAttribute), StunParseError> {
        let header = MessageHeader::from_bytes(data)?;
        let msg_len = MessageHeader::LENGTH + header.data_length() as usize;
        if msg_len > data.len() {
            return Err(StunParseError::Incomplete {
                expected: msg_len,
                actual: data.len(),
            });
        }
        let mut offset = MessageHeader::LENGTH;
        while offset < msg_len {
            let remaining = msg_len - offset;
            if remaining < AttributeHeader::LENGTH {
                return Err(StunParseError::TrailingGarbage { offset, remaining });
            }
            let (attr, padded_len) = RawAttribute::parse_frame(&data[offset..msg_len], offset)?;
            if attr.get_type() == atype {
                let mut covered = data[..offset].to_vec();
                let length = (offset + padded_len - MessageHeader::LENGTH) as u16;
                BigEndian::write_u16(&mut covered[2..4], length);
                return Ok((covered, attr));
            }
            offset += padded_len;
        }
        Err(StunParseError::MissingAttribute(atype))
    }
}

impl TryFrom<&[u8]> for Message {
    type Error = StunParseError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Message::from_bytes(value)
    }
}

/// Builder for a [`Message`].
///
/// Enforces the placement of the attributes that cover the preceding message bytes:
/// MESSAGE-INTEGRITY, then MESSAGE-INTEGRITY-SHA256, then FINGERPRINT, each at most once and
/// after every other attribute.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    /// The [`MessageType`] of the message being built
    pub fn get_type(&self) -> MessageType {
        self.message.get_type()
    }

    /// The [`TransactionId`] of the message being built
    pub fn transaction_id(&self) -> TransactionId {
        self.message.transaction_id()
    }

    /// The attributes added so far
    pub fn attributes(&self) -> &AttributeList {
        self.message.attributes()
    }

    /// Add an attribute to the end of the message
    ///
    /// # Errors
    ///
    /// - [`StunWriteError::FingerprintExists`] if a FINGERPRINT has already been added.
    /// - [`StunWriteError::MessageIntegrityExists`] if a message integrity attribute has been
    ///   added and `attr` is not allowed after it.
    /// - [`StunWriteError::AttributeExists`] if `attr` is a FINGERPRINT or message integrity
    ///   attribute that is already present.
    /// - [`StunWriteError::MessageTooLarge`] if the attributes would no longer fit in the
    ///   message.
    pub fn add_attribute<A: Attribute>(&mut self, attr: &A) -> Result<(), StunWriteError>
    where
        RawAttribute: for<'a> From<&'a A>,
    {
        self.add_raw(RawAttribute::from(attr))
    }

    /// Add an attribute from its type and value bytes
    pub fn add_raw_attribute(
        &mut self,
        atype: AttributeType,
        value: &[u8],
    ) -> Result<(), StunWriteError> {
        self.add_raw(RawAttribute::try_new(atype, value)?)
    }

    /// Add an already framed [`RawAttribute`]
    pub fn add_raw(&mut self, raw: RawAttribute) -> Result<(), StunWriteError> {
        let atype = raw.get_type();
        self.check_can_add(atype)?;
        check_attributes_length(self.message.length() + raw.padded_len())?;
        trace!("adding attribute {atype}");
        self.message.attributes.push(raw);
        Ok(())
    }

    fn check_can_add(&self, atype: AttributeType) -> Result<(), StunWriteError> {
        let attributes = &self.message.attributes;
        if attributes.contains(Fingerprint::TYPE) {
            if atype == Fingerprint::TYPE {
                return Err(StunWriteError::AttributeExists(atype));
            }
            return Err(StunWriteError::FingerprintExists);
        }
        match atype {
            AttributeType::FINGERPRINT => Ok(()),
            AttributeType::MESSAGE_INTEGRITY_SHA256 => {
                if attributes.contains(atype) {
                    return Err(StunWriteError::AttributeExists(atype));
                }
                Ok(())
            }
            AttributeType::MESSAGE_INTEGRITY => {
                if attributes.contains(atype) {
                    return Err(StunWriteError::AttributeExists(atype));
                }
                if attributes.contains(AttributeType::MESSAGE_INTEGRITY_SHA256) {
                    return Err(StunWriteError::MessageIntegrityExists);
                }
                Ok(())
            }
            _ => {
                if attributes.contains(AttributeType::MESSAGE_INTEGRITY)
                    || attributes.contains(AttributeType::MESSAGE_INTEGRITY_SHA256)
                {
                    return Err(StunWriteError::MessageIntegrityExists);
                }
                Ok(())
            }
        }
    }

    /// Add an attribute whose value is computed over the preceding message bytes.
    ///
    /// `compute` is called with the bytes returned by [`Message::pending_prefix_bytes`] and
    /// must return exactly `value_len` bytes.  This is how a MESSAGE-INTEGRITY HMAC computed by
    /// the caller is added.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::AttributeType;
    /// # use stun_envelope::message::{Message, StunWriteError, BINDING};
    /// let mut builder = Message::builder_request(BINDING);
    /// builder
    ///     .add_computed(AttributeType::MESSAGE_INTEGRITY, 20, |data| {
    ///         // length field already includes the pending attribute
    ///         assert_eq!(&data[2..4], &[0, 24]);
    ///         Ok::<_, StunWriteError>(vec![0xaa; 20])
    ///     })
    ///     .unwrap();
    /// let message = builder.finish();
    /// assert_eq!(message.length(), 24);
    /// ```
    pub fn add_computed<F, E>(
        &mut self,
        atype: AttributeType,
        value_len: u16,
        compute: F,
    ) -> Result<(), E>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, E>,
        E: From<StunWriteError>,
    {
        self.check_can_add(atype)?;
        let data = self.message.pending_prefix_bytes(value_len)?;
        let value = compute(&data)?;
        if value.len() != value_len as usize {
            return Err(StunWriteError::OutOfRange {
                value: value.len(),
                min: value_len as usize,
                max: value_len as usize,
            }
            .into());
        }
        self.add_raw(RawAttribute::try_new(atype, &value)?)?;
        Ok(())
    }

    /// Add a FINGERPRINT attribute covering all of the preceding message bytes
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::{Attribute, Fingerprint, Software};
    /// # use stun_envelope::message::{Message, StunWriteError, BINDING};
    /// let mut builder = Message::builder_request(BINDING);
    /// builder.add_fingerprint().unwrap();
    /// // no attributes may follow the fingerprint
    /// assert!(matches!(
    ///     builder.add_attribute(&Software::new("s").unwrap()),
    ///     Err(StunWriteError::FingerprintExists)
    /// ));
    /// assert!(builder.finish().has_attribute(Fingerprint::TYPE));
    /// ```
    pub fn add_fingerprint(&mut self) -> Result<(), StunWriteError> {
        self.add_computed(Fingerprint::TYPE, 4, |data| {
            Ok(RawAttribute::from(&Fingerprint::from_prefix(data)).into_value())
        })
    }

    /// Finishes and returns the built [`Message`]
    pub fn finish(self) -> Message {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSES: [MessageClass; 4] = [
        MessageClass::Request,
        MessageClass::Indication,
        MessageClass::Success,
        MessageClass::Error,
    ];

    fn reference_encode(class: u16, method: u16) -> u16 {
        (method & 0xF)
            | ((class & 1) << 4)
            | ((method & 0x70) << 1)
            | (((class >> 1) & 1) << 8)
            | ((method & 0xF80) << 2)
    }

    fn header(mtype: u16, length: u16) -> Vec<u8> {
        let mut data = vec![0; 20];
        BigEndian::write_u16(&mut data[0..2], mtype);
        BigEndian::write_u16(&mut data[2..4], length);
        BigEndian::write_u32(&mut data[4..8], MAGIC_COOKIE);
        data[8..20].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        data
    }

    #[test]
    fn msg_type_roundtrip() {
        let _log = crate::tests::test_init_log();
        /* validate that all methods/classes survive a roundtrip */
        for m in 0..=0xfff {
            let m = Method::new(m);
            for (class_bits, c) in CLASSES.into_iter().enumerate() {
                let mtype = MessageType::from_class_method(c, m);
                assert_eq!(mtype.value(), reference_encode(class_bits as u16, m.value()));
                assert_eq!(mtype.value() & 0xc000, 0);
                assert_eq!(mtype.class(), c);
                assert_eq!(mtype.method(), m);
                let bytes = mtype.to_bytes();
                let ptype = MessageType::from_bytes(&bytes).unwrap();
                assert_eq!(mtype, ptype);
                assert_eq!(MessageType::from_value(mtype.value()).unwrap(), mtype);
            }
        }
    }

    #[test]
    fn msg_type_not_stun() {
        let _log = crate::tests::test_init_log();
        assert!(matches!(
            MessageType::from_bytes(&[0xc0, 0x00]),
            Err(StunParseError::NotStun)
        ));
        assert!(matches!(
            MessageType::from_bytes(&[0x00]),
            Err(StunParseError::Incomplete {
                expected: 2,
                actual: 1
            })
        ));
        for word in [0x4000, 0x8000, 0xc000, 0xffff] {
            assert!(matches!(
                MessageType::from_value(word),
                Err(StunParseError::MalformedType(w)) if w == word
            ));
        }
    }

    #[test]
    fn method_range() {
        let _log = crate::tests::test_init_log();
        assert!(matches!(
            Method::try_new(0x1000),
            Err(StunWriteError::OutOfRange {
                value: 0x1000,
                min: 0,
                max: 0xfff
            })
        ));
        assert_eq!(Method::try_new(1).unwrap(), BINDING);
        assert_eq!(BINDING.to_string(), "1(0x1: BINDING)");
    }

    #[test]
    fn transaction_id_bytes() {
        let _log = crate::tests::test_init_log();
        let bytes = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let tid = TransactionId::from(bytes);
        assert_eq!(tid.to_bytes(), bytes);
        assert_eq!(u128::from(tid), 0x0102_0304_0506_0708_090a_0b0c);
        // only 96 bits are kept
        assert_eq!(
            TransactionId::from(u128::MAX),
            TransactionId::from([0xff; 12])
        );
        let tid = TransactionId::generate();
        assert_eq!(u128::from(tid) >> 96, 0);
    }

    #[test]
    fn binding_success_bytes() {
        let _log = crate::tests::test_init_log();
        let mtype = MessageType::from_class_method(MessageClass::Success, BINDING);
        assert_eq!(mtype.value(), 0x0101);
        let msg = Message::builder(mtype, [0; 12].into()).finish();
        let data = msg.to_bytes().unwrap();
        let mut expected = vec![0x01, 0x01, 0x00, 0x00, 0x21, 0x12, 0xA4, 0x42];
        expected.extend_from_slice(&[0; 12]);
        assert_eq!(data, expected);
        assert_eq!(msg.cookie(), MAGIC_COOKIE);

        let parsed = Message::from_bytes(&expected).unwrap();
        assert_eq!(parsed, msg);
        assert_eq!(parsed.length(), 0);
        assert!(parsed.attributes().is_empty());
    }

    #[test]
    fn header_boundaries() {
        let _log = crate::tests::test_init_log();
        let data = header(0x0001, 0);
        assert!(matches!(
            Message::from_bytes(&data[..19]),
            Err(StunParseError::Incomplete {
                expected: 20,
                actual: 19
            })
        ));
        assert!(matches!(
            Message::from_bytes(&[]),
            Err(StunParseError::Incomplete {
                expected: 20,
                actual: 0
            })
        ));
        let (msg, consumed) = Message::parse(&data).unwrap();
        assert_eq!(consumed, 20);
        assert!(msg.attributes().is_empty());
        assert_eq!(
            msg.transaction_id().to_bytes(),
            [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
        );
    }

    #[test]
    fn not_stun_any_length() {
        let _log = crate::tests::test_init_log();
        for top in [0x40, 0x80, 0xc0] {
            let mut data = header(0x0001, 0);
            data[0] |= top;
            for len in 1..=data.len() {
                assert!(matches!(
                    Message::from_bytes(&data[..len]),
                    Err(StunParseError::NotStun)
                ));
            }
        }
        let mut data = header(0x0001, 0);
        data[7] ^= 0x01;
        for len in 8..=data.len() {
            assert!(matches!(
                Message::from_bytes(&data[..len]),
                Err(StunParseError::NotStun)
            ));
        }
        // the differing cookie byte is not available yet
        assert!(matches!(
            Message::from_bytes(&data[..7]),
            Err(StunParseError::Incomplete { .. })
        ));
    }

    #[test]
    fn partial_cookie() {
        let _log = crate::tests::test_init_log();
        let data = header(0x0001, 0);
        for len in 5..8 {
            // a matching cookie prefix needs more data
            assert!(matches!(
                MessageHeader::from_bytes(&data[..len]),
                Err(StunParseError::Incomplete {
                    expected: 20,
                    actual
                }) if actual == len
            ));
            // any mismatching cookie byte is not STUN
            for bad in 4..len {
                let mut data = data.clone();
                data[bad] ^= 0xff;
                assert!(matches!(
                    MessageHeader::from_bytes(&data[..len]),
                    Err(StunParseError::NotStun)
                ));
            }
        }
        assert!(matches!(
            MessageHeader::from_bytes(&[0x00, 0x01, 0x00, 0x00, 0xff]),
            Err(StunParseError::NotStun)
        ));
        assert!(matches!(
            MessageHeader::from_bytes(&[0x00, 0x01, 0x00, 0x00, 0x21, 0xff]),
            Err(StunParseError::NotStun)
        ));
        assert!(matches!(
            MessageHeader::from_bytes(&[0x00, 0x01, 0x00, 0x00, 0x21, 0x12, 0xff]),
            Err(StunParseError::NotStun)
        ));
        // only the type word is visible
        assert!(matches!(
            MessageHeader::from_bytes(&[0x00, 0x01, 0x00, 0x00]),
            Err(StunParseError::Incomplete { .. })
        ));
    }

    #[test]
    fn declared_length_exceeds_data() {
        let _log = crate::tests::test_init_log();
        let mut data = header(0x0001, 8);
        data.extend_from_slice(&[0x80, 0x01, 0x00, 0x01]);
        assert!(matches!(
            Message::from_bytes(&data),
            Err(StunParseError::Incomplete {
                expected: 28,
                actual: 24
            })
        ));
        data.extend_from_slice(&[0x07, 0x00, 0x00, 0x00]);
        let msg = Message::from_bytes(&data).unwrap();
        assert_eq!(msg.raw_attribute(0x8001.into()).unwrap().value(), &[7]);
    }

    #[test]
    fn trailing_data_not_consumed() {
        let _log = crate::tests::test_init_log();
        let mut data = header(0x0011, 4);
        data.extend_from_slice(&[0x80, 0x01, 0x00, 0x00]);
        // start of the next message on a stream
        data.extend_from_slice(&[0x00, 0x01, 0x00]);
        let (msg, consumed) = Message::parse(&data).unwrap();
        assert_eq!(consumed, 24);
        assert_eq!(msg.class(), MessageClass::Indication);
        assert_eq!(msg.attributes().len(), 1);
    }

    #[test]
    fn attribute_padding() {
        let _log = crate::tests::test_init_log();
        let mut data = header(0x0001, 12);
        data.extend_from_slice(&[0x80, 0x01, 0x00, 0x05, 1, 2, 3, 4, 5, 0xde, 0xad, 0xbe]);
        data.extend_from_slice(&[0x80, 0x02, 0x00, 0x00]);
        let mut msg_len = data.len() as u16 - 20;
        BigEndian::write_u16(&mut data[2..4], msg_len);
        let msg = Message::from_bytes(&data).unwrap();
        assert_eq!(msg.attributes().len(), 2);
        let attr = msg.attributes().get(0).unwrap();
        assert_eq!(attr.value(), &[1, 2, 3, 4, 5]);
        assert_eq!(attr.padded_len(), 12);
        assert_eq!(msg.attributes().get(1).unwrap().get_type(), 0x8002.into());

        // pad contents do not change the value, and are written back as zero
        data[29..32].copy_from_slice(&[0, 0, 0]);
        let msg2 = Message::from_bytes(&data).unwrap();
        assert_eq!(msg, msg2);
        assert_eq!(msg.to_bytes().unwrap(), data);

        // dropping the second attribute from the length leaves the first intact
        msg_len -= 4;
        BigEndian::write_u16(&mut data[2..4], msg_len);
        let msg3 = Message::from_bytes(&data).unwrap();
        assert_eq!(msg3.attributes().len(), 1);
    }

    #[test]
    fn attribute_section_errors() {
        let _log = crate::tests::test_init_log();
        // length too short for another attribute header
        let mut data = header(0x0001, 6);
        data.extend_from_slice(&[0x80, 0x01, 0x00, 0x00, 0xff, 0xff]);
        assert!(matches!(
            Message::from_bytes(&data),
            Err(StunParseError::TrailingGarbage {
                offset: 24,
                remaining: 2
            })
        ));

        // attribute runs past the declared length
        let mut data = header(0x0001, 8);
        data.extend_from_slice(&[0x80, 0x01, 0x00, 0x08, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(matches!(
            Message::from_bytes(&data),
            Err(StunParseError::TruncatedAttribute {
                offset: 20,
                expected: 12,
                actual: 8
            })
        ));
    }

    #[test]
    fn unknown_attributes_kept() {
        let _log = crate::tests::test_init_log();
        for atype in [0x7f01, 0xbeef] {
            let mut data = header(0x0001, 8);
            data.extend_from_slice(&[0, 0, 0x00, 0x03, 0xa, 0xb, 0xc, 0x0]);
            BigEndian::write_u16(&mut data[20..22], atype);
            let msg = Message::from_bytes(&data).unwrap();
            let raw = msg.raw_attribute(atype.into()).unwrap();
            assert_eq!(raw.value(), &[0xa, 0xb, 0xc]);
            assert_eq!(msg.to_bytes().unwrap(), data);
        }
    }

    #[test]
    fn msg_roundtrip() {
        let _log = crate::tests::test_init_log();
        /* validate that all methods/classes survive a roundtrip */
        for m in (0x009..0x4ff).step_by(0x123) {
            let m = Method::new(m);
            for c in CLASSES {
                let mtype = MessageType::from_class_method(c, m);
                for tid in (0x18u128..0xff_ffff_ffff_ffff_ffff).step_by(0xfedc_ba98_7654_3210) {
                    let mut msg = Message::builder(mtype, tid.into());
                    let attr = RawAttribute::new(1.into(), &[3]);
                    msg.add_raw(attr.clone()).unwrap();
                    msg.add_raw_attribute(0x8010.into(), &[4; 7]).unwrap();
                    msg.add_raw_attribute(1.into(), &[]).unwrap();
                    let msg = msg.finish();
                    let data = msg.to_bytes().unwrap();
                    assert_eq!(data.len(), msg.wire_len());
                    assert_eq!(BigEndian::read_u16(&data[2..4]) as usize, msg.length());

                    let parsed = Message::from_bytes(&data).unwrap();
                    assert_eq!(parsed, msg);
                    assert_eq!(parsed.raw_attribute(1.into()).unwrap(), &attr);
                    assert_eq!(parsed.get_type(), mtype);
                    assert_eq!(parsed.transaction_id(), tid.into());
                    assert_eq!(parsed.length(), 8 + 12 + 4);
                    let types = parsed
                        .iter_attributes()
                        .map(|a| a.get_type().value())
                        .collect::<Vec<_>>();
                    assert_eq!(types, [1, 0x8010, 1]);
                }
            }
        }
    }

    #[test]
    fn response_echoes_transaction() {
        let _log = crate::tests::test_init_log();
        let request = Message::builder_request(BINDING).finish();
        let error = Message::builder_error(&request).finish();
        assert_eq!(error.class(), MessageClass::Error);
        assert_eq!(error.method(), BINDING);
        assert_eq!(error.transaction_id(), request.transaction_id());
        let indication = Message::builder_indication(BINDING).finish();
        assert_eq!(indication.class(), MessageClass::Indication);
        assert!(!indication.is_response());
    }

    #[test]
    #[should_panic]
    fn success_from_indication() {
        let indication = Message::builder_indication(BINDING).finish();
        let _ = Message::builder_success(&indication);
    }

    #[test]
    fn write_into_short_destination() {
        let _log = crate::tests::test_init_log();
        const LEN: usize = MessageHeader::LENGTH + 8;
        let mut msg = Message::builder_request(BINDING);
        msg.add_attribute(&Software::new("s").unwrap()).unwrap();
        let msg = msg.finish();
        let mut data = [0; LEN - 1];
        assert!(
            matches!(msg.write_into(&mut data), Err(StunWriteError::TooSmall { expected, actual }) if expected == LEN && actual == LEN - 1)
        );
        let mut data = [0; LEN + 3];
        assert_eq!(msg.write_into(&mut data).unwrap(), LEN);
        assert_eq!(Message::from_bytes(&data).unwrap(), msg);
    }

    #[test]
    fn message_too_large() {
        let _log = crate::tests::test_init_log();
        let mut builder = Message::builder_request(BINDING);
        builder
            .add_raw_attribute(0x8001.into(), &[0; 40000])
            .unwrap();
        assert!(matches!(
            builder.add_raw_attribute(0x8002.into(), &[0; 40000]),
            Err(StunWriteError::MessageTooLarge {
                expected: 0xffff,
                actual: 80008
            })
        ));

        // bypass the builder to check the write path
        let mut attributes = AttributeList::new();
        attributes.append(0x8001.into(), &[0; 40000]).unwrap();
        attributes.append(0x8002.into(), &[0; 40000]).unwrap();
        let msg = Message {
            mtype: MessageType::from_class_method(MessageClass::Request, BINDING),
            transaction_id: 0.into(),
            attributes,
        };
        assert!(matches!(
            msg.to_bytes(),
            Err(StunWriteError::MessageTooLarge { .. })
        ));
        let mut dest = vec![0; 90000];
        assert!(matches!(
            msg.write_into(&mut dest),
            Err(StunWriteError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn ending_attribute_order() {
        let _log = crate::tests::test_init_log();
        let software = Software::new("s").unwrap();
        let mut builder = Message::builder_request(BINDING);
        builder.add_attribute(&software).unwrap();
        builder
            .add_raw_attribute(AttributeType::MESSAGE_INTEGRITY, &[0; 20])
            .unwrap();
        assert!(matches!(
            builder.add_attribute(&software),
            Err(StunWriteError::MessageIntegrityExists)
        ));
        assert!(matches!(
            builder.add_raw_attribute(AttributeType::MESSAGE_INTEGRITY, &[0; 20]),
            Err(StunWriteError::AttributeExists(AttributeType::MESSAGE_INTEGRITY))
        ));
        builder
            .add_raw_attribute(AttributeType::MESSAGE_INTEGRITY_SHA256, &[0; 32])
            .unwrap();
        assert!(matches!(
            builder.add_raw_attribute(AttributeType::MESSAGE_INTEGRITY_SHA256, &[0; 32]),
            Err(StunWriteError::AttributeExists(
                AttributeType::MESSAGE_INTEGRITY_SHA256
            ))
        ));
        builder.add_fingerprint().unwrap();
        assert!(matches!(
            builder.add_fingerprint(),
            Err(StunWriteError::AttributeExists(AttributeType::FINGERPRINT))
        ));
        assert!(matches!(
            builder.add_raw_attribute(AttributeType::MESSAGE_INTEGRITY, &[0; 20]),
            Err(StunWriteError::FingerprintExists)
        ));
        let msg = builder.finish();
        let types = msg.iter_attributes().map(|a| a.get_type()).collect::<Vec<_>>();
        assert_eq!(
            types,
            [
                Software::TYPE,
                AttributeType::MESSAGE_INTEGRITY,
                AttributeType::MESSAGE_INTEGRITY_SHA256,
                AttributeType::FINGERPRINT
            ]
        );

        // sha256 integrity may not be followed by sha1 integrity
        let mut builder = Message::builder_request(BINDING);
        builder
            .add_raw_attribute(AttributeType::MESSAGE_INTEGRITY_SHA256, &[0; 32])
            .unwrap();
        assert!(matches!(
            builder.add_raw_attribute(AttributeType::MESSAGE_INTEGRITY, &[0; 20]),
            Err(StunWriteError::MessageIntegrityExists)
        ));
    }

    #[test]
    fn fingerprint() {
        let _log = crate::tests::test_init_log();
        let mut msg = Message::builder_request(BINDING);
        let software = Software::new("s").unwrap();
        msg.add_attribute(&software).unwrap();
        msg.add_fingerprint().unwrap();
        let bytes = msg.finish().to_bytes().unwrap();
        let new_msg = Message::from_bytes(&bytes).unwrap();
        Fingerprint::validate(&bytes).unwrap();
        assert_eq!(new_msg.attribute::<Software>().unwrap().as_str(), "s");
        assert_eq!(new_msg.attributes().wire_size_before(1), 8);

        // the fingerprint covers the header and every preceding attribute
        let fingerprint = new_msg.attribute::<Fingerprint>().unwrap();
        let (mut covered, raw) = Message::covered_bytes(&bytes, Fingerprint::TYPE).unwrap();
        assert_eq!(covered, &bytes[..28]);
        assert_eq!(raw.value(), &bytes[32..36]);
        assert_eq!(BigEndian::read_u16(&covered[2..4]), 16);
        assert_eq!(Fingerprint::from_prefix(&covered), fingerprint);
        assert_eq!(covered, new_msg.prefix_bytes(1).unwrap());

        // every covered byte matters, including the padding of SOFTWARE
        for i in 0..28 {
            let mut corrupt = bytes.clone();
            corrupt[i] ^= 0x02;
            assert!(Fingerprint::validate(&corrupt).is_err(), "byte {i}");
        }
        for i in 25..28 {
            let mut corrupt = bytes.clone();
            corrupt[i] = 0xff;
            assert!(Message::from_bytes(&corrupt).is_ok());
            assert!(matches!(
                Fingerprint::validate(&corrupt),
                Err(StunParseError::FingerprintMismatch)
            ));
        }

        // a different length field changes the fingerprint
        covered[3] = 12;
        assert_ne!(Fingerprint::from_prefix(&covered), fingerprint);
    }

    #[test]
    fn covered_bytes_errors() {
        let _log = crate::tests::test_init_log();
        let mut data = header(0x0001, 8);
        data.extend_from_slice(&[0x80, 0x01, 0x00, 0x01, 0x07, 0x00, 0x00, 0x00]);
        assert!(matches!(
            Message::covered_bytes(&data, Fingerprint::TYPE),
            Err(StunParseError::MissingAttribute(AttributeType::FINGERPRINT))
        ));
        assert!(matches!(
            Message::covered_bytes(&data[..24], Fingerprint::TYPE),
            Err(StunParseError::Incomplete {
                expected: 28,
                actual: 24
            })
        ));
        let (covered, raw) = Message::covered_bytes(&data, AttributeType::new(0x8001)).unwrap();
        assert_eq!(covered, &data[..20]);
        assert_eq!(raw.value(), &[7]);

        // frames that do not fill the declared length
        let mut data = header(0x0001, 10);
        data.extend_from_slice(&[0x80, 0x01, 0x00, 0x01, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert!(matches!(
            Message::covered_bytes(&data, Fingerprint::TYPE),
            Err(StunParseError::TrailingGarbage {
                offset: 28,
                remaining: 2
            })
        ));
    }

    #[test]
    fn missing_fingerprint() {
        let _log = crate::tests::test_init_log();
        let msg = Message::builder_request(BINDING).finish();
        assert!(matches!(
            Fingerprint::validate(&msg.to_bytes().unwrap()),
            Err(StunParseError::MissingAttribute(AttributeType::FINGERPRINT))
        ));
        assert!(matches!(
            msg.attribute::<Software>(),
            Err(StunParseError::MissingAttribute(Software::TYPE))
        ));
    }

    #[test]
    fn prefix_bytes() {
        let _log = crate::tests::test_init_log();
        let mtype = MessageType::from_class_method(MessageClass::Request, BINDING);
        let mut builder = Message::builder(mtype, 0x42.into());
        builder.add_raw_attribute(0x8001.into(), &[1, 2, 3, 4, 5]).unwrap();
        builder.add_raw_attribute(0x8002.into(), &[6]).unwrap();
        let msg = builder.finish();
        let full = msg.to_bytes().unwrap();

        let prefix = msg.prefix_bytes(0).unwrap();
        assert_eq!(prefix.len(), 20);
        assert_eq!(BigEndian::read_u16(&prefix[2..4]), 12);
        assert_eq!(&prefix[4..], &full[4..20]);

        let prefix = msg.prefix_bytes(1).unwrap();
        assert_eq!(prefix.len(), 32);
        assert_eq!(BigEndian::read_u16(&prefix[2..4]), 20);
        assert_eq!(&prefix[20..], &full[20..32]);

        assert!(matches!(
            msg.prefix_bytes(2),
            Err(StunWriteError::OutOfRange {
                value: 2,
                min: 0,
                max: 1
            })
        ));

        let pending = msg.pending_prefix_bytes(5).unwrap();
        assert_eq!(&pending[..2], &full[..2]);
        assert_eq!(BigEndian::read_u16(&pending[2..4]), 20 + 12);
        assert_eq!(&pending[4..], &full[4..]);
        // no side effects on the message
        assert_eq!(msg.to_bytes().unwrap(), full);
    }

    #[test]
    fn computed_value_length() {
        let _log = crate::tests::test_init_log();
        let mut builder = Message::builder_request(BINDING);
        let res = builder.add_computed(AttributeType::MESSAGE_INTEGRITY, 20, |_data| {
            Ok::<_, StunWriteError>(vec![0; 19])
        });
        assert!(matches!(
            res,
            Err(StunWriteError::OutOfRange {
                value: 19,
                min: 20,
                max: 20
            })
        ));
        assert!(builder.attributes().is_empty());
    }

    #[test]
    fn forward_with_fingerprint() {
        let _log = crate::tests::test_init_log();
        let mut data = header(0x0001, 8);
        data.extend_from_slice(&[0x80, 0x55, 0x00, 0x02, 0x01, 0x02, 0x00, 0x00]);
        let msg = Message::from_bytes(&data).unwrap();
        let mut builder = msg.into_builder();
        builder.add_fingerprint().unwrap();
        let forwarded = builder.finish().to_bytes().unwrap();
        assert_eq!(&forwarded[4..28], &data[4..28]);
        assert_eq!(BigEndian::read_u16(&forwarded[2..4]), 16);
        Message::from_bytes(&forwarded).unwrap();
        Fingerprint::validate(&forwarded).unwrap();
    }

    #[test]
    fn display() {
        let _log = crate::tests::test_init_log();
        let mut builder = Message::builder(
            MessageType::from_class_method(MessageClass::Request, BINDING),
            0x10.into(),
        );
        builder.add_attribute(&Software::new("s").unwrap()).unwrap();
        builder.add_raw_attribute(0x8123.into(), &[1]).unwrap();
        let msg = builder.finish();
        let s = msg.to_string();
        assert!(s.starts_with("Message(class: Request, method: 1(0x1: BINDING), transaction: 0x10"));
        assert!(s.contains("'s'"));
    }
}
