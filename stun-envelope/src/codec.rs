// Copyright (C) 2020 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Message codec
//!
//! [`MessageCodec`] combines the structural parsing of a [`Message`] with the caller's
//! configuration: which methods are handled, which attributes are understood and how large a
//! message may be.
//!
//! A codec never holds any per-message state and may be shared between threads.
//!
//! ## Examples
//!
//! ### Reading messages from a stream
//!
//! ```
//! use stun_envelope::codec::MessageCodec;
//! use stun_envelope::message::{Message, StunParseError, BINDING};
//!
//! let codec = MessageCodec::default();
//! let first = codec.encode(&Message::builder_request(BINDING).finish()).unwrap();
//! let second = codec.encode(&Message::builder_indication(BINDING).finish()).unwrap();
//!
//! let mut stream = first.clone();
//! stream.extend_from_slice(&second[..10]);
//!
//! // the first message is available and the second is not complete yet
//! let decoded = codec.decode(&stream).unwrap();
//! assert_eq!(decoded.consumed(), first.len());
//! stream.drain(..decoded.consumed());
//! assert!(matches!(codec.decode(&stream), Err(StunParseError::Incomplete { .. })));
//!
//! stream.extend_from_slice(&second[10..]);
//! let decoded = codec.decode(&stream).unwrap();
//! assert_eq!(decoded.consumed(), second.len());
//! ```

use smallvec::SmallVec;

use crate::attribute::{Attribute, AttributeRegistry, AttributeType, Fingerprint};
use crate::message::{
    Message, MessageHeader, Method, StunParseError, StunWriteError, BINDING, MAGIC_COOKIE,
};

use tracing::{debug, trace, warn};

/// The largest message that can be described by the 16-bit length field
pub const MAX_MESSAGE_SIZE: usize = MessageHeader::LENGTH + u16::MAX as usize;

/// Builder for a [`MessageCodec`]
#[derive(Debug)]
pub struct MessageCodecBuilder {
    supported_methods: Vec<Method>,
    registry: AttributeRegistry,
    max_message_size: usize,
    verify_fingerprint: bool,
}

impl MessageCodecBuilder {
    /// Replace the set of methods that are handled.  Messages with any other method still
    /// decode but are flagged by [`Decoded::is_method_supported`].
    pub fn supported_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.supported_methods = methods.into_iter().collect();
        self
    }

    /// Add a method to the set of handled methods
    pub fn add_supported_method(mut self, method: Method) -> Self {
        if !self.supported_methods.contains(&method) {
            self.supported_methods.push(method);
        }
        self
    }

    /// The [`AttributeRegistry`] consulted for every decoded attribute
    pub fn registry(mut self, registry: AttributeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The largest message (including the header) that will be accepted.  Values larger than
    /// [`MAX_MESSAGE_SIZE`] are clamped.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size.min(MAX_MESSAGE_SIZE);
        self
    }

    /// Validate the FINGERPRINT attribute of every decoded message that contains one
    pub fn verify_fingerprint(mut self, verify: bool) -> Self {
        self.verify_fingerprint = verify;
        self
    }

    /// Build the [`MessageCodec`]
    pub fn build(self) -> MessageCodec {
        MessageCodec {
            supported_methods: self.supported_methods,
            registry: self.registry,
            max_message_size: self.max_message_size,
            verify_fingerprint: self.verify_fingerprint,
        }
    }
}

/// Encodes and decodes complete STUN messages
#[derive(Debug)]
pub struct MessageCodec {
    supported_methods: Vec<Method>,
    registry: AttributeRegistry,
    max_message_size: usize,
    verify_fingerprint: bool,
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The result of a successful [`MessageCodec::decode`]
#[derive(Debug, Clone)]
pub struct Decoded {
    message: Message,
    consumed: usize,
    method_supported: bool,
    unknown_attributes: SmallVec<[AttributeType; 4]>,
}

impl Decoded {
    /// The decoded [`Message`]
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Consume this [`Decoded`] returning the [`Message`]
    pub fn into_message(self) -> Message {
        self.message
    }

    /// The number of bytes from the start of the input that belong to the message
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Whether the method of the message is one the codec was configured to handle
    pub fn is_method_supported(&self) -> bool {
        self.method_supported
    }

    /// Comprehension-required attribute types in the message that the codec's
    /// [`AttributeRegistry`] does not know about, in order of first appearance.
    ///
    /// A request containing any of these should be answered with a 420 (Unknown Attribute)
    /// error response listing them.
    pub fn unknown_attributes(&self) -> &[AttributeType] {
        &self.unknown_attributes
    }
}

impl MessageCodec {
    /// Create a new [`MessageCodecBuilder`]
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::AttributeRegistry;
    /// # use stun_envelope::codec::MessageCodec;
    /// # use stun_envelope::message::{Method, BINDING};
    /// let codec = MessageCodec::builder()
    ///     .add_supported_method(Method::new(0x3))
    ///     .registry(AttributeRegistry::rfc5389())
    ///     .max_message_size(1500)
    ///     .build();
    /// assert!(codec.supports_method(BINDING));
    /// assert!(codec.supports_method(Method::new(0x3)));
    /// assert_eq!(codec.max_message_size(), 1500);
    /// ```
    pub fn builder() -> MessageCodecBuilder {
        MessageCodecBuilder {
            supported_methods: vec![BINDING],
            registry: AttributeRegistry::default(),
            max_message_size: MAX_MESSAGE_SIZE,
            verify_fingerprint: false,
        }
    }

    /// Whether `method` is handled by this codec
    pub fn supports_method(&self, method: Method) -> bool {
        self.supported_methods.contains(&method)
    }

    /// The [`AttributeRegistry`] of this codec
    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    /// The largest message (including the header) that will be accepted
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Quick check for whether `data` starts with a STUN message header.
    ///
    /// Only the top two bits of the type and the magic cookie are inspected.  Data shorter
    /// than 8 bytes is never considered to be STUN.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::codec::MessageCodec;
    /// assert!(MessageCodec::is_stun(&[0x00, 0x01, 0x00, 0x00, 0x21, 0x12, 0xA4, 0x42]));
    /// // RTP
    /// assert!(!MessageCodec::is_stun(&[0x80, 0x01, 0x00, 0x00, 0x21, 0x12, 0xA4, 0x42]));
    /// assert!(!MessageCodec::is_stun(&[0x00, 0x01, 0x00, 0x00, 0x21, 0x12, 0xA4]));
    /// ```
    pub fn is_stun(data: &[u8]) -> bool {
        if data.len() < 8 {
            return false;
        }
        data[0] & 0xc0 == 0 && data[4..8] == MAGIC_COOKIE.to_be_bytes()
    }

    /// The total size of the message at the start of `data` as advertised by its header.
    ///
    /// Only the header is needed.  A stream reader can use this to wait for the complete
    /// message before calling [`decode`](Self::decode).
    ///
    /// # Errors
    ///
    /// - [`StunParseError::Incomplete`] if less than a header is available.
    /// - [`StunParseError::NotStun`] if the data is not a STUN message.
    /// - [`StunParseError::TooLarge`] if the message is larger than
    ///   [`max_message_size`](Self::max_message_size).
    pub fn frame_length(&self, data: &[u8]) -> Result<usize, StunParseError> {
        let header = MessageHeader::from_bytes(data)?;
        let len = MessageHeader::LENGTH + header.data_length() as usize;
        if len > self.max_message_size {
            warn!(
                "message of {len} bytes is larger than the maximum {}",
                self.max_message_size
            );
            return Err(StunParseError::TooLarge {
                expected: self.max_message_size,
                actual: len,
            });
        }
        Ok(len)
    }

    /// Decode the message at the start of `data`
    ///
    /// Attribute values are checked with the codec's [`AttributeRegistry`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::{AttributeRegistry, AttributeType};
    /// # use stun_envelope::codec::MessageCodec;
    /// # use stun_envelope::message::{Message, MessageType, MessageClass, Method};
    /// let mtype = MessageType::from_class_method(MessageClass::Request, Method::new(0x3));
    /// let mut builder = Message::builder(mtype, 0x10.into());
    /// builder.add_raw_attribute(AttributeType::USERNAME, b"user").unwrap();
    /// builder.add_raw_attribute(AttributeType::new(0x7001), &[1]).unwrap();
    /// let data = builder.finish().to_bytes().unwrap();
    ///
    /// let codec = MessageCodec::builder()
    ///     .registry(AttributeRegistry::rfc5389())
    ///     .build();
    /// let decoded = codec.decode(&data).unwrap();
    /// // still parsed, but not handled by this codec
    /// assert!(!decoded.is_method_supported());
    /// assert_eq!(decoded.unknown_attributes(), &[AttributeType::new(0x7001)]);
    /// ```
    #[tracing::instrument(
        name = "codec_decode",
        level = "trace",
        skip(self, data),
        fields(
            data.len = data.len()
        )
    )]
    pub fn decode(&self, data: &[u8]) -> Result<Decoded, StunParseError> {
        self.frame_length(data)?;
        let (message, consumed) = Message::parse(data)?;

        if self.verify_fingerprint && message.has_attribute(Fingerprint::TYPE) {
            Fingerprint::validate(&data[..consumed])?;
        }

        let mut unknown_attributes = SmallVec::<[AttributeType; 4]>::new();
        for attr in message.iter_attributes() {
            let atype = attr.get_type();
            if !self.registry.contains(atype) {
                if atype.comprehension_required() && !unknown_attributes.contains(&atype) {
                    debug!("unknown comprehension-required attribute {atype}");
                    unknown_attributes.push(atype);
                }
                continue;
            }
            self.registry.check(attr).map_err(|e| {
                warn!("attribute {atype} failed its value check: {e}");
                StunParseError::InvalidAttribute(atype)
            })?;
        }

        let method_supported = self.supports_method(message.method());
        if !method_supported {
            debug!("unsupported method {}", message.method());
        }
        trace!("decoded {message} from {consumed} bytes");

        Ok(Decoded {
            message,
            consumed,
            method_supported,
            unknown_attributes,
        })
    }

    /// Encode `msg` into a newly allocated buffer
    ///
    /// # Errors
    ///
    /// [`StunWriteError::MessageTooLarge`] if the message does not fit in the 16-bit length
    /// field or is larger than [`max_message_size`](Self::max_message_size).
    #[tracing::instrument(
        name = "codec_encode",
        level = "trace",
        skip(self, msg),
        fields(
            msg.transaction = %msg.transaction_id(),
        )
    )]
    pub fn encode(&self, msg: &Message) -> Result<Vec<u8>, StunWriteError> {
        let len = msg.wire_len();
        if len > self.max_message_size {
            return Err(StunWriteError::MessageTooLarge {
                expected: self.max_message_size,
                actual: len,
            });
        }
        msg.to_bytes()
    }

    /// Encode `msg` into `dest` returning the number of bytes written
    pub fn encode_into(&self, msg: &Message, dest: &mut [u8]) -> Result<usize, StunWriteError> {
        let len = msg.wire_len();
        if len > self.max_message_size {
            return Err(StunWriteError::MessageTooLarge {
                expected: self.max_message_size,
                actual: len,
            });
        }
        msg.write_into(dest)
    }
}
