// Copyright (C) 2020 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Table of attribute value codecs
//!
//! A [`MessageCodec`](crate::codec::MessageCodec) consults an [`AttributeRegistry`] to decide
//! which attributes in a message are understood.  The registry is a plain value that is built
//! once and passed to the codec; there is no process wide registration.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use crate::message::StunParseError;

use super::{Attribute, AttributeFromRaw, AttributeType, Fingerprint, RawAttribute, Software};

/// A value codec for a single attribute type.
pub trait AttributeCodec: std::fmt::Debug + Send + Sync {
    /// Human readable name of the attribute
    fn name(&self) -> &'static str;

    /// Check that the value of `raw` is acceptable for this attribute.
    fn check(&self, raw: &RawAttribute) -> Result<(), StunParseError>;
}

/// An [`AttributeCodec`] that checks values by parsing them into a concrete [`Attribute`]
pub struct TypedCodec<A> {
    name: &'static str,
    _attr: PhantomData<fn() -> A>,
}

impl<A> TypedCodec<A> {
    /// Construct a new [`TypedCodec`] with the provided name
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            _attr: PhantomData,
        }
    }
}

impl<A> std::fmt::Debug for TypedCodec<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedCodec")
            .field("name", &self.name)
            .finish()
    }
}

impl<A: AttributeFromRaw<StunParseError>> AttributeCodec for TypedCodec<A> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn check(&self, raw: &RawAttribute) -> Result<(), StunParseError> {
        A::from_raw(raw).map(|_| ())
    }
}

/// Accepts any value.  Used for attributes that are known by name only.
#[derive(Debug)]
struct OpaqueCodec(&'static str);

impl AttributeCodec for OpaqueCodec {
    fn name(&self) -> &'static str {
        self.0
    }

    fn check(&self, _raw: &RawAttribute) -> Result<(), StunParseError> {
        Ok(())
    }
}

/// Mapping of [`AttributeType`] to [`AttributeCodec`].
///
/// # Examples
///
/// ```
/// # use stun_envelope::attribute::*;
/// let mut registry = AttributeRegistry::new();
/// registry.register_typed::<Software>("SOFTWARE");
/// assert!(registry.contains(Software::TYPE));
/// assert_eq!(registry.name(Software::TYPE), Some("SOFTWARE"));
///
/// let raw = RawAttribute::new(Software::TYPE, &[0xff]);
/// assert!(registry.check(&raw).is_err());
/// ```
#[derive(Debug, Default)]
pub struct AttributeRegistry {
    codecs: BTreeMap<AttributeType, Box<dyn AttributeCodec>>,
}

impl AttributeRegistry {
    /// Construct a new empty [`AttributeRegistry`]
    pub fn new() -> Self {
        Self::default()
    }

    /// An [`AttributeRegistry`] containing every attribute defined in RFC5389.  SOFTWARE and
    /// FINGERPRINT values are checked, all other values are accepted as is.
    pub fn rfc5389() -> Self {
        let mut ret = Self::new();
        for atype in [
            AttributeType::MAPPED_ADDRESS,
            AttributeType::USERNAME,
            AttributeType::MESSAGE_INTEGRITY,
            AttributeType::ERROR_CODE,
            AttributeType::UNKNOWN_ATTRIBUTES,
            AttributeType::REALM,
            AttributeType::NONCE,
            AttributeType::XOR_MAPPED_ADDRESS,
            AttributeType::ALTERNATE_SERVER,
        ] {
            ret.register(atype, Box::new(OpaqueCodec(atype.name())));
        }
        ret.register_typed::<Software>(Software::TYPE.name());
        ret.register_typed::<Fingerprint>(Fingerprint::TYPE.name());
        ret
    }

    /// Add a codec for `atype`, replacing any existing codec
    pub fn register(&mut self, atype: AttributeType, codec: Box<dyn AttributeCodec>) {
        self.codecs.insert(atype, codec);
    }

    /// Add a [`TypedCodec`] for the attribute `A`
    pub fn register_typed<A>(&mut self, name: &'static str)
    where
        A: AttributeFromRaw<StunParseError> + 'static,
    {
        self.register(A::TYPE, Box::new(TypedCodec::<A>::new(name)));
    }

    /// Whether a codec exists for `atype`
    pub fn contains(&self, atype: AttributeType) -> bool {
        self.codecs.contains_key(&atype)
    }

    /// The registered name of `atype`
    pub fn name(&self, atype: AttributeType) -> Option<&'static str> {
        self.codecs.get(&atype).map(|codec| codec.name())
    }

    /// Check `raw` with its registered codec.  Attributes without a codec always pass.
    pub fn check(&self, raw: &RawAttribute) -> Result<(), StunParseError> {
        match self.codecs.get(&raw.get_type()) {
            Some(codec) => codec.check(raw),
            None => Ok(()),
        }
    }

    /// The registered attribute types in ascending order
    pub fn types(&self) -> impl Iterator<Item = AttributeType> + '_ {
        self.codecs.keys().copied()
    }
}
