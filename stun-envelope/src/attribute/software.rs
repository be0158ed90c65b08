// Copyright (C) 2020 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::convert::TryFrom;

use crate::message::{StunParseError, StunWriteError};

use super::{Attribute, AttributeType, RawAttribute};

/// The SOFTWARE [`Attribute`]: a textual description of the implementation that sent a
/// message.
///
/// The description is limited to 127 characters and, as UTF-8, to 763 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Software(String);

impl Attribute for Software {
    const TYPE: AttributeType = AttributeType::SOFTWARE;

    fn length(&self) -> u16 {
        self.0.len() as u16
    }
}

impl From<&Software> for RawAttribute {
    fn from(value: &Software) -> RawAttribute {
        RawAttribute::new(Software::TYPE, value.0.as_bytes())
    }
}

impl TryFrom<&RawAttribute> for Software {
    type Error = StunParseError;

    fn try_from(raw: &RawAttribute) -> Result<Self, Self::Error> {
        raw.check_type_and_len(Self::TYPE, ..=Self::MAX_BYTES)?;
        let text =
            std::str::from_utf8(raw.value()).map_err(|_| StunParseError::InvalidAttributeData)?;
        let chars = text.chars().count();
        if chars > Self::MAX_CHARS {
            return Err(StunParseError::TooLarge {
                expected: Self::MAX_CHARS,
                actual: chars,
            });
        }
        Ok(Self(text.to_owned()))
    }
}

impl Software {
    /// The maximum number of characters in a description
    pub const MAX_CHARS: usize = 127;
    const MAX_BYTES: usize = 763;

    /// A SOFTWARE attribute describing `description`
    ///
    /// # Errors
    ///
    /// [`StunWriteError::TooLarge`] if `description` has more than
    /// [`MAX_CHARS`](Self::MAX_CHARS) characters.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::Software;
    /// let software = Software::new("stun-envelope 0.1").unwrap();
    /// assert_eq!(software.as_str(), "stun-envelope 0.1");
    /// assert!(Software::new("x".repeat(128)).is_err());
    /// ```
    pub fn new(description: impl Into<String>) -> Result<Self, StunWriteError> {
        let description = description.into();
        let chars = description.chars().count();
        if chars > Self::MAX_CHARS {
            return Err(StunWriteError::TooLarge {
                expected: Self::MAX_CHARS,
                actual: chars,
            });
        }
        Ok(Self(description))
    }

    /// The description
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Software {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: '{}'", Self::TYPE, self.0)
    }
}
