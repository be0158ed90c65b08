// Copyright (C) 2020 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::message::{StunParseError, StunWriteError};

use super::{AttributeExt, AttributeType, RawAttribute};

use tracing::warn;

/// The ordered attributes of a [`Message`](crate::message::Message).
///
/// Attributes are kept in the order they were appended (or decoded) and are written out in the
/// same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeList {
    attributes: Vec<RawAttribute>,
}

impl AttributeList {
    /// Construct a new empty [`AttributeList`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new attribute at the end of the list
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::{AttributeList, AttributeType};
    /// let mut list = AttributeList::new();
    /// list.append(AttributeType::new(0x8001), &[1, 2, 3, 4, 5]).unwrap();
    /// assert_eq!(list.len(), 1);
    /// assert_eq!(list.total_wire_size(), 12);
    /// ```
    pub fn append(&mut self, atype: AttributeType, value: &[u8]) -> Result<(), StunWriteError> {
        let raw = RawAttribute::try_new(atype, value)?;
        self.push(raw);
        Ok(())
    }

    /// Append an already framed [`RawAttribute`] at the end of the list
    pub fn push(&mut self, raw: RawAttribute) {
        self.attributes.push(raw);
    }

    /// Iterate over the attributes in stored order.  A new iterator always starts from the
    /// first attribute.
    pub fn iter(&self) -> AttributeIter<'_> {
        AttributeIter {
            inner: self.attributes.iter(),
        }
    }

    /// The first attribute with the provided type, if any
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::{AttributeList, AttributeType};
    /// let mut list = AttributeList::new();
    /// list.append(AttributeType::new(0x8001), &[1]).unwrap();
    /// list.append(AttributeType::new(0x8001), &[2]).unwrap();
    /// assert_eq!(list.find_first(AttributeType::new(0x8001)).unwrap().value(), &[1]);
    /// assert!(list.find_first(AttributeType::new(0x8002)).is_none());
    /// ```
    pub fn find_first(&self, atype: AttributeType) -> Option<&RawAttribute> {
        self.attributes.iter().find(|attr| attr.get_type() == atype)
    }

    /// The index of the first attribute with the provided type, if any
    pub fn position(&self, atype: AttributeType) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attr| attr.get_type() == atype)
    }

    /// Whether an attribute with the provided type exists in this list
    pub fn contains(&self, atype: AttributeType) -> bool {
        self.position(atype).is_some()
    }

    /// The attribute at `index`
    pub fn get(&self, index: usize) -> Option<&RawAttribute> {
        self.attributes.get(index)
    }

    /// The last attribute in the list
    pub fn last(&self) -> Option<&RawAttribute> {
        self.attributes.last()
    }

    /// The number of attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether there are no attributes
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// The number of bytes all attributes occupy when written, including each attribute header
    /// and padding.
    pub fn total_wire_size(&self) -> usize {
        self.wire_size_before(self.attributes.len())
    }

    /// The number of bytes the attributes in `[0, index)` occupy when written.
    pub fn wire_size_before(&self, index: usize) -> usize {
        self.attributes
            .iter()
            .take(index)
            .map(|attr| attr.padded_len())
            .sum()
    }

    /// Parse a sequence of attribute frames that must exactly fill `data`.
    ///
    /// `offset` is the position of `data` within the enclosing message and is only used for
    /// error reporting.
    pub(crate) fn parse(data: &[u8], offset: usize) -> Result<Self, StunParseError> {
        let mut attributes = Vec::new();
        let mut data_i = 0;
        while data_i < data.len() {
            let remaining = data.len() - data_i;
            if remaining < super::AttributeHeader::LENGTH {
                warn!(
                    "{remaining} trailing bytes at offset {} cannot hold an attribute",
                    offset + data_i
                );
                return Err(StunParseError::TrailingGarbage {
                    offset: offset + data_i,
                    remaining,
                });
            }
            let (attr, padded_len) = RawAttribute::parse_frame(&data[data_i..], offset + data_i)
                .map_err(|e| {
                    warn!("failed to parse message attribute at offset {}: {e}", offset + data_i);
                    e
                })?;
            data_i += padded_len;
            attributes.push(attr);
        }
        Ok(Self { attributes })
    }

    /// Write all attributes in order into `dest`.  `dest` must be at least
    /// [`total_wire_size()`](Self::total_wire_size) bytes long.
    pub(crate) fn write_into(&self, dest: &mut [u8]) -> Result<usize, StunWriteError> {
        self.write_prefix_into(self.attributes.len(), dest)
    }

    /// Write the attributes in `[0, index)` into `dest`.
    pub(crate) fn write_prefix_into(
        &self,
        index: usize,
        dest: &mut [u8],
    ) -> Result<usize, StunWriteError> {
        let mut offset = 0;
        for attr in self.attributes.iter().take(index) {
            offset += attr.write_into(&mut dest[offset..])?;
        }
        Ok(offset)
    }
}

impl<'a> IntoIterator for &'a AttributeList {
    type Item = &'a RawAttribute;
    type IntoIter = AttributeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<RawAttribute> for AttributeList {
    fn from_iter<T: IntoIterator<Item = RawAttribute>>(iter: T) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

/// Iterator over the attributes in an [`AttributeList`]
#[derive(Debug, Clone)]
pub struct AttributeIter<'a> {
    inner: std::slice::Iter<'a, RawAttribute>,
}

impl<'a> Iterator for AttributeIter<'a> {
    type Item = &'a RawAttribute;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for AttributeIter<'_> {}
