// Copyright (C) 2020 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::convert::TryFrom;

use byteorder::{BigEndian, ByteOrder};
use crc::{Crc, CRC_32_ISO_HDLC};
use tracing::warn;

use crate::message::{Message, StunParseError};

use super::{Attribute, AttributeType, RawAttribute};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// The FINGERPRINT [`Attribute`]
///
/// Stores the CRC-32 of the message bytes it covers.  The wire value is that CRC xor'd with
/// `0x5354554e` so that a FINGERPRINT cannot be confused with the checksum of another protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    crc: u32,
}

impl Attribute for Fingerprint {
    const TYPE: AttributeType = AttributeType::FINGERPRINT;

    fn length(&self) -> u16 {
        4
    }
}

impl From<&Fingerprint> for RawAttribute {
    fn from(value: &Fingerprint) -> RawAttribute {
        RawAttribute::new(Fingerprint::TYPE, &(value.crc ^ Fingerprint::XOR).to_be_bytes())
    }
}

impl TryFrom<&RawAttribute> for Fingerprint {
    type Error = StunParseError;

    fn try_from(raw: &RawAttribute) -> Result<Self, Self::Error> {
        raw.check_type_and_len(Self::TYPE, 4..=4)?;
        Ok(Self {
            crc: BigEndian::read_u32(raw.value()) ^ Self::XOR,
        })
    }
}

impl Fingerprint {
    const XOR: u32 = 0x5354_554e;

    /// A FINGERPRINT holding an already computed CRC-32
    pub fn new(crc: u32) -> Self {
        Self { crc }
    }

    /// The FINGERPRINT of `prefix`, the message bytes preceding the attribute with the header
    /// length already covering it.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::Fingerprint;
    /// assert_eq!(Fingerprint::from_prefix(&[99; 4]).crc(), 0xd82d_fa0e);
    /// ```
    pub fn from_prefix(prefix: &[u8]) -> Self {
        Self::new(CRC32.checksum(prefix))
    }

    /// The CRC-32 this FINGERPRINT carries, without the xor applied on the wire
    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// Check the FINGERPRINT of the message at the start of `data` against the bytes exactly
    /// as they were received.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stun_envelope::attribute::Fingerprint;
    /// # use stun_envelope::message::{Message, StunParseError, BINDING};
    /// let mut builder = Message::builder_request(BINDING);
    /// builder.add_fingerprint().unwrap();
    /// let mut data = builder.finish().to_bytes().unwrap();
    /// assert!(Fingerprint::validate(&data).is_ok());
    ///
    /// data[10] ^= 0x10;
    /// assert!(matches!(
    ///     Fingerprint::validate(&data),
    ///     Err(StunParseError::FingerprintMismatch)
    /// ));
    /// ```
    #[tracing::instrument(
        name = "fingerprint_validate",
        level = "trace",
        skip(data),
        fields(
            data.len = data.len()
        )
    )]
    pub fn validate(data: &[u8]) -> Result<(), StunParseError> {
        let (covered, raw) = Message::covered_bytes(data, Self::TYPE)?;
        let received = Self::try_from(&raw)?;
        let computed = Self::from_prefix(&covered);
        if computed != received {
            warn!(
                "fingerprint mismatch, computed {:#010x} received {:#010x}",
                computed.crc, received.crc
            );
            return Err(StunParseError::FingerprintMismatch);
        }
        Ok(())
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:#010x}", Self::TYPE, self.crc)
    }
}
