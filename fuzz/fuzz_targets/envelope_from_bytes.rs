// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![no_main]
use libfuzzer_sys::fuzz_target;

use std::sync::Once;

use stun_envelope::attribute::AttributeRegistry;
use stun_envelope::codec::MessageCodec;
use stun_envelope::message::{Message, StunParseError};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

fn init_log() {
    TRACING.call_once(|| {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    });
}

fuzz_target!(|data: &[u8]| {
    init_log();
    let codec = MessageCodec::builder()
        .registry(AttributeRegistry::rfc5389())
        .verify_fingerprint(true)
        .build();
    match codec.decode(data) {
        Ok(decoded) => {
            assert!(MessageCodec::is_stun(data));
            assert!(decoded.consumed() <= data.len());
            assert_eq!(codec.frame_length(data).unwrap(), decoded.consumed());
            // re-encoding only normalises the padding
            let msg = decoded.message();
            let encoded = msg.to_bytes().unwrap();
            assert_eq!(encoded.len(), decoded.consumed());
            assert_eq!(&Message::from_bytes(&encoded).unwrap(), msg);
        }
        Err(StunParseError::Incomplete { expected, actual }) => {
            assert!(expected > actual);
            assert_eq!(actual, data.len());
        }
        Err(_) => (),
    }
});
