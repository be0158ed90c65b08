// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use std::sync::Once;

use stun_envelope::attribute::{AttributeType, Fingerprint};
use stun_envelope::message::{Message, MessageClass, MessageType, Method, TransactionId};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

fn init_log() {
    TRACING.call_once(|| {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    });
}

#[derive(Arbitrary, Debug)]
struct FuzzAttribute {
    atype: AttributeType,
    value: Vec<u8>,
}

#[derive(Arbitrary, Debug)]
struct FuzzMessage {
    class: MessageClass,
    method: Method,
    transaction_id: TransactionId,
    attributes: Vec<FuzzAttribute>,
    fingerprint: bool,
}

fuzz_target!(|input: FuzzMessage| {
    init_log();
    let mtype = MessageType::from_class_method(input.class, input.method);
    let mut builder = Message::builder(mtype, input.transaction_id);
    for attr in input.attributes.iter() {
        // ordering and size violations are rejected by the builder
        let _ = builder.add_raw_attribute(attr.atype, &attr.value);
    }
    let fingerprinted = input.fingerprint && builder.add_fingerprint().is_ok();
    let msg = builder.finish();
    let data = msg.to_bytes().unwrap();
    assert_eq!(data.len(), 20 + msg.length());
    assert_eq!(data.len() % 4, 0);

    let (parsed, consumed) = Message::parse(&data).unwrap();
    assert_eq!(consumed, data.len());
    assert_eq!(parsed.get_type(), mtype);
    assert_eq!(parsed.class(), input.class);
    assert_eq!(parsed.method(), input.method);
    assert_eq!(parsed.transaction_id(), input.transaction_id);
    assert_eq!(parsed, msg);
    if fingerprinted {
        Fingerprint::validate(&data).unwrap();
    }
});
