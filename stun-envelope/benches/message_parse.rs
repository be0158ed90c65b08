// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use stun_envelope::attribute::*;
use stun_envelope::codec::MessageCodec;
use stun_envelope::message::{Message, BINDING};

fn message_with_attributes(n: u16, fingerprint: bool) -> Vec<u8> {
    let mut msg = Message::builder_request(BINDING);
    msg.add_attribute(&Software::new("stun-envelope").unwrap())
        .unwrap();
    for i in 1..n {
        msg.add_raw_attribute(AttributeType::new(0x8000 + i), &[i as u8; 7])
            .unwrap();
    }
    if fingerprint {
        msg.add_fingerprint().unwrap();
    }
    msg.finish().to_bytes().unwrap()
}

fn bench_message_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message/Parse");
    for n in [1, 8, 32] {
        let data = message_with_attributes(n, false);
        group.throughput(criterion::Throughput::Bytes(data.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("Attributes", n),
            &data,
            |b, data| b.iter(|| Message::from_bytes(data).unwrap()),
        );
    }
    group.finish();

    let data = message_with_attributes(8, true);
    c.bench_with_input(
        BenchmarkId::new("Message/Parse", "Fingerprint"),
        &data,
        |b, data| {
            b.iter(|| {
                Message::from_bytes(data).unwrap();
                Fingerprint::validate(data).unwrap();
            })
        },
    );

    let codec = MessageCodec::builder()
        .registry(AttributeRegistry::rfc5389())
        .verify_fingerprint(true)
        .build();
    c.bench_with_input(
        BenchmarkId::new("Codec/Decode", "Fingerprint"),
        &data,
        |b, data| b.iter(|| codec.decode(data).unwrap()),
    );
    c.bench_with_input(BenchmarkId::new("Codec/IsStun", 8), &data, |b, data| {
        b.iter(|| MessageCodec::is_stun(data))
    });
}

criterion_group!(message_parse, bench_message_parse);
criterion_main!(message_parse);
