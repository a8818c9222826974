use criterion::{black_box, criterion_group, criterion_main, Criterion};
use datt_content::{Content, ContentAuth, UnsignedContentAuth};
use datt_types::{BlockHash, KeyPair};

fn unsigned(kp: &KeyPair, body_len: usize) -> UnsignedContentAuth {
    UnsignedContentAuth::new(
        Content::new("bench title", "x".repeat(body_len)),
        BlockHash::from_bytes([0x5A; 32]),
        376_949,
        datt_crypto::derive_address(&kp.public),
    )
}

fn signed(kp: &KeyPair, body_len: usize) -> ContentAuth {
    match unsigned(kp, body_len).sign(kp) {
        Ok(ca) => ca,
        Err(e) => panic!("bench setup failed: {e}"),
    }
}

fn content_auth_sign_bench(c: &mut Criterion) {
    let kp = datt_crypto::generate_keypair();
    let template = unsigned(&kp, 1024);

    c.bench_function("content_auth_sign_1KB", |b| {
        b.iter(|| black_box(template.clone()).sign(&kp))
    });
}

fn content_auth_verify_bench(c: &mut Criterion) {
    let kp = datt_crypto::generate_keypair();
    let ca = signed(&kp, 1024);

    c.bench_function("content_auth_verify_1KB", |b| b.iter(|| black_box(&ca).verify()));
}

fn content_auth_verify_64kb_bench(c: &mut Criterion) {
    let kp = datt_crypto::generate_keypair();
    let ca = signed(&kp, 64 * 1024);

    c.bench_function("content_auth_verify_64KB", |b| b.iter(|| black_box(&ca).verify()));
}

fn address_derive_bench(c: &mut Criterion) {
    let kp = datt_crypto::generate_keypair();

    c.bench_function("derive_address", |b| {
        b.iter(|| datt_crypto::derive_address(black_box(&kp.public)))
    });
}

criterion_group!(
    benches,
    content_auth_sign_bench,
    content_auth_verify_bench,
    content_auth_verify_64kb_bench,
    address_derive_bench,
);
criterion_main!(benches);
