//! Micro benchmarks for the BEP wire codec: XDR message body encode/decode
//! and LZ4 frame compression. Pure CPU - no network, no IO.
//!
//! ```bash
//! cargo bench --bench bench_codec
//! ```

use bep_core::codec::compress::{compress, decompress, should_compress};
use bep_core::codec::message::{Message, Request, Response};
use bep_core::model::{BlockInfo, FileInfo, IndexMessage};
use criterion::{criterion_group, criterion_main, Criterion};

/// A folder index with enough files/blocks to look like a real sync, not a
/// toy fixture: 500 files, 8 blocks each.
fn sample_index() -> IndexMessage {
    let files = (0..500)
        .map(|i| {
            let mut blocks: Vec<BlockInfo> =
                (0..8).map(|b| BlockInfo::new(131_072, vec![(b + i) as u8; 32])).collect();
            BlockInfo::with_offsets(&mut blocks);
            FileInfo {
                name: format!("dir/subdir/file-{i:04}.bin"),
                flags: 0,
                modified_seconds: 1_700_000_000 + i as i64,
                version: 1,
                local_version: i as u64,
                blocks,
            }
        })
        .collect();
    IndexMessage { folder_id: "default".into(), files }
}

fn bench_index_round_trip(c: &mut Criterion) {
    let index = sample_index();
    let message = Message::Index(index);
    let body = message.encode_body();
    assert_eq!(Message::decode_body(message.message_type(), &body).unwrap(), message);

    c.bench_function("index_encode_500_files", |b| {
        b.iter(|| std::hint::black_box(&message).encode_body());
    });
    c.bench_function("index_decode_500_files", |b| {
        b.iter(|| Message::decode_body(message.message_type(), std::hint::black_box(&body)).unwrap());
    });
}

fn bench_response_round_trip(c: &mut Criterion) {
    let message = Message::Response(Response { data: vec![0xAB; 131_072] });
    let body = message.encode_body();

    c.bench_function("response_encode_one_block", |b| {
        b.iter(|| std::hint::black_box(&message).encode_body());
    });
    c.bench_function("response_decode_one_block", |b| {
        b.iter(|| Message::decode_body(message.message_type(), std::hint::black_box(&body)).unwrap());
    });
}

fn bench_request_round_trip(c: &mut Criterion) {
    let message = Message::Request(Request {
        folder: "default".into(),
        name: "dir/subdir/file-0042.bin".into(),
        offset: 262_144,
        size: 131_072,
        hash: vec![0x11; 32],
    });
    let body = message.encode_body();

    c.bench_function("request_encode", |b| {
        b.iter(|| std::hint::black_box(&message).encode_body());
    });
    c.bench_function("request_decode", |b| {
        b.iter(|| Message::decode_body(message.message_type(), std::hint::black_box(&body)).unwrap());
    });
}

fn bench_block_compression(c: &mut Criterion) {
    // A full 128 KiB block of repetitive-ish data, similar to what
    // `should_compress` sees on a real Response payload.
    let block: Vec<u8> = (0..131_072usize).map(|i| (i % 251) as u8).collect();
    let compressed = compress(&block);
    assert_eq!(decompress(&compressed).unwrap(), block);

    c.bench_function("compress_128kib_block", |b| {
        b.iter(|| compress(std::hint::black_box(&block)));
    });
    c.bench_function("decompress_128kib_block", |b| {
        b.iter(|| decompress(std::hint::black_box(&compressed)).unwrap());
    });
    c.bench_function("should_compress_decision_128kib_block", |b| {
        b.iter(|| should_compress(std::hint::black_box(&block)));
    });
}

criterion_group!(
    codec_benches,
    bench_index_round_trip,
    bench_response_round_trip,
    bench_request_round_trip,
    bench_block_compression,
);
criterion_main!(codec_benches);
