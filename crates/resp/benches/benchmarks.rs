//! Performance benchmarks for reply parsing and command encoding

use std::hint::black_box;

use bytes::BytesMut;
use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use resp::RespParseResult;
use resp::RespParser;

fn bench_parse_replies(c: &mut Criterion) {
	let mut group = c.benchmark_group("parse_reply");
	let cases: [(&str, &[u8]); 4] = [
		("ok", b"+OK\r\n"),
		("integer", b":1000\r\n"),
		("bulk", b"$11\r\nhello world\r\n"),
		("error", b"-ERR unknown command 'FOO'\r\n"),
	];

	for (name, data) in cases {
		group.throughput(Throughput::Bytes(data.len() as u64));
		group.bench_function(name, |b| {
			b.iter(|| {
				let mut buf = BytesMut::from(data);
				resp::parse(black_box(&mut buf)).unwrap()
			})
		});
	}
	group.finish();
}

fn bench_parse_large_array(c: &mut Criterion) {
	let mut group = c.benchmark_group("parse_large_array");

	let mut data = BytesMut::from("*100\r\n");
	for i in 0..100 {
		data.extend_from_slice(format!("$3\r\n{:03}\r\n", i).as_bytes());
	}

	group.throughput(Throughput::Bytes(data.len() as u64));
	group.bench_function("array_100_items", |b| {
		b.iter(|| {
			let mut buf = data.clone();
			resp::parse(black_box(&mut buf)).unwrap()
		})
	});
	group.finish();
}

fn bench_parse_chunked(c: &mut Criterion) {
	let mut group = c.benchmark_group("parse_chunked");
	let payload = vec![b'x'; 16 * 1024];
	let mut data = format!("${}\r\n", payload.len()).into_bytes();
	data.extend_from_slice(&payload);
	data.extend_from_slice(b"\r\n");

	group.throughput(Throughput::Bytes(data.len() as u64));
	group.bench_function("bulk_16k_in_1k_reads", |b| {
		b.iter(|| {
			let mut parser = RespParser::new();
			let mut buf = BytesMut::with_capacity(data.len());
			for chunk in data.chunks(1024) {
				buf.extend_from_slice(chunk);
				if let RespParseResult::Complete(value) = parser.parse(&mut buf) {
					return black_box(value);
				}
			}
			unreachable!("reply never completed")
		})
	});
	group.finish();
}

fn bench_encode_command(c: &mut Criterion) {
	let mut group = c.benchmark_group("encode_command");

	group.bench_function("set_small", |b| {
		let mut buf = BytesMut::with_capacity(64);
		b.iter(|| {
			buf.clear();
			resp::encode_command(black_box(&["SET", "key", "value"]), &mut buf);
		})
	});

	let value = vec![0u8; 4096];
	group.throughput(Throughput::Bytes(value.len() as u64));
	group.bench_function("set_4k_value", |b| {
		let mut buf = BytesMut::with_capacity(8192);
		b.iter(|| {
			buf.clear();
			resp::encode_command(black_box(&[&b"SET"[..], &b"key"[..], &value[..]]), &mut buf);
		})
	});
	group.finish();
}

criterion_group!(
	benches,
	bench_parse_replies,
	bench_parse_large_array,
	bench_parse_chunked,
	bench_encode_command,
);
criterion_main!(benches);
