use std::collections::VecDeque;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use forest_stream::protocol::{EndpointKind, NormalizedEvent};
use forest_stream::stream::{parse_event_line, LineDecoder, StreamProcessor};
use serde_json::json;

fn sample_chat_body(events: usize) -> Vec<u8> {
    let mut body = String::from(": OPENROUTER PROCESSING\n\n");
    for i in 0..events {
        let payload = json!({
            "id": "gen-bench",
            "model": "mock/model",
            "choices": [{"index": 0, "delta": {"content": format!("token {i} ünïcödé ")}}],
        });
        body.push_str(&format!("data: {payload}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body.into_bytes()
}

fn sample_completions_body(events: usize) -> Vec<u8> {
    let mut body = String::new();
    for i in 0..events {
        let payload = json!({"choices": [{"message": {"content": format!("word{i} ")}}]});
        body.push_str(&format!("data: {payload}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body.into_bytes()
}

fn run_pipeline(endpoint: EndpointKind, body: &[u8], chunk_size: usize) -> usize {
    let mut processor = StreamProcessor::new(endpoint);
    let mut out: VecDeque<NormalizedEvent> = VecDeque::with_capacity(8);
    let mut produced = 0usize;
    for chunk in body.chunks(chunk_size) {
        processor.push_chunk(black_box(chunk), &mut out);
        produced += out.drain(..).count();
    }
    processor.finish(&mut out);
    produced + out.len()
}

fn bench_decoder(c: &mut Criterion) {
    let body = sample_chat_body(256);
    c.bench_function("line_decoder_chunk_61", |b| {
        b.iter(|| {
            let mut decoder = LineDecoder::new();
            let mut lines = Vec::with_capacity(16);
            let mut total = 0usize;
            for chunk in body.chunks(61) {
                decoder.decode_into(black_box(chunk), &mut lines);
                total += lines.len();
                lines.clear();
            }
            black_box(total);
        });
    });
}

fn bench_parse(c: &mut Criterion) {
    let line = format!(
        "data: {}",
        json!({"id": "gen-bench", "choices": [{"index": 0, "delta": {"content": "hello"}}]})
    );
    c.bench_function("parse_event_line_chat", |b| {
        b.iter(|| black_box(parse_event_line(black_box(&line))));
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let chat = sample_chat_body(256);
    let completions = sample_completions_body(256);
    for chunk_size in [16usize, 512, 8192] {
        c.bench_function(&format!("pipeline_chat_chunk_{chunk_size}"), |b| {
            b.iter(|| black_box(run_pipeline(EndpointKind::Chat, &chat, chunk_size)));
        });
        c.bench_function(&format!("pipeline_completions_message_chunk_{chunk_size}"), |b| {
            b.iter(|| {
                black_box(run_pipeline(
                    EndpointKind::Completions,
                    &completions,
                    chunk_size,
                ))
            });
        });
    }
}

criterion_group!(benches, bench_decoder, bench_parse, bench_pipeline);
criterion_main!(benches);
