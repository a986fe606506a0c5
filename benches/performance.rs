//! Performance benchmarks for httpstat's per-exchange hot paths
//!
//! Everything measured here runs once per exchange, after the network
//! work is done, so it should stay far below a millisecond.

use clap::Parser;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use httpstat::{
    cli::{parse_duration, Cli},
    config::{load_config, parse_target},
    models::{Report, Timing},
    output::{diagram, headers, style::Painter, RenderContext, Renderer, RendererFactory},
    types::{OutputMode, Scheme},
};
use std::hint::black_box;

fn sample_timing() -> Timing {
    Timing {
        dns: 5,
        tcp: 10,
        tls: 20,
        server: 50,
        transfer: 100,
        lookup: 5,
        connect: 15,
        pre_transfer: 35,
        start_transfer: 85,
        total: 185,
    }
}

fn sample_report() -> Report {
    let mut headers = http::HeaderMap::new();
    for (name, value) in [
        ("content-type", "text/html; charset=utf-8"),
        ("server", "nginx"),
        ("connection", "keep-alive"),
        ("cache-control", "max-age=600"),
        ("set-cookie", "a=1"),
        ("set-cookie", "b=2"),
        ("x-request-id", "0f1e2d3c"),
    ] {
        headers.append(name, http::HeaderValue::from_static(value));
    }

    let mut report = Report {
        address: "93.184.216.34:443".to_string(),
        proto: "HTTP/2.0".to_string(),
        status: "200 OK".to_string(),
        timing: sample_timing(),
        ..Default::default()
    };
    report.set_headers(&headers);
    report
}

/// Benchmark template substitution
fn bench_template_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("template_render");
    let timing = sample_timing();

    for (name, scheme) in [("https", Scheme::Https), ("http", Scheme::Http)] {
        for colored in [false, true] {
            let painter = Painter::new(colored);
            let id = BenchmarkId::new(name, if colored { "color" } else { "plain" });
            group.bench_with_input(id, &scheme, |b, scheme| {
                b.iter(|| diagram::render(black_box(diagram::template_for(*scheme)), &timing, &painter))
            });
        }
    }

    group.finish();
}

/// Benchmark full report rendering in both output modes
fn bench_report_render(c: &mut Criterion) {
    let report = sample_report();
    let context = RenderContext {
        report: &report,
        scheme: Scheme::Https,
        body_message: Some("Body discarded"),
    };

    let diagram_renderer = RendererFactory::create_renderer(OutputMode::Diagram, false);
    c.bench_function("render_diagram_report", |b| b.iter(|| diagram_renderer.render(black_box(&context))));

    let json_renderer = RendererFactory::create_renderer(OutputMode::Json, false);
    c.bench_function("render_json_report", |b| b.iter(|| json_renderer.render(black_box(&context))));
}

/// Benchmark header ordering
fn bench_header_sort(c: &mut Criterion) {
    let names = [
        "Content-Type",
        "Transfer-Encoding",
        "Server",
        "Date",
        "Connection",
        "Cache-Control",
        "Keep-Alive",
        "Vary",
        "Strict-Transport-Security",
        "Upgrade",
    ];

    c.bench_function("sorted_header_names", |b| {
        b.iter(|| headers::sorted_names(black_box(names.iter().copied())))
    });
}

/// Benchmark argument parsing paths
fn bench_argument_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("argument_parsing");

    for input in ["3s", "250ms", "1h30m", "1.5s"] {
        group.bench_with_input(BenchmarkId::new("duration", input), input, |b, input| {
            b.iter(|| parse_duration(black_box(input)))
        });
    }

    for input in ["example.com", "example.com:80/path", "https://example.com/a?b=c"] {
        group.bench_with_input(BenchmarkId::new("target", input), input, |b, input| {
            b.iter(|| parse_target(black_box(input)))
        });
    }

    group.bench_function("full_config", |b| {
        b.iter(|| {
            let cli = Cli::parse_from([
                "httpstat",
                "-H",
                "Accept: */*",
                "-L",
                "-m",
                "10s",
                "example.com",
            ]);
            load_config(black_box(cli))
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_template_render,
    bench_report_render,
    bench_header_sort,
    bench_argument_parsing
);
criterion_main!(benches);
