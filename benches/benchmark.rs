//! Performance benchmarks for dom-facade.
//!
//! Run with: `cargo bench`
//!
//! Every facade call reparses its input, so these mostly measure parse cost
//! plus the query on top of it.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dom_facade::{xpath, DocumentQuery};

const SAMPLE_HTML: &str = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Sample Page</title>
</head>
<body>
    <nav>
        <a href="/">Home</a>
        <a href="/about">About</a>
    </nav>
    <article id="post">
        <h1>Sample Title</h1>
        <p class="lead">First paragraph with <b>bold</b> text.</p>
        <p>Second paragraph.</p>
        <ul id="list">
            <li class="a">one</li>
            <li class="b">two</li>
            <li class="a">three</li>
        </ul>
    </article>
    <footer>
        <p>Copyright 2024</p>
    </footer>
</body>
</html>
"#;

fn bench_css(c: &mut Criterion) {
    let query = DocumentQuery::new();
    c.bench_function("select_all_text", |b| {
        b.iter(|| query.select_all(black_box(SAMPLE_HTML), black_box("li.a"), false));
    });
    c.bench_function("select_first_markup", |b| {
        b.iter(|| query.select_first(black_box(SAMPLE_HTML), black_box("#post p"), true));
    });
}

fn bench_mutation(c: &mut Criterion) {
    let query = DocumentQuery::new();
    c.bench_function("append_child", |b| {
        b.iter(|| query.append_child(black_box(SAMPLE_HTML), "#list", "<li>four</li>"));
    });
}

fn bench_xpath(c: &mut Criterion) {
    let query = DocumentQuery::new();
    c.bench_function("xpath_predicate", |b| {
        b.iter(|| query.evaluate_xpath(black_box(SAMPLE_HTML), "//li[@class='a'][last()]"));
    });
    c.bench_function("xpath_compile_only", |b| {
        b.iter(|| xpath::compile(black_box("//article/p[contains(., 'paragraph')]/b")));
    });
}

/// Scale the list to see how parse cost grows with document size.
fn bench_document_size(c: &mut Criterion) {
    let query = DocumentQuery::new();
    let mut group = c.benchmark_group("document_size");

    for items in [10usize, 100, 1000] {
        let body: String = (0..items).map(|i| format!("<li class=\"x\">item {i}</li>")).collect();
        let html = format!("<ul id=\"list\">{body}</ul>");
        group.throughput(Throughput::Bytes(html.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(items), &html, |b, html| {
            b.iter(|| query.select_all(black_box(html), "li.x", false));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_css, bench_mutation, bench_xpath, bench_document_size);
criterion_main!(benches);
