use criterion::{black_box, criterion_group, criterion_main, Criterion};
use luthor_codec::{content_hash, markdown, HtmlTransform};
use luthor_runtime::BlockRegistry;

fn sample_markdown() -> String {
    let mut source = String::new();
    for section in 0..20 {
        source.push_str(&format!("## Section {}\n\n", section));
        source.push_str("Some **bold** text, some *italic* text and a [link](https://example.com).\n");
        source.push_str("A second line with `inline code`.\n\n");
        source.push_str("- first\n- second\n- [x] done\n\n");
        source.push_str("| Name | Value |\n| --- | --- |\n| a | 1 |\n| b |  |\n\n");
        source.push_str("```rust\nfn main() {\n    println!(\"hi\");\n}\n```\n\n");
    }
    source
}

fn markdown_import(c: &mut Criterion) {
    let source = sample_markdown();
    let registry = BlockRegistry::new();
    c.bench_function("markdown_import", |b| {
        b.iter(|| markdown::import(black_box(&source), &registry))
    });
}

fn html_round_trip(c: &mut Criterion) {
    let registry = BlockRegistry::new();
    let tree = markdown::import(&sample_markdown(), &registry);
    let transform = HtmlTransform::default();
    let html = transform.render(&tree, &registry);

    c.bench_function("html_export", |b| {
        b.iter(|| transform.render(black_box(&tree), &registry))
    });
    c.bench_function("html_import", |b| {
        b.iter(|| transform.parse_tree(black_box(&html), &registry))
    });
    c.bench_function("content_hash", |b| b.iter(|| content_hash(black_box(&html))));
}

criterion_group!(benches, markdown_import, html_round_trip);
criterion_main!(benches);
