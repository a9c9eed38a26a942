// ABOUTME: Template rendering performance benchmarks
//! Measures render-path cost as a function of template size and variable count.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use promptforge_core::TemplateEngine;
use serde_json::json;

fn flat_template(vars: usize) -> (String, serde_json::Value) {
    let mut template = String::new();
    let mut context = serde_json::Map::new();
    for i in 0..vars {
        template.push_str(&format!("field{i}: {{{{v{i}}}}}\n"));
        context.insert(format!("v{i}"), json!(format!("value-{i}")));
    }
    (template, serde_json::Value::Object(context))
}

fn bench_render_flat(c: &mut Criterion) {
    let engine = TemplateEngine::new();
    let mut group = c.benchmark_group("render_flat");
    for vars in [1, 10, 50, 200] {
        let (template, context) = flat_template(vars);
        group.throughput(Throughput::Elements(vars as u64));
        group.bench_with_input(BenchmarkId::from_parameter(vars), &vars, |b, _| {
            b.iter(|| engine.render(black_box(&template), black_box(&context)).unwrap());
        });
    }
    group.finish();
}

fn bench_render_nested_sections(c: &mut Criterion) {
    let engine = TemplateEngine::new();
    let template = "{{#items}}- {{name}}: {{value}}\n{{/items}}";
    let context = json!({
        "items": (0..100).map(|i| json!({ "name": format!("item{i}"), "value": i })).collect::<Vec<_>>(),
    });

    c.bench_function("render_nested_section_100_items", |b| {
        b.iter(|| engine.render(black_box(template), black_box(&context)).unwrap());
    });
}

criterion_group!(benches, bench_render_flat, bench_render_nested_sections);
criterion_main!(benches);
