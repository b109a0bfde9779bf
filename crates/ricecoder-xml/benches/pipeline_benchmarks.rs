//! Performance benchmarks for the prompt pipeline

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ricecoder_xml::{
    generate, parse, score, validate, Element, Goal, Optimizer, Structure, Template,
};
use serde_json::json;
use std::collections::HashMap;

fn review_template() -> Template {
    Template::new(
        "review",
        Structure::new("review")
            .with_element(Element::instruction("role", "You are a careful reviewer").required())
            .with_element(Element::container("context", ["code", "notes"]))
            .with_element(Element::content("code").required())
            .with_element(Element::content("notes").repeatable())
            .with_element(Element::control("format", "Answer in markdown")),
    )
}

fn variables() -> HashMap<String, serde_json::Value> {
    let mut variables = HashMap::new();
    variables.insert("code".to_string(), json!("fn main() { println!(\"hi\"); }"));
    variables.insert("notes".to_string(), json!(["check naming", "check errors", "check tests"]));
    variables
}

fn benchmark_generation(c: &mut Criterion) {
    let template = review_template();
    let variables = variables();

    c.bench_function("generate_review_prompt", |b| {
        b.iter(|| black_box(generate(black_box(&template), black_box(&variables), None)))
    });
}

fn benchmark_analysis(c: &mut Criterion) {
    let template = review_template();
    let document = generate(&template, &variables(), None).unwrap();

    c.bench_function("parse_review_prompt", |b| {
        b.iter(|| black_box(parse(black_box(&document))))
    });

    let parsed = parse(&document).unwrap();
    c.bench_function("validate_review_prompt", |b| {
        b.iter(|| black_box(validate(black_box(&parsed), &template, true)))
    });

    c.bench_function("score_review_prompt", |b| {
        b.iter(|| black_box(score(black_box(&parsed), &template)))
    });
}

fn benchmark_optimization(c: &mut Criterion) {
    let template = review_template();
    let document = "<review><context><code>x</code></context></review>";
    let optimizer = Optimizer::new();

    c.bench_function("optimize_effectiveness", |b| {
        b.iter(|| {
            black_box(optimizer.run(
                &template,
                black_box(document),
                vec![Goal::new("effectiveness", 0.99), Goal::new("readability", 1.0)],
            ))
        })
    });
}

criterion_group!(
    benches,
    benchmark_generation,
    benchmark_analysis,
    benchmark_optimization
);
criterion_main!(benches);
