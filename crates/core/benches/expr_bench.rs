use std::collections::BTreeMap;

use criterion::{criterion_group, criterion_main, Criterion};
use sqlprobe_core::expr::{check, parse_expression, StepRows};
use sqlprobe_core::render::render_sql;
use sqlprobe_core::{Row, Value};

fn count_row(n: i64) -> Row {
    BTreeMap::from([("cnt".to_string(), Value::Integer(n))])
}

fn benchmark_expression_parse(c: &mut Criterion) {
    let expressions = [
        "steps['source'][0]['cnt'] == steps['target'][0]['cnt']",
        "len(steps['check']) == 0 or steps['check'][0]['cnt'] < 5",
        "abs(steps['a'][0]['delta']) <= 1 and steps['a'][0]['state'] == 'ok'",
        "sum(1, 2, 3) == 6",
    ];

    c.bench_function("parse_expression", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let source = expressions[idx % expressions.len()];
            idx += 1;
            parse_expression(source).expect("benchmark expression should parse")
        })
    });
}

fn benchmark_expression_check(c: &mut Criterion) {
    let steps = StepRows::from([
        ("source".to_string(), vec![count_row(10)]),
        ("target".to_string(), vec![count_row(10)]),
    ]);

    c.bench_function("check_expression", |b| {
        b.iter(|| {
            check(
                "steps['source'][0]['cnt'] == steps['target'][0]['cnt']",
                &steps,
            )
        })
    });
}

fn benchmark_template_render(c: &mut Criterion) {
    let mut collected: BTreeMap<String, Vec<Row>> = BTreeMap::new();
    collected.insert("pick".to_string(), vec![count_row(42)]);

    c.bench_function("render_sql", |b| {
        b.iter(|| {
            render_sql(
                "SELECT COUNT(*) AS cnt FROM orders WHERE id <= {{step.pick.cnt}}",
                &collected,
            )
            .expect("benchmark template should render")
        })
    });
}

criterion_group!(
    benches,
    benchmark_expression_parse,
    benchmark_expression_check,
    benchmark_template_render
);
criterion_main!(benches);
