use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use weft::{filters, Dots, Template, Value};

const TEMPLATE: &str = "<h1>{{ title|upper }}</h1>
<ul>
{% for item in items %}{% if item.visible %}  <li>{{ item.name|title }}: {{ item.price }}</li>
{% endif %}{% endfor %}</ul>
{# footer #}<p>{{ footer }}</p>";

fn values() -> HashMap<&'static str, Value> {
    let items = (0..50)
        .map(|i| {
            [
                ("name", Value::from(format!("item number {i}"))),
                ("price", Value::from(i * 3)),
                ("visible", Value::from(i % 3 != 0)),
            ]
            .into_iter()
            .collect::<Value>()
        })
        .collect::<Vec<_>>();

    HashMap::from([
        ("title", Value::from("catalogue")),
        ("items", Value::from(items)),
        ("footer", Value::from("that's all")),
    ])
}

fn compile(c: &mut Criterion) {
    c.bench_function("compile", |b| {
        b.iter(|| Template::with_contexts(black_box(TEMPLATE), [filters::builtins()]).unwrap())
    });
}

fn render(c: &mut Criterion) {
    let template = Template::with_contexts(TEMPLATE, [filters::builtins()]).unwrap();
    let values = values();

    c.bench_function("render", |b| {
        b.iter(|| black_box(template.render(&values, &Dots).unwrap()))
    });
    c.bench_function("compile and render", |b| {
        b.iter(|| {
            let template =
                Template::with_contexts(black_box(TEMPLATE), [filters::builtins()]).unwrap();
            black_box(template.render(&values, &Dots).unwrap())
        })
    });
}

criterion_group!(benches, compile, render);
criterion_main!(benches);
