use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use msbuild_expand::model::MockFileSystem;
use msbuild_expand::parser::{property_reference, split_list};
use msbuild_expand::{ElementLocation, ExpanderOptions, ExpansionConfig, ExpansionEngine, Item};

fn engine() -> ExpansionEngine {
    let mut engine = ExpansionEngine::new()
        .with_fs(Arc::new(MockFileSystem::new()))
        .with_config(ExpansionConfig::rooted_at("/bench"));
    engine.data_mut().set_property("Configuration", "Release");
    engine.data_mut().set_property("OutputPath", "bin/Release/");
    engine
        .data_mut()
        .set_property("Sources", "a.cs;b.cs;c.cs;d.cs;e.cs");
    for i in 0..100 {
        engine
            .data_mut()
            .add_item(Item::new("Compile", format!("src/file{i}.cs")).with_metadata("N", i.to_string()));
    }
    engine
}

fn benchmark_split_list(c: &mut Criterion) {
    let list: String = (0..200)
        .map(|i| format!("item{i}.cs"))
        .collect::<Vec<_>>()
        .join(";");

    c.bench_function("split_list", |b| {
        b.iter(|| black_box(split_list(black_box(&list))))
    });
}

fn benchmark_parse_property(c: &mut Criterion) {
    let expression = "$(OutputPath.TrimEnd('/').Replace('Release', 'Debug'))";

    c.bench_function("parse_property", |b| {
        b.iter(|| black_box(property_reference(black_box(expression), 0, 255)))
    });
}

fn benchmark_no_op_scan(c: &mut Criterion) {
    let engine = engine();
    let location = ElementLocation::in_memory();
    let plain = "obj/Release/net8.0/App.dll";

    c.bench_function("no_op_scan", |b| {
        b.iter(|| {
            black_box(
                engine
                    .expand_escaped(black_box(plain), ExpanderOptions::ALL, &location)
                    .unwrap(),
            )
        })
    });
}

fn benchmark_property_splice(c: &mut Criterion) {
    let engine = engine();
    let location = ElementLocation::in_memory();
    let expression = "$(OutputPath)$(Configuration)/out.txt";

    c.bench_function("property_splice", |b| {
        b.iter(|| black_box(engine.expand(black_box(expression), &location).unwrap()))
    });
}

fn benchmark_item_transform(c: &mut Criterion) {
    let engine = engine();
    let location = ElementLocation::in_memory();
    let expression = "@(Compile->'%(Filename).obj'->Distinct())";

    c.bench_function("item_transform_100", |b| {
        b.iter(|| black_box(engine.expand(black_box(expression), &location).unwrap()))
    });
}

fn benchmark_mixed_expressions(c: &mut Criterion) {
    let engine = engine();
    let location = ElementLocation::in_memory();
    let expressions = [
        ("simple", "$(Configuration)"),
        ("function", "$(Sources.Split(';').Length)"),
        ("vector", "@(Compile)"),
        ("template", "@(Compile->'%(N):%(Filename)', ', ')"),
    ];

    let mut group = c.benchmark_group("mixed");
    for (name, expression) in expressions {
        group.bench_function(name, |b| {
            b.iter(|| black_box(engine.expand(black_box(expression), &location).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_split_list,
    benchmark_parse_property,
    benchmark_no_op_scan,
    benchmark_property_splice,
    benchmark_item_transform,
    benchmark_mixed_expressions
);
criterion_main!(benches);
