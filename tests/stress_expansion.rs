//! Large-input behavior: wide lists, long chains, deep nesting.

use std::sync::Arc;

use msbuild_expand::model::MockFileSystem;
use msbuild_expand::{ElementLocation, ExpansionConfig, ExpansionEngine, Item};

fn engine() -> ExpansionEngine {
    ExpansionEngine::new()
        .with_fs(Arc::new(MockFileSystem::new()))
        .with_config(ExpansionConfig::rooted_at("/stress"))
}

fn location() -> ElementLocation {
    ElementLocation::new("stress.proj", 1, 1)
}

#[test]
fn ten_thousand_literal_include_fragments() {
    let engine = engine();
    let include: String = (0..10_000)
        .map(|i| format!("f{i}.cs"))
        .collect::<Vec<_>>()
        .join(";");

    let items = engine
        .items_from_include("Compile", &include, &location())
        .unwrap();

    assert_eq!(items.len(), 10_000);
    assert_eq!(items[0].include_escaped(), "f0.cs");
    assert_eq!(items[9_999].include_escaped(), "f9999.cs");
    assert!(items.iter().all(|item| item.recursive_dir().is_none()));
}

#[test]
fn ten_thousand_segment_property_list() {
    let mut engine = engine();
    let value: String = (0..10_000)
        .map(|i| format!("s{i}"))
        .collect::<Vec<_>>()
        .join(";");
    engine.data_mut().set_property("Wide", value);

    let list = engine.expand_list("$(Wide)", &location()).unwrap();
    assert_eq!(list.len(), 10_000);
    assert_eq!(list[0], "s0");
    assert_eq!(list[9_999], "s9999");
}

#[test]
fn wide_item_vector_joins_every_value() {
    let mut engine = engine();
    for i in 0..10_000 {
        engine.data_mut().add_item(Item::new("Big", format!("v{i}")));
    }

    let out = engine.expand("@(Big)", &location()).unwrap();
    assert!(out.starts_with("v0;v1;"));
    assert!(out.ends_with(";v9999"));
    assert_eq!(out.split(';').count(), 10_000);
}

#[test]
fn thousands_of_references_in_one_string() {
    let mut engine = engine();
    engine.data_mut().set_property("P", "x");

    let input = "$(P)".repeat(2_000);
    let out = engine.expand(&input, &location()).unwrap();
    assert_eq!(out, "x".repeat(2_000));
}

#[test]
fn long_transform_chains_stay_linear() {
    let mut engine = engine();
    for i in 0..100 {
        engine.data_mut().add_item(Item::new("Src", format!("f{i}.cs")));
    }

    let mut expr = String::from("@(Src");
    for _ in 0..40 {
        expr.push_str("->'%(Filename)'");
    }
    expr.push(')');

    let out = engine.expand(&expr, &location()).unwrap();
    let expected: String = (0..100).map(|i| format!("f{i}")).collect::<Vec<_>>().join(";");
    assert_eq!(out, expected);
}

#[test]
fn nesting_beyond_the_limit_errors_instead_of_overflowing() {
    let mut engine = engine();
    engine.data_mut().set_property("A", "x");
    let location = location();

    let mut nested = String::from("$(A)");
    for _ in 0..300 {
        nested = format!("$(A.Replace({nested}, 'y'))");
    }
    let err = engine.expand(&nested, &location).unwrap_err();
    assert_eq!(err.code(), "MSB4186");
    assert!(err.to_string().contains("nest"), "{err}");

    // Two hundred levels sit under the default cap and evaluate fine.
    let mut nested = String::from("$(A)");
    for _ in 0..200 {
        nested = format!("$(A.Replace({nested}, 'y'))");
    }
    assert_eq!(engine.expand(&nested, &location).unwrap(), "x");
}
