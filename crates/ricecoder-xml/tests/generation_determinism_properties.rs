//! Property-based tests for generation determinism and round-tripping
//!
//! Generated documents must be identical for identical inputs, parse back
//! into the values they were generated from and satisfy their own template.

use proptest::prelude::*;
use ricecoder_xml::{
    generate, parse, score, validate, BindingError, Element, GenerationContext, OptimizationLevel,
    Structure, Template, XmlError,
};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Strategy for distinct element names, sometimes repeating the root name
fn element_names_strategy() -> impl Strategy<Value = Vec<String>> {
    (
        prop::collection::btree_set("[a-z][a-z0-9]{0,6}", 1..6),
        any::<bool>(),
    )
        .prop_map(|(mut names, with_root_name)| {
            if with_root_name {
                names.insert("prompt".to_string());
            }
            names.into_iter().collect()
        })
}

/// Strategy for element text, including characters that need escaping
fn text_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9?&<>\"'é漢]{1,8}([ \t][a-zA-Z0-9?&<>é]{1,8}){0,3}"
}

/// Characters outside the XML character range
fn forbidden_char_strategy() -> impl Strategy<Value = char> {
    prop::sample::select(vec![
        '\u{0}', '\u{1}', '\u{8}', '\u{B}', '\u{C}', '\u{1B}', '\u{1F}', '\u{FFFE}', '\u{FFFF}',
    ])
}

fn level_strategy() -> impl Strategy<Value = OptimizationLevel> {
    prop_oneof![
        Just(OptimizationLevel::Basic),
        Just(OptimizationLevel::Standard),
        Just(OptimizationLevel::Advanced),
        Just(OptimizationLevel::Enterprise),
    ]
}

/// Template with required content elements, optionally wrapped in a container
fn template_strategy() -> impl Strategy<Value = (Template, HashMap<String, Value>)> {
    (
        element_names_strategy(),
        prop::collection::vec(text_strategy(), 6),
        any::<bool>(),
        level_strategy(),
    )
        .prop_map(|(names, texts, wrap, level)| {
            let mut structure = Structure::new("prompt");
            if wrap {
                structure = structure.with_element(Element::container("section", names.clone()));
            }
            let mut variables = HashMap::new();
            for (name, text) in names.iter().zip(texts) {
                structure = structure.with_element(Element::content(name.as_str()).required());
                variables.insert(name.clone(), Value::String(text));
            }
            (
                Template::new("generated", structure).with_optimization_level(level),
                variables,
            )
        })
        .prop_filter("container name must not collide", |(template, _)| {
            let names: BTreeSet<_> = template.structure.elements.iter().map(|e| &e.name).collect();
            names.len() == template.structure.elements.len()
        })
}

proptest! {
    /// Generating twice from the same inputs yields identical documents
    #[test]
    fn prop_generation_is_deterministic((template, variables) in template_strategy()) {
        let first = generate(&template, &variables, None).unwrap();
        let second = generate(&template, &variables, None).unwrap();
        prop_assert_eq!(&first, &second);

        let first = parse(&first).unwrap();
        let second = parse(&second).unwrap();
        prop_assert_eq!(first.info, second.info);
        prop_assert_eq!(score(&first, &template), score(&second, &template));
    }

    /// Every bound value comes back as the text of its element
    #[test]
    fn prop_generated_values_round_trip((template, variables) in template_strategy()) {
        let output = generate(&template, &variables, None).unwrap();
        let parsed = parse(&output).unwrap();
        prop_assert_eq!(parsed.root.as_str(), "prompt");
        for (name, value) in &variables {
            let element = parsed.find(name).next();
            prop_assert!(element.is_some(), "missing <{}>", name);
            prop_assert_eq!(Some(element.unwrap().text.as_str()), value.as_str());
        }
    }

    /// Generated documents satisfy their own template in strict mode
    #[test]
    fn prop_generated_documents_validate((template, variables) in template_strategy()) {
        let output = generate(&template, &variables, None).unwrap();
        let parsed = parse(&output).unwrap();
        let findings = validate(&parsed, &template, true);
        prop_assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
    }

    /// The AI transform changes layout only, never structure or text
    #[test]
    fn prop_ai_transform_preserves_structure((template, variables) in template_strategy()) {
        let plain = GenerationContext::new().with_optimize_for_ai(false);
        let optimized = GenerationContext::new().with_optimize_for_ai(true);
        let plain = parse(&generate(&template, &variables, Some(&plain)).unwrap()).unwrap();
        let optimized = parse(&generate(&template, &variables, Some(&optimized)).unwrap()).unwrap();
        prop_assert_eq!(plain.elements, optimized.elements);
        prop_assert_eq!(plain.info, optimized.info);
    }

    /// Removing any required value fails generation naming that variable
    #[test]
    fn prop_missing_value_names_variable(
        (template, mut variables) in template_strategy(),
        index in any::<prop::sample::Index>(),
    ) {
        let mut names: Vec<String> = variables.keys().cloned().collect();
        names.sort();
        let removed = index.get(&names).clone();
        variables.remove(&removed);

        let error = generate(&template, &variables, None).unwrap_err();
        prop_assert!(error.to_string().contains(&removed));
    }

    /// A value holding a character XML cannot carry fails generation naming its variable
    #[test]
    fn prop_forbidden_character_names_variable(
        (template, mut variables) in template_strategy(),
        index in any::<prop::sample::Index>(),
        position in any::<prop::sample::Index>(),
        forbidden in forbidden_char_strategy(),
    ) {
        let mut names: Vec<String> = variables.keys().cloned().collect();
        names.sort();
        let target = index.get(&names).clone();

        let mut chars: Vec<char> = variables[&target].as_str().unwrap().chars().collect();
        chars.insert(position.index(chars.len() + 1), forbidden);
        variables.insert(target.clone(), Value::String(chars.into_iter().collect()));

        let error = generate(&template, &variables, None).unwrap_err();
        let names_target = matches!(
            &error,
            XmlError::Binding(BindingError::InvalidValue { name, .. }) if name == &target
        );
        prop_assert!(names_target, "unexpected error: {}", error);
    }
}
