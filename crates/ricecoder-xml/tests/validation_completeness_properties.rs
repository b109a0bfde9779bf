//! Property-based tests for validation completeness
//!
//! Stripping required elements from a generated document must be reported
//! for every stripped element, in strict and lenient mode alike, and nothing
//! that is still present may be reported missing. Element names may repeat
//! the root name.

use proptest::prelude::*;
use ricecoder_xml::{
    generate, parse, validate, Document, Element, Layout, Node, Structure, StructureValidator,
    Template, ValidationErrorKind, XmlElement,
};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

const ROOT: &str = "prompt";

/// Names of the required elements, sometimes including the root name
fn required_names_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    (
        prop::collection::btree_set("[a-z][a-z0-9]{0,6}", 1..6),
        any::<bool>(),
    )
        .prop_map(|(mut names, with_root_name)| {
            names.remove("section");
            names.remove("note");
            if with_root_name || names.is_empty() {
                names.insert(ROOT.to_string());
            }
            names
        })
}

/// Template with required content elements, an optional note and an
/// optional wrapping container
fn template_strategy() -> impl Strategy<Value = (Template, HashMap<String, Value>)> {
    (required_names_strategy(), any::<bool>()).prop_map(|(names, wrap)| {
        let mut structure = Structure::new(ROOT).with_element(Element::content("note"));
        if wrap {
            structure = structure.with_element(Element::container("section", names.clone()));
        }
        let mut variables = HashMap::new();
        for name in &names {
            structure = structure.with_element(Element::content(name.as_str()).required());
            variables.insert(name.clone(), Value::String(format!("text for {}", name)));
        }
        (Template::new("completeness", structure), variables)
    })
}

/// Template, variables and a non-empty selection of required elements to strip
fn stripped_case_strategy() -> impl Strategy<Value = (Template, HashMap<String, Value>, Vec<String>)> {
    template_strategy().prop_flat_map(|(template, variables)| {
        let required: Vec<String> = template
            .structure
            .elements
            .iter()
            .filter(|e| e.required)
            .map(|e| e.name.clone())
            .collect();
        let len = required.len();
        (
            Just(template),
            Just(variables),
            prop::sample::subsequence(required, 1..=len),
        )
    })
}

/// Removes every element below `element` carrying the name
fn strip(element: &mut XmlElement, name: &str) {
    element
        .children
        .retain(|node| !matches!(node, Node::Element(child) if child.name == name));
    for child in element.elements_mut() {
        strip(child, name);
    }
}

fn generate_and_strip(template: &Template, variables: &HashMap<String, Value>, names: &[String]) -> String {
    let generated = generate(template, variables, None).unwrap();
    let mut document = Document::parse(&generated).unwrap();
    for name in names {
        strip(&mut document.root, name);
    }
    document.serialize(Layout::Verbatim, 2)
}

proptest! {
    /// Every stripped required element is reported missing, and only those
    #[test]
    fn prop_stripped_required_elements_are_reported(
        (template, variables, stripped) in stripped_case_strategy(),
    ) {
        let parsed = parse(&generate_and_strip(&template, &variables, &stripped)).unwrap();
        prop_assert_eq!(parsed.root.as_str(), ROOT);

        let expected: BTreeSet<&str> = stripped.iter().map(String::as_str).collect();
        for strict in [true, false] {
            let findings = validate(&parsed, &template, strict);
            let missing: BTreeSet<&str> = findings
                .iter()
                .filter(|f| f.kind == ValidationErrorKind::MissingElement)
                .filter_map(|f| f.element.as_deref())
                .collect();
            prop_assert_eq!(&missing, &expected, "strict = {}", strict);
            prop_assert!(!StructureValidator::is_valid(&findings));
        }
    }

    /// Stripping the optional note keeps the document valid
    #[test]
    fn prop_stripped_optional_element_stays_valid((template, variables) in template_strategy()) {
        let parsed = parse(&generate_and_strip(&template, &variables, &["note".to_string()])).unwrap();
        prop_assert!(parsed.find("note").next().is_none());

        let findings = validate(&parsed, &template, true);
        prop_assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
    }
}
