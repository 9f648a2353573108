//! Property tests: templates validate themselves, and a required field of the
//! wrong type is always reported by name.

use agora_schema::{validate, Descriptor};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Leaf templates whose example value also satisfies the compiled descriptor.
fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1.0e6f64..1.0e6).prop_map(Value::from),
        Just(Value::String(String::new())),
    ]
}

fn template() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// A value whose kind differs from the leaf template's kind.
fn wrong_kind(template: &Value) -> Value {
    match template {
        Value::String(_) => Value::from(7),
        _ => Value::String("wrong".to_string()),
    }
}

proptest! {
    #[test]
    fn template_validates_against_itself(t in template()) {
        let descriptor = Descriptor::compile(&t).unwrap();
        prop_assert!(validate(&t, &descriptor).is_ok());
    }

    #[test]
    fn wrong_type_in_required_field_is_named(
        fields in prop::collection::btree_map("[a-z]{1,6}", leaf(), 1..5),
        pick in any::<prop::sample::Index>(),
    ) {
        let record: Map<String, Value> = fields.into_iter().collect();
        let template = Value::Object(record.clone());
        let descriptor = Descriptor::compile(&template).unwrap();

        let typed: Vec<&String> = record
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| k)
            .collect();
        prop_assume!(!typed.is_empty());
        let name = typed[pick.index(typed.len())].clone();

        let mut mutated = record.clone();
        mutated.insert(name.clone(), wrong_kind(&record[&name]));

        let err = validate(&Value::Object(mutated), &descriptor).unwrap_err();
        prop_assert_eq!(err.field, format!("$.{name}"));
    }
}
