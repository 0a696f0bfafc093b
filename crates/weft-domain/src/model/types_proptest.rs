//! Property-based tests for model identifier formats.

use proptest::prelude::*;

use crate::model::{ObjectRef, SubjectRef};

/// Strategy for valid object references in type:id format.
fn object_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{1,10}", "[a-z0-9_-]{1,20}").prop_map(|(t, id)| format!("{t}:{id}"))
}

/// Strategy for userset references in type:id#relation format.
fn userset_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{1,10}", "[a-z0-9_-]{1,10}", "[a-z_]{1,12}")
        .prop_map(|(t, id, rel)| format!("{t}:{id}#{rel}"))
}

proptest! {
    #[test]
    fn test_object_parse_display_roundtrip(value in object_strategy()) {
        let object = ObjectRef::parse(&value);
        prop_assert!(object.is_ok(), "failed for object: {}", value);
        prop_assert_eq!(object.unwrap().to_string(), value);
    }

    #[test]
    fn test_subject_object_roundtrip(value in object_strategy()) {
        let subject = SubjectRef::parse(&value);
        prop_assert!(subject.is_ok(), "failed for subject: {}", value);
        let subject = subject.unwrap();
        prop_assert!(matches!(subject, SubjectRef::Object(_)));
        prop_assert_eq!(subject.to_string(), value);
    }

    #[test]
    fn test_subject_userset_roundtrip(value in userset_strategy()) {
        let subject = SubjectRef::parse(&value);
        prop_assert!(subject.is_ok(), "failed for userset: {}", value);
        let subject = subject.unwrap();
        prop_assert!(matches!(subject, SubjectRef::Userset { .. }), "expected userset variant");
        prop_assert_eq!(subject.to_string(), value);
    }

    #[test]
    fn test_value_without_colon_is_rejected(value in "[a-z]{1,20}") {
        prop_assert!(ObjectRef::parse(&value).is_err());
        prop_assert!(SubjectRef::parse(&value).is_err());
    }
}
