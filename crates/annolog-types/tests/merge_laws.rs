use annolog_types::{fold, ColumnSchema, ImageFileType, LoggedType};
use proptest::collection::{btree_map, btree_set, vec};
use proptest::prelude::*;

fn layer_name() -> impl Strategy<Value = String> {
    prop_oneof![Just("det"), Just("gt"), Just("seg")].prop_map(String::from)
}

fn class_id() -> impl Strategy<Value = String> {
    (0u8..6).prop_map(|id| id.to_string())
}

fn layers() -> impl Strategy<Value = std::collections::BTreeMap<String, std::collections::BTreeSet<String>>> {
    btree_map(layer_name(), btree_set(class_id(), 0..4), 0..3)
}

/// Descriptors whose class names may disagree across values
fn descriptor() -> impl Strategy<Value = ImageFileType> {
    (
        layers(),
        btree_set(prop_oneof![Just("iou"), Just("confidence")].prop_map(String::from), 0..3),
        layers(),
        btree_map(
            class_id(),
            proptest::option::of(prop_oneof![Just("cat"), Just("dog"), Just("car")].prop_map(String::from)),
            0..4,
        ),
    )
        .prop_map(|(box_layers, box_score_keys, mask_layers, class_map)| ImageFileType {
            box_layers,
            box_score_keys,
            mask_layers,
            class_map,
        })
}

/// Descriptors where every non-null name is a function of the id
fn consistent_descriptor() -> impl Strategy<Value = ImageFileType> {
    (descriptor(), vec(any::<bool>(), 6)).prop_map(|(mut d, named)| {
        for (id, name) in &mut d.class_map {
            let idx: usize = id.parse().unwrap_or(0);
            *name = named[idx].then(|| format!("class_{id}"));
        }
        d
    })
}

proptest! {
    #[test]
    fn prop_merge_is_associative(a in descriptor(), b in descriptor(), c in descriptor()) {
        prop_assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
    }

    #[test]
    fn prop_identity_is_neutral(a in descriptor()) {
        prop_assert_eq!(a.merge(&ImageFileType::new()), a.clone());
        prop_assert_eq!(ImageFileType::new().merge(&a), a);
    }

    #[test]
    fn prop_merge_commutes_without_conflicts(a in descriptor(), b in descriptor()) {
        let (ab, conflicts) = a.merge_reporting(&b);
        if conflicts.is_empty() {
            prop_assert_eq!(ab, b.merge(&a));
        }
    }

    #[test]
    fn prop_conflict_keeps_left_name(a in descriptor(), b in descriptor()) {
        let (merged, conflicts) = a.merge_reporting(&b);
        for conflict in conflicts {
            prop_assert_eq!(merged.class_map[&conflict.id].as_deref(), Some(conflict.kept.as_str()));
            prop_assert_eq!(a.class_map[&conflict.id].as_deref(), Some(conflict.kept.as_str()));
        }
    }

    #[test]
    fn prop_fold_ignores_order_when_names_agree(ds in vec(consistent_descriptor(), 0..6)) {
        let types: Vec<LoggedType> = ds.into_iter().map(Into::into).collect();
        let forward = fold(&types);
        let backward = fold(types.iter().rev());
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn prop_column_memo_matches_refold(ds in vec(descriptor(), 0..8)) {
        let mut column = ColumnSchema::new("col");
        for (step, d) in ds.into_iter().enumerate() {
            column.observe(step as u64, d.into()).unwrap();
        }
        prop_assert_eq!(column.refold(), column.current().clone());
    }

    #[test]
    fn prop_descriptor_json_is_stable(a in descriptor()) {
        let json = serde_json::to_value(&a).unwrap();
        let back: ImageFileType = serde_json::from_value(json.clone()).unwrap();
        prop_assert_eq!(serde_json::to_value(&back).unwrap(), json);
    }
}
