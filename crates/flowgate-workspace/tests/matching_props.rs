//! Matching depends only on the event file's basename.

use std::path::PathBuf;

use flowgate_workspace::{MatchingHierarchies, Workspace};
use proptest::prelude::*;

const WORKSPACE: &str = r#"{
  "samples": {
    "a": { "filename": "tube_01.csv" },
    "b": { "filename": "tube_02.csv" }
  },
  "groups": {
    "g1": { "name": "One", "samples": ["a"], "populations": [{ "label": "X" }] },
    "g2": { "name": "Both", "samples": ["a", "b"], "populations": [{ "label": "Y" }] }
  }
}"#;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn directory_prefix_never_changes_the_match(
        dirs in proptest::collection::vec("[a-z0-9_]{1,8}", 0..5),
        second in any::<bool>(),
    ) {
        let workspace = Workspace::from_json_str(WORKSPACE).unwrap();
        let file = if second { "tube_02.csv" } else { "tube_01.csv" };
        let path: PathBuf = dirs.iter().map(String::as_str).chain([file]).collect();

        let expected = if second {
            MatchingHierarchies { sample_id: "b".into(), groups: vec!["g2".into()] }
        } else {
            MatchingHierarchies { sample_id: "a".into(), groups: vec!["g1".into(), "g2".into()] }
        };
        prop_assert_eq!(workspace.find_matching(&path), Some(expected));
    }

    #[test]
    fn other_basenames_never_match(name in "[a-z]{1,10}\\.csv") {
        prop_assume!(name != "tube_01.csv" && name != "tube_02.csv");
        let workspace = Workspace::from_json_str(WORKSPACE).unwrap();
        prop_assert!(workspace.find_matching(&name).is_none());
    }
}
