//! Integration tests for the JSON playbook store

use playbook::memory::types::{DIVIDER_TEXT, KeyPoint, Playbook, QualitySignals};
use playbook::storage::PlaybookStore;
use tempfile::TempDir;

fn create_test_store() -> (TempDir, PlaybookStore) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = PlaybookStore::new(dir.path().join("project").join("playbook.json"));
    (dir, store)
}

fn create_test_playbook() -> Playbook {
    Playbook::new(vec![
        KeyPoint::new("kpt_001", "Run cargo fmt before committing", 3, vec!["fmt".into()])
            .with_signals(QualitySignals::new(0.7, -0.3, 0.25)),
        KeyPoint::new("kpt_002", "Avoid unwrap in library code", 1, vec!["errors".into(), "lib".into()]),
        KeyPoint::new("kpt_003", "Try nextest for faster runs", 0, vec!["testing".into()])
            .with_signals(QualitySignals::new(0.5, 0.1, 0.9))
            .into_pending(),
    ])
}

fn write_raw(store: &PlaybookStore, contents: &str) {
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), contents).unwrap();
}

mod round_trip_tests {
    use super::*;

    #[test]
    fn test_save_then_load_restores_playbook() {
        let (_dir, store) = create_test_store();
        let mut playbook = create_test_playbook();

        store.save(&mut playbook).expect("Failed to save");
        let loaded = store.load();

        assert_eq!(loaded, playbook);
        assert!(loaded.key_points[2].pending);
        assert_eq!(loaded.key_points[0].signals, QualitySignals::new(0.7, -0.3, 0.25));
    }

    #[test]
    fn test_save_enforces_floor_and_tag_normalization() {
        let (_dir, store) = create_test_store();
        let mut playbook = create_test_playbook();
        playbook
            .key_points
            .push(KeyPoint::new("kpt_004", "Sank below the floor", -9, vec!["misc".into()]));
        playbook.key_points[1].tags = vec!["Errors".into(), " LIB ".into(), "errors".into()];

        store.save(&mut playbook).expect("Failed to save");

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("Sank below the floor"));
        assert_eq!(playbook.len(), 3);
        assert_eq!(playbook.key_points[1].tags, vec!["errors", "lib"]);

        let mut loaded = store.load();
        assert_eq!(loaded.key_points, playbook.key_points);

        store.save(&mut loaded).expect("Failed to save again");
        assert_eq!(loaded.key_points, playbook.key_points);
        assert_eq!(store.load().key_points, playbook.key_points);
    }

    #[test]
    fn test_divider_written_before_pending() {
        let (_dir, store) = create_test_store();
        store.save(&mut create_test_playbook()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        let entries = raw["key_points"].as_array().unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[2]["divider"], true);
        assert_eq!(entries[2]["text"], DIVIDER_TEXT);
        assert_eq!(entries[3]["pending"], true);
        assert!(entries[0].get("pending").is_none());
        assert_eq!(raw["version"], "1.0");
        assert!(raw["last_updated"].is_string());
    }

    #[test]
    fn test_ids_compact_after_save() {
        let (_dir, store) = create_test_store();
        let mut playbook = Playbook::new(vec![
            KeyPoint::new("kpt_040", "late pending", 0, vec!["a".into()]).into_pending(),
            KeyPoint::new("kpt_017", "first stable", 2, vec!["b".into()]),
            KeyPoint::new("custom", "second stable", 1, vec!["c".into()]),
        ]);

        store.save(&mut playbook).unwrap();
        let loaded = store.load();

        let summary: Vec<(&str, &str)> = loaded
            .key_points
            .iter()
            .map(|kp| (kp.id.as_str(), kp.text.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("kpt_001", "first stable"),
                ("kpt_002", "second stable"),
                ("kpt_003", "late pending"),
            ]
        );
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let (_dir, store) = create_test_store();
        let mut playbook = create_test_playbook();
        store.save(&mut playbook).unwrap();
        playbook.key_points.truncate(1);
        store.save(&mut playbook).unwrap();

        let names: Vec<String> = std::fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["playbook.json"]);
        assert_eq!(store.load().len(), 1);
    }
}

mod tolerant_load_tests {
    use super::*;

    #[test]
    fn test_non_object_document_loads_empty() {
        let (_dir, store) = create_test_store();
        write_raw(&store, r#"["just", "a", "list"]"#);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_truncated_document_loads_empty() {
        let (_dir, store) = create_test_store();
        write_raw(&store, r#"{"version": "1.0", "key_points": [{"id": "kpt_001", "te"#);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_legacy_entries_get_free_ids() {
        let (_dir, store) = create_test_store();
        write_raw(
            &store,
            r#"{"key_points": [
                "Cache the cargo registry in CI",
                {"id": "kpt_002", "text": "Pin the toolchain", "score": 2, "tags": ["toolchain"]},
                {"divider": true, "text": "--- pending ---"},
                {"text": "Id-less object", "tags": ["misc"], "pending": true},
                17
            ]}"#,
        );

        let playbook = store.load();

        let ids: Vec<&str> = playbook.key_points.iter().map(|kp| kp.id.as_str()).collect();
        assert_eq!(ids, vec!["kpt_003", "kpt_002", "kpt_004"]);
        assert!(playbook.key_points[2].pending);
        assert!(!playbook.key_points[0].tags.is_empty());
    }

    #[test]
    fn test_tags_capped_on_load() {
        let dir = TempDir::new().unwrap();
        let store = PlaybookStore::new(dir.path().join("playbook.json")).with_max_tags(2);
        write_raw(
            &store,
            r#"{"key_points": [{"id": "kpt_001", "text": "x", "tags": ["A", "b", "c", "d"]}]}"#,
        );

        let playbook = store.load();
        assert_eq!(playbook.key_points[0].tags, vec!["a", "b"]);
    }
}
