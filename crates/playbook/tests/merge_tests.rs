//! Integration tests for the merge engine
//!
//! Covers the size cap, the eviction floor, identifier compaction, the guard
//! against truncated merged lists and no-op merge idempotence.

use std::collections::BTreeSet;

use playbook::memory::merge::{MergeEngine, MergeMode, MergePolicy};
use playbook::memory::scoring::RatingScale;
use playbook::memory::types::{
    CandidateKeyPoint, EVICTION_FLOOR, Evaluation, ExtractionResult, KeyPoint, MAX_KEYPOINTS,
    Playbook, compare_by_reputation, format_keypoint_id,
};

fn create_test_keypoint(position: usize, score: i64, tags: &[&str]) -> KeyPoint {
    KeyPoint::new(
        format_keypoint_id(position),
        format!("Knowledge item {position}"),
        score,
        tags.iter().map(|t| t.to_string()).collect(),
    )
}

fn create_test_playbook(scores: &[i64]) -> Playbook {
    Playbook::new(
        scores
            .iter()
            .enumerate()
            .map(|(idx, score)| create_test_keypoint(idx + 1, *score, &["general"]))
            .collect(),
    )
}

fn texts(playbook: &Playbook) -> BTreeSet<String> {
    playbook.key_points.iter().map(|kp| kp.text.clone()).collect()
}

fn total_score(playbook: &Playbook) -> i64 {
    playbook.key_points.iter().map(|kp| kp.score).sum()
}

fn assert_ids_compact(playbook: &Playbook) {
    for (idx, kp) in playbook.key_points.iter().enumerate() {
        assert_eq!(kp.id, format_keypoint_id(idx + 1));
    }
}

mod cap_tests {
    use super::*;

    #[test]
    fn test_cap_keeps_highest_ranked() {
        let scores: Vec<i64> = (0..MAX_KEYPOINTS + 15).map(|i| (i % 7) as i64 - 2).collect();
        let mut playbook = create_test_playbook(&scores);

        let mut expected = playbook.key_points.clone();
        expected.retain(|kp| kp.score > EVICTION_FLOOR);
        expected.sort_by(compare_by_reputation);
        expected.truncate(MAX_KEYPOINTS);
        let expected: BTreeSet<String> = expected.into_iter().map(|kp| kp.text).collect();

        let report = MergeEngine::default().merge(&mut playbook, &ExtractionResult::default());

        assert_eq!(playbook.len(), MAX_KEYPOINTS);
        assert_eq!(report.evicted_over_cap, 15);
        assert_eq!(texts(&playbook), expected);
        assert_ids_compact(&playbook);
    }

    #[test]
    fn test_cap_holds_across_merge_sequence() {
        let engine = MergeEngine::new(MergePolicy {
            max_keypoints: 20,
            ..MergePolicy::default()
        });
        let mut playbook = Playbook::default();

        for batch in 0..10 {
            let candidates = (0..5)
                .map(|i| CandidateKeyPoint::new(format!("batch {batch} item {i}")))
                .collect();
            engine.merge(&mut playbook, &ExtractionResult::incremental(candidates));
            assert!(playbook.len() <= 20);
            assert_ids_compact(&playbook);
        }
        assert_eq!(playbook.len(), 20);
    }
}

mod floor_tests {
    use super::*;

    #[test]
    fn test_no_survivor_at_or_below_floor() {
        let mut playbook = create_test_playbook(&[0, 1, -4, 3]);
        let engine = MergeEngine::default();

        for round in 0..4 {
            let evaluations = playbook
                .key_points
                .iter()
                .map(|kp| {
                    let rating = if round % 2 == 0 { "moderately_harmful" } else { "slightly_useful" };
                    Evaluation::new(kp.id.clone(), rating)
                })
                .collect();
            engine.merge(
                &mut playbook,
                &ExtractionResult::default().with_evaluations(evaluations),
            );
            assert!(playbook.key_points.iter().all(|kp| kp.score > EVICTION_FLOOR));
        }
    }

    #[test]
    fn test_exactly_floor_is_evicted() {
        let mut playbook = create_test_playbook(&[-3, 2]);
        let result = ExtractionResult::default()
            .with_evaluations(vec![Evaluation::new("kpt_001", "moderately_harmful")]);

        let report = MergeEngine::default().merge(&mut playbook, &result);

        assert_eq!(report.evicted_below_floor, 1);
        assert_eq!(playbook.len(), 1);
        assert_eq!(playbook.key_points[0].text, "Knowledge item 2");
        assert_eq!(playbook.key_points[0].id, "kpt_001");
    }

    #[test]
    fn test_three_bucket_harmful() {
        let engine = MergeEngine::new(MergePolicy {
            ratings: RatingScale::three_bucket(),
            ..MergePolicy::default()
        });
        let mut playbook = create_test_playbook(&[-2]);
        let result = ExtractionResult::default()
            .with_evaluations(vec![Evaluation::new("kpt_001", "harmful")]);

        engine.merge(&mut playbook, &result);
        assert!(playbook.is_empty());
    }
}

mod full_merge_tests {
    use super::*;

    #[test]
    fn test_echo_merge_is_idempotent() {
        let mut playbook = create_test_playbook(&[3, 0, -1, 2]);
        let before_texts = texts(&playbook);
        let before_total = total_score(&playbook);

        let echo: Vec<CandidateKeyPoint> = playbook
            .key_points
            .iter()
            .map(|kp| {
                CandidateKeyPoint::new(kp.text.clone())
                    .with_tags(kp.tags.clone())
                    .with_sources([kp.id.clone()])
            })
            .collect();
        let report = MergeEngine::default().merge(&mut playbook, &ExtractionResult::full(echo));

        assert_eq!(report.mode, MergeMode::Full);
        assert_eq!(texts(&playbook), before_texts);
        assert_eq!(total_score(&playbook), before_total);
    }

    #[test]
    fn test_echo_by_text_only_is_idempotent() {
        let mut playbook = create_test_playbook(&[1, 2, 3]);
        let before_total = total_score(&playbook);

        let echo: Vec<CandidateKeyPoint> = playbook
            .key_points
            .iter()
            .map(|kp| CandidateKeyPoint::new(kp.text.clone()))
            .collect();
        MergeEngine::default().merge(&mut playbook, &ExtractionResult::full(echo));

        assert_eq!(playbook.len(), 3);
        assert_eq!(total_score(&playbook), before_total);
        assert!(playbook.key_points.iter().all(|kp| kp.tags == vec!["general"]));
    }

    #[test]
    fn test_full_merge_confirms_pending() {
        let mut playbook = create_test_playbook(&[1]);
        playbook
            .key_points
            .push(create_test_keypoint(2, 0, &["fresh"]).into_pending());

        let merged = vec![
            CandidateKeyPoint::new("Knowledge item 1"),
            CandidateKeyPoint::new("Knowledge item 2"),
        ];
        MergeEngine::default().merge(&mut playbook, &ExtractionResult::full(merged));

        assert!(playbook.key_points.iter().all(|kp| !kp.pending));
        assert_eq!(playbook.key_points[1].tags, vec!["fresh"]);
    }

    #[test]
    fn test_guard_never_removes_existing() {
        let mut playbook = create_test_playbook(&[1, 2, 3, 4]);
        let before = texts(&playbook);

        let merged = vec![
            CandidateKeyPoint::new("Knowledge item 1"),
            CandidateKeyPoint::new("Condensed summary").with_sources(["kpt_003", "kpt_004"]),
        ];
        let report = MergeEngine::default().merge(&mut playbook, &ExtractionResult::full(merged));

        assert_eq!(report.mode, MergeMode::Guarded);
        assert!(texts(&playbook).is_superset(&before));
        assert_eq!(playbook.len(), 5);
        let summary = playbook
            .key_points
            .iter()
            .find(|kp| kp.text == "Condensed summary")
            .expect("summary appended");
        assert_eq!(summary.score, 7);
    }

    #[test]
    fn test_empty_merged_list_against_empty_playbook() {
        let mut playbook = Playbook::default();
        let report =
            MergeEngine::default().merge(&mut playbook, &ExtractionResult::full(Vec::new()));
        assert_eq!(report.mode, MergeMode::Full);
        assert!(playbook.is_empty());
    }
}

mod batch_parsing_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_malformed_entries_do_not_abort_batch() {
        let result: ExtractionResult = serde_json::from_value(json!({
            "new_key_points": [
                {"text": "Valid entry", "tags": ["ok"]},
                {"text": 17},
                null,
                "Another valid entry"
            ],
            "evaluations": [{"id": "kpt_001", "rating": "highly_effective"}, "junk"]
        }))
        .expect("Failed to parse batch");

        let mut playbook = create_test_playbook(&[0]);
        let report = MergeEngine::default().merge(&mut playbook, &result);

        assert_eq!(report.added, 2);
        assert_eq!(report.evaluations_applied, 1);
        assert_eq!(playbook.get("kpt_001").unwrap().score, 3);
        assert_eq!(playbook.pending().count(), 2);
    }

    #[test]
    fn test_duplicate_texts_within_batch_added_once() {
        let mut playbook = Playbook::default();
        let result = ExtractionResult::incremental(vec![
            CandidateKeyPoint::new("Same text"),
            CandidateKeyPoint::new("Same text"),
        ]);

        MergeEngine::default().merge(&mut playbook, &result);
        assert_eq!(playbook.len(), 1);
    }
}
