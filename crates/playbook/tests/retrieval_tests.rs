//! Integration tests for temperature-weighted retrieval
//!
//! Exercises layer allocation across temperature regimes, reputation-only
//! selection and contextual weight adjustment through the public API.

use playbook::memory::retrieval::{Layer, RankedKeyPoint, Ranker, SelectionRequest};
use playbook::memory::types::{KeyPoint, Playbook, format_keypoint_id};

fn create_test_keypoint(position: usize, score: i64, tags: &[&str]) -> KeyPoint {
    KeyPoint::new(
        format_keypoint_id(position),
        format!("Testing knowledge {position}"),
        score,
        tags.iter().map(|t| t.to_string()).collect(),
    )
}

/// Six proven key points (scores 2-7) followed by six recommendations
/// (alternating scores 1 and 0), all tagged `testing`.
fn create_layered_playbook() -> Playbook {
    let mut key_points = Vec::new();
    for i in 0..6 {
        key_points.push(create_test_keypoint(i + 1, 2 + i as i64, &["testing"]));
    }
    for i in 0..6 {
        let score = if i % 2 == 0 { 1 } else { 0 };
        key_points.push(create_test_keypoint(i + 7, score, &["testing"]));
    }
    Playbook::new(key_points)
}

fn ids(selection: &[RankedKeyPoint<'_>]) -> Vec<String> {
    selection.iter().map(|r| r.key_point.id.clone()).collect()
}

fn count_layer(selection: &[RankedKeyPoint<'_>], layer: Layer) -> usize {
    selection.iter().filter(|r| r.ranking.layer == layer).count()
}

mod temperature_tests {
    use super::*;

    #[test]
    fn test_conservative_leads_with_proven() {
        let playbook = create_layered_playbook();
        let request = SelectionRequest::new(["testing"], 6).with_temperature(0.1);

        let selection = Ranker::default().select(&playbook, &request);

        assert_eq!(
            ids(&selection),
            vec!["kpt_006", "kpt_005", "kpt_004", "kpt_003", "kpt_007", "kpt_009"]
        );
        assert!(selection[..4].iter().all(|r| r.ranking.layer == Layer::HighConfidence));
        assert_eq!(selection[4].ranking.layer_rank, 1);
        assert_eq!(selection[5].ranking.layer_rank, 2);
    }

    #[test]
    fn test_exploratory_leads_with_recommendations() {
        let playbook = create_layered_playbook();
        let request = SelectionRequest::new(["testing"], 6).with_temperature(0.9);

        let selection = Ranker::default().select(&playbook, &request);

        assert_eq!(selection.len(), 6);
        assert!(selection[..4].iter().all(|r| r.ranking.layer == Layer::Recommendation));
        assert_eq!(&ids(&selection)[4..], ["kpt_006", "kpt_005"]);
    }

    #[test]
    fn test_proven_share_falls_as_temperature_rises() {
        let playbook = create_layered_playbook();
        let ranker = Ranker::default();

        let proven: Vec<usize> = [0.1, 0.5, 0.9]
            .iter()
            .map(|&t| {
                let request = SelectionRequest::new(["testing"], 6).with_temperature(t);
                count_layer(&ranker.select(&playbook, &request), Layer::HighConfidence)
            })
            .collect();

        assert_eq!(proven, vec![4, 3, 2]);
    }

    #[test]
    fn test_balanced_orders_by_weight() {
        let playbook = create_layered_playbook();
        let request = SelectionRequest::new(["testing"], 6).with_temperature(0.5);

        let selection = Ranker::default().select(&playbook, &request);

        let weights: Vec<f64> = selection.iter().map(|r| r.ranking.weight).collect();
        assert!(weights.windows(2).all(|pair| pair[0] >= pair[1]));
        assert_eq!(
            ids(&selection),
            vec!["kpt_006", "kpt_005", "kpt_004", "kpt_007", "kpt_009", "kpt_011"]
        );
    }

    #[test]
    fn test_out_of_range_temperature_is_clamped() {
        let playbook = create_layered_playbook();
        let ranker = Ranker::default();

        let hot = ranker.select(&playbook, &SelectionRequest::new(["testing"], 6).with_temperature(7.0));
        let max = ranker.select(&playbook, &SelectionRequest::new(["testing"], 6).with_temperature(1.0));
        assert_eq!(ids(&hot), ids(&max));
    }
}

mod selection_tests {
    use super::*;

    #[test]
    fn test_empty_tags_select_by_reputation() {
        let playbook = Playbook::new(vec![
            create_test_keypoint(1, 1, &["a"]),
            create_test_keypoint(2, -2, &["b"]),
            create_test_keypoint(3, 4, &["c"]),
            create_test_keypoint(4, 1, &["d"]),
        ]);
        let ranker = Ranker::default();

        for temperature in [0.0, 0.5, 1.0] {
            let request = SelectionRequest::new(Vec::<String>::new(), 10).with_temperature(temperature);
            let selection = ranker.select(&playbook, &request);
            assert_eq!(ids(&selection), vec!["kpt_003", "kpt_001", "kpt_004"]);
        }
    }

    #[test]
    fn test_blank_tags_behave_as_empty() {
        let playbook = Playbook::new(vec![create_test_keypoint(1, 2, &["a"])]);
        let request = SelectionRequest::new(["  ", ""], 3);

        let selection = Ranker::default().select(&playbook, &request);
        assert_eq!(ids(&selection), vec!["kpt_001"]);
        assert_eq!(selection[0].ranking.multiplier, 1.0);
    }

    #[test]
    fn test_unmatched_tags_select_nothing() {
        let playbook = create_layered_playbook();
        let request = SelectionRequest::new(["kubernetes"], 6);
        assert!(Ranker::default().select(&playbook, &request).is_empty());
    }

    #[test]
    fn test_empty_playbook_selects_nothing() {
        let request = SelectionRequest::new(["testing"], 6);
        assert!(Ranker::default().select(&Playbook::default(), &request).is_empty());
    }

    #[test]
    fn test_request_tags_are_normalized() {
        let playbook = Playbook::new(vec![create_test_keypoint(1, 0, &["testing"])]);
        let request = SelectionRequest::new([" Testing "], 3);

        let selection = Ranker::default().select(&playbook, &request);
        assert_eq!(selection.len(), 1);
        assert_eq!(selection[0].ranking.match_score, 3);
    }

    #[test]
    fn test_limit_bounds_result() {
        let playbook = create_layered_playbook();
        for limit in 1..=12 {
            let request = SelectionRequest::new(["testing"], limit).with_temperature(0.1);
            assert!(Ranker::default().select(&playbook, &request).len() <= limit);
        }
    }

    #[test]
    fn test_unbounded_limit_returns_every_match() {
        let playbook = create_layered_playbook();
        for temperature in [0.1, 0.5, 0.9] {
            let request = SelectionRequest::new(["testing"], usize::MAX).with_temperature(temperature);
            assert_eq!(Ranker::default().select(&playbook, &request).len(), 12);
        }
    }
}

mod context_tests {
    use super::*;

    #[test]
    fn test_urgent_context_weights() {
        let playbook = Playbook::new(vec![create_test_keypoint(1, 3, &["bug"])]);
        let request = SelectionRequest::new(["bug"], 1).with_temperature(0.5);

        let selection = Ranker::default().select(&playbook, &request);

        let ranking = &selection[0].ranking;
        assert_eq!(ranking.base_weight, 22.0);
        assert!((ranking.multiplier - 2.2).abs() < 1e-9);
        assert!((ranking.weight - 48.4).abs() < 1e-9);
    }

    #[test]
    fn test_risky_recommendation_discounted() {
        let safe = create_test_keypoint(1, 0, &["testing"]);
        let mut risky = create_test_keypoint(2, 0, &["testing"]);
        risky.signals.risk_level = 0.5;
        let playbook = Playbook::new(vec![risky, safe]);
        let request = SelectionRequest::new(["testing"], 4).with_temperature(0.5);

        let selection = Ranker::default().select(&playbook, &request);

        assert_eq!(ids(&selection), vec!["kpt_001", "kpt_002"]);
        let ratio = selection[1].ranking.multiplier / selection[0].ranking.multiplier;
        assert!((ratio - 0.8).abs() < 1e-9);
    }
}
