//! Integration tests for tag normalization and matching

use std::collections::HashSet;

use playbook::memory::tags::{
    EXACT_MATCH, SUBSTRING_MATCH, TOKEN_MATCH, infer_tags_from_text, match_score, normalize_tags,
    score_and_coverage,
};

fn create_test_desired(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

mod normalize_tests {
    use super::*;

    #[test]
    fn test_first_occurrence_wins_after_truncation() {
        let base = "x".repeat(64);
        let a = format!("{base}a");
        let b = format!("{base}b");
        let tags = normalize_tags(&[a.as_str(), b.as_str(), "other"], 6);
        assert_eq!(tags, vec![base, "other".to_string()]);
    }

    #[test]
    fn test_zero_cap_yields_nothing() {
        assert!(normalize_tags(&["rust"], 0).is_empty());
    }

    #[test]
    fn test_cap_counts_kept_tags_only() {
        let tags = normalize_tags(&["", "Rust", "rust", "  ", "async", "tokio"], 2);
        assert_eq!(tags, vec!["rust", "async"]);
    }
}

mod match_tests {
    use super::*;

    #[test]
    fn test_substring_is_symmetric() {
        assert_eq!(match_score("api", "rest-api"), SUBSTRING_MATCH);
        assert_eq!(match_score("rest-api", "api"), SUBSTRING_MATCH);
    }

    #[test]
    fn test_token_match_on_separators() {
        assert_eq!(match_score("ci/cd", "cd_pipeline"), TOKEN_MATCH);
        assert_eq!(match_score("web.server", "server-config"), TOKEN_MATCH);
    }

    #[test]
    fn test_coverage_counts_each_desired_tag_once() {
        let result = score_and_coverage(
            &["testing", "unit-testing", "integration-testing"],
            &create_test_desired(&["testing"]),
            &HashSet::new(),
        );
        assert_eq!(result.coverage, 1);
        assert_eq!(result.best, EXACT_MATCH);
    }

    #[test]
    fn test_best_reflects_strongest_pair() {
        let result = score_and_coverage(
            &["db-migrations"],
            &create_test_desired(&["db", "schema_migrations"]),
            &HashSet::new(),
        );
        assert_eq!(result.coverage, 2);
        assert_eq!(result.best, SUBSTRING_MATCH);
    }

    #[test]
    fn test_uppercase_candidate_tags_are_lowered() {
        let result = score_and_coverage(
            &["Docker"],
            &create_test_desired(&["docker"]),
            &HashSet::from(["docker".to_string()]),
        );
        assert_eq!(result.best, EXACT_MATCH);
        assert_eq!(result.prompt_hits, 1);
    }
}

mod inference_tests {
    use super::*;

    #[test]
    fn test_inference_caps_at_five() {
        let tags = infer_tags_from_text("alpha beta gamma delta epsilon zeta eta theta");
        assert_eq!(tags, vec!["alpha", "beta", "gamma", "delta", "epsilon"]);
    }

    #[test]
    fn test_inference_dedupes_and_lowercases() {
        let tags = infer_tags_from_text("Cargo cargo CARGO workspace");
        assert_eq!(tags, vec!["cargo", "workspace"]);
    }

    #[test]
    fn test_inference_of_empty_text() {
        assert!(infer_tags_from_text("").is_empty());
        assert!(infer_tags_from_text("a an of 42").is_empty());
    }
}
