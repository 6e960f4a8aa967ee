//! Reciprocal Rank Fusion (RRF) for combining search results.

use std::collections::{HashMap, HashSet};

use chatsearch_core::{MatchType, MessageId};

/// RRF constant (commonly 60).
/// Higher values flatten the difference between adjacent ranks.
pub const DEFAULT_RRF_K: u32 = 60;

/// A candidate after fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    /// Message id.
    pub id: MessageId,

    /// Sum of the RRF contributions of every list the id appears in.
    pub score: f64,

    /// Which lists the id was found in.
    pub match_type: MatchType,

    /// Sum of the 0-based ranks over the lists the id appears in.
    pub rank_sum: usize,
}

/// Fuse ranked result lists using Reciprocal Rank Fusion.
///
/// RRF score = Σ 1 / (rrf_k + rank + 1) over the lists containing the id,
/// with rank 0-based. Only positions count; the per-list scores are
/// ignored because they are not comparable across lists.
///
/// Output is sorted by fused score descending, then by the lower rank sum,
/// then by ascending id, and truncated to `limit`. An id repeated within
/// one list only counts at its first position.
///
/// # Arguments
/// * `results` - Result lists, each tagged with the path that produced it
/// * `rrf_k` - Smoothing constant
/// * `limit` - Maximum number of results to return
pub fn reciprocal_rank_fusion(
    results: &[(MatchType, &[(MessageId, f32)])],
    rrf_k: u32,
    limit: usize,
) -> Vec<FusedCandidate> {
    let k = rrf_k as f64;
    let mut fused: HashMap<MessageId, FusedCandidate> = HashMap::new();

    for (origin, result_list) in results {
        let mut seen_in_list: HashSet<MessageId> = HashSet::with_capacity(result_list.len());

        for (rank, (id, _original_score)) in result_list.iter().enumerate() {
            if !seen_in_list.insert(*id) {
                continue;
            }

            let rrf_score = 1.0 / (k + rank as f64 + 1.0);
            fused
                .entry(*id)
                .and_modify(|candidate| {
                    candidate.score += rrf_score;
                    candidate.rank_sum += rank;
                    candidate.match_type = candidate.match_type.merge(*origin);
                })
                .or_insert(FusedCandidate {
                    id: *id,
                    score: rrf_score,
                    match_type: *origin,
                    rank_sum: rank,
                });
        }
    }

    let mut fused: Vec<FusedCandidate> = fused.into_values().collect();
    fused.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.rank_sum.cmp(&b.rank_sum))
            .then_with(|| a.id.cmp(&b.id))
    });

    fused.truncate(limit);

    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[MessageId]) -> Vec<(MessageId, f32)> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| (*id, 1.0 - i as f32 * 0.1))
            .collect()
    }

    fn rrf(rank: usize) -> f64 {
        1.0 / (60.0 + rank as f64 + 1.0)
    }

    #[test]
    fn test_rrf_single_list() {
        let vector = list(&[3, 1, 2]);
        let fused = reciprocal_rank_fusion(&[(MatchType::Vector, vector.as_slice())], DEFAULT_RRF_K, 10);

        assert_eq!(fused.len(), 3);
        assert_eq!(fused[0].id, 3);
        assert!((fused[0].score - rrf(0)).abs() < 1e-12);
        assert!(fused.iter().all(|c| c.match_type == MatchType::Vector));
    }

    #[test]
    fn test_rrf_contributions_are_additive() {
        let vector = list(&[1, 2, 3]);
        let lexical = list(&[2, 4, 1]);

        let fused = reciprocal_rank_fusion(
            &[(MatchType::Vector, vector.as_slice()), (MatchType::Lexical, lexical.as_slice())],
            DEFAULT_RRF_K,
            10,
        );

        let score = |id: MessageId| fused.iter().find(|c| c.id == id).unwrap().score;

        // 2: rank 1 + rank 0, 1: rank 0 + rank 2
        assert!((score(2) - (rrf(1) + rrf(0))).abs() < 1e-12);
        assert!((score(1) - (rrf(0) + rrf(2))).abs() < 1e-12);
        assert!(score(2) >= rrf(0));
        assert!(score(1) >= rrf(0));

        assert_eq!(fused[0].id, 2);
        assert_eq!(fused[1].id, 1);
        assert_eq!(fused[0].match_type, MatchType::Hybrid);
    }

    #[test]
    fn test_origin_tags() {
        let vector = list(&[1, 2]);
        let lexical = list(&[2, 3]);

        let fused = reciprocal_rank_fusion(
            &[(MatchType::Vector, vector.as_slice()), (MatchType::Lexical, lexical.as_slice())],
            DEFAULT_RRF_K,
            10,
        );

        let tag = |id: MessageId| fused.iter().find(|c| c.id == id).unwrap().match_type;
        assert_eq!(tag(1), MatchType::Vector);
        assert_eq!(tag(2), MatchType::Hybrid);
        assert_eq!(tag(3), MatchType::Lexical);
    }

    #[test]
    fn test_ties_break_by_id() {
        // 5 and 9 both sit at rank 0 of one list
        let vector = list(&[9]);
        let lexical = list(&[5]);

        for _ in 0..5 {
            let fused = reciprocal_rank_fusion(
                &[(MatchType::Vector, vector.as_slice()), (MatchType::Lexical, lexical.as_slice())],
                DEFAULT_RRF_K,
                10,
            );
            let ids: Vec<MessageId> = fused.iter().map(|c| c.id).collect();
            assert_eq!(ids, vec![5, 9]);
        }
    }

    #[test]
    fn test_rank_sum_tracked() {
        // 7 sits at ranks 0 and 3, 4 at ranks 1 and 2
        let vector = list(&[7, 4, 8, 9]);
        let lexical = list(&[10, 11, 4, 7]);

        let fused = reciprocal_rank_fusion(
            &[(MatchType::Vector, vector.as_slice()), (MatchType::Lexical, lexical.as_slice())],
            DEFAULT_RRF_K,
            10,
        );

        let seven = fused.iter().find(|c| c.id == 7).unwrap();
        let four = fused.iter().find(|c| c.id == 4).unwrap();
        assert_eq!(seven.rank_sum, 3);
        assert_eq!(four.rank_sum, 3);
        assert!(seven.score > four.score);
    }

    #[test]
    fn test_equal_scores_prefer_lower_rank_sum() {
        // 3 sits at rank 61 in both lists: 2 / 122 == 1 / 61, the score of
        // a rank-0 hit on one path. The lower rank sum wins over the lower id.
        let mut vector_ids: Vec<MessageId> = vec![7];
        vector_ids.extend(2000..2060);
        vector_ids.push(3);
        let mut lexical_ids: Vec<MessageId> = vec![9];
        lexical_ids.extend(3000..3060);
        lexical_ids.push(3);

        let vector = list(&vector_ids);
        let lexical = list(&lexical_ids);

        let fused = reciprocal_rank_fusion(
            &[(MatchType::Vector, vector.as_slice()), (MatchType::Lexical, lexical.as_slice())],
            DEFAULT_RRF_K,
            3,
        );

        let ids: Vec<MessageId> = fused.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![7, 9, 3]);

        assert_eq!(fused[0].score, fused[2].score);
        assert_eq!(fused[1].score, fused[2].score);
        assert_eq!(fused[0].rank_sum, 0);
        assert_eq!(fused[2].rank_sum, 122);
        assert_eq!(fused[2].match_type, MatchType::Hybrid);
    }

    #[test]
    fn test_rrf_truncation() {
        let vector = list(&[1, 2, 3, 4, 5]);
        let fused = reciprocal_rank_fusion(&[(MatchType::Vector, vector.as_slice())], DEFAULT_RRF_K, 3);

        assert_eq!(fused.len(), 3);
        assert_eq!(fused.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_in_one_list_counts_once() {
        let vector = vec![(1, 0.9), (1, 0.8), (2, 0.7)];
        let fused = reciprocal_rank_fusion(&[(MatchType::Vector, vector.as_slice())], DEFAULT_RRF_K, 10);

        assert_eq!(fused.len(), 2);
        assert!((fused[0].score - rrf(0)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_lists() {
        let empty: Vec<(MessageId, f32)> = Vec::new();
        let fused = reciprocal_rank_fusion(
            &[(MatchType::Vector, empty.as_slice()), (MatchType::Lexical, empty.as_slice())],
            DEFAULT_RRF_K,
            10,
        );
        assert!(fused.is_empty());
    }
}
