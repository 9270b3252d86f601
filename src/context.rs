//! Retrieval context assembly.
//!
//! Packs ranked search hits into one context string for a generation
//! model, bounded by a `[min_chars, max_chars]` budget:
//!
//! 1. The first `prefix_count` hits are always included.
//! 2. If that prefix is already `min_chars` long, assembly stops. Otherwise
//!    further hits are added in rank order for as long as they fit under
//!    `max_chars`.
//! 3. The first hit that would overflow `max_chars` is cut to the space left
//!    and marked; assembly stops there.
//!
//! Lengths are counted in characters over the joined context, delimiters
//! included, so the extension phase never pushes the context past
//! `max_chars`. The guaranteed prefix alone may exceed it.


use crate::models::{ContextBundle, Provenance, ScoredHit};

/// Budget and formatting knobs for [`assemble_context`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub min_chars: usize,
    pub max_chars: usize,
    /// Hits included unconditionally.
    pub prefix_count: usize,
    pub delimiter: String,
    /// Appended to a hit cut short by the `max_chars` budget.
    pub truncation_marker: String,
    /// Context returned when there are no hits.
    pub not_found: String,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            min_chars: 50_000,
            max_chars: 60_000,
            prefix_count: 5,
            delimiter: "   ---   ".to_string(),
            truncation_marker: "...".to_string(),
            not_found: "No relevant content found".to_string(),
        }
    }
}

/// Sort hits by score, highest first. The sort is stable: equal scores keep
/// the order the index returned them in. NaN scores rank last.
pub fn rank_hits(hits: &mut [ScoredHit]) {
    fn key(hit: &ScoredHit) -> f64 {
        if hit.score.is_nan() {
            f64::NEG_INFINITY
        } else {
            hit.score
        }
    }
    hits.sort_by(|a, b| key(b).total_cmp(&key(a)));
}

/// Prefix a hit's content with its provenance tag.
pub fn tag_hit(hit: &ScoredHit) -> String {
    format!("[source: {}_{}]\n{}", hit.file_name, hit.sheet_name, hit.content)
}

fn provenance(hit: &ScoredHit) -> Provenance {
    Provenance {
        file_name: hit.file_name.clone(),
        sheet_name: hit.sheet_name.clone(),
    }
}

/// Assemble a budgeted context from hits already in rank order.
pub fn assemble_context(hits: &[ScoredHit], options: &ContextOptions) -> ContextBundle {
    if hits.is_empty() {
        return ContextBundle::not_found(&options.not_found);
    }

    let delimiter_chars = options.delimiter.chars().count();
    let marker_chars = options.truncation_marker.chars().count();

    let mut pieces: Vec<String> = Vec::new();
    let mut sources: Vec<Provenance> = Vec::new();
    let mut total = 0usize;
    let mut truncated = false;

    let prefix = options.prefix_count.min(hits.len());
    for hit in &hits[..prefix] {
        let piece = tag_hit(hit);
        if !pieces.is_empty() {
            total += delimiter_chars;
        }
        total += piece.chars().count();
        pieces.push(piece);
        sources.push(provenance(hit));
    }

    if total < options.min_chars {
        for hit in &hits[prefix..] {
            let piece = tag_hit(hit);
            let joint = if pieces.is_empty() { 0 } else { delimiter_chars };
            let cost = joint + piece.chars().count();

            if total + cost <= options.max_chars {
                total += cost;
                pieces.push(piece);
                sources.push(provenance(hit));
                continue;
            }

            let room = options.max_chars.saturating_sub(total + joint);
            if room > marker_chars {
                let mut cut: String = piece.chars().take(room - marker_chars).collect();
                cut.push_str(&options.truncation_marker);
                total += joint + room;
                pieces.push(cut);
                sources.push(provenance(hit));
                truncated = true;
            }
            break;
        }
    }

    tracing::debug!(
        included = sources.len(),
        available = hits.len(),
        chars = total,
        truncated,
        "assembled retrieval context"
    );

    ContextBundle {
        context: pieces.join(&options.delimiter),
        sources,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(i: usize, score: f64, len: usize) -> ScoredHit {
        ScoredHit {
            file_name: format!("file{}.xlsx", i),
            sheet_name: "Sheet1".to_string(),
            content: "c".repeat(len),
            score,
        }
    }

    fn options(min: usize, max: usize, prefix: usize) -> ContextOptions {
        ContextOptions {
            min_chars: min,
            max_chars: max,
            prefix_count: prefix,
            ..ContextOptions::default()
        }
    }

    #[test]
    fn empty_hits_yield_sentinel() {
        let opts = ContextOptions::default();
        for _ in 0..3 {
            let bundle = assemble_context(&[], &opts);
            assert_eq!(bundle.context, opts.not_found);
            assert!(bundle.sources.is_empty());
            assert!(!bundle.truncated);
            assert!(bundle.is_not_found());
        }
    }

    #[test]
    fn prefix_already_over_minimum_stops() {
        let hits: Vec<ScoredHit> = [9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0]
            .iter()
            .enumerate()
            .map(|(i, s)| hit(i, *s, 15_000))
            .collect();
        let bundle = assemble_context(&hits, &options(50_000, 60_000, 5));
        assert_eq!(bundle.sources.len(), 5);
        assert!(!bundle.truncated);
        assert_eq!(bundle.sources[4].file_name, "file4.xlsx");
        assert!(!bundle.context.contains("file5.xlsx"));
    }

    #[test]
    fn short_prefix_extends_while_hits_fit() {
        let hits: Vec<ScoredHit> = (0..10).map(|i| hit(i, 10.0 - i as f64, 1_000)).collect();
        let bundle = assemble_context(&hits, &options(4_500, 60_000, 2));
        assert_eq!(bundle.sources.len(), 10);
        assert!(!bundle.truncated);
        assert!(bundle.context.chars().count() >= 4_500);
        assert_eq!(bundle.sources[9].file_name, "file9.xlsx");
    }

    #[test]
    fn overflowing_hit_is_truncated_to_max() {
        let hits: Vec<ScoredHit> = (0..7).map(|i| hit(i, 10.0 - i as f64, 15_000)).collect();
        let opts = options(50_000, 60_000, 2);
        let bundle = assemble_context(&hits, &opts);
        assert_eq!(bundle.sources.len(), 4);
        assert!(bundle.truncated);
        assert_eq!(bundle.context.chars().count(), 60_000);
        assert!(bundle.context.ends_with("..."));
    }

    #[test]
    fn truncation_only_on_last_source() {
        let hits: Vec<ScoredHit> = (0..20).map(|i| hit(i, 1.0, 700 + i * 37)).collect();
        let opts = options(9_000, 9_500, 3);
        let bundle = assemble_context(&hits, &opts);
        let pieces: Vec<&str> = bundle.context.split(opts.delimiter.as_str()).collect();
        assert_eq!(pieces.len(), bundle.sources.len());
        for piece in &pieces[..pieces.len() - 1] {
            assert!(!piece.ends_with("..."));
        }
        assert!(bundle.context.chars().count() <= opts.max_chars);
    }

    #[test]
    fn short_input_may_fall_below_minimum() {
        let hits: Vec<ScoredHit> = (0..3).map(|i| hit(i, 1.0, 100)).collect();
        let bundle = assemble_context(&hits, &options(50_000, 60_000, 5));
        assert_eq!(bundle.sources.len(), 3);
        assert!(bundle.context.chars().count() < 50_000);
        assert!(!bundle.truncated);
    }

    #[test]
    fn extension_never_exceeds_maximum() {
        for max in [2_000, 5_000, 12_345] {
            let hits: Vec<ScoredHit> = (0..30).map(|i| hit(i, 1.0, 333 + i * 11)).collect();
            let bundle = assemble_context(&hits, &options(max, max, 1));
            let len = bundle.context.chars().count();
            assert!(len <= max, "{} > {}", len, max);
        }
    }

    #[test]
    fn duplicate_sources_are_kept() {
        let mut a = hit(0, 2.0, 10);
        let mut b = hit(0, 1.0, 10);
        a.sheet_name = "S".into();
        b.sheet_name = "S".into();
        let bundle = assemble_context(&[a, b], &options(10, 1_000, 5));
        assert_eq!(bundle.sources.len(), 2);
        assert_eq!(bundle.sources[0], bundle.sources[1]);
    }

    #[test]
    fn tag_format() {
        let h = hit(1, 1.0, 3);
        assert_eq!(tag_hit(&h), "[source: file1.xlsx_Sheet1]\nccc");
    }

    #[test]
    fn ranking_is_stable() {
        let mut hits = vec![hit(0, 1.0, 1), hit(1, 3.0, 1), hit(2, 1.0, 1), hit(3, 3.0, 1)];
        rank_hits(&mut hits);
        let order: Vec<&str> = hits.iter().map(|h| h.file_name.as_str()).collect();
        assert_eq!(order, vec!["file1.xlsx", "file3.xlsx", "file0.xlsx", "file2.xlsx"]);
    }

    #[test]
    fn nan_scores_rank_last() {
        let mut hits = vec![
            hit(0, f64::NAN, 1),
            hit(1, 2.0, 1),
            hit(2, f64::NAN, 1),
            hit(3, f64::NEG_INFINITY, 1),
            hit(4, 5.0, 1),
        ];
        rank_hits(&mut hits);
        let order: Vec<&str> = hits.iter().map(|h| h.file_name.as_str()).collect();
        assert_eq!(
            order,
            vec!["file4.xlsx", "file1.xlsx", "file0.xlsx", "file2.xlsx", "file3.xlsx"]
        );
    }
}
