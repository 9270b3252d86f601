//! Header row deduplication.
//!
//! Turns the first surviving row of a normalized grid into a sequence of
//! unique column names:
//!
//! - a blank cell at 0-based position `i` becomes `Column_{i+1}`;
//! - the first occurrence of a name keeps it unchanged;
//! - a repeat gets `_{n}` appended, `n` counting prior occurrences
//!   (so the second `ST` becomes `ST_1`, the third `ST_2`).
//!
//! Placeholder names are reserved for their positions: a literal header
//! that spells another position's placeholder (`Column_2` sitting in the
//! fourth column) counts as a repeat and is suffixed. This keeps a later
//! blank header from ever colliding with text that merely looks like a
//! placeholder.

use std::collections::{HashMap, HashSet};

/// Placeholder for a blank header at 0-based `position`.
pub fn placeholder(position: usize) -> String {
    format!("Column_{}", position + 1)
}

/// Produce unique column names for a header row. The output has the same
/// length as the input and contains no duplicates.
pub fn dedup_headers(row: &[String]) -> Vec<String> {
    let reserved: HashMap<String, usize> =
        (0..row.len()).map(|i| (placeholder(i), i)).collect();

    let mut occurrences: HashMap<String, usize> = HashMap::new();
    let mut used: HashSet<String> = HashSet::with_capacity(row.len());
    let mut out = Vec::with_capacity(row.len());

    for (i, cell) in row.iter().enumerate() {
        let trimmed = cell.trim();
        let base = if trimmed.is_empty() {
            placeholder(i)
        } else {
            trimmed.to_string()
        };

        let owner = reserved.get(&base).copied();
        let reserved_elsewhere = owner.is_some_and(|pos| pos != i);
        let own_placeholder = owner == Some(i);
        let prior = occurrences.entry(base.clone()).or_insert(0);

        let keep =
            !used.contains(&base) && !reserved_elsewhere && (*prior == 0 || own_placeholder);
        let name = if keep {
            base.clone()
        } else {
            let mut n = (*prior).max(1);
            let mut candidate = format!("{}_{}", base, n);
            while used.contains(&candidate) {
                n += 1;
                candidate = format!("{}_{}", base, n);
            }
            candidate
        };

        *prior += 1;
        used.insert(name.clone());
        out.push(name);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn assert_unique(names: &[String]) {
        let set: HashSet<&String> = names.iter().collect();
        assert_eq!(set.len(), names.len(), "duplicates in {:?}", names);
    }

    #[test]
    fn blanks_and_repeats() {
        let out = dedup_headers(&row(&["", "ST", "ST", "Column_2"]));
        assert_eq!(out, vec!["Column_1", "ST", "ST_1", "Column_2_1"]);
    }

    #[test]
    fn all_blank() {
        let out = dedup_headers(&row(&["", " ", ""]));
        assert_eq!(out, vec!["Column_1", "Column_2", "Column_3"]);
    }

    #[test]
    fn all_duplicate() {
        let out = dedup_headers(&row(&["A", "A", "A", "A"]));
        assert_eq!(out, vec!["A", "A_1", "A_2", "A_3"]);
    }

    #[test]
    fn suffix_collision_with_literal_header() {
        // A literal "A_1" already exists when the second "A" arrives.
        let out = dedup_headers(&row(&["A", "A_1", "A"]));
        assert_unique(&out);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], "A");
        assert_eq!(out[1], "A_1");
        assert_eq!(out[2], "A_2");
    }

    #[test]
    fn literal_placeholder_before_blank() {
        let out = dedup_headers(&row(&["Column_3", "x", ""]));
        assert_unique(&out);
        assert_eq!(out[2], "Column_3");
    }

    #[test]
    fn placeholder_in_own_position_is_kept() {
        let out = dedup_headers(&row(&["Column_1", "b"]));
        assert_eq!(out, vec!["Column_1", "b"]);
    }

    #[test]
    fn headers_are_trimmed() {
        let out = dedup_headers(&row(&[" Name ", "Name"]));
        assert_eq!(out, vec!["Name", "Name_1"]);
    }

    #[test]
    fn mixed_cases_stay_unique() {
        let inputs = [
            row(&["", "", "Column_1", "Column_2", "Column_1_1"]),
            row(&["x", "x_1", "x", "x_1", ""]),
            row(&[]),
        ];
        for input in &inputs {
            let out = dedup_headers(input);
            assert_eq!(out.len(), input.len());
            assert_unique(&out);
        }
    }
}
