//! Bulk annotation of a query spreadsheet against the resolution index.

use crate::error::{XrefError, XrefResult};
use crate::xref::index::ResolutionIndex;
use crate::xref::record::{RawRow, field_text};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

pub const FOUND_COLUMN: &str = "Found_YV_Codes";
pub const MIN_KEYWORD_CHARS: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub rows: Vec<RawRow>,
    pub relevant_headers: Vec<String>,
    pub query_values: usize,
    pub found_values: usize,
    pub annotated_rows: usize,
}

/// Split a user keyword list on commas, trimming and dropping short entries.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| k.chars().count() >= MIN_KEYWORD_CHARS)
        .map(ToOwned::to_owned)
        .collect()
}

/// Sheet headers in column order, followed by any header that only appears
/// on individual rows, in first-seen order.
pub fn collect_headers(sheet_headers: &[String], rows: &[RawRow]) -> Vec<String> {
    let mut seen: HashSet<&str> = sheet_headers.iter().map(String::as_str).collect();
    let mut out = sheet_headers.to_vec();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key.as_str()) {
                out.push(key.clone());
            }
        }
    }
    out
}

/// Headers containing any keyword, case-insensitively, ordered by the first
/// keyword that selects them.
pub fn relevant_headers(headers: &[String], keywords: &[String]) -> XrefResult<Vec<String>> {
    let lowered: Vec<(String, &String)> =
        headers.iter().map(|h| (h.to_lowercase(), h)).collect();
    let mut out = Vec::new();
    for keyword in keywords {
        let needle = keyword.to_lowercase();
        for (lower, header) in &lowered {
            if lower.contains(&needle) && !out.contains(*header) {
                out.push((*header).clone());
            }
        }
    }
    if out.is_empty() {
        return Err(XrefError::NoMatchingColumns {
            keywords: keywords.to_vec(),
        });
    }
    Ok(out)
}

/// Text of a cell as used for query matching.
fn cell_value(row: &RawRow, header: &str) -> Option<String> {
    field_text(row, header)
}

/// Distinct trimmed, non-empty values under the relevant headers, in
/// first-seen order. Values keep their spelling so results can be joined
/// back onto rows.
pub fn query_set(rows: &[RawRow], relevant: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        for header in relevant {
            let Some(value) = cell_value(row, header) else {
                continue;
            };
            let trimmed = value.trim();
            if trimmed.is_empty() {
                continue;
            }
            if seen.insert(trimmed.to_string()) {
                out.push(trimmed.to_string());
            }
        }
    }
    out
}

/// Query value → YV list for every value that resolves.
pub fn resolve_queries(index: &ResolutionIndex, queries: &[String]) -> BTreeMap<String, Vec<String>> {
    queries
        .iter()
        .filter_map(|q| index.resolve_composite(q).map(|found| (q.clone(), found)))
        .collect()
}

/// Annotate `rows` with the comma-joined YV codes found for their query
/// cells. The header loop is per relevant header, so a later matching header
/// overwrites the annotation written by an earlier one.
pub fn match_rows(
    index: &ResolutionIndex,
    sheet_headers: &[String],
    mut rows: Vec<RawRow>,
    keywords: &[String],
) -> XrefResult<MatchOutcome> {
    let headers = collect_headers(sheet_headers, &rows);
    let relevant = relevant_headers(&headers, keywords)?;
    let queries = query_set(&rows, &relevant);
    let query_lookup: HashSet<&str> = queries.iter().map(String::as_str).collect();
    let found = resolve_queries(index, &queries);
    if found.is_empty() {
        return Err(XrefError::NoMatchesFound);
    }

    let mut annotated_rows = 0usize;
    for row in &mut rows {
        let mut annotated = false;
        for header in &relevant {
            // Joined on the raw cell value, not its trimmed form.
            let Some(code) = cell_value(row, header) else {
                continue;
            };
            if !query_lookup.contains(code.as_str()) {
                continue;
            }
            let Some(values) = found.get(&code) else {
                continue;
            };
            row.insert(FOUND_COLUMN.to_string(), Value::String(values.join(", ")));
            annotated = true;
        }
        if annotated {
            annotated_rows += 1;
        }
    }

    tracing::info!(
        relevant_headers = relevant.len(),
        query_values = queries.len(),
        found_values = found.len(),
        annotated_rows,
        "bulk match finished"
    );

    Ok(MatchOutcome {
        rows,
        relevant_headers: relevant,
        query_values: queries.len(),
        found_values: found.len(),
        annotated_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xref::index::IndexBuilder;
    use crate::xref::record::row_from_pairs;

    fn index() -> ResolutionIndex {
        let mut builder = IndexBuilder::new();
        builder.insert("A-1", "V1");
        builder.insert("a1", "V1");
        builder.insert("A-1", "V2");
        builder.insert("T 9", "V9");
        builder.finish()
    }

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keyword_parsing_drops_short_entries() {
        assert_eq!(parse_keywords(" OE, x ,TRW,,"), vec!["OE", "TRW"]);
        assert!(parse_keywords("a, ,b").is_empty());
    }

    #[test]
    fn relevant_headers_match_substrings_case_insensitively() {
        let headers = keywords(&["OE_1", "Name", "TRW"]);
        let got = relevant_headers(&headers, &keywords(&["oe", "TRW"])).expect("headers");
        assert_eq!(got, vec!["OE_1", "TRW"]);

        let overlapping = relevant_headers(&headers, &keywords(&["OE", "OE_"])).expect("headers");
        assert_eq!(overlapping, vec!["OE_1"]);
    }

    #[test]
    fn no_relevant_header_is_an_error() {
        let headers = keywords(&["Name", "Qty"]);
        let err = relevant_headers(&headers, &keywords(&["OE"])).expect_err("none");
        assert!(matches!(err, XrefError::NoMatchingColumns { .. }));
    }

    #[test]
    fn query_set_keeps_original_spelling_and_dedups() {
        let rows = vec![
            row_from_pairs([("OE", " A-1 "), ("Name", "pump")]),
            row_from_pairs([("OE", "A-1")]),
            row_from_pairs([("OE", "A-1, a1")]),
            row_from_pairs([("Name", "no code")]),
        ];
        assert_eq!(query_set(&rows, &keywords(&["OE"])), vec!["A-1", "A-1, a1"]);
    }

    #[test]
    fn rows_are_annotated_and_unmatched_rows_untouched() {
        let rows = vec![
            row_from_pairs([("OE_1", "A-1"), ("Name", "pump"), ("TRW", "")]),
            row_from_pairs([("OE_1", "ZZ-404"), ("Name", "seal")]),
            row_from_pairs([("Name", "gasket"), ("TRW", "T-9")]),
            row_from_pairs([("OE_1", "A-1, a1")]),
        ];
        let out = match_rows(&index(), &[], rows, &keywords(&["OE", "TRW"])).expect("match");

        assert_eq!(out.relevant_headers, vec!["OE_1", "TRW"]);
        assert_eq!(out.query_values, 4);
        assert_eq!(out.found_values, 3);
        assert_eq!(out.annotated_rows, 3);
        assert_eq!(
            out.rows[0].get(FOUND_COLUMN),
            Some(&Value::String("V1, V2".into()))
        );
        assert!(!out.rows[1].contains_key(FOUND_COLUMN));
        assert_eq!(out.rows[2].get(FOUND_COLUMN), Some(&Value::String("V9".into())));
        assert_eq!(out.rows[3].get(FOUND_COLUMN), Some(&Value::String("V1, V2".into())));
        assert_eq!(out.rows[1].get("Name"), Some(&Value::String("seal".into())));
    }

    #[test]
    fn later_relevant_header_overwrites_annotation() {
        let rows = vec![row_from_pairs([("OE", "a1"), ("OE_ALT", "T9")])];
        let out = match_rows(&index(), &[], rows, &keywords(&["OE"])).expect("match");
        assert_eq!(out.rows[0].get(FOUND_COLUMN), Some(&Value::String("V9".into())));
    }

    #[test]
    fn headers_are_visited_in_column_order_not_alphabetically() {
        let sheet_headers = keywords(&["OE_B", "OE_A"]);
        let rows = vec![row_from_pairs([("OE_A", "T9"), ("OE_B", "a1")])];
        let out = match_rows(&index(), &sheet_headers, rows, &keywords(&["OE"])).expect("match");
        assert_eq!(out.relevant_headers, vec!["OE_B", "OE_A"]);
        assert_eq!(out.rows[0].get(FOUND_COLUMN), Some(&Value::String("V9".into())));
    }

    #[test]
    fn row_only_headers_follow_sheet_headers() {
        let rows = vec![
            row_from_pairs([("Z", "1"), ("A", "2")]),
            row_from_pairs([("EXTRA", "3")]),
        ];
        assert_eq!(
            collect_headers(&keywords(&["Name"]), &rows),
            vec!["Name", "Z", "A", "EXTRA"]
        );
    }

    #[test]
    fn padded_cells_are_not_rejoined() {
        // The query set stores the trimmed value while the join compares the
        // raw cell, so a padded cell resolves but is left unannotated.
        let rows = vec![
            row_from_pairs([("OE", " A-1 ")]),
            row_from_pairs([("OE", "T 9")]),
        ];
        let out = match_rows(&index(), &[], rows, &keywords(&["OE"])).expect("match");
        assert!(!out.rows[0].contains_key(FOUND_COLUMN));
        assert!(out.rows[1].contains_key(FOUND_COLUMN));
    }

    #[test]
    fn nothing_found_is_an_error() {
        let rows = vec![row_from_pairs([("OE", "ZZ-1")])];
        let err = match_rows(&index(), &[], rows, &keywords(&["OE"])).expect_err("none");
        assert!(matches!(err, XrefError::NoMatchesFound));
    }
}
