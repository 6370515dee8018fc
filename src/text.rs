//! Text normalization, trigram/token extraction, and name scoring.
//!
//! These are pure, stateless functions with no dependency on storage or
//! the index lifecycle: everything here operates on plain strings.

/// Replace every code unit outside `[A-Za-z0-9_\- ]` with a single space,
/// collapse whitespace runs, and trim the ends. Underscores and hyphens are
/// preserved so they remain available for trigram overlap with the
/// original form.
pub fn normalize_for_indexing(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;

    for ch in text.chars() {
        let c = if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            ch
        } else {
            ' '
        };

        if c == ' ' {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }

    if out.ends_with(' ') {
        out.pop();
    }

    out
}

/// Emit every 3-unit window of `text` with its 0-based start offset,
/// filtering out trigrams with no alphanumeric code unit. `case_sensitive`
/// controls whether `text` is lowercased before windowing.
pub fn trigrams(text: &str, case_sensitive: bool) -> Vec<(String, usize)> {
    let normalized = normalize_for_indexing(text);
    let folded = if case_sensitive {
        normalized
    } else {
        normalized.to_lowercase()
    };

    let units: Vec<char> = folded.chars().collect();
    if units.len() < 3 {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(units.len().saturating_sub(2));
    for i in 0..=(units.len() - 3) {
        let window: String = units[i..i + 3].iter().collect();
        if window.chars().any(|c| c.is_alphanumeric()) {
            out.push((window, i));
        }
    }
    out
}

/// Deduplicated set of trigrams for `text`, discarding positions.
pub fn trigram_set(text: &str, case_sensitive: bool) -> Vec<String> {
    let mut set = std::collections::HashSet::new();
    for (tg, _) in trigrams(text, case_sensitive) {
        set.insert(tg);
    }
    set.into_iter().collect()
}

fn is_separator(ch: char) -> bool {
    ch == '_' || ch == '-' || ch.is_whitespace()
}

/// Split `text` into maximal CamelCase / snake / kebab word segments, with
/// each token's start offset in the *original* (not normalized) text.
pub fn tokens(text: &str) -> Vec<(String, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts: Vec<(usize, usize)> = Vec::new(); // (start, end) exclusive, over `chars`

    let mut i = 0;
    while i < chars.len() {
        if is_separator(chars[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && !is_separator(chars[i]) {
            i += 1;
        }
        parts.push((start, i));
    }

    let mut out = Vec::new();
    for (start, end) in parts {
        for (sub_start, sub_end) in split_camel_case(&chars[start..end]) {
            let token: String = chars[start + sub_start..start + sub_end].iter().collect();
            out.push((token, start + sub_start));
        }
    }
    out
}

/// Apply the two CamelCase-boundary rules to a single separator-free
/// segment, returning (start, end) ranges relative to `segment`.
fn split_camel_case(segment: &[char]) -> Vec<(usize, usize)> {
    if segment.is_empty() {
        return Vec::new();
    }

    let mut boundaries = vec![0usize];

    for i in 1..segment.len() {
        let prev = segment[i - 1];
        let cur = segment[i];

        // Rule 1: lowercase -> uppercase boundary ("aB" -> "a|B").
        if prev.is_lowercase() && cur.is_uppercase() {
            boundaries.push(i);
            continue;
        }

        // Rule 2: a run of uppercase letters followed by an
        // uppercase-then-lowercase pair breaks before the last uppercase
        // ("ABCd" -> "AB|Cd").
        if prev.is_uppercase() && cur.is_uppercase() && i + 1 < segment.len() {
            let next = segment[i + 1];
            if next.is_lowercase() {
                boundaries.push(i);
                continue;
            }
        }
    }

    boundaries.push(segment.len());
    boundaries.dedup();

    boundaries.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Whether `query` is a recognizable abbreviation of the tokens of `name`,
/// per spec.md §4.1. Case folding is applied iff `case_sensitive` is false.
pub fn abbreviation_matches(query: &str, name: &str, case_sensitive: bool) -> bool {
    if query.is_empty() {
        return false;
    }

    let fold = |s: &str| -> String {
        if case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    };

    let query_folded = fold(query);
    let name_tokens: Vec<String> = tokens(name).into_iter().map(|(t, _)| t).collect();
    if name_tokens.is_empty() {
        return false;
    }

    let concatenated: String = name_tokens
        .iter()
        .map(|t| fold(t))
        .collect::<Vec<_>>()
        .join("");
    if concatenated.starts_with(&query_folded) {
        return true;
    }

    let initials: String = name_tokens
        .iter()
        .filter_map(|t| t.chars().next())
        .flat_map(|c| fold(&c.to_string()).chars().collect::<Vec<_>>())
        .collect();
    if initials.starts_with(&query_folded) {
        return true;
    }

    loose_walk_matches(&query_folded, &name_tokens, case_sensitive)
}

/// Scan `query` left to right against tokens in order: for each character,
/// try the next unconsumed token's first letter, else try that same
/// token's body; a character that matches neither fails the whole walk.
/// Each token is consumed at most once, in token order.
fn loose_walk_matches(query_folded: &str, name_tokens: &[String], case_sensitive: bool) -> bool {
    let folded_tokens: Vec<String> = name_tokens
        .iter()
        .map(|t| {
            if case_sensitive {
                t.clone()
            } else {
                t.to_lowercase()
            }
        })
        .collect();
    let mut cursor = 0usize;

    for qc in query_folded.chars() {
        if cursor >= folded_tokens.len() {
            return false;
        }

        let token = &folded_tokens[cursor];
        let first_letter_matches = token.chars().next() == Some(qc);
        let body_matches = token.contains(qc);

        if first_letter_matches || body_matches {
            cursor += 1;
        } else {
            return false;
        }
    }

    true
}

/// Score a (query, candidate-name) pair under the strict ladder of
/// spec.md §4.1. Case folding applies iff `case_sensitive` is false.
pub fn score(query: &str, name: &str, case_sensitive: bool) -> u32 {
    if query.is_empty() {
        return 0;
    }

    let (q, n) = if case_sensitive {
        (query.to_string(), name.to_string())
    } else {
        (query.to_lowercase(), name.to_lowercase())
    };

    if q == n {
        return 1000;
    }
    if n.starts_with(&q) {
        return 900;
    }
    if n.contains(&q) {
        return 800;
    }
    if abbreviation_matches(query, name, case_sensitive) {
        return 700;
    }

    fuzzy_score(&q, &n)
}

/// Fuzzy walk: award 100 per matched character in order, +50 per
/// consecutive match, +25 when the matched character is at a word
/// boundary, minus 5 per unit of length difference. Returns 0 if not all
/// of `q` is matched.
fn fuzzy_score(q: &str, n: &str) -> u32 {
    let q_chars: Vec<char> = q.chars().collect();
    let n_chars: Vec<char> = n.chars().collect();

    let mut score: i64 = 0;
    let mut n_idx = 0usize;
    let mut prev_matched_idx: Option<usize> = None;
    let mut matched_count = 0usize;

    for &qc in &q_chars {
        let mut found_at = None;
        let mut j = n_idx;
        while j < n_chars.len() {
            if n_chars[j] == qc {
                found_at = Some(j);
                break;
            }
            j += 1;
        }

        let idx = match found_at {
            Some(idx) => idx,
            None => return 0,
        };

        matched_count += 1;
        score += 100;

        let is_consecutive = prev_matched_idx.map_or(false, |p| idx == p + 1);
        if is_consecutive {
            score += 50;
        }

        let at_word_boundary = idx == 0
            || n_chars
                .get(idx - 1)
                .map_or(true, |c| !c.is_alphanumeric());
        if at_word_boundary {
            score += 25;
        }

        prev_matched_idx = Some(idx);
        n_idx = idx + 1;
    }

    if matched_count != q_chars.len() {
        return 0;
    }

    let len_diff = (n_chars.len() as i64 - q_chars.len() as i64).abs();
    score -= 5 * len_diff;

    score.max(0) as u32
}
