//! Delimiter-inference text chunker.
//!
//! Extracted office text rarely keeps explicit section markers, but section
//! breaks still show up as anomalously long runs of consecutive line breaks
//! relative to ordinary paragraph spacing. This splitter groups every maximal
//! run of `\n` by its length (its run-length class), keeps the class that
//! occurs most often as intra-paragraph spacing, and splits the text on runs
//! of every other class. No fixed threshold, no I/O — the delimiter is
//! inferred from the document's own statistics.

use std::collections::HashMap;

/// A maximal run of consecutive `\n` bytes, as byte offsets into the text.
struct BreakRun {
    start: usize,
    end: usize,
}

impl BreakRun {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Split raw extracted text into ordered chunks.
///
/// Empty or whitespace-only input yields no chunks. Text with at most one
/// distinct run-length class (including text with no line breaks at all)
/// yields a single chunk. Deterministic and pure.
pub fn split_chunks(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let text = raw.replace("\r\n", "\n");
    let runs = break_runs(&text);

    let mut counts: HashMap<usize, usize> = HashMap::new();
    for run in &runs {
        *counts.entry(run.len()).or_insert(0) += 1;
    }

    if counts.len() <= 1 {
        return vec![text];
    }

    // The most frequent class is assumed to be ordinary paragraph spacing.
    // Ties go to the shorter run, which is the likelier line break.
    let Some(keep) = counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(len, _)| *len)
    else {
        return vec![text];
    };

    let mut chunks = Vec::new();
    let mut cursor = 0;
    for run in runs.iter().filter(|r| r.len() != keep) {
        chunks.push(&text[cursor..run.start]);
        cursor = run.end;
    }
    chunks.push(&text[cursor..]);

    chunks
        .into_iter()
        .filter(|segment| !segment.trim().is_empty())
        .map(str::to_string)
        .collect()
}

fn break_runs(text: &str) -> Vec<BreakRun> {
    let bytes = text.as_bytes();
    let mut runs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\n' {
            let start = i;
            while i < bytes.len() && bytes[i] == b'\n' {
                i += 1;
            }
            runs.push(BreakRun { start, end: i });
        } else {
            i += 1;
        }
    }

    runs
}
