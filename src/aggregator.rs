//! Sentence-level aggregation of partial recognition results
//!
//! The service revises earlier sentence boundaries as more audio context
//! arrives: an update may carry `pgs: "rpl"` and a range of sentence
//! indices it supersedes. Replaced indices are deleted *before* the new
//! sentence is stored, which is what makes corrected transcripts converge.
//! Results are keyed by sentence index, not arrival order, so late or
//! reordered updates land in the right place.

use std::collections::BTreeMap;

use crate::protocol::TextResult;

/// Durable record for one sentence index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceResult {
    pub sn: i64,
    pub text: String,
    /// Whether the service marked this sentence as final
    pub is_last: bool,
}

/// Accumulates [`TextResult`] updates into an ordered sentence map
#[derive(Debug, Default)]
pub(crate) struct SentenceAggregator {
    sentences: BTreeMap<i64, SentenceResult>,
}

impl SentenceAggregator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Apply one recognition update
    ///
    /// A `"rpl"` update with a two-element ascending range first discards
    /// every stored sentence inside the range, inclusive. The incoming
    /// sentence is then stored under its own index, overwriting any prior
    /// entry there.
    pub(crate) fn apply(&mut self, result: &TextResult) {
        if result.pgs.as_deref() == Some("rpl") {
            if let [lo, hi] = result.rg[..] {
                if lo <= hi {
                    self.sentences.retain(|sn, _| *sn < lo || *sn > hi);
                }
            }
        }

        self.sentences.insert(
            result.sn,
            SentenceResult {
                sn: result.sn,
                text: result.plain_text(),
                is_last: result.ls,
            },
        );
    }

    /// Point-in-time transcript: concatenated text in ascending sentence
    /// order, plus the sentence records behind it. Read-only.
    pub(crate) fn summary(&self) -> (String, Vec<SentenceResult>) {
        let mut text = String::new();
        let mut sentences = Vec::with_capacity(self.sentences.len());
        for sentence in self.sentences.values() {
            text.push_str(&sentence.text);
            sentences.push(sentence.clone());
        }
        (text, sentences)
    }
}
