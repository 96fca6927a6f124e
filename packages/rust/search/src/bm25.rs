//! BM25-Okapi scoring over a per-query candidate corpus.
//!
//! The corpus is rebuilt for each search from the dense phase's candidate
//! documents, so the index is a handful of token maps rather than a
//! persistent structure. Parameters are the usual Okapi defaults; negative
//! IDF values are floored at `epsilon * average_idf`.

use std::collections::HashMap;

const K1: f64 = 1.5;
const B: f64 = 0.75;
const EPSILON: f64 = 0.25;

/// Whitespace-lowercase tokenization used for both documents and queries.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// An Okapi BM25 index over a fixed corpus of tokenized documents.
pub struct Bm25Okapi {
    doc_freqs: Vec<HashMap<String, usize>>,
    doc_len: Vec<usize>,
    avgdl: f64,
    idf: HashMap<String, f64>,
}

impl Bm25Okapi {
    /// Build the index. Document order is preserved in [`Bm25Okapi::scores`].
    pub fn new(corpus: &[Vec<String>]) -> Self {
        let corpus_size = corpus.len();
        let mut doc_freqs: Vec<HashMap<String, usize>> = Vec::with_capacity(corpus_size);
        let mut doc_len: Vec<usize> = Vec::with_capacity(corpus_size);
        let mut df: HashMap<String, usize> = HashMap::new();

        for tokens in corpus {
            doc_len.push(tokens.len());

            let mut freqs: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *df.entry(term.clone()).or_insert(0) += 1;
            }
            doc_freqs.push(freqs);
        }

        let total_len: usize = doc_len.iter().sum();
        let avgdl = if corpus_size > 0 && total_len > 0 {
            total_len as f64 / corpus_size as f64
        } else {
            1.0
        };

        let idf = compute_idf(&df, corpus_size);

        Self {
            doc_freqs,
            doc_len,
            avgdl,
            idf,
        }
    }

    /// Raw BM25 score of each corpus document against the query tokens,
    /// in corpus order.
    pub fn scores(&self, query: &[String]) -> Vec<f64> {
        self.doc_freqs
            .iter()
            .zip(&self.doc_len)
            .map(|(freqs, &len)| {
                let norm = K1 * (1.0 - B + B * len as f64 / self.avgdl);
                query
                    .iter()
                    .map(|term| {
                        let tf = *freqs.get(term).unwrap_or(&0) as f64;
                        if tf == 0.0 {
                            return 0.0;
                        }
                        let idf = self.idf.get(term).copied().unwrap_or(0.0);
                        idf * tf * (K1 + 1.0) / (tf + norm)
                    })
                    .sum()
            })
            .collect()
    }
}

/// Okapi IDF with the negative-value floor.
fn compute_idf(df: &HashMap<String, usize>, corpus_size: usize) -> HashMap<String, f64> {
    let n = corpus_size as f64;
    let mut idf: HashMap<String, f64> = HashMap::with_capacity(df.len());
    let mut idf_sum = 0.0;
    let mut negative: Vec<String> = Vec::new();

    for (term, &freq) in df {
        let value = ((n - freq as f64 + 0.5) / (freq as f64 + 0.5)).ln();
        idf_sum += value;
        if value < 0.0 {
            negative.push(term.clone());
        }
        idf.insert(term.clone(), value);
    }

    if !idf.is_empty() {
        let average_idf = idf_sum / idf.len() as f64;
        let floor = EPSILON * average_idf;
        for term in negative {
            idf.insert(term, floor);
        }
    }

    idf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Vec<String>> {
        vec![
            tokenize("compound actions let you chain steps together"),
            tokenize("script actions run python inline"),
            tokenize("the switch statement branches on a value"),
        ]
    }

    #[test]
    fn tokenize_lowercases_on_whitespace() {
        assert_eq!(
            tokenize("Compound  Actions\nGuide"),
            vec!["compound", "actions", "guide"]
        );
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn matching_document_scores_highest() {
        let bm25 = Bm25Okapi::new(&corpus());
        let scores = bm25.scores(&tokenize("compound actions"));

        assert_eq!(scores.len(), 3);
        assert!(scores[0] > scores[1]);
        assert!(scores[0] > scores[2]);
        // "switch" doc shares no query term.
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn unknown_terms_score_zero_everywhere() {
        let bm25 = Bm25Okapi::new(&corpus());
        let scores = bm25.scores(&tokenize("nonexistent vocabulary"));
        assert!(scores.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn rarer_terms_weigh_more() {
        let docs = vec![
            tokenize("alpha beta"),
            tokenize("alpha gamma"),
            tokenize("alpha delta"),
        ];
        let bm25 = Bm25Okapi::new(&docs);

        // "beta" appears in one doc, "alpha" in all three.
        let rare = bm25.scores(&tokenize("beta"));
        let common = bm25.scores(&tokenize("alpha"));
        assert!(rare[0] > common[0]);
    }

    #[test]
    fn ubiquitous_terms_get_the_epsilon_floor() {
        // A term present in every document has negative raw IDF; the floor
        // keeps its contribution positive when the average IDF is positive.
        let docs = vec![
            tokenize("alpha beta gamma"),
            tokenize("alpha delta epsilon"),
            tokenize("alpha zeta eta"),
        ];
        let bm25 = Bm25Okapi::new(&docs);
        let scores = bm25.scores(&tokenize("alpha"));
        assert!(scores.iter().all(|&s| s > 0.0));
    }

    #[test]
    fn empty_corpus_yields_no_scores() {
        let bm25 = Bm25Okapi::new(&[]);
        assert!(bm25.scores(&tokenize("anything")).is_empty());
    }

    #[test]
    fn empty_documents_do_not_produce_nan() {
        let docs = vec![Vec::new(), Vec::new()];
        let bm25 = Bm25Okapi::new(&docs);
        let scores = bm25.scores(&tokenize("query"));
        assert!(scores.iter().all(|s| s.is_finite()));
    }
}
