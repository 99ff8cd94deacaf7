//! # TF-IDF vectorizer
//! Word n-gram TF-IDF projection with a vocabulary fixed at fit time.
//!
//! - Every input goes through [`normalize`] first, so callers pass raw text.
//! - Tokens are runs of at least two word characters.
//! - Vocabulary: top `max_features` n-grams by total corpus count (ties by
//!   term), indexed in lexicographic order.
//! - Weight: raw count × smoothed idf `ln((1+n)/(1+df)) + 1`, row L2-normalized.
//! - Terms unseen at fit time are dropped at transform time (zero weight).

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::TrainingFailed;
use crate::normalize::normalize;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("token regex"));

/// Sparse row vector with a fixed logical dimensionality.
///
/// `indices` are strictly increasing; absent indices are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    dim: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from unordered `(index, value)` pairs. Duplicates are summed,
    /// exact zeros are dropped. Indices must be `< dim`.
    pub fn from_pairs(dim: usize, pairs: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut acc: BTreeMap<usize, f64> = BTreeMap::new();
        for (i, v) in pairs {
            debug_assert!(i < dim, "index {i} out of bounds for dim {dim}");
            *acc.entry(i).or_insert(0.0) += v;
        }
        let (indices, values) = acc.into_iter().filter(|(_, v)| *v != 0.0).unzip();
        Self {
            dim,
            indices,
            values,
        }
    }

    /// Logical dimensionality (vocabulary size), not the number of non-zeros.
    pub fn len(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.dim == 0
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_zero(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn to_dense(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.dim];
        for (i, v) in self.iter() {
            out[i] = v;
        }
        out
    }

    /// Dot product with a dense weight vector of the same length.
    pub fn dot(&self, dense: &[f64]) -> f64 {
        self.iter().map(|(i, v)| v * dense[i]).sum()
    }

    pub fn squared_distance(&self, other: &Self) -> f64 {
        let mut sum = 0.0;
        merge(self, other, |a, b| {
            let d = a - b;
            sum += d * d;
        });
        sum
    }

    /// `self + gap * (other - self)` over the union of non-zeros.
    pub fn interpolate(&self, other: &Self, gap: f64) -> Self {
        let mut indices = Vec::with_capacity(self.nnz().max(other.nnz()));
        let mut values = Vec::with_capacity(indices.capacity());
        merge_indexed(self, other, |i, a, b| {
            let v = a + gap * (b - a);
            if v != 0.0 {
                indices.push(i);
                values.push(v);
            }
        });
        Self {
            dim: self.dim,
            indices,
            values,
        }
    }
}

fn merge(a: &FeatureVector, b: &FeatureVector, mut f: impl FnMut(f64, f64)) {
    merge_indexed(a, b, |_, x, y| f(x, y));
}

/// Walk the union of non-zero indices of two sorted sparse vectors.
fn merge_indexed(a: &FeatureVector, b: &FeatureVector, mut f: impl FnMut(usize, f64, f64)) {
    let (mut i, mut j) = (0, 0);
    while i < a.indices.len() || j < b.indices.len() {
        let ai = a.indices.get(i).copied().unwrap_or(usize::MAX);
        let bj = b.indices.get(j).copied().unwrap_or(usize::MAX);
        if ai == bj {
            f(ai, a.values[i], b.values[j]);
            i += 1;
            j += 1;
        } else if ai < bj {
            f(ai, a.values[i], 0.0);
            i += 1;
        } else {
            f(bj, 0.0, b.values[j]);
            j += 1;
        }
    }
}

/// Text → fixed-width feature vector.
pub trait Vectorizer: Send + Sync {
    fn vocabulary_size(&self) -> usize;

    fn transform_one(&self, text: &str) -> FeatureVector;

    fn transform(&self, texts: &[String]) -> Vec<FeatureVector> {
        texts.iter().map(|t| self.transform_one(t)).collect()
    }
}

/// Fit-time parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TfidfParams {
    pub max_features: usize,
    pub ngram_min: usize,
    pub ngram_max: usize,
}

impl Default for TfidfParams {
    fn default() -> Self {
        Self {
            max_features: 5000,
            ngram_min: 1,
            ngram_max: 2,
        }
    }
}

impl TfidfParams {
    /// Fit the vocabulary and idf on `corpus`.
    pub fn fit(&self, corpus: &[String]) -> Result<TfidfVectorizer, TrainingFailed> {
        self.fit_transform(corpus).map(|(v, _)| v)
    }

    /// Fit, then transform the same corpus with the fitted state.
    pub fn fit_transform(
        &self,
        corpus: &[String],
    ) -> Result<(TfidfVectorizer, Vec<FeatureVector>), TrainingFailed> {
        if corpus.is_empty() {
            return Err(TrainingFailed::dataset("cannot fit vectorizer on an empty corpus"));
        }

        let docs: Vec<Vec<String>> = corpus
            .par_iter()
            .map(|d| analyze(d, self.ngram_min, self.ngram_max))
            .collect();

        let mut term_count: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            let mut seen: HashSet<&str> = HashSet::new();
            for term in doc {
                *term_count.entry(term.as_str()).or_insert(0) += 1;
                if seen.insert(term.as_str()) {
                    *doc_freq.entry(term.as_str()).or_insert(0) += 1;
                }
            }
        }
        if term_count.is_empty() {
            return Err(TrainingFailed::dataset(
                "corpus yields no terms after normalization",
            ));
        }

        let mut ranked: Vec<(&str, usize)> = term_count.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.max_features);

        let mut terms: Vec<String> = ranked.iter().map(|(t, _)| (*t).to_string()).collect();
        terms.sort();

        let n = corpus.len() as f64;
        let idf = terms
            .iter()
            .map(|t| {
                let df = doc_freq.get(t.as_str()).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let fitted = TfidfVectorizer::from(TfidfState {
            ngram_min: self.ngram_min,
            ngram_max: self.ngram_max,
            terms,
            idf,
        });
        let rows = docs.iter().map(|d| fitted.weigh(d)).collect();
        Ok((fitted, rows))
    }
}

/// Serialized form of a fitted vectorizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfState {
    pub ngram_min: usize,
    pub ngram_max: usize,
    /// Vocabulary in index order.
    pub terms: Vec<String>,
    pub idf: Vec<f64>,
}

/// Fitted, immutable TF-IDF vectorizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "TfidfState", into = "TfidfState")]
pub struct TfidfVectorizer {
    state: TfidfState,
    index: HashMap<String, usize>,
}

impl From<TfidfState> for TfidfVectorizer {
    fn from(state: TfidfState) -> Self {
        let index = state
            .terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self { state, index }
    }
}

impl From<TfidfVectorizer> for TfidfState {
    fn from(v: TfidfVectorizer) -> Self {
        v.state
    }
}

impl PartialEq for TfidfVectorizer {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl TfidfVectorizer {
    pub fn terms(&self) -> &[String] {
        &self.state.terms
    }

    pub fn idf(&self) -> &[f64] {
        &self.state.idf
    }

    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    /// Structural sanity check used when loading an artifact.
    pub fn is_consistent(&self) -> bool {
        self.state.terms.len() == self.state.idf.len()
            && self.index.len() == self.state.terms.len()
            && self.state.ngram_min >= 1
            && self.state.ngram_min <= self.state.ngram_max
    }

    /// Batch transform on the rayon pool.
    pub fn par_transform(&self, texts: &[String]) -> Vec<FeatureVector> {
        texts.par_iter().map(|t| self.transform_one(t)).collect()
    }

    fn weigh(&self, terms: &[String]) -> FeatureVector {
        let dim = self.state.terms.len();
        // ordered so the norm is summed identically on every call
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for t in terms {
            if let Some(&i) = self.index.get(t) {
                *counts.entry(i).or_insert(0.0) += 1.0;
            }
        }
        let weighted: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(i, c)| (i, c * self.state.idf[i]))
            .collect();
        let norm = weighted.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm == 0.0 {
            return FeatureVector::zeros(dim);
        }
        FeatureVector::from_pairs(dim, weighted.into_iter().map(|(i, v)| (i, v / norm)))
    }
}

impl Vectorizer for TfidfVectorizer {
    fn vocabulary_size(&self) -> usize {
        self.state.terms.len()
    }

    fn transform_one(&self, text: &str) -> FeatureVector {
        self.weigh(&analyze(text, self.state.ngram_min, self.state.ngram_max))
    }
}

/// Normalize, tokenize and expand to n-grams.
fn analyze(raw: &str, ngram_min: usize, ngram_max: usize) -> Vec<String> {
    let normalized = normalize(raw);
    let tokens: Vec<&str> = TOKEN_RE.find_iter(&normalized).map(|m| m.as_str()).collect();
    let mut out = Vec::new();
    for n in ngram_min..=ngram_max {
        if n == 0 || n > tokens.len() {
            continue;
        }
        for window in tokens.windows(n) {
            out.push(window.join(" "));
        }
    }
    out
}
