//! Statistical categorizer: TF-IDF features over normalized descriptions and a
//! multinomial logistic regression, stored as a JSON artifact.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail, ensure};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tally_core::{LabelSource, TransactionTable};
use tracing::{debug, info};

/// Bumped whenever the artifact layout changes
pub const MODEL_FORMAT_VERSION: u32 = 1;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("static token regex"));

/// Anything that assigns one category per description.
///
/// Implementations are immutable once built, so one instance can serve any
/// number of callers.
pub trait CategoryModel: Send + Sync {
    /// Every label the model can emit
    fn labels(&self) -> &[String];

    /// One label per input, in input order. Empty text still gets a label.
    fn predict(&self, texts: &[&str]) -> Vec<String>;
}

/// Fill `predicted_category` for every record from its `description_clean`.
pub fn apply_model<M: CategoryModel + ?Sized>(model: &M, table: &mut TransactionTable) {
    let texts: Vec<&str> = table
        .records
        .iter()
        .map(|r| r.description_clean.as_str())
        .collect();
    let predictions = model.predict(&texts);

    for (record, label) in table.records.iter_mut().zip(predictions) {
        record.set_category(LabelSource::Model, label);
    }
    table.add_label(LabelSource::Model);
    debug!(rows = table.len(), "applied category model");
}

/// Sparse feature row: (feature index, value), sorted by index
pub type SparseRow = Vec<(usize, f64)>;

/// Word n-gram TF-IDF with smoothed idf and L2-normalized rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    ngram_min: usize,
    ngram_max: usize,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

/// Lowercased runs of two or more word characters.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn ngrams(text: &str, ngram_min: usize, ngram_max: usize) -> Vec<String> {
    let tokens = tokenize(text);
    let mut out = Vec::new();
    for n in ngram_min.max(1)..=ngram_max {
        if n > tokens.len() {
            break;
        }
        out.extend(tokens.windows(n).map(|w| w.join(" ")));
    }
    out
}

impl TfidfVectorizer {
    /// Learn the vocabulary (terms in at least `min_df` documents) and idf weights.
    pub fn fit(documents: &[&str], ngram_range: (usize, usize), min_df: usize) -> Result<Self> {
        let (ngram_min, ngram_max) = ngram_range;
        ensure!(
            ngram_min >= 1 && ngram_min <= ngram_max,
            "invalid ngram range ({ngram_min}, {ngram_max})"
        );

        let mut df: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let unique: BTreeSet<String> = ngrams(doc, ngram_min, ngram_max).into_iter().collect();
            for term in unique {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        let kept: BTreeMap<String, usize> = df
            .into_iter()
            .filter(|(_, count)| *count >= min_df.max(1))
            .collect();
        if kept.is_empty() {
            bail!("empty vocabulary; documents contain no terms appearing at least {min_df} times");
        }

        let n = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(kept.len());
        for (i, (term, count)) in kept.into_iter().enumerate() {
            idf.push(((1.0 + n) / (1.0 + count as f64)).ln() + 1.0);
            vocabulary.insert(term, i);
        }

        Ok(Self {
            ngram_min,
            ngram_max,
            vocabulary,
            idf,
        })
    }

    pub fn len(&self) -> usize {
        self.idf.len()
    }

    /// Reject a deserialized vectorizer whose vocabulary points outside `idf`.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.ngram_min >= 1 && self.ngram_min <= self.ngram_max,
            "invalid ngram range ({}, {})",
            self.ngram_min,
            self.ngram_max
        );
        ensure!(
            self.vocabulary.len() == self.idf.len(),
            "vocabulary has {} terms but {} idf weights",
            self.vocabulary.len(),
            self.idf.len()
        );
        if let Some((term, idx)) = self.vocabulary.iter().find(|(_, i)| **i >= self.idf.len()) {
            bail!(
                "vocabulary term '{term}' has index {idx}, past the {}-term idf table",
                self.idf.len()
            );
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    pub fn transform(&self, text: &str) -> SparseRow {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in ngrams(text, self.ngram_min, self.ngram_max) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseRow = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();

        let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in &mut row {
                *v /= norm;
            }
        }
        row
    }
}

/// TF-IDF + linear softmax classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearTextModel {
    format_version: u32,
    vectorizer: TfidfVectorizer,
    /// Sorted
    labels: Vec<String>,
    /// `weights[label][feature]`
    weights: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

impl LinearTextModel {
    pub fn from_parts(
        vectorizer: TfidfVectorizer,
        labels: Vec<String>,
        weights: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
    ) -> Result<Self> {
        let model = Self {
            format_version: MODEL_FORMAT_VERSION,
            vectorizer,
            labels,
            weights,
            intercepts,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.format_version == MODEL_FORMAT_VERSION,
            "unsupported model format version {} (expected {})",
            self.format_version,
            MODEL_FORMAT_VERSION
        );
        self.vectorizer.validate()?;
        ensure!(!self.labels.is_empty(), "model has no labels");
        ensure!(
            self.weights.len() == self.labels.len() && self.intercepts.len() == self.labels.len(),
            "model has {} labels but {} weight rows and {} intercepts",
            self.labels.len(),
            self.weights.len(),
            self.intercepts.len()
        );
        let features = self.vectorizer.len();
        ensure!(
            self.weights.iter().all(|w| w.len() == features),
            "weight rows do not match the {features}-term vocabulary"
        );
        Ok(())
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    /// Linear score per label.
    pub fn scores(&self, text: &str) -> Vec<f64> {
        let row = self.vectorizer.transform(text);
        self.weights
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| b + row.iter().map(|(j, v)| w[*j] * v).sum::<f64>())
            .collect()
    }

    /// Highest-scoring label; ties go to the earlier (alphabetically smaller) label.
    pub fn predict_one(&self, text: &str) -> &str {
        let scores = self.scores(text);
        let mut best = 0;
        for (i, s) in scores.iter().enumerate().skip(1) {
            if *s > scores[best] {
                best = i;
            }
        }
        &self.labels[best]
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .with_context(|| format!("write model {}", path.display()))?;
        info!(path = %path.display(), labels = self.labels.len(), features = self.vectorizer.len(), "saved model");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let model: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parse model {}", path.display()))?;
        model
            .validate()
            .with_context(|| format!("invalid model {}", path.display()))?;
        info!(path = %path.display(), labels = model.labels.len(), "loaded model");
        Ok(model)
    }
}

impl CategoryModel for LinearTextModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&self, texts: &[&str]) -> Vec<String> {
        texts
            .iter()
            .map(|t| self.predict_one(t).to_string())
            .collect()
    }
}
