//! Fit and evaluate a `LinearTextModel` from hand-labeled transactions.
//!
//! Input CSV needs `description_clean` and `manual_category` columns; rows with
//! a blank label are skipped.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{CategoryModel, LinearTextModel, SparseRow, TfidfVectorizer};

pub const TEXT_COLUMN: &str = "description_clean";
pub const LABEL_COLUMN: &str = "manual_category";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Share of each category held out for evaluation
    pub test_size: f64,
    pub min_labeled_rows: usize,
    pub min_df: usize,
    pub ngram_max: usize,
    pub max_iter: usize,
    /// Inverse L2 regularization strength
    pub c: f64,
    pub learning_rate: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            min_labeled_rows: 100,
            min_df: 2,
            ngram_max: 2,
            max_iter: 200,
            c: 1.0,
            learning_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledSample {
    pub text: String,
    pub label: String,
}

impl LabeledSample {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Read labeled rows from a CSV file.
pub fn load_labeled(path: impl AsRef<Path>) -> Result<Vec<LabeledSample>> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let column = |name: &str| -> Result<usize> {
        match headers.iter().position(|h| h.trim() == name) {
            Some(i) => Ok(i),
            None => bail!(
                "Expected column '{name}' in {}. Found: {headers:?}",
                path.display()
            ),
        }
    };
    let text_idx = column(TEXT_COLUMN)?;
    let label_idx = column(LABEL_COLUMN)?;

    let mut samples = Vec::new();
    let mut unlabeled = 0usize;
    for result in rdr.records() {
        let record = result.with_context(|| format!("reading {}", path.display()))?;
        let label = record.get(label_idx).unwrap_or("").trim();
        if label.is_empty() {
            unlabeled += 1;
            continue;
        }
        let text = record.get(text_idx).unwrap_or("");
        samples.push(LabeledSample::new(text, label));
    }

    debug!(rows = samples.len(), unlabeled, "loaded labeled samples");
    Ok(samples)
}

/// Deterministic stratified holdout: within each label, test rows are spread
/// evenly so that `floor(n * test_size)` of them are held out. Input order is kept.
pub fn split_holdout(
    samples: &[LabeledSample],
    test_size: f64,
) -> (Vec<&LabeledSample>, Vec<&LabeledSample>) {
    let test_size = test_size.clamp(0.0, 1.0);
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut train = Vec::new();
    let mut test = Vec::new();

    for sample in samples {
        let i = seen.entry(sample.label.as_str()).or_insert(0);
        let before = (*i as f64 * test_size).floor();
        let after = ((*i + 1) as f64 * test_size).floor();
        *i += 1;
        if after > before {
            test.push(sample);
        } else {
            train.push(sample);
        }
    }

    (train, test)
}

fn softmax(scores: &mut [f64]) {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    for s in scores.iter_mut() {
        *s /= sum;
    }
}

/// Fit TF-IDF + L2-regularized multinomial logistic regression with
/// full-batch gradient descent.
pub fn fit(samples: &[&LabeledSample], config: &TrainConfig) -> Result<LinearTextModel> {
    if samples.is_empty() {
        bail!("no training samples");
    }

    let labels: Vec<String> = samples
        .iter()
        .map(|s| s.label.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if labels.len() < 2 {
        bail!("need at least two categories to train, found {:?}", labels);
    }
    let label_index: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();

    let docs: Vec<&str> = samples.iter().map(|s| s.text.as_str()).collect();
    let vectorizer = TfidfVectorizer::fit(&docs, (1, config.ngram_max.max(1)), config.min_df)?;
    let rows: Vec<SparseRow> = docs.iter().map(|d| vectorizer.transform(d)).collect();
    let targets: Vec<usize> = samples.iter().map(|s| label_index[s.label.as_str()]).collect();

    let n = rows.len() as f64;
    let k = labels.len();
    let d = vectorizer.len();
    let lambda = 1.0 / (config.c * n);
    let lr = config.learning_rate;

    let mut weights = vec![vec![0.0; d]; k];
    let mut intercepts = vec![0.0; k];
    let mut loss = 0.0;

    for _ in 0..config.max_iter {
        let mut grad_w = vec![vec![0.0; d]; k];
        let mut grad_b = vec![0.0; k];
        loss = 0.0;

        for (row, &y) in rows.iter().zip(&targets) {
            let mut probs: Vec<f64> = weights
                .iter()
                .zip(&intercepts)
                .map(|(w, b)| b + row.iter().map(|(j, v)| w[*j] * v).sum::<f64>())
                .collect();
            softmax(&mut probs);
            loss -= probs[y].max(f64::MIN_POSITIVE).ln();

            for (c, p) in probs.iter().enumerate() {
                let err = p - if c == y { 1.0 } else { 0.0 };
                grad_b[c] += err;
                for (j, v) in row {
                    grad_w[c][*j] += err * v;
                }
            }
        }

        for c in 0..k {
            intercepts[c] -= lr * grad_b[c] / n;
            for j in 0..d {
                weights[c][j] -= lr * (grad_w[c][j] / n + lambda * weights[c][j]);
            }
        }
    }

    debug!(
        iterations = config.max_iter,
        mean_loss = loss / n,
        labels = k,
        features = d,
        "fitted logistic regression"
    );

    LinearTextModel::from_parts(vectorizer, labels, weights, intercepts)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub accuracy: f64,
    /// Sorted; rows and columns of `confusion`
    pub labels: Vec<String>,
    pub per_class: Vec<ClassMetrics>,
    /// `confusion[true][predicted]`
    pub confusion: Vec<Vec<usize>>,
}

/// Score a model against held-out samples.
pub fn evaluate<M: CategoryModel + ?Sized>(model: &M, samples: &[&LabeledSample]) -> Evaluation {
    let texts: Vec<&str> = samples.iter().map(|s| s.text.as_str()).collect();
    let predicted = model.predict(&texts);

    let labels: Vec<String> = model
        .labels()
        .iter()
        .cloned()
        .chain(samples.iter().map(|s| s.label.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();

    let mut confusion = vec![vec![0usize; labels.len()]; labels.len()];
    let mut correct = 0usize;
    for (sample, pred) in samples.iter().zip(&predicted) {
        let t = index[sample.label.as_str()];
        let p = index[pred.as_str()];
        confusion[t][p] += 1;
        if t == p {
            correct += 1;
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

    let per_class = labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let tp = confusion[i][i];
            let support: usize = confusion[i].iter().sum();
            let predicted_count: usize = confusion.iter().map(|row| row[i]).sum();
            let precision = ratio(tp, predicted_count);
            let recall = ratio(tp, support);
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            ClassMetrics {
                label: label.clone(),
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect();

    Evaluation {
        accuracy: ratio(correct, samples.len()),
        labels,
        per_class,
        confusion,
    }
}

impl Evaluation {
    /// Confusion matrix as CSV: blank corner cell, then one column per predicted label.
    pub fn write_confusion_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut wtr =
            csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;

        let mut header = vec![String::new()];
        header.extend(self.labels.iter().cloned());
        wtr.write_record(&header)?;

        for (label, row) in self.labels.iter().zip(&self.confusion) {
            let mut record = vec![label.clone()];
            record.extend(row.iter().map(|c| c.to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels
            .iter()
            .map(|l| l.len())
            .max()
            .unwrap_or(0)
            .max(12);
        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9}  {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        let total: usize = self.per_class.iter().map(|m| m.support).sum();
        writeln!(f)?;
        write!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9.2}  {:>9}",
            "accuracy", "", "", self.accuracy, total
        )
    }
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub model: LinearTextModel,
    pub evaluation: Evaluation,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Split, fit on the training share, evaluate on the held-out share.
pub fn train(samples: &[LabeledSample], config: &TrainConfig) -> Result<TrainOutcome> {
    if samples.len() < config.min_labeled_rows {
        bail!(
            "Not enough labeled rows: {} (need at least {})",
            samples.len(),
            config.min_labeled_rows
        );
    }

    let (train_set, test_set) = split_holdout(samples, config.test_size);
    info!(
        train = train_set.len(),
        test = test_set.len(),
        "training category model"
    );

    let model = fit(&train_set, config)?;
    let evaluation = evaluate(&model, &test_set);
    info!(accuracy = evaluation.accuracy, "evaluated category model");

    Ok(TrainOutcome {
        model,
        evaluation,
        train_rows: train_set.len(),
        test_rows: test_set.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CITIES: &[&str] = &["NYC", "AUSTIN", "DENVER", "BOSTON", "SEATTLE"];

    fn corpus() -> Vec<LabeledSample> {
        let merchants = [
            ("STARBUCKS COFFEE", "Coffee"),
            ("SHELL OIL", "Gas"),
            ("WHOLE FOODS MKT", "Groceries"),
            ("NETFLIX COM", "Entertainment"),
        ];
        let mut out = Vec::new();
        for i in 0..10 {
            for (merchant, label) in merchants {
                let city = CITIES[i % CITIES.len()];
                out.push(LabeledSample::new(format!("{merchant} {city} {}", 100 + i), label));
            }
        }
        out
    }

    fn small_config() -> TrainConfig {
        TrainConfig {
            min_labeled_rows: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_split_is_stratified_and_deterministic() {
        let samples = corpus();
        let (train, test) = split_holdout(&samples, 0.2);
        assert_eq!(train.len(), 32);
        assert_eq!(test.len(), 8);
        for label in ["Coffee", "Gas", "Groceries", "Entertainment"] {
            assert_eq!(test.iter().filter(|s| s.label == label).count(), 2);
        }
        let (_, again) = split_holdout(&samples, 0.2);
        assert_eq!(test, again);
    }

    #[test]
    fn test_train_separable_corpus() {
        let outcome = train(&corpus(), &small_config()).unwrap();
        assert_eq!(outcome.train_rows, 32);
        assert_eq!(outcome.test_rows, 8);
        assert_eq!(outcome.evaluation.accuracy, 1.0);
        assert_eq!(
            outcome.model.labels(),
            &["Coffee", "Entertainment", "Gas", "Groceries"]
        );

        let m = &outcome.model;
        assert_eq!(m.predict_one("STARBUCKS COFFEE MIAMI 999"), "Coffee");
        assert_eq!(m.predict_one("SHELL OIL 57442"), "Gas");
        // Unknown text still gets some label
        assert!(m.labels().iter().any(|l| l == m.predict_one("")));
    }

    #[test]
    fn test_train_requires_enough_rows() {
        let err = train(&corpus(), &TrainConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Not enough labeled rows: 40"));
    }

    #[test]
    fn test_fit_requires_two_labels() {
        let samples = vec![
            LabeledSample::new("SHELL OIL", "Gas"),
            LabeledSample::new("SHELL OIL 2", "Gas"),
        ];
        let refs: Vec<&LabeledSample> = samples.iter().collect();
        assert!(fit(&refs, &small_config()).is_err());
    }

    #[test]
    fn test_evaluate_metrics() {
        let outcome = train(&corpus(), &small_config()).unwrap();
        let samples = vec![
            LabeledSample::new("STARBUCKS COFFEE", "Coffee"),
            LabeledSample::new("SHELL OIL", "Coffee"),
            LabeledSample::new("SHELL OIL", "Gas"),
        ];
        let refs: Vec<&LabeledSample> = samples.iter().collect();
        let eval = evaluate(&outcome.model, &refs);

        assert!((eval.accuracy - 2.0 / 3.0).abs() < 1e-9);
        let coffee = &eval.per_class[0];
        assert_eq!(coffee.label, "Coffee");
        assert_eq!(coffee.support, 2);
        assert_eq!(coffee.precision, 1.0);
        assert_eq!(coffee.recall, 0.5);
        let gas = eval.per_class.iter().find(|m| m.label == "Gas").unwrap();
        assert_eq!(gas.precision, 0.5);
        assert_eq!(gas.recall, 1.0);
        // Coffee row: one correct, one predicted as Gas (index 2)
        assert_eq!(eval.confusion[0], vec![1, 0, 1, 0]);
        assert!(eval.to_string().contains("accuracy"));
    }

    #[test]
    fn test_load_labeled_skips_blank_labels() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "date,description_clean,manual_category").unwrap();
        writeln!(f, "2024-01-01,STARBUCKS 1,Coffee").unwrap();
        writeln!(f, "2024-01-02,SHELL 2,").unwrap();
        writeln!(f, "2024-01-03,,Other").unwrap();
        f.flush().unwrap();

        let samples = load_labeled(f.path()).unwrap();
        assert_eq!(
            samples,
            vec![
                LabeledSample::new("STARBUCKS 1", "Coffee"),
                LabeledSample::new("", "Other"),
            ]
        );
    }

    #[test]
    fn test_load_labeled_missing_column() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "description,category").unwrap();
        f.flush().unwrap();
        let err = load_labeled(f.path()).unwrap_err();
        assert!(err.to_string().contains("Expected column 'description_clean'"));
    }

    #[test]
    fn test_confusion_csv() {
        let outcome = train(&corpus(), &small_config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confusion_matrix.csv");
        outcome.evaluation.write_confusion_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(",Coffee,Entertainment,Gas,Groceries"));
        assert_eq!(lines.next(), Some("Coffee,2,0,0,0"));
    }
}
