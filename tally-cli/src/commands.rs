use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use tally_core::{LabelSource, TransactionTable};
use tally_finance::{
    LinearTextModel, SpendSummary, apply_model, category_breakdown, load_labeled, monthly_spend,
    train,
};
use tally_ingest::{LoadOptions, load, write_csv_path};

use crate::config::Config;
use crate::report;

pub const MODEL_FILE: &str = "expense_category_model.json";
pub const CONFUSION_FILE: &str = "confusion_matrix.csv";

fn load_statement(input: &Path, opts: &LoadOptions) -> Result<TransactionTable> {
    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }
    load(input, opts).with_context(|| format!("loading {}", input.display()))
}

fn save_table(table: &TransactionTable, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    write_csv_path(table, output).with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

/// Load, standardize, print a quick profile, and save the cleaned table.
pub fn cmd_clean(cfg: &Config, input: &Path, output: &Path) -> Result<()> {
    let table = load_statement(input, &cfg.ingest.load_options())?;

    println!("{}", report::head(&table, 5));
    println!("{}", report::shape(&table));
    println!("{}", report::columns(&table));
    println!("{}", report::missing(&table));

    match SpendSummary::from_table(&table) {
        Some(summary) => println!("{}\n", report::summary(&summary)),
        None => println!("No amount column; skipping spend summary\n"),
    }

    save_table(&table, output)?;
    println!("Saved cleaned data to {}", output.display());
    Ok(())
}

/// Label every row with the keyword rules and save.
pub fn cmd_rules(cfg: &Config, input: &Path, output: &Path, rules: Option<&Path>) -> Result<()> {
    let classifier = cfg.rules.classifier(rules)?;
    let mut table = load_statement(input, &cfg.ingest.load_options())?;
    classifier.apply(&mut table);

    println!("{}", report::head(&table, 10));
    println!("{}", report::breakdown(&category_breakdown(&table, LabelSource::Rule)));

    save_table(&table, output)?;
    println!("Saved labeled data to {}", output.display());
    Ok(())
}

/// Fit the category model on a hand-labeled CSV and write it plus its confusion matrix.
pub fn cmd_train(cfg: &Config, data: &Path, model_dir: &Path) -> Result<PathBuf> {
    if !data.exists() {
        bail!("Labeled data not found: {}", data.display());
    }
    let samples = load_labeled(data)?;
    println!("Labeled rows: {}", samples.len());

    let outcome = train(&samples, &cfg.train)?;
    println!(
        "Train rows: {}  Test rows: {}\n",
        outcome.train_rows, outcome.test_rows
    );
    println!("{}\n", outcome.evaluation);

    fs::create_dir_all(model_dir)
        .with_context(|| format!("create {}", model_dir.display()))?;
    let model_path = model_dir.join(MODEL_FILE);
    outcome.model.save(&model_path)?;
    let confusion_path = model_dir.join(CONFUSION_FILE);
    outcome.evaluation.write_confusion_csv(&confusion_path)?;

    println!("Saved model to {}", model_path.display());
    println!("Saved confusion matrix to {}", confusion_path.display());
    Ok(model_path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Classifier {
    /// Trained text model
    Model,
    /// Keyword rules
    Rules,
}

pub struct AnalyzeArgs<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub classifier: Classifier,
    pub model: Option<&'a Path>,
    pub rules: Option<&'a Path>,
    pub preview: usize,
}

/// Categorize a statement and report totals, category counts, and monthly spend.
pub fn cmd_analyze(cfg: &Config, args: AnalyzeArgs<'_>) -> Result<()> {
    let mut table = load_statement(args.input, &cfg.ingest.load_options())?;

    let source = match args.classifier {
        Classifier::Model => {
            let model_path = args.model.unwrap_or(cfg.model.path.as_path());
            if !model_path.exists() {
                bail!(
                    "Model not found at {}. Run `tally train` first or pass --classifier rules",
                    model_path.display()
                );
            }
            let model = LinearTextModel::load(model_path)?;
            apply_model(&model, &mut table);
            LabelSource::Model
        }
        Classifier::Rules => {
            cfg.rules.classifier(args.rules)?.apply(&mut table);
            LabelSource::Rule
        }
    };
    info!(rows = table.len(), column = source.column(), "categorized statement");

    println!("{}", report::head(&table, args.preview));

    if let Some(summary) = SpendSummary::from_table(&table) {
        println!("{}\n", report::summary(&summary));
    }

    println!("Transactions per category:");
    println!("{}", report::breakdown(&category_breakdown(&table, source)));

    match monthly_spend(&table, source) {
        Some(rows) if !rows.is_empty() => {
            println!("Monthly spend by category:");
            println!("{}", report::monthly(&rows));
        }
        Some(_) => println!("No dated expenses to trend\n"),
        None => println!("No date and amount columns; skipping monthly trend\n"),
    }

    save_table(&table, args.output)?;
    println!("Saved categorized data to {}", args.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_ingest::load_str;

    const STATEMENT: &str = "Transaction Date,Merchant,Amt\n\
        2024-01-05,STARBUCKS #123,-4.50\n\
        2024-01-06,PAYROLL DEPOSIT,2000.00\n\
        2024-02-07,Shell Oil 5744,-41.00\n";

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_clean_writes_standardized_csv() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "in.csv", STATEMENT);
        let output = dir.path().join("out").join("clean.csv");

        cmd_clean(&Config::default(), &input, &output).unwrap();

        let written = fs::read_to_string(&output).unwrap();
        assert!(written.starts_with("date,description,amount,description_clean\n"));
        assert!(written.contains("2024-02-07,Shell Oil 5744,-41.00,SHELL OIL 5744\n"));
    }

    #[test]
    fn test_rules_then_analyze_with_rules() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "in.csv", STATEMENT);
        let labeled = dir.path().join("labeled.csv");

        cmd_rules(&Config::default(), &input, &labeled, None).unwrap();
        let table = load_str(&fs::read_to_string(&labeled).unwrap(), &LoadOptions::default())
            .unwrap();
        let cats: Vec<_> = table
            .records
            .iter()
            .map(|r| r.rule_category.as_deref().unwrap())
            .collect();
        assert_eq!(cats, vec!["Coffee", "Income", "Gas"]);

        let output = dir.path().join("categorized.csv");
        cmd_analyze(
            &Config::default(),
            AnalyzeArgs {
                input: &input,
                output: &output,
                classifier: Classifier::Rules,
                model: None,
                rules: None,
                preview: 2,
            },
        )
        .unwrap();
        assert!(output.exists());
    }

    #[test]
    fn test_analyze_without_model_asks_for_training() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "in.csv", STATEMENT);
        let missing = dir.path().join("models").join(MODEL_FILE);

        let err = cmd_analyze(
            &Config::default(),
            AnalyzeArgs {
                input: &input,
                output: &dir.path().join("out.csv"),
                classifier: Classifier::Model,
                model: Some(&missing),
                rules: None,
                preview: 5,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("tally train"));
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_clean(
            &Config::default(),
            &dir.path().join("absent.csv"),
            &dir.path().join("out.csv"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Input file not found"));
    }

    #[test]
    fn test_train_writes_model_and_confusion_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = String::from("description_clean,manual_category\n");
        for i in 0..40 {
            body.push_str(&format!("STARBUCKS {i},Coffee\n"));
            body.push_str(&format!("SHELL OIL {i},Gas\n"));
            body.push_str(&format!("NETFLIX COM {i},Entertainment\n"));
        }
        let data = write(dir.path(), "labeled.csv", &body);
        let model_dir = dir.path().join("models");

        let model_path = cmd_train(&Config::default(), &data, &model_dir).unwrap();
        assert_eq!(model_path, model_dir.join(MODEL_FILE));
        assert!(model_dir.join(CONFUSION_FILE).exists());

        let mut cfg = Config::default();
        cfg.model.path = model_path;
        let input = write(dir.path(), "in.csv", STATEMENT);
        let output = dir.path().join("categorized.csv");
        cmd_analyze(
            &cfg,
            AnalyzeArgs {
                input: &input,
                output: &output,
                classifier: Classifier::Model,
                model: None,
                rules: None,
                preview: 25,
            },
        )
        .unwrap();

        let written = fs::read_to_string(&output).unwrap();
        assert!(written.lines().next().unwrap().ends_with(",predicted_category"));
    }

    #[test]
    fn test_train_rejects_small_data() {
        let dir = tempfile::tempdir().unwrap();
        let data = write(
            dir.path(),
            "labeled.csv",
            "description_clean,manual_category\nSTARBUCKS 1,Coffee\nSHELL 2,Gas\n",
        );
        let err = cmd_train(&Config::default(), &data, &dir.path().join("models")).unwrap_err();
        assert!(err.to_string().contains("Not enough labeled rows"));
    }
}
