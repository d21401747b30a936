use rust_decimal::Decimal;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tally_core::LabelSource;
use tally_finance::{
    LabeledSample, LinearTextModel, RuleClassifier, SpendSummary, TrainConfig, apply_model,
    category_breakdown, load_labeled, monthly_spend, train,
};
use tally_ingest::{LoadOptions, load, to_csv_string, write_csv_path};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn write_csv(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path
}

/// Load -> standardize -> rules -> totals on the two-row statement.
#[test]
fn test_rules_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_csv(
        dir.path(),
        "statement.csv",
        "date,description,amount\n2024-01-05,STARBUCKS #123,-4.50\n2024-01-06,PAYROLL DEPOSIT,2000.00\n",
    );

    let mut table = load(&input, &LoadOptions::default()).unwrap();
    RuleClassifier::default().apply(&mut table);

    assert_eq!(table.records[0].description_clean, "STARBUCKS 123");
    assert_eq!(table.records[0].rule_category.as_deref(), Some("Coffee"));
    assert_eq!(table.records[1].rule_category.as_deref(), Some("Income"));

    let summary = SpendSummary::from_table(&table).unwrap();
    assert_eq!(summary.total_expenses, dec("4.50"));
    assert_eq!(summary.total_income, dec("2000.00"));
    assert_eq!(summary.net, dec("1995.50"));

    let csv = to_csv_string(&table).unwrap();
    assert_eq!(
        csv,
        "date,description,amount,description_clean,rule_category\n\
         2024-01-05,STARBUCKS #123,-4.50,STARBUCKS 123,Coffee\n\
         2024-01-06,PAYROLL DEPOSIT,2000.00,PAYROLL DEPOSIT,Income\n"
    );
}

/// A messy bank export: variant headers, bad cells, blank rows, extra columns.
#[test]
fn test_messy_export_degrades_gracefully() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_csv(
        dir.path(),
        "bank.csv",
        "Posted,Details,Value,Card\n\
         01/05/2024,Uber   *Trip,-12.40,x1234\n\
         ,,,\n\
         pending,Chevron 0093,abc,x1234\n\
         01/31/2024,Whole Foods Mkt,\"(52.10)\",x9876\n",
    );

    let mut table = load(&input, &LoadOptions::default()).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.extra_columns, vec!["Card"]);
    assert_eq!(table.records[1].date, None);
    assert_eq!(table.records[1].amount, None);

    RuleClassifier::default().apply(&mut table);
    let labels: Vec<_> = table
        .records
        .iter()
        .map(|r| r.rule_category.clone().unwrap())
        .collect();
    assert_eq!(labels, vec!["Transport", "Gas", "Groceries"]);

    let monthly = monthly_spend(&table, LabelSource::Rule).unwrap();
    assert_eq!(monthly.len(), 2);
    assert_eq!(monthly[0].category, "Groceries");
    assert_eq!(monthly[0].amount_abs, dec("52.10"));
    assert_eq!(monthly[1].category, "Transport");

    let out = dir.path().join("labeled.csv");
    write_csv_path(&table, &out).unwrap();
    let reloaded = load(&out, &LoadOptions::default()).unwrap();
    assert_eq!(reloaded, table);
}

fn labeled_corpus() -> String {
    let merchants = [
        ("STARBUCKS STORE", "Coffee"),
        ("PEETS COFFEE", "Coffee"),
        ("SHELL OIL", "Gas"),
        ("CHEVRON STATION", "Gas"),
        ("TRADER JOES", "Groceries"),
        ("SAFEWAY STORE", "Groceries"),
    ];
    let mut csv = String::from("description_clean,manual_category\n");
    for i in 0..20 {
        for (merchant, label) in merchants {
            csv.push_str(&format!("{merchant} {},{label}\n", 1000 + i));
        }
    }
    csv.push_str("UNLABELED ROW,\n");
    csv
}

/// Train from a labeled CSV, persist, reload, and categorize a statement.
#[test]
fn test_model_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let labeled = write_csv(dir.path(), "labeled.csv", &labeled_corpus());

    let samples = load_labeled(&labeled).unwrap();
    assert_eq!(samples.len(), 120);
    assert!(!samples.contains(&LabeledSample::new("UNLABELED ROW", "")));

    let outcome = train(&samples, &TrainConfig::default()).unwrap();
    assert_eq!(outcome.test_rows, 24);
    assert!(outcome.evaluation.accuracy >= 0.95);

    let model_path = dir.path().join("expense_category_model.json");
    outcome.model.save(&model_path).unwrap();
    let model = LinearTextModel::load(&model_path).unwrap();

    let statement = write_csv(
        dir.path(),
        "statement.csv",
        "Transaction Date,Merchant,Amt\n\
         2024-03-01,Peets Coffee #77,-5.25\n\
         2024-03-02,SHELL OIL 5744,-41.00\n\
         2024-03-03,Safeway Store 12,-63.18\n\
         2024-03-04,,-1.00\n",
    );
    let mut table = load(&statement, &LoadOptions::default()).unwrap();
    apply_model(&model, &mut table);

    let predicted: Vec<_> = table
        .records
        .iter()
        .map(|r| r.predicted_category.clone().unwrap())
        .collect();
    assert_eq!(predicted[..3], ["Coffee", "Gas", "Groceries"]);
    assert!(!predicted[3].is_empty());

    let breakdown = category_breakdown(&table, LabelSource::Model);
    assert_eq!(breakdown.iter().map(|c| c.count).sum::<usize>(), 4);

    let confusion = dir.path().join("confusion_matrix.csv");
    outcome.evaluation.write_confusion_csv(&confusion).unwrap();
    assert!(confusion.exists());
}
