//! tally-finance: keyword rules, the trained category model, and spend analytics

pub mod category_rules;
pub mod model;
pub mod summary;
pub mod training;

pub use category_rules::{KeywordRule, OTHER, RuleClassifier};
pub use model::{CategoryModel, LinearTextModel, TfidfVectorizer, apply_model};
pub use summary::{CategoryCount, MonthlySpend, SpendSummary, category_breakdown, monthly_spend};
pub use training::{Evaluation, LabeledSample, TrainConfig, TrainOutcome, load_labeled, train};
