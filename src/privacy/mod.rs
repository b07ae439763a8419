pub mod bucketing;
pub mod cascade;
pub mod completion;
pub mod propagation;
pub mod redact;
pub mod suppression;

pub use bucketing::{plan_buckets, rebucket, BucketPlan};
pub use cascade::{apply_cascade, redact_to_threshold_and_round, round_survivors};
pub use completion::apply_completion;
pub use propagation::apply_propagation;
pub use redact::{redact_and_round, redact_and_round_column, redact_and_round_record, round_up};
pub use suppression::{apply_denominator_floor, summarize, Redaction, SuppressionReason};
