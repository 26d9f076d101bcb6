//! Small-foreign metric derivation.

mod calculator;

pub use calculator::MetricDeriver;
