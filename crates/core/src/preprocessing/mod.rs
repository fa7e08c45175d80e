pub mod histogram_stats;
pub mod preprocessor;
