pub mod collect_records_use_case;
pub mod domain;
pub mod infrastructure;
