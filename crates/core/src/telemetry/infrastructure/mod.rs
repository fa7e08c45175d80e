pub mod record_builder;
pub mod record_codec;
