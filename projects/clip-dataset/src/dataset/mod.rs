// Annotation ingestion, manifest IO and stratified splitting

pub mod annotation;
pub mod manifest;
pub mod split;
pub mod types;
