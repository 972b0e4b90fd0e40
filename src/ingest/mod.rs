//! File ingestion
//!
//! Stages, in order: `parser` turns uploaded bytes into header/value rows,
//! `columns` classifies each column, `reconciler` finds or creates the
//! subject and period record, `extractor` persists metric observations.
//! `pipeline` drives the whole sequence inside one transaction.

pub mod columns;
pub mod extractor;
pub mod parser;
pub mod pipeline;
pub mod reconciler;

pub use pipeline::{ingest_file, IngestError, IngestReport};
