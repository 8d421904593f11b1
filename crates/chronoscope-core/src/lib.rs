//! Core types, configuration, and error handling for Chronoscope.
//!
//! This crate provides the shared foundation used by the analysis engine
//! and the CLI:
//! - [`ChronoscopeError`]: unified error type using `thiserror`
//! - [`ChronoscopeConfig`]: configuration loaded from `.chronoscope.toml`
//! - The source model: [`QualifiedId`], [`SourceNode`], [`SourceTree`]
//! - History input: [`Revision`], [`StructuralEdit`], [`HistoryReader`]
//! - Entity classification: [`LanguageAnalyzer`], [`AnalyzerRegistry`]

mod config;
mod error;
pub mod history;
mod id;
mod language;
mod revision;
mod source;
mod tree;
mod types;

pub use config::{
    ChronoscopeConfig, CouplingConfig, DivergentChangeConfig, FeatureEnvyConfig, LanguageConfig,
};
pub use error::ChronoscopeError;
pub use history::{load_history, write_history, HistoryReader};
pub use id::{QualifiedId, CONTAINER_SEPARATOR, MEMBER_SEPARATOR};
pub use language::{AnalyzerRegistry, DefaultAnalyzer, ExtensionAnalyzer, LanguageAnalyzer};
pub use revision::{is_valid_revision_id, Revision, StructuralEdit};
pub use source::{SourceNode, SourceNodeKind};
pub use tree::SourceTree;
pub use types::OutputFormat;

/// A convenience `Result` type for Chronoscope operations.
pub type Result<T> = std::result::Result<T, ChronoscopeError>;
