//! Env Secret Layer Library
//!
//! This library manages an AWS Lambda layer that carries an environment file
//! built from a YAML document, AWS Secrets Manager secrets and explicit
//! overrides. Tests are included in the module files (e.g., parser.rs).

pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod package;
pub mod parser;
pub mod provider;
pub mod reconciler;
pub mod secrets;

pub use config::{AwsConfig, LayerSpec};
pub use error::{LayerError, Result};
pub use identity::LayerVersionArn;
pub use parser::EnvMap;
pub use reconciler::{
    DeleteOutcome, DiffPreview, FieldPlan, ManagedResourceState, Reconciler, UpdateOutcome,
};
pub use secrets::{DriftFingerprint, FetchPolicy, ResolvedSecrets};
