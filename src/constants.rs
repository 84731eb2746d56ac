//! # Constants
//!
//! Shared constants used throughout the crate.

/// Separator used when joining nested `yaml_config` keys
pub const KEY_SEPARATOR: &str = "_";

/// Number of colon-separated components in a versioned layer ARN
/// (`arn:partition:lambda:region:account:layer:name:version`)
pub const LAYER_VERSION_ARN_COMPONENTS: usize = 8;

/// Zero-based position of the stable layer name inside a layer ARN
pub const LAYER_NAME_COMPONENT: usize = 6;

/// Default state file used by the CLI
pub const DEFAULT_STATE_FILE: &str = "envlayer.state.json";

/// Default tracing filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "env_secret_layer=info,envlayer=info";
