//! Error types.
//!
//! The original engine left error handling as a `// TODO: Use snafu error
//! handling` marker (see the `Engine` in the upstream game-runtime code this
//! crate was forked from). This module follows through on that marker.

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("missing required field '{}' in element '{}'", field, element))]
    MissingField { element: String, field: String },

    #[snafu(display("unknown element name '{}'", name))]
    UnknownElement { name: String },

    #[snafu(display("stage region lies partly outside the {}x{} grid", width, height))]
    RegionOutOfBounds { width: u32, height: u32 },

    #[snafu(display("failed to parse configuration at '{}': {}", path, source))]
    Parse { path: String, source: serde_json::Error },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ResourceError {
    #[snafu(display("asset not found: {}", path))]
    NotFound { path: String },

    #[snafu(display("failed to decode image '{}': {}", path, source))]
    Decode {
        path: String,
        source: image::ImageError,
    },
}

/// Non-fatal: a stage's retry loop never found a valid layout. Logged at
/// warning; the build continues with whatever was last committed.
#[derive(Debug, Snafu)]
#[snafu(display("stage '{}' could not satisfy its layout after {} attempts", stage, attempts))]
pub struct LayoutError {
    pub stage: String,
    pub attempts: u32,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BuildError {
    #[snafu(display("map '{}': {}", map_id, source))]
    Config {
        map_id: String,
        source: ConfigError,
    },

    #[snafu(display("map '{}': {}", map_id, source))]
    Resource {
        map_id: String,
        source: ResourceError,
    },

    #[snafu(display("map '{}': required stage '{}' is missing", map_id, stage))]
    MissingStage { map_id: String, stage: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type ResourceResult<T> = Result<T, ResourceError>;
pub type BuildResult<T> = Result<T, BuildError>;
