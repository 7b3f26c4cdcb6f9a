//! Configuration loading entry point.

use super::merge::builder_with_defaults;
use super::sources::{environment, explicit_file, global_file};
use super::CollocateConfig;
use crate::error::GuardError;
use config::{File, FileFormat};
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from every source.
    ///
    /// Precedence, lowest first: defaults, global file, `config_file` (required
    /// when given), `COLLOCATE_*` environment variables.
    pub fn load(config_file: Option<&Path>) -> Result<CollocateConfig, GuardError> {
        let mut builder = global_file::add_to_builder(builder_with_defaults()?)?;
        if let Some(path) = config_file {
            builder = explicit_file::add_to_builder(builder, path);
        }
        let builder = environment::add_to_builder(builder);

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load a single TOML file over the defaults, without global or environment
    /// sources.
    pub fn load_from_file(path: &Path) -> Result<CollocateConfig, GuardError> {
        let builder = explicit_file::add_to_builder(builder_with_defaults()?, path);
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Parse TOML text over the defaults
    pub fn load_from_str(contents: &str) -> Result<CollocateConfig, GuardError> {
        let builder =
            builder_with_defaults()?.add_source(File::from_str(contents, FileFormat::Toml));
        Ok(builder.build()?.try_deserialize()?)
    }
}
