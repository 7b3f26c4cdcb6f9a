//! Explicit config file source, e.g. from `--config`. The file must exist.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::File;
use config::FileFormat;
use std::path::Path;

/// Add a required TOML file to builder.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        File::from(path)
            .format(FileFormat::Toml)
            .required(true),
    )
}
