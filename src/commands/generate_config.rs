use crate::config_file::DenoiserConfigFile;
use crate::constants::file::DEFAULT_CONFIG_FILE;
use crate::error::{DenoiserError, Result};
use clap::ArgMatches;
use log::info;
use std::fs;
use std::path::Path;

pub fn generate_config(app_m: &ArgMatches) -> Result<()> {
    let output_path = app_m.value_of("OUTPUT_FILE").unwrap_or(DEFAULT_CONFIG_FILE);
    let format = app_m.value_of("FORMAT").unwrap_or("toml");

    write_config(output_path, format, app_m.is_present("EXAMPLE"), app_m.is_present("FORCE"))?;

    info!("You can now edit the configuration file and use it with:");
    info!("  kpcn train --config {}", output_path);

    Ok(())
}

/// Writes a default (or commented example) configuration to `output_path`.
pub fn write_config<P: AsRef<Path>>(output_path: P, format: &str, example: bool, force: bool) -> Result<()> {
    let output_path = output_path.as_ref();

    if output_path.exists() && !force {
        return Err(DenoiserError::InvalidParameter(format!(
            "File {} already exists. Use --force to overwrite",
            output_path.display()
        )));
    }

    if example {
        if format != "toml" {
            return Err(DenoiserError::InvalidParameter(
                "Example configuration with comments is only available in TOML format".to_string(),
            ));
        }

        fs::write(output_path, DenoiserConfigFile::create_example_toml())?;
        info!("Generated example configuration file with comments: {}", output_path.display());
        return Ok(());
    }

    let config = DenoiserConfigFile::generate_default();
    match format {
        "toml" => config.to_toml_file(output_path)?,
        "json" => config.to_json_file(output_path)?,
        _ => {
            return Err(DenoiserError::InvalidParameter(format!(
                "Unknown format: {}. Use 'toml' or 'json'",
                format
            )));
        }
    }
    info!("Generated {} configuration file: {}", format.to_uppercase(), output_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_refuse_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        write_config(&path, "toml", false, false).unwrap();
        assert!(write_config(&path, "toml", false, false).is_err());
        write_config(&path, "toml", true, true).unwrap();

        let loaded = DenoiserConfigFile::from_toml_file(&path).unwrap();
        assert_eq!(loaded, DenoiserConfigFile::generate_default());
    }

    #[test]
    fn test_example_requires_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        assert!(write_config(&path, "json", true, false).is_err());
        assert!(write_config(&path, "yaml", false, false).is_err());
        write_config(&path, "json", false, false).unwrap();
        assert!(DenoiserConfigFile::from_json_file(&path).is_ok());
    }
}
