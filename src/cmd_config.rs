//! `config` subcommands.

use std::path::Path;

use promptcast_config::{default_config_path, Config, ConfigValidator};

use crate::cli::ConfigAction;

pub(crate) fn handle_config_command(
    action: ConfigAction,
    path: Option<&Path>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Check => check(path, config),
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}

fn check(path: Option<&Path>, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(path) => println!("Configuration: {}", path.display()),
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                println!("Configuration: {}", default_path.display());
            } else {
                println!("Configuration: built-in defaults");
            }
        }
    }

    let result = ConfigValidator::validate(config)?;
    for warning in &result.warnings {
        println!("  warning  {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("  error    {}: {}", error.path, error.message);
    }

    if result.is_valid() {
        println!("OK ({} warning(s))", result.warnings.len());
        Ok(())
    } else {
        Err(format!("{} configuration error(s)", result.errors.len()).into())
    }
}
