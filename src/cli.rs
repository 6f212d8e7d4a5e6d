use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;
use crate::pipeline;
use crate::stages::{self, clone, discover, overrides, pull};

#[derive(Parser)]
#[command(name = "tfcollect")]
#[command(author, version, about = "Terraform Collection Pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover repositories from Bitbucket and write them to a generated config
    Discover {
        #[arg(default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Generated config path (defaults to repos.yaml next to CONFIG)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sparse-clone or update every configured repository
    Clone {
        #[arg(default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Copy override .tf files into every working copy
    Override {
        #[arg(default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Run terraform init and state pull in every working copy
    Pull {
        #[arg(default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Run clone, override and pull in order, stopping at the first failure
    Run {
        #[arg(default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Run discovery first and use its generated config for later stages
        #[arg(short, long, default_value_t = false)]
        discover: bool,
    },
}

impl Cli {
    /// Runs the selected command; `Ok(false)` means the command failed.
    pub async fn execute(&self) -> Result<bool> {
        match &self.command {
            Commands::Discover { config, output } => {
                info!("Using config file: {}", config.display());
                discover::run(config, output.clone()).await
            }
            Commands::Clone { config } => {
                info!("Using config file: {}", config.display());
                clone::run(config, stages::production_runner()).await
            }
            Commands::Override { config } => {
                info!("Using config file: {}", config.display());
                overrides::run(config).await
            }
            Commands::Pull { config } => {
                info!("Using config file: {}", config.display());
                pull::run(config, stages::production_runner()).await
            }
            Commands::Run { config, discover } => {
                info!("Using config file: {}", config.display());
                pipeline::run(config, *discover, stages::production_runner()).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_defaults_to_config_yaml() {
        let cli = Cli::parse_from(["tfcollect", "clone"]);
        match cli.command {
            Commands::Clone { config } => assert_eq!(config, PathBuf::from("config.yaml")),
            _ => panic!("expected clone command"),
        }
    }

    #[test]
    fn test_run_with_discover_flag() {
        let cli = Cli::parse_from(["tfcollect", "run", "prod.yaml", "--discover"]);
        match cli.command {
            Commands::Run { config, discover } => {
                assert_eq!(config, PathBuf::from("prod.yaml"));
                assert!(discover);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_discover_output_override() {
        let cli = Cli::parse_from(["tfcollect", "discover", "-o", "out/repos.yaml"]);
        match cli.command {
            Commands::Discover { config, output } => {
                assert_eq!(config, PathBuf::from("config.yaml"));
                assert_eq!(output, Some(PathBuf::from("out/repos.yaml")));
            }
            _ => panic!("expected discover command"),
        }
    }
}
