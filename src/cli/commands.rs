//! CLI commands and argument parsing
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, subcommands, and their arguments.

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tabled::Tabled;
use tracing::info;

use crate::config::{init_default_config, save_config, Config};
use crate::error::Result;
use crate::utils::format::{render_program, DisplayUtils, ProgramFormat, TableFormatter};
use crate::vault::manager::StackManager;

/// Get the full version string with build information
fn get_version() -> &'static str {
    env!("VERSION_WITH_GIT")
}

/// Get build information for display
pub fn get_build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: env!("GIT_HASH"),
        git_branch: env!("GIT_BRANCH"),
        build_time: env!("BUILD_TIME"),
        full_version: env!("VERSION_WITH_GIT"),
    }
}

#[derive(Debug)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    pub build_time: &'static str,
    pub full_version: &'static str,
}

#[derive(Parser)]
#[command(name = "vault-tenants")]
#[command(about = "Generate multi-tenant HashiCorp Vault configuration from tenant declarations")]
#[command(version = get_version(), author)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Settings file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE", env = "VAULT_TENANTS_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where to read tenants from, overriding configuration
#[derive(Args, Debug, Clone, Default)]
pub struct StackArgs {
    /// Directory holding tenant YAML files
    #[arg(long, value_name = "DIR")]
    pub config_path: Option<PathBuf>,

    /// GCP project used by dynamic secret rolesets
    #[arg(long)]
    pub project: Option<String>,
}

impl StackArgs {
    fn apply(self, config: &mut Config) {
        if let Some(path) = self.config_path {
            config.config_path = Some(path);
        }
        if let Some(project) = self.project {
            config.project = Some(project);
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the program document for all tenants
    Plan {
        #[command(flatten)]
        stack: StackArgs,
        /// Document format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ProgramFormat,
        /// Write the document to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Check every tenant declaration without writing anything
    Validate {
        #[command(flatten)]
        stack: StackArgs,
    },
    /// Show tenants and aggregated auth bindings
    Summary {
        #[command(flatten)]
        stack: StackArgs,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Show version and build information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show the settings file path
    Path,
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value (empty clears optional keys)
        value: String,
    },
    /// Write a default settings file
    Init,
}

impl Cli {
    pub fn execute(self, mut config: Config) -> Result<()> {
        if self.no_color {
            config.no_color = true;
        }

        let settings = self.settings;

        match self.command {
            Commands::Plan {
                stack,
                format,
                output,
            } => {
                stack.apply(&mut config);
                execute_plan(config, format, output)
            }
            Commands::Validate { stack } => {
                stack.apply(&mut config);
                execute_validate(config)
            }
            Commands::Summary { stack } => {
                stack.apply(&mut config);
                execute_summary(config)
            }
            Commands::Config { command } => execute_config_command(command, config, settings),
            Commands::Completions { shell } => execute_completions(shell),
            Commands::Version => execute_version_command(),
        }
    }
}

fn execute_plan(config: Config, format: ProgramFormat, output: Option<PathBuf>) -> Result<()> {
    let display = DisplayUtils::new(config.no_color);
    let manager = StackManager::new(config)?;
    let plan = manager.plan()?;
    let rendered = render_program(&plan.program, format)?;

    match output {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            info!("Wrote program document to {}", path.display());
            display.print_success(&format!(
                "Wrote {} resource(s) for {} tenant(s) to {}",
                plan.program.resources().len(),
                plan.report.tenants.len(),
                path.display()
            ));
        }
        None => print!("{rendered}"),
    }

    Ok(())
}

fn execute_validate(config: Config) -> Result<()> {
    let display = DisplayUtils::new(config.no_color);
    let manager = StackManager::new(config)?;
    let plan = manager.plan()?;
    let report = &plan.report;

    display.print_success(&format!(
        "{} tenant(s) in {} file(s) are valid",
        report.tenants.len(),
        report.files
    ));
    println!(
        "{}",
        display.format_key_value_pairs(&[
            ("Resources", plan.program.resources().len().to_string()),
            ("Outputs", plan.program.outputs().len().to_string()),
            ("GitHub orgs", report.auth.organizations.to_string()),
            ("GitHub teams", report.auth.teams.to_string()),
            ("AppRoles", report.auth.app_roles.to_string()),
        ])
    );

    Ok(())
}

fn execute_summary(config: Config) -> Result<()> {
    let no_color = config.no_color;
    let display = DisplayUtils::new(no_color);
    let formatter = TableFormatter::new(no_color);
    let manager = StackManager::new(config)?;
    let plan = manager.plan()?;

    display.print_header("Tenants");
    println!("{}", formatter.format_table(&plan.report.tenants));
    println!();

    display.print_header("Auth bindings");
    if plan.report.bindings.is_empty() {
        display.print_info("No GitHub teams or AppRoles declared");
    } else {
        println!("{}", formatter.format_table(&plan.report.bindings));
    }

    Ok(())
}

fn execute_config_command(
    command: ConfigCommands,
    config: Config,
    settings: Option<PathBuf>,
) -> Result<()> {
    let settings_path = match settings {
        Some(path) => path,
        None => Config::get_config_path()?,
    };

    match command {
        ConfigCommands::Show => execute_config_show(&config),
        ConfigCommands::Path => {
            println!("{}", settings_path.display());
            Ok(())
        }
        ConfigCommands::Set { key, value } => execute_config_set(&key, &value, config, settings_path),
        ConfigCommands::Init => {
            let display = DisplayUtils::new(config.no_color);
            if init_default_config(&settings_path)? {
                display.print_success(&format!(
                    "Created configuration at {}",
                    settings_path.display()
                ));
            } else {
                display.print_warning(&format!(
                    "Configuration already exists at {}",
                    settings_path.display()
                ));
            }
            Ok(())
        }
    }
}

fn execute_config_show(config: &Config) -> Result<()> {
    #[derive(Tabled)]
    struct ConfigItem {
        #[tabled(rename = "Setting")]
        key: &'static str,
        #[tabled(rename = "Value")]
        value: String,
    }

    let or_unset = |value: Option<String>| value.unwrap_or_else(|| "<not set>".to_string());

    let items = vec![
        ConfigItem {
            key: "config_path",
            value: or_unset(config.config_path.as_ref().map(|p| p.display().to_string())),
        },
        ConfigItem {
            key: "project",
            value: or_unset(config.project.clone()),
        },
        ConfigItem {
            key: "program_name",
            value: config.program_name.clone(),
        },
        ConfigItem {
            key: "github_base_url",
            value: or_unset(config.github_base_url.clone()),
        },
        ConfigItem {
            key: "write_policy_template",
            value: config.write_policy_template.display().to_string(),
        },
        ConfigItem {
            key: "read_policy_template",
            value: config.read_policy_template.display().to_string(),
        },
        ConfigItem {
            key: "secret_id_wrapping_ttl",
            value: or_unset(config.secret_id_wrapping_ttl.clone()),
        },
        ConfigItem {
            key: "no_color",
            value: config.no_color.to_string(),
        },
    ];

    let formatter = TableFormatter::new(config.no_color);
    println!("{}", formatter.format_table(&items));

    Ok(())
}

fn execute_config_set(key: &str, value: &str, mut config: Config, path: PathBuf) -> Result<()> {
    config.set(key, value)?;
    save_config(&config, &path)?;

    let display = DisplayUtils::new(config.no_color);
    display.print_success(&format!("Set {key} = {value}"));
    Ok(())
}

fn execute_completions(shell: clap_complete::Shell) -> Result<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
    Ok(())
}

fn execute_version_command() -> Result<()> {
    let build_info = get_build_info();

    println!("vault-tenants");
    println!("=============");
    println!("Version:      {}", build_info.version);
    println!("Full Version: {}", build_info.full_version);
    println!("Git Hash:     {}", build_info.git_hash);
    println!("Git Branch:   {}", build_info.git_branch);
    println!("Built:        {}", build_info.build_time);

    Ok(())
}
