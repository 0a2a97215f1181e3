//! CLI command definitions using Clap.
//!
//! Every command builds an in-process window manager from the loaded
//! configuration, so the output reflects exactly what the service would
//! start with:
//!
//! - `query` - topology, window, avoid-area inspection and the full dump
//! - `simulate` - a scripted session driven through the service actor
//! - `types` - shared argument types

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Generator, Shell, generate};

use crate::config::{self, CasementConfig};
use crate::error::{WmError, WmResult};
use crate::modules::wm::state::DisplayId;
use crate::modules::wm::{Collaborators, WindowManager};
use crate::schema;

pub mod query;
pub mod simulate;
pub mod types;

pub use types::{CliAvoidAreaType, WindowSelector};

/// Application version from Cargo.toml.
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Casement CLI - inspect and exercise the window and display state manager.
#[derive(Parser, Debug)]
#[command(name = "casement")]
#[command(author, version = APP_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a custom configuration file.
    ///
    /// Overrides the default configuration file search paths.
    /// Supports JSONC format (JSON with comments).
    #[arg(long, short, global = true, value_name = "PATH", env = "CASEMENT_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum Commands {
    /// Show screens and displays.
    ///
    /// Lists every screen with its active mode and group membership, followed
    /// by the logical displays derived from them.
    Topology {
        /// Output as JSON.
        #[arg(long, short)]
        json: bool,
    },

    /// List windows, topmost first.
    ///
    /// The system bar and gesture windows created at startup are included.
    Windows {
        /// Only list windows on this display.
        #[arg(long, short)]
        display: Option<DisplayId>,

        /// Output as JSON.
        #[arg(long, short)]
        json: bool,
    },

    /// Compute the avoid area of a window.
    ///
    /// The window can be given by id or by name.
    ///
    /// Usage:
    ///   casement avoid-area system casement.status-bar.0
    ///   casement avoid-area cutout 3 --json
    AvoidArea {
        /// The avoid-area type.
        #[arg(value_enum)]
        area_type: CliAvoidAreaType,

        /// Window id or name.
        window: WindowSelector,

        /// Output as JSON.
        #[arg(long, short)]
        json: bool,
    },

    /// Dump the whole window manager state.
    ///
    /// Prints screens, displays, the window layout mode and every window with
    /// its mode, in one report.
    Dump {
        /// Output as JSON.
        #[arg(long, short)]
        json: bool,
    },

    /// Run a scripted session and print every event it produces.
    ///
    /// Creates a stage, sub windows and virtual screens, rotates, raises the
    /// keyboard and tears everything down again, all through the service actor.
    Simulate {
        /// Print events as JSON lines.
        #[arg(long, short)]
        json: bool,
    },

    /// Output Casement configuration JSON Schema.
    ///
    /// Outputs a JSON Schema to stdout that describes the structure of the
    /// configuration file. Can be redirected to a file for use with editors
    /// that support JSON Schema validation.
    Schema,

    /// Generate shell completions.
    ///
    /// Outputs shell completion script to stdout for the specified shell.
    ///
    /// Usage:
    ///   eval "$(casement completions --shell zsh)"
    ///   casement completions --shell fish > ~/.config/fish/completions/casement.fish
    Completions {
        /// The shell to generate completions for.
        #[arg(long, short, value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Returns the custom config path if specified via --config flag.
    #[must_use]
    pub fn config_path(&self) -> Option<PathBuf> { self.config.as_ref().map(PathBuf::from) }

    /// Register the custom config path, if any.
    ///
    /// # Errors
    ///
    /// Returns `Config` when the file does not exist.
    pub fn apply_config_path(&self) -> WmResult<()> {
        if let Some(path) = self.config_path() {
            if !path.exists() {
                return Err(WmError::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            config::set_custom_config_path(path);
        }
        Ok(())
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command execution fails.
    pub fn execute(&self) -> WmResult<()> {
        match &self.command {
            Commands::Topology { json } => {
                let wm = build_manager()?;
                query::topology(&wm, *json)
            }
            Commands::Windows { display, json } => {
                let wm = build_manager()?;
                query::windows(&wm, *display, *json)
            }
            Commands::AvoidArea { area_type, window, json } => {
                let wm = build_manager()?;
                query::avoid_area(&wm, (*area_type).into(), window, *json)
            }
            Commands::Dump { json } => {
                let wm = build_manager()?;
                query::dump(&wm, *json)
            }
            Commands::Simulate { json } => simulate::run(build_manager()?, *json),

            Commands::Schema => {
                let schema_output = schema::print_schema();
                println!("{schema_output}");
                Ok(())
            }

            Commands::Completions { shell } => {
                Self::print_completions(*shell);
                Ok(())
            }
        }
    }

    /// Print shell completions to stdout.
    fn print_completions<G: Generator>(generator: G) {
        let mut cmd = Self::command();
        generate(generator, &mut cmd, "casement", &mut io::stdout());
    }
}

/// Build a manager from the loaded configuration.
fn build_manager() -> WmResult<Arc<WindowManager>> {
    manager_from(config::get_config())
}

fn manager_from(config: &CasementConfig) -> WmResult<Arc<WindowManager>> {
    WindowManager::from_config(config, Collaborators::in_process(config.capabilities.iter().cloned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_cli_parses_schema() {
            let cli = Cli::try_parse_from(["casement", "schema"]).unwrap();
            assert!(matches!(cli.command, Commands::Schema));
        }

        #[test]
        fn test_cli_parses_completions_zsh() {
            let cli = Cli::try_parse_from(["casement", "completions", "--shell", "zsh"]).unwrap();
            match cli.command {
                Commands::Completions { shell } => assert_eq!(shell, Shell::Zsh),
                _ => panic!("Expected Completions command"),
            }
        }

        #[test]
        fn test_cli_parses_topology_json() {
            let cli = Cli::try_parse_from(["casement", "topology", "--json"]).unwrap();
            assert!(matches!(cli.command, Commands::Topology { json: true }));
        }

        #[test]
        fn test_cli_parses_windows_with_display() {
            let cli = Cli::try_parse_from(["casement", "windows", "-d", "1"]).unwrap();
            match cli.command {
                Commands::Windows { display, json } => {
                    assert_eq!(display, Some(1));
                    assert!(!json);
                }
                _ => panic!("Expected Windows command"),
            }
        }

        #[test]
        fn test_cli_parses_avoid_area_by_name() {
            let cli = Cli::try_parse_from([
                "casement",
                "avoid-area",
                "system-gesture",
                "casement.status-bar.0",
            ])
            .unwrap();
            match cli.command {
                Commands::AvoidArea { area_type, window, json } => {
                    assert_eq!(area_type, CliAvoidAreaType::SystemGesture);
                    assert_eq!(window, WindowSelector::Name("casement.status-bar.0".to_string()));
                    assert!(!json);
                }
                _ => panic!("Expected AvoidArea command"),
            }
        }

        #[test]
        fn test_cli_parses_avoid_area_by_id() {
            let cli = Cli::try_parse_from(["casement", "avoid-area", "keyboard", "7", "--json"]).unwrap();
            match cli.command {
                Commands::AvoidArea { window, json, .. } => {
                    assert_eq!(window, WindowSelector::Id(7));
                    assert!(json);
                }
                _ => panic!("Expected AvoidArea command"),
            }
        }

        #[test]
        fn test_cli_rejects_unknown_avoid_area_type() {
            assert!(Cli::try_parse_from(["casement", "avoid-area", "notch", "1"]).is_err());
        }

        #[test]
        fn test_cli_global_config_flag() {
            let cli = Cli::try_parse_from(["casement", "simulate", "--config", "/tmp/c.jsonc"]).unwrap();
            assert_eq!(cli.config_path(), Some(PathBuf::from("/tmp/c.jsonc")));
            assert!(matches!(cli.command, Commands::Simulate { json: false }));
        }

        #[test]
        fn test_cli_parses_dump_json() {
            let cli = Cli::try_parse_from(["casement", "dump", "-j"]).unwrap();
            assert!(matches!(cli.command, Commands::Dump { json: true }));
        }

        #[test]
        fn test_cli_requires_subcommand() {
            assert!(Cli::try_parse_from(["casement"]).is_err());
        }
    }

    mod execute_tests {
        use super::*;

        #[test]
        fn test_missing_config_file_is_reported() {
            let cli = Cli::try_parse_from(["casement", "topology", "-c", "/nonexistent/casement.jsonc"])
                .unwrap();
            assert!(matches!(cli.apply_config_path(), Err(WmError::Config(_))));
        }

        #[test]
        fn test_manager_from_default_config() {
            let wm = manager_from(&CasementConfig::default()).unwrap();
            assert_eq!(wm.all_screens().len(), 1);
            assert!(!wm.all_windows().is_empty());
        }

        #[test]
        fn test_query_commands_accept_built_manager() {
            let wm = manager_from(&CasementConfig::default()).unwrap();
            query::topology(&wm, true).unwrap();
            query::windows(&wm, Some(0), true).unwrap();
            query::dump(&wm, true).unwrap();
        }

        #[test]
        fn test_command_factory_is_consistent() { Cli::command().debug_assert(); }
    }
}
