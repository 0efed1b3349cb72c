use clap::{CommandFactory, Parser};
use tracing::Level;

use kiket_sdk::cli::{self, Cli, Command, ConfigCommand};
use kiket_sdk::logging::{self, LogConfig, LogFormat, LogOutput};

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig {
        format: if cli.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Plaintext
        },
        output: LogOutput::Stderr,
        default_level: Level::WARN,
    };
    if let Err(e) = logging::init_logging(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = cli.manifest.as_deref();
    match cli.command {
        Some(Command::Config(ConfigCommand::Show)) => cli::handle_config_show(manifest),
        Some(Command::Config(ConfigCommand::Path)) => cli::handle_config_path(manifest),
        Some(Command::Sign {
            secret,
            body,
            body_file,
            timestamp,
        }) => cli::handle_sign(
            manifest,
            secret.as_deref(),
            body.as_deref(),
            body_file.as_deref(),
            timestamp,
        ),
        Some(Command::Version) => {
            cli::handle_version();
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}
