mod cli;
mod commands;
mod prompt;

use clap::Parser;
use memtrust_common::paths;

use cli::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.verbose {
        0 => cli.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    // Hold the non-blocking guards for the lifetime of main so logs flush on exit.
    let log_guards = init_logging(env_filter, cli.log_file.as_deref())?;

    paths::set_keystore_location(&cli.keystore_dir, &cli.keystore_file);

    let result = match &cli.command {
        Command::Version => {
            commands::version(cli.json);
            Ok(())
        }
        Command::Certs(certs) => commands::certs::run(&certs.command, &cli),
        Command::Fetch(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            let result = rt.block_on(commands::fetch::run(args, &cli));
            // A prompt may still be waiting on stdin; don't wait for it.
            rt.shutdown_background();
            result
        }
    };

    if let Err(e) = result {
        let code = commands::error_code(&e);
        if cli.json {
            commands::print_json(&serde_json::json!({
                "error": code,
                "message": format!("{e:#}"),
            }));
        } else {
            eprintln!("Error: {e:#}");
        }
        drop(log_guards);
        std::process::exit(code.exit_code());
    }
    Ok(())
}

pub(crate) fn init_logging(
    env_filter: tracing_subscriber::EnvFilter,
    log_file: Option<&std::path::Path>,
) -> anyhow::Result<Vec<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::prelude::*;

    // Non-blocking stderr keeps log writes off the handshake thread.
    let (nb_stderr, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(nb_stderr);

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let (nb_file, file_guard) = tracing_appender::non_blocking(file);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(nb_file);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();

        Ok(vec![stderr_guard, file_guard])
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();

        Ok(vec![stderr_guard])
    }
}
