//! httpstat - command-line entry point

use clap::Parser;
use httpstat::{
    app::App,
    cli::{version_text, Cli},
    config::parser::load_config,
    error::{ErrorReporter, Result},
};
use std::io::IsTerminal;
use std::process;

/// Exit status for conflicting address-family flags (-1 as a process status)
const FAMILY_CONFLICT_EXIT: i32 = 255;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(1);
    }));

    let cli = Cli::parse();

    if cli.show_version {
        println!("{}", version_text());
        return;
    }

    if cli.four_only && cli.six_only {
        eprintln!("{}: Only one of -4 and -6 may be specified", program_name());
        process::exit(FAMILY_CONFLICT_EXIT);
    }

    let reporter = ErrorReporter::new(
        !cli.no_color && std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal(),
        cli.verbose || cli.debug,
    );

    if let Err(e) = run_application(cli).await {
        reporter.report_error(&e);
        process::exit(e.exit_code());
    }
}

async fn run_application(cli: Cli) -> Result<()> {
    let config = load_config(cli)?;
    let app = App::new(config)?;
    app.run().await?;
    Ok(())
}

fn program_name() -> String {
    std::env::args().next().unwrap_or_else(|| "httpstat".to_string())
}
