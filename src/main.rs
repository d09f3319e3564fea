use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{Generator, generate};
use colored::Colorize;
use flashback::cli::{Cli, Commands};
use flashback::commands::sync::SyncMode;
use flashback::output::{self, Verbosity};
use flashback::{FlashbackContext, commands, logging};
use std::io;
use std::process;

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    output::set_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose));

    if let Commands::Completion { shell } = cli.command {
        print_completions(shell, &mut Cli::command());
        return Ok(());
    }

    let mut ctx = FlashbackContext::new()?.with_overrides(cli.manifest, cli.dest);
    logging::init(cli.verbose, ctx.config.logging.file.as_deref())?;

    match cli.command {
        Commands::Init { force } => commands::init::execute(&ctx, force)?,
        Commands::Status { short } => commands::status::execute(&ctx, short)?,
        Commands::List => commands::list::execute(&ctx)?,
        Commands::Add { paths } => commands::add::execute(&ctx, &paths)?,
        Commands::Rm { index } => commands::rm::execute(&ctx, index)?,
        Commands::Sync { all, select } => {
            let mode = SyncMode::from_args(all, select.as_deref())?;
            commands::sync::execute(&ctx, mode)?;
        }
        Commands::Config {
            key,
            value,
            unset,
            list,
        } => commands::config::execute(&mut ctx, key.as_deref(), value.as_deref(), unset, list)?,
        Commands::Completion { .. } => {}
    }

    Ok(())
}

fn print_completions<G: Generator>(g: G, cmd: &mut clap::Command) {
    generate(g, cmd, cmd.get_name().to_string(), &mut io::stdout());
}
