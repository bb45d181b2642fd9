use anyhow::Result;
use clap::Parser;
use repolens::cli::{AppContext, Cli, Commands};
use repolens::infra::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose);

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Analyze(args) => repolens::analyze_run(args, &ctx),
        Commands::Scan(args) => repolens::scan_run(args, &ctx),
        Commands::Init(args) => repolens::infra::config::init(args, &ctx),
        Commands::Completions(args) => repolens::completion::run(args),
    }
}
