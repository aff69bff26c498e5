mod app;

use clap::Parser;

use callweave::weave::{WeaveOutcome, Weaver};

use crate::app::Cli;

fn main() {
    let cli = Cli::parse();

    // callweave info+ on stderr; --verbose enables debug; RUST_LOG overrides
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("callweave", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    if let Err(error) = run(cli) {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.into_config();
    let module_path = config.module_path.clone();

    match Weaver::new(config).run()? {
        WeaveOutcome::AlreadyInstrumented => {
            println!("{}: already instrumented, nothing to do", module_path.display());
        }
        WeaveOutcome::Woven(summary) => {
            println!("{}:", summary.module_path.display());
            println!("  methods instrumented:   {}", summary.methods_instrumented);
            println!("  call sites spliced:     {}", summary.call_sites_spliced);
            println!("  caller-side targets:    {}", summary.call_targets);
            println!("  helper types:           {}", summary.helper_types);
            if summary.skipped > 0 {
                println!("  skipped (see warnings): {}", summary.skipped);
            }
            if let Some(symbol_path) = summary.symbol_path {
                println!("  symbols:                {}", symbol_path.display());
            }
        }
    }

    Ok(())
}
