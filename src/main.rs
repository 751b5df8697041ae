use mozreport::cli::{self, CliError, Context};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_env("MOZREPORT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = try_main() {
        match err.downcast_ref::<CliError>() {
            Some(expected) => eprintln!("{}", expected),
            None => eprintln!("error: {:#}", err),
        }
        process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let invocation = cli::parse_args(pico_args::Arguments::from_env())?;
    let command = match invocation.command {
        Some(command) => command,
        None => {
            print!("{}", cli::usage());
            return Ok(());
        }
    };
    let ctx = Context::from_env(invocation.pipeline)?;
    cli::run(command, &ctx)
}
