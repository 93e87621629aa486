use anyhow::Result;
use cell_seg::cli::Cli;
use clap::Parser;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cell_seg=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
