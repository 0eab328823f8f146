use clap::{ColorChoice, Parser};
use hlsdl::Args;
use kdam::{term, term::Colorizer};
use std::{
    io::{IsTerminal, stderr},
    process,
};

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let color = match args.color {
        ColorChoice::Always => true,
        ColorChoice::Auto => stderr().is_terminal(),
        ColorChoice::Never => false,
    };

    term::init(color);
    colored::control::set_override(color);
    hlsdl::logger::init(args.log_level)?;
    args.execute().await
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {:#}", "error".colorize("bold red"), e);
        process::exit(1);
    }
}
