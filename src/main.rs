mod args;
mod split;

use clap::Parser;
use log::{info, LevelFilter};

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
    info!("args: {:?}", args);

    if let Err(e) = split::run_split(&args) {
        eprintln!("An error occured: {}", e);
        std::process::exit(1);
    }
}
