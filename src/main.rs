mod args;
mod report;

use clap::Parser;
use log::{info, warn};
use snafu::ErrorCompat;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = args::Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    info!("args: {:?}", args);

    let res = report::run_report(&args).await;
    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
