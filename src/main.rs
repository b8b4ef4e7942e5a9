use clap::Parser;
use std::process;
use survey_import::InterruptFlag;
use survey_import::cli::{args::Args, commands};

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        let interrupt = InterruptFlag::new();

        // Ctrl-C stops the file in progress between two lines; it commits nothing
        let signal_flag = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nReceived CTRL+C, stopping after the current line...");
                signal_flag.request();
            }
        });

        commands::run(args, interrupt).await
    });

    match result {
        Ok(summary) => process::exit(summary.exit_code()),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}
