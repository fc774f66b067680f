//! registry-digest command-line entry point

use registry_digest::cli::{Args, Runner};
use std::process;

#[tokio::main]
async fn main() {
    let args = Args::parse_args().from_env();

    let runner = match Runner::new(args) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("❌ ERROR: {}", e);
            process::exit(Runner::error_exit_code(&e));
        }
    };

    let reports = match runner.run().await {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("❌ ERROR: {}", e);
            process::exit(Runner::error_exit_code(&e));
        }
    };

    match runner.render(&reports) {
        Ok(rendered) if !rendered.is_empty() => println!("{}", rendered),
        Ok(_) => {}
        Err(e) => {
            eprintln!("❌ ERROR: {}", e);
            process::exit(1);
        }
    }

    process::exit(Runner::exit_code(&reports));
}
