#![forbid(unsafe_code)]

use clap::Parser;

fn main() {
    let cli = flowgate_cli::Cli::parse();
    let json_errors = cli.json_errors;
    if let Err(error) = flowgate_cli::run_from(cli) {
        if json_errors {
            eprintln!(
                "{}",
                serde_json::json!({
                    "status": "error",
                    "error": error.to_string(),
                    "exit_code": error.exit_code(),
                })
            );
        } else {
            eprintln!("flowgate: {error}");
        }
        std::process::exit(error.exit_code());
    }
}
