pub mod commands;
pub mod output;
pub mod types;

// Re-export commonly used items
pub use output::progress::{create_spinner, ProgressBarExt};
pub use types::{Cli, Commands};

/// Report a failed command and exit with status 1.
///
/// In JSON mode the error chain is printed to stdout as `{"error": ..., "causes": [...]}`
/// so scripted callers always get a parseable document.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": causes,
        });
        println!("{body}");
    } else {
        eprintln!("Error: {err:#}");
    }
    tracing::error!(error = %err, "command failed");
    std::process::exit(1);
}
