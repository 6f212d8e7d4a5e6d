mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::BatchProgress;
pub use styling::{dim, magenta_bold};
pub use summary::{print_failures, print_pipeline_summary};

/// Prints the `tfcollect` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🧱 tfcollect"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Terraform Collection Pipeline")
    );
}
