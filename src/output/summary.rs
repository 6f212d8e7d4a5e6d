use comfy_table::Cell;
use std::fmt::{Display, Write};

use crate::batch::StageReport;
use crate::pipeline::StageResult;

use super::styling::{bright, bright_green, bright_red};
use super::tables::{create_table, cyan_header, status_cell};

/// Prints the permanently failed items of a stage run to stderr.
///
/// Nothing is printed when the stage succeeded; the summary log line
/// already covers that case.
pub fn print_failures<T: Display>(report: &StageReport<T>) {
    if !report.is_success() {
        eprintln!("{}", render_failures(report));
    }
}

pub fn render_failures<T: Display>(report: &StageReport<T>) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} {}",
        bright_red("✗"),
        bright(format!(
            "{} stage: {} of {} items failed after retry",
            report.stage,
            report.failed.len(),
            report.total()
        ))
        .underlined()
    );

    let mut table = create_table();
    table.set_header(cyan_header(&["Item", "Cause"]));
    for failed in &report.failed {
        table.add_row(vec![
            Cell::new(failed.item.to_string()),
            Cell::new(&failed.cause),
        ]);
    }

    let _ = write!(output, "{table}");
    output
}

/// Prints the orchestrator's per-stage results to stderr.
pub fn print_pipeline_summary(results: &[StageResult]) {
    eprintln!("{}", render_pipeline_summary(results));
}

pub fn render_pipeline_summary(results: &[StageResult]) -> String {
    let mut output = String::new();
    let all_ok = results.iter().all(|r| r.success);
    let heading = if all_ok {
        bright_green("✓ Pipeline completed").to_string()
    } else {
        bright_red("✗ Pipeline stopped").to_string()
    };
    let _ = writeln!(output, "{heading}");

    let mut table = create_table();
    table.set_header(cyan_header(&["Stage", "Status", "Duration"]));
    for result in results {
        table.add_row(vec![
            Cell::new(result.stage.name()),
            status_cell(result.success),
            Cell::new(format!("{:.1}s", result.duration.as_secs_f64())),
        ]);
    }

    let _ = write!(output, "{table}");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::FailedItem;
    use crate::pipeline::Stage;
    use std::time::Duration;

    #[test]
    fn test_render_failures_lists_items_and_causes() {
        let report = StageReport {
            stage: "Clone",
            succeeded: vec!["git@host:org/ok.git".to_string()],
            skipped: 0,
            failed: vec![FailedItem {
                item: "git@host:org/broken.git".to_string(),
                cause: "repository not found".to_string(),
            }],
            attempts: vec![1, 2],
        };

        let rendered = render_failures(&report);
        assert!(rendered.contains("1 of 2 items failed"));
        assert!(rendered.contains("git@host:org/broken.git"));
        assert!(rendered.contains("repository not found"));
        assert!(!rendered.contains("org/ok.git"));
    }

    #[test]
    fn test_render_pipeline_summary() {
        let results = vec![
            StageResult {
                stage: Stage::Clone,
                success: true,
                duration: Duration::from_millis(1500),
            },
            StageResult {
                stage: Stage::Override,
                success: false,
                duration: Duration::from_millis(200),
            },
        ];

        let rendered = render_pipeline_summary(&results);
        assert!(rendered.contains("Pipeline stopped"));
        assert!(rendered.contains("clone"));
        assert!(rendered.contains("override"));
        assert!(rendered.contains("1.5s"));
        assert!(rendered.contains("failed"));
    }
}
