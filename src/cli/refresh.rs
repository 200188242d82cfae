use super::ui;
use crate::refresh::orchestrator::RefreshOutcome;
use crate::refresh::trigger::{RefreshTrigger, TriggerReport};
use anyhow::Result;

/// On-demand refresh. Fails the command when the run fails.
pub async fn run(trigger: &RefreshTrigger) -> Result<()> {
    let pb = ui::new_spinner("Refreshing exchange rates");
    let report = trigger.trigger_now().await;
    pb.finish_and_clear();

    match report.error_message() {
        None => {
            println!("{}", summary_line(&report));
            Ok(())
        }
        Some(message) => {
            eprintln!(
                "{}",
                ui::style_text(&summary_line(&report), ui::StyleType::Error)
            );
            anyhow::bail!("Currency rates refresh failed: {message}")
        }
    }
}

pub fn summary_line(report: &TriggerReport) -> String {
    let elapsed = ui::format_elapsed(report.elapsed);
    match &report.outcome {
        Ok(RefreshOutcome::Skipped) => {
            format!("All rates are fresh, nothing fetched ({elapsed})")
        }
        Ok(RefreshOutcome::Completed {
            job_id,
            records_processed,
            currencies_skipped,
        }) => format!(
            "Job {job_id} stored {records_processed} rates, {currencies_skipped} currencies already fresh ({elapsed})"
        ),
        Ok(RefreshOutcome::Failed { job_id, error }) => {
            format!("Job {job_id} failed after {elapsed}: {error}")
        }
        Err(e) => format!("Refresh could not run after {elapsed}: {e:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_summary_line() {
        let report = TriggerReport {
            elapsed: Duration::from_millis(420),
            outcome: Ok(RefreshOutcome::Completed {
                job_id: 3,
                records_processed: 30,
                currencies_skipped: 1,
            }),
        };
        assert_eq!(
            summary_line(&report),
            "Job 3 stored 30 rates, 1 currencies already fresh (420ms)"
        );

        let report = TriggerReport {
            elapsed: Duration::from_millis(1250),
            outcome: Ok(RefreshOutcome::Failed {
                job_id: 4,
                error: "HTTP error: 500 Internal Server Error for base currency: USD".to_string(),
            }),
        };
        assert_eq!(
            summary_line(&report),
            "Job 4 failed after 1.25s: HTTP error: 500 Internal Server Error for base currency: USD"
        );
    }
}
