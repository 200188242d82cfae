use super::ui;
use crate::core::job::JobExecutionRecord;
use crate::core::store::RateStore;
use anyhow::Result;
use comfy_table::{Cell, Color, Table};

pub async fn run(store: &dyn RateStore, limit: usize) -> Result<()> {
    let jobs = store.find_job_executions(limit).await?;
    if jobs.is_empty() {
        println!("No refresh runs recorded yet.");
        return Ok(());
    }
    println!(
        "\n{}",
        ui::style_text("Recent refresh runs", ui::StyleType::Title)
    );
    println!("{}", jobs_table(&jobs));
    Ok(())
}

pub fn jobs_table(jobs: &[JobExecutionRecord]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Id"),
        ui::header_cell("Started"),
        ui::header_cell("Status"),
        ui::header_cell("Records"),
        ui::header_cell("Duration"),
        ui::header_cell("Error"),
    ]);
    for job in jobs {
        table.add_row(vec![
            ui::format_optional_cell(job.id, |id| id.to_string()),
            Cell::new(ui::format_timestamp(job.start_time)),
            ui::job_status_cell(job.status),
            ui::format_optional_cell(job.records_processed, |n| n.to_string()),
            duration_cell(job),
            Cell::new(job.error_message.as_deref().unwrap_or("")),
        ]);
    }
    table
}

fn duration_cell(job: &JobExecutionRecord) -> Cell {
    if !job.status.is_terminal() {
        return Cell::new("running").fg(Color::Yellow);
    }
    ui::format_optional_cell(job.duration(), |d| {
        ui::format_elapsed(d.to_std().unwrap_or_default())
    })
}
