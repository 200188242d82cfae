use super::ui;
use crate::refresh::trigger::RefreshTrigger;
use anyhow::Result;
use tracing::{error, info};

/// Startup refresh, then hourly refreshes until Ctrl-C.
///
/// On unix, SIGHUP triggers an extra refresh through the same run lock.
pub async fn run(trigger: &RefreshTrigger) -> Result<()> {
    trigger.startup().await?;

    let snapshot = trigger.cache().snapshot();
    println!(
        "{} {} currencies, rates for {} base currencies",
        ui::style_text("Serving", ui::StyleType::TotalLabel),
        snapshot.currencies().len(),
        snapshot.base_count()
    );
    println!(
        "{}",
        ui::style_text(
            "Refreshing at the top of every hour, SIGHUP to refresh now, Ctrl-C to stop",
            ui::StyleType::Subtle
        )
    );

    let periodic = trigger.run_periodic(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
    });
    tokio::select! {
        _ = periodic => {}
        _ = on_demand_refreshes(trigger) => {}
    }
    info!("Shutting down");
    Ok(())
}

#[cfg(unix)]
async fn on_demand_refreshes(trigger: &RefreshTrigger) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(hangups) => hangups,
        Err(e) => {
            error!(error = %e, "Failed to listen for SIGHUP, on-demand refresh disabled");
            return std::future::pending().await;
        }
    };
    while hangups.recv().await.is_some() {
        let report = trigger.trigger_now().await;
        println!("{}", super::refresh::summary_line(&report));
    }
    std::future::pending().await
}

#[cfg(not(unix))]
async fn on_demand_refreshes(_trigger: &RefreshTrigger) {
    std::future::pending().await
}
