use std::error::Error;

use crate::cli::context::CliContext;
use crate::core::config::BaseUrlSource;
use crate::core::state::connection::{check_connection, ConnectionState};
use crate::core::state::settings::SettingsAction;
use crate::services::health::ServiceHealthReport;
use crate::services::ServiceHealthMonitor;

pub async fn run_health(context: &mut CliContext) -> Result<(), Box<dyn Error>> {
    println!(
        "Backend: {} (from {})",
        context.factory.config().base_url(),
        source_label(context.base_url_source)
    );

    let transition = check_connection(ConnectionState::default(), &context.factory).await;
    let connection = context.commit(transition)?;
    context.update_settings(SettingsAction::ConnectionChecked {
        connected: connection.is_connected,
    })?;

    let monitor = ServiceHealthMonitor::for_factory(&context.factory);
    let summary = monitor.check_all_services().await;
    for (name, report) in &summary.services {
        println!("{}", format_report(name, report));
    }

    if summary.overall {
        println!("✅ All services healthy");
        Ok(())
    } else {
        Err("One or more services are unhealthy".into())
    }
}

pub(crate) fn source_label(source: BaseUrlSource) -> &'static str {
    match source {
        BaseUrlSource::Override => "command line or environment",
        BaseUrlSource::ConfigFile => "config file",
        BaseUrlSource::Persisted => "saved settings",
        BaseUrlSource::Preset => "environment preset",
    }
}

pub(crate) fn format_report(name: &str, report: &ServiceHealthReport) -> String {
    let checked = report.last_check.format("%H:%M:%S");
    match (&report.error, report.healthy) {
        (Some(error), _) => format!("  ❌ {name:<14} {error}"),
        (None, true) => format!("  ✅ {name:<14} checked {checked}"),
        (None, false) => format!("  ⚠️  {name:<14} reported unhealthy at {checked}"),
    }
}
