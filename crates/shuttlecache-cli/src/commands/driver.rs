use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::json;

use shuttlecache_core::models::{
    vehicles_for_facility, visible_schedules, PendingRecord, RideStatus, ScheduleFilter,
};
use shuttlecache_core::utils::{age_display, format_optional, parse_date, truncate};
use shuttlecache_core::{Config, InitReport, LoadOutcome, ScheduleScope, SyncOutcome};

use crate::app::App;
use crate::cli::{ConfigArgs, SetupArgs};

pub fn config(app: &App, args: ConfigArgs) -> Result<()> {
    let mut config = app.config.clone();
    let changed = args.api_url.is_some()
        || args.default_facility.is_some()
        || args.offline_mode.is_some()
        || args.log_to_file.is_some();

    if let Some(url) = args.api_url {
        config.api_url = Some(url).filter(|u| !u.is_empty());
    }
    if let Some(id) = args.default_facility {
        config.default_facility = Some(id).filter(|i| !i.is_empty());
    }
    if let Some(offline) = args.offline_mode {
        config.offline_mode = offline;
    }
    if let Some(log) = args.log_to_file {
        config.log_to_file = log;
    }
    if changed {
        config.save().context("Failed to save config")?;
    }

    let path = Config::config_path()?;
    app.emit(&config, || {
        println!("config:           {}", path.display());
        println!("api_url:          {}", format_optional(config.api_url.as_deref(), "(not set)"));
        println!("default_facility: {}", format_optional(config.default_facility.as_deref(), "-"));
        println!("offline_mode:     {}", config.offline_mode);
        println!("log_to_file:      {}", config.log_to_file);
    })
}

fn print_init_report(report: &InitReport) {
    if !report.loaded.is_empty() {
        println!("Loaded: {}", report.loaded.join(", "));
    }
    for (name, error) in &report.failed {
        eprintln!("Could not load {} (using cached copy): {}", name, error);
    }
}

fn print_load_outcome(outcome: &LoadOutcome) {
    match outcome {
        LoadOutcome::Fresh { count } => println!("Schedule: {} rides", count),
        LoadOutcome::Cached { count, error } => {
            eprintln!("Schedule fetch failed, showing {} cached rides: {}", count, error)
        }
    }
}

pub fn describe_sync(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Offline => "offline; changes kept for later".to_string(),
        SyncOutcome::NothingToSend => "nothing to sync".to_string(),
        SyncOutcome::AlreadyRunning => "a sync is already running".to_string(),
        SyncOutcome::Completed(report) if report.aborted_offline => format!(
            "connection lost; {} sent, {} still queued",
            report.delivered, report.remaining
        ),
        SyncOutcome::Completed(report) if report.remaining == 0 => {
            format!("sync complete ({} sent)", report.delivered)
        }
        SyncOutcome::Completed(report) => format!(
            "{} sent, {} failed, {} still queued",
            report.delivered, report.failed, report.remaining
        ),
    }
}

pub async fn init(app: &App, admin: bool) -> Result<()> {
    let data = app.data_manager()?;
    let report = if admin {
        data.init_admin().await?
    } else {
        data.init_driver().await?
    };
    let scope = if admin {
        ScheduleScope::AllFacilities
    } else {
        ScheduleScope::CurrentFacility
    };
    let outcome = data.load_schedule(scope).await?;

    let synced = match app.sync_manager() {
        Some(sync) => Some(sync.sync().await?),
        None => None,
    };

    if app.json() {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "loaded": report.loaded,
                "failed": report.failed,
                "schedule": match &outcome {
                    LoadOutcome::Fresh { count } => json!({"fresh": true, "count": count}),
                    LoadOutcome::Cached { count, error } => json!({"fresh": false, "count": count, "error": error}),
                },
            }))?
        );
        return Ok(());
    }

    print_init_report(&report);
    print_load_outcome(&outcome);
    if let Some(outcome) = synced {
        println!("Sync: {}", describe_sync(&outcome));
    }
    Ok(())
}

pub async fn setup(app: &App, args: SetupArgs) -> Result<()> {
    let mut store = app.store.lock().await;

    if let Some(facility) = args.facility {
        if !store.data.facilities.is_empty() && !store.data.facilities.iter().any(|f| f.id == facility) {
            bail!("Unknown facility: {}", facility);
        }
        store.select_facility(Some(facility))?;
    }
    if let Some(vehicle) = args.vehicle {
        let vehicle = Some(vehicle).filter(|v| !v.is_empty());
        if let Some(id) = &vehicle {
            if !store.data.vehicles.is_empty() && !store.data.vehicles.iter().any(|v| &v.id == id) {
                bail!("Unknown vehicle: {}", id);
            }
        }
        store.select_vehicle(vehicle)?;
    }
    if let Some(date) = args.date {
        let date = parse_date(&date).map_err(anyhow::Error::msg)?;
        store.select_date(date)?;
    }
    if let Some(driver) = args.driver {
        store.set_driver(&driver)?;
    }
    if let Some(attendant) = args.attendant {
        store.set_attendant(&attendant)?;
    }

    let status = store.status.clone();
    let facility_name = store
        .data
        .facilities
        .iter()
        .find(|f| Some(&f.id) == status.current_facility.as_ref())
        .map(|f| f.name.clone());
    let vehicle_name = store.current_vehicle().map(|v| v.name.clone());

    app.emit(&status, || {
        println!(
            "Facility:  {}",
            format_optional(facility_name.as_deref().or(status.current_facility.as_deref()), "-")
        );
        println!(
            "Vehicle:   {}",
            format_optional(vehicle_name.as_deref().or(status.current_vehicle.as_deref()), "-")
        );
        println!("Date:      {}", status.current_date);
        println!("Driver:    {}", status.current_driver);
        println!("Attendant: {}", status.current_attendant);
        if let Some(at) = status.last_refreshed {
            println!("Refreshed: {}", age_display(at));
        }
    })
}

pub async fn vehicles(app: &App, all: bool) -> Result<()> {
    let store = app.store.lock().await;
    let vehicles = vehicles_for_facility(
        &store.data.vehicles,
        store.status.current_facility.as_deref(),
        all,
    );

    app.emit(&vehicles, || {
        if vehicles.is_empty() {
            println!("No vehicles. Run `shuttle init` first.");
        }
        for v in &vehicles {
            let marker = if store.status.current_vehicle.as_deref() == Some(v.id.as_str()) {
                "*"
            } else {
                " "
            };
            println!("{} {:<8} {:<12} {}", marker, v.id, truncate(&v.name, 12), v.detail());
        }
    })
}

pub async fn schedule(app: &App, filter: ScheduleFilter, refresh: bool) -> Result<()> {
    if refresh {
        let outcome = app
            .data_manager()?
            .load_schedule(ScheduleScope::CurrentFacility)
            .await?;
        if let LoadOutcome::Cached { error, .. } = &outcome {
            eprintln!("Showing cached schedule: {}", error);
        }
    }

    let store = app.store.lock().await;
    let rides = visible_schedules(
        &store.data.schedules,
        store.status.current_vehicle.as_deref(),
        filter,
    );

    app.emit(&rides, || {
        println!("{}  ({} rides)", store.status.current_date, rides.len());
        for s in &rides {
            let mark = if s.is_done() { "✓" } else { " " };
            println!(
                "[{}] {:<10} {:>5} {:<4} {:<12} {}",
                mark,
                s.schedule_id.as_deref().unwrap_or("-"),
                s.scheduled_time,
                s.trip_type.as_wire(),
                truncate(&s.user_name, 12),
                s.status.as_ref().map(|st| st.as_wire()).unwrap_or(""),
            );
            if let Some(note) = &s.note {
                println!("      {}", note);
            }
        }
        let pending = store.pending().len();
        if pending > 0 {
            println!("{} change(s) waiting to sync", pending);
        }
    })
}

/// Queue `record` and report what happened to it.
async fn queue_record(app: &App, record: PendingRecord) -> Result<()> {
    let schedule_id = record.schedule_id.clone();
    let status = record.status.clone();

    let outcome = match app.sync_manager() {
        Some(sync) => sync.push_record(record).await?.1,
        None => {
            app.store
                .lock()
                .await
                .enqueue(record, Utc::now().timestamp_millis())?;
            SyncOutcome::Offline
        }
    };

    let status_label = status.as_ref().map(|s| s.to_string()).unwrap_or_else(|| "cleared".to_string());
    app.emit(
        &json!({"scheduleId": schedule_id, "status": status, "sync": describe_sync(&outcome)}),
        || println!("{}: {} ({})", schedule_id, status_label, describe_sync(&outcome)),
    )
}

pub async fn check(app: &App, schedule_id: &str) -> Result<()> {
    let record = app.store.lock().await.toggle_check(schedule_id)?;
    queue_record(app, record).await
}

pub async fn status(app: &App, schedule_id: &str, status: &str, note: Option<String>) -> Result<()> {
    let status = match status.trim().to_lowercase().as_str() {
        "none" | "clear" | "" => None,
        _ => Some(status.parse::<RideStatus>().map_err(anyhow::Error::msg)?),
    };
    let record = app
        .store
        .lock()
        .await
        .update_status(schedule_id, status, note)?;
    queue_record(app, record).await
}

pub async fn sync(app: &App, watch: bool, interval: u64) -> Result<()> {
    let Some(sync) = app.sync_manager() else {
        bail!("No API endpoint configured - run `shuttle config --api-url <url>`");
    };

    if !watch {
        let outcome = sync.sync().await?;
        println!("{}", describe_sync(&outcome));
        return Ok(());
    }

    println!("Watching every {}s, Ctrl-C to stop", interval);
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    sync.watch(Duration::from_secs(interval.max(1)), shutdown).await?;
    let remaining = app.store.lock().await.pending().len();
    println!("Stopped; {} change(s) still queued", remaining);
    Ok(())
}

pub async fn pending(app: &App) -> Result<()> {
    let store = app.store.lock().await;
    let records = store.pending().records();
    app.emit(&records, || {
        if records.is_empty() {
            println!("Nothing waiting to sync");
        }
        for r in records {
            println!(
                "{} {:<10} {:<8} {} {}",
                r.timestamp,
                r.schedule_id,
                r.status.as_ref().map(|s| s.as_wire()).unwrap_or("-"),
                r.date,
                r.note.as_deref().unwrap_or(""),
            );
        }
    })
}

pub async fn api_info(app: &App) -> Result<()> {
    let info = app.client()?.get_api_info().await?;
    app.emit(&info, || {
        println!("Endpoint: {}", app.config.endpoint().unwrap_or_default());
        println!("Version:  {}", format_optional(info.version.as_deref(), "unknown"));
        for (key, value) in &info.extra {
            println!("{}: {}", key, value);
        }
    })
}
