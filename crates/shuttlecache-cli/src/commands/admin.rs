use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;

use shuttlecache_core::admin::{
    cell_display, course_progress, register_from_templates, save_master, DraftField,
    MasterTable, ScheduleEditor,
};
use shuttlecache_core::models::MasterType;
use shuttlecache_core::store::LocalStorage;
use shuttlecache_core::utils::truncate;
use shuttlecache_core::{LoadOutcome, ScheduleScope};

use crate::app::App;
use crate::cli::{EditCommand, MasterCommand};

pub async fn status(app: &App, refresh: bool) -> Result<()> {
    if refresh {
        let outcome = app
            .data_manager()?
            .load_schedule(ScheduleScope::AllFacilities)
            .await?;
        if let LoadOutcome::Cached { error, .. } = &outcome {
            eprintln!("Showing cached schedule: {}", error);
        }
    }

    let store = app.store.lock().await;
    let progress = course_progress(&store.data.courses, &store.data.schedules);

    app.emit(&progress, || {
        println!("{}", store.status.current_date);
        if progress.is_empty() {
            println!("No rides scheduled");
        }
        for p in &progress {
            println!(
                "{:<16} {:>3}/{:<3} done {:>3}%  on board {}  not started {}",
                truncate(&p.course_name, 16),
                p.finished,
                p.total,
                p.percent(),
                p.boarded,
                p.not_started(),
            );
        }
    })
}

pub async fn templates(app: &App, course: Option<String>) -> Result<()> {
    let templates = app.data_manager()?.load_templates(course.as_deref()).await?;
    app.emit(&templates, || {
        for t in &templates {
            println!(
                "{:<10} {:<20} {} stops",
                t.template_id,
                truncate(&t.template_name, 20),
                t.items.len()
            );
        }
    })
}

fn open_editor(storage: &LocalStorage) -> Result<ScheduleEditor> {
    ScheduleEditor::load(storage)?
        .ok_or_else(|| anyhow!("No course open - run `shuttle admin edit open <course>` first"))
}

/// Convert a 1-based row number from the command line.
fn row_index(row: usize) -> Result<usize> {
    row.checked_sub(1).ok_or_else(|| anyhow!("Rows are numbered from 1"))
}

fn print_editor(editor: &ScheduleEditor) {
    println!("{} on {} ({} rows)", editor.course_id(), editor.date(), editor.drafts().len());
    for (i, s) in editor.drafts().iter().enumerate() {
        println!(
            "{:>3}. {:>5} {:<4} {:<10} {:<12} {}",
            i + 1,
            s.scheduled_time,
            s.trip_type.as_wire(),
            s.user_id,
            truncate(&s.user_name, 12),
            s.vehicle_name.as_deref().unwrap_or("未指定"),
        );
    }
}

pub async fn edit(app: &App, command: EditCommand) -> Result<()> {
    // Snapshot what the editor needs so the lock is not held across requests
    let (storage, users, vehicles, courses) = {
        let store = app.store.lock().await;
        (
            store.storage().clone(),
            store.data.users.clone(),
            store.data.vehicles.clone(),
            store.data.courses.clone(),
        )
    };

    let editor = match command {
        EditCommand::Open { course_id } => {
            if !courses.is_empty() && !courses.iter().any(|c| c.id == course_id) {
                bail!("Unknown course: {}", course_id);
            }
            let mut store = app.store.lock().await;
            store.select_course(Some(course_id.clone()))?;
            let editor = ScheduleEditor::from_schedules(
                &course_id,
                store.status.current_date,
                &store.data.schedules,
            );
            editor.persist(&storage)?;
            editor
        }
        EditCommand::Show => open_editor(&storage)?,
        EditCommand::Template { template_id } => {
            let mut editor = open_editor(&storage)?;
            let templates = app
                .data_manager()?
                .load_templates(Some(editor.course_id()))
                .await?;
            let template = templates
                .iter()
                .find(|t| t.template_id == template_id)
                .ok_or_else(|| anyhow!("Template not found: {}", template_id))?;
            editor.load_template(template, &users);
            editor.persist(&storage)?;
            editor
        }
        EditCommand::Add => {
            let mut editor = open_editor(&storage)?;
            editor.add_empty_row();
            editor.persist(&storage)?;
            editor
        }
        EditCommand::Remove { row } => {
            let mut editor = open_editor(&storage)?;
            editor.remove_row(row_index(row)?)?;
            editor.persist(&storage)?;
            editor
        }
        EditCommand::Set { row, field, value } => {
            let mut editor = open_editor(&storage)?;
            let field: DraftField = field.parse()?;
            editor.update_row(row_index(row)?, field, &value, &users, &vehicles)?;
            editor.persist(&storage)?;
            editor
        }
        EditCommand::Save => {
            let editor = open_editor(&storage)?;
            editor.validate()?;
            let data = app.data_manager()?;
            editor
                .save(data.api(), &courses)
                .await
                .context("Failed to save schedule")?;
            ScheduleEditor::discard(&storage)?;
            data.load_schedule(ScheduleScope::AllFacilities).await?;
            println!("Saved {} rows for {}", editor.drafts().len(), editor.course_id());
            return Ok(());
        }
        EditCommand::SaveTemplate { name } => {
            let editor = open_editor(&storage)?;
            editor
                .save_as_template(&app.client()?, &name)
                .await
                .context("Failed to create template")?;
            println!("Saved template '{}'", name);
            return Ok(());
        }
        EditCommand::Discard => {
            ScheduleEditor::discard(&storage)?;
            println!("Draft discarded");
            return Ok(());
        }
    };

    app.emit(&editor, || print_editor(&editor))
}

pub async fn register(app: &App, template_ids: Vec<String>, vehicle: Option<String>) -> Result<()> {
    let data = app.data_manager()?;
    let date = data.store().lock().await.status.current_date;

    let results = register_from_templates(&data, &template_ids, date, vehicle.as_deref()).await;
    let failures = results.iter().filter(|(_, r)| r.is_err()).count();

    if app.json() {
        let report: Vec<_> = results
            .iter()
            .map(|(id, r)| match r {
                Ok(_) => json!({"templateId": id, "ok": true}),
                Err(e) => json!({"templateId": id, "ok": false, "error": format!("{:#}", e)}),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (id, result) in &results {
            match result {
                Ok(_) => println!("{}: registered for {}", id, date),
                Err(e) => eprintln!("{}: failed: {:#}", id, e),
            }
        }
    }

    if failures < results.len() {
        data.load_schedule(ScheduleScope::AllFacilities).await?;
    }
    if failures > 0 {
        bail!("{} of {} templates failed", failures, results.len());
    }
    Ok(())
}

fn print_table(table: &MasterTable) {
    let master = table.master();
    let fields = master.fields();
    println!("{}", master.label());
    let header: Vec<&str> = fields.iter().map(|f| f.label).collect();
    println!("{}", header.join("\t"));
    for row in table.rows() {
        let cells: Vec<String> = fields
            .iter()
            .map(|f| {
                if f.key == master.id_field() {
                    row.id.clone().unwrap_or_else(|| "(new)".to_string())
                } else {
                    cell_display(row.values.get(f.key))
                }
            })
            .collect();
        println!("{}", cells.join("\t"));
    }
}

async fn load_table(app: &App, master: MasterType) -> Result<MasterTable> {
    let store = app.store.lock().await;
    MasterTable::from_store(master, &store.data)
}

pub async fn master(app: &App, command: MasterCommand) -> Result<()> {
    match command {
        MasterCommand::List { master } => {
            let table = load_table(app, master).await?;
            let items = table.to_items();
            app.emit(&items, || print_table(&table))
        }
        MasterCommand::Add { master, values } => {
            let mut table = load_table(app, master).await?;
            let row = table.add_row();
            for (key, value) in &values {
                table.set(row, key, value)?;
            }
            let report = save_master(&app.data_manager()?, &table).await?;
            println!("Added a row to {}", master.label());
            for (name, error) in &report.failed {
                eprintln!("Could not reload {}: {}", name, error);
            }
            Ok(())
        }
        MasterCommand::Set { master, id, values } => {
            let mut table = load_table(app, master).await?;
            let row = table
                .position(&id)
                .ok_or_else(|| anyhow!("No {} with id {}", master, id))?;
            for (key, value) in &values {
                table.set(row, key, value)?;
            }
            save_master(&app.data_manager()?, &table).await?;
            println!("Updated {} {}", master, id);
            Ok(())
        }
    }
}
