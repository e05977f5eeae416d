//! Command handlers. Each returns the text printed to stdout.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use linkhub_core::import::{export_json, import_directory, write_export};
use linkhub_core::settings::{load_settings, save_settings};
use linkhub_core::{Collection, Record};
use linkhub_remote_sync::{Endpoint, PullOutcome, PullReport};
use serde_json::Value;

use crate::context::ServiceContext;

fn format_millis(millis: Option<i64>) -> String {
    millis
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}

pub fn status(context: &ServiceContext) -> anyhow::Result<String> {
    let settings = load_settings(context.store.as_ref());
    let state = context.cache.get_state();

    let mut out = String::new();
    writeln!(out, "Database:       {}", context.db_path.display())?;
    writeln!(
        out,
        "Endpoint:       {}",
        context
            .client
            .endpoint()
            .map(|endpoint| endpoint.to_string())
            .unwrap_or_else(|e| format!("({})", e))
    )?;
    writeln!(
        out,
        "Remote autosave: {}",
        if settings.remote_autosave { "on" } else { "off" }
    )?;
    writeln!(out, "Stored shape:   {:?}", context.cache.stored_shape())?;
    writeln!(out, "Last save:      {}", format_millis(context.cache.last_saved_at()))?;
    writeln!(out, "Last push:      {}", format_millis(context.client.last_pushed_at()))?;
    for (collection, count) in state.counts() {
        writeln!(out, "  {:<12} {}", collection.key(), count)?;
    }
    Ok(out)
}

pub async fn push(context: &ServiceContext) -> anyhow::Result<String> {
    let response = context.sync_service.save_now().await.map_err(|e| {
        if e.status_code() == Some(403) {
            anyhow::Error::new(e).context("gateway refused the write; pass --origin with an allowed origin")
        } else {
            e.into()
        }
    })?;
    let mut out = String::new();
    let written = response.results.iter().filter(|result| result.ok).count();
    writeln!(out, "Pushed {}/{} files", written, response.results.len())?;
    for failed in response.failed_results() {
        writeln!(
            out,
            "  failed {}: {}",
            failed.path,
            failed.error.as_deref().unwrap_or("unknown error")
        )?;
    }
    Ok(out)
}

/// `replaced_local` tells whether an empty remote replaced the local state.
fn describe_pull(report: &PullReport, replaced_local: bool) -> anyhow::Result<String> {
    let mut out = String::new();
    match &report.outcome {
        PullOutcome::Loaded { state, source } => {
            writeln!(
                out,
                "Loaded {} records ({:?} read)",
                state.total_records(),
                source
            )?;
        }
        PullOutcome::EmptyRemote { .. } if replaced_local => {
            writeln!(out, "Remote returned no records; local data replaced")?;
        }
        PullOutcome::EmptyRemote { .. } => {
            writeln!(
                out,
                "Remote returned no records; local data kept (use --force to replace it)"
            )?;
        }
    }
    if let Some(error) = &report.combined_error {
        writeln!(out, "  combined read failed: {}", error)?;
    }
    for degraded in &report.degraded {
        writeln!(
            out,
            "  {} unavailable, local copy kept: {}",
            degraded.collection, degraded.error
        )?;
    }
    Ok(out)
}

pub async fn pull(context: &ServiceContext, force: bool) -> anyhow::Result<String> {
    let local_was_empty = context.cache.get_state().is_empty();
    let report = context.sync_service.load_from_remote(force).await?;
    describe_pull(&report, force || local_was_empty)
}

/// Pull when nothing is stored locally. Errors are reported, not fatal.
pub async fn autoload(context: &ServiceContext) -> Option<String> {
    let local_was_empty = context.cache.get_state().is_empty();
    match context.sync_service.autoload(false).await {
        Ok(Some(report)) => describe_pull(&report, local_was_empty).ok(),
        Ok(None) => None,
        Err(e) => Some(format!("Startup load skipped: {}\n", e)),
    }
}

pub async fn diagnose(context: &ServiceContext) -> anyhow::Result<String> {
    let diagnostics = context.client.diagnostics().await?;
    let mut out = String::new();
    writeln!(out, "Service:         {} {}", diagnostics.service, diagnostics.version)?;
    writeln!(out, "Allowed origins: {}", diagnostics.allowed_origins.join(", "))?;
    writeln!(out, "Origin matched:  {}", diagnostics.origin_matched)?;
    writeln!(
        out,
        "Repository:      owner={} repo={} token={} branch={}",
        diagnostics.owner,
        diagnostics.repo,
        diagnostics.token,
        diagnostics.branch.as_deref().unwrap_or("-")
    )?;
    Ok(out)
}

pub fn import(context: &ServiceContext, dir: &Path) -> anyhow::Result<String> {
    let (state, summary) = import_directory(dir, &context.sync_service.state())?;
    context.sync_service.replace_state(state);

    let mut out = String::new();
    for (collection, count) in &summary.replaced {
        writeln!(out, "Imported {} {}", count, collection.key())?;
    }
    if summary.reassigned_links > 0 {
        writeln!(
            out,
            "Moved {} links without a known section to the first section",
            summary.reassigned_links
        )?;
    }
    Ok(out)
}

pub fn export(context: &ServiceContext, out: Option<&Path>) -> anyhow::Result<String> {
    let state = context.cache.get_state();
    match out {
        Some(path) => {
            write_export(path, &state)?;
            Ok(format!(
                "Exported {} records to {}\n",
                state.total_records(),
                path.display()
            ))
        }
        None => {
            let mut json = export_json(&state)?;
            json.push('\n');
            Ok(json)
        }
    }
}

pub async fn clear(context: &ServiceContext) -> anyhow::Result<String> {
    context.sync_service.clear_local().await?;
    Ok("Local data cleared\n".to_string())
}

/// Insert or replace one record by id.
pub fn add(context: &ServiceContext, collection: &str, json: &str) -> anyhow::Result<String> {
    let collection = Collection::from_key(collection)
        .with_context(|| format!("unknown collection '{}'", collection))?;
    let value: Value = serde_json::from_str(json).context("record is not valid JSON")?;
    let Value::Object(fields) = value else {
        bail!("record must be a JSON object");
    };
    let record = Record::from_fields(fields);
    let Some(id) = record.id().map(str::to_string) else {
        bail!("record needs a string \"id\" field");
    };

    let mut replaced = false;
    context.sync_service.update(|state| {
        let records = state.collection_mut(collection);
        match records.iter_mut().find(|existing| existing.id() == Some(id.as_str())) {
            Some(existing) => {
                *existing = record;
                replaced = true;
            }
            None => records.push(record),
        }
    });

    Ok(format!(
        "{} {} {}\n",
        if replaced { "Replaced" } else { "Added" },
        collection.key(),
        id
    ))
}

pub fn set_endpoint(context: &ServiceContext, endpoint: &str) -> anyhow::Result<String> {
    let endpoint = Endpoint::parse(endpoint)?;
    let mut settings = load_settings(context.store.as_ref());
    settings.endpoint = Some(endpoint.to_string());
    save_settings(context.store.as_ref(), &settings)?;
    Ok(format!("Endpoint set to {}\n", endpoint))
}

pub fn set_autosave(context: &ServiceContext, enabled: bool) -> anyhow::Result<String> {
    let mut settings = load_settings(context.store.as_ref());
    settings.remote_autosave = enabled;
    save_settings(context.store.as_ref(), &settings)?;
    Ok(format!(
        "Remote autosave {}\n",
        if enabled { "enabled" } else { "disabled" }
    ))
}
