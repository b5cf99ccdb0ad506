//! Inspect and prune the state file

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use reconcile::{ResourceState, StateStatus};

use crate::Context;
use crate::progress;
use crate::ui;

fn status_label(status: StateStatus) -> colored::ColoredString {
    match status {
        StateStatus::Applied => status.as_str().green(),
        StateStatus::Failed => status.as_str().red(),
        StateStatus::Pending => status.as_str().yellow(),
        _ => status.as_str().dimmed(),
    }
}

/// "just now", "5m ago", "3h ago", "2d ago"
fn age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..60 => "just now".to_string(),
        60..3600 => format!("{}m ago", secs / 60),
        3600..86_400 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

fn entry_line(id: &str, state: &ResourceState, now: DateTime<Utc>) -> String {
    format!(
        "{:<40} {:<8} {}",
        id,
        status_label(state.status),
        age(state.last_applied, now).dimmed()
    )
}

pub fn run(ctx: &Context, status: Option<StateStatus>, prune: bool) -> Result<()> {
    if prune {
        return run_prune(ctx);
    }

    let file = crate::paths::declarations_file(ctx.file.as_deref());
    let store = super::open_state(&file)?;

    if store.is_empty() {
        ui::info(&format!("No state recorded in {}", store.path().display()));
        return Ok(());
    }

    ui::header(&format!("State ({})", store.path().display()));
    let now = Utc::now();
    let mut shown = 0;
    for (id, state) in store.entries() {
        if status.is_some_and(|s| state.status != s) {
            continue;
        }
        shown += 1;
        println!("  {}", entry_line(id.as_str(), state, now));
        if let Some(error) = state.error_message() {
            ui::dim(&format!("  {}", ui::truncate(error, 100)));
        }
    }

    println!();
    for s in [StateStatus::Applied, StateStatus::Failed] {
        ui::kv(s.as_str(), &store.ids_by_status(s).len().to_string());
    }
    if shown == 0 {
        ui::warn("No entries match the status filter");
    }
    Ok(())
}

fn run_prune(ctx: &Context) -> Result<()> {
    let loaded = super::load(ctx)?;
    let mut store = super::open_state(&loaded.file)?;

    let pb = if ctx.quiet {
        progress::hidden()
    } else {
        progress::spinner("Pruning stale state entries...")
    };
    let removed = store
        .cleanup(&loaded.graph)
        .context("Failed to prune state")?;

    if removed == 0 {
        progress::finish_success(&pb, "State already matches declarations");
    } else {
        progress::finish_success(&pb, &format!("Removed {removed} stale entries"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_age() {
        let now = Utc::now();
        assert_eq!(age(now, now), "just now");
        assert_eq!(age(now - Duration::seconds(90), now), "1m ago");
        assert_eq!(age(now - Duration::hours(5), now), "5h ago");
        assert_eq!(age(now - Duration::days(3), now), "3d ago");
        assert_eq!(age(now + Duration::seconds(30), now), "just now");
    }

    #[test]
    fn test_entry_line() {
        colored::control::set_override(false);
        let now = Utc::now();
        let state = ResourceState {
            status: StateStatus::Failed,
            last_applied: now - Duration::minutes(2),
            ..ResourceState::default()
        };
        let line = entry_line("package:apt:nginx", &state, now);
        assert!(line.starts_with("package:apt:nginx"));
        assert!(line.contains("failed"));
        assert!(line.ends_with("2m ago"));
    }
}
