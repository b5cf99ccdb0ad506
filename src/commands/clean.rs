//! Tear down every declared resource

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use reconcile::{ActionOutcome, Plan, StateStore};

use crate::Context;
use crate::ui;

/// Delete every declared resource, then drop the state entries of those
/// that were removed.
///
/// This is the one place entries of still-declared resources leave the state
/// file; otherwise entries go only through `state --prune` once a resource is
/// no longer declared. Kept entries would read as applied and the next apply
/// would plan no-ops for resources that no longer exist on the hosts.
pub fn run(ctx: &Context, yes: bool) -> Result<()> {
    let loaded = super::load(ctx)?;
    let mut store = super::open_state(&loaded.file)?;

    if loaded.graph.is_empty() {
        ui::info("Nothing declared, nothing to clean");
        return Ok(());
    }

    let plan = Plan::teardown(&loaded.graph).context("Cannot order resources for cleanup")?;

    if !ctx.quiet {
        super::print_plan(ctx, &plan);
        println!();
        ui::warn(&format!(
            "This removes {} resources from the declared hosts",
            plan.action_count()
        ));
    }

    if !yes && !super::confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let result = super::execute(ctx, &plan, &mut store, &loaded.hosts)?;

    let forgotten = forget_deleted(&mut store, &result.actions)?;
    log::info!("Removed {forgotten} entries from {}", store.path().display());

    if !result.success {
        let error = result
            .error
            .as_ref()
            .map_or_else(|| "unknown error".to_string(), ToString::to_string);
        bail!("Clean failed: {error}");
    }

    Ok(())
}

/// Remove the entries of successfully deleted resources, returning how many went
fn forget_deleted(store: &mut StateStore, outcomes: &[ActionOutcome]) -> Result<usize> {
    let mut forgotten = 0;
    for outcome in outcomes.iter().filter(|o| o.is_success()) {
        if store
            .remove(&outcome.action.resource_id)
            .context("Failed to update state")?
            .is_some()
        {
            forgotten += 1;
        }
    }
    Ok(forgotten)
}
