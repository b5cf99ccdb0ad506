//! Converge hosts to the declarations

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use reconcile::Planner;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, yes: bool) -> Result<()> {
    let mut loaded = super::load(ctx)?;
    let mut store = super::open_state(&loaded.file)?;
    loaded.graph.hydrate(&store);

    let plan = Planner::new(&loaded.graph, &store)
        .plan()
        .context("Planning failed")?;

    if !ctx.quiet {
        super::print_plan(ctx, &plan);
    }

    if !plan.has_changes() {
        return Ok(());
    }

    if loaded.hosts.is_empty() {
        ui::warn("No hosts declared; resources that need a host will fail");
    }

    if !yes && !super::confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let result = super::execute(ctx, &plan, &mut store, &loaded.hosts)?;

    if !result.success {
        let error = result
            .error
            .as_ref()
            .map_or_else(|| "unknown error".to_string(), ToString::to_string);
        if let Some(err) = &result.error
            && err.is_interrupted()
        {
            bail!("Apply interrupted: {error}");
        }
        bail!(
            "Apply failed after {} of {} actions: {error}",
            result.success_count(),
            plan.action_count()
        );
    }

    log::info!("State saved to {}", store.path().display());
    Ok(())
}
