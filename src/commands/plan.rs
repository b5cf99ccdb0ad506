//! Show what apply would change

use anyhow::{Context as _, Result};
use reconcile::Planner;
use std::path::Path;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, output: Option<&Path>) -> Result<()> {
    let mut loaded = super::load(ctx)?;
    let store = super::open_state(&loaded.file)?;
    loaded.graph.hydrate(&store);

    let plan = Planner::new(&loaded.graph, &store)
        .plan()
        .context("Planning failed")?;
    plan.validate().context("Plan failed validation")?;

    if !ctx.quiet {
        super::print_plan(ctx, &plan);
    }

    if let Some(path) = output {
        plan.to_document()
            .and_then(|doc| doc.write(path))
            .with_context(|| format!("Failed to write plan to {}", path.display()))?;
        if !ctx.quiet {
            println!();
            ui::success(&format!("Plan written to {}", path.display()));
        }
    }

    Ok(())
}
