//! Command implementations

pub mod apply;
pub mod clean;
pub mod ping;
pub mod plan;
pub mod state;

use anyhow::{Context as _, Result};
use colored::Colorize;
use reconcile::{
    Action, ActionType, CancelToken, ExecutionResult, Executor, Graph, Host, Layer, Plan,
    PlanSummary, ResourceState, StateStatus, StateStore,
};
use std::path::{Path, PathBuf};

use crate::Context;
use crate::declarations::Declarations;
use crate::observer::ConsoleObserver;
use crate::paths;
use crate::transport::SshConnector;

/// Declarations turned into a validated graph
pub struct Loaded {
    pub file: PathBuf,
    pub graph: Graph,
    pub hosts: Vec<Host>,
}

/// Load the declarations file and build its graph
pub fn load(ctx: &Context) -> Result<Loaded> {
    let file = paths::declarations_file(ctx.file.as_deref());
    let declarations = Declarations::load(&file)?;
    let graph = declarations.build_graph()?;
    Ok(Loaded {
        file,
        graph,
        hosts: declarations.hosts(),
    })
}

/// Open the state store belonging to a declarations file
pub fn open_state(file: &Path) -> Result<StateStore> {
    let path = paths::state_file(file);
    StateStore::open(&path).with_context(|| format!("Cannot load state from {}", path.display()))
}

/// ssh connector honouring `--ssh` and `--timeout`
pub fn connector(ctx: &Context) -> SshConnector {
    let mut connector = SshConnector::new();
    if let Some(program) = &ctx.ssh {
        connector = connector.program(program.as_str());
    }
    if let Some(timeout) = ctx.timeout {
        connector = connector.read_timeout(timeout);
    }
    connector
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    let confirmed = dialoguer::Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()
        .context("Failed to read confirmation")?;
    Ok(confirmed)
}

/// Run a plan against the declared hosts, cancelling on Ctrl+C
fn execute(
    ctx: &Context,
    plan: &Plan<'_>,
    store: &mut StateStore,
    hosts: &[Host],
) -> Result<ExecutionResult> {
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || on_interrupt.cancel()) {
        log::warn!("Could not install Ctrl+C handler: {e}");
    }

    let connector = connector(ctx);
    let mut observer = ConsoleObserver::new(ctx.verbose, ctx.quiet);
    let result = Executor::new(store, &connector, &mut observer)
        .with_hosts(hosts)
        .execute(plan, &cancel)?;
    Ok(result)
}

// ============================================================================
// Plan display
// ============================================================================

fn symbol(action_type: ActionType) -> colored::ColoredString {
    match action_type {
        ActionType::Create => "+".green(),
        ActionType::Update => "~".yellow(),
        ActionType::Delete => "-".red(),
        ActionType::NoOp => "=".dimmed(),
    }
}

/// One line of the plan table
pub fn plan_line(action: &Action, layer: Option<Layer>) -> String {
    let layer = layer.map_or("?", |l| l.as_str());
    format!(
        "{} {:<8} {:<40} {}",
        symbol(action.action_type),
        action.action_type.as_str(),
        action.resource_id.as_str(),
        format!("[{layer}] {}", action.reason()).dimmed()
    )
}

/// Note for a resource whose recorded state is a failure
pub fn failure_note(state: &ResourceState) -> Option<String> {
    (state.status == StateStatus::Failed).then(|| {
        let error = state.error_message().unwrap_or("unknown error");
        format!("last attempt failed: {}", crate::ui::truncate(error, 60))
    })
}

/// "2 to create, 1 to update, 0 to delete, 3 unchanged"
pub fn summary_line(summary: &PlanSummary) -> String {
    format!(
        "{} to create, {} to update, {} to delete, {} unchanged",
        summary.create, summary.update, summary.delete, summary.no_op
    )
}

/// Print the plan; unchanged resources only with `-v`
pub fn print_plan(ctx: &Context, plan: &Plan<'_>) {
    let summary = plan.summary();

    println!();
    println!("┌─ {} ─────────────────────────────────────────┐", "Plan".bold());
    println!("│");
    for action in plan.actions() {
        if !action.action_type.is_change() && ctx.verbose == 0 {
            continue;
        }
        let resource = plan.graph().get(&action.resource_id);
        println!("│ {}", plan_line(action, resource.map(|r| r.layer())));
        if let Some(note) = resource.and_then(|r| failure_note(r.state())) {
            println!("│     {}", note.yellow());
        }
        if ctx.verbose > 1
            && let Some(resource) = resource
        {
            println!("│     {}", resource.description().dimmed());
        }
    }
    if !plan.has_changes() {
        println!("│ {} No changes needed", "✓".green());
    }
    println!("│");
    println!("├─────────────────────────────────────────────────────┤");
    println!("│ Summary: {}", summary_line(&summary));
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::ResourceId;
    use std::fs;
    use tempfile::TempDir;

    fn ctx_for(file: &Path) -> Context {
        Context {
            verbose: 0,
            quiet: true,
            file: Some(file.to_string_lossy().into_owned()),
            ssh: None,
            timeout: None,
        }
    }

    #[test]
    fn test_plan_line() {
        colored::control::set_override(false);
        let action = Action::new(
            ResourceId::new("package:apt:nginx"),
            ActionType::Create,
            "resource not in state",
        );
        let line = plan_line(&action, Some(Layer::Platform));
        assert!(line.starts_with("+ create   package:apt:nginx"));
        assert!(line.ends_with("[platform] resource not in state"));

        let orphan = Action::new(ResourceId::new("file:/etc/motd"), ActionType::Delete, "");
        assert!(plan_line(&orphan, None).contains("[?]"));
    }

    #[test]
    fn test_summary_line() {
        let summary = PlanSummary {
            create: 2,
            update: 1,
            delete: 0,
            no_op: 3,
        };
        assert_eq!(
            summary_line(&summary),
            "2 to create, 1 to update, 0 to delete, 3 unchanged"
        );
    }

    #[test]
    fn test_load_builds_graph_and_hosts() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("settle.toml");
        fs::write(
            &file,
            "[[hosts]]\nname = \"web1\"\nhostname = \"10.0.0.5\"\n\n[[packages]]\nname = \"nginx\"\n",
        )
        .unwrap();

        let loaded = load(&ctx_for(&file)).unwrap();
        assert_eq!(loaded.file, file);
        assert_eq!(loaded.graph.len(), 2);
        assert_eq!(loaded.hosts[0].name, "web1");
    }

    #[test]
    fn test_failure_note_reads_hydrated_state() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("settle.toml");
        fs::write(&file, "[[packages]]\nname = \"nginx\"\n\n[[packages]]\nname = \"curl\"\n")
            .unwrap();
        let mut store = StateStore::new(dir.path().join("state.json"));
        store
            .mark_failed(
                &ResourceId::new("package:apt:nginx"),
                "package:apt:nginx: command exited with status 100",
            )
            .unwrap();

        let mut loaded = load(&ctx_for(&file)).unwrap();
        let nginx = ResourceId::new("package:apt:nginx");
        assert!(failure_note(loaded.graph.get(&nginx).unwrap().state()).is_none());

        loaded.graph.hydrate(&store);
        let note = failure_note(loaded.graph.get(&nginx).unwrap().state()).unwrap();
        assert_eq!(
            note,
            "last attempt failed: package:apt:nginx: command exited with status 100"
        );
        let curl = loaded.graph.get(&ResourceId::new("package:apt:curl")).unwrap();
        assert!(failure_note(curl.state()).is_none());
    }

    #[test]
    fn test_load_reports_invalid_graph() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("settle.toml");
        fs::write(
            &file,
            "[[files]]\npath = \"/etc/motd\"\ncontent = \"hi\"\ndepends_on = [\"package:apt:motd\"]\n",
        )
        .unwrap();

        let err = load(&ctx_for(&file)).err().unwrap();
        assert!(format!("{err:#}").contains("package:apt:motd, which is not declared"));
    }
}
