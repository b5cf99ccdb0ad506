//! # Reconcile
//!
//! A dependency-ordered reconciliation engine for declared infrastructure.
//!
//! This crate decides *what* must change on a set of hosts and *in what
//! order*, then applies it with fail-fast semantics.
//!
//! ## Core Concepts
//!
//! - **Resource**: A declared entity (host, package, service, file) with a layer,
//!   dependency edges, and a configuration payload
//! - **Graph**: All resources of a run; orders them over required edges and
//!   enforces acyclicity and layer ordering
//! - **StateStore**: Last applied state per resource, persisted as JSON; detects
//!   drift by comparing configurations
//! - **Planner**: Emits one Create/Update/NoOp action per resource
//! - **Executor**: Applies actions sequentially and halts on the first failure
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{CancelToken, Executor, Graph, NoObserver, Planner, StateStore};
//!
//! let mut graph = Graph::new();
//! graph.add_resource(Box::new(package))?;
//! graph.validate_dependencies()?;
//!
//! let mut store = StateStore::open(".settle/state.json")?;
//! let plan = Planner::new(&graph, &store).plan()?;
//! println!("{} to create", plan.summary().create);
//!
//! let result = Executor::new(&mut store, &connector, &mut NoObserver)
//!     .with_hosts(&hosts)
//!     .execute(&plan, &CancelToken::new())?;
//! assert!(result.success);
//! ```
//!
//! ## Collaborator Traits
//!
//! The engine reaches the outside world only through traits:
//!
//! - [`Connector`] / [`Transport`]: Timeout-bounded, cancellable command execution on a host
//! - [`Observer`]: Receives progress notifications; never influences control flow
//!
//! This keeps the crate free of any particular remote-execution mechanism
//! or terminal UI.

pub mod batch;
pub mod context;
pub mod error;
pub mod executor;
pub mod graph;
pub mod planner;
pub mod resource;
pub mod state;
pub mod types;

#[cfg(test)]
mod testutil;

// Re-export main types at crate root
pub use batch::{BatchReport, ItemOutcome};
pub use context::{
    ApplyContext, CancelToken, Connector, NoObserver, Observer, Step, StepKind, Transport,
    TransportError,
};
pub use error::{Error, Phase, Result};
pub use executor::{ActionOutcome, ExecutionResult, Executor};
pub use graph::Graph;
pub use planner::{Plan, PlanDocument, PlanSummary, PlannedResource, Planner};
pub use resource::{BoxedResource, Resource, ResourceMeta};
pub use state::StateStore;
pub use types::{
    Action, ActionType, Change, CommandOutput, Dependency, EdgeType, Host, Layer, ResourceId,
    ResourceState, StateStatus,
};
