//! Resource trait for reconciliation
//!
//! A Resource is one declared piece of infrastructure: it has an identity,
//! a layer, dependency edges, a configuration payload used for drift
//! detection, and lifecycle operations run against a host.

use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::types::{Action, ActionType, Dependency, Host, Layer, ResourceId, ResourceState};
use std::fmt;

/// Identity, placement and state shared by every resource kind
///
/// Concrete resources embed one of these and expose it through
/// [`Resource::meta`]; the trait's provided methods read from it.
#[derive(Debug, Clone)]
pub struct ResourceMeta {
    pub id: ResourceId,
    pub kind: &'static str,
    pub layer: Layer,
    pub dependencies: Vec<Dependency>,
    pub state: ResourceState,
}

impl ResourceMeta {
    pub fn new(id: ResourceId, kind: &'static str, layer: Layer) -> Self {
        Self {
            id,
            kind,
            layer,
            dependencies: Vec::new(),
            state: ResourceState::default(),
        }
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// Core trait for reconciled resources
///
/// Every resource in the system implements this trait, which provides:
/// - Identity and placement (id, kind, layer, dependencies)
/// - A configuration payload, compared against the last applied snapshot
/// - Convergence (apply) and removal (destroy) through an [`ApplyContext`]
///
/// # Example
///
/// ```ignore
/// use reconcile::{ApplyContext, Layer, Resource, ResourceId, ResourceMeta, Result};
///
/// #[derive(Debug)]
/// struct Motd {
///     meta: ResourceMeta,
///     text: String,
/// }
///
/// impl Resource for Motd {
///     fn meta(&self) -> &ResourceMeta { &self.meta }
///     fn meta_mut(&mut self) -> &mut ResourceMeta { &mut self.meta }
///
///     fn config(&self) -> serde_json::Result<serde_json::Value> {
///         Ok(serde_json::json!({ "text": self.text }))
///     }
///
///     fn apply(&self, ctx: &mut ApplyContext<'_>) -> Result<()> {
///         let transport = ctx.connect()?;
///         ctx.run(transport.as_ref(), &format!("echo '{}' | sudo tee /etc/motd", self.text))?;
///         Ok(())
///     }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    fn meta(&self) -> &ResourceMeta;

    fn meta_mut(&mut self) -> &mut ResourceMeta;

    /// Declared configuration, serialized for drift comparison
    ///
    /// Two configurations are considered equal when their canonical JSON
    /// serializations are byte-identical.
    fn config(&self) -> serde_json::Result<serde_json::Value>;

    /// Converge the target to the declared configuration
    fn apply(&self, ctx: &mut ApplyContext<'_>) -> Result<()>;

    /// Remove the resource from the target
    fn destroy(&self, _ctx: &mut ApplyContext<'_>) -> Result<()> {
        Err(Error::execution(
            self.id(),
            format!("destroy is not supported for {} resources", self.kind()),
        ))
    }

    fn id(&self) -> &ResourceId {
        &self.meta().id
    }

    /// Resource kind, e.g. "package" or "host"
    fn kind(&self) -> &'static str {
        self.meta().kind
    }

    fn layer(&self) -> Layer {
        self.meta().layer
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.meta().dependencies
    }

    fn add_dependency(&mut self, dependency: Dependency) {
        self.meta_mut().dependencies.push(dependency);
    }

    fn state(&self) -> &ResourceState {
        &self.meta().state
    }

    fn set_state(&mut self, state: ResourceState) {
        self.meta_mut().state = state;
    }

    /// Human-readable description
    fn description(&self) -> String {
        format!("{} {}", self.kind(), self.id())
    }

    /// Structural check run before the resource enters a graph
    fn validate(&self) -> Result<()> {
        if self.id().is_empty() {
            return Err(Error::validation(self.id(), "resource id cannot be empty"));
        }
        if self.kind().is_empty() {
            return Err(Error::validation(self.id(), "resource type cannot be empty"));
        }
        Ok(())
    }

    /// Resource-local planning hook
    fn plan(&self) -> Result<Action> {
        Ok(Action::new(
            self.id().clone(),
            ActionType::NoOp,
            "no resource-local changes",
        ))
    }

    /// The host this resource describes, if it is itself a host
    ///
    /// The executor binds this host for the resource's own actions; every
    /// other resource is bound to the first configured host.
    fn host(&self) -> Option<&Host> {
        None
    }
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;
