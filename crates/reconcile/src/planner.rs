//! Planner - decides one action per resource from drift against the state store

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::state::StateStore;
use crate::types::{Action, ActionType, Layer, ResourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const REASON_NOT_IN_STATE: &str = "resource not in state";
pub const REASON_DRIFT: &str = "configuration drift detected";
pub const REASON_UP_TO_DATE: &str = "resource up to date";
pub const REASON_CLEANUP: &str = "cleanup requested";

/// Computes plans for a graph against a state store
pub struct Planner<'g, 's> {
    graph: &'g Graph,
    store: &'s StateStore,
}

impl<'g, 's> Planner<'g, 's> {
    pub fn new(graph: &'g Graph, store: &'s StateStore) -> Self {
        Self { graph, store }
    }

    /// Emit one action per resource, in graph order
    ///
    /// Any drift comparison failure aborts the whole plan.
    pub fn plan(&self) -> Result<Plan<'g>> {
        let order = self.graph.topological_sort()?;
        let mut actions = Vec::with_capacity(order.len());

        for id in order {
            let resource = self
                .graph
                .get(&id)
                .ok_or_else(|| Error::ResourceNotFound(id.clone()))?;

            let action = if !self.store.contains(&id) {
                Action::new(id, ActionType::Create, REASON_NOT_IN_STATE)
            } else if self.store.detect_drift(resource)? {
                Action::new(id, ActionType::Update, REASON_DRIFT)
            } else {
                Action::new(id, ActionType::NoOp, REASON_UP_TO_DATE)
            };
            log::debug!("Planned {} for {}", action.action_type, action.resource_id);
            actions.push(action);
        }

        Ok(Plan::new(self.graph, actions))
    }
}

/// Ordered actions computed for one run
#[derive(Debug)]
pub struct Plan<'g> {
    actions: Vec<Action>,
    created_at: DateTime<Utc>,
    graph: &'g Graph,
}

impl<'g> Plan<'g> {
    pub fn new(graph: &'g Graph, actions: Vec<Action>) -> Self {
        Self {
            actions,
            created_at: Utc::now(),
            graph,
        }
    }

    /// A plan deleting every resource in the graph, in graph order
    pub fn teardown(graph: &'g Graph) -> Result<Self> {
        let actions = graph
            .topological_sort()?
            .into_iter()
            .map(|id| Action::new(id, ActionType::Delete, REASON_CLEANUP))
            .collect();
        Ok(Self::new(graph, actions))
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Re-check acyclicity and layer validity of the underlying graph
    pub fn validate(&self) -> Result<()> {
        self.graph.validate_dependencies()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn count(&self, action_type: ActionType) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .count()
    }

    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Whether any action would touch a target
    pub fn has_changes(&self) -> bool {
        self.actions.iter().any(|a| a.action_type.is_change())
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.count(ActionType::Create),
            update: self.count(ActionType::Update),
            delete: self.count(ActionType::Delete),
            no_op: self.count(ActionType::NoOp),
        }
    }

    /// Serializable form of the plan, including each resource's config
    pub fn to_document(&self) -> Result<PlanDocument> {
        let mut resources = BTreeMap::new();
        for action in &self.actions {
            let resource = self
                .graph
                .get(&action.resource_id)
                .ok_or_else(|| Error::ResourceNotFound(action.resource_id.clone()))?;
            let config = resource.config().map_err(|source| Error::DriftDetection {
                id: action.resource_id.clone(),
                source,
            })?;
            resources.insert(
                action.resource_id.clone(),
                PlannedResource {
                    kind: resource.kind().to_string(),
                    layer: resource.layer(),
                    config,
                    action: action.action_type,
                    reason: action.reason().to_string(),
                },
            );
        }

        Ok(PlanDocument {
            created_at: self.created_at,
            summary: self.summary(),
            actions: self.actions.clone(),
            resources,
        })
    }
}

/// Action counts by type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_op: usize,
}

impl PlanSummary {
    pub fn total(&self) -> usize {
        self.create + self.update + self.delete + self.no_op
    }

    pub fn changes(&self) -> usize {
        self.create + self.update + self.delete
    }
}

/// One resource as recorded in a plan document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub layer: Layer,
    pub config: serde_json::Value,
    pub action: ActionType,
    pub reason: String,
}

/// A plan as written to disk for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDocument {
    pub created_at: DateTime<Utc>,
    pub summary: PlanSummary,
    pub actions: Vec<Action>,
    pub resources: BTreeMap<ResourceId, PlannedResource>,
}

impl PlanDocument {
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(|e| Error::persistence(dir, e))?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::persistence(path, e))?;
        fs::write(path, content).map_err(|e| Error::persistence(path, e))?;
        log::debug!("Wrote plan to {}", path.display());
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::persistence(path, e))?;
        serde_json::from_str(&content).map_err(|e| Error::persistence(path, e))
    }
}
