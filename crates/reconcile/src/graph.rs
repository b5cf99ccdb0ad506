//! Dependency graph over declared resources
//!
//! Nodes are kept in id order so that ordering, and therefore every plan
//! computed from the graph, is deterministic across runs.

use crate::error::{Error, Result};
use crate::resource::{BoxedResource, Resource};
use crate::state::StateStore;
use crate::types::{Dependency, ResourceId};
use std::collections::{BTreeMap, VecDeque};

/// Resources and their declared dependency edges
#[derive(Debug, Default)]
pub struct Graph {
    nodes: BTreeMap<ResourceId, BoxedResource>,
    edges: BTreeMap<ResourceId, Vec<Dependency>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a resource with its edges
    ///
    /// A resource with an id already present replaces the previous one.
    pub fn add_resource(&mut self, resource: BoxedResource) -> Result<()> {
        resource.validate()?;
        let id = resource.id().clone();
        if self.nodes.contains_key(&id) {
            log::debug!("Replacing resource {id}");
        }
        self.edges.insert(id.clone(), resource.dependencies().to_vec());
        self.nodes.insert(id, resource);
        Ok(())
    }

    pub fn get(&self, id: &ResourceId) -> Option<&dyn Resource> {
        self.nodes.get(id).map(AsRef::as_ref)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.nodes.keys()
    }

    pub fn resources(&self) -> impl Iterator<Item = &dyn Resource> {
        self.nodes.values().map(AsRef::as_ref)
    }

    /// Edges declared by `id` (empty for unknown ids)
    pub fn dependencies(&self, id: &ResourceId) -> &[Dependency] {
        self.edges.get(id).map_or(&[], Vec::as_slice)
    }

    /// Ids of resources that declare an edge to `id`
    pub fn dependents(&self, id: &ResourceId) -> Vec<ResourceId> {
        self.edges
            .iter()
            .filter(|(_, deps)| deps.iter().any(|d| &d.target == id))
            .map(|(from, _)| from.clone())
            .collect()
    }

    /// Remove a resource, its edges, and every edge pointing at it
    pub fn remove_resource(&mut self, id: &ResourceId) -> Option<BoxedResource> {
        let removed = self.nodes.remove(id);
        self.edges.remove(id);
        for deps in self.edges.values_mut() {
            deps.retain(|d| &d.target != id);
        }
        removed
    }

    /// Order all resources over required edges
    ///
    /// Kahn's algorithm where each required edge counts against its
    /// target: for every edge "A depends on B", A comes before B.
    /// Dependents therefore precede their dependencies; reverse the result
    /// for a dependencies-first order. Fails without a partial order when
    /// the required edges contain a cycle.
    pub fn topological_sort(&self) -> Result<Vec<ResourceId>> {
        let mut in_degree: BTreeMap<&ResourceId, usize> =
            self.nodes.keys().map(|id| (id, 0)).collect();

        for deps in self.edges.values() {
            for dep in deps.iter().filter(|d| d.required) {
                if let Some(count) = in_degree.get_mut(&dep.target) {
                    *count += 1;
                }
            }
        }

        let mut queue: VecDeque<&ResourceId> = in_degree
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            order.push(id.clone());
            for dep in self.dependencies(id).iter().filter(|d| d.required) {
                if let Some(count) = in_degree.get_mut(&dep.target) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(&dep.target);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let remaining = in_degree
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(id, _)| id.clone())
                .collect();
            return Err(Error::Cycle { remaining });
        }

        Ok(order)
    }

    /// Check the required edges for cycles, dangling targets and layer order
    ///
    /// The first violation aborts with an error naming the declaring
    /// resource.
    pub fn validate_dependencies(&self) -> Result<()> {
        self.topological_sort()?;

        for (id, deps) in &self.edges {
            let Some(from) = self.nodes.get(id) else {
                continue;
            };
            for dep in deps.iter().filter(|d| d.required) {
                let Some(to) = self.nodes.get(&dep.target) else {
                    return Err(Error::MissingDependency {
                        id: id.clone(),
                        target: dep.target.clone(),
                    });
                };
                if !from.layer().may_depend_on(to.layer()) {
                    return Err(Error::LayerViolation {
                        id: id.clone(),
                        target: dep.target.clone(),
                        from: from.layer(),
                        to: to.layer(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Copy persisted states onto the resources they belong to
    pub fn hydrate(&mut self, store: &StateStore) {
        for (id, resource) in &mut self.nodes {
            if let Some(state) = store.get(id) {
                resource.set_state(state.clone());
            }
        }
    }
}
