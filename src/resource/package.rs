//! Package resource - a system package installed through a driver

use crate::drivers::{self, is_unpinned};
use reconcile::{ApplyContext, Error, Layer, Resource, ResourceId, ResourceMeta, Result};
use serde::{Deserialize, Serialize};

use super::with_transport;

pub const KIND: &str = "package";

/// Declared package; also the drift payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    pub name: String,
    pub version: String,
    pub manager: String,
}

impl PackageConfig {
    pub fn new(name: &str, version: &str, manager: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            manager: manager.to_string(),
        }
    }

    /// `nginx` or `nginx (1.18.0)`
    pub fn label(&self) -> String {
        if is_unpinned(&self.version) {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.version)
        }
    }
}

#[derive(Debug)]
pub struct PackageResource {
    meta: ResourceMeta,
    package: PackageConfig,
}

impl PackageResource {
    pub fn new(package: PackageConfig) -> Self {
        let id = ResourceId::compose(KIND, &[&package.manager, &package.name]);
        Self {
            meta: ResourceMeta::new(id, KIND, Layer::Platform),
            package,
        }
    }
}

impl Resource for PackageResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn config(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(&self.package)
    }

    fn description(&self) -> String {
        format!("{} package {}", self.package.manager, self.package.label())
    }

    fn validate(&self) -> Result<()> {
        if self.package.name.is_empty() {
            return Err(Error::validation(self.id(), "package name cannot be empty"));
        }
        if !drivers::SUPPORTED.contains(&self.package.manager.as_str()) {
            return Err(Error::validation(
                self.id(),
                format!(
                    "unsupported package manager '{}' (expected one of: {})",
                    self.package.manager,
                    drivers::SUPPORTED.join(", ")
                ),
            ));
        }
        Ok(())
    }

    fn apply(&self, ctx: &mut ApplyContext<'_>) -> Result<()> {
        let manager = drivers::for_manager(self.id(), &self.package.manager)?;
        let packages = std::slice::from_ref(&self.package);

        with_transport(ctx, |ctx, transport| {
            if manager.is_installed(ctx, transport, packages)? {
                ctx.success(format!("{} already installed", self.package.label()));
                return Ok(());
            }
            ctx.info(format!("installing {}", self.package.label()));
            manager.install(ctx, transport, packages)?;
            ctx.success(format!("installed {}", self.package.label()));
            Ok(())
        })
    }

    fn destroy(&self, ctx: &mut ApplyContext<'_>) -> Result<()> {
        let manager = drivers::for_manager(self.id(), &self.package.manager)?;
        let packages = std::slice::from_ref(&self.package);

        with_transport(ctx, |ctx, transport| {
            ctx.info(format!("removing {}", self.package.name));
            manager.remove(ctx, transport, packages)?;
            ctx.success(format!("removed {}", self.package.name));
            Ok(())
        })
    }
}
