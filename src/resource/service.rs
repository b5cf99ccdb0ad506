//! Service resource - a systemd unit kept in a declared state

use reconcile::{ApplyContext, Error, Layer, Resource, ResourceId, ResourceMeta, Result};
use serde::{Deserialize, Serialize};
use sshkit::quote;
use std::fmt;

use super::with_transport;

pub const KIND: &str = "service";

/// The only service manager with a driver
pub const SYSTEMD: &str = "systemd";

/// Declared state of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Running,
    Stopped,
    Enabled,
    Disabled,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
            ServiceState::Enabled => "enabled",
            ServiceState::Disabled => "disabled",
        }
    }

    /// `systemctl` arguments that reach this state
    fn systemctl_args(self) -> &'static str {
        match self {
            ServiceState::Running => "start",
            ServiceState::Stopped => "stop",
            ServiceState::Enabled => "enable --now",
            ServiceState::Disabled => "disable --now",
        }
    }

    /// A check for this state, and whether a zero exit means it holds
    fn check(self) -> (&'static str, bool) {
        match self {
            ServiceState::Running => ("is-active", true),
            ServiceState::Stopped => ("is-active", false),
            ServiceState::Enabled => ("is-enabled", true),
            ServiceState::Disabled => ("is-enabled", false),
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared service; also the drift payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub state: ServiceState,
    pub manager: String,
}

#[derive(Debug)]
pub struct ServiceResource {
    meta: ResourceMeta,
    service: ServiceConfig,
}

impl ServiceResource {
    pub fn new(service: ServiceConfig) -> Self {
        let id = ResourceId::compose(KIND, &[&service.manager, &service.name]);
        Self {
            meta: ResourceMeta::new(id, KIND, Layer::Application),
            service,
        }
    }

    fn systemctl(&self, args: &str) -> String {
        format!("sudo systemctl {args} {}", quote(&self.service.name))
    }
}

impl Resource for ServiceResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn config(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(&self.service)
    }

    fn description(&self) -> String {
        format!("service {} ({})", self.service.name, self.service.state)
    }

    fn validate(&self) -> Result<()> {
        if self.service.name.is_empty() {
            return Err(Error::validation(self.id(), "service name cannot be empty"));
        }
        if self.service.manager != SYSTEMD {
            return Err(Error::validation(
                self.id(),
                format!("unsupported service manager '{}'", self.service.manager),
            ));
        }
        Ok(())
    }

    fn apply(&self, ctx: &mut ApplyContext<'_>) -> Result<()> {
        let state = self.service.state;
        let (check, holds_on_success) = state.check();
        let probe = format!("systemctl {check} --quiet {}", quote(&self.service.name));

        with_transport(ctx, |ctx, transport| {
            if ctx.probe(transport, &probe)? == holds_on_success {
                ctx.success(format!("{} already {state}", self.service.name));
                return Ok(());
            }
            ctx.run(transport, &self.systemctl(state.systemctl_args()))?;
            ctx.success(format!("{} {state}", self.service.name));
            Ok(())
        })
    }

    fn destroy(&self, ctx: &mut ApplyContext<'_>) -> Result<()> {
        with_transport(ctx, |ctx, transport| {
            ctx.run(transport, &self.systemctl("stop"))?;
            ctx.run(transport, &self.systemctl("disable"))?;
            ctx.success(format!("{} stopped and disabled", self.service.name));
            Ok(())
        })
    }
}
