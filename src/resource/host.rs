//! Host resource - a target machine itself

use reconcile::{ApplyContext, Host, Layer, Resource, ResourceId, ResourceMeta, Result};
use serde::Serialize;

use super::with_transport;

pub const KIND: &str = "host";

/// Fields compared for drift; the key file is a local detail
#[derive(Serialize)]
struct HostConfig<'a> {
    name: &'a str,
    hostname: &'a str,
    user: Option<&'a str>,
    port: u16,
    group: Option<&'a str>,
}

/// A declared host
///
/// Applying it runs a no-op command to prove the host accepts connections;
/// destroying it only releases the connection.
#[derive(Debug)]
pub struct HostResource {
    meta: ResourceMeta,
    host: Host,
}

impl HostResource {
    pub fn new(host: Host) -> Self {
        let id = ResourceId::compose(KIND, &[&host.name]);
        Self {
            meta: ResourceMeta::new(id, KIND, Layer::Foundation),
            host,
        }
    }
}

impl Resource for HostResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn config(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(HostConfig {
            name: &self.host.name,
            hostname: &self.host.hostname,
            user: self.host.user.as_deref(),
            port: self.host.port,
            group: self.host.group.as_deref(),
        })
    }

    fn description(&self) -> String {
        format!("host {}", self.host)
    }

    fn apply(&self, ctx: &mut ApplyContext<'_>) -> Result<()> {
        with_transport(ctx, |ctx, transport| {
            ctx.run(transport, "true")?;
            ctx.success(format!("{} is reachable", self.host.name));
            Ok(())
        })
    }

    fn destroy(&self, ctx: &mut ApplyContext<'_>) -> Result<()> {
        ctx.info(format!("releasing {}", self.host.name));
        Ok(())
    }

    fn host(&self) -> Option<&Host> {
        Some(&self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ScriptedConnector, with_context};
    use reconcile::TransportError;

    fn web1() -> HostResource {
        let mut host = Host::new("web1", "10.0.0.5");
        host.user = Some("deploy".into());
        host.key_file = Some("/keys/deploy".into());
        HostResource::new(host)
    }

    #[test]
    fn test_identity() {
        let resource = web1();
        assert_eq!(resource.id().as_str(), "host:web1");
        assert_eq!(resource.layer(), Layer::Foundation);
        assert_eq!(resource.host().unwrap().name, "web1");
    }

    #[test]
    fn test_config_excludes_key_file() {
        let config = web1().config().unwrap();
        assert_eq!(config["hostname"], "10.0.0.5");
        assert_eq!(config["user"], "deploy");
        assert_eq!(config["port"], 22);
        assert!(config.get("key_file").is_none());
    }

    #[test]
    fn test_apply_checks_connectivity() {
        let connector = ScriptedConnector::default();
        let resource = web1();
        let (result, log) = with_context(&connector, resource.id(), |ctx| resource.apply(ctx));
        assert!(result.is_ok());
        assert_eq!(connector.commands(), vec!["true"]);
        assert!(log.messages().contains(&"web1 is reachable"));
    }

    #[test]
    fn test_apply_unreachable() {
        let connector = ScriptedConnector::default();
        connector.respond(
            "true",
            Err(TransportError::Failed {
                exit_code: 255,
                output: "Connection refused".into(),
            }),
        );
        let resource = web1();
        let (result, _) = with_context(&connector, resource.id(), |ctx| resource.apply(ctx));
        assert!(result.unwrap_err().to_string().contains("Connection refused"));
    }

    #[test]
    fn test_destroy_runs_nothing() {
        let connector = ScriptedConnector::default();
        let resource = web1();
        let (result, _) = with_context(&connector, resource.id(), |ctx| resource.destroy(ctx));
        assert!(result.is_ok());
        assert!(connector.commands().is_empty());
    }
}
