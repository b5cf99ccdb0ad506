//! File resource - declared content, mode and ownership of a remote file

use reconcile::{ApplyContext, Error, Layer, Resource, ResourceId, ResourceMeta, Result};
use serde::{Deserialize, Serialize};
use sshkit::quote;
use std::path::{Component, Path};

use super::with_transport;

pub const KIND: &str = "file";

/// Largest content sent inline in a command
pub const MAX_CONTENT_SIZE: usize = 64 * 1024;

/// Mode applied when none is declared
pub const DEFAULT_MODE: u32 = 0o644;

/// Declared file; also the drift payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub path: String,
    pub content: String,
    pub mode: u32,
    pub owner: Option<String>,
    pub group: Option<String>,
}

impl FileConfig {
    /// `owner:group`, `owner`, or `:group` for chown
    fn ownership(&self) -> Option<String> {
        match (&self.owner, &self.group) {
            (None, None) => None,
            (Some(owner), None) => Some(owner.clone()),
            (None, Some(group)) => Some(format!(":{group}")),
            (Some(owner), Some(group)) => Some(format!("{owner}:{group}")),
        }
    }
}

#[derive(Debug)]
pub struct FileResource {
    meta: ResourceMeta,
    file: FileConfig,
}

impl FileResource {
    pub fn new(file: FileConfig) -> Self {
        let id = ResourceId::compose(KIND, &[&file.path]);
        Self {
            meta: ResourceMeta::new(id, KIND, Layer::Configuration),
            file,
        }
    }
}

impl Resource for FileResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn config(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(&self.file)
    }

    fn description(&self) -> String {
        format!("file {} ({:o})", self.file.path, self.file.mode)
    }

    fn validate(&self) -> Result<()> {
        let path = Path::new(&self.file.path);
        if !path.is_absolute() {
            return Err(Error::validation(self.id(), "file path must be absolute"));
        }
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(Error::validation(self.id(), "file path contains directory traversal"));
        }
        if self.file.mode > 0o7777 {
            return Err(Error::validation(
                self.id(),
                format!("invalid file mode {:o}", self.file.mode),
            ));
        }
        if self.file.content.len() > MAX_CONTENT_SIZE {
            return Err(Error::validation(
                self.id(),
                format!(
                    "content too large ({} > {MAX_CONTENT_SIZE} bytes)",
                    self.file.content.len()
                ),
            ));
        }
        Ok(())
    }

    fn apply(&self, ctx: &mut ApplyContext<'_>) -> Result<()> {
        let path = quote(&self.file.path);

        with_transport(ctx, |ctx, transport| {
            ctx.run(
                transport,
                &format!(
                    "printf '%s' {} | sudo tee {path} > /dev/null",
                    quote(&self.file.content)
                ),
            )?;
            ctx.run(transport, &format!("sudo chmod {:o} {path}", self.file.mode))?;
            if let Some(ownership) = self.file.ownership() {
                ctx.run(transport, &format!("sudo chown {} {path}", quote(&ownership)))?;
            }
            ctx.success(format!("wrote {}", self.file.path));
            Ok(())
        })
    }

    fn destroy(&self, ctx: &mut ApplyContext<'_>) -> Result<()> {
        with_transport(ctx, |ctx, transport| {
            ctx.run(transport, &format!("sudo rm -f {}", quote(&self.file.path)))?;
            ctx.success(format!("removed {}", self.file.path));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ScriptedConnector, with_context};

    fn motd(owner: Option<&str>, group: Option<&str>) -> FileResource {
        FileResource::new(FileConfig {
            path: "/etc/motd".into(),
            content: "welcome\n".into(),
            mode: DEFAULT_MODE,
            owner: owner.map(String::from),
            group: group.map(String::from),
        })
    }

    #[test]
    fn test_identity_and_config() {
        let resource = motd(None, None);
        assert_eq!(resource.id().as_str(), "file:/etc/motd");
        assert_eq!(resource.layer(), Layer::Configuration);
        let config = resource.config().unwrap();
        assert_eq!(config["mode"], 420);
        assert!(config["owner"].is_null());
    }

    #[test]
    fn test_validate() {
        assert!(motd(None, None).validate().is_ok());

        let mut relative = motd(None, None);
        relative.file.path = "etc/motd".into();
        assert!(relative.validate().is_err());

        let mut traversal = motd(None, None);
        traversal.file.path = "/etc/../root/.ssh/authorized_keys".into();
        assert!(traversal.validate().is_err());

        let mut huge = motd(None, None);
        huge.file.content = "x".repeat(MAX_CONTENT_SIZE + 1);
        assert!(huge.validate().is_err());

        let mut bad_mode = motd(None, None);
        bad_mode.file.mode = 0o17777;
        assert!(bad_mode.validate().is_err());
    }

    #[test]
    fn test_apply_writes_content_mode_and_owner() {
        let connector = ScriptedConnector::default();
        let resource = motd(Some("root"), Some("adm"));
        let (result, _) = with_context(&connector, resource.id(), |ctx| resource.apply(ctx));

        assert!(result.is_ok());
        assert_eq!(
            connector.commands(),
            vec![
                "printf '%s' 'welcome\n' | sudo tee /etc/motd > /dev/null",
                "sudo chmod 644 /etc/motd",
                "sudo chown root:adm /etc/motd",
            ]
        );
    }

    #[test]
    fn test_apply_without_owner_skips_chown() {
        let connector = ScriptedConnector::default();
        let resource = motd(None, None);
        let (result, _) = with_context(&connector, resource.id(), |ctx| resource.apply(ctx));

        assert!(result.is_ok());
        assert_eq!(connector.commands().len(), 2);
    }

    #[test]
    fn test_ownership_forms() {
        assert_eq!(motd(Some("www-data"), None).file.ownership().as_deref(), Some("www-data"));
        assert_eq!(motd(None, Some("adm")).file.ownership().as_deref(), Some(":adm"));
        assert_eq!(motd(None, None).file.ownership(), None);
    }

    #[test]
    fn test_destroy_removes_file() {
        let connector = ScriptedConnector::default();
        let resource = motd(None, None);
        let (result, _) = with_context(&connector, resource.id(), |ctx| resource.destroy(ctx));

        assert!(result.is_ok());
        assert_eq!(connector.commands(), vec!["sudo rm -f /etc/motd"]);
    }
}
