//! Declarations file: the hosts and resources a run converges to
//!
//! The file is TOML with one array of tables per kind:
//!
//! ```toml
//! [[hosts]]
//! name = "web1"
//! hostname = "10.0.0.5"
//! user = "deploy"
//!
//! [[packages]]
//! name = "nginx"
//!
//! [[services]]
//! name = "nginx"
//! state = "running"
//! depends_on = ["package:apt:nginx"]
//! ```

use anyhow::{Context as _, Result, bail};
use reconcile::{BoxedResource, Dependency, EdgeType, Graph, Host, Resource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::paths;
use crate::resource::{
    FileConfig, FileResource, HostResource, PackageConfig, PackageResource, ServiceConfig,
    ServiceResource, ServiceState, file, service,
};

/// Largest declarations file accepted, in bytes
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Most hosts one file may declare
pub const MAX_HOSTS: usize = 1000;

/// Most packages one file may declare
pub const MAX_PACKAGES: usize = 1000;

/// Longest accepted name, user or group
pub const MAX_NAME_LENGTH: usize = 255;

// ============================================================================
// Schema
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Declarations {
    #[serde(default)]
    pub hosts: Vec<HostDecl>,
    #[serde(default)]
    pub packages: Vec<PackageDecl>,
    #[serde(default)]
    pub services: Vec<ServiceDecl>,
    #[serde(default)]
    pub files: Vec<FileDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostDecl {
    pub name: String,
    pub hostname: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub key_file: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    /// Check the key file's existence and permissions at load time
    #[serde(default)]
    pub verify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageDecl {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_package_manager")]
    pub manager: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDecl {
    pub name: String,
    pub state: ServiceState,
    #[serde(default = "default_service_manager")]
    pub manager: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileDecl {
    pub path: String,
    pub content: String,
    #[serde(default = "default_mode")]
    pub mode: u32,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

fn default_port() -> u16 {
    22
}

fn default_version() -> String {
    "latest".to_string()
}

fn default_package_manager() -> String {
    crate::drivers::apt::NAME.to_string()
}

fn default_service_manager() -> String {
    service::SYSTEMD.to_string()
}

fn default_mode() -> u32 {
    file::DEFAULT_MODE
}

// ============================================================================
// Loading and validation
// ============================================================================

impl Declarations {
    /// Read, parse and validate a declarations file
    pub fn load(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path)
            .with_context(|| format!("Cannot read declarations file {}", path.display()))?;
        if meta.len() > MAX_FILE_SIZE {
            bail!(
                "{} is too large ({} bytes, max {MAX_FILE_SIZE})",
                path.display(),
                meta.len()
            );
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let declarations = Self::parse(&content)
            .with_context(|| format!("Invalid declarations in {}", path.display()))?;

        log::info!(
            "Loaded {} hosts, {} packages, {} services, {} files from {}",
            declarations.hosts.len(),
            declarations.packages.len(),
            declarations.services.len(),
            declarations.files.len(),
            path.display()
        );
        Ok(declarations)
    }

    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let declarations: Self = toml::from_str(content)?;
        declarations.validate()?;
        Ok(declarations)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hosts.len() > MAX_HOSTS {
            bail!("too many hosts ({}, max {MAX_HOSTS})", self.hosts.len());
        }
        if self.packages.len() > MAX_PACKAGES {
            bail!("too many packages ({}, max {MAX_PACKAGES})", self.packages.len());
        }

        let mut names = BTreeSet::new();
        for host in &self.hosts {
            validate_host(host).with_context(|| format!("host '{}'", host.name))?;
            if !names.insert(host.name.as_str()) {
                bail!("duplicate host '{}'", host.name);
            }
        }

        for package in &self.packages {
            check_name("package name", &package.name)?;
        }
        for service in &self.services {
            check_name("service name", &service.name)?;
        }

        let mut ids = BTreeSet::new();
        for resource in self.resources() {
            if !ids.insert(resource.id().clone()) {
                bail!("duplicate resource '{}'", resource.id());
            }
        }
        Ok(())
    }

    /// Hosts in declaration order
    pub fn hosts(&self) -> Vec<Host> {
        self.hosts.iter().map(HostDecl::to_host).collect()
    }

    /// One resource per declaration, with declared dependencies as required edges
    pub fn resources(&self) -> Vec<BoxedResource> {
        let mut resources: Vec<BoxedResource> = Vec::new();

        for host in &self.hosts {
            resources.push(Box::new(HostResource::new(host.to_host())));
        }
        for package in &self.packages {
            let resource = PackageResource::new(PackageConfig::new(
                &package.name,
                &package.version,
                &package.manager,
            ));
            resources.push(with_dependencies(resource, &package.depends_on));
        }
        for service in &self.services {
            let resource = ServiceResource::new(ServiceConfig {
                name: service.name.clone(),
                state: service.state,
                manager: service.manager.clone(),
            });
            resources.push(with_dependencies(resource, &service.depends_on));
        }
        for file in &self.files {
            let resource = FileResource::new(FileConfig {
                path: file.path.clone(),
                content: file.content.clone(),
                mode: file.mode,
                owner: file.owner.clone(),
                group: file.group.clone(),
            });
            resources.push(with_dependencies(resource, &file.depends_on));
        }

        resources
    }

    /// Build and validate the dependency graph
    pub fn build_graph(&self) -> Result<Graph> {
        let mut graph = Graph::new();
        for resource in self.resources() {
            let id = resource.id().clone();
            graph
                .add_resource(resource)
                .with_context(|| format!("Cannot add {id} to the graph"))?;
        }
        graph
            .validate_dependencies()
            .context("Dependency graph validation failed")?;
        Ok(graph)
    }
}

impl HostDecl {
    pub fn to_host(&self) -> Host {
        Host {
            name: self.name.clone(),
            hostname: self.hostname.clone(),
            user: self.user.clone(),
            port: self.port,
            key_file: self.key_file.as_deref().map(paths::expand),
            group: self.group.clone(),
        }
    }
}

fn with_dependencies<R: Resource + 'static>(mut resource: R, depends_on: &[String]) -> BoxedResource {
    for target in depends_on {
        resource.add_dependency(Dependency::required(target.as_str(), EdgeType::DependsOn));
    }
    Box::new(resource)
}

fn check_name(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        bail!("{what} cannot be empty");
    }
    if value.len() > MAX_NAME_LENGTH {
        bail!("{what} too long ({} > {MAX_NAME_LENGTH} characters)", value.len());
    }
    Ok(())
}

fn validate_host(host: &HostDecl) -> Result<()> {
    check_name("host name", &host.name)?;
    sshkit::validate_hostname(&host.hostname)?;
    if host.port == 0 {
        bail!("port must be between 1 and 65535");
    }
    if let Some(user) = &host.user {
        check_name("user", user)?;
    }
    if let Some(group) = &host.group {
        check_name("group", group)?;
    }
    if let Some(key_file) = &host.key_file {
        if key_file.contains("..") {
            bail!("key_file contains directory traversal: {key_file}");
        }
        if host.verify {
            sshkit::validate_key_file(&paths::expand(key_file))?;
        }
    }
    Ok(())
}
