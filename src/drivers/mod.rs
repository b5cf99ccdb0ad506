//! Package manager drivers.
//!
//! The [`PackageManager`] trait knows the commands of one package manager.
//! Batch handling is shared: every package gets its own outcome, and a
//! batch only fails when all of its packages failed.
//!
//! # Supported Managers
//!
//! - [`apt::Apt`] - Debian and Ubuntu (`apt-get`, `dpkg`)
//! - [`dnf::Dnf`] - Fedora and RHEL (`dnf`, `rpm`)

pub mod apt;
pub mod dnf;

use crate::resource::PackageConfig;
use reconcile::{ApplyContext, BatchReport, Error, ResourceId, Result, Transport};
use std::time::Instant;

/// Names accepted in the `manager` field of a package
pub const SUPPORTED: [&str; 2] = [apt::NAME, dnf::NAME];

/// Whether `version` leaves the choice to the repository
pub fn is_unpinned(version: &str) -> bool {
    version.is_empty() || version == "latest"
}

/// Commands for one package manager, run on the bound host.
pub trait PackageManager: Send + Sync {
    /// Manager name as written in declarations
    fn name(&self) -> &'static str;

    /// Command installing one package
    fn install_command(&self, package: &PackageConfig) -> String;

    /// Command removing one package
    fn remove_command(&self, package: &PackageConfig) -> String;

    /// Command exiting zero iff the package (at its pinned version) is installed
    fn query_command(&self, package: &PackageConfig) -> String;

    /// Install every package, tolerating partial failure.
    fn install(
        &self,
        ctx: &mut ApplyContext<'_>,
        transport: &dyn Transport,
        packages: &[PackageConfig],
    ) -> Result<BatchReport<String>> {
        run_batch(ctx, transport, packages, self.name(), "install", |p| {
            self.install_command(p)
        })
    }

    /// Remove every package, tolerating partial failure.
    fn remove(
        &self,
        ctx: &mut ApplyContext<'_>,
        transport: &dyn Transport,
        packages: &[PackageConfig],
    ) -> Result<BatchReport<String>> {
        run_batch(ctx, transport, packages, self.name(), "remove", |p| {
            self.remove_command(p)
        })
    }

    /// Whether all packages are already installed.
    fn is_installed(
        &self,
        ctx: &mut ApplyContext<'_>,
        transport: &dyn Transport,
        packages: &[PackageConfig],
    ) -> Result<bool> {
        for package in packages {
            if !ctx.probe(transport, &self.query_command(package))? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Get the driver for a manager name
pub fn for_manager(id: &ResourceId, name: &str) -> Result<Box<dyn PackageManager>> {
    match name {
        apt::NAME => Ok(Box::new(apt::Apt)),
        dnf::NAME => Ok(Box::new(dnf::Dnf)),
        other => Err(Error::execution(
            id,
            format!("unsupported package manager: {other}"),
        )),
    }
}

fn run_batch(
    ctx: &mut ApplyContext<'_>,
    transport: &dyn Transport,
    packages: &[PackageConfig],
    manager: &str,
    operation: &str,
    command: impl Fn(&PackageConfig) -> String,
) -> Result<BatchReport<String>> {
    log::debug!("{manager} {operation}: {} packages", packages.len());
    let mut report = BatchReport::new();

    for package in packages {
        let started = Instant::now();
        match ctx.run(transport, &command(package)) {
            Ok(out) => report.succeeded(package.label(), out.trimmed(), started.elapsed()),
            // A timeout or cancellation ends the whole run, not just this item
            Err(e) if e.is_interrupted() => return Err(e),
            Err(e) => report.failed(package.label(), e.to_string(), started.elapsed()),
        }
    }

    if packages.len() > 1 {
        ctx.info(format!("{manager} {operation}: {}", report.summary()));
    }
    let id = ctx.resource_id().clone();
    report.into_result(&id, operation)
}
