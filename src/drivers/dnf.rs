//! dnf driver for Fedora and RHEL hosts

use super::{PackageManager, is_unpinned};
use crate::resource::PackageConfig;
use sshkit::quote;

pub const NAME: &str = "dnf";

/// `dnf` for changes, `rpm` for queries
pub struct Dnf;

impl Dnf {
    /// `name` or `name-version`
    fn target(package: &PackageConfig) -> String {
        if is_unpinned(&package.version) {
            quote(&package.name)
        } else {
            quote(&format!("{}-{}", package.name, package.version))
        }
    }
}

impl PackageManager for Dnf {
    fn name(&self) -> &'static str {
        NAME
    }

    fn install_command(&self, package: &PackageConfig) -> String {
        format!("sudo dnf install -y {}", Self::target(package))
    }

    fn remove_command(&self, package: &PackageConfig) -> String {
        format!("sudo dnf remove -y {}", quote(&package.name))
    }

    fn query_command(&self, package: &PackageConfig) -> String {
        format!("rpm -q {}", Self::target(package))
    }
}
