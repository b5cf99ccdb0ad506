//! apt driver for Debian-based hosts

use super::{PackageManager, is_unpinned};
use crate::resource::PackageConfig;
use sshkit::quote;

pub const NAME: &str = "apt";

/// `apt-get` for changes, `dpkg` for queries
pub struct Apt;

impl Apt {
    /// `name` or `name=version`
    fn target(package: &PackageConfig) -> String {
        if is_unpinned(&package.version) {
            quote(&package.name)
        } else {
            quote(&format!("{}={}", package.name, package.version))
        }
    }
}

impl PackageManager for Apt {
    fn name(&self) -> &'static str {
        NAME
    }

    fn install_command(&self, package: &PackageConfig) -> String {
        format!("sudo apt-get install -y {}", Self::target(package))
    }

    fn remove_command(&self, package: &PackageConfig) -> String {
        format!("sudo apt-get remove -y {}", quote(&package.name))
    }

    fn query_command(&self, package: &PackageConfig) -> String {
        if is_unpinned(&package.version) {
            format!("dpkg -s {}", quote(&package.name))
        } else {
            format!(
                "dpkg -s {} | grep -qx {}",
                quote(&package.name),
                quote(&format!("Version: {}", package.version))
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpinned_commands() {
        let nginx = PackageConfig::new("nginx", "latest", NAME);
        assert_eq!(Apt.install_command(&nginx), "sudo apt-get install -y nginx");
        assert_eq!(Apt.remove_command(&nginx), "sudo apt-get remove -y nginx");
        assert_eq!(Apt.query_command(&nginx), "dpkg -s nginx");
    }

    #[test]
    fn test_pinned_commands() {
        let nginx = PackageConfig::new("nginx", "1.18.0-0ubuntu1", NAME);
        assert_eq!(
            Apt.install_command(&nginx),
            "sudo apt-get install -y nginx=1.18.0-0ubuntu1"
        );
        assert_eq!(Apt.remove_command(&nginx), "sudo apt-get remove -y nginx");
        assert_eq!(
            Apt.query_command(&nginx),
            "dpkg -s nginx | grep -qx 'Version: 1.18.0-0ubuntu1'"
        );
    }

    #[test]
    fn test_hostile_names_are_quoted() {
        let evil = PackageConfig::new("nginx; reboot", "", NAME);
        assert_eq!(Apt.install_command(&evil), "sudo apt-get install -y 'nginx; reboot'");
    }
}
