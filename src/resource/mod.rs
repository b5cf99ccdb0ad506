//! Concrete resource kinds managed by settle
//!
//! Each kind implements [`reconcile::Resource`]:
//! - `host` - a target machine; applying it proves connectivity
//! - `package` - a system package, installed through a package manager driver
//! - `service` - a systemd unit in a declared state
//! - `file` - a file with declared content, mode and ownership
//!
//! Every kind serializes a typed payload as its configuration, so drift is
//! detected on exactly the fields a user can declare.

pub mod file;
pub mod host;
pub mod package;
pub mod service;

use reconcile::{ApplyContext, Result, Transport};

pub use file::{FileConfig, FileResource};
pub use host::HostResource;
pub use package::{PackageConfig, PackageResource};
pub use service::{ServiceConfig, ServiceResource, ServiceState};

/// Run `f` with a transport to the bound host, closing it afterwards
pub(crate) fn with_transport<T>(
    ctx: &mut ApplyContext<'_>,
    f: impl FnOnce(&mut ApplyContext<'_>, &dyn Transport) -> Result<T>,
) -> Result<T> {
    let mut transport = ctx.connect()?;
    let result = f(ctx, transport.as_ref());
    transport.close();
    result
}
