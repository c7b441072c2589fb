//! Inspect and rewrite the dylib load commands of Mach-O binaries.
//!
//! ```no_run
//! let deps = machotools::dependencies("libfoo.dylib")?;
//! machotools::change_dependency("libfoo.dylib", "^/opt/local/", "@rpath/libbar.dylib")?;
//! # Ok::<(), machotools::Error>(())
//! ```

pub mod dependency;
pub mod error;
pub mod ffi;
pub mod header;
pub mod load_command;
pub mod macho;
pub mod rewrite;
pub mod utils;

#[cfg(test)]
mod testutil;

pub use crate::dependency::{change_dependency, change_install_name, dependencies, install_names};
pub use crate::error::{Error, Result};
pub use crate::header::Header;
pub use crate::load_command::{LoadCommand, Payload};
pub use crate::macho::MachOFile;
pub use crate::rewrite::{find_dependency_command, rewrite_command_path};
pub use crate::utils::{atomic_replace, strip_null_padding};
