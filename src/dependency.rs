//! Listing and rewriting the libraries a Mach-O file links against.

use crate::error::{Error, Result};
use crate::ffi::LC_LOAD_DYLIB;
use crate::macho::MachOFile;
use crate::rewrite::{find_dependency_command, find_id_command, rewrite_command_path};
use crate::utils::atomic_replace;
use log::debug;
use regex::Regex;
use std::{fs, path::Path};

/// The `LC_LOAD_DYLIB` paths of every header, in file order.
///
/// `dependencies(path)?[i]` lists the dependencies of the i-th architecture.
pub fn dependencies<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<String>>> {
    let file = MachOFile::parse(path)?;
    Ok(file
        .headers
        .iter()
        .map(|header| {
            header
                .load_commands(LC_LOAD_DYLIB)
                .filter_map(|(_, command)| command.dylib_path())
                .map(|path| String::from_utf8_lossy(path).into_owned())
                .collect()
        })
        .collect())
}

/// Rewrites the first dependency matching `old_pattern` to `new_dependency`,
/// separately in every header of the file.
///
/// Returns how many headers were changed. Headers without a match are left
/// alone; when nothing matches the file is rewritten unchanged.
pub fn change_dependency<P: AsRef<Path>>(
    path: P,
    old_pattern: &str,
    new_dependency: &str,
) -> Result<usize> {
    let path = path.as_ref();
    let pattern = Regex::new(old_pattern)?;
    check_replacement(new_dependency)?;

    let mut file = MachOFile::parse(path)?;
    let mut changed = 0;
    for header in file.headers.iter_mut() {
        let found = find_dependency_command(header, &pattern).map(|(index, _)| index);
        match found {
            Some(index) => {
                rewrite_command_path(header, index, new_dependency)?;
                changed += 1;
            }
            None => debug!("{}: nothing matches `{}`", header.arch_name(), old_pattern),
        }
    }

    write_back(path, &file)?;
    Ok(changed)
}

/// The `LC_ID_DYLIB` path of every header, `None` for headers without one.
pub fn install_names<P: AsRef<Path>>(path: P) -> Result<Vec<Option<String>>> {
    let file = MachOFile::parse(path)?;
    Ok(file
        .headers
        .iter()
        .map(|header| {
            find_id_command(header)
                .and_then(|(_, command)| command.dylib_path())
                .map(|path| String::from_utf8_lossy(path).into_owned())
        })
        .collect())
}

/// Sets the install name of every header that has one.
pub fn change_install_name<P: AsRef<Path>>(path: P, new_name: &str) -> Result<usize> {
    let path = path.as_ref();
    check_replacement(new_name)?;

    let mut file = MachOFile::parse(path)?;
    let mut changed = 0;
    for header in file.headers.iter_mut() {
        if let Some(index) = find_id_command(header).map(|(index, _)| index) {
            rewrite_command_path(header, index, new_name)?;
            changed += 1;
        }
    }

    write_back(path, &file)?;
    Ok(changed)
}

fn check_replacement(path: &str) -> Result<()> {
    if path.is_empty() || path.contains('\0') {
        return Err(Error::InvalidPath(path.escape_debug().to_string()));
    }
    Ok(())
}

fn write_back(path: &Path, file: &MachOFile) -> Result<()> {
    file.check_space()?;
    let permissions = fs::metadata(path)?.permissions();
    atomic_replace(path, |f| file.serialize(f))?;
    fs::set_permissions(path, permissions)?;
    Ok(())
}
