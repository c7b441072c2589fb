use crate::ffi::{LC_ID_DYLIB, LC_LOAD_DYLIB, SIZEOF_DYLIB_COMMAND};
use crate::error::Result;
use crate::header::Header;
use crate::load_command::LoadCommand;
use crate::utils::align;
use log::debug;
use regex::Regex;

/// First `LC_LOAD_DYLIB` whose path matches `pattern`.
pub fn find_dependency_command<'a>(
    header: &'a Header,
    pattern: &Regex,
) -> Option<(usize, &'a LoadCommand)> {
    header.load_commands(LC_LOAD_DYLIB).find(|(_, command)| {
        command
            .dylib_path()
            .map_or(false, |path| pattern.is_match(&String::from_utf8_lossy(path)))
    })
}

pub fn find_id_command(header: &Header) -> Option<(usize, &LoadCommand)> {
    header.load_commands(LC_ID_DYLIB).next()
}

/// Replaces the path of the dylib command at `index` with `new_path`.
///
/// The command keeps its type, timestamp and versions; its size becomes the
/// descriptor plus the null-terminated path, rounded up to the header's word
/// size, and `sizeofcmds` follows the difference. Every other command is left
/// where it was. Errors only come from encoding, never from the path's
/// length.
pub fn rewrite_command_path(header: &mut Header, index: usize, new_path: &str) -> Result<()> {
    assert!(!new_path.is_empty(), "replacement path is empty");
    let old = &header.commands[index];
    let mut dylib = match old.dylib_command() {
        Some(dylib) => *dylib,
        None => panic!("load command {} ({:#x}) is not a dylib command", index, old.cmd),
    };
    let old_size = old.cmdsize;

    let new_size = align(SIZEOF_DYLIB_COMMAND + new_path.len() + 1, header.word_size()) as u32;
    dylib.cmdsize = new_size;
    dylib.name = SIZEOF_DYLIB_COMMAND as u32;

    debug!(
        "{} command {}: `{}` -> `{}` ({} -> {} bytes)",
        header.arch_name(),
        index,
        String::from_utf8_lossy(old.dylib_path().unwrap_or_default()),
        new_path,
        old_size,
        new_size
    );

    header.commands[index] = LoadCommand::dylib(dylib, new_path.as_bytes(), header.endian)?;
    header.mach.sizeofcmds = header.mach.sizeofcmds - old_size + new_size;
    Ok(())
}
