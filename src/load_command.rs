use crate::error::{Error, Result};
use crate::ffi::{
    is_dylib_command, DylibCommand, LoadCommandHeader, Section32, Section64, SegmentCommand32,
    SegmentCommand64, LC_SEGMENT, LC_SEGMENT_64, SIZEOF_DYLIB_COMMAND, SIZEOF_LOAD_COMMAND,
    SIZEOF_SECTION_32, SIZEOF_SECTION_64, SIZEOF_SEGMENT_COMMAND_32, SIZEOF_SEGMENT_COMMAND_64,
};
use crate::utils::strip_null_padding;
use scroll::{Endian, Pread, Pwrite};

/// What a load command decodes to beyond its `cmd`/`cmdsize` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// `LC_LOAD_DYLIB`, `LC_ID_DYLIB` and the other dylib variants.
    Dylib(DylibCommand),
    Other,
}

/// One load command, kept as the exact bytes found in the file (in the
/// file's byte order) next to its decoded header and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    pub payload: Payload,
    pub bytes: Vec<u8>,
}

impl LoadCommand {
    /// Decodes a command from exactly `cmdsize` bytes.
    pub fn parse(bytes: &[u8], endian: Endian) -> Result<Self> {
        let lc: LoadCommandHeader = bytes.pread_with(0, endian)?;
        let payload = if is_dylib_command(lc.cmd) {
            if bytes.len() < SIZEOF_DYLIB_COMMAND {
                return Err(Error::Malformed(format!(
                    "dylib command {:#x} is only {} bytes",
                    lc.cmd,
                    bytes.len()
                )));
            }
            let dylib: DylibCommand = bytes.pread_with(0, endian)?;
            let name = dylib.name as usize;
            if name < SIZEOF_DYLIB_COMMAND || name > bytes.len() {
                return Err(Error::Malformed(format!(
                    "dylib name offset {:#x} lies outside its {} byte command",
                    name,
                    bytes.len()
                )));
            }
            Payload::Dylib(dylib)
        } else {
            Payload::Other
        };

        Ok(LoadCommand {
            cmd: lc.cmd,
            cmdsize: lc.cmdsize,
            payload,
            bytes: bytes.to_vec(),
        })
    }

    /// Encodes a dylib command whose path starts right after the descriptor.
    /// `dylib.cmdsize` must already hold the padded size.
    pub fn dylib(dylib: DylibCommand, path: &[u8], endian: Endian) -> Result<Self> {
        let cmdsize = dylib.cmdsize as usize;
        assert!(
            cmdsize >= SIZEOF_DYLIB_COMMAND + path.len() + 1,
            "dylib command of {} bytes cannot hold a {} byte path",
            cmdsize,
            path.len()
        );
        let mut bytes = vec![0; cmdsize];
        bytes.pwrite_with(dylib, 0, endian)?;
        bytes[SIZEOF_DYLIB_COMMAND..][..path.len()].copy_from_slice(path);

        Ok(LoadCommand {
            cmd: dylib.cmd,
            cmdsize: dylib.cmdsize,
            payload: Payload::Dylib(dylib),
            bytes,
        })
    }

    pub fn dylib_command(&self) -> Option<&DylibCommand> {
        match &self.payload {
            Payload::Dylib(dylib) => Some(dylib),
            Payload::Other => None,
        }
    }

    /// The install name of a dylib command, without its null padding.
    pub fn dylib_path(&self) -> Option<&[u8]> {
        let dylib = self.dylib_command()?;
        Some(strip_null_padding(&self.bytes[dylib.name as usize..]))
    }

    /// Lowest file offset holding data of a segment command: the segment
    /// itself and each of its sections. Empty and zerofill ranges are skipped.
    pub fn data_offset(&self, endian: Endian, is_64: bool) -> Result<Option<u64>> {
        let mut lowest: Option<u64> = None;
        let mut note = |offset: u64| {
            if offset != 0 {
                lowest = Some(lowest.map_or(offset, |l| l.min(offset)));
            }
        };

        match self.cmd {
            LC_SEGMENT_64 if is_64 => {
                let segment: SegmentCommand64 = self.bytes.pread_with(0, endian)?;
                if segment.filesize == 0 {
                    return Ok(None);
                }
                note(segment.fileoff);
                for i in 0..segment.nsects as usize {
                    let offset = SIZEOF_SEGMENT_COMMAND_64 + i * SIZEOF_SECTION_64;
                    let section: Section64 = self.bytes.pread_with(offset, endian)?;
                    if section.size != 0 {
                        note(section.offset as u64);
                    }
                }
            }
            LC_SEGMENT if !is_64 => {
                let segment: SegmentCommand32 = self.bytes.pread_with(0, endian)?;
                if segment.filesize == 0 {
                    return Ok(None);
                }
                note(segment.fileoff as u64);
                for i in 0..segment.nsects as usize {
                    let offset = SIZEOF_SEGMENT_COMMAND_32 + i * SIZEOF_SECTION_32;
                    let section: Section32 = self.bytes.pread_with(offset, endian)?;
                    if section.size != 0 {
                        note(section.offset as u64);
                    }
                }
            }
            _ => {}
        }

        Ok(lowest)
    }
}

/// Reads `ncmds` load commands out of `bytes[offset..offset + sizeofcmds]`.
pub fn parse_commands(
    bytes: &[u8],
    offset: usize,
    ncmds: u32,
    sizeofcmds: u32,
    endian: Endian,
) -> Result<Vec<LoadCommand>> {
    let end = offset + sizeofcmds as usize;
    if end > bytes.len() {
        return Err(Error::Malformed(format!(
            "load commands end at {:#x}, past the end of the image at {:#x}",
            end,
            bytes.len()
        )));
    }

    let mut commands = Vec::with_capacity((ncmds as usize).min(sizeofcmds as usize / 8));
    let mut cursor = offset;
    for i in 0..ncmds {
        if cursor + SIZEOF_LOAD_COMMAND > end {
            return Err(Error::Malformed(format!(
                "load command {} at {:#x} starts past the end of the load commands",
                i, cursor
            )));
        }
        let lc: LoadCommandHeader = bytes.pread_with(cursor, endian)?;
        let size = lc.cmdsize as usize;
        if size < SIZEOF_LOAD_COMMAND || size % 4 != 0 {
            return Err(Error::Malformed(format!(
                "load command {} ({:#x}) has invalid size {}",
                i, lc.cmd, size
            )));
        }
        if cursor + size > end {
            return Err(Error::Malformed(format!(
                "load command {} ({:#x}) of size {} overruns the load commands",
                i, lc.cmd, size
            )));
        }
        commands.push(LoadCommand::parse(&bytes[cursor..cursor + size], endian)?);
        cursor += size;
    }

    if cursor != end {
        return Err(Error::Malformed(format!(
            "{} load commands take {} bytes but the header declares {}",
            ncmds,
            cursor - offset,
            sizeofcmds
        )));
    }

    Ok(commands)
}
