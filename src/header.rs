use crate::error::{Error, Result};
use crate::ffi::{
    cpu_type_name, MachHeader, MH_CIGAM, MH_CIGAM_64, MH_MAGIC, MH_MAGIC_64, SIZEOF_MACH_HEADER,
    SIZEOF_MACH_HEADER_64,
};
use crate::load_command::{parse_commands, LoadCommand};
use log::debug;
use scroll::{Endian, Pread, Pwrite};

/// One architecture's Mach-O image together with its load commands.
#[derive(Debug, Clone)]
pub struct Header {
    /// Absolute offset of the image in the file.
    pub offset: u64,
    /// Size of the image (the whole file for thin binaries).
    pub size: u64,
    pub endian: Endian,
    pub is_64: bool,
    pub mach: MachHeader,
    /// Trailing word of `mach_header_64`.
    pub reserved: Option<u32>,
    pub commands: Vec<LoadCommand>,
    parsed_sizeofcmds: u32,
    data_start: u64,
}

impl Header {
    /// Parses the image in `bytes`, which starts at absolute `offset` in the file.
    pub fn parse(bytes: &[u8], offset: u64) -> Result<Self> {
        let magic: u32 = bytes.pread_with(0, scroll::BE).map_err(|_| Error::NotMachO {
            magic: 0,
        })?;
        let (endian, is_64) = match magic {
            MH_MAGIC => (scroll::BE, false),
            MH_MAGIC_64 => (scroll::BE, true),
            MH_CIGAM => (scroll::LE, false),
            MH_CIGAM_64 => (scroll::LE, true),
            magic => return Err(Error::NotMachO { magic }),
        };

        let mach: MachHeader = bytes.pread_with(0, endian)?;
        let (header_size, reserved) = if is_64 {
            let reserved: u32 = bytes.pread_with(SIZEOF_MACH_HEADER, endian)?;
            (SIZEOF_MACH_HEADER_64, Some(reserved))
        } else {
            (SIZEOF_MACH_HEADER, None)
        };

        let commands = parse_commands(bytes, header_size, mach.ncmds, mach.sizeofcmds, endian)?;

        let commands_end = (header_size + mach.sizeofcmds as usize) as u64;
        let mut data_start = bytes.len() as u64;
        for command in &commands {
            if let Some(offset) = command.data_offset(endian, is_64)? {
                data_start = data_start.min(offset);
            }
        }
        if data_start < commands_end {
            return Err(Error::Malformed(format!(
                "segment data at {:#x} overlaps the load commands ending at {:#x}",
                data_start, commands_end
            )));
        }

        debug!(
            "{} header at {:#x}: {} commands, {} bytes, {} bytes free",
            cpu_type_name(mach.cpu_type),
            offset,
            mach.ncmds,
            mach.sizeofcmds,
            data_start - commands_end
        );

        Ok(Header {
            offset,
            size: bytes.len() as u64,
            endian,
            is_64,
            mach,
            reserved,
            commands,
            parsed_sizeofcmds: mach.sizeofcmds,
            data_start,
        })
    }

    /// Load commands are sized in multiples of this.
    pub fn word_size(&self) -> usize {
        if self.is_64 {
            8
        } else {
            4
        }
    }

    pub fn header_size(&self) -> usize {
        if self.is_64 {
            SIZEOF_MACH_HEADER_64
        } else {
            SIZEOF_MACH_HEADER
        }
    }

    pub fn arch_name(&self) -> &'static str {
        cpu_type_name(self.mach.cpu_type)
    }

    /// Every command of type `cmd` with its position in the command list.
    pub fn load_commands(&self, cmd: u32) -> impl Iterator<Item = (usize, &LoadCommand)> + '_ {
        self.commands
            .iter()
            .enumerate()
            .filter(move |(_, command)| command.cmd == cmd)
    }

    /// Bytes the load commands may occupy without reaching segment data.
    pub fn available_space(&self) -> u64 {
        self.data_start - self.header_size() as u64
    }

    /// Length of the command region this header was parsed with.
    pub(crate) fn parsed_sizeofcmds(&self) -> u32 {
        self.parsed_sizeofcmds
    }

    /// The fixed header followed by every command, in list order.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header_size = self.header_size();
        let mut bytes = vec![0; header_size];
        bytes.pwrite_with(self.mach, 0, self.endian)?;
        if let Some(reserved) = self.reserved {
            bytes.pwrite_with(reserved, SIZEOF_MACH_HEADER, self.endian)?;
        }
        for command in &self.commands {
            bytes.extend_from_slice(&command.bytes);
        }
        Ok(bytes)
    }
}
