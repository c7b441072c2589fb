//! Builds small synthetic Mach-O images for tests.
#![allow(dead_code)]

use super::ffi::{
    DylibCommand, FatArch, FatHeader, LoadCommandHeader, MachHeader, Section32, Section64,
    SegmentCommand32, SegmentCommand64, FAT_MAGIC, LC_LOAD_DYLIB, LC_SEGMENT, LC_SEGMENT_64,
    LC_UUID, MH_MAGIC, MH_MAGIC_64, SIZEOF_DYLIB_COMMAND, SIZEOF_FAT_ARCH, SIZEOF_FAT_HEADER,
    SIZEOF_LOAD_COMMAND, SIZEOF_MACH_HEADER, SIZEOF_MACH_HEADER_64, SIZEOF_SECTION_32,
    SIZEOF_SECTION_64, SIZEOF_SEGMENT_COMMAND_32, SIZEOF_SEGMENT_COMMAND_64,
};
use scroll::{Endian, Pwrite};

enum Command {
    Dylib(u32, String),
    Opaque(u32, Vec<u8>),
    Text,
}

pub struct Image {
    is_64: bool,
    big_endian: bool,
    cputype: i32,
    slack: usize,
    commands: Vec<Command>,
}

impl Image {
    pub fn new_64() -> Self {
        Image {
            is_64: true,
            big_endian: false,
            cputype: 0x100000c,
            slack: 64,
            commands: vec![Command::Text],
        }
    }

    pub fn new_32() -> Self {
        Image {
            is_64: false,
            big_endian: false,
            cputype: 7,
            slack: 64,
            commands: vec![Command::Text],
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn cputype(mut self, cputype: i32) -> Self {
        self.cputype = cputype;
        self
    }

    /// Free bytes left between the last load command and the section data.
    pub fn slack(mut self, slack: usize) -> Self {
        self.slack = slack;
        self
    }

    pub fn load_dylib(self, path: &str) -> Self {
        self.dylib(LC_LOAD_DYLIB, path)
    }

    pub fn dylib(mut self, cmd: u32, path: &str) -> Self {
        self.commands.push(Command::Dylib(cmd, path.to_string()));
        self
    }

    pub fn uuid(mut self, seed: u8) -> Self {
        self.commands.push(Command::Opaque(LC_UUID, vec![seed; 16]));
        self
    }

    fn endian(&self) -> Endian {
        if self.big_endian {
            scroll::BE
        } else {
            scroll::LE
        }
    }

    fn header_size(&self) -> usize {
        if self.is_64 {
            SIZEOF_MACH_HEADER_64
        } else {
            SIZEOF_MACH_HEADER
        }
    }

    fn command_size(&self, command: &Command) -> usize {
        let word = if self.is_64 { 8 } else { 4 };
        match command {
            Command::Dylib(_, path) => {
                (SIZEOF_DYLIB_COMMAND + path.len() + 1 + word - 1) / word * word
            }
            Command::Opaque(_, body) => SIZEOF_LOAD_COMMAND + body.len(),
            Command::Text if self.is_64 => SIZEOF_SEGMENT_COMMAND_64 + SIZEOF_SECTION_64,
            Command::Text => SIZEOF_SEGMENT_COMMAND_32 + SIZEOF_SECTION_32,
        }
    }

    fn name(name: &str) -> [u8; 16] {
        let mut field = [0u8; 16];
        field[..name.len()].copy_from_slice(name.as_bytes());
        field
    }

    pub fn build(&self) -> Vec<u8> {
        let endian = self.endian();
        let sizeofcmds: usize = self.commands.iter().map(|c| self.command_size(c)).sum();
        let data_start = self.header_size() + sizeofcmds + self.slack;
        let data = [0xde, 0xad, 0xbe, 0xef].repeat(4);
        let total = data_start + data.len();

        let mut out = vec![0u8; total];
        let header = MachHeader {
            magic: if self.is_64 { MH_MAGIC_64 } else { MH_MAGIC },
            cpu_type: self.cputype,
            cpu_sub_type: 0,
            filetype: 6,
            ncmds: self.commands.len() as u32,
            sizeofcmds: sizeofcmds as u32,
            flags: 0x85,
        };
        out.pwrite_with(header, 0, endian).unwrap();

        let mut offset = self.header_size();
        for command in &self.commands {
            let size = self.command_size(command);
            match command {
                Command::Dylib(cmd, path) => {
                    let dylib = DylibCommand {
                        cmd: *cmd,
                        cmdsize: size as u32,
                        name: SIZEOF_DYLIB_COMMAND as u32,
                        timestamp: 2,
                        current_version: 0x10000,
                        compatibility_version: 0x10000,
                    };
                    out.pwrite_with(dylib, offset, endian).unwrap();
                    out[offset + SIZEOF_DYLIB_COMMAND..][..path.len()]
                        .copy_from_slice(path.as_bytes());
                }
                Command::Opaque(cmd, body) => {
                    let lc = LoadCommandHeader {
                        cmd: *cmd,
                        cmdsize: size as u32,
                    };
                    out.pwrite_with(lc, offset, endian).unwrap();
                    out[offset + SIZEOF_LOAD_COMMAND..][..body.len()].copy_from_slice(body);
                }
                Command::Text if self.is_64 => {
                    let segment = SegmentCommand64 {
                        cmd: LC_SEGMENT_64,
                        cmdsize: size as u32,
                        segname: Self::name("__TEXT"),
                        vmaddr: 0x1000,
                        vmsize: 0x1000,
                        fileoff: 0,
                        filesize: total as u64,
                        maxprot: 5,
                        initprot: 5,
                        nsects: 1,
                        flags: 0,
                    };
                    let section = Section64 {
                        sectname: Self::name("__text"),
                        segname: Self::name("__TEXT"),
                        addr: 0x1000 + data_start as u64,
                        size: data.len() as u64,
                        offset: data_start as u32,
                        ..Default::default()
                    };
                    out.pwrite_with(segment, offset, endian).unwrap();
                    out.pwrite_with(section, offset + SIZEOF_SEGMENT_COMMAND_64, endian)
                        .unwrap();
                }
                Command::Text => {
                    let segment = SegmentCommand32 {
                        cmd: LC_SEGMENT,
                        cmdsize: size as u32,
                        segname: Self::name("__TEXT"),
                        vmaddr: 0x1000,
                        vmsize: 0x1000,
                        fileoff: 0,
                        filesize: total as u32,
                        maxprot: 5,
                        initprot: 5,
                        nsects: 1,
                        flags: 0,
                    };
                    let section = Section32 {
                        sectname: Self::name("__text"),
                        segname: Self::name("__TEXT"),
                        addr: 0x1000 + data_start as u32,
                        size: data.len() as u32,
                        offset: data_start as u32,
                        ..Default::default()
                    };
                    out.pwrite_with(segment, offset, endian).unwrap();
                    out.pwrite_with(section, offset + SIZEOF_SEGMENT_COMMAND_32, endian)
                        .unwrap();
                }
            }
            offset += size;
        }

        out[data_start..].copy_from_slice(&data);
        out
    }
}

/// Wraps thin images into a big-endian fat binary, each slice on a 4 KiB
/// boundary.
pub fn fat(slices: &[(i32, Vec<u8>)]) -> Vec<u8> {
    let mut out = vec![0u8; SIZEOF_FAT_HEADER + slices.len() * SIZEOF_FAT_ARCH];
    let header = FatHeader {
        magic: FAT_MAGIC,
        nfat_arch: slices.len() as u32,
    };
    out.pwrite_with(header, 0, scroll::BE).unwrap();

    let mut offset = 0x1000usize;
    for (i, (cputype, slice)) in slices.iter().enumerate() {
        let arch = FatArch {
            cputype: *cputype as u32,
            cpusubtype: 0,
            offset: offset as u32,
            size: slice.len() as u32,
            align: 12,
        };
        out.pwrite_with(arch, SIZEOF_FAT_HEADER + i * SIZEOF_FAT_ARCH, scroll::BE)
            .unwrap();
        out.resize(offset, 0);
        out.extend_from_slice(slice);
        offset = (offset + slice.len() + 0xfff) & !0xfff;
    }
    out
}
