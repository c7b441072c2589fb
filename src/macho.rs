use crate::error::{Error, Result};
use crate::ffi::{
    FatArch, FatArch64, FatHeader, FAT_MAGIC, FAT_MAGIC_64, SIZEOF_FAT_ARCH, SIZEOF_FAT_ARCH_64,
    SIZEOF_FAT_HEADER,
};
use crate::header::Header;
use log::debug;
use scroll::Pread;
use std::{
    fs,
    io::{Seek, SeekFrom, Write},
    path::Path,
};

/// A thin or fat Mach-O file: one [`Header`] per architecture, in file order.
#[derive(Debug, Clone)]
pub struct MachOFile {
    pub headers: Vec<Header>,
    pub fat: bool,
}

impl MachOFile {
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let magic: u32 = bytes
            .pread_with(0, scroll::BE)
            .map_err(|_| Error::NotMachO { magic: 0 })?;

        match magic {
            FAT_MAGIC | FAT_MAGIC_64 => Self::parse_fat(bytes, magic == FAT_MAGIC_64),
            _ => Ok(MachOFile {
                headers: vec![Header::parse(bytes, 0)?],
                fat: false,
            }),
        }
    }

    fn parse_fat(bytes: &[u8], is_64: bool) -> Result<Self> {
        let fat_header: FatHeader = bytes.pread_with(0, scroll::BE)?;
        if fat_header.nfat_arch == 0 {
            return Err(Error::Malformed("fat binary without architectures".into()));
        }
        debug!("fat binary with {} archs", fat_header.nfat_arch);

        let mut ranges = Vec::new();
        for i in 0..fat_header.nfat_arch as usize {
            let (offset, size) = if is_64 {
                let arch: FatArch64 =
                    bytes.pread_with(SIZEOF_FAT_HEADER + i * SIZEOF_FAT_ARCH_64, scroll::BE)?;
                (arch.offset, arch.size)
            } else {
                let arch: FatArch =
                    bytes.pread_with(SIZEOF_FAT_HEADER + i * SIZEOF_FAT_ARCH, scroll::BE)?;
                (arch.offset as u64, arch.size as u64)
            };
            if offset.checked_add(size).map_or(true, |end| end > bytes.len() as u64) {
                return Err(Error::Malformed(format!(
                    "arch {} at {:#x} of size {:#x} runs past the end of the file",
                    i, offset, size
                )));
            }
            ranges.push((offset, size));
        }

        let mut sorted = ranges.clone();
        sorted.sort_unstable();
        for pair in sorted.windows(2) {
            if pair[0].0 + pair[0].1 > pair[1].0 {
                return Err(Error::Malformed(format!(
                    "archs at {:#x} and {:#x} overlap",
                    pair[0].0, pair[1].0
                )));
            }
        }

        let mut headers = Vec::with_capacity(ranges.len());
        for (i, (offset, size)) in ranges.into_iter().enumerate() {
            let slice = &bytes[offset as usize..(offset + size) as usize];
            let header = Header::parse(slice, offset).map_err(|err| match err {
                Error::NotMachO { magic } => Error::Malformed(format!(
                    "arch {} does not hold a Mach-O image (magic {:#010x})",
                    i, magic
                )),
                err => err,
            })?;
            headers.push(header);
        }

        Ok(MachOFile { headers, fat: true })
    }

    /// Fails if any header's load commands no longer fit before its first
    /// segment data.
    pub fn check_space(&self) -> Result<()> {
        for (i, header) in self.headers.iter().enumerate() {
            let needed = header.mach.sizeofcmds as u64;
            let available = header.available_space();
            if needed > available {
                return Err(Error::InsufficientSpace {
                    header: i,
                    needed,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Writes every header and its load commands back at its own offset.
    ///
    /// `target` must already hold the rest of the file. When a header's load
    /// commands shrank, the bytes they used to occupy are zeroed.
    pub fn serialize<W: Write + Seek>(&self, target: &mut W) -> Result<()> {
        for header in &self.headers {
            let bytes = header.to_bytes()?;
            assert_eq!(
                bytes.len(),
                header.header_size() + header.mach.sizeofcmds as usize,
                "load commands of the header at {:#x} disagree with sizeofcmds",
                header.offset
            );

            assert!(
                bytes.len() as u64 <= header.size,
                "load commands of the header at {:#x} overrun its {:#x} byte image",
                header.offset,
                header.size
            );

            target.seek(SeekFrom::Start(header.offset))?;
            target.write_all(&bytes)?;

            let stale = (header.parsed_sizeofcmds() as usize)
                .saturating_sub(header.mach.sizeofcmds as usize);
            if stale > 0 {
                target.write_all(&vec![0; stale])?;
            }
            debug!(
                "wrote {} header at {:#x} ({} of {} bytes, {} zeroed)",
                header.arch_name(),
                header.offset,
                bytes.len(),
                header.size,
                stale
            );
        }
        Ok(())
    }
}
