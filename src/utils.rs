use crate::error::Result;
use std::{
    fs::File,
    io,
    path::Path,
};
use tempfile::NamedTempFile;

/// Drops the trailing `\0` bytes of a fixed-size, null-padded field.
pub fn strip_null_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Rounds `size` up to the next multiple of `alignment` (a power of two).
pub fn align(size: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (size + alignment - 1) & !(alignment - 1)
}

/// Replaces `path` through a temporary file in the same directory.
///
/// The temporary file starts out as a copy of `path`, so `writer` only has to
/// seek to and patch the bytes it changes. It is renamed over `path` once
/// `writer` returns `Ok`; on any error it is deleted and `path` is left as it
/// was. Permission bits are those of a fresh temporary file, callers restore
/// the originals.
pub fn atomic_replace<P, F>(path: P, writer: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut File) -> Result<()>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut original = File::open(path)?;
        io::copy(&mut original, temp.as_file_mut())?;
    }

    writer(temp.as_file_mut())?;

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::{
        fs,
        io::{Seek, SeekFrom, Write},
    };

    #[test]
    fn strips_trailing_nulls_only() {
        assert_eq!(strip_null_padding(b"/usr/lib/libz.dylib\0\0\0"), b"/usr/lib/libz.dylib");
        assert_eq!(strip_null_padding(b"a\0b\0"), b"a\0b");
        assert_eq!(strip_null_padding(b"\0\0\0\0"), b"");
        assert_eq!(strip_null_padding(b""), b"");
    }

    #[test]
    fn aligns_to_word_size() {
        assert_eq!(align(24 + 19 + 1, 8), 48);
        assert_eq!(align(24 + 19 + 1, 4), 44);
        assert_eq!(align(32, 8), 32);
        assert_eq!(align(0, 4), 0);
    }

    #[test]
    fn replace_patches_a_copy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin");
        fs::write(&path, b"0123456789").unwrap();

        atomic_replace(&path, |f| {
            f.seek(SeekFrom::Start(4))?;
            f.write_all(b"ab")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"0123ab6789");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_writer_leaves_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin");
        fs::write(&path, b"0123456789").unwrap();

        let res = atomic_replace(&path, |f| {
            f.seek(SeekFrom::Start(0))?;
            f.write_all(b"garbage")?;
            Err(Error::Malformed("interrupted".into()))
        });

        assert!(matches!(res, Err(Error::Malformed(_))));
        assert_eq!(fs::read(&path).unwrap(), b"0123456789");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = atomic_replace(dir.path().join("nope"), |_| Ok(()));
        assert!(matches!(res, Err(Error::Io(_))));
    }
}
