//! One logical address space over embedded data or external `.bin` slices.
use crate::error::{InnoError, Result};
use crate::ext::io::*;
use crate::utils::files::find_case_insensitive;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub const SLICE_MAGIC_16: &[u8; 8] = b"idska16\x1a";
pub const SLICE_MAGIC_32: &[u8; 8] = b"idska32\x1a";

enum Source {
    Embedded,
    External {
        dir: PathBuf,
        /// Base names to try, in order.
        bases: Vec<String>,
        slices_per_disk: u32,
    },
}

pub struct SliceReader {
    source: Source,
    file: Option<Box<dyn ReadSeek>>,
    current: u32,
    /// Where slice data starts inside the current file.
    data_offset: u64,
    /// End of slice data inside the current file.
    slice_size: u64,
    /// Read position inside the current file.
    pos: u64,
}

/// File name of external slice `slice`.
pub fn slice_filename(base: &str, slice: u32, slices_per_disk: u32) -> String {
    if slices_per_disk <= 1 {
        return format!("{}-{}.bin", base, slice + 1);
    }
    let disk = slice / slices_per_disk + 1;
    let letter = (b'a' + (slice % slices_per_disk) as u8) as char;
    format!("{}-{}{}.bin", base, disk, letter)
}

impl SliceReader {
    /// Slice data embedded in the installer at `data_offset`.
    pub fn embedded(stream: Box<dyn ReadSeek>, data_offset: u64) -> Self {
        SliceReader {
            source: Source::Embedded,
            file: Some(stream),
            current: 0,
            data_offset,
            slice_size: u64::MAX,
            pos: data_offset,
        }
    }

    /// Slices stored next to the installer as `<base>-N.bin` files.
    pub fn external(dir: impl Into<PathBuf>, bases: Vec<String>, slices_per_disk: u32) -> Self {
        SliceReader {
            source: Source::External {
                dir: dir.into(),
                bases,
                slices_per_disk,
            },
            file: None,
            current: 0,
            data_offset: 0,
            slice_size: 0,
            pos: 0,
        }
    }

    fn find_slice(dir: &Path, bases: &[String], name_of: impl Fn(&str) -> String) -> Option<PathBuf> {
        for base in bases {
            let name = name_of(base);
            let path = dir.join(&name);
            if path.is_file() {
                return Some(path);
            }
            match find_case_insensitive(dir, &name) {
                Ok(found) => {
                    if let Some(p) = found.into_iter().next() {
                        return Some(p);
                    }
                }
                Err(e) => log::debug!("Could not list {}: {}", dir.display(), e),
            }
        }
        None
    }

    fn open(&mut self, slice: u32) -> Result<()> {
        if self.file.is_some() && self.current == slice {
            return Ok(());
        }
        let (dir, bases, slices_per_disk) = match &self.source {
            Source::Embedded => {
                return Err(InnoError::Slice(
                    "cannot change slices in a single-file setup".into(),
                ));
            }
            Source::External {
                dir,
                bases,
                slices_per_disk,
            } => (dir, bases, *slices_per_disk),
        };
        let path = Self::find_slice(dir, bases, |b| slice_filename(b, slice, slices_per_disk))
            .ok_or_else(|| {
                let name = bases
                    .first()
                    .map(|b| slice_filename(b, slice, slices_per_disk))
                    .unwrap_or_default();
                InnoError::Slice(format!("could not find slice {} ({})", slice, name))
            })?;
        log::debug!("Opening slice {}", path.display());
        let file = File::open(&path)?;
        let file_size = file.metadata()?.len();
        let mut file = BufReader::new(file);
        let mut magic = [0u8; 8];
        file.read_exact(&mut magic)
            .map_err(|_| InnoError::Slice(format!("slice {} is too short", path.display())))?;
        if &magic != SLICE_MAGIC_16 && &magic != SLICE_MAGIC_32 {
            return Err(InnoError::Slice(format!(
                "bad slice magic in {}",
                path.display()
            )));
        }
        let size = file.read_u32()? as u64;
        if size > file_size || size < 12 {
            return Err(InnoError::Slice(format!(
                "bad slice size {} in {} ({} bytes on disk)",
                size,
                path.display(),
                file_size
            )));
        }
        self.file = Some(Box::new(file));
        self.current = slice;
        self.slice_size = size;
        self.pos = 12;
        Ok(())
    }

    /// Moves to `offset` inside `slice`. Returns `false` if the offset lies
    /// past the end of the slice.
    pub fn seek(&mut self, slice: u32, offset: u64) -> Result<bool> {
        self.open(slice)?;
        let Some(target) = offset.checked_add(self.data_offset) else {
            return Ok(false);
        };
        if target > self.slice_size {
            return Ok(false);
        }
        if let Some(file) = self.file.as_mut() {
            file.seek(SeekFrom::Start(target))?;
        }
        self.pos = target;
        Ok(true)
    }

    pub fn current_slice(&self) -> u32 {
        self.current
    }
}

impl Read for SliceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.file.is_none() {
                self.open(self.current).map_err(InnoError::into_io)?;
            }
            let remaining = self.slice_size.saturating_sub(self.pos);
            if remaining == 0 {
                if matches!(self.source, Source::Embedded) {
                    return Ok(0);
                }
                let next = self.current + 1;
                self.open(next).map_err(InnoError::into_io)?;
                continue;
            }
            let want = remaining.min(buf.len() as u64) as usize;
            let Some(file) = self.file.as_mut() else {
                return Ok(0);
            };
            let n = file.read(&mut buf[..want])?;
            if n == 0 {
                if matches!(self.source, Source::Embedded) {
                    return Ok(0);
                }
                return Err(InnoError::Slice(format!(
                    "slice {} ends before its declared size",
                    self.current
                ))
                .into_io());
            }
            self.pos += n as u64;
            return Ok(n);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Writes an external slice file holding `data` after the slice header.
    pub(crate) fn write_slice(dir: &Path, name: &str, data: &[u8]) {
        let mut out = SLICE_MAGIC_32.to_vec();
        out.extend_from_slice(&((data.len() + 12) as u32).to_le_bytes());
        out.extend_from_slice(data);
        std::fs::write(dir.join(name), out).unwrap();
    }

    #[test]
    fn test_slice_names() {
        assert_eq!(slice_filename("setup", 0, 1), "setup-1.bin");
        assert_eq!(slice_filename("setup", 4, 1), "setup-5.bin");
        assert_eq!(slice_filename("setup", 0, 2), "setup-1a.bin");
        assert_eq!(slice_filename("setup", 3, 2), "setup-2b.bin");
    }

    #[test]
    fn test_read_spans_slices() {
        let dir = tempfile::tempdir().unwrap();
        write_slice(dir.path(), "setup-1.bin", b"hello ");
        // Second slice found through a case-insensitive lookup.
        write_slice(dir.path(), "SETUP-2.BIN", b"world");
        let mut reader = SliceReader::external(dir.path(), vec!["setup".into()], 1);
        assert!(reader.seek(0, 12 + 2).unwrap());
        let mut buf = [0u8; 7];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"llo wor");
        assert_eq!(reader.current_slice(), 1);

        assert!(!reader.seek(0, 12 + 7).unwrap());
        assert!(reader.seek(0, 12 + 6).unwrap());
    }

    #[test]
    fn test_fallback_base_name() {
        let dir = tempfile::tempdir().unwrap();
        write_slice(dir.path(), "data-1.bin", b"xyz");
        let mut reader =
            SliceReader::external(dir.path(), vec!["setup".into(), "data".into()], 1);
        assert!(reader.seek(0, 12).unwrap());
        let mut out = Vec::new();
        (&mut reader).take(3).read_to_end(&mut out).unwrap();
        assert_eq!(out, b"xyz");
    }

    #[test]
    fn test_bad_magic_and_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a-1.bin"), b"idska99\x1a\x10\x00\x00\x00").unwrap();
        let mut reader = SliceReader::external(dir.path(), vec!["a".into()], 1);
        assert!(matches!(reader.seek(0, 0), Err(InnoError::Slice(_))));

        let mut bad = SLICE_MAGIC_16.to_vec();
        bad.extend_from_slice(&1000u32.to_le_bytes());
        std::fs::write(dir.path().join("b-1.bin"), bad).unwrap();
        let mut reader = SliceReader::external(dir.path(), vec!["b".into()], 1);
        assert!(matches!(reader.seek(0, 0), Err(InnoError::Slice(_))));
    }

    #[test]
    fn test_embedded_offsets() {
        let data = b"EXEHEADERpayload".to_vec();
        let mut reader = SliceReader::embedded(Box::new(Cursor::new(data)), 9);
        assert!(reader.seek(0, 2).unwrap());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"yload");
        assert!(matches!(reader.seek(1, 0), Err(InnoError::Slice(_))));
    }
}
