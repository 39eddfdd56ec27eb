//! Where extracted files go.
use crate::error::Result;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Creates output files and directories from planned relative paths.
pub trait ExtractTarget {
    fn create_dir(&mut self, path: &str) -> Result<()>;
    fn create(&mut self, path: &str) -> Result<Box<dyn TargetFile>>;
}

/// One output file being written.
pub trait TargetFile {
    /// Moves the write position. Parts of multi-part files are written at
    /// their offset in the complete file.
    fn seek(&mut self, offset: u64) -> Result<()>;
    fn write(&mut self, data: &[u8]) -> Result<()>;
    /// Completes the file and applies its modification time.
    fn finish(self: Box<Self>, timestamp: i64, nsec: u32) -> Result<()>;
}

/// Writes below a directory on disk.
pub struct DiskTarget {
    root: PathBuf,
}

impl DiskTarget {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DiskTarget { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        full.extend(path.split('/'));
        full
    }
}

impl ExtractTarget for DiskTarget {
    fn create_dir(&mut self, path: &str) -> Result<()> {
        fs::create_dir_all(self.resolve(path))?;
        Ok(())
    }

    fn create(&mut self, path: &str) -> Result<Box<dyn TargetFile>> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        log::info!("Writing {}", full.display());
        Ok(Box::new(DiskFile {
            file: BufWriter::new(File::create(&full)?),
        }))
    }
}

struct DiskFile {
    file: BufWriter<File>,
}

impl TargetFile for DiskFile {
    fn seek(&mut self, offset: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data)?;
        Ok(())
    }

    fn finish(self: Box<Self>, timestamp: i64, nsec: u32) -> Result<()> {
        let file = self.file.into_inner().map_err(|e| e.into_error())?;
        file.set_modified(system_time(timestamp, nsec))?;
        Ok(())
    }
}

fn system_time(timestamp: i64, nsec: u32) -> SystemTime {
    let offset = Duration::new(timestamp.unsigned_abs(), 0);
    let base = if timestamp >= 0 {
        UNIX_EPOCH + offset
    } else {
        UNIX_EPOCH - offset
    };
    base + Duration::from_nanos(nsec as u64)
}

/// Collects finished files in memory, keyed by path.
#[derive(Clone, Default)]
pub struct MemoryTarget {
    pub files: Rc<RefCell<BTreeMap<String, Vec<u8>>>>,
    pub dirs: Rc<RefCell<Vec<String>>>,
}

impl ExtractTarget for MemoryTarget {
    fn create_dir(&mut self, path: &str) -> Result<()> {
        self.dirs.borrow_mut().push(path.to_string());
        Ok(())
    }

    fn create(&mut self, path: &str) -> Result<Box<dyn TargetFile>> {
        Ok(Box::new(MemoryFile {
            path: path.to_string(),
            data: Vec::new(),
            pos: 0,
            files: self.files.clone(),
        }))
    }
}

struct MemoryFile {
    path: String,
    data: Vec<u8>,
    pos: usize,
    files: Rc<RefCell<BTreeMap<String, Vec<u8>>>>,
}

impl TargetFile for MemoryFile {
    fn seek(&mut self, offset: u64) -> Result<()> {
        self.pos = offset as usize;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let end = self.pos + data.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    fn finish(self: Box<Self>, _timestamp: i64, _nsec: u32) -> Result<()> {
        self.files.borrow_mut().insert(self.path, self.data);
        Ok(())
    }
}

/// Discards everything; used when only verifying checksums.
pub struct NullTarget;

impl ExtractTarget for NullTarget {
    fn create_dir(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    fn create(&mut self, _path: &str) -> Result<Box<dyn TargetFile>> {
        Ok(Box::new(NullTarget))
    }
}

impl TargetFile for NullTarget {
    fn seek(&mut self, _offset: u64) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn finish(self: Box<Self>, _timestamp: i64, _nsec: u32) -> Result<()> {
        Ok(())
    }
}

/// Whether `path` is usable as an output root: missing or a directory.
pub fn check_output_dir(path: &Path) -> bool {
    !path.exists() || path.is_dir()
}
