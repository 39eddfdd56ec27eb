//! Listing, testing and extracting the files of an installer.
pub mod collision;
pub mod expr;
pub mod filenames;
pub mod planner;
pub mod target;

use crate::error::{InnoError, Result};
use crate::ext::io::*;
use crate::loader::Offsets;
use crate::setup::data::DataEntry;
use crate::setup::info::Info;
use crate::stream::chunk::{Chunk, Encryption, open_chunk};
use crate::stream::file::{FileReader, Filter};
use crate::stream::slice::SliceReader;
use crate::types::{ExtractConfig, FileRecord, Mode, SetupSummary};
use crate::utils::counter::FileResult;
use crate::utils::encoding::Codepage;
use planner::Plan;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use target::{ExtractTarget, TargetFile};

const BUFFER_SIZE: usize = 64 * 1024;

/// An installer with its loader table and decoded setup headers.
pub struct Installer {
    pub path: PathBuf,
    pub offsets: Offsets,
    pub info: Info,
}

impl Installer {
    pub fn open(path: &Path, codepage: Option<Codepage>) -> Result<Self> {
        let offsets = Offsets::load(path)?;
        let mut file = BufReader::new(File::open(path)?);
        file.seek(SeekFrom::Start(offsets.header_offset as u64))?;
        let info = Info::load(&mut file, codepage)?;
        log::debug!(
            "{}: setup data {}, {} files, {} data entries",
            path.display(),
            info.version,
            info.files.len(),
            info.data_entries.len()
        );
        Ok(Installer {
            path: path.to_path_buf(),
            offsets,
            info,
        })
    }

    /// Opens the file data: embedded after the setup headers, or in `.bin`
    /// files next to the installer.
    pub fn slices(&self) -> Result<SliceReader> {
        if self.offsets.data_offset != 0 {
            let file = BufReader::new(File::open(&self.path)?);
            return Ok(SliceReader::embedded(
                Box::new(file),
                self.offsets.data_offset as u64,
            ));
        }
        let dir = self.path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(SliceReader::external(
            dir,
            slice_bases(&self.path, self.info.header.base_filename.as_str()),
            self.info.header.slices_per_disk,
        ))
    }
}

/// Base names to look for slice files under: the installer's own stem,
/// then the name stored in the header. A stored name that is not a plain
/// file name is ignored.
fn slice_bases(installer: &Path, stored: &str) -> Vec<String> {
    let mut bases = Vec::new();
    if let Some(stem) = installer.file_stem() {
        bases.push(stem.to_string_lossy().into_owned());
    }
    let plain = !stored.contains(['/', '\\', ':']) && stored != "." && stored != "..";
    if !stored.is_empty() && !plain {
        log::warn!("Ignoring slice base name {:?}", stored);
    } else if !stored.is_empty() && !bases.iter().any(|b| b == stored) {
        bases.push(stored.to_string());
    }
    bases
}

pub fn summary(info: &Info) -> SetupSummary {
    let h = &info.header;
    let counts = HashMap::from([
        ("languages".to_string(), info.languages.len()),
        ("messages".to_string(), info.messages.len()),
        ("permissions".to_string(), info.permissions.len()),
        ("types".to_string(), info.types.len()),
        ("components".to_string(), info.components.len()),
        ("tasks".to_string(), info.tasks.len()),
        ("directories".to_string(), info.directories.len()),
        ("files".to_string(), info.files.len()),
        ("icons".to_string(), info.icons.len()),
        ("ini_entries".to_string(), info.ini_entries.len()),
        ("registry_entries".to_string(), info.registry_entries.len()),
        ("delete_entries".to_string(), info.delete_entries.len()),
        (
            "uninstall_delete_entries".to_string(),
            info.uninstall_delete_entries.len(),
        ),
        ("run_entries".to_string(), info.run_entries.len()),
        (
            "uninstall_run_entries".to_string(),
            info.uninstall_run_entries.len(),
        ),
        ("data_entries".to_string(), info.data_entries.len()),
    ]);
    SetupSummary {
        version: info.version.to_string(),
        app_name: h.app_name.as_str().to_string(),
        app_version: h.app_version.as_str().to_string(),
        app_publisher: h.app_publisher.as_str().to_string(),
        codepage: info.codepage,
        compression: h.compression.to_string(),
        password_protected: info.has_password(),
        languages: info.languages.iter().map(|l| l.name.clone()).collect(),
        components: info.components.iter().map(|c| c.name.clone()).collect(),
        tasks: info.tasks.iter().map(|t| t.name.clone()).collect(),
        counts,
    }
}

/// Listing records for the planned files, in plan order.
pub fn records(info: &Info, plan: &Plan) -> Vec<FileRecord> {
    plan.files
        .iter()
        .filter_map(|f| {
            let file = info.files.get(f.entry)?;
            let data = info.data_entries.get(file.location as usize)?;
            let size = file
                .locations()
                .filter_map(|l| info.data_entries.get(l as usize))
                .fold(0u64, |total, d| total.saturating_add(d.uncompressed_size));
            Some(FileRecord {
                path: f.path.clone(),
                size,
                timestamp: data.timestamp,
                version: data.has_version_info().then(|| data.version_string()),
                checksum: data.file.checksum.to_string(),
                languages: file.conditions.languages.clone(),
                components: file.conditions.components.clone(),
            })
        })
        .collect()
}

/// Plans the output of `installer` and, unless only listing, decodes every
/// planned file into `target`.
pub fn run(
    installer: &Installer,
    config: &ExtractConfig,
    target: &mut dyn ExtractTarget,
) -> Result<Plan> {
    let plan = planner::plan(&installer.info, config)?;
    for skipped in &plan.skipped {
        log::info!("Skipped {}: {}", skipped.path, skipped.reason);
        crate::COUNTER.inc(FileResult::Skipped);
    }
    if config.mode == Mode::Extract {
        for dir in &plan.directories {
            target.create_dir(&dir.path)?;
        }
    }
    if config.mode.reads_data() && !plan.files.is_empty() {
        let mut slices = installer.slices()?;
        extract_files(&installer.info, &mut slices, &plan, config, target)?;
    }
    Ok(plan)
}

/// An output file and the parts still missing from it.
struct Output {
    path: String,
    file: Option<Box<dyn TargetFile>>,
    parts_left: usize,
    timestamp: i64,
    nsec: u32,
}

/// Decodes the planned files. Every chunk is opened once, in slice order,
/// and each data entry in it is written to all outputs that use it.
pub fn extract_files(
    info: &Info,
    slices: &mut SliceReader,
    plan: &Plan,
    config: &ExtractConfig,
    target: &mut dyn ExtractTarget,
) -> Result<()> {
    let mut outputs = Vec::with_capacity(plan.files.len());
    // data entry -> (output, offset of the part in the output)
    let mut users: BTreeMap<usize, Vec<(usize, u64)>> = BTreeMap::new();
    for (o, planned) in plan.files.iter().enumerate() {
        let file = info
            .files
            .get(planned.entry)
            .ok_or_else(|| InnoError::Format(format!("no file entry {}", planned.entry)))?;
        let mut offset = 0u64;
        let mut parts = 0;
        let mut timestamp = (0, 0);
        for location in file.locations() {
            let data = data_entry(info, location)?;
            if parts == 0 {
                timestamp = (data.timestamp, data.timestamp_nsec);
            }
            users
                .entry(location as usize)
                .or_default()
                .push((o, offset));
            offset = offset.checked_add(data.uncompressed_size).ok_or_else(|| {
                InnoError::Format(format!("{}: file size overflows", planned.path))
            })?;
            parts += 1;
        }
        outputs.push(Output {
            path: planned.path.clone(),
            file: None,
            parts_left: parts,
            timestamp: timestamp.0,
            nsec: timestamp.1,
        });
    }

    let password = chunk_password(info, users.keys().copied(), config)?;

    let mut chunks: BTreeMap<Chunk, Vec<usize>> = BTreeMap::new();
    for &location in users.keys() {
        chunks
            .entry(info.data_entries[location].chunk)
            .or_default()
            .push(location);
    }
    for (chunk, mut entries) in chunks {
        entries.sort_by_key(|&i| info.data_entries[i].file.offset);
        log::debug!(
            "Reading chunk at slice {} offset {:#x}: {} files, {} + {}",
            chunk.first_slice,
            chunk.offset,
            entries.len(),
            chunk.compression,
            chunk.encryption
        );
        let mut reader = open_chunk(slices, &chunk, password.as_deref())?;
        let mut pos = 0u64;
        for location in entries {
            let data = &info.data_entries[location];
            if data.file.offset < pos {
                return Err(InnoError::Chunk(format!(
                    "overlapping files at chunk offset {:#x}",
                    data.file.offset
                )));
            }
            skip(&mut *reader, data.file.offset - pos)?;
            extract_part(&mut *reader, data, &users[&location], &mut outputs, config, target)?;
            pos = data.file.offset.checked_add(data.file.size).ok_or_else(|| {
                InnoError::Chunk(format!(
                    "file at chunk offset {:#x} extends past the end of the chunk",
                    data.file.offset
                ))
            })?;
        }
    }

    for output in outputs.iter().filter(|o| o.parts_left > 0) {
        crate::COUNTER.inc_warning();
        log::warn!("{}: {} parts were not written", output.path, output.parts_left);
    }
    Ok(())
}

fn data_entry(info: &Info, location: u32) -> Result<&DataEntry> {
    info.data_entries
        .get(location as usize)
        .ok_or_else(|| InnoError::Format(format!("no data entry {}", location)))
}

/// Checks the password if any of `locations` is encrypted, and returns it
/// in the form chunk keys are derived from.
fn chunk_password(
    info: &Info,
    mut locations: impl Iterator<Item = usize>,
    config: &ExtractConfig,
) -> Result<Option<Vec<u8>>> {
    let encrypted = locations.any(|l| info.data_entries[l].chunk.encryption != Encryption::Plaintext);
    if !encrypted {
        return Ok(None);
    }
    let Some(password) = &config.password else {
        return Err(InnoError::Password(
            "setup contains encrypted files, a password is required".into(),
        ));
    };
    let encoded = info.encode_password(password);
    if !info.check_password(&encoded) {
        return Err(InnoError::Password("incorrect password".into()));
    }
    Ok(Some(encoded))
}

fn skip<R: Read + ?Sized>(reader: &mut R, count: u64) -> Result<()> {
    match reader.skip_bytes(count) {
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(InnoError::Chunk(format!(
            "chunk ended while skipping {} bytes",
            count
        ))),
        other => Ok(other?),
    }
}

fn extract_part(
    reader: &mut dyn Read,
    data: &DataEntry,
    users: &[(usize, u64)],
    outputs: &mut [Output],
    config: &ExtractConfig,
    target: &mut dyn ExtractTarget,
) -> Result<()> {
    for &(o, offset) in users {
        let output = &mut outputs[o];
        if output.file.is_none() {
            output.file = Some(target.create(&output.path)?);
        }
        if let Some(file) = output.file.as_mut() {
            file.seek(offset)?;
        }
    }

    let mut file = FileReader::new(reader, &data.file);
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for &(o, _) in users {
            if let Some(out) = outputs[o].file.as_mut() {
                out.write(&buf[..n])?;
            }
        }
    }
    let read = file.bytes_read();
    let actual = file.finish()?;

    let name = users
        .first()
        .map(|&(o, _)| outputs[o].path.clone())
        .unwrap_or_default();
    if data.file.filter != Filter::Zlib && read != data.file.size {
        return Err(InnoError::Chunk(format!(
            "{}: chunk ended after {} of {} bytes",
            name, read, data.file.size
        )));
    }
    if actual != data.file.checksum {
        let err = InnoError::Checksum {
            path: name,
            expected: data.file.checksum.to_string(),
            actual: actual.to_string(),
        };
        if config.mode == Mode::Test {
            return Err(err);
        }
        crate::COUNTER.inc_warning();
        log::warn!("{}", err);
    }

    for &(o, _) in users {
        let output = &mut outputs[o];
        output.parts_left = output.parts_left.saturating_sub(1);
        if output.parts_left == 0 {
            if let Some(file) = output.file.take() {
                file.finish(output.timestamp, output.nsec)?;
                log::debug!("Finished {}", output.path);
                crate::COUNTER.inc(FileResult::Ok);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::data::tests::data_5_1_0;
    use crate::setup::file::FileEntry;
    use crate::setup::file::tests::file_5_1_0;
    use crate::setup::info::tests::setup_5_1_0;
    use crate::stream::chunk::tests::encode_chunk;
    use crate::stream::chunk::{Compression, SALT_SIZE};
    use crate::stream::file::FileLocation;
    use crate::stream::slice::tests::write_slice;
    use crate::types::CollisionAction;
    use crate::utils::checksum::{Checksum, ChecksumType};
    use crate::utils::encoding::CP_WINDOWS1252;
    use std::io::Cursor;
    use std::time::UNIX_EPOCH;
    use target::{DiskTarget, MemoryTarget, NullTarget};

    const PREFIX: &[u8] = b"MZ";

    /// Appends a stored chunk holding `parts`, each followed by a two byte
    /// gap, and adds a data entry per part. Returns the data entry indices.
    fn add_chunk(
        info: &mut Info,
        bytes: &mut Vec<u8>,
        parts: &[&[u8]],
        encryption: Encryption,
        password: &[u8],
    ) -> Vec<u32> {
        let mut payload = Vec::new();
        let mut offsets = Vec::new();
        for part in parts {
            offsets.push(payload.len() as u64);
            payload.extend_from_slice(part);
            payload.extend_from_slice(b"--");
        }
        let stored = encode_chunk(&payload, Compression::Stored, encryption, password);
        let overhead = if encryption == Encryption::Plaintext {
            4
        } else {
            4 + SALT_SIZE
        };
        let chunk = Chunk {
            offset: (bytes.len() - PREFIX.len()) as u32,
            size: (stored.len() - overhead) as u64,
            compression: Compression::Stored,
            encryption,
            ..Default::default()
        };
        bytes.extend_from_slice(&stored);
        let mut ids = Vec::new();
        for (part, offset) in parts.iter().zip(offsets) {
            info.data_entries.push(DataEntry {
                chunk,
                file: FileLocation {
                    offset,
                    size: part.len() as u64,
                    checksum: Checksum::compute(ChecksumType::Crc32, &[*part]),
                    filter: Filter::None,
                },
                uncompressed_size: part.len() as u64,
                timestamp: 1_577_836_800,
                ..Default::default()
            });
            ids.push((info.data_entries.len() - 1) as u32);
        }
        ids
    }

    fn add_file(info: &mut Info, destination: &str, locations: &[u32]) {
        info.files.push(FileEntry {
            destination: destination.into(),
            location: locations[0],
            additional_locations: locations[1..].to_vec(),
            ..Default::default()
        });
    }

    fn extract(info: &Info, bytes: Vec<u8>, config: &ExtractConfig) -> Result<MemoryTarget> {
        let plan = planner::plan(info, config)?;
        let mut slices = SliceReader::embedded(Box::new(Cursor::new(bytes)), PREFIX.len() as u64);
        let mut target = MemoryTarget::default();
        extract_files(info, &mut slices, &plan, config, &mut target)?;
        Ok(target)
    }

    fn extract_mode() -> ExtractConfig {
        ExtractConfig {
            mode: Mode::Extract,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_stored_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let content: Vec<u8> = (0..100u8).map(|i| i.wrapping_mul(37)).collect();
        let Checksum::Md5(md5) = Checksum::compute(ChecksumType::Md5, &[content.as_slice()]) else {
            unreachable!()
        };
        let setup = setup_5_1_0(
            &[file_5_1_0("{app}\\readme.txt", 0, 0)],
            // The chunk follows the 12 byte slice header.
            &[data_5_1_0(12, 0, 100, 100, md5, 0)],
        );
        let installer_path = dir.path().join("setup.exe");
        std::fs::write(&installer_path, setup).unwrap();
        let chunk = encode_chunk(&content, Compression::Stored, Encryption::Plaintext, b"");
        write_slice(dir.path(), "setup-1.bin", &chunk);

        let installer = Installer::open(&installer_path, None).unwrap();
        assert!(!installer.offsets.found_magic);
        let out = dir.path().join("out");
        let mut target = DiskTarget::new(&out);
        let plan = run(&installer, &extract_mode(), &mut target).unwrap();
        assert_eq!(plan.files.len(), 1);

        let path = out.join("app").join("readme.txt");
        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, content);
        assert_eq!(crc32fast::hash(&written), crc32fast::hash(&content));
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(
            modified.duration_since(UNIX_EPOCH).unwrap().as_secs(),
            1_577_836_800
        );

        let records = records(&installer.info, &plan);
        assert_eq!(records[0].path, "app/readme.txt");
        assert_eq!(records[0].size, 100);
        assert_eq!(summary(&installer.info).app_name, "Test App");
    }

    #[test]
    fn test_renamed_collisions_are_both_extracted() {
        let mut info = Info::default();
        let mut bytes = PREFIX.to_vec();
        let ids = add_chunk(&mut info, &mut bytes, &[b"hello".as_slice(), b"world!".as_slice()], Encryption::Plaintext, b"");
        add_file(&mut info, "a\\b.txt", &ids[..1]);
        add_file(&mut info, "a\\b.txt", &ids[1..]);
        let config = ExtractConfig {
            collisions: CollisionAction::RenameAll,
            ..extract_mode()
        };
        let target = extract(&info, bytes, &config).unwrap();
        let files = target.files.borrow();
        assert!(!files.contains_key("a/b.txt"));
        assert_eq!(files["a/b.txt$0"], b"hello");
        assert_eq!(files["a/b.txt$1"], b"world!");
    }

    #[test]
    fn test_multi_part_and_shared_data() {
        let mut info = Info::default();
        let mut bytes = PREFIX.to_vec();
        // The second part comes first in the data.
        let tail = add_chunk(&mut info, &mut bytes, &[b"BBB".as_slice()], Encryption::Plaintext, b"");
        let head = add_chunk(&mut info, &mut bytes, &[b"AAAA".as_slice()], Encryption::Plaintext, b"");
        add_file(&mut info, "big.bin", &[head[0], tail[0]]);
        add_file(&mut info, "copy.bin", &tail);
        let target = extract(&info, bytes, &extract_mode()).unwrap();
        let files = target.files.borrow();
        assert_eq!(files["big.bin"], b"AAAABBB");
        assert_eq!(files["copy.bin"], b"BBB");
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut info = Info::default();
        let mut bytes = PREFIX.to_vec();
        let ids = add_chunk(&mut info, &mut bytes, &[b"data".as_slice()], Encryption::Plaintext, b"");
        info.data_entries[0].file.checksum = Checksum::Crc32(0);
        add_file(&mut info, "x", &ids);

        let target = extract(&info, bytes.clone(), &extract_mode()).unwrap();
        assert_eq!(target.files.borrow()["x"], b"data");

        let config = ExtractConfig {
            mode: Mode::Test,
            ..Default::default()
        };
        let plan = planner::plan(&info, &config).unwrap();
        let mut slices = SliceReader::embedded(Box::new(Cursor::new(bytes)), PREFIX.len() as u64);
        let result = extract_files(&info, &mut slices, &plan, &config, &mut NullTarget);
        assert!(matches!(result, Err(InnoError::Checksum { .. })));
    }

    #[test]
    fn test_slice_bases_stay_in_the_installer_dir() {
        let exe = Path::new("dir/setup.exe");
        assert_eq!(slice_bases(exe, ""), ["setup"]);
        assert_eq!(slice_bases(exe, "setup"), ["setup"]);
        assert_eq!(slice_bases(exe, "mygame"), ["setup", "mygame"]);
        for stored in ["../../x", "..\\x", "C:\\..", "sub/setup", "..", "."] {
            assert_eq!(slice_bases(exe, stored), ["setup"], "{}", stored);
        }
    }

    #[test]
    fn test_part_sizes_overflow() {
        let mut info = Info::default();
        let mut bytes = PREFIX.to_vec();
        let ids = add_chunk(&mut info, &mut bytes, &[b"a".as_slice(), b"b".as_slice()], Encryption::Plaintext, b"");
        info.data_entries[0].uncompressed_size = u64::MAX;
        add_file(&mut info, "huge", &ids);
        let plan = planner::plan(&info, &extract_mode()).unwrap();
        assert_eq!(records(&info, &plan)[0].size, u64::MAX);
        let err = extract(&info, bytes, &extract_mode()).err();
        assert!(matches!(err, Some(InnoError::Format(_))));
    }

    #[test]
    fn test_stored_range_past_chunk_end() {
        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
        std::io::Write::write_all(&mut enc, b"abc").unwrap();
        let deflated = enc.finish().unwrap();
        let mut info = Info::default();
        let mut bytes = PREFIX.to_vec();
        let ids = add_chunk(&mut info, &mut bytes, &[b"xx".as_slice(), deflated.as_slice()], Encryption::Plaintext, b"");
        let data = &mut info.data_entries[ids[1] as usize];
        data.file.size = u64::MAX;
        data.file.filter = Filter::Zlib;
        data.file.checksum = Checksum::compute(ChecksumType::Crc32, &[b"abc".as_slice()]);
        add_file(&mut info, "z", &ids[1..]);
        let err = extract(&info, bytes, &extract_mode()).err();
        assert!(matches!(err, Some(InnoError::Chunk(_))));
    }

    #[test]
    fn test_encrypted_files_need_the_password() {
        let mut info = Info {
            codepage: CP_WINDOWS1252,
            ..Default::default()
        };
        let encoded = info.encode_password("secret");
        let salt = b"PasswordCheckHash01234567".to_vec();
        info.header.password.checksum =
            Checksum::compute(ChecksumType::Sha1, &[salt.as_slice(), encoded.as_slice()]);
        info.header.password.salt = salt;
        let mut bytes = PREFIX.to_vec();
        let ids = add_chunk(&mut info, &mut bytes, &[b"top secret".as_slice()], Encryption::Arc4Sha1, &encoded);
        add_file(&mut info, "s.txt", &ids);

        let mut config = extract_mode();
        let err = extract(&info, bytes.clone(), &config).err();
        assert!(matches!(err, Some(InnoError::Password(_))));

        config.password = Some("wrong".into());
        let err = extract(&info, bytes.clone(), &config).err();
        assert!(matches!(err, Some(InnoError::Password(_))));

        config.password = Some("secret".into());
        let target = extract(&info, bytes, &config).unwrap();
        assert_eq!(target.files.borrow()["s.txt"], b"top secret");
    }

    #[test]
    fn test_straddling_external_slices() {
        let dir = tempfile::tempdir().unwrap();
        let content = b"split across two slice files".as_slice();
        let chunk = encode_chunk(content, Compression::Stored, Encryption::Plaintext, b"");
        let (first, second) = chunk.split_at(10);
        write_slice(dir.path(), "setup-1.bin", first);
        write_slice(dir.path(), "setup-2.bin", second);

        let mut info = Info::default();
        info.data_entries.push(DataEntry {
            chunk: Chunk {
                offset: 12,
                size: content.len() as u64,
                last_slice: 1,
                ..Default::default()
            },
            file: FileLocation {
                size: content.len() as u64,
                checksum: Checksum::compute(ChecksumType::Crc32, &[content]),
                ..Default::default()
            },
            uncompressed_size: content.len() as u64,
            ..Default::default()
        });
        add_file(&mut info, "{app}\\split.txt", &[0]);

        let config = extract_mode();
        let plan = planner::plan(&info, &config).unwrap();
        let mut slices = SliceReader::external(dir.path(), vec!["setup".into()], 1);
        let mut target = MemoryTarget::default();
        extract_files(&info, &mut slices, &plan, &config, &mut target).unwrap();
        assert_eq!(target.files.borrow()["app/split.txt"], content);

        assert!(!slices.seek(0, 12 + 11).unwrap());
    }
}
