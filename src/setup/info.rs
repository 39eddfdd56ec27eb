//! Everything stored in the setup header streams, decoded for one archive.
use super::component::{ComponentEntry, SetupTypeEntry, TaskEntry};
use super::data::DataEntry;
use super::delete::DeleteEntry;
use super::directory::DirectoryEntry;
use super::entry::{EntryKind, load_entries};
use super::file::FileEntry;
use super::header::{Header, HeaderFlags};
use super::icon::IconEntry;
use super::ini::IniEntry;
use super::language::{LanguageEntry, select_codepage};
use super::message::{MessageEntry, PermissionEntry};
use super::reader::{LoadContext, read_binary};
use super::registry::RegistryEntry;
use super::run::RunEntry;
use super::version::Version;
use crate::error::{InnoError, Result};
use crate::ext::io::*;
use crate::inno_version;
use crate::stream::block::{check_is_end, open_block};
use crate::stream::chunk::Compression;
use crate::utils::checksum::{Checksum, ChecksumType};
use crate::utils::encoding::*;
use std::io::{Read, Seek, SeekFrom};

#[derive(Clone, Debug, Default)]
pub struct Info {
    /// The version the archive was decoded with. This can be newer than the
    /// version named in the banner.
    pub version: Version,
    /// Code page of narrow strings.
    pub codepage: Codepage,
    pub header: Header,
    pub languages: Vec<LanguageEntry>,
    pub messages: Vec<MessageEntry>,
    pub permissions: Vec<PermissionEntry>,
    pub types: Vec<SetupTypeEntry>,
    pub components: Vec<ComponentEntry>,
    pub tasks: Vec<TaskEntry>,
    pub directories: Vec<DirectoryEntry>,
    pub files: Vec<FileEntry>,
    pub icons: Vec<IconEntry>,
    pub ini_entries: Vec<IniEntry>,
    pub registry_entries: Vec<RegistryEntry>,
    pub delete_entries: Vec<DeleteEntry>,
    pub uninstall_delete_entries: Vec<DeleteEntry>,
    pub run_entries: Vec<RunEntry>,
    pub uninstall_run_entries: Vec<RunEntry>,
    pub data_entries: Vec<DataEntry>,
    pub wizard_images: Vec<Vec<u8>>,
    pub wizard_images_small: Vec<Vec<u8>>,
    pub decompressor_dll: Vec<u8>,
    pub decrypt_dll: Vec<u8>,
    /// Problems that were tolerated while decoding.
    pub warnings: Vec<String>,
}

impl Info {
    /// Decodes the setup headers starting at the version banner.
    ///
    /// Some installers did not bump the stored version when the format
    /// changed, so unknown and ambiguous versions are retried with each
    /// newer known version. A clean decode wins; otherwise the first decode
    /// that only produced warnings is used, and otherwise the first error is
    /// returned.
    pub fn load<R: Read + Seek>(reader: &mut R, forced_codepage: Option<Codepage>) -> Result<Self> {
        let version = Version::load(reader)?;
        log::debug!("Setup data version: {}", version);
        let start = reader.stream_position()?;
        let ambiguous = !version.known || version.is_ambiguous();

        let mut candidate = version;
        let mut fallback: Option<Info> = None;
        let mut first_error: Option<InnoError> = None;
        loop {
            reader.seek(SeekFrom::Start(start))?;
            match Self::try_load(reader, candidate, forced_codepage) {
                Ok(info) if info.warnings.is_empty() => {
                    if candidate.value != version.value {
                        log::info!("Decoded setup data as version {}", candidate);
                    }
                    return Ok(info);
                }
                Ok(info) => {
                    log::debug!(
                        "Version {} decoded with {} warnings",
                        candidate,
                        info.warnings.len()
                    );
                    if fallback.is_none() {
                        fallback = Some(info);
                    }
                }
                Err(e) => {
                    log::debug!("Version {} failed: {}", candidate, e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
            let next = candidate.next();
            if !ambiguous || next == 0 {
                break;
            }
            candidate.value = next;
        }

        if let Some(info) = fallback {
            for warning in &info.warnings {
                crate::COUNTER.inc_warning();
                log::warn!("{}", warning);
            }
            return Ok(info);
        }
        Err(first_error.unwrap_or_else(|| InnoError::Version(version.to_string())))
    }

    fn try_load<R: Read>(
        reader: &mut R,
        version: Version,
        forced_codepage: Option<Codepage>,
    ) -> Result<Self> {
        let mut ctx = LoadContext::new(version);
        let mut info = Info {
            version,
            ..Default::default()
        };

        let mut block = open_block(&mut *reader, &version)?;
        let mut header = Header::load(&mut block, &mut ctx)?;
        ctx.compression = header.compression;
        let counts = header.counts.clone();

        let mut languages: Vec<LanguageEntry> =
            load_entries(&mut block, &mut ctx, EntryKind::Language, counts.languages)?;
        if !version.is_unicode() {
            ctx.codepage = select_codepage(&languages, forced_codepage);
            header.decode(ctx.codepage);
            for language in &mut languages {
                language.decode(ctx.codepage);
            }
        }
        ctx.language_codepages = languages.iter().map(|l| l.codepage).collect();
        info.codepage = ctx.codepage;
        info.header = header;
        info.languages = languages;

        if version.value < inno_version!(4, 0, 0) {
            info.load_wizard_and_decompressor(&mut block, &ctx)?;
        }

        let b = &mut block;
        info.messages = load_entries(b, &mut ctx, EntryKind::Message, counts.messages)?;
        info.permissions = load_entries(b, &mut ctx, EntryKind::Permission, counts.permissions)?;
        info.types = load_entries(b, &mut ctx, EntryKind::Type, counts.types)?;
        info.components = load_entries(b, &mut ctx, EntryKind::Component, counts.components)?;
        info.tasks = load_entries(b, &mut ctx, EntryKind::Task, counts.tasks)?;
        info.directories = load_entries(b, &mut ctx, EntryKind::Directory, counts.directories)?;
        info.files = load_entries(b, &mut ctx, EntryKind::File, counts.files)?;
        info.icons = load_entries(b, &mut ctx, EntryKind::Icon, counts.icons)?;
        info.ini_entries = load_entries(b, &mut ctx, EntryKind::Ini, counts.ini_entries)?;
        info.registry_entries =
            load_entries(b, &mut ctx, EntryKind::Registry, counts.registry_entries)?;
        info.delete_entries = load_entries(b, &mut ctx, EntryKind::Delete, counts.delete_entries)?;
        info.uninstall_delete_entries = load_entries(
            b,
            &mut ctx,
            EntryKind::UninstallDelete,
            counts.uninstall_delete_entries,
        )?;
        info.run_entries = load_entries(b, &mut ctx, EntryKind::Run, counts.run_entries)?;
        info.uninstall_run_entries = load_entries(
            b,
            &mut ctx,
            EntryKind::UninstallRun,
            counts.uninstall_run_entries,
        )?;

        if version.value >= inno_version!(4, 0, 0) {
            info.load_wizard_and_decompressor(&mut block, &ctx)?;
        }
        check_is_end(&mut block, "primary header stream")?;
        drop(block);

        let mut block = open_block(&mut *reader, &version)?;
        info.data_entries =
            load_entries(&mut block, &mut ctx, EntryKind::Data, counts.data_entries)?;
        check_is_end(&mut block, "secondary header stream")?;

        for (i, file) in info.files.iter().enumerate() {
            if file.location as usize >= info.data_entries.len() && file.location != u32::MAX {
                log::debug!(
                    "File entry {} ({}) has no data entry {}",
                    i,
                    file.destination,
                    file.location
                );
            }
        }

        info.warnings = std::mem::take(&mut ctx.warnings);
        Ok(info)
    }

    fn load_wizard_and_decompressor<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        ctx: &LoadContext,
    ) -> Result<()> {
        self.wizard_images = load_wizard_images(reader, ctx)?;
        if ctx.since(inno_version!(2, 0, 0)) || ctx.version.is_isx() {
            self.wizard_images_small = load_wizard_images(reader, ctx)?;
        }
        let compression = self.header.compression;
        let value = ctx.version.value;
        if compression == Compression::BZip2
            || (compression == Compression::Lzma1 && value == inno_version!(4, 1, 5))
            || (compression == Compression::Zlib && value >= inno_version!(4, 2, 6))
        {
            self.decompressor_dll = read_binary(reader)?;
        }
        if self.header.options.contains(HeaderFlags::ENCRYPTION_USED) {
            self.decrypt_dll = read_binary(reader)?;
        }
        Ok(())
    }

    /// Encodes a password the way the installer hashes it.
    pub fn encode_password(&self, password: &str) -> Vec<u8> {
        if self.version.is_unicode() {
            password.encode_utf16().flat_map(|c| c.to_le_bytes()).collect()
        } else {
            encode_codepage(self.codepage, password)
        }
    }

    /// Checks an encoded password against the stored password hash.
    pub fn check_password(&self, encoded: &[u8]) -> bool {
        let expected = &self.header.password.checksum;
        if expected.kind() == ChecksumType::None {
            return true;
        }
        let actual = Checksum::compute(expected.kind(), &[self.header.password.salt.as_slice(), encoded]);
        actual == *expected
    }

    pub fn has_password(&self) -> bool {
        self.header.options.contains(HeaderFlags::PASSWORD)
    }

    /// Whether any data entry is stored encrypted.
    pub fn has_encrypted_data(&self) -> bool {
        self.data_entries
            .iter()
            .any(|d| d.chunk.encryption != crate::stream::chunk::Encryption::Plaintext)
    }
}

fn load_wizard_images<R: Read + ?Sized>(reader: &mut R, ctx: &LoadContext) -> Result<Vec<Vec<u8>>> {
    let count = if ctx.since(inno_version!(5, 6, 0)) {
        reader.read_u32()? as usize
    } else {
        1
    };
    let mut images = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        images.push(read_binary(reader)?);
    }
    if ctx.before(inno_version!(5, 6, 0)) && images.first().is_some_and(|i| i.is_empty()) {
        images.clear();
    }
    Ok(images)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::setup::data::tests::data_5_1_0;
    use crate::setup::file::tests::file_5_1_0;
    use crate::setup::header::tests::header_5_1_0;
    use crate::stream::block::tests::encode_stored_block;
    use std::io::Cursor;

    /// A 5.1.0 setup header stream, starting at the version banner, holding
    /// the given encoded file and data entries.
    pub(crate) fn setup_5_1_0(files: &[Vec<u8>], data: &[Vec<u8>]) -> Vec<u8> {
        let mut out = b"Inno Setup Setup Data (5.1.0)".to_vec();
        out.resize(64, 0);
        let mut primary = header_5_1_0("Test App", files.len() as u32, data.len() as u32, 0);
        for file in files {
            primary.extend_from_slice(file);
        }
        // no wizard images
        primary.extend_from_slice(&0u32.to_le_bytes());
        primary.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&encode_stored_block(&primary));
        out.extend_from_slice(&encode_stored_block(&data.concat()));
        out
    }

    #[test]
    fn test_load_minimal_setup() {
        let setup = setup_5_1_0(
            &[file_5_1_0("{app}\\readme.txt", 0, 0)],
            &[data_5_1_0(0, 0, 100, 104, [0; 16], 0)],
        );
        let info = Info::load(&mut Cursor::new(setup), None).unwrap();
        assert_eq!(info.version.value, inno_version!(5, 1, 0));
        assert_eq!(info.header.app_name.as_str(), "Test App");
        assert_eq!(info.files.len(), 1);
        assert_eq!(info.files[0].destination, "{app}\\readme.txt");
        assert_eq!(info.data_entries.len(), 1);
        assert_eq!(info.data_entries[0].file.size, 100);
        assert_eq!(info.codepage, CP_WINDOWS1252);
        assert!(info.wizard_images.is_empty());
        assert!(info.warnings.is_empty());
    }

    #[test]
    fn test_trailing_bytes_are_an_error() {
        let mut out = b"Inno Setup Setup Data (5.1.0)".to_vec();
        out.resize(64, 0);
        let mut primary = header_5_1_0("Test App", 0, 0, 0);
        primary.extend_from_slice(&[0u8; 8]);
        primary.push(0xaa);
        out.extend_from_slice(&encode_stored_block(&primary));
        out.extend_from_slice(&encode_stored_block(&[]));
        assert!(matches!(
            Info::load(&mut Cursor::new(out), None),
            Err(InnoError::Format(_))
        ));
    }

    fn set_banner(setup: &mut [u8], banner: &str) {
        let mut bytes = banner.as_bytes().to_vec();
        bytes.resize(64, 0);
        setup[..64].copy_from_slice(&bytes);
    }

    #[test]
    fn test_unknown_version_retries_newer_layouts() {
        // 5.0.x headers have no architecture bytes, so the 5.1.0 layout
        // only decodes as 5.1.0.
        let mut setup = setup_5_1_0(&[], &[]);
        set_banner(&mut setup, "Inno Setup Setup Data (5.0.9)");
        let info = Info::load(&mut Cursor::new(setup), None).unwrap();
        assert_eq!(info.version.value, inno_version!(5, 1, 0));
        assert_eq!(info.header.app_name.as_str(), "Test App");
        assert!(info.warnings.is_empty());
    }

    #[test]
    fn test_first_warning_only_decode_is_kept() {
        let mut out = Vec::new();
        out.resize(64, 0);
        set_banner(&mut out, "Inno Setup Setup Data (5.1.1)");
        let mut primary = header_5_1_0("Test App", 0, 0, 9);
        primary.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&encode_stored_block(&primary));
        out.extend_from_slice(&encode_stored_block(&[]));
        let info = Info::load(&mut Cursor::new(out), None).unwrap();
        assert_eq!(info.version.value, inno_version!(5, 1, 1));
        assert_eq!(info.header.compression, Compression::Unknown);
        assert_eq!(info.warnings.len(), 1);
    }

    #[test]
    fn test_first_error_is_returned() {
        let mut out = Vec::new();
        out.resize(64, 0);
        set_banner(&mut out, "Inno Setup Setup Data (5.1.1)");
        let mut primary = header_5_1_0("Test App", 0, 0, 0);
        primary.extend_from_slice(&[0u8; 8]);
        primary.extend_from_slice(&[0xaa; 64]);
        out.extend_from_slice(&encode_stored_block(&primary));
        out.extend_from_slice(&encode_stored_block(&[]));
        match Info::load(&mut Cursor::new(out), None) {
            Err(InnoError::Format(msg)) => assert!(msg.contains("primary header stream"), "{}", msg),
            other => panic!("unexpected result: {:?}", other.map(|i| i.version.value)),
        }
    }

    #[test]
    fn test_password_check() {
        let mut info = Info {
            codepage: CP_WINDOWS1252,
            ..Default::default()
        };
        let salt = b"PasswordCheckHash12345678".to_vec();
        let encoded = info.encode_password("secret");
        info.header.password.checksum =
            Checksum::compute(ChecksumType::Md5, &[salt.as_slice(), encoded.as_slice()]);
        info.header.password.salt = salt;
        assert!(info.check_password(&encoded));
        assert!(!info.check_password(&info.encode_password("Secret")));
    }
}
