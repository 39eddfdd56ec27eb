//! Shared primitives for decoding versioned setup records.
use super::version::Version;
use crate::ext::io::*;
use crate::stream::chunk::Compression;
use crate::utils::encoding::*;
use std::io::{self, Read};

/// Per-attempt decoding state.
pub struct LoadContext {
    pub version: Version,
    /// Code page of non-Unicode strings.
    pub codepage: Codepage,
    /// Code pages of the decoded languages, by language index.
    pub language_codepages: Vec<Codepage>,
    /// Compression method declared by the header, once it has been read.
    pub compression: Compression,
    /// Problems that did not stop decoding.
    pub warnings: Vec<String>,
}

impl LoadContext {
    pub fn new(version: Version) -> Self {
        let codepage = if version.is_unicode() {
            CP_UTF16LE
        } else {
            CP_WINDOWS1252
        };
        LoadContext {
            version,
            codepage,
            language_codepages: Vec::new(),
            compression: Compression::Unknown,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn since(&self, value: u32) -> bool {
        self.version.value >= value
    }

    pub fn before(&self, value: u32) -> bool {
        self.version.value < value
    }

    pub fn between(&self, since: u32, until: u32) -> bool {
        self.version.value >= since && self.version.value < until
    }

    pub fn isx_since(&self, value: u32) -> bool {
        self.version.is_isx() && self.version.value >= value
    }

    pub fn bits(&self) -> u32 {
        self.version.bits()
    }

    /// Code page used for a message or license text tied to `language`
    /// (negative for "all languages").
    pub fn language_codepage(&self, language: i32) -> Codepage {
        if self.version.is_unicode() {
            return CP_UTF16LE;
        }
        usize::try_from(language)
            .ok()
            .and_then(|i| self.language_codepages.get(i).copied())
            .unwrap_or(self.codepage)
    }

    /// Reads a length-prefixed string stored in the archive's string encoding.
    pub fn read_string<R: Read + ?Sized>(&self, reader: &mut R) -> io::Result<String> {
        let raw = read_binary(reader)?;
        Ok(decode_codepage(self.codepage, &raw))
    }

    /// Like [`LoadContext::read_string`], but keeps the bytes around so the
    /// value can be decoded again once the final code page is known.
    pub fn read_text<R: Read + ?Sized>(&self, reader: &mut R) -> io::Result<Text> {
        let raw = read_binary(reader)?;
        Ok(Text::new(raw, self.version.is_unicode()))
    }

    /// Reads a string that is never stored as UTF-16.
    pub fn read_ansi_text<R: Read + ?Sized>(&self, reader: &mut R) -> io::Result<Text> {
        let raw = read_binary(reader)?;
        Ok(Text::new(raw, false))
    }

    /// Reads a Delphi set. Only flags whose gate applies to this version
    /// occupy a bit; bits are numbered from the least significant bit of
    /// the first byte.
    pub fn read_flags<R: Read + ?Sized, F: bitflags::Flags + Copy>(
        &self,
        reader: &mut R,
        table: &[(F, Gate)],
    ) -> io::Result<F> {
        let mut result = F::empty();
        let mut byte = 0u8;
        let mut bit = 0usize;
        let mut bytes = 0usize;
        for (flag, gate) in table {
            if !gate.applies(&self.version) {
                continue;
            }
            if bit % 8 == 0 {
                byte = reader.read_u8()?;
                bytes += 1;
            }
            if byte & (1 << (bit % 8)) != 0 {
                result.insert(*flag);
            }
            bit += 1;
        }
        // 32-bit Delphi stores three byte sets in a dword.
        if bytes == 3 && self.bits() != 16 {
            reader.read_u8()?;
        }
        Ok(result)
    }

    /// Reads a one byte enum ordinal and maps it through `table`. Unknown
    /// ordinals are recorded as warnings and decode as `T::default()`.
    pub fn read_enum<R: Read + ?Sized, T: Copy + Default>(
        &mut self,
        reader: &mut R,
        table: &[T],
        what: &str,
    ) -> io::Result<T> {
        let value = reader.read_u8()?;
        match table.get(value as usize) {
            Some(v) => Ok(*v),
            None => {
                self.warn(format!("unexpected {} value: {}", what, value));
                Ok(T::default())
            }
        }
    }

    /// Reads a one byte enum ordinal for an enum with a fixed layout.
    pub fn read_stored<R: Read + ?Sized, T: TryFrom<u8> + Default>(
        &mut self,
        reader: &mut R,
        what: &str,
    ) -> io::Result<T> {
        let value = reader.read_u8()?;
        match T::try_from(value) {
            Ok(v) => Ok(v),
            Err(_) => {
                self.warn(format!("unexpected {} value: {}", what, value));
                Ok(T::default())
            }
        }
    }
}

/// Version predicate deciding whether a field or flag is stored.
#[derive(Clone, Copy, Debug)]
pub struct Gate {
    since: u32,
    until: u32,
    isx_since: Option<u32>,
    skip_isx: bool,
    bits32_only: bool,
    ansi_only: bool,
}

impl Gate {
    pub const ALWAYS: Gate = Gate::since(0);

    pub const fn since(version: u32) -> Self {
        Gate {
            since: version,
            until: u32::MAX,
            isx_since: None,
            skip_isx: false,
            bits32_only: false,
            ansi_only: false,
        }
    }

    pub const fn before(version: u32) -> Self {
        Gate::range(0, version)
    }

    pub const fn range(since: u32, until: u32) -> Self {
        Gate {
            since,
            until,
            isx_since: None,
            skip_isx: false,
            bits32_only: false,
            ansi_only: false,
        }
    }

    /// Also applies to ISX builds from `version` on.
    pub const fn or_isx(mut self, version: u32) -> Self {
        self.isx_since = Some(version);
        self
    }

    /// Never applies to ISX builds.
    pub const fn not_isx(mut self) -> Self {
        self.skip_isx = true;
        self
    }

    pub const fn bits32(mut self) -> Self {
        self.bits32_only = true;
        self
    }

    pub const fn ansi(mut self) -> Self {
        self.ansi_only = true;
        self
    }

    pub fn applies(&self, version: &Version) -> bool {
        let value = version.value;
        let in_range = value >= self.since && value < self.until;
        let isx = self
            .isx_since
            .is_some_and(|since| version.is_isx() && value >= since);
        if !(in_range || isx) {
            return false;
        }
        if self.skip_isx && version.is_isx() {
            return false;
        }
        if self.bits32_only && version.bits() == 16 {
            return false;
        }
        if self.ansi_only && version.is_unicode() {
            return false;
        }
        true
    }
}

/// A stored string whose final decoding depends on a code page that is
/// only known after the languages have been read.
#[derive(Clone, Debug, Default)]
pub struct Text {
    raw: Vec<u8>,
    wide: bool,
    value: String,
}

impl Text {
    pub fn new(raw: Vec<u8>, wide: bool) -> Self {
        let codepage = if wide { CP_UTF16LE } else { CP_WINDOWS1252 };
        let value = decode_codepage(codepage, &raw);
        Text { raw, wide, value }
    }

    /// Re-decodes narrow strings with `codepage`. UTF-16 strings are kept,
    /// and narrow strings never switch to UTF-16.
    pub fn decode(&mut self, codepage: Codepage) {
        if !self.wide && codepage != CP_UTF16LE {
            self.value = decode_codepage(codepage, &self.raw);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl From<&str> for Text {
    fn from(value: &str) -> Self {
        Text {
            raw: value.as_bytes().to_vec(),
            wide: false,
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for Text {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// Reads a u32 length prefixed byte string.
pub fn read_binary<R: Read + ?Sized>(reader: &mut R) -> io::Result<Vec<u8>> {
    let len = reader.read_u32()? as u64;
    let mut data = Vec::new();
    (&mut *reader).take(len).read_to_end(&mut data)?;
    if (data.len() as u64) != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("string of {} bytes truncated after {}", len, data.len()),
        ));
    }
    Ok(data)
}

/// Skips a u32 length prefixed byte string.
pub fn skip_binary<R: Read + ?Sized>(reader: &mut R) -> io::Result<()> {
    let len = reader.read_u32()? as u64;
    reader.skip_bytes(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inno_version;
    use crate::setup::version::VersionFlags;
    use bitflags::bitflags;

    bitflags! {
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        struct TestFlags: u32 {
            const A = 1 << 0;
            const B = 1 << 1;
            const C = 1 << 2;
        }
    }

    fn ctx(value: u32, flags: VersionFlags) -> LoadContext {
        LoadContext::new(Version::new(value, flags))
    }

    #[test]
    fn test_gates() {
        let v = Version::new(inno_version!(3, 0, 4), VersionFlags::ISX);
        assert!(Gate::since(inno_version!(4, 0, 0))
            .or_isx(inno_version!(3, 0, 3))
            .applies(&v));
        assert!(!Gate::since(inno_version!(4, 0, 0)).applies(&v));
        assert!(Gate::before(inno_version!(3, 0, 5)).applies(&v));
        let v16 = Version::new(inno_version!(1, 2, 10), VersionFlags::BITS16);
        assert!(!Gate::ALWAYS.bits32().applies(&v16));
        let vu = Version::new(inno_version!(5, 3, 0), VersionFlags::UNICODE);
        assert!(!Gate::ALWAYS.ansi().applies(&vu));
    }

    #[test]
    fn test_flags_skip_gated_bits() {
        let c = ctx(inno_version!(4, 0, 0), VersionFlags::empty());
        let table = [
            (TestFlags::A, Gate::ALWAYS),
            (TestFlags::B, Gate::since(inno_version!(5, 0, 0))),
            (TestFlags::C, Gate::ALWAYS),
        ];
        // B is not stored, so C is bit 1.
        let flags = c.read_flags(&mut &[0b10u8][..], &table).unwrap();
        assert_eq!(flags, TestFlags::C);
    }

    #[test]
    fn test_three_byte_sets_are_padded() {
        let table: Vec<(TestFlags, Gate)> = (0..20)
            .map(|i| (if i == 19 { TestFlags::B } else { TestFlags::A }, Gate::ALWAYS))
            .collect();
        let data = [0u8, 0, 0b1000, 0xee, 0x42];
        let c = ctx(inno_version!(5, 0, 0), VersionFlags::empty());
        let mut r = &data[..];
        let flags = c.read_flags(&mut r, &table).unwrap();
        assert_eq!(flags, TestFlags::B);
        assert_eq!(r, &[0x42]);

        let c16 = ctx(inno_version!(1, 2, 10), VersionFlags::BITS16);
        let mut r = &data[..];
        c16.read_flags(&mut r, &table).unwrap();
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_unknown_enum_warns() {
        let mut c = ctx(inno_version!(5, 0, 0), VersionFlags::empty());
        let v: u32 = c.read_enum(&mut &[7u8][..], &[10, 20], "test").unwrap();
        assert_eq!(v, 0);
        assert_eq!(c.warnings.len(), 1);
        let v: u32 = c.read_enum(&mut &[1u8][..], &[10, 20], "test").unwrap();
        assert_eq!(v, 20);
    }

    #[test]
    fn test_text_redecode() {
        let mut data = vec![1u8, 0, 0, 0, 0xe4];
        let c = ctx(inno_version!(5, 0, 0), VersionFlags::empty());
        let mut text = c.read_text(&mut &data[..]).unwrap();
        assert_eq!(text.as_str(), "ä");
        text.decode(1251);
        assert_eq!(text.as_str(), "д");

        data = vec![2, 0, 0, 0, b'h', 0];
        let cu = ctx(inno_version!(5, 3, 0), VersionFlags::UNICODE);
        let mut text = cu.read_text(&mut &data[..]).unwrap();
        text.decode(1251);
        assert_eq!(text.as_str(), "h");
    }

    #[test]
    fn test_truncated_binary() {
        let data = [10u8, 0, 0, 0, 1, 2];
        assert!(read_binary(&mut &data[..]).is_err());
    }
}
