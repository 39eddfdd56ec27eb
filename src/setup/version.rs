//! Setup data version banners.
use crate::error::{InnoError, Result};
use crate::inno_version;
use bitflags::bitflags;
use std::fmt;
use std::io::Read;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct VersionFlags: u8 {
        const BITS16 = 1 << 0;
        const UNICODE = 1 << 1;
        const ISX = 1 << 2;
    }
}

/// A resolved setup data version.
///
/// Ordering only looks at the packed value, never at the flags.
#[derive(Clone, Copy, Debug, Default)]
pub struct Version {
    pub value: u32,
    pub flags: VersionFlags,
    /// Whether the banner matched a catalogued version.
    pub known: bool,
}

struct KnownVersion {
    banner: &'static [u8],
    value: u32,
    flags: VersionFlags,
}

const fn known(banner: &'static [u8], value: u32, flags: VersionFlags) -> KnownVersion {
    KnownVersion {
        banner,
        value,
        flags,
    }
}

const NONE: VersionFlags = VersionFlags::empty();
const U: VersionFlags = VersionFlags::UNICODE;
const ISX: VersionFlags = VersionFlags::ISX;

const LEGACY_VERSIONS: &[KnownVersion] = &[
    known(b"i1.2.10--16\x1a", inno_version!(1, 2, 10), VersionFlags::BITS16),
    known(b"i1.2.10--32\x1a", inno_version!(1, 2, 10), NONE),
];

// Sorted by value. Rows sharing a banner resolve to the first one; the later
// rows are only reachable through `Version::next`.
const VERSIONS: &[KnownVersion] = &[
    known(b"Inno Setup Setup Data (1.3.3)", inno_version!(1, 3, 3), NONE),
    known(b"Inno Setup Setup Data (1.3.9)", inno_version!(1, 3, 9), NONE),
    known(b"Inno Setup Setup Data (1.3.10)", inno_version!(1, 3, 10), NONE),
    known(b"Inno Setup Setup Data (1.3.10) with ISX (1.3.10)", inno_version!(1, 3, 10), ISX),
    known(b"Inno Setup Setup Data (1.3.12) with ISX (1.3.12.1)", inno_version!(1, 3, 12), ISX),
    known(b"Inno Setup Setup Data (1.3.21)", inno_version!(1, 3, 21), NONE),
    known(b"Inno Setup Setup Data (1.3.21) with ISX (1.3.17)", inno_version!(1, 3, 21), ISX),
    known(b"Inno Setup Setup Data (1.3.24)", inno_version!(1, 3, 24), NONE),
    known(b"Inno Setup Setup Data (1.3.21) with ISX (1.3.24)", inno_version!(1, 3, 24), ISX),
    known(b"Inno Setup Setup Data (1.3.25)", inno_version!(1, 3, 25), NONE),
    known(b"Inno Setup Setup Data (1.3.25) with ISX (1.3.25)", inno_version!(1, 3, 25), ISX),
    known(b"Inno Setup Setup Data (2.0.0)", inno_version!(2, 0, 0), NONE),
    known(b"Inno Setup Setup Data (2.0.1)", inno_version!(2, 0, 1), NONE),
    known(b"Inno Setup Setup Data (2.0.2)", inno_version!(2, 0, 2), NONE),
    known(b"Inno Setup Setup Data (2.0.5)", inno_version!(2, 0, 5), NONE),
    known(b"Inno Setup Setup Data (2.0.6a)", inno_version!(2, 0, 6), NONE),
    known(b"Inno Setup Setup Data (2.0.6a) with ISX (2.0.3)", inno_version!(2, 0, 6), ISX),
    known(b"Inno Setup Setup Data (2.0.7)", inno_version!(2, 0, 7), NONE),
    known(b"Inno Setup Setup Data (2.0.8)", inno_version!(2, 0, 8), NONE),
    known(b"Inno Setup Setup Data (2.0.8) with ISX (2.0.3)", inno_version!(2, 0, 8), ISX),
    known(b"Inno Setup Setup Data (2.0.8) with ISX (2.0.10)", inno_version!(2, 0, 10), ISX),
    known(b"Inno Setup Setup Data (2.0.11)", inno_version!(2, 0, 11), NONE),
    known(b"Inno Setup Setup Data (2.0.11) with ISX (2.0.11)", inno_version!(2, 0, 11), ISX),
    known(b"Inno Setup Setup Data (2.0.17)", inno_version!(2, 0, 17), NONE),
    known(b"Inno Setup Setup Data (2.0.17) with ISX (2.0.11)", inno_version!(2, 0, 17), ISX),
    known(b"Inno Setup Setup Data (2.0.18)", inno_version!(2, 0, 18), NONE),
    known(b"Inno Setup Setup Data (2.0.18) with ISX (2.0.11)", inno_version!(2, 0, 18), ISX),
    known(b"Inno Setup Setup Data (3.0.0a)", inno_version!(3, 0, 0), NONE),
    known(b"Inno Setup Setup Data (3.0.0a) with ISX (3.0.0)", inno_version!(3, 0, 0), ISX),
    known(b"Inno Setup Setup Data (3.0.1)", inno_version!(3, 0, 1), NONE),
    known(b"Inno Setup Setup Data (3.0.1) with ISX (3.0.0)", inno_version!(3, 0, 1), ISX),
    known(b"Inno Setup Setup Data (3.0.3)", inno_version!(3, 0, 3), NONE),
    known(b"Inno Setup Setup Data (3.0.3) with ISX (3.0.3)", inno_version!(3, 0, 3), ISX),
    known(b"Inno Setup Setup Data (3.0.4)", inno_version!(3, 0, 4), NONE),
    known(b"My Inno Setup Extensions Setup Data (3.0.4)", inno_version!(3, 0, 4), ISX),
    known(b"Inno Setup Setup Data (3.0.5)", inno_version!(3, 0, 5), NONE),
    known(b"My Inno Setup Extensions Setup Data (3.0.6.1)", inno_version!(3, 0, 6, 1), ISX),
    known(b"Inno Setup Setup Data (4.0.0a)", inno_version!(4, 0, 0), NONE),
    known(b"Inno Setup Setup Data (4.0.1)", inno_version!(4, 0, 1), NONE),
    known(b"Inno Setup Setup Data (4.0.3)", inno_version!(4, 0, 3), NONE),
    known(b"Inno Setup Setup Data (4.0.5)", inno_version!(4, 0, 5), NONE),
    known(b"Inno Setup Setup Data (4.0.9)", inno_version!(4, 0, 9), NONE),
    known(b"Inno Setup Setup Data (4.0.10)", inno_version!(4, 0, 10), NONE),
    known(b"Inno Setup Setup Data (4.0.11)", inno_version!(4, 0, 11), NONE),
    known(b"Inno Setup Setup Data (4.1.0)", inno_version!(4, 1, 0), NONE),
    known(b"Inno Setup Setup Data (4.1.2)", inno_version!(4, 1, 2), NONE),
    known(b"Inno Setup Setup Data (4.1.3)", inno_version!(4, 1, 3), NONE),
    known(b"Inno Setup Setup Data (4.1.4)", inno_version!(4, 1, 4), NONE),
    known(b"Inno Setup Setup Data (4.1.5)", inno_version!(4, 1, 5), NONE),
    known(b"Inno Setup Setup Data (4.1.6)", inno_version!(4, 1, 6), NONE),
    known(b"Inno Setup Setup Data (4.1.8)", inno_version!(4, 1, 8), NONE),
    known(b"Inno Setup Setup Data (4.2.0)", inno_version!(4, 2, 0), NONE),
    known(b"Inno Setup Setup Data (4.2.1)", inno_version!(4, 2, 1), NONE),
    known(b"Inno Setup Setup Data (4.2.2)", inno_version!(4, 2, 2), NONE),
    known(b"Inno Setup Setup Data (4.2.3)", inno_version!(4, 2, 3), NONE),
    known(b"Inno Setup Setup Data (4.2.3)", inno_version!(4, 2, 4), NONE),
    known(b"Inno Setup Setup Data (4.2.5)", inno_version!(4, 2, 5), NONE),
    known(b"Inno Setup Setup Data (4.2.6)", inno_version!(4, 2, 6), NONE),
    known(b"Inno Setup Setup Data (5.0.0)", inno_version!(5, 0, 0), NONE),
    known(b"Inno Setup Setup Data (5.0.1)", inno_version!(5, 0, 1), NONE),
    known(b"Inno Setup Setup Data (5.0.3)", inno_version!(5, 0, 3), NONE),
    known(b"Inno Setup Setup Data (5.0.4)", inno_version!(5, 0, 4), NONE),
    known(b"Inno Setup Setup Data (5.1.0)", inno_version!(5, 1, 0), NONE),
    known(b"Inno Setup Setup Data (5.1.2)", inno_version!(5, 1, 2), NONE),
    known(b"Inno Setup Setup Data (5.1.7)", inno_version!(5, 1, 7), NONE),
    known(b"Inno Setup Setup Data (5.1.10)", inno_version!(5, 1, 10), NONE),
    known(b"Inno Setup Setup Data (5.1.13)", inno_version!(5, 1, 13), NONE),
    known(b"Inno Setup Setup Data (5.2.0)", inno_version!(5, 2, 0), NONE),
    known(b"Inno Setup Setup Data (5.2.1)", inno_version!(5, 2, 1), NONE),
    known(b"Inno Setup Setup Data (5.2.3)", inno_version!(5, 2, 3), NONE),
    known(b"Inno Setup Setup Data (5.2.5)", inno_version!(5, 2, 5), NONE),
    known(b"Inno Setup Setup Data (5.2.5) (u)", inno_version!(5, 2, 5), U),
    known(b"Inno Setup Setup Data (5.3.0)", inno_version!(5, 3, 0), NONE),
    known(b"Inno Setup Setup Data (5.3.0) (u)", inno_version!(5, 3, 0), U),
    known(b"Inno Setup Setup Data (5.3.3)", inno_version!(5, 3, 3), NONE),
    known(b"Inno Setup Setup Data (5.3.3) (u)", inno_version!(5, 3, 3), U),
    known(b"Inno Setup Setup Data (5.3.5)", inno_version!(5, 3, 5), NONE),
    known(b"Inno Setup Setup Data (5.3.5) (u)", inno_version!(5, 3, 5), U),
    known(b"Inno Setup Setup Data (5.3.6)", inno_version!(5, 3, 6), NONE),
    known(b"Inno Setup Setup Data (5.3.6) (u)", inno_version!(5, 3, 6), U),
    known(b"Inno Setup Setup Data (5.3.7)", inno_version!(5, 3, 7), NONE),
    known(b"Inno Setup Setup Data (5.3.7) (u)", inno_version!(5, 3, 7), U),
    known(b"Inno Setup Setup Data (5.3.8)", inno_version!(5, 3, 8), NONE),
    known(b"Inno Setup Setup Data (5.3.8) (u)", inno_version!(5, 3, 8), U),
    known(b"Inno Setup Setup Data (5.3.9)", inno_version!(5, 3, 9), NONE),
    known(b"Inno Setup Setup Data (5.3.9) (u)", inno_version!(5, 3, 9), U),
    known(b"Inno Setup Setup Data (5.3.10)", inno_version!(5, 3, 10), NONE),
    known(b"Inno Setup Setup Data (5.3.10) (u)", inno_version!(5, 3, 10), U),
    known(b"Inno Setup Setup Data (5.4.2)", inno_version!(5, 4, 2), NONE),
    known(b"Inno Setup Setup Data (5.4.2) (u)", inno_version!(5, 4, 2), U),
    known(b"Inno Setup Setup Data (5.5.0)", inno_version!(5, 5, 0), NONE),
    known(b"Inno Setup Setup Data (5.5.0) (u)", inno_version!(5, 5, 0), U),
    known(b"Inno Setup Setup Data (5.5.0) (u)", inno_version!(5, 5, 0, 1), U),
    known(b"Inno Setup Setup Data (5.5.6)", inno_version!(5, 5, 6), NONE),
    known(b"Inno Setup Setup Data (5.5.6) (u)", inno_version!(5, 5, 6), U),
    known(b"Inno Setup Setup Data (5.5.7)", inno_version!(5, 5, 7), NONE),
    known(b"Inno Setup Setup Data (5.5.7) (u)", inno_version!(5, 5, 7), U),
    known(b"Inno Setup Setup Data (5.5.7) (U)", inno_version!(5, 5, 7), U),
    known(b"Inno Setup Setup Data (5.6.0)", inno_version!(5, 6, 0), NONE),
    known(b"Inno Setup Setup Data (5.6.0) (u)", inno_version!(5, 6, 0), U),
    known(b"Inno Setup Setup Data (5.6.2)", inno_version!(5, 6, 2), NONE),
    known(b"Inno Setup Setup Data (5.6.2) (u)", inno_version!(5, 6, 2), U),
    known(b"Inno Setup Setup Data (6.0.0) (u)", inno_version!(6, 0, 0), U),
    known(b"Inno Setup Setup Data (6.1.0) (u)", inno_version!(6, 1, 0), U),
];

const AMBIGUOUS: &[u32] = &[
    inno_version!(2, 0, 1),
    inno_version!(3, 0, 3),
    inno_version!(4, 2, 3),
    inno_version!(5, 5, 0),
    inno_version!(5, 5, 7),
];

impl Version {
    pub fn new(value: u32, flags: VersionFlags) -> Self {
        Version {
            value,
            flags,
            known: true,
        }
    }

    pub fn major(&self) -> u8 {
        (self.value >> 24) as u8
    }

    pub fn minor(&self) -> u8 {
        (self.value >> 16) as u8
    }

    pub fn patch(&self) -> u8 {
        (self.value >> 8) as u8
    }

    pub fn revision(&self) -> u8 {
        self.value as u8
    }

    pub fn bits(&self) -> u32 {
        if self.flags.contains(VersionFlags::BITS16) {
            16
        } else {
            32
        }
    }

    pub fn is_unicode(&self) -> bool {
        self.flags.contains(VersionFlags::UNICODE)
    }

    pub fn is_isx(&self) -> bool {
        self.flags.contains(VersionFlags::ISX)
    }

    /// Versions whose banner is shared with a later, incompatible revision.
    pub fn is_ambiguous(&self) -> bool {
        AMBIGUOUS.contains(&self.value)
    }

    /// The next larger catalogued version, or 0 if there is none.
    pub fn next(&self) -> u32 {
        LEGACY_VERSIONS
            .iter()
            .chain(VERSIONS.iter())
            .map(|v| v.value)
            .filter(|&v| v > self.value)
            .min()
            .unwrap_or(0)
    }

    /// Reads the version banner at the start of the setup header stream.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let mut banner = [0u8; 64];
        reader.read_exact(&mut banner[..12])?;
        if banner[0] == b'i' && banner[11] == 0x1a {
            let legacy = &banner[..12];
            if let Some(v) = LEGACY_VERSIONS.iter().find(|v| v.banner == legacy) {
                return Ok(Version::new(v.value, v.flags));
            }
            return parse_legacy(legacy);
        }
        reader.read_exact(&mut banner[12..])?;
        let len = banner.iter().position(|&b| b == 0).unwrap_or(banner.len());
        let banner = &banner[..len];
        if let Some(v) = VERSIONS.iter().find(|v| v.banner == banner) {
            return Ok(Version::new(v.value, v.flags));
        }
        parse_banner(banner)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())?;
        if self.revision() != 0 {
            write!(f, ".{}", self.revision())?;
        }
        let mut tags = Vec::new();
        if self.flags.contains(VersionFlags::BITS16) {
            tags.push("16-bit");
        }
        if self.is_unicode() {
            tags.push("unicode");
        }
        if self.is_isx() {
            tags.push("isx");
        }
        if !tags.is_empty() {
            write!(f, " ({})", tags.join(", "))?;
        }
        Ok(())
    }
}

fn parse_number(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_components(s: &str) -> Option<u32> {
    let parts: Vec<&str> = s.split('.').collect();
    if !(3..=4).contains(&parts.len()) {
        return None;
    }
    // Old releases append a letter to the patch number, e.g. "3.0.0a".
    let mut nums = [0u8; 4];
    for (i, part) in parts.iter().enumerate() {
        let part = if i == 2 {
            part.trim_end_matches(|c: char| c.is_ascii_lowercase())
        } else {
            part
        };
        nums[i] = parse_number(part)?;
    }
    Some(inno_version!(nums[0], nums[1], nums[2], nums[3]))
}

/// Parses `iA.B.C--NN\x1a`.
fn parse_legacy(banner: &[u8]) -> Result<Version> {
    let text = String::from_utf8_lossy(&banner[1..11]).into_owned();
    let err = || InnoError::Version(format!("unknown legacy banner {:?}", text));
    let (number, bits) = text.split_once("--").ok_or_else(err)?;
    let value = parse_components(number).ok_or_else(err)?;
    let flags = match bits {
        "16" => VersionFlags::BITS16,
        "32" => VersionFlags::empty(),
        _ => return Err(err()),
    };
    Ok(Version {
        value,
        flags,
        known: false,
    })
}

fn parse_banner(banner: &[u8]) -> Result<Version> {
    let text = String::from_utf8_lossy(banner).into_owned();
    if !text.contains("Inno Setup") {
        return Err(InnoError::Version(format!("not an Inno Setup banner: {:?}", text)));
    }
    let mut value = None;
    let mut flags = VersionFlags::empty();
    let mut rest = text.as_str();
    while let Some(start) = rest.find('(') {
        let Some(end) = rest[start..].find(')') else {
            break;
        };
        let group = &rest[start + 1..start + end];
        if group.eq_ignore_ascii_case("u") {
            flags |= VersionFlags::UNICODE;
        } else if let Some(v) = parse_components(group) {
            value = Some(value.map_or(v, |old: u32| old.max(v)));
        }
        rest = &rest[start + end + 1..];
    }
    if text.contains("My Inno Setup Extensions") || text.contains("with ISX") {
        flags |= VersionFlags::ISX;
    }
    let value =
        value.ok_or_else(|| InnoError::Version(format!("no version number in {:?}", text)))?;
    Ok(Version {
        value,
        flags,
        known: false,
    })
}
