//! Decides which of two files mapping to the same output path is kept.
use super::expr::expression_match;
use crate::setup::data::DataEntry;
use crate::setup::file::{FileEntry, FileFlags};
use std::cmp::Ordering;

const FILE_ATTRIBUTE_READONLY: u32 = 0x1;

/// A file entry together with its first data entry.
#[derive(Clone, Copy)]
pub struct Candidate<'a> {
    pub file: &'a FileEntry,
    pub data: &'a DataEntry,
}

/// Outcome of a collision. The reason always describes the losing side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The existing file stays, the new one is skipped.
    Keep(&'static str),
    /// The new file replaces the existing one.
    Replace(&'static str),
}

/// Applies the installer's own overwrite rules, as if `new` was installed
/// on top of `existing`. A default language, if given, overrides the result
/// when only one of the two files is meant for it.
pub fn resolve(existing: Candidate, new: Candidate, default_language: Option<&str>) -> Verdict {
    if let Some(lang) = default_language {
        let e = matches_language(existing.file, lang);
        let n = matches_language(new.file, lang);
        if e && !n {
            return Verdict::Keep("non-default language");
        }
        if n && !e {
            return Verdict::Replace("non-default language");
        }
    }
    compare(existing, new)
}

fn matches_language(file: &FileEntry, lang: &str) -> bool {
    expression_match(&file.conditions.languages, lang).unwrap_or(true)
}

fn compare(existing: Candidate, new: Candidate) -> Verdict {
    let (ed, nd) = (existing.data, new.data);
    let same_contents = ed.file.checksum == nd.file.checksum;
    match (ed.has_version_info(), nd.has_version_info()) {
        (false, true) => return Verdict::Replace("no version info"),
        (true, false) => return Verdict::Keep("no version info"),
        (true, true) => match nd.file_version.cmp(&ed.file_version) {
            Ordering::Greater => return Verdict::Replace("old version"),
            Ordering::Less => return Verdict::Keep("old version"),
            Ordering::Equal => {
                if same_contents {
                    return Verdict::Keep("duplicate (checksum)");
                }
                let replace_same = FileFlags::OVERWRITE_SAME_VERSION
                    | FileFlags::REPLACE_SAME_VERSION_IF_CONTENTS_DIFFER;
                if !new.file.options.intersects(replace_same) {
                    return Verdict::Keep("duplicate (version)");
                }
            }
        },
        (false, false) => {
            if same_contents {
                return Verdict::Keep("duplicate (checksum)");
            }
        }
    }

    match compare_time(ed, nd) {
        Ordering::Greater => return Verdict::Replace("old timestamp"),
        Ordering::Less => return Verdict::Keep("old timestamp"),
        Ordering::Equal => {}
    }

    if new.file.options.contains(FileFlags::CONFIRM_OVERWRITE) {
        return Verdict::Keep("duplicate (confirm overwrite)");
    }
    if existing.file.attributes & FILE_ATTRIBUTE_READONLY != 0
        && !new.file.options.contains(FileFlags::OVERWRITE_READ_ONLY)
    {
        return Verdict::Keep("duplicate (read-only)");
    }
    Verdict::Replace("duplicate (overwritten)")
}

/// Orders `new` relative to `existing`, at the coarser of the two
/// timestamp resolutions.
fn compare_time(existing: &DataEntry, new: &DataEntry) -> Ordering {
    if existing.coarse_timestamp || new.coarse_timestamp {
        new.timestamp
            .div_euclid(2)
            .cmp(&existing.timestamp.div_euclid(2))
    } else {
        (new.timestamp, new.timestamp_nsec).cmp(&(existing.timestamp, existing.timestamp_nsec))
    }
}
