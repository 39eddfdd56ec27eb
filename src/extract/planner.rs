//! Builds the list of output paths and settles path collisions.
use super::collision::{Candidate, Verdict, resolve};
use super::expr::{expression_match, is_simple_expression};
use super::filenames::{FilenameMap, parent};
use crate::error::{InnoError, Result};
use crate::setup::directory::DirectoryFlags;
use crate::setup::file::{FileEntry, FileFlags};
use crate::setup::info::Info;
use crate::types::{CollisionAction, ExtractConfig};
use std::collections::BTreeMap;

/// A file entry that will be written to `path`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessedFile {
    /// Index into the file entries.
    pub entry: usize,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessedDirectory {
    /// Index into the directory entries, `None` for implied directories.
    pub entry: Option<usize>,
    pub path: String,
    /// Only created because something inside it is extracted.
    pub implied: bool,
}

/// A file entry left out because another file took its path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedFile {
    pub entry: usize,
    pub path: String,
    pub reason: &'static str,
}

#[derive(Clone, Debug, Default)]
pub struct Plan {
    /// Sorted by lower case path.
    pub files: Vec<ProcessedFile>,
    pub directories: Vec<ProcessedDirectory>,
    pub skipped: Vec<SkippedFile>,
}

struct Planner<'a> {
    info: &'a Info,
    config: &'a ExtractConfig,
    names: FilenameMap<'a>,
    /// Keyed by lower case path.
    files: BTreeMap<String, ProcessedFile>,
    directories: BTreeMap<String, ProcessedDirectory>,
    /// Further members of each collision group when renaming all of them.
    collisions: BTreeMap<String, Vec<usize>>,
    skipped: Vec<SkippedFile>,
}

/// Maps the directory and file entries of `info` to output paths.
pub fn plan(info: &Info, config: &ExtractConfig) -> Result<Plan> {
    let mut planner = Planner {
        info,
        config,
        names: FilenameMap::new(&config.filenames),
        files: BTreeMap::new(),
        directories: BTreeMap::new(),
        collisions: BTreeMap::new(),
        skipped: Vec::new(),
    };
    for (i, dir) in info.directories.iter().enumerate() {
        if dir.options.contains(DirectoryFlags::DELETE_AFTER_INSTALL) && !config.extract_temp {
            continue;
        }
        if !planner.wanted_language(&dir.conditions.languages) {
            continue;
        }
        let path = planner.names.map(&dir.name);
        if path.is_empty() || !planner.included(&path) {
            continue;
        }
        planner.add_directory(&path, Some(i));
    }
    for (i, file) in info.files.iter().enumerate() {
        planner.add_file(i, file)?;
    }
    planner.rename_collisions();
    Ok(Plan {
        files: planner.files.into_values().collect(),
        directories: planner.directories.into_values().collect(),
        skipped: planner.skipped,
    })
}

impl<'a> Planner<'a> {
    fn wanted_language(&self, languages: &str) -> bool {
        if languages.trim().is_empty() {
            return !self.config.language_only;
        }
        let Some(lang) = &self.config.language else {
            return true;
        };
        match expression_match(languages, lang) {
            Ok(matched) => matched,
            Err(e) => {
                crate::COUNTER.inc_warning();
                log::warn!("Bad language condition: {}", e);
                true
            }
        }
    }

    /// Whether `path` or one of its ancestors matches an include pattern.
    fn included(&self, path: &str) -> bool {
        if self.config.include.is_empty() {
            return true;
        }
        let parts: Vec<String> = path.split('/').map(str::to_lowercase).collect();
        self.config.include.iter().any(|pattern| {
            let anchored = pattern.starts_with(['/', '\\']);
            let pattern: Vec<String> = pattern
                .split(['/', '\\'])
                .filter(|p| !p.is_empty())
                .map(str::to_lowercase)
                .collect();
            if pattern.is_empty() || pattern.len() > parts.len() {
                return false;
            }
            if anchored {
                return parts[..pattern.len()] == pattern[..];
            }
            parts.windows(pattern.len()).any(|w| w == &pattern[..])
        })
    }

    /// Registers `path` and its ancestors. Returns the path with the letter
    /// case of already registered ancestors.
    fn add_directory(&mut self, path: &str, entry: Option<usize>) -> String {
        let path = self.add_parents(path);
        let key = path.to_lowercase();
        match self.directories.get_mut(&key) {
            Some(existing) => {
                if entry.is_some() && existing.implied {
                    existing.entry = entry;
                    existing.implied = false;
                }
                existing.path.clone()
            }
            None => {
                self.directories.insert(
                    key,
                    ProcessedDirectory {
                        entry,
                        path: path.clone(),
                        implied: entry.is_none(),
                    },
                );
                path
            }
        }
    }

    fn add_parents(&mut self, path: &str) -> String {
        match parent(path) {
            Some(dir) => {
                let name = &path[dir.len() + 1..];
                let dir = self.add_directory(dir, None);
                format!("{}/{}", dir, name)
            }
            None => path.to_string(),
        }
    }

    fn has_data(&self, file: &FileEntry) -> bool {
        let count = self.info.data_entries.len();
        file.locations().all(|l| (l as usize) < count)
    }

    fn candidate(&self, entry: usize) -> Candidate<'a> {
        let info: &'a Info = self.info;
        let file = &info.files[entry];
        Candidate {
            file,
            data: &info.data_entries[file.location as usize],
        }
    }

    fn add_file(&mut self, i: usize, file: &FileEntry) -> Result<()> {
        if file.options.contains(FileFlags::DELETE_AFTER_INSTALL) && !self.config.extract_temp {
            log::debug!("Skipping temporary file {}", file.destination);
            return Ok(());
        }
        if !self.has_data(file) {
            log::debug!("Skipping {}: no embedded data", file.destination);
            return Ok(());
        }
        if !self.wanted_language(&file.conditions.languages) {
            return Ok(());
        }
        let path = self.names.map(&file.destination);
        if path.is_empty() || !self.included(&path) {
            return Ok(());
        }
        let path = self.add_parents(&path);
        let key = path.to_lowercase();

        let Some(existing) = self.files.get(&key).cloned() else {
            self.files.insert(key, ProcessedFile { entry: i, path });
            return Ok(());
        };
        match self.config.collisions {
            CollisionAction::Error => Err(InnoError::Collision(path)),
            CollisionAction::RenameAll => {
                self.collisions.entry(key).or_default().push(i);
                Ok(())
            }
            CollisionAction::Overwrite => {
                self.replace(key, existing, i, "overwritten");
                Ok(())
            }
            CollisionAction::Resolve => {
                let default_language = self.config.default_language.as_deref();
                match resolve(self.candidate(existing.entry), self.candidate(i), default_language) {
                    Verdict::Keep(reason) => {
                        log::debug!("Skipping {} ({}): {}", path, i, reason);
                        self.skipped.push(SkippedFile {
                            entry: i,
                            path,
                            reason,
                        });
                    }
                    Verdict::Replace(reason) => self.replace(key, existing, i, reason),
                }
                Ok(())
            }
        }
    }

    /// Puts `new` in place of `old`, keeping the path as first seen.
    fn replace(&mut self, key: String, old: ProcessedFile, new: usize, reason: &'static str) {
        log::debug!("Replacing {} ({} -> {}): {}", old.path, old.entry, new, reason);
        self.skipped.push(SkippedFile {
            entry: old.entry,
            path: old.path.clone(),
            reason,
        });
        self.files.insert(
            key,
            ProcessedFile {
                entry: new,
                path: old.path,
            },
        );
    }

    fn rename_collisions(&mut self) {
        let collisions = std::mem::take(&mut self.collisions);
        for (key, others) in collisions {
            let Some(base) = self.files.remove(&key) else {
                continue;
            };
            let members: Vec<usize> = std::iter::once(base.entry).chain(others).collect();
            let first = &self.info.files[base.entry];
            let common = Common {
                component: members
                    .iter()
                    .all(|&m| self.info.files[m].conditions.components == first.conditions.components),
                language: members
                    .iter()
                    .all(|&m| self.info.files[m].conditions.languages == first.conditions.languages),
                arch: members
                    .iter()
                    .all(|&m| arch_bits(&self.info.files[m]) == arch_bits(first)),
            };
            for (n, &member) in members.iter().enumerate() {
                self.rename_collision(member, &base.path, &common, n == 0);
            }
        }
    }

    /// Inserts `entry` under `path` plus the first free discriminating
    /// suffix.
    fn rename_collision(&mut self, entry: usize, path: &str, common: &Common, first: bool) {
        let file = &self.info.files[entry];
        let mut require_number = !first || (common.component && common.language && common.arch);
        let mut suffix = String::new();
        let components = file.conditions.components.trim();
        if !common.component && is_simple_expression(components) {
            require_number = false;
            suffix.push('#');
            suffix.push_str(components);
        }
        let languages = file.conditions.languages.trim();
        if !common.language && is_simple_expression(languages) {
            require_number = false;
            let is_default = self
                .config
                .default_language
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(languages));
            if !is_default {
                suffix.push('@');
                suffix.push_str(languages);
            }
        }
        if !common.arch {
            match arch_bits(file) {
                32 => {
                    require_number = false;
                    suffix.push_str("@32bit");
                }
                64 => {
                    require_number = false;
                    suffix.push_str("@64bit");
                }
                _ => {}
            }
        }

        let mut number = 0usize;
        let mut candidate = if require_number {
            number += 1;
            format!("{}{}$0", path, suffix)
        } else {
            format!("{}{}", path, suffix)
        };
        loop {
            let key = candidate.to_lowercase();
            match self.files.get(&key) {
                None => {
                    log::debug!("Renaming colliding {} to {}", path, candidate);
                    self.files.insert(
                        key,
                        ProcessedFile {
                            entry,
                            path: candidate,
                        },
                    );
                    return;
                }
                Some(existing) if existing.entry == entry => return,
                Some(_) => {
                    candidate = format!("{}{}${}", path, suffix, number);
                    number += 1;
                }
            }
        }
    }
}

/// Which discriminators all members of a collision group share.
struct Common {
    component: bool,
    language: bool,
    arch: bool,
}

fn arch_bits(file: &FileEntry) -> u32 {
    let arch = file.options & (FileFlags::BITS32 | FileFlags::BITS64);
    if arch == FileFlags::BITS32 {
        32
    } else if arch == FileFlags::BITS64 {
        64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::data::DataEntry;
    use crate::setup::directory::DirectoryEntry;
    use crate::utils::checksum::Checksum;

    fn info(files: &[(&str, &str)]) -> Info {
        let mut info = Info::default();
        for (i, (dest, lang)) in files.iter().enumerate() {
            let mut f = FileEntry {
                destination: dest.to_string(),
                location: i as u32,
                ..Default::default()
            };
            f.conditions.languages = lang.to_string();
            info.files.push(f);
            let mut data = DataEntry {
                timestamp: i as i64,
                ..Default::default()
            };
            data.file.checksum = Checksum::Crc32(i as u32);
            info.data_entries.push(data);
        }
        info
    }

    fn paths(plan: &Plan) -> Vec<&str> {
        plan.files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn test_implied_directories_and_case() {
        let mut info = info(&[("{app}\\Docs\\a.txt", ""), ("{app}\\DOCS\\b.txt", "")]);
        info.directories.push(DirectoryEntry {
            name: "{app}\\Empty".into(),
            ..Default::default()
        });
        let plan = plan(&info, &ExtractConfig::default()).unwrap();
        assert_eq!(paths(&plan), ["app/Docs/a.txt", "app/Docs/b.txt"]);
        let dirs: Vec<(&str, bool)> = plan
            .directories
            .iter()
            .map(|d| (d.path.as_str(), d.implied))
            .collect();
        assert_eq!(dirs, [("app", true), ("app/Docs", true), ("app/Empty", false)]);
    }

    #[test]
    fn test_language_filters() {
        let info = info(&[("a.txt", "en"), ("b.txt", "de"), ("c.txt", "")]);
        let mut config = ExtractConfig {
            language: Some("en".into()),
            ..Default::default()
        };
        assert_eq!(paths(&plan(&info, &config).unwrap()), ["a.txt", "c.txt"]);
        config.language_only = true;
        assert_eq!(paths(&plan(&info, &config).unwrap()), ["a.txt"]);
    }

    #[test]
    fn test_include_patterns() {
        let info = info(&[("{app}\\docs\\a.txt", ""), ("{app}\\bin\\b.exe", ""), ("docs\\c", "")]);
        let config = ExtractConfig {
            include: vec!["docs".into()],
            ..Default::default()
        };
        assert_eq!(paths(&plan(&info, &config).unwrap()), ["app/docs/a.txt", "docs/c"]);
        let config = ExtractConfig {
            include: vec!["/docs".into()],
            ..Default::default()
        };
        assert_eq!(paths(&plan(&info, &config).unwrap()), ["docs/c"]);
    }

    #[test]
    fn test_temporary_and_dataless_files() {
        let mut info = info(&[("a.txt", ""), ("tmp.dll", ""), ("gone.txt", "")]);
        info.files[1].options |= FileFlags::DELETE_AFTER_INSTALL;
        info.files[2].location = 99;
        let plan1 = plan(&info, &ExtractConfig::default()).unwrap();
        assert_eq!(paths(&plan1), ["a.txt"]);
        let config = ExtractConfig {
            extract_temp: true,
            ..Default::default()
        };
        assert_eq!(paths(&plan(&info, &config).unwrap()), ["a.txt", "tmp.dll"]);
    }

    #[test]
    fn test_collision_modes() {
        let info = info(&[("x.txt", ""), ("X.TXT", "")]);
        let mut config = ExtractConfig::default();

        config.collisions = CollisionAction::Error;
        assert!(matches!(plan(&info, &config), Err(InnoError::Collision(_))));

        config.collisions = CollisionAction::Overwrite;
        let p = plan(&info, &config).unwrap();
        assert_eq!(p.files, [ProcessedFile { entry: 1, path: "x.txt".into() }]);

        // The second entry has the newer timestamp.
        config.collisions = CollisionAction::Resolve;
        let p = plan(&info, &config).unwrap();
        assert_eq!(p.files[0].entry, 1);
        assert_eq!(p.skipped[0].reason, "old timestamp");

        config.collisions = CollisionAction::RenameAll;
        let p = plan(&info, &config).unwrap();
        assert_eq!(paths(&p), ["x.txt$0", "x.txt$1"]);
    }

    #[test]
    fn test_rename_discriminators() {
        let mut info = info(&[("a\\b.txt", "en"), ("a\\b.txt", "de"), ("a\\b.txt", "de")]);
        info.files[2].options |= FileFlags::BITS64;
        let config = ExtractConfig {
            collisions: CollisionAction::RenameAll,
            default_language: Some("en".into()),
            ..Default::default()
        };
        let p = plan(&info, &config).unwrap();
        let mut got: Vec<(usize, &str)> = p.files.iter().map(|f| (f.entry, f.path.as_str())).collect();
        got.sort();
        assert_eq!(got, [(0, "a/b.txt"), (1, "a/b.txt@de"), (2, "a/b.txt@de@64bit")]);
    }
}
