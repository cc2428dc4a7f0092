use crate::config::StagingConfig;
use crate::error::{EdentityError, Result};
use regex::Regex;
use std::collections::BTreeSet;

/// Decides which archive entries are sequencing reads and whether the
/// selected set is acceptable for staging.
pub struct ReadFileFilter {
    pattern: Regex,
    illegal_chars: Vec<char>,
}

impl ReadFileFilter {
    pub fn new(config: &StagingConfig) -> Result<Self> {
        let pattern = Regex::new(&config.read_pattern).map_err(|e| EdentityError::Config {
            message: format!("Invalid read_pattern {:?}: {}", config.read_pattern, e),
        })?;

        Ok(Self {
            pattern,
            illegal_chars: config.illegal_chars.clone(),
        })
    }

    /// Archive entry names use `/` separators; directory entries end with one
    /// and never match.
    pub fn is_read_file(&self, name: &str) -> bool {
        !name.ends_with('/') && self.pattern.is_match(name)
    }

    pub fn find_illegal_char(&self, name: &str) -> Option<char> {
        self.illegal_chars.iter().copied().find(|c| name.contains(*c))
    }

    /// Picks the read files out of `names`, keeping their order, and enforces
    /// the naming and single-directory rules.
    pub fn select<'a, I>(&self, names: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let selected: Vec<String> = names
            .into_iter()
            .filter(|name| self.is_read_file(name))
            .map(str::to_string)
            .collect();

        for name in &selected {
            if let Some(character) = self.find_illegal_char(name) {
                return Err(EdentityError::IllegalFilename {
                    name: name.clone(),
                    character,
                });
            }
        }

        if selected.is_empty() {
            return Err(EdentityError::NoMatchingFiles {
                path: String::new(),
            });
        }

        let directories: BTreeSet<&str> = selected.iter().map(|n| parent_dir(n)).collect();
        if directories.len() > 1 {
            return Err(EdentityError::MixedLocation {
                directories: directories.into_iter().map(str::to_string).collect(),
            });
        }

        Ok(selected)
    }
}

/// Directory part of an archive entry name; `""` for the archive root.
pub fn parent_dir(name: &str) -> &str {
    match name.rfind('/') {
        Some(pos) => &name[..pos],
        None => "",
    }
}

/// Final path component of an archive entry name.
pub fn base_name(name: &str) -> &str {
    match name.rfind('/') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}
