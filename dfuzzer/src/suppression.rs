//! The concrete suppression-file loader (original spec §6 "Suppression file
//! format", §9 Open Questions on path precedence). `dfuzzer-core` only sees
//! the `SuppressionFilter` trait; this is the one implementation of it.

use std::fs;
use std::io;
use std::path::PathBuf;

use dfuzzer_core::SuppressionFilter;

const SUPPRESSION_FILENAME: &str = "dfuzzer.suppressions";

struct Entry {
    object_path: Option<String>,
    interface: Option<String>,
    method: String,
    description: String,
}

/// `(object, interface, method) -> Option<description>`, loaded from the
/// first of current-directory / `$HOME` / `/etc` that has the file.
pub struct FileSuppressions {
    entries: Vec<Entry>,
}

impl FileSuppressions {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// §9: "current directory, then home directory, then `/etc`" — first
    /// match wins, locations are never merged.
    pub fn load(bus_name: &str) -> io::Result<Self> {
        for path in candidate_paths() {
            match fs::read_to_string(&path) {
                Ok(contents) => return Ok(Self::parse(&contents, bus_name)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(Self::empty())
    }

    fn parse(contents: &str, bus_name: &str) -> Self {
        let mut entries = Vec::new();
        let mut in_section = false;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                in_section = header == bus_name;
                continue;
            }
            if !in_section {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let key = parts.next().unwrap_or_default();
            let description = parts.next().unwrap_or_default().trim().to_string();
            let (object_path, interface, method) = parse_key(key);
            entries.push(Entry {
                object_path,
                interface,
                method,
                description,
            });
        }

        Self { entries }
    }
}

impl SuppressionFilter for FileSuppressions {
    fn is_suppressed(&self, object_path: &str, interface: &str, method: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| {
                e.method == method
                    && e.interface.as_deref().map_or(true, |i| i == interface)
                    && e.object_path.as_deref().map_or(true, |o| o == object_path)
            })
            .map(|e| e.description.as_str())
    }
}

fn parse_key(key: &str) -> (Option<String>, Option<String>, String) {
    let parts: Vec<&str> = key.split(':').collect();
    match parts.as_slice() {
        [method] => (None, None, method.to_string()),
        [interface, method] => (None, Some(interface.to_string()), method.to_string()),
        [object, interface, method] => (Some(object.to_string()), Some(interface.to_string()), method.to_string()),
        _ => (None, None, key.to_string()),
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SUPPRESSION_FILENAME)];
    if let Ok(home) = std::env::var("HOME") {
        paths.push(PathBuf::from(home).join(SUPPRESSION_FILENAME));
    }
    paths.push(PathBuf::from("/etc").join(SUPPRESSION_FILENAME));
    paths
}
