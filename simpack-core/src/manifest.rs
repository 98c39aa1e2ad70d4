//! Pinned requirement manifests (`requirements.txt` style).

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ManifestError;

fn pinned_pattern() -> &'static Regex {
    static PINNED: OnceLock<Regex> = OnceLock::new();
    PINNED.get_or_init(|| {
        Regex::new(
            r"^(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[(?P<extras>[^\]]*)\])?\s*==\s*(?P<version>[^\s;,]+)\s*(?:;\s*(?P<marker>.+?))?\s*$",
        )
        .expect("pinned requirement pattern is valid")
    })
}

fn direct_reference_pattern() -> &'static Regex {
    static DIRECT: OnceLock<Regex> = OnceLock::new();
    DIRECT.get_or_init(|| {
        Regex::new(
            r"^(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[(?P<extras>[^\]]*)\])?\s*@\s*(?P<url>\S+)\s*(?:;\s*(?P<marker>.+?))?\s*$",
        )
        .expect("direct reference pattern is valid")
    })
}

/// `line` up to the first `#` that starts it or follows whitespace.
fn strip_comment(line: &str) -> &str {
    let mut previous_is_space = true;
    for (idx, c) in line.char_indices() {
        if c == '#' && previous_is_space {
            return &line[..idx];
        }
        previous_is_space = c.is_whitespace();
    }
    line
}

/// PEP 503 normalised project name: lowercase, runs of `-`, `_`, `.` collapsed to `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.extend(c.to_lowercase());
            in_separator = false;
        }
    }
    out
}

/// A single `name[extras]==version ; marker` entry, or a direct reference
/// `name[extras] @ url ; marker` as `pip freeze` writes for non-index installs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub name: String,
    pub extras: Option<String>,
    /// Pinned version; `None` for direct references.
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub marker: Option<String>,
}

impl Requirement {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extras: None,
            version: Some(version.into()),
            url: None,
            marker: None,
        }
    }

    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn is_direct_reference(&self) -> bool {
        self.url.is_some()
    }

    fn from_line(text: &str) -> Option<Self> {
        let caps = pinned_pattern()
            .captures(text)
            .or_else(|| direct_reference_pattern().captures(text))?;
        Some(Self {
            name: caps["name"].to_string(),
            extras: caps
                .name("extras")
                .map(|m| m.as_str().trim().to_string())
                .filter(|e| !e.is_empty()),
            version: caps.name("version").map(|m| m.as_str().to_string()),
            url: caps.name("url").map(|m| m.as_str().to_string()),
            marker: caps.name("marker").map(|m| m.as_str().to_string()),
        })
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(extras) = &self.extras {
            write!(f, "[{extras}]")?;
        }
        match (&self.version, &self.url) {
            (Some(version), _) => write!(f, "=={version}")?,
            (None, Some(url)) => write!(f, " @ {url}")?,
            (None, None) => {}
        }
        if let Some(marker) = &self.marker {
            write!(f, " ; {marker}")?;
        }
        Ok(())
    }
}

/// Flat, ordered list of pinned requirements and direct references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub requirements: Vec<Requirement>,
}

impl Manifest {
    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self { requirements }
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter()
    }

    /// One requirement per line, newline terminated.
    pub fn render(&self) -> String {
        self.requirements
            .iter()
            .map(|r| format!("{r}\n"))
            .collect()
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.render())?;
        debug!(path = %path.display(), entries = self.len(), "Wrote manifest");
        Ok(())
    }
}

impl FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut requirements = Vec::new();
        let mut seen = HashSet::new();

        for (idx, raw) in s.lines().enumerate() {
            let line = idx + 1;
            let text = strip_comment(raw).trim();
            if text.is_empty() {
                continue;
            }
            if text.starts_with('-') {
                // editable installs and pip options (-e, --index-url, ...)
                warn!(line, text, "Dropping non-requirement line from manifest");
                continue;
            }

            let requirement = Requirement::from_line(text).ok_or_else(|| ManifestError::Unpinned {
                line,
                text: text.to_string(),
            })?;
            if requirement.is_direct_reference() {
                warn!(line, text, "Passing direct reference through without a version pin");
            }
            if !seen.insert(requirement.normalized_name()) {
                return Err(ManifestError::Duplicate {
                    line,
                    name: requirement.name,
                });
            }
            requirements.push(requirement);
        }

        Ok(Manifest { requirements })
    }
}
