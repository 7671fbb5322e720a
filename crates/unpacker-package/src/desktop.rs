//! Freedesktop `.desktop` launcher entries.

use std::{collections::HashMap, fs, path::Path, sync::LazyLock};

use regex::Regex;
use tracing::debug;
use unpacker_utils::fs::ensure_dir_exists;

use crate::error::{ErrorContext, PackageError, Result};

pub const DEFAULT_CATEGORIES: &str = "Utility;";

static KEY_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([A-Za-z][A-Za-z0-9-]*)=(.*)$").expect("desktop entry regex is valid")
});

/// An application launcher entry with the fixed key set the installer emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopEntry {
    pub name: String,
    pub exec: String,
    pub icon: Option<String>,
    pub categories: String,
}

impl DesktopEntry {
    pub fn new<N: Into<String>, E: Into<String>>(name: N, exec: E) -> Self {
        Self {
            name: name.into(),
            exec: exec.into(),
            icon: None,
            categories: DEFAULT_CATEGORIES.to_string(),
        }
    }

    pub fn with_icon<I: Into<String>>(mut self, icon: I) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_categories<C: Into<String>>(mut self, categories: C) -> Self {
        self.categories = categories.into();
        self
    }

    /// Renders the entry. `Exec` is quoted when the path contains spaces or
    /// characters the launcher would otherwise interpret.
    pub fn render(&self) -> String {
        let mut out = String::from("[Desktop Entry]\n");
        out.push_str(&format!("Name={}\n", self.name));
        out.push_str(&format!("Exec={}\n", quote_exec(&self.exec)));
        if let Some(icon) = &self.icon {
            out.push_str(&format!("Icon={icon}\n"));
        }
        out.push_str("Type=Application\n");
        out.push_str(&format!("Categories={}\n", self.categories));
        out.push_str("Terminal=false\n");
        out
    }

    /// Rejects values that would break the key=value line format.
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("Name", Some(&self.name)),
            ("Exec", Some(&self.exec)),
            ("Icon", self.icon.as_ref()),
            ("Categories", Some(&self.categories)),
        ];
        for (key, value) in values {
            if value.is_some_and(|v| v.contains(['\n', '\r'])) {
                return Err(PackageError::InvalidDesktopEntry(format!(
                    "{key} spans multiple lines"
                )));
            }
        }
        if self.exec.trim().is_empty() {
            return Err(PackageError::InvalidDesktopEntry("Exec is empty".into()));
        }
        Ok(())
    }

    /// Writes the rendered entry to `path`, creating parent directories.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.validate()?;

        if let Some(parent) = path.parent() {
            ensure_dir_exists(parent)?;
        }
        fs::write(path, self.render())
            .with_context(|| format!("writing desktop entry {}", path.display()))?;
        debug!(path = %path.display(), name = %self.name, "desktop entry written");
        Ok(())
    }

    /// Reads back an entry produced by [`DesktopEntry::render`].
    pub fn parse(content: &str) -> Result<Self> {
        let fields: HashMap<&str, &str> = KEY_VALUE_RE
            .captures_iter(content)
            .filter_map(|caps| {
                Some((caps.get(1)?.as_str(), caps.get(2)?.as_str().trim_end()))
            })
            .collect();

        let field = |key: &str| {
            fields
                .get(key)
                .map(|v| v.to_string())
                .ok_or_else(|| PackageError::InvalidDesktopEntry(format!("missing {key}")))
        };

        Ok(Self {
            name: field("Name")?,
            exec: unquote_exec(&field("Exec")?),
            icon: fields.get("Icon").map(|v| v.to_string()),
            categories: field("Categories").unwrap_or_else(|_| DEFAULT_CATEGORIES.to_string()),
        })
    }
}

// Characters that force quoting of an Exec argument.
const EXEC_RESERVED: &[char] = &[
    '"', '\'', '\\', '>', '<', '~', '|', '&', ';', '$', '*', '?', '#', '(', ')', '`',
];

fn quote_exec(exec: &str) -> String {
    let needs_quotes = exec
        .chars()
        .any(|c| c.is_whitespace() || EXEC_RESERVED.contains(&c));
    if !needs_quotes {
        return exec.to_string();
    }

    let mut quoted = String::with_capacity(exec.len() + 2);
    quoted.push('"');
    for c in exec.chars() {
        if matches!(c, '"' | '`' | '$' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn unquote_exec(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}
