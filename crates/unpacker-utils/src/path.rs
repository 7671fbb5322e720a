//! Home and XDG directory lookup plus `$VAR`/`~` expansion for configured paths.

use std::{env, iter::Peekable, path::PathBuf, str::Chars};

use nix::unistd::{getuid, User};

use crate::error::{PathError, PathResult};

fn current_username() -> String {
    User::from_uid(getuid())
        .ok()
        .flatten()
        .map(|user| user.name)
        .or_else(|| env::var("USER").ok())
        .unwrap_or_else(|| "root".to_string())
}

/// Locates the per-user directories the installer writes into.
pub trait PathResolver {
    /// Expands `$VAR`, `${VAR}` and a leading `~`, then anchors relative results at the
    /// current working directory.
    ///
    /// # Errors
    ///
    /// * [`PathError::Empty`] for a blank input
    /// * [`PathError::MissingEnvVar`] when a referenced variable is unset
    /// * [`PathError::UnclosedVariable`] for `${` without a closing brace
    /// * [`PathError::CurrentDir`] when the working directory is unavailable
    ///
    /// ```
    /// use unpacker_utils::path::{PathResolver, SystemPathResolver};
    ///
    /// let apps = SystemPathResolver.resolve_path("~/apps").unwrap();
    /// assert!(apps.is_absolute());
    /// ```
    fn resolve_path(&self, path: &str) -> PathResult<PathBuf>;

    /// `$HOME`, or `/home/<user>` when it is unset.
    fn home_dir(&self) -> PathBuf;

    /// `$XDG_CONFIG_HOME`, defaulting to `~/.config`.
    fn xdg_config_home(&self) -> PathBuf;

    /// `$XDG_DATA_HOME`, defaulting to `~/.local/share`.
    fn xdg_data_home(&self) -> PathBuf;

    /// `~/.local/bin`. Not governed by any XDG variable.
    fn local_bin_dir(&self) -> PathBuf;
}

/// [`PathResolver`] backed by the process environment.
pub struct SystemPathResolver;

impl PathResolver for SystemPathResolver {
    fn resolve_path(&self, path: &str) -> PathResult<PathBuf> {
        let path = path.trim();
        if path.is_empty() {
            return Err(PathError::Empty);
        }

        let expanded = PathBuf::from(self.expand_variables(path)?);
        if expanded.is_absolute() {
            return Ok(expanded);
        }

        env::current_dir()
            .map(|cwd| cwd.join(expanded))
            .map_err(|source| PathError::CurrentDir { source })
    }

    fn home_dir(&self) -> PathBuf {
        env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/home").join(current_username()))
    }

    fn xdg_config_home(&self) -> PathBuf {
        env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| self.home_dir().join(".config"))
    }

    fn xdg_data_home(&self) -> PathBuf {
        env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| self.home_dir().join(".local/share"))
    }

    fn local_bin_dir(&self) -> PathBuf {
        self.home_dir().join(".local/bin")
    }
}

impl SystemPathResolver {
    fn expand_variables(&self, path: &str) -> PathResult<String> {
        let mut out = String::with_capacity(path.len());
        let mut chars = path.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '$' if chars.peek() == Some(&'{') => {
                    chars.next();
                    let name = read_braced(&mut chars)?;
                    out.push_str(&self.lookup(&name, path)?);
                }
                '$' => {
                    let name = read_bare(&mut chars);
                    if name.is_empty() {
                        out.push('$');
                    } else {
                        out.push_str(&self.lookup(&name, path)?);
                    }
                }
                '~' if out.is_empty() => out.push_str(&self.home_dir().to_string_lossy()),
                _ => out.push(c),
            }
        }

        Ok(out)
    }

    fn lookup(&self, name: &str, input: &str) -> PathResult<String> {
        // the XDG fallbacks apply even when the variable itself is unset
        let value = match name {
            "HOME" => self.home_dir().to_string_lossy().into_owned(),
            "XDG_CONFIG_HOME" => self.xdg_config_home().to_string_lossy().into_owned(),
            "XDG_DATA_HOME" => self.xdg_data_home().to_string_lossy().into_owned(),
            _ => env::var(name).map_err(|_| PathError::MissingEnvVar {
                var: name.into(),
                input: input.into(),
            })?,
        };
        Ok(value)
    }
}

fn read_braced(chars: &mut Peekable<Chars>) -> PathResult<String> {
    let mut name = String::new();
    for c in chars.by_ref() {
        if c == '}' {
            return Ok(name);
        }
        name.push(c);
    }
    Err(PathError::UnclosedVariable {
        input: format!("${{{name}"),
    })
}

fn read_bare(chars: &mut Peekable<Chars>) -> String {
    let mut name = String::new();
    while let Some(c) = chars.next_if(|c| c.is_alphanumeric() || *c == '_') {
        name.push(c);
    }
    name
}

pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    SystemPathResolver.resolve_path(path)
}

pub fn home_dir() -> PathBuf {
    SystemPathResolver.home_dir()
}

pub fn xdg_config_home() -> PathBuf {
    SystemPathResolver.xdg_config_home()
}

pub fn xdg_data_home() -> PathBuf {
    SystemPathResolver.xdg_data_home()
}

pub fn local_bin_dir() -> PathBuf {
    SystemPathResolver.local_bin_dir()
}
