use std::{fmt, path::Path};

use unpacker_package::PackageFormat;

use crate::command::{CommandRunner, CommandSpec};

/// Host package managers, in probe priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Pacman,
    Apt,
    Dnf,
    Rpm,
}

impl PackageManager {
    pub const PROBE_ORDER: [PackageManager; 4] = [Self::Pacman, Self::Apt, Self::Dnf, Self::Rpm];

    /// Command whose presence identifies this package manager.
    pub fn probe_command(self) -> &'static str {
        match self {
            Self::Pacman => "pacman",
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Rpm => "rpm",
        }
    }

    pub fn format(self) -> PackageFormat {
        match self {
            Self::Pacman => PackageFormat::Pacman,
            Self::Apt => PackageFormat::Deb,
            Self::Dnf | Self::Rpm => PackageFormat::Rpm,
        }
    }

    /// Non-interactive install of a local package file.
    pub fn install_command(self, package: &Path) -> CommandSpec {
        let spec = match self {
            Self::Pacman => CommandSpec::new("pacman").args(["-U", "--noconfirm"]),
            Self::Apt => CommandSpec::new("apt-get").args(["install", "-y"]),
            Self::Dnf => CommandSpec::new("dnf").args(["install", "-y"]),
            Self::Rpm => CommandSpec::new("rpm").arg("-i"),
        };
        spec.arg(package)
    }

    /// First package manager in [`Self::PROBE_ORDER`] present on the host.
    pub async fn detect<R: CommandRunner>(runner: &R) -> Option<Self> {
        for manager in Self::PROBE_ORDER {
            if runner.probe(manager.probe_command()).await {
                return Some(manager);
            }
        }
        None
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.probe_command())
    }
}
