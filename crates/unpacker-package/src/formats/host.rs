use std::fmt;

/// Native package formats the installer can build and hand to a host package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageFormat {
    Pacman,
    Deb,
    Rpm,
}

impl PackageFormat {
    /// Value for the package builder's `-t` flag.
    pub fn fpm_target(self) -> &'static str {
        match self {
            Self::Pacman => "pacman",
            Self::Deb => "deb",
            Self::Rpm => "rpm",
        }
    }

    /// Glob matching the artifact the builder writes for this format.
    pub fn artifact_glob(self) -> &'static str {
        match self {
            Self::Pacman => "*.pkg.tar.zst",
            Self::Deb => "*.deb",
            Self::Rpm => "*.rpm",
        }
    }
}

impl fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fpm_target())
    }
}
