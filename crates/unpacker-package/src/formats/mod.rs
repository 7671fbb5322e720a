//! Content sniffing for executable candidates and host package formats.

mod host;

use std::{
    fs::File,
    io::{ErrorKind, Read},
    path::Path,
};

pub use host::PackageFormat;

use crate::error::{ErrorContext, Result};

/// Magic bytes for ELF executables.
pub const ELF_MAGIC_BYTES: [u8; 4] = [0x7f, 0x45, 0x4c, 0x46];

/// Interpreter line marker for scripts.
pub const SHEBANG_BYTES: [u8; 2] = [0x23, 0x21];

/// What a candidate file turned out to be. The two kinds never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Elf,
    Script,
}

/// Reads the leading bytes of `reader` and classifies them.
///
/// Short inputs are not an error: a two-byte `#!` file is a script, anything
/// shorter than the ELF header simply is not ELF.
pub fn get_file_type<R: Read>(reader: &mut R) -> std::io::Result<Option<FileKind>> {
    let mut head = [0u8; 4];
    let mut filled = 0;
    while filled < head.len() {
        match reader.read(&mut head[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    if filled == 4 && head == ELF_MAGIC_BYTES {
        return Ok(Some(FileKind::Elf));
    }
    if filled >= 2 && head[..2] == SHEBANG_BYTES {
        return Ok(Some(FileKind::Script));
    }
    Ok(None)
}

/// Classifies the regular file at `path`. Empty files are never candidates.
pub fn classify_file<P: AsRef<Path>>(path: P) -> Result<Option<FileKind>> {
    let path = path.as_ref();
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("reading metadata of {}", path.display()))?
        .len();
    if len == 0 {
        return Ok(None);
    }
    get_file_type(&mut file).with_context(|| format!("reading header of {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_get_file_type() {
        let mut elf = Cursor::new(vec![0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
        assert_eq!(get_file_type(&mut elf).unwrap(), Some(FileKind::Elf));

        let mut script = Cursor::new(b"#!/bin/sh\nexec app\n".to_vec());
        assert_eq!(get_file_type(&mut script).unwrap(), Some(FileKind::Script));

        let mut bare_shebang = Cursor::new(b"#!".to_vec());
        assert_eq!(get_file_type(&mut bare_shebang).unwrap(), Some(FileKind::Script));

        let mut truncated_elf = Cursor::new(vec![0x7f, b'E', b'L']);
        assert_eq!(get_file_type(&mut truncated_elf).unwrap(), None);

        let mut text = Cursor::new(b"README".to_vec());
        assert_eq!(get_file_type(&mut text).unwrap(), None);
    }

    #[test]
    fn test_classify_file_skips_empty() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(classify_file(&empty).unwrap(), None);

        let elf = dir.path().join("app");
        std::fs::write(&elf, [0x7f, b'E', b'L', b'F', 0, 0]).unwrap();
        assert_eq!(classify_file(&elf).unwrap(), Some(FileKind::Elf));
    }

    #[test]
    fn test_classify_missing_file_has_context() {
        let err = classify_file("/nonexistent/unpacker/file").unwrap_err();
        assert!(err.to_string().contains("opening /nonexistent/unpacker/file"));
    }
}
