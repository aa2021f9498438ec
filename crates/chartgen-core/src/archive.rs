//! Chart archive creation
//!
//! Packages the files of a chart directory into a tarball whose entries are
//! all nested under a single root directory (the chart name), the layout
//! `helm install` expects.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, Header};

use crate::error::{CoreError, Result};

/// Compression applied to the archive, deduced from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Tar,
}

impl ArchiveFormat {
    pub fn from_extension(extension: &str) -> Self {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        if extension == "tar" {
            Self::Tar
        } else {
            Self::TarGz
        }
    }
}

/// Create an archive of `files`, stored relative to `base_dir` under `root`
///
/// Files outside `base_dir` are stored by file name. Returns the path of the
/// created archive.
pub fn create_archive(
    output: &Path,
    base_dir: &Path,
    files: &[PathBuf],
    root: &str,
    format: ArchiveFormat,
) -> Result<PathBuf> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::debug!("Creating chart archive {} ({} files)", output.display(), files.len());

    let file = File::create(output)?;

    match format {
        ArchiveFormat::TarGz => {
            let encoder = GzEncoder::new(file, Compression::default());
            let mut builder = Builder::new(encoder);
            append_files(&mut builder, base_dir, files, root)?;
            let encoder = builder.into_inner()?;
            encoder.finish()?;
        }
        ArchiveFormat::Tar => {
            let mut builder = Builder::new(file);
            append_files(&mut builder, base_dir, files, root)?;
            builder.into_inner()?.flush()?;
        }
    }

    Ok(output.to_path_buf())
}

fn append_files<W: Write>(
    builder: &mut Builder<W>,
    base_dir: &Path,
    files: &[PathBuf],
    root: &str,
) -> Result<()> {
    for file_path in files {
        let archive_path = format!("{}/{}", root, relative_name(base_dir, file_path)?);
        add_file_to_archive(builder, file_path, &archive_path)?;
    }
    Ok(())
}

fn relative_name(base_dir: &Path, file_path: &Path) -> Result<String> {
    let relative = match file_path.strip_prefix(base_dir) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => file_path
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| CoreError::Archive {
                message: format!("Cannot archive path without a file name: {}", file_path.display()),
            })?,
    };

    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

/// List the files stored in an archive
pub fn list_archive(archive_path: &Path, format: ArchiveFormat) -> Result<Vec<ArchiveEntry>> {
    let file = File::open(archive_path)?;
    let reader: Box<dyn Read> = match format {
        ArchiveFormat::TarGz => Box::new(GzDecoder::new(file)),
        ArchiveFormat::Tar => Box::new(file),
    };
    let mut archive = Archive::new(reader);

    let mut entries = Vec::new();

    for entry in archive.entries()? {
        let entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();
        let size = entry.header().size()?;

        entries.push(ArchiveEntry { path, size });
    }

    Ok(entries)
}

/// Information about a file in an archive
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Path within the archive, including the root directory
    pub path: String,
    /// File size in bytes
    pub size: u64,
}

/// Add a file to a tar archive
fn add_file_to_archive<W: Write>(
    builder: &mut Builder<W>,
    file_path: &Path,
    archive_path: &str,
) -> Result<()> {
    let content = std::fs::read(file_path)?;

    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0); // Reproducible builds: use epoch time
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content.as_slice())?;

    Ok(())
}
