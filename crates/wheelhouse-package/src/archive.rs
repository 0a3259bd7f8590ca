//! Descriptor extraction from distribution archives.

use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::{
    descriptor::Descriptor,
    error::{ErrorContext, PackageError, Result},
};

/// Magic bytes for gzip streams.
pub const GZIP_MAGIC_BYTES: [u8; 2] = [0x1f, 0x8b];

/// Magic bytes for zip archives (local file header).
pub const ZIP_MAGIC_BYTES: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Container formats a distribution can arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Gzip compressed tarball, the classic sdist.
    TarGz,
    /// Uncompressed tarball.
    Tar,
    /// Zip sdist.
    Zip,
    /// Setuptools egg, a zip with an `EGG-INFO` directory.
    Egg,
    /// Wheel, a zip with a `*.dist-info` directory.
    Wheel,
}

impl ArchiveKind {
    /// Determines the archive kind from the filename suffix.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if lower.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else if lower.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if lower.ends_with(".egg") {
            Some(ArchiveKind::Egg)
        } else if lower.ends_with(".whl") {
            Some(ArchiveKind::Wheel)
        } else {
            None
        }
    }

    /// Detects the archive kind by reading magic bytes.
    ///
    /// Gzip streams are assumed to be tarballs and zip files to be zip sdists.
    pub fn sniff<R: Read + Seek>(reader: &mut R) -> Result<Option<Self>> {
        let mut magic = [0u8; 4];
        let mut filled = 0;
        while filled < magic.len() {
            let read = reader
                .read(&mut magic[filled..])
                .with_context(|| "reading archive magic bytes".to_string())?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        reader
            .seek(SeekFrom::Start(0))
            .with_context(|| "rewinding archive".to_string())?;

        if filled >= 2 && magic[..2] == GZIP_MAGIC_BYTES {
            return Ok(Some(ArchiveKind::TarGz));
        }
        if filled == 4 && magic == ZIP_MAGIC_BYTES {
            return Ok(Some(ArchiveKind::Zip));
        }
        Ok(None)
    }
}

/// Reads the descriptor embedded in the distribution at `path`.
///
/// The archive kind is taken from `filename` when it has a known suffix, otherwise from the
/// file's magic bytes. `filename` is the client-facing name and may differ from the name of
/// the staged file on disk.
///
/// # Errors
///
/// * [`PackageError::MetadataUnreadable`] if the archive is corrupt, of an unknown kind, or
///   carries no descriptor.
pub fn read_descriptor(path: &Path, filename: &str) -> Result<Descriptor> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let kind = match ArchiveKind::from_filename(filename) {
        Some(kind) => kind,
        None => {
            ArchiveKind::sniff(&mut reader)?
                .ok_or_else(|| PackageError::unreadable(filename, "unrecognized archive format"))?
        }
    };
    debug!(filename, ?kind, "reading distribution descriptor");

    let content = match kind {
        ArchiveKind::TarGz => read_tar_descriptor(GzDecoder::new(reader), filename)?,
        ArchiveKind::Tar => read_tar_descriptor(reader, filename)?,
        ArchiveKind::Zip | ArchiveKind::Egg | ArchiveKind::Wheel => {
            read_zip_descriptor(reader, filename, kind)?
        }
    };

    Descriptor::parse(&content).map_err(|err| {
        match err {
            PackageError::MetadataUnreadable { reason, .. } => {
                PackageError::unreadable(filename, reason)
            }
            other => other,
        }
    })
}

/// Ranks a member path as a descriptor candidate; lower is better.
fn descriptor_rank(member: &str, kind: ArchiveKind) -> Option<(u8, usize)> {
    let member = member.trim_start_matches("./");
    let depth = member.matches('/').count();
    let (parent, file) = member.rsplit_once('/').unwrap_or(("", member));

    match (kind, file) {
        (ArchiveKind::Wheel, "METADATA") if parent.ends_with(".dist-info") && depth == 1 => {
            Some((0, depth))
        }
        (ArchiveKind::Egg, "PKG-INFO") if parent == "EGG-INFO" => Some((0, depth)),
        (ArchiveKind::Wheel | ArchiveKind::Egg, _) => None,
        (_, "PKG-INFO") => Some((1, depth)),
        _ => None,
    }
}

fn read_tar_descriptor<R: Read>(reader: R, filename: &str) -> Result<String> {
    let mut archive = tar::Archive::new(reader);
    let mut best: Option<((u8, usize), String)> = None;

    let entries = archive
        .entries()
        .map_err(|err| PackageError::unreadable(filename, err))?;

    for entry in entries {
        let mut entry = entry.map_err(|err| PackageError::unreadable(filename, err))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let member = entry
            .path()
            .map_err(|err| PackageError::unreadable(filename, err))?
            .to_string_lossy()
            .into_owned();

        let Some(rank) = descriptor_rank(&member, ArchiveKind::TarGz) else {
            continue;
        };
        if best.as_ref().is_some_and(|(best_rank, _)| *best_rank <= rank) {
            continue;
        }

        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|err| PackageError::unreadable(filename, err))?;
        best = Some((rank, decode_descriptor(content)));
    }

    best.map(|(_, content)| content)
        .ok_or_else(|| PackageError::unreadable(filename, "no PKG-INFO found in archive"))
}

fn read_zip_descriptor<R: Read + Seek>(
    reader: R,
    filename: &str,
    kind: ArchiveKind,
) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|err| PackageError::unreadable(filename, err))?;

    let best = archive
        .file_names()
        .filter_map(|name| descriptor_rank(name, kind).map(|rank| (rank, name.to_string())))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, name)| name);

    let Some(member) = best else {
        let expected = match kind {
            ArchiveKind::Wheel => "no *.dist-info/METADATA found in wheel",
            ArchiveKind::Egg => "no EGG-INFO/PKG-INFO found in egg",
            _ => "no PKG-INFO found in archive",
        };
        return Err(PackageError::unreadable(filename, expected));
    };

    let mut file = archive
        .by_name(&member)
        .map_err(|err| PackageError::unreadable(filename, err))?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|err| PackageError::unreadable(filename, err))?;

    Ok(decode_descriptor(content))
}

/// Decodes descriptor bytes as UTF-8, falling back to Latin-1.
///
/// Older sdists were written with whatever encoding the author's setup used, most often
/// Latin-1, and every byte sequence is valid Latin-1.
fn decode_descriptor(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().into_iter().map(char::from).collect(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::{io::Write, path::PathBuf};

    use flate2::{write::GzEncoder, Compression};
    use zip::write::SimpleFileOptions;

    pub fn pkg_info(metadata_version: &str, name: &str, version: &str) -> String {
        format!(
            "Metadata-Version: {metadata_version}\nName: {name}\nVersion: {version}\n\
             Summary: {name} summary\nAuthor-email: {name}@example.com\n\
             Classifier: Programming Language :: Python\nRequires-Python: >=3.8\n"
        )
    }

    pub fn write_sdist(dir: &std::path::Path, filename: &str, entries: &[(&str, &str)]) -> PathBuf {
        let entries: Vec<_> = entries
            .iter()
            .map(|(name, content)| (*name, content.as_bytes()))
            .collect();
        write_sdist_bytes(dir, filename, &entries)
    }

    pub fn write_sdist_bytes(
        dir: &std::path::Path,
        filename: &str,
        entries: &[(&str, &[u8])],
    ) -> PathBuf {
        let path = dir.join(filename);
        let file = std::fs::File::create(&path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    pub fn write_zip(dir: &std::path::Path, filename: &str, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join(filename);
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }
}
