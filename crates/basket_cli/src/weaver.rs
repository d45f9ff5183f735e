//! Weave, unweave and inspect commands.
//!
//! # Responsibility
//! - Resolve destinations the way the tool documents them.
//! - Translate archive outcomes into one diagnostic each.

use basket_core::archive::source::{validate_source, SourceProblem};
use basket_core::archive::{
    create_archive_from_source, extract_archive, inspect_archive, ArchiveError, ArchiveSummary,
    Compatibility, ExtractOptions, ExtractOutcome,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const ARCHIVE_EXTENSION: &str = ".baskets";
const UNWEAVE_SUFFIX: &str = "_baskets";
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Errors reported by weaver commands.
#[derive(Debug)]
pub enum WeaverError {
    /// Source directory failed validation and `--force` was not given.
    InvalidSource(SourceProblem),
    /// Input file is not a readable `.baskets` archive.
    InvalidArchive(ArchiveError),
    OutputMissing(PathBuf),
    Archive(ArchiveError),
}

impl Display for WeaverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSource(problem) => {
                write!(f, "The source seems to be invalid. ({problem})")
            }
            Self::InvalidArchive(err) => {
                write!(f, "The source seems to be an invalid .baskets file. ({err})")
            }
            Self::OutputMissing(path) => {
                write!(f, "Output directory does not exist: {}", path.display())
            }
            Self::Archive(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WeaverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSource(problem) => Some(problem),
            Self::InvalidArchive(err) | Self::Archive(err) => Some(err),
            Self::OutputMissing(_) => None,
        }
    }
}

impl From<ArchiveError> for WeaverError {
    fn from(value: ArchiveError) -> Self {
        Self::Archive(value)
    }
}

/// Options shared by weave and unweave.
#[derive(Debug, Clone, Default)]
pub struct Destination {
    pub output: Option<PathBuf>,
    pub name: Option<String>,
    pub force: bool,
}

/// Encodes `source` into a `.baskets` file. Returns the written path.
pub fn weave(
    source: &Path,
    preview: Option<&Path>,
    destination: &Destination,
) -> Result<PathBuf, WeaverError> {
    if let Err(problem) = validate_source(source) {
        if !destination.force {
            return Err(WeaverError::InvalidSource(problem));
        }
        eprintln!("warning: The source seems to be invalid. ({problem})");
        log::warn!("event=weave_source module=cli status=warn problem={problem}");
    }

    let preview = preview.filter(|path| {
        let valid = is_png_file(path);
        if !valid {
            eprintln!(
                "warning: preview {} is not a PNG file and is ignored",
                path.display()
            );
        }
        valid
    });

    let out_dir = match &destination.output {
        Some(dir) => existing_dir(dir)?,
        None => source
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let mut file_name = match &destination.name {
        Some(name) => name.clone(),
        None => base_name(source),
    };
    if !file_name.ends_with(ARCHIVE_EXTENSION) {
        file_name.push_str(ARCHIVE_EXTENSION);
    }
    let target = out_dir.join(file_name);

    create_archive_from_source(source, preview, &target, !destination.force)?;
    Ok(target)
}

/// Decodes `input` into a directory. Returns the extraction outcome.
pub fn unweave(input: &Path, destination: &Destination) -> Result<ExtractOutcome, WeaverError> {
    inspect_archive(input).map_err(WeaverError::InvalidArchive)?;

    let out_dir = match &destination.output {
        Some(dir) => existing_dir(dir)?,
        None => input
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let dir_name = match &destination.name {
        Some(name) => name.clone(),
        None => format!("{}{UNWEAVE_SUFFIX}", base_name(input)),
    };

    let outcome = extract_archive(
        input,
        &out_dir.join(dir_name),
        ExtractOptions {
            protect_destination: !destination.force,
            keep_preview: true,
        },
    )?;
    Ok(outcome)
}

/// Scans the header only.
pub fn inspect(input: &Path) -> Result<ArchiveSummary, WeaverError> {
    inspect_archive(input).map_err(WeaverError::InvalidArchive)
}

/// Human-readable header report printed by `--inspect`.
pub fn render_summary(summary: &ArchiveSummary) -> String {
    let list = |values: &[String]| {
        if values.is_empty() {
            "-".to_string()
        } else {
            values.join(";")
        }
    };
    let compatibility = match summary.compatibility {
        Compatibility::Compatible => "compatible",
        Compatibility::PossiblyCompatible => "possibly compatible",
        Compatibility::Incompatible => "incompatible",
    };
    let mut out = format!(
        "version: {}\nread-compatible: {}\nwrite-compatible: {}\ncompatibility: {compatibility}\n",
        summary.version.as_deref().unwrap_or("-"),
        list(&summary.compat.read_compatible),
        list(&summary.compat.write_compatible),
    );
    for block in &summary.blocks {
        out.push_str(&format!("block {}*: {} bytes\n", block.key, block.len));
    }
    out
}

fn existing_dir(dir: &Path) -> Result<PathBuf, WeaverError> {
    if dir.is_dir() {
        Ok(dir.to_path_buf())
    } else {
        Err(WeaverError::OutputMissing(dir.to_path_buf()))
    }
}

/// File name without its last extension, `baskets` when there is none.
fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "baskets".to_string())
}

fn is_png_file(path: &Path) -> bool {
    let mut signature = [0u8; 8];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut signature))
        .map(|()| signature == PNG_SIGNATURE)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::{base_name, is_png_file};
    use std::fs;
    use std::path::Path;

    #[test]
    fn base_name_drops_extension() {
        assert_eq!(base_name(Path::new("/tmp/notes.baskets")), "notes");
        assert_eq!(base_name(Path::new("/tmp/source")), "source");
    }

    #[test]
    fn png_detection_reads_signature() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake.png");
        fs::write(&fake, "not a png").unwrap();
        let real = dir.path().join("real.png");
        fs::write(&real, [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0]).unwrap();

        assert!(!is_png_file(&fake));
        assert!(is_png_file(&real));
        assert!(!is_png_file(&dir.path().join("missing.png")));
    }
}
