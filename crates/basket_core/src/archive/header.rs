//! Container primitives: the magic line, header lines and raw blocks.
//!
//! # Responsibility
//! - Write the container around a preview and a payload.
//! - Scan a container header, recording where each raw block lives.
//!
//! # Invariants
//! - Header lines are Latin-1 and end with `\n`; a `\r` before it is
//!   tolerated when reading.
//! - Keys are matched exactly; only the magic line has a fixed position.
//! - Scanning stops at the `archive*` block; anything after it is ignored.

use super::ArchiveError;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// First line of every archive, without its `\n`.
pub const MAGIC_LINE: &str = "BasKetNP:archive";
/// Block key of the preview PNG.
pub const PREVIEW_KEY: &str = "preview";
/// Block key of the tar+gzip payload.
pub const ARCHIVE_KEY: &str = "archive";

/// Compatibility lists written after the version line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompatLists {
    pub read_compatible: Vec<String>,
    pub write_compatible: Vec<String>,
}

/// Position of one raw block inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// Key without the trailing `*`.
    pub key: String,
    /// Byte offset of the first block byte.
    pub offset: u64,
    pub len: u64,
}

/// Everything the header declares up to and including `archive*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: Option<String>,
    pub compat: CompatLists,
    /// Every raw block in file order, the payload block last.
    pub blocks: Vec<BlockInfo>,
}

impl ContainerHeader {
    pub fn preview(&self) -> Option<&BlockInfo> {
        self.blocks.iter().find(|block| block.key == PREVIEW_KEY)
    }

    /// The payload block. Always present on a scanned header.
    pub fn payload(&self) -> Option<&BlockInfo> {
        self.blocks.iter().find(|block| block.key == ARCHIVE_KEY)
    }
}

/// Writes a complete container.
///
/// `payload` must yield exactly `payload_len` bytes.
pub fn write_container<W: Write, P: Read>(
    writer: &mut W,
    version: &str,
    compat: Option<&CompatLists>,
    preview: &[u8],
    payload: &mut P,
    payload_len: u64,
) -> io::Result<()> {
    writer.write_all(MAGIC_LINE.as_bytes())?;
    writer.write_all(b"\n")?;
    write_line(writer, "version", version)?;
    if let Some(compat) = compat {
        write_line(writer, "read-compatible", &compat.read_compatible.join(";"))?;
        write_line(writer, "write-compatible", &compat.write_compatible.join(";"))?;
    }
    write_line(writer, &format!("{PREVIEW_KEY}*"), &preview.len().to_string())?;
    writer.write_all(preview)?;
    write_line(writer, &format!("{ARCHIVE_KEY}*"), &payload_len.to_string())?;
    let copied = io::copy(&mut payload.take(payload_len), writer)?;
    if copied != payload_len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("payload ended after {copied} of {payload_len} bytes"),
        ));
    }
    writer.flush()
}

fn write_line<W: Write>(writer: &mut W, key: &str, value: &str) -> io::Result<()> {
    writer.write_all(&latin1_bytes(key))?;
    writer.write_all(b":")?;
    writer.write_all(&latin1_bytes(value))?;
    writer.write_all(b"\n")
}

/// Characters outside Latin-1 are written as `?`.
fn latin1_bytes(value: &str) -> Vec<u8> {
    value
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Sequential reader over a container.
pub struct ContainerReader<R> {
    reader: R,
    len: u64,
}

impl ContainerReader<BufReader<File>> {
    /// Opens a container file.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path).map_err(|err| ArchiveError::resource(path, err))?;
        let len = file
            .metadata()
            .map_err(|err| ArchiveError::resource(path, err))?
            .len();
        Ok(Self::new(BufReader::new(file), len))
    }
}

impl<R: BufRead + Seek> ContainerReader<R> {
    /// Wraps a reader over a container of `len` bytes.
    pub fn new(reader: R, len: u64) -> Self {
        Self { reader, len }
    }

    /// Scans the header up to the payload block.
    pub fn scan(&mut self) -> Result<ContainerHeader, ArchiveError> {
        self.reader
            .seek(SeekFrom::Start(0))
            .map_err(|err| ArchiveError::corrupted(format!("seek failed: {err}")))?;
        let mut position = 0u64;
        let mut line = Vec::new();

        let read = self.read_line(&mut line)?;
        position += read as u64;
        if line_content(&line) != Some(MAGIC_LINE.as_bytes()) {
            return Err(ArchiveError::NotABasketArchive);
        }

        let mut header = ContainerHeader {
            version: None,
            compat: CompatLists::default(),
            blocks: Vec::new(),
        };
        loop {
            let read = self.read_line(&mut line)?;
            if read == 0 {
                return Err(ArchiveError::corrupted("no archive block before end of file"));
            }
            position += read as u64;
            let text = latin1_string(line_content(&line).unwrap_or(&line[..]));
            let (key, value) = text.split_once(':').unwrap_or((text.as_str(), ""));

            if let Some(block_key) = key.strip_suffix('*') {
                let size = parse_size(value)
                    .ok_or_else(|| ArchiveError::corrupted(format!("invalid size for `{key}`: `{value}`")))?;
                let remaining = self.len.saturating_sub(position);
                if size > remaining {
                    return Err(ArchiveError::corrupted(format!(
                        "block `{key}` declares {size} bytes but only {remaining} remain"
                    )));
                }
                header.blocks.push(BlockInfo {
                    key: block_key.to_string(),
                    offset: position,
                    len: size,
                });
                if block_key == ARCHIVE_KEY {
                    return Ok(header);
                }
                position += size;
                self.reader
                    .seek(SeekFrom::Start(position))
                    .map_err(|err| ArchiveError::corrupted(format!("seek failed: {err}")))?;
                continue;
            }

            match key {
                "version" => header.version = Some(value.to_string()),
                "read-compatible" => header.compat.read_compatible = split_list(value),
                "write-compatible" => header.compat.write_compatible = split_list(value),
                _ => {}
            }
        }
    }

    /// Reads a whole block into memory.
    pub fn read_block(&mut self, block: &BlockInfo) -> Result<Vec<u8>, ArchiveError> {
        let mut bytes = Vec::new();
        self.block_reader(block)?
            .read_to_end(&mut bytes)
            .map_err(|err| ArchiveError::corrupted(format!("block `{}` unreadable: {err}", block.key)))?;
        if bytes.len() as u64 != block.len {
            return Err(ArchiveError::corrupted(format!("block `{}` is truncated", block.key)));
        }
        Ok(bytes)
    }

    /// Positions the reader on a block and limits it to the block length.
    pub fn block_reader(&mut self, block: &BlockInfo) -> Result<io::Take<&mut R>, ArchiveError> {
        self.reader
            .seek(SeekFrom::Start(block.offset))
            .map_err(|err| ArchiveError::corrupted(format!("seek failed: {err}")))?;
        Ok((&mut self.reader).take(block.len))
    }

    fn read_line(&mut self, line: &mut Vec<u8>) -> Result<usize, ArchiveError> {
        line.clear();
        self.reader
            .read_until(b'\n', line)
            .map_err(|err| ArchiveError::corrupted(format!("header unreadable: {err}")))
    }
}

/// Line bytes without `\n` or `\r\n`; `None` when the terminator is missing.
fn line_content(line: &[u8]) -> Option<&[u8]> {
    let line = line.strip_suffix(b"\n")?;
    Some(line.strip_suffix(b"\r").unwrap_or(line))
}

/// Sizes are unsigned decimal; signs, spaces and empty values are rejected.
fn parse_size(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
