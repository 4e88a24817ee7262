//! Binary archives of element graphs.
//!
//! An [`Archive`] is single-shot: it reads or writes once and then stays
//! [`ArchiveState::Complete`]. The associated functions
//! ([`Archive::to_file`], [`Archive::from_file`], ...) cover the common
//! cases; construct an archive directly to observe progress.
//!
//! # Example
//!
//! ```ignore
//! use reflect::archive::{Archive, ArchiveOptions};
//!
//! Archive::to_file(&registry, &[light.clone()], "scene.rb", ArchiveOptions::default())?;
//! let light = Archive::from_file::<Light>(&registry, "scene.rb")?;
//! ```

pub mod compression;
pub mod format;
pub mod inspect;
mod reader;
mod writer;

use std::any::TypeId;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use crate::reflect::{ElementPtr, Reflect, Registry};
use crate::stream::{FileMode, FileStream, MemoryStream, Stream};
use crate::util::{ByteOrder, CharacterEncoding, Error, Result};
use format::{Header, CURRENT_VERSION, FLAG_COMPRESSED, MAX_BODY_SIZE};
use reader::ArchiveReader;
use writer::ArchiveWriter;

/// Settings used when writing. Reading takes everything from the header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub byte_order: ByteOrder,
    pub encoding: CharacterEncoding,
    /// zlib-compress the body
    pub compress: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::native(),
            encoding: CharacterEncoding::Utf16,
            compress: false,
        }
    }
}

impl ArchiveOptions {
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_encoding(mut self, encoding: CharacterEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// Lifecycle of an [`Archive`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveState {
    Idle,
    Reading,
    Writing,
    Complete,
}

impl fmt::Display for ArchiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Reading => "reading",
            Self::Writing => "writing",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Progress notification.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ArchiveStatus {
    Starting,
    /// A root element was read or written; `progress` runs from 0 to 1
    ElementProcessed { progress: f32 },
    Complete,
}

type StatusCallback<'r> = Box<dyn FnMut(&ArchiveStatus) + 'r>;

/// Reads or writes one archive.
pub struct Archive<'r> {
    registry: &'r Registry,
    options: ArchiveOptions,
    state: ArchiveState,
    status: Option<StatusCallback<'r>>,
}

impl<'r> Archive<'r> {
    pub fn new(registry: &'r Registry, options: ArchiveOptions) -> Self {
        Self {
            registry,
            options,
            state: ArchiveState::Idle,
            status: None,
        }
    }

    /// Receive [`ArchiveStatus`] notifications.
    pub fn with_status(mut self, callback: impl FnMut(&ArchiveStatus) + 'r) -> Self {
        self.status = Some(Box::new(callback));
        self
    }

    #[inline]
    pub fn state(&self) -> ArchiveState {
        self.state
    }

    #[inline]
    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    fn begin(&mut self, next: ArchiveState) -> Result<()> {
        if self.state != ArchiveState::Idle {
            return Err(Error::InvalidState(format!(
                "archive cannot start {} while {}",
                next, self.state
            )));
        }
        self.state = next;
        self.emit(ArchiveStatus::Starting);
        Ok(())
    }

    // Failure ends the archive too; only success reports `Complete`.
    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        self.state = ArchiveState::Complete;
        if result.is_ok() {
            self.emit(ArchiveStatus::Complete);
        }
        result
    }

    fn emit(&mut self, status: ArchiveStatus) {
        if let Some(callback) = self.status.as_mut() {
            callback(&status);
        }
    }

    fn emit_progress(&mut self, done: usize, total: usize) {
        let progress = if total == 0 { 1.0 } else { done as f32 / total as f32 };
        self.emit(ArchiveStatus::ElementProcessed { progress });
    }

    // === Writing ===

    /// Serialize `elements` into header plus stored body.
    #[tracing::instrument(skip_all, fields(roots = elements.len()))]
    fn encode<C: Write>(&mut self, elements: &[ElementPtr], out: &mut Stream<C>) -> Result<()> {
        self.begin(ArchiveState::Writing)?;
        let result = self.encode_body(elements, out);
        self.finish(result)
    }

    fn encode_body<C: Write>(&mut self, elements: &[ElementPtr], out: &mut Stream<C>) -> Result<()> {
        let options = self.options;

        let mut body = MemoryStream::memory(options.byte_order, options.encoding);
        let mut writer = ArchiveWriter::new(&mut body);
        writer.write_root_count(elements.len())?;
        for (i, element) in elements.iter().enumerate() {
            writer.write_element(element)?;
            self.emit_progress(i + 1, elements.len());
        }
        let written = writer.element_count();

        let body = body.into_bytes();
        let raw_len = body.len();
        let (stored, flags) = if options.compress {
            (compression::compress(&body)?, FLAG_COMPRESSED)
        } else {
            (body, 0)
        };

        let header = Header {
            byte_order: options.byte_order,
            version: CURRENT_VERSION,
            encoding: options.encoding,
            flags,
            checksum: compression::crc32(&stored),
        };
        out.set_encoding(options.encoding);
        header.write(out)?;
        out.write_buffer(&stored)?;

        debug!(
            "Wrote {} elements ({} roots), body {} bytes, stored {} bytes, {}",
            written,
            elements.len(),
            raw_len,
            stored.len(),
            options.byte_order
        );
        Ok(())
    }

    /// Write `elements` to `path`.
    pub fn write_to_file(&mut self, elements: &[ElementPtr], path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut stream = FileStream::open(path, FileMode::Truncate, self.options.byte_order, self.options.encoding)?;
        self.encode(elements, &mut stream)?;
        stream.close()
    }

    /// Write `elements` to memory.
    pub fn write_to_bytes(&mut self, elements: &[ElementPtr]) -> Result<Vec<u8>> {
        let mut stream = MemoryStream::memory(self.options.byte_order, self.options.encoding);
        self.encode(elements, &mut stream)?;
        Ok(stream.into_bytes())
    }

    // === Reading ===

    /// Read roots from `input`. With `search`, stop after the first root
    /// that is-a `search`.
    fn decode<C: Read>(&mut self, input: &mut Stream<C>, search: Option<TypeId>) -> Result<Vec<ElementPtr>> {
        let _span = tracing::debug_span!("archive_decode").entered();
        self.begin(ArchiveState::Reading)?;
        let result = self.decode_body(input, search);
        self.finish(result)
    }

    fn decode_body<C: Read>(&mut self, input: &mut Stream<C>, search: Option<TypeId>) -> Result<Vec<ElementPtr>> {
        let registry = self.registry;

        let header = Header::read(input)?;
        let stored = input.read_to_end()?;
        let computed = compression::crc32(&stored);
        if computed != header.checksum {
            return Err(Error::Checksum {
                stored: header.checksum,
                computed,
            });
        }
        let body = if header.is_compressed() {
            compression::decompress(&stored, MAX_BODY_SIZE)?
        } else {
            stored
        };

        let mut body = MemoryStream::from_bytes(body, header.byte_order, header.encoding);
        let mut reader = ArchiveReader::new(registry, &mut body);
        let count = reader.read_root_count()?;
        let mut elements = Vec::with_capacity(count.min(1024));
        for i in 0..count {
            let found = match reader.read_element()? {
                Some(element) => {
                    let found = search.is_some_and(|t| element.class().has_type(t));
                    elements.push(element);
                    found
                }
                None => false,
            };
            self.emit_progress(i + 1, count);
            if found {
                debug!("Found the requested type after {} of {} roots", i + 1, count);
                break;
            }
        }
        let mut created = reader.finish()?;

        debug!(
            "Read {} of {} root elements ({}, {}), {} synthesized",
            elements.len(),
            count,
            header.byte_order,
            header.encoding,
            created.len()
        );
        elements.append(&mut created);
        Ok(elements)
    }

    /// Read every root element of `path`, followed by elements synthesized
    /// during post-load.
    pub fn read_from_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<ElementPtr>> {
        let mut stream = FileStream::open(path, FileMode::Read, self.options.byte_order, self.options.encoding)?;
        let elements = self.decode(&mut stream, None)?;
        stream.close()?;
        Ok(elements)
    }

    /// Read `path` only as far as its first root element that is a `T`.
    pub fn read_first_from_file<T: Reflect>(&mut self, path: impl AsRef<Path>) -> Result<ElementPtr> {
        let path = path.as_ref();
        let class = self.registry.get_class_of::<T>()?;
        let type_name = class.name().to_owned();
        let type_id = class.type_id();
        let mut stream = FileStream::open(path, FileMode::Read, self.options.byte_order, self.options.encoding)?;
        let elements = self.decode(&mut stream, Some(type_id))?;
        stream.close()?;
        elements
            .into_iter()
            .find(|e| e.has_type::<T>())
            .ok_or_else(|| Error::ElementNotFound {
                type_name,
                path: path.to_path_buf(),
            })
    }

    /// Read an archive held in memory.
    pub fn read_from_bytes(&mut self, bytes: &[u8]) -> Result<Vec<ElementPtr>> {
        let mut stream = MemoryStream::from_bytes(bytes.to_vec(), self.options.byte_order, self.options.encoding);
        self.decode(&mut stream, None)
    }

    // === One-shot helpers ===

    /// Write `elements` to `path`.
    pub fn to_file(
        registry: &Registry,
        elements: &[ElementPtr],
        path: impl AsRef<Path>,
        options: ArchiveOptions,
    ) -> Result<()> {
        Archive::new(registry, options).write_to_file(elements, path)
    }

    /// Write `elements` to memory.
    pub fn to_bytes(registry: &Registry, elements: &[ElementPtr], options: ArchiveOptions) -> Result<Vec<u8>> {
        Archive::new(registry, options).write_to_bytes(elements)
    }

    /// Read every root element of `path` plus synthesized elements.
    pub fn read_file(registry: &Registry, path: impl AsRef<Path>) -> Result<Vec<ElementPtr>> {
        Archive::new(registry, ArchiveOptions::default()).read_from_file(path)
    }

    /// Read an in-memory archive.
    pub fn from_bytes(registry: &Registry, bytes: &[u8]) -> Result<Vec<ElementPtr>> {
        Archive::new(registry, ArchiveOptions::default()).read_from_bytes(bytes)
    }

    /// Read `path` and return its first root element that is a `T`.
    ///
    /// Roots after the match are not read.
    pub fn from_file<T: Reflect>(registry: &Registry, path: impl AsRef<Path>) -> Result<ElementPtr> {
        Archive::new(registry, ArchiveOptions::default()).read_first_from_file::<T>(path)
    }
}
