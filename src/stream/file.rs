//! File-backed streams.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::trace;

use super::Stream;
use crate::util::{ByteOrder, CharacterEncoding, Error, Result};

const BUFFER_SIZE: usize = 256 * 1024;

/// How a [`FileStream`] opens its file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileMode {
    /// Read an existing file
    Read,
    /// Create or truncate for writing
    Truncate,
    /// Create or append for writing
    Append,
}

/// Buffered file channel, either reading or writing.
#[derive(Debug)]
pub enum FileChannel {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
}

fn wrong_direction(op: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("file stream not opened for {op}"),
    )
}

impl Read for FileChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Reader(r) => r.read(buf),
            Self::Writer(_) => Err(wrong_direction("reading")),
        }
    }
}

impl BufRead for FileChannel {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            Self::Reader(r) => r.fill_buf(),
            Self::Writer(_) => Ok(&[]),
        }
    }

    fn consume(&mut self, amt: usize) {
        if let Self::Reader(r) = self {
            r.consume(amt);
        }
    }
}

impl Write for FileChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Writer(w) => w.write(buf),
            Self::Reader(_) => Err(wrong_direction("writing")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Writer(w) => w.flush(),
            Self::Reader(_) => Ok(()),
        }
    }
}

/// Stream over a file.
pub type FileStream = Stream<FileChannel>;

impl Stream<FileChannel> {
    /// Open `path` in `mode`.
    pub fn open(
        path: impl AsRef<Path>,
        mode: FileMode,
        byte_order: ByteOrder,
        encoding: CharacterEncoding,
    ) -> Result<Self> {
        let path = path.as_ref();
        let opened = match mode {
            FileMode::Read => File::open(path),
            FileMode::Truncate => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path),
            FileMode::Append => OpenOptions::new().append(true).create(true).open(path),
        };
        let file = opened.map_err(|e| Error::stream(format!("open {}", path.display()), &e))?;
        trace!("Opened {} ({:?})", path.display(), mode);

        let channel = match mode {
            FileMode::Read => FileChannel::Reader(BufReader::with_capacity(BUFFER_SIZE, file)),
            FileMode::Truncate | FileMode::Append => {
                FileChannel::Writer(BufWriter::with_capacity(BUFFER_SIZE, file))
            }
        };
        Ok(Self::new(channel, byte_order, encoding))
    }

    /// Flush pending writes and close the file.
    pub fn close(self) -> Result<()> {
        match self.into_inner() {
            FileChannel::Writer(writer) => {
                let file = writer
                    .into_inner()
                    .map_err(|e| Error::stream("close", e.error()))?;
                file.sync_all().map_err(|e| Error::stream("close", &e))
            }
            FileChannel::Reader(_) => Ok(()),
        }
    }
}
