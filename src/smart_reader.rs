use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use flate2::read::MultiGzDecoder;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const MAX_DEPTH: usize = 4;

/// Shared count of bytes pulled from the file on disk.
#[derive(Clone, Debug, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, n: usize) {
        self.0.fetch_add(n as u64, Ordering::Relaxed);
    }
}

struct CountingReader<R> {
    inner: R,
    counter: ByteCounter,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.add(n);
        Ok(n)
    }
}

/// A decoded view of an input file.
pub struct OpenedInput {
    pub reader: Box<dyn BufRead + Send>,
    /// Counts raw (possibly compressed) bytes read from disk.
    pub counter: ByteCounter,
    pub gzip_layers: usize,
}

/// Opens a file and transparently peels off GZIP/BGZF layers.
///
/// Progress is measured on the raw file, so callers should compare
/// `counter` against the on-disk size rather than decoded bytes.
pub fn open_input(path: &Path) -> io::Result<OpenedInput> {
    let file = File::open(path)?;
    let counter = ByteCounter::default();
    let mut reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(CountingReader {
        inner: file,
        counter: counter.clone(),
    }));

    let mut gzip_layers = 0;
    while gzip_layers < MAX_DEPTH && is_gzip(&mut reader)? {
        tracing::debug!(layer = gzip_layers + 1, "detected GZIP/BGZF layer");
        // MultiGzDecoder also handles BGZF and concatenated members.
        reader = Box::new(BufReader::new(MultiGzDecoder::new(reader)));
        gzip_layers += 1;
    }

    Ok(OpenedInput {
        reader,
        counter,
        gzip_layers,
    })
}

fn is_gzip(reader: &mut Box<dyn BufRead + Send>) -> io::Result<bool> {
    let buf = reader.fill_buf()?;
    Ok(buf.len() >= 2 && buf[..2] == GZIP_MAGIC)
}
