use std::{
    fmt, fs,
    io::{self, BufRead, Cursor, Read},
    path::Path,
};

use crate::{
    error::PipelineError,
    smart_reader::{ByteCounter, open_input},
};

/// 100 MiB; inputs at or above this size are streamed instead of buffered.
pub const DEFAULT_STREAM_THRESHOLD: u64 = 100 * 1024 * 1024;

enum Body {
    Buffered(Vec<u8>),
    Streamed(Box<dyn BufRead + Send>),
}

/// An export ready to be parsed: either fully buffered or a stream handle.
pub struct InputSource {
    name: String,
    size: u64,
    body: Body,
    counter: Option<ByteCounter>,
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSource")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("streamed", &self.is_streamed())
            .finish()
    }
}

impl InputSource {
    /// Buffered input from text already in memory.
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let bytes = text.into().into_bytes();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            body: Body::Buffered(bytes),
            counter: None,
        }
    }

    /// Streamed input; `size` is the expected total used for progress.
    pub fn from_reader<R>(name: impl Into<String>, reader: R, size: u64) -> Self
    where
        R: BufRead + Send + 'static,
    {
        Self {
            name: name.into(),
            size,
            body: Body::Streamed(Box::new(reader)),
            counter: None,
        }
    }

    /// Open a file, buffering it when smaller than `stream_threshold`.
    pub fn open(path: &Path, stream_threshold: u64) -> Result<Self, PipelineError> {
        let read_error = |source: io::Error| PipelineError::SourceRead {
            bytes_read: 0,
            source,
        };
        let size = fs::metadata(path).map_err(read_error)?.len();
        let name = path.to_string_lossy().into_owned();
        let opened = open_input(path).map_err(read_error)?;

        if size >= stream_threshold {
            tracing::info!(
                size,
                threshold = stream_threshold,
                input = %name,
                "streaming large input"
            );
            return Ok(Self {
                name,
                size,
                body: Body::Streamed(opened.reader),
                counter: Some(opened.counter),
            });
        }

        // Compressed inputs can decode far past their on-disk size.
        let mut reader = opened.reader;
        let mut bytes = Vec::with_capacity(size as usize);
        (&mut reader)
            .take(stream_threshold)
            .read_to_end(&mut bytes)
            .map_err(|source| PipelineError::SourceRead {
                bytes_read: bytes.len() as u64,
                source,
            })?;

        if bytes.len() as u64 >= stream_threshold {
            tracing::info!(
                size,
                threshold = stream_threshold,
                input = %name,
                "decoded input reaches streaming threshold"
            );
            return Ok(Self {
                name,
                size,
                body: Body::Streamed(Box::new(Cursor::new(bytes).chain(reader))),
                counter: Some(opened.counter),
            });
        }

        tracing::debug!(size, decoded = bytes.len(), input = %name, "buffered input");
        Ok(Self {
            name,
            size: bytes.len() as u64,
            body: Body::Buffered(bytes),
            counter: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total used for progress: buffered length, or the on-disk size for streams.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_streamed(&self) -> bool {
        matches!(self.body, Body::Streamed(_))
    }

    /// First line of a buffered input, for header sniffing.
    pub fn first_line(&self) -> Option<String> {
        let Body::Buffered(bytes) = &self.body else {
            return None;
        };
        let end = bytes.iter().position(|&b| b == b'\n').unwrap_or(bytes.len());
        let line = String::from_utf8_lossy(&bytes[..end]);
        let line = line.trim_end_matches('\r');
        Some(line.strip_prefix('\u{feff}').unwrap_or(line).to_string())
    }

    pub(crate) fn into_parts(self) -> (Box<dyn Read + Send>, Option<ByteCounter>) {
        let reader: Box<dyn Read + Send> = match self.body {
            Body::Buffered(bytes) => Box::new(Cursor::new(bytes)),
            Body::Streamed(reader) => reader,
        };
        (reader, self.counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_files_are_buffered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genome.txt");
        fs::write(&path, "# generated by 23andMe\r\nrs1\t1\t1\tAA\n").unwrap();

        let source = InputSource::open(&path, DEFAULT_STREAM_THRESHOLD).unwrap();
        assert!(!source.is_streamed());
        assert_eq!(source.first_line().as_deref(), Some("# generated by 23andMe"));
        assert_eq!(source.size(), 35);
    }

    #[test]
    fn large_files_are_streamed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genome.vcf");
        fs::write(&path, "##fileformat=VCFv4.2\n").unwrap();

        let source = InputSource::open(&path, 8).unwrap();
        assert!(source.is_streamed());
        assert_eq!(source.first_line(), None);
        assert_eq!(source.size(), 21);
    }

    fn write_gzip(path: &Path, text: &str) {
        use flate2::{Compression, write::GzEncoder};
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(text.as_bytes()).unwrap();
        fs::write(path, encoder.finish().unwrap()).unwrap();
    }

    #[test]
    fn small_gzip_is_buffered_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genome.txt.gz");
        write_gzip(&path, "# generated by 23andMe\nrs1\t1\t1\tAA\n");

        let source = InputSource::open(&path, DEFAULT_STREAM_THRESHOLD).unwrap();
        assert!(!source.is_streamed());
        assert_eq!(source.size(), 34);
        assert_eq!(source.first_line().as_deref(), Some("# generated by 23andMe"));
    }

    #[test]
    fn gzip_decoding_past_threshold_is_streamed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genome.vcf.gz");
        let text = "1\t100\trs1\tA\tG\n".repeat(2_000);
        write_gzip(&path, &text);
        let on_disk = fs::metadata(&path).unwrap().len();
        let threshold = on_disk + 1;
        assert!((text.len() as u64) > threshold);

        let source = InputSource::open(&path, threshold).unwrap();
        assert!(source.is_streamed());
        assert_eq!(source.size(), on_disk);

        // Bytes read while probing are not lost.
        let (mut reader, counter) = source.into_parts();
        let mut decoded = String::new();
        reader.read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, text);
        assert_eq!(counter.unwrap().get(), on_disk);
    }

    #[test]
    fn missing_file_is_source_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = InputSource::open(&dir.path().join("nope.txt"), 10).unwrap_err();
        assert!(matches!(err, PipelineError::SourceRead { .. }));
    }

    #[test]
    fn in_memory_text_reads_back() {
        let source = InputSource::from_text("mem.txt", "abc\ndef");
        assert_eq!(source.first_line().as_deref(), Some("abc"));
        let (mut reader, counter) = source.into_parts();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "abc\ndef");
        assert!(counter.is_none());
    }
}
