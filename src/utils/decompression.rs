use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::MultiGzDecoder;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Supported compression formats detected by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Bzip2,
    Xz,
    Uncompressed,
}

/// Magic byte detection and streaming decompression
pub struct DecompressionService;

impl DecompressionService {
    /// Detect compression format using magic bytes
    pub fn detect_compression_format(data: &[u8]) -> CompressionFormat {
        match infer::get(data).map(|kind| kind.mime_type()) {
            Some("application/gzip") => CompressionFormat::Gzip,
            Some("application/x-bzip2") => CompressionFormat::Bzip2,
            Some("application/x-xz") => CompressionFormat::Xz,
            _ => CompressionFormat::Uncompressed,
        }
    }

    /// Open a file for forward-only reading, transparently decompressing it.
    /// Nothing beyond the read buffer is held in memory.
    pub fn open_decoded(path: &Path) -> std::io::Result<(CompressionFormat, Box<dyn BufRead + Send>)> {
        let mut file = File::open(path)?;

        let mut header = [0u8; 8];
        let mut filled = 0;
        while filled < header.len() {
            let n = file.read(&mut header[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        file.seek(SeekFrom::Start(0))?;

        let format = Self::detect_compression_format(&header[..filled]);
        let reader: Box<dyn Read + Send> = match format {
            CompressionFormat::Gzip => Box::new(MultiGzDecoder::new(file)),
            #[cfg(feature = "compression-bzip2")]
            CompressionFormat::Bzip2 => Box::new(bzip2::read::BzDecoder::new(file)),
            #[cfg(feature = "compression-xz")]
            CompressionFormat::Xz => Box::new(xz2::read::XzDecoder::new(file)),
            #[allow(unreachable_patterns)]
            CompressionFormat::Bzip2 | CompressionFormat::Xz => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    format!("{format:?} support is not compiled in"),
                ));
            }
            CompressionFormat::Uncompressed => Box::new(file),
        };

        Ok((format, Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, reader))))
    }
}
