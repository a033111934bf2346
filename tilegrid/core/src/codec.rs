use std::io::{Read, Write};

use tilegrid_common::filter::{CompressionData, CompressionType};

use crate::error::{Error, Result};

/// Compresses `input` with the configured codec. The output carries
/// whatever framing the codec needs to decompress without an external
/// length.
pub fn compress(compression: &CompressionData, input: &[u8]) -> Result<Vec<u8>> {
    match compression.kind {
        CompressionType::Lz4 => {
            Ok(lz4_flex::compress_prepend_size(input))
        }
        CompressionType::Gzip => {
            let level = compression
                .level
                .map(|l| flate2::Compression::new(l.clamp(0, 9) as u32))
                .unwrap_or_default();
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), level);
            encoder
                .write_all(input)
                .and_then(|_| encoder.finish())
                .map_err(|e| Error::Io(format!("gzip compression: {e}")))
        }
        CompressionType::Zstd => {
            zstd::stream::encode_all(input, compression.level.unwrap_or(0))
                .map_err(|e| Error::Io(format!("zstd compression: {e}")))
        }
    }
}

/// Decompresses a tile produced by [compress] with the same codec.
pub fn decompress(kind: CompressionType, input: &[u8]) -> Result<Vec<u8>> {
    match kind {
        CompressionType::Lz4 => lz4_flex::decompress_size_prepended(input)
            .map_err(|e| Error::Io(format!("lz4 decompression: {e}"))),
        CompressionType::Gzip => {
            let mut decoder = flate2::read::GzDecoder::new(input);
            let mut output = Vec::new();
            decoder
                .read_to_end(&mut output)
                .map(|_| output)
                .map_err(|e| Error::Io(format!("gzip decompression: {e}")))
        }
        CompressionType::Zstd => zstd::stream::decode_all(input)
            .map_err(|e| Error::Io(format!("zstd decompression: {e}"))),
    }
}
