//! Body compressors.

use crate::error::ProtocolError;
use crate::header::CompressType;
use crate::MAX_FRAME_SIZE;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Byte-level compression applied after serialization.
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, ProtocolError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, ProtocolError>;
}

/// Gzip (deflate) compression via flate2.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCompressor;

impl Compressor for GzipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let mut enc = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), Compression::default());
        enc.write_all(data).map_err(ProtocolError::Compression)?;
        enc.finish().map_err(ProtocolError::Compression)
    }

    /// Output is capped at [`MAX_FRAME_SIZE`] bytes, like the frame itself.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let limit = u64::from(MAX_FRAME_SIZE);
        let mut dec = GzDecoder::new(data).take(limit + 1);
        let mut out = Vec::with_capacity(data.len() * 2);
        dec.read_to_end(&mut out).map_err(ProtocolError::Compression)?;
        if out.len() as u64 > limit {
            return Err(ProtocolError::DecompressedTooLarge { max: MAX_FRAME_SIZE });
        }
        Ok(out)
    }
}

/// Passes bytes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCompressor;

impl Compressor for IdentityCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        Ok(data.to_vec())
    }
}

static GZIP: GzipCompressor = GzipCompressor;
static IDENTITY: IdentityCompressor = IdentityCompressor;

impl CompressType {
    /// Returns the compressor selected by this header value.
    pub fn compressor(self) -> &'static dyn Compressor {
        match self {
            CompressType::Gzip => &GZIP,
            CompressType::None => &IDENTITY,
        }
    }
}
