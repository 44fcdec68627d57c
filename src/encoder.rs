//! SPDY header block encoder.

use std::fmt;
use std::io::{self, Write};

use flate2::write::ZlibEncoder;
use flate2::{Compress, Compression};
use log::{debug, trace, warn};

use crate::dictionary::HEADER_DICTIONARY;
use crate::error::{Error, Result};
use crate::headers::HeaderMap;

/// Encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// zlib compression level for the shared stream.
    pub level: Compression,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            level: Compression::best(),
        }
    }
}

/// Compresses header maps into SPDY header blocks.
///
/// All blocks produced by one encoder belong to a single zlib stream and must
/// reach the peer's decoder in order.
pub struct HeaderEncoder {
    context: Option<ZlibEncoder<Vec<u8>>>,
    config: EncoderConfig,
    poisoned: bool,
}

impl fmt::Debug for HeaderEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderEncoder")
            .field("started", &self.context.is_some())
            .field("config", &self.config)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

impl Default for HeaderEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderEncoder {
    pub fn new() -> Self {
        Self::with_config(EncoderConfig::default())
    }

    pub fn with_config(config: EncoderConfig) -> Self {
        Self {
            context: None,
            config,
            poisoned: false,
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// True once a failure has made this encoder unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Encodes `headers` into a compressed header block.
    ///
    /// Maps that cannot be represented on the wire are rejected with
    /// [`Error::InvalidHeader`] before the shared stream is touched, so the
    /// encoder stays usable afterwards.
    pub fn encode(&mut self, headers: &HeaderMap) -> Result<Vec<u8>> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }

        validate(headers)?;

        let result = self.compress(headers);
        if let Err(e) = &result {
            warn!("Header block encode failed, poisoning encoder: {}", e);
            self.poisoned = true;
        }
        result
    }

    /// Encodes `headers` and writes the compressed block to `sink`.
    ///
    /// A block lost to a failing sink is already part of the stream history,
    /// so the encoder is poisoned.
    pub fn encode_to<W: Write>(&mut self, sink: &mut W, headers: &HeaderMap) -> Result<()> {
        let block = self.encode(headers)?;
        if let Err(e) = sink.write_all(&block) {
            warn!("Header block write failed, poisoning encoder: {}", e);
            self.poisoned = true;
            return Err(e.into());
        }
        Ok(())
    }

    fn compress(&mut self, headers: &HeaderMap) -> Result<Vec<u8>> {
        let context = match self.context.take() {
            Some(context) => context,
            None => new_context(self.config.level)?,
        };
        let context = self.context.insert(context);

        write_block(context, headers)?;
        // Sync flush: every byte so far becomes decodable without ending the
        // stream.
        context.flush()?;

        let block = std::mem::take(context.get_mut());
        trace!("Encoded header block names={} bytes={}", headers.len(), block.len());
        Ok(block)
    }
}

fn new_context(level: Compression) -> Result<ZlibEncoder<Vec<u8>>> {
    debug!("Creating header compression context level={}", level.level());

    let mut compress = Compress::new(level, true);
    compress
        .set_dictionary(HEADER_DICTIONARY)
        .map_err(|e| Error::Compression(format!("dictionary rejected: {}", e)))?;

    Ok(ZlibEncoder::new_with_compress(Vec::new(), compress))
}

fn validate(headers: &HeaderMap) -> Result<()> {
    if u32::try_from(headers.len()).is_err() {
        return Err(Error::InvalidHeader("too many header names".into()));
    }

    for (name, values) in headers {
        if name.is_empty() {
            return Err(Error::InvalidHeader("empty header name".into()));
        }
        if name.contains('\0') || u32::try_from(name.len()).is_err() {
            return Err(Error::InvalidHeader(format!("unencodable header name {:?}", name)));
        }
        if values.iter().any(|v| v.contains('\0')) {
            return Err(Error::InvalidHeader(format!("value of {} contains a NUL byte", name)));
        }

        let separators = values.len().saturating_sub(1);
        let joined_len = values.iter().map(String::len).sum::<usize>() + separators;
        if u32::try_from(joined_len).is_err() {
            return Err(Error::InvalidHeader(format!("value of {} is too long", name)));
        }
    }

    Ok(())
}

/// Writes the uncompressed block layout: a count of names, then each name and
/// its NUL-joined values as length-prefixed strings.
fn write_block<W: Write>(w: &mut W, headers: &HeaderMap) -> io::Result<()> {
    w.write_all(&(headers.len() as u32).to_be_bytes())?;

    for (name, values) in headers {
        write_string(w, name.as_bytes())?;
        write_string(w, values.join("\0").as_bytes())?;
    }

    Ok(())
}

fn write_string<W: Write>(w: &mut W, data: &[u8]) -> io::Result<()> {
    w.write_all(&(data.len() as u32).to_be_bytes())?;
    w.write_all(data)
}
