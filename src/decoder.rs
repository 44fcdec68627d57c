//! SPDY header block decoder.
//!
//! One decoder owns one zlib stream for the lifetime of a connection. Every
//! header block received on that connection continues the same stream, so
//! blocks must be decoded in the order the peer produced them.

use std::fmt;
use std::io::{self, Read};

use flate2::{Decompress, FlushDecompress, Status};
use log::{debug, trace, warn};

use crate::dictionary::HEADER_DICTIONARY;
use crate::error::{self, Error, Result, StreamError};
use crate::headers::HeaderMap;
use crate::source::{SourceHandle, SwapSource};

/// Default limit on the decompressed size of one header block (256 KB).
/// Bounds allocations driven by untrusted length prefixes.
pub const MAX_HEADER_BLOCK_SIZE: usize = 256 * 1024;

/// Smallest possible entry: two empty length-prefixed strings.
const MIN_ENTRY_SIZE: usize = 8;

const INPUT_CHUNK: usize = 4096;

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Largest decompressed header block accepted, in bytes.
    pub max_block_size: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_block_size: MAX_HEADER_BLOCK_SIZE,
        }
    }
}

/// Long-lived decompression context: the zlib stream plus whatever
/// compressed input it has been handed but not yet consumed.
struct Inflate {
    stream: Decompress,
    input: Vec<u8>,
    pos: usize,
}

impl Inflate {
    fn new() -> Self {
        debug!("Creating header decompression context");
        Self {
            stream: Decompress::new(true),
            input: Vec::with_capacity(INPUT_CHUNK),
            pos: 0,
        }
    }

    /// Replaces the consumed input with the next chunk from `source`.
    /// A zero-length chunk means the current source ran dry.
    fn refill(&mut self, source: &mut SwapSource) -> io::Result<()> {
        self.input.clear();
        self.input.resize(INPUT_CHUNK, 0);
        self.pos = 0;

        match source.read(&mut self.input) {
            Ok(n) => {
                self.input.truncate(n);
                Ok(())
            }
            Err(e) => {
                self.input.clear();
                Err(e)
            }
        }
    }

    fn inflate(&mut self, source: &mut SwapSource, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        loop {
            let before_in = self.stream.total_in();
            let before_out = self.stream.total_out();

            let status = self
                .stream
                .decompress(&self.input[self.pos..], out, FlushDecompress::None);

            let consumed = (self.stream.total_in() - before_in) as usize;
            let produced = (self.stream.total_out() - before_out) as usize;
            self.pos += consumed;

            match status {
                Ok(Status::StreamEnd) => return Ok(produced),
                Ok(Status::Ok) | Ok(Status::BufError) => {
                    if produced > 0 {
                        return Ok(produced);
                    }
                    if self.pos == self.input.len() {
                        // Blocks in the source until more bytes are attached.
                        self.refill(source)?;
                    } else if consumed == 0 {
                        return Err(StreamError("inflate made no progress".into()).into_io());
                    }
                }
                Err(e) => match e.needs_dictionary() {
                    Some(adler) => {
                        debug!("Installing header dictionary adler32={:#010x}", adler);
                        self.stream.set_dictionary(HEADER_DICTIONARY).map_err(|e| {
                            StreamError(format!("dictionary rejected: {}", e)).into_io()
                        })?;
                    }
                    None => return Err(StreamError(e.to_string()).into_io()),
                }
            }
        }
    }
}

/// `io::Read` view over the context, charging every length-prefixed field
/// against the block budget before it is read.
struct BlockReader<'a> {
    context: &'a mut Inflate,
    source: &'a mut SwapSource,
    remaining: usize,
    limit: usize,
}

impl Read for BlockReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.context.inflate(self.source, buf)
    }
}

impl BlockReader<'_> {
    fn reserve(&mut self, len: usize) -> Result<()> {
        self.remaining = self
            .remaining
            .checked_sub(len)
            .ok_or(Error::BlockTooLarge { limit: self.limit })?;
        Ok(())
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.reserve(4)?;
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf).map_err(error::from_read)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_string(&mut self, what: &str) -> Result<String> {
        let len = self.read_u32()? as usize;
        self.reserve(len)?;

        let mut data = vec![0u8; len];
        self.read_exact(&mut data).map_err(error::from_read)?;

        String::from_utf8(data)
            .map_err(|_| Error::Malformed(format!("header {} is not valid UTF-8", what)))
    }

    fn read_headers(&mut self) -> Result<HeaderMap> {
        let count = self.read_u32()? as usize;

        // Reject impossible counts before looping over them.
        match count.checked_mul(MIN_ENTRY_SIZE) {
            Some(min) if min <= self.remaining => {}
            _ => return Err(Error::BlockTooLarge { limit: self.limit }),
        }

        trace!("Header block count={}", count);

        let mut headers = HeaderMap::new();
        for _ in 0..count {
            let name = self.read_string("name")?;
            if name.is_empty() {
                return Err(Error::Malformed("empty header name".into()));
            }

            let value = self.read_string("value")?;
            trace!("Header name={} value_len={}", name, value.len());

            for v in value.split('\0') {
                headers.append(&name, v);
            }
        }

        Ok(headers)
    }
}

/// Decodes zlib-compressed SPDY header blocks, possibly split across several
/// byte sources.
pub struct HeaderDecoder {
    source: SwapSource,
    context: Option<Inflate>,
    config: DecoderConfig,
    poisoned: bool,
}

impl fmt::Debug for HeaderDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderDecoder")
            .field("source", &self.source)
            .field("started", &self.context.is_some())
            .field("config", &self.config)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderDecoder {
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            source: SwapSource::new(),
            context: None,
            config,
            poisoned: false,
        }
    }

    /// Endpoint for attaching further fragments of a block while
    /// [`decode`](Self::decode) waits for them on another thread.
    ///
    /// Attaching a source that fails is also the way to abandon a decode
    /// stuck waiting for bytes that will never arrive.
    pub fn handle(&self) -> SourceHandle {
        self.source.handle()
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// True once a failure has made this decoder unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Decodes a header block that is already fully assembled.
    ///
    /// If `block` holds only part of the compressed block, this waits until
    /// the rest is attached through [`handle`](Self::handle).
    pub fn decode(&mut self, block: &[u8]) -> Result<HeaderMap> {
        self.decode_from(io::Cursor::new(block.to_vec()))
    }

    /// Decodes a header block read from `source`.
    ///
    /// Returns as soon as the last entry is read; `source` may stay open.
    /// Whatever it still holds (at least the block's trailing flush marker)
    /// is read first by the next decode, ahead of the source passed to it.
    pub fn decode_from<R: Read + Send + 'static>(&mut self, source: R) -> Result<HeaderMap> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }

        self.source.attach(source);

        let result = self.read_block();
        if let Err(e) = &result {
            warn!("Header block decode failed, poisoning decoder: {}", e);
            self.poisoned = true;
        }
        result
    }

    fn read_block(&mut self) -> Result<HeaderMap> {
        let context = self.context.get_or_insert_with(Inflate::new);

        let mut reader = BlockReader {
            context,
            source: &mut self.source,
            remaining: self.config.max_block_size,
            limit: self.config.max_block_size,
        };

        let headers = reader.read_headers()?;
        let size = reader.limit - reader.remaining;

        trace!("Decoded header block names={} bytes={}", headers.len(), size);
        Ok(headers)
    }
}
