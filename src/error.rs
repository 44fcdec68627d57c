//! Error types for header block encoding and decoding.

use std::io;

/// Errors produced by [`HeaderDecoder`](crate::HeaderDecoder) and
/// [`HeaderEncoder`](crate::HeaderEncoder).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The decompressed block is inconsistent with its own length prefixes.
    #[error("malformed header block: {0}")]
    Malformed(String),

    /// The decompressed block would exceed the configured size limit.
    #[error("header block exceeds {limit} bytes")]
    BlockTooLarge { limit: usize },

    /// zlib rejected the stream: bad header, corruption or a dictionary mismatch.
    #[error("compression error: {0}")]
    Compression(String),

    /// The attached byte source or the output sink failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The header map cannot be represented on the wire.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// An earlier failure left the shared compression context unusable.
    #[error("codec poisoned by an earlier error")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true if the error left the codec instance unusable.
    ///
    /// Validation failures are reported before the shared stream is touched,
    /// so they are the only recoverable kind.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::InvalidHeader(_))
    }
}

/// Marker payload for zlib failures that have to travel through `io::Read`.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct StreamError(pub(crate) String);

impl StreamError {
    pub(crate) fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, self)
    }
}

/// Maps an error raised while reading through the decompression context back
/// onto the codec's error kinds.
pub(crate) fn from_read(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        return Error::Malformed("compressed stream ended inside a header block".into());
    }

    let is_stream_error = err
        .get_ref()
        .is_some_and(|inner| inner.is::<StreamError>());
    if is_stream_error {
        let msg = err.into_inner().map(|inner| inner.to_string()).unwrap_or_default();
        return Error::Compression(msg);
    }

    Error::Io(err)
}
