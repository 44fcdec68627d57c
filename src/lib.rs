//! spdy-headers: A minimal SPDY/3 header block codec
//!
//! This crate turns a header multimap into a zlib-compressed SPDY header block
//! and back. Both directions keep one zlib stream alive per connection, seeded
//! with the SPDY/3 preset dictionary, so common names and values cost only a
//! few bits even in the first block.
//!
//! # Features
//!
//! - **Shared Compression Context**: One long-lived zlib stream per encoder or
//!   decoder, created lazily and never reset
//! - **Preset Dictionary**: The published SPDY/3 dictionary, byte for byte
//! - **Fragmented Input**: A header block split across several frames can be
//!   fed piece by piece while the decoder waits for the rest
//! - **Fail Fast**: A failure poisons the instance, since a zlib stream cannot
//!   resynchronize after corruption
//!
//! # Quick Start
//!
//! ```rust
//! use spdy_headers::{HeaderDecoder, HeaderEncoder, HeaderMap};
//!
//! let mut encoder = HeaderEncoder::new();
//! let mut decoder = HeaderDecoder::new();
//!
//! let mut headers = HeaderMap::new();
//! headers.append("Method", "GET");
//! headers.append("Set-Cookie", "a=1");
//! headers.append("Set-Cookie", "b=2");
//!
//! let block = encoder.encode(&headers).unwrap();
//! let decoded = decoder.decode(&block).unwrap();
//!
//! assert_eq!(decoded.get("method"), Some("GET"));
//! assert_eq!(decoded.get_all("set-cookie"), ["a=1", "b=2"]);
//! ```
//!
//! # Architecture
//!
//! This crate is intentionally minimal. It provides:
//! - The preset dictionary ([`HEADER_DICTIONARY`])
//! - A swappable blocking byte source ([`SwapSource`], [`SourceHandle`])
//! - Header block decoding ([`HeaderDecoder`]) and encoding ([`HeaderEncoder`])
//!
//! It does NOT provide:
//! - Frame parsing or reassembly (you provide the header block bytes)
//! - Stream multiplexing or flow control
//! - Timeouts (abandon a stuck decode by attaching a failing source)

pub mod decoder;
pub mod dictionary;
pub mod encoder;
pub mod error;
pub mod headers;
pub mod source;

pub use decoder::{DecoderConfig, HeaderDecoder, MAX_HEADER_BLOCK_SIZE};
pub use dictionary::HEADER_DICTIONARY;
pub use encoder::{EncoderConfig, HeaderEncoder};
pub use error::{Error, Result};
pub use headers::HeaderMap;
pub use source::{BoxedSource, SourceHandle, SwapSource};

pub use flate2::Compression;
