//! Header blocks delivered in fragments through the swappable source

use std::io::{self, Cursor, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use spdy_headers::{Error, HeaderDecoder, HeaderEncoder, HeaderMap, Result};

use super::{dictionary_headers, headers};

/// Fragment reader that reports when it has been drained.
struct Fragment {
    inner: Cursor<Vec<u8>>,
    drained: Option<Sender<()>>,
}

impl Fragment {
    fn new(bytes: &[u8]) -> (Self, Receiver<()>) {
        let (tx, rx) = mpsc::channel();
        let fragment = Self {
            inner: Cursor::new(bytes.to_vec()),
            drained: Some(tx),
        };
        (fragment, rx)
    }
}

impl Read for Fragment {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            if let Some(tx) = self.drained.take() {
                let _ = tx.send(());
            }
        }
        Ok(n)
    }
}

/// A connection that stays open: bytes arrive over a channel until the
/// sending side is dropped.
struct Live {
    rx: Receiver<Vec<u8>>,
    buffered: Cursor<Vec<u8>>,
}

impl Live {
    fn new() -> (Self, Sender<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        let live = Self {
            rx,
            buffered: Cursor::new(Vec::new()),
        };
        (live, tx)
    }
}

impl Read for Live {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.buffered.read(buf)?;
            if n > 0 || buf.is_empty() {
                return Ok(n);
            }
            match self.rx.recv() {
                Ok(bytes) => self.buffered = Cursor::new(bytes),
                Err(_) => return Ok(0),
            }
        }
    }
}

struct Failing;

impl Read for Failing {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::TimedOut, "no more header bytes"))
    }
}

/// Waits until `rx` fires or the worker finished without needing it.
fn wait_drained<T>(rx: &Receiver<()>, worker: &thread::JoinHandle<T>) {
    loop {
        match rx.recv_timeout(Duration::from_millis(10)) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) if worker.is_finished() => return,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

/// Decodes one block whose bytes arrive as `fragments`, each attached only
/// after the previous one has been drained by the blocked decoder.
fn decode_fragmented(
    mut decoder: HeaderDecoder,
    fragments: &[&[u8]],
) -> (HeaderDecoder, Result<HeaderMap>) {
    let handle = decoder.handle();
    let (first, mut drained) = Fragment::new(fragments[0]);

    let worker = thread::spawn(move || {
        let result = decoder.decode_from(first);
        (decoder, result)
    });

    for bytes in &fragments[1..] {
        wait_drained(&drained, &worker);
        let (fragment, rx) = Fragment::new(bytes);
        handle.attach(fragment);
        drained = rx;
    }

    worker.join().unwrap()
}

fn random_value(len: usize) -> String {
    let mut state = 0x9e37_79b9_u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            char::from(b'0' + (state % 75) as u8)
        })
        .collect()
}

#[test]
fn test_every_two_way_split_decodes_identically() {
    let input = dictionary_headers();
    let follow_up = headers(&[("status", "304 Not Modified"), ("version", "HTTP/1.1")]);

    let mut encoder = HeaderEncoder::new();
    let block = encoder.encode(&input).unwrap();
    let next = encoder.encode(&follow_up).unwrap();

    let whole = HeaderDecoder::new().decode(&block).unwrap();
    assert_eq!(whole, input);

    for k in 1..block.len() {
        let (head, tail) = block.split_at(k);
        let (mut decoder, result) = decode_fragmented(HeaderDecoder::new(), &[head, tail]);

        assert_eq!(result.unwrap(), whole, "split at {}", k);
        // The stream stays aligned for the next block.
        assert_eq!(decoder.decode(&next).unwrap(), follow_up, "split at {}", k);
    }
}

#[test]
fn test_single_byte_fragments() {
    let mut encoder = HeaderEncoder::new();
    let input = headers(&[("method", "GET"), ("url", "/a/b/c"), ("host", "example.org")]);
    let block = encoder.encode(&input).unwrap();

    let fragments: Vec<&[u8]> = block.chunks(1).collect();
    let (mut decoder, result) = decode_fragmented(HeaderDecoder::new(), &fragments);
    assert_eq!(result.unwrap(), input);

    let again = encoder.encode(&input).unwrap();
    assert_eq!(decoder.decode(&again).unwrap(), input);
}

#[test]
fn test_consecutive_blocks_in_three_fragments() {
    let mut encoder = HeaderEncoder::new();
    let mut decoder = HeaderDecoder::new();

    for i in 0..5 {
        let id = format!("req-{}", i);
        let value = random_value(300 + i * 50);
        let input = headers(&[("x-request-id", id.as_str()), ("x-payload", value.as_str())]);
        let block = encoder.encode(&input).unwrap();

        let third = block.len() / 3;
        let fragments = [&block[..third], &block[third..2 * third], &block[2 * third..]];

        let (returned, result) = decode_fragmented(decoder, &fragments);
        assert_eq!(result.unwrap(), input, "block {}", i);
        decoder = returned;
    }
}

#[test]
fn test_fragments_attached_ahead_of_decode() {
    let mut encoder = HeaderEncoder::new();
    let mut decoder = HeaderDecoder::new();

    let input = headers(&[("content-type", "text/html"), ("content-length", "2048")]);
    let block = encoder.encode(&input).unwrap();
    let (head, tail) = block.split_at(block.len() / 2);

    // Queued sources are read in attach order.
    decoder.handle().attach(Cursor::new(head.to_vec()));
    assert_eq!(decoder.decode_from(Cursor::new(tail.to_vec())).unwrap(), input);
}

#[test]
fn test_abandoned_decode_fails_and_poisons() {
    let mut encoder = HeaderEncoder::new();
    let value = random_value(4000);
    let block = encoder.encode(&headers(&[("x-payload", value.as_str())])).unwrap();

    let decoder = HeaderDecoder::new();
    let handle = decoder.handle();
    let (head, drained) = Fragment::new(&block[..block.len() / 2]);

    let worker = thread::spawn(move || {
        let mut decoder = decoder;
        let result = decoder.decode_from(head);
        (decoder, result)
    });

    // The rest never arrives; give up the way a caller with a deadline would.
    wait_drained(&drained, &worker);
    handle.attach(Failing);

    let (decoder, result) = worker.join().unwrap();
    match result {
        Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
        other => panic!("Expected Io, got {:?}", other),
    }
    assert!(decoder.is_poisoned());
}

#[test]
fn test_decode_returns_while_source_stays_open() {
    let mut encoder = HeaderEncoder::new();
    let first = headers(&[("method", "GET"), ("url", "/stream")]);
    let second = headers(&[("method", "POST"), ("url", "/stream")]);

    let (live, tx) = Live::new();
    let (results_tx, results) = mpsc::channel();

    let worker = thread::spawn(move || {
        let mut decoder = HeaderDecoder::new();
        results_tx.send(decoder.decode_from(live)).unwrap();
        // The next block keeps reading the same open connection.
        results_tx.send(decoder.decode_from(io::empty())).unwrap();
    });

    tx.send(encoder.encode(&first).unwrap()).unwrap();
    let decoded = results.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(decoded.unwrap(), first);

    tx.send(encoder.encode(&second).unwrap()).unwrap();
    let decoded = results.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(decoded.unwrap(), second);

    drop(tx);
    worker.join().unwrap();
}
