//! A byte source whose backing reader can be swapped while a reader waits.
//!
//! The decompression context reads from [`SwapSource`] as from any other
//! `io::Read`. Each new chunk of compressed header bytes (typically one frame
//! payload) is handed over with [`SwapSource::attach`] or through a cloned
//! [`SourceHandle`] on another thread. When the current chunk runs dry the
//! read returns `Ok(0)` and the slot is cleared; the next read blocks until
//! another chunk is attached.
//!
//! The handoff is a single-slot mailbox guarded by one mutex, with a condvar
//! signalled once per attach. The reader owns the chunk it is draining and
//! only touches the mailbox to pick up the next one, so a single `read` is
//! always served by exactly one chunk and `attach` never waits on a read.
//! Attaching twice before the reader picks anything up chains the second
//! source behind the first rather than dropping bytes.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::{Condvar, Mutex};

/// A type-erased byte source that can cross threads.
pub type BoxedSource = Box<dyn Read + Send>;

#[derive(Default)]
struct Mailbox {
    next: Mutex<Option<BoxedSource>>,
    attached: Condvar,
}

impl Mailbox {
    fn put(&self, source: BoxedSource) {
        let mut next = self.next.lock();
        let source: BoxedSource = match next.take() {
            // Never picked up: keep its bytes ahead of the new ones.
            Some(pending) => {
                debug!("Chaining header source behind an unread pending one");
                Box::new(pending.chain(source))
            }
            None => source,
        };
        *next = Some(source);
        drop(next);

        self.attached.notify_one();
    }

    fn take(&self) -> BoxedSource {
        let mut next = self.next.lock();
        loop {
            if let Some(source) = next.take() {
                return source;
            }
            trace!("Waiting for a header source to be attached");
            self.attached.wait(&mut next);
        }
    }

    fn is_pending(&self) -> bool {
        self.next.lock().is_some()
    }
}

/// Reader half of the swappable source. Owned by one decoder.
#[derive(Default)]
pub struct SwapSource {
    mailbox: Arc<Mailbox>,
    current: Option<BoxedSource>,
}

impl fmt::Debug for SwapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwapSource")
            .field("current", &self.current.is_some())
            .field("pending", &self.mailbox.is_pending())
            .finish()
    }
}

impl SwapSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a cloneable endpoint that can attach sources from any thread.
    pub fn handle(&self) -> SourceHandle {
        SourceHandle {
            mailbox: Arc::clone(&self.mailbox),
        }
    }

    /// Hands `source` to the reader. If the reader is still draining an
    /// earlier source, `source` is picked up once that one is exhausted.
    /// If another source is already waiting, `source` is read after it.
    pub fn attach<R: Read + Send + 'static>(&self, source: R) {
        self.mailbox.put(Box::new(source));
    }

    /// True while a source is being drained by the reader.
    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    /// True if an attached source is waiting to be picked up.
    pub fn has_pending(&self) -> bool {
        self.mailbox.is_pending()
    }
}

impl Read for SwapSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mailbox = &self.mailbox;
        let source = self.current.get_or_insert_with(|| mailbox.take());

        let result = loop {
            match source.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        match result {
            Ok(0) => {
                // Exhausted: not the end of the compressed stream, just of
                // this chunk. The next read waits for another attach.
                self.current = None;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.current = None;
                Err(e)
            }
        }
    }
}

/// Attach-only endpoint of a [`SwapSource`].
#[derive(Clone)]
pub struct SourceHandle {
    mailbox: Arc<Mailbox>,
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandle")
            .field("pending", &self.mailbox.is_pending())
            .finish()
    }
}

impl SourceHandle {
    /// Same as [`SwapSource::attach`], callable from another thread.
    pub fn attach<R: Read + Send + 'static>(&self, source: R) {
        self.mailbox.put(Box::new(source));
    }
}
