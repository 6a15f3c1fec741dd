//! Line input shared between the session prompt and the permission gate.
//!
//! Both read the same terminal. Buffering it twice would let one reader
//! swallow a line meant for the other, so every consumer goes through one
//! [`SharedLines`] handle.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;

/// The process stdin as a shared line source.
pub type StdinLines = SharedLines<BufReader<Stdin>>;

struct State<R> {
    reader: R,
    /// Bytes of a line whose read was interrupted.
    pending: Vec<u8>,
}

/// A cloneable handle reading whole lines from one underlying stream.
pub struct SharedLines<R> {
    state: Arc<Mutex<State<R>>>,
}

impl<R> Clone for SharedLines<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl StdinLines {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> SharedLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                reader,
                pending: Vec::new(),
            })),
        }
    }

    /// The next line without its terminator, or `None` at end of input.
    ///
    /// Cancel safe: if the returned future is dropped mid-line, the bytes
    /// read so far are kept and the next call completes that line.
    pub async fn next_line(&self) -> io::Result<Option<String>> {
        let mut state = self.state.lock().await;
        let State { reader, pending } = &mut *state;
        let read = reader.read_until(b'\n', pending).await?;
        if read == 0 && pending.is_empty() {
            return Ok(None);
        }

        let mut line = std::mem::take(pending);
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}
