use crate::key::{decode, Step, Token};

/// Incremental input decoder
///
/// Bytes are appended with [`Decoder::feed`], which returns an
/// iterator over the tokens that can be decoded so far.  Only the
/// unconsumed suffix (normally a partial escape sequence) is kept
/// between calls, so a complete event is never split across two
/// calls.  If no continuation arrives, [`Decoder::force`] decodes the
/// suffix as-is.
///
/// [`Decoder::feed`]: struct.Decoder.html#method.feed
/// [`Decoder::force`]: struct.Decoder.html#method.force
#[derive(Debug, Default)]
pub struct Decoder {
    pending: Vec<u8>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add input bytes and decode what is available.  Tokens are
    /// decoded lazily as the iterator is advanced.  Dropping the
    /// iterator early leaves the undecoded bytes pending.
    pub fn feed(&mut self, data: &[u8]) -> Feed<'_> {
        self.pending.extend_from_slice(data);
        Feed {
            pending: &mut self.pending,
            pos: 0,
            force: false,
        }
    }

    /// Decode the pending bytes without waiting for any more input
    pub fn force(&mut self) -> Feed<'_> {
        Feed {
            pending: &mut self.pending,
            pos: 0,
            force: true,
        }
    }

    /// Bytes waiting for more input
    pub fn pending(&self) -> &[u8] {
        &self.pending[..]
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Iterator over decoded tokens, see [`Decoder::feed`]
///
/// [`Decoder::feed`]: struct.Decoder.html#method.feed
pub struct Feed<'a> {
    pending: &'a mut Vec<u8>,
    pos: usize,
    force: bool,
}

impl Iterator for Feed<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            match decode(&self.pending[self.pos..], self.force) {
                Step::Incomplete => return None,
                Step::Skip(count) => {
                    tracing::trace!(
                        bytes = ?&self.pending[self.pos..self.pos + count],
                        "dropping undecodable input"
                    );
                    self.pos += count;
                }
                Step::Token(count, token) => {
                    self.pos += count;
                    return Some(token);
                }
            }
        }
    }
}

impl Drop for Feed<'_> {
    fn drop(&mut self) {
        self.pending.drain(..self.pos);
    }
}
