//! Sentence segmentation for streamed replies
//!
//! Reply text is fed in chunks as it arrives. A sentence is complete once a
//! terminator (`.`, `!`, `?`) is followed by whitespace; a terminator at the
//! very end of the buffered text is held back because the next chunk may
//! continue it ("3." → "3.5", "e.g").

/// A segmented piece of reply text, ready for synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceUnit {
    /// Position within the reply, contiguous from 0
    pub index: u64,

    /// Trimmed sentence text, never empty
    pub text: String,

    /// Whether the unit closed on a sentence terminator
    pub terminal: bool,
}

impl SentenceUnit {
    #[must_use]
    pub fn new(index: u64, text: impl Into<String>, terminal: bool) -> Self {
        Self {
            index,
            text: text.into(),
            terminal,
        }
    }
}

const fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Incremental splitter of reply text into [`SentenceUnit`]s
#[derive(Debug, Clone, Default)]
pub struct SentenceSegmenter {
    buffer: String,
    next_index: u64,
}

impl SentenceSegmenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every sentence it completes
    pub fn feed(&mut self, chunk: &str) -> Vec<SentenceUnit> {
        self.buffer.push_str(chunk);

        let mut units = Vec::new();
        while let Some((end, resume)) = find_boundary(&self.buffer) {
            let sentence = self.buffer[..end].trim().to_string();
            self.buffer.drain(..resume);

            if sentence.is_empty() {
                continue;
            }

            units.push(self.emit(sentence, true));
        }

        units
    }

    /// Emit whatever remains once the reply is complete
    ///
    /// End of input closes a trailing terminator, so "How are you?" flushes
    /// as a terminal unit while "Wait, hold on" flushes as non-terminal.
    pub fn flush(&mut self) -> Option<SentenceUnit> {
        let remainder = self.buffer.trim().to_string();
        self.buffer.clear();

        if remainder.is_empty() {
            return None;
        }

        let terminal = remainder.ends_with(is_terminator);
        Some(self.emit(remainder, terminal))
    }

    /// Drop buffered text and restart numbering for a new reply
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.next_index = 0;
    }

    /// Index the next emitted unit will carry
    #[must_use]
    pub const fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Buffered text not yet emitted
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn emit(&mut self, text: String, terminal: bool) -> SentenceUnit {
        let unit = SentenceUnit::new(self.next_index, text, terminal);
        self.next_index += 1;
        unit
    }
}

/// Locate the first terminator followed by whitespace
///
/// Returns the byte offset just past the terminator and the offset just past
/// the whitespace character that confirmed it.
fn find_boundary(text: &str) -> Option<(usize, usize)> {
    let mut chars = text.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if !is_terminator(c) {
            continue;
        }

        if let Some(&(next_pos, next)) = chars.peek() {
            if next.is_whitespace() {
                return Some((pos + c.len_utf8(), next_pos + next.len_utf8()));
            }
        }
    }

    None
}

/// Segment a complete reply in one pass
#[must_use]
pub fn segment(text: &str) -> Vec<SentenceUnit> {
    let mut segmenter = SentenceSegmenter::new();
    let mut units = segmenter.feed(text);
    units.extend(segmenter.flush());
    units
}
