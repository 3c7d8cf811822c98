//! Text buffers edited by a [`crate::TextChange`] and their line structure.

use std::fmt;

use text_size::{TextRange, TextSize};

use crate::tree::EditError;

/// A mutable text buffer.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Document {
    text: String,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn len(&self) -> TextSize {
        TextSize::of(self.text.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn get(&self, range: TextRange) -> Option<&str> {
        self.text.get(std::ops::Range::<usize>::from(range))
    }

    /// Checks that `range` lies inside the buffer on character boundaries.
    pub fn check_range(&self, range: TextRange) -> Result<(), EditError> {
        let text_len = self.len();
        if range.end() > text_len {
            return Err(EditError::RangeOutOfBounds { range, text_len });
        }
        for offset in [range.start(), range.end()] {
            if !self.text.is_char_boundary(u32::from(offset) as usize) {
                return Err(EditError::InvalidUtf8Boundary { offset });
            }
        }
        Ok(())
    }

    /// Replaces `range` with `text` and returns the replaced text.
    pub fn replace(&mut self, range: TextRange, text: &str) -> Result<String, EditError> {
        self.check_range(range)?;
        Ok(self.replace_unchecked(range, text))
    }

    pub(crate) fn replace_unchecked(&mut self, range: TextRange, text: &str) -> String {
        let range = std::ops::Range::<usize>::from(range);
        let old = self.text[range.clone()].to_string();
        self.text.replace_range(range, text);
        old
    }

    pub fn line_index(&self) -> LineIndex {
        LineIndex::new(&self.text)
    }

    /// Returns the text of `region`, optionally widened to whole lines plus
    /// `surrounding_lines` lines on either side.
    ///
    /// `surrounding_lines` only applies when expanding to full lines.
    pub fn clip(
        &self,
        region: TextRange,
        expand_to_full_lines: bool,
        surrounding_lines: u32,
    ) -> Result<&str, EditError> {
        self.check_range(region)?;
        if !expand_to_full_lines {
            return Ok(&self.text[std::ops::Range::<usize>::from(region)]);
        }

        let index = self.line_index();
        let last_offset = if region.is_empty() {
            region.start()
        } else {
            region.end() - TextSize::from(1)
        };
        let start_line = index
            .line_of_offset(region.start())
            .saturating_sub(surrounding_lines);
        let end_line = index
            .line_of_offset(last_offset)
            .saturating_add(surrounding_lines)
            .min(index.line_count() - 1);

        let start = index.line_range(start_line).map(TextRange::start);
        let end = index.line_range(end_line).map(TextRange::end);
        match (start, end) {
            (Some(start), Some(end)) => Ok(&self.text[u32::from(start) as usize..u32::from(end) as usize]),
            _ => Err(EditError::RangeOutOfBounds {
                range: region,
                text_len: self.len(),
            }),
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Document").field(&self.text).finish()
    }
}

impl From<String> for Document {
    fn from(text: String) -> Self {
        Self { text }
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Line start/end offsets for one document snapshot.
///
/// Line ends exclude the delimiter. `\n`, `\r\n` and a lone `\r` all
/// terminate a line; a trailing delimiter starts an empty last line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineIndex {
    line_starts: Vec<TextSize>,
    line_ends: Vec<TextSize>,
    text_len: TextSize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut line_starts = vec![TextSize::from(0)];
        let mut line_ends = Vec::new();

        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    line_ends.push(TextSize::from(i as u32));
                    line_starts.push(TextSize::from((i + 1) as u32));
                    i += 1;
                }
                b'\r' => {
                    let delimiter = if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                    line_ends.push(TextSize::from(i as u32));
                    line_starts.push(TextSize::from((i + delimiter) as u32));
                    i += delimiter;
                }
                _ => i += 1,
            }
        }
        line_ends.push(TextSize::of(text));

        Self {
            line_starts,
            line_ends,
            text_len: TextSize::of(text),
        }
    }

    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    /// Zero-based line containing `offset`. Offsets past the end clamp to the
    /// last line.
    pub fn line_of_offset(&self, offset: TextSize) -> u32 {
        let offset = offset.min(self.text_len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(insert) => insert.saturating_sub(1),
        };
        line as u32
    }

    /// Region of `line` without its delimiter.
    pub fn line_range(&self, line: u32) -> Option<TextRange> {
        let start = *self.line_starts.get(line as usize)?;
        let end = *self.line_ends.get(line as usize)?;
        Some(TextRange::new(start, end))
    }
}
