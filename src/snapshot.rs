use crate::error::CollabError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorEntry {
    pub line: usize,
    pub column: usize,
    pub id: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub cursors: Vec<CursorEntry>,
    pub lines: Vec<Vec<u8>>,
}

impl Snapshot {
    pub fn build(lines: Vec<Vec<u8>>, mut cursors: Vec<CursorEntry>) -> Self {
        cursors.sort_by_key(|c| (c.line, c.column));
        Self { cursors, lines }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(self.cursors.len().to_string().into_bytes());
        out.push(b'\n');
        for c in &self.cursors {
            out.extend(c.line.to_string().into_bytes());
            out.push(b' ');
            out.extend(c.column.to_string().into_bytes());
            out.push(b' ');
            out.extend(c.id.to_string().into_bytes());
            out.push(b'\n');
        }
        out.extend(self.lines.len().to_string().into_bytes());
        out.push(b'\n');
        for line in &self.lines {
            out.extend_from_slice(line);
            out.push(b'\n');
        }
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, CollabError> {
        let mut reader = LineReader::new(bytes);

        let cursor_count = reader.read_usize_line()?;
        let mut cursors = Vec::with_capacity(cursor_count);
        for _ in 0..cursor_count {
            let line_text = reader.read_line()?;
            let mut parts = line_text.split(|&b| b == b' ');
            let line = parse_usize(parts.next().ok_or_else(|| malformed("missing cursor line"))?)?;
            let column =
                parse_usize(parts.next().ok_or_else(|| malformed("missing cursor column"))?)?;
            let id = parse_usize(parts.next().ok_or_else(|| malformed("missing cursor id"))?)?;
            cursors.push(CursorEntry { line, column, id });
        }

        let line_count = reader.read_usize_line()?;
        let mut lines = Vec::with_capacity(line_count);
        for _ in 0..line_count {
            lines.push(reader.read_line()?.to_vec());
        }

        Ok(Snapshot::build(lines, cursors))
    }
}

fn malformed(reason: &str) -> CollabError {
    CollabError::MalformedSnapshot(reason.to_string())
}

fn parse_usize(bytes: &[u8]) -> Result<usize, CollabError> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return Err(malformed("expected a decimal integer"));
    }
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| malformed("integer out of range"))
}

/// Splits a byte slice into `\n`-terminated lines without assuming UTF-8.
struct LineReader<'a> {
    rest: &'a [u8],
}

impl<'a> LineReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }

    fn read_line(&mut self) -> Result<&'a [u8], CollabError> {
        let newline_at = self
            .rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| malformed("unterminated line"))?;
        let (line, remainder) = self.rest.split_at(newline_at);
        self.rest = &remainder[1..];
        Ok(line)
    }

    fn read_usize_line(&mut self) -> Result<usize, CollabError> {
        parse_usize(self.read_line()?)
    }
}
