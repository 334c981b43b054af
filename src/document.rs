#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    lines: Vec<Vec<u8>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            lines: vec![Vec::new()],
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line_length(&self, line: usize) -> usize {
        self.lines.get(line).map_or(0, Vec::len)
    }

    pub fn line(&self, line: usize) -> &[u8] {
        self.lines.get(line).map_or(&[], Vec::as_slice)
    }

    pub fn lines(&self) -> &[Vec<u8>] {
        &self.lines
    }

    pub fn insert_line(&mut self, line: usize, content: impl Into<Vec<u8>>) {
        let line = line.min(self.line_count());
        self.lines.insert(line, content.into());
    }

    /// Removes `line` if in range. Never leaves the document with zero
    /// lines: deleting the last remaining line replaces it with an empty
    /// one instead (the original source's `line_count - 1 == -1` case,
    /// fixed here rather than reproduced).
    pub fn delete_line(&mut self, line: usize) {
        if line >= self.line_count() {
            return;
        }
        self.lines.remove(line);
        if self.lines.is_empty() {
            self.lines.push(Vec::new());
        }
    }

    pub fn break_line(&mut self, line: usize, column: usize) {
        if line >= self.line_count() {
            return;
        }
        let suffix = self.lines[line].split_off(column.min(self.lines[line].len()));
        self.lines.insert(line + 1, suffix);
    }

    pub fn insert_char(&mut self, line: usize, column: usize, byte: u8) {
        if line >= self.line_count() {
            return;
        }
        let column = column.min(self.lines[line].len());
        self.lines[line].insert(column, byte);
    }

    /// At end-of-line, joins the next line onto this one instead of
    /// deleting a byte (there is no newline byte to delete, only the
    /// logical line break).
    pub fn delete_char(&mut self, line: usize, column: usize) {
        if line >= self.line_count() {
            return;
        }
        let len = self.line_length(line);
        if column == len && line + 1 < self.line_count() {
            let next = self.lines.remove(line + 1);
            self.lines[line].extend(next);
        } else if column < len {
            self.lines[line].remove(column);
        }
    }
}

/// Holds no reference back to a Document; every operation takes the document
/// it applies to as an explicit parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub line: usize,
    pub column: usize,
}

impl Cursor {
    pub fn new() -> Self {
        Self { line: 0, column: 0 }
    }

    pub fn sync(&mut self, document: &Document) {
        if self.line >= document.line_count() {
            self.line = document.line_count() - 1;
            self.column = document.line_length(self.line);
        } else {
            self.column = self.column.min(document.line_length(self.line));
        }
    }

    pub fn home(&mut self, document: &Document) {
        self.sync(document);
        self.column = 0;
    }

    pub fn end(&mut self, document: &Document) {
        self.sync(document);
        self.column = document.line_length(self.line);
    }

    pub fn up(&mut self, document: &Document) {
        self.sync(document);
        if self.line == 0 {
            self.home(document);
        } else {
            self.line -= 1;
            self.sync(document);
        }
    }

    pub fn down(&mut self, document: &Document) {
        self.sync(document);
        self.line += 1;
        self.sync(document);
    }

    pub fn left(&mut self, document: &Document) {
        self.sync(document);
        if self.column > 0 {
            self.column -= 1;
        } else if self.line > 0 {
            self.up(document);
            self.end(document);
        }
    }

    pub fn right(&mut self, document: &Document) {
        self.sync(document);
        if self.column < document.line_length(self.line) {
            self.column += 1;
        } else if self.line + 1 < document.line_count() {
            self.down(document);
            self.home(document);
        }
    }

    pub fn write(&mut self, document: &mut Document, byte: u8) {
        self.sync(document);
        document.insert_char(self.line, self.column, byte);
        self.right(document);
    }

    pub fn del(&mut self, document: &mut Document) {
        self.sync(document);
        document.delete_char(self.line, self.column);
    }

    pub fn backspace(&mut self, document: &mut Document) {
        if self.line == 0 && self.column == 0 {
            return;
        }
        self.sync(document);
        self.left(document);
        self.del(document);
    }

    pub fn break_line(&mut self, document: &mut Document) {
        self.sync(document);
        document.break_line(self.line, self.column);
        self.down(document);
        self.home(document);
    }

    /// Advances to the next multiple-of-4 column by writing spaces.
    pub fn tab(&mut self, document: &mut Document) {
        self.sync(document);
        let target = ((self.column + 4) / 4) * 4;
        while self.column < target {
            self.write(document, b' ');
        }
    }
}
