//! Undo/redo history of accepted results.

/// An append/truncate/navigate list of accepted outputs with a cursor.
///
/// The cursor is `None` exactly when the list is empty; otherwise it always
/// points at a valid entry. Appending while the cursor is behind the end
/// discards the redo branch first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultHistory {
    entries: Vec<String>,
    cursor: Option<usize>,
}

impl ResultHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a history from persisted parts.
    ///
    /// An index that does not point into `entries` is clamped: negative or
    /// oversized indices select the newest entry of a non-empty list.
    pub fn from_parts(entries: Vec<String>, index: i64) -> Self {
        let cursor = if entries.is_empty() {
            None
        } else {
            match usize::try_from(index) {
                Ok(i) if i < entries.len() => Some(i),
                _ => Some(entries.len() - 1),
            }
        };
        Self { entries, cursor }
    }

    /// Returns the entries and the persisted index (`-1` when empty).
    pub fn into_parts(self) -> (Vec<String>, i64) {
        let index = self.index();
        (self.entries, index)
    }

    /// Appends `text` after the cursor, discarding any entries beyond it.
    pub fn append(&mut self, text: impl Into<String>) {
        if let Some(cursor) = self.cursor {
            self.entries.truncate(cursor + 1);
        }
        self.entries.push(text.into());
        self.cursor = Some(self.entries.len() - 1);
    }

    /// Moves the cursor back one entry. Returns `false` at the start.
    pub fn go_prev(&mut self) -> bool {
        match self.cursor {
            Some(cursor) if cursor > 0 => {
                self.cursor = Some(cursor - 1);
                true
            }
            _ => false,
        }
    }

    /// Moves the cursor forward one entry. Returns `false` at the end.
    pub fn go_next(&mut self) -> bool {
        match self.cursor {
            Some(cursor) if cursor + 1 < self.entries.len() => {
                self.cursor = Some(cursor + 1);
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.cursor.map(|cursor| self.entries[cursor].as_str())
    }

    /// Replaces the entry at the cursor in place. Returns `false` when empty.
    pub fn set_current(&mut self, text: impl Into<String>) -> bool {
        match self.cursor {
            Some(cursor) => {
                self.entries[cursor] = text.into();
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The cursor in persisted form: `-1` when empty.
    pub fn index(&self) -> i64 {
        self.cursor.map_or(-1, |cursor| cursor as i64)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_go_prev(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor > 0)
    }

    pub fn can_go_next(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor + 1 < self.entries.len())
    }
}
