//! Documents and line-level editing.
//!
//! A [`Document`] is an ordered list of [`Statement`]s. Edits are collected
//! by a [`DocumentEditor`] and applied in order by [`Document::apply`], which
//! reports the pre-edit statements whose subtrees the edit touched.

use std::fmt;

use crate::error::CoreError;
use crate::id::{DocumentId, StatementId};
use crate::statement::{Statement, StatementKind};
use crate::uri::Uri;

/// Allocates program-unique statement IDs.
#[derive(Debug, Default)]
pub struct StatementIds {
    next: u32,
}

impl StatementIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> StatementId {
        let id = StatementId(self.next);
        self.next += 1;
        id
    }
}

/// A single line-level edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEdit {
    /// Replaces the text of the statement at `line`.
    Update { line: usize, text: String },
    /// Inserts a new statement before `line` (or at the end).
    Insert { line: usize, text: String },
    /// Deletes `count` statements starting at `line`.
    Delete { line: usize, count: usize },
}

/// Collects the edits of one edit transaction.
#[derive(Debug, Default)]
pub struct DocumentEditor {
    edits: Vec<DocumentEdit>,
}

impl DocumentEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, text: &str, line: usize) -> &mut Self {
        self.edits.push(DocumentEdit::Update {
            line,
            text: text.to_string(),
        });
        self
    }

    pub fn insert(&mut self, text: &str, line: usize) -> &mut Self {
        self.edits.push(DocumentEdit::Insert {
            line,
            text: text.to_string(),
        });
        self
    }

    pub fn delete(&mut self, line: usize, count: usize) -> &mut Self {
        self.edits.push(DocumentEdit::Delete { line, count });
        self
    }

    pub fn into_edits(self) -> Vec<DocumentEdit> {
        self.edits
    }
}

/// A source document.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    uri: Uri,
    statements: Vec<Statement>,
}

impl Document {
    /// Reads a document from its full text.
    pub fn new(id: DocumentId, uri: Uri, text: &str, ids: &mut StatementIds) -> Self {
        let statements = if text.is_empty() {
            Vec::new()
        } else {
            text.split('\n')
                .enumerate()
                .map(|(line, t)| Statement::read(ids.next_id(), line as u32, t))
                .collect()
        };
        Document {
            id,
            uri: uri.document_uri(),
            statements,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Returns the statement at `line`, if any.
    pub fn read(&self, line: usize) -> Option<&Statement> {
        self.statements.get(line)
    }

    /// Returns the document references declared at the root of this
    /// document, in order.
    pub fn references(&self) -> impl Iterator<Item = (&Statement, &Uri)> {
        self.statements.iter().filter_map(|s| match &s.kind {
            StatementKind::Reference(uri) => Some((s, uri)),
            _ => None,
        })
    }

    /// Returns the IDs of the statement at `line` and every statement nested
    /// beneath it.
    pub fn subtree(&self, line: usize) -> Vec<StatementId> {
        let Some(root) = self.statements.get(line) else {
            return Vec::new();
        };

        let mut out = vec![root.id];
        if root.is_noise() {
            return out;
        }

        for stmt in &self.statements[line + 1..] {
            if !stmt.is_noise() && stmt.indent <= root.indent {
                break;
            }
            out.push(stmt.id);
        }
        out
    }

    /// Returns the line of the nearest statement above `line` whose indent is
    /// smaller than `indent`.
    pub fn parent_line(&self, line: usize, indent: u32) -> Option<usize> {
        self.statements[..line.min(self.statements.len())]
            .iter()
            .rposition(|s| !s.is_noise() && s.indent < indent)
    }

    /// Applies a sequence of edits in order.
    ///
    /// Returns the IDs of the pre-edit statements whose subtrees were
    /// touched: updated and deleted statements with their descendants, and
    /// the parent subtree of each insertion point. Updates that leave the
    /// text unchanged touch nothing and keep the statement's identity.
    pub fn apply(
        &mut self,
        edits: &[DocumentEdit],
        ids: &mut StatementIds,
    ) -> Result<Vec<StatementId>, CoreError> {
        let mut touched: Vec<StatementId> = Vec::new();

        for edit in edits {
            let len = self.statements.len();
            match edit {
                DocumentEdit::Update { line, text } => {
                    if *line >= len {
                        return Err(CoreError::LineOutOfRange { line: *line, len });
                    }
                    if self.statements[*line].text == *text {
                        continue;
                    }
                    push_all(&mut touched, self.subtree(*line));
                    self.statements[*line] = Statement::read(ids.next_id(), *line as u32, text);
                }
                DocumentEdit::Insert { line, text } => {
                    if *line > len {
                        return Err(CoreError::LineOutOfRange { line: *line, len });
                    }
                    let stmt = Statement::read(ids.next_id(), *line as u32, text);
                    if let Some(parent) = self.parent_line(*line, stmt.indent) {
                        push_all(&mut touched, self.subtree(parent));
                    }
                    self.statements.insert(*line, stmt);
                }
                DocumentEdit::Delete { line, count } => {
                    if *line + *count > len {
                        return Err(CoreError::LineOutOfRange {
                            line: *line + *count,
                            len,
                        });
                    }
                    for l in *line..*line + *count {
                        push_all(&mut touched, self.subtree(l));
                    }
                    self.statements.drain(*line..*line + *count);
                }
            }
            self.renumber();
        }

        Ok(touched)
    }

    fn renumber(&mut self) {
        for (line, stmt) in self.statements.iter_mut().enumerate() {
            stmt.line = line as u32;
        }
    }
}

fn push_all(touched: &mut Vec<StatementId>, more: Vec<StatementId>) {
    for id in more {
        if !touched.contains(&id) {
            touched.push(id);
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<&str> = self.statements.iter().map(|s| s.text.as_str()).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> (Document, StatementIds) {
        let mut ids = StatementIds::new();
        let d = Document::new(DocumentId(0), Uri::memory(), text, &mut ids);
        (d, ids)
    }

    fn edit(
        d: &mut Document,
        ids: &mut StatementIds,
        f: impl FnOnce(&mut DocumentEditor),
    ) -> Vec<StatementId> {
        let mut editor = DocumentEditor::new();
        f(&mut editor);
        d.apply(&editor.into_edits(), ids).unwrap()
    }

    #[test]
    fn single_update() {
        let (mut d, mut ids) = doc("X");
        edit(&mut d, &mut ids, |facts| {
            facts.update("Y", 0);
        });
        assert_eq!(d.to_string(), "Y");
    }

    #[test]
    fn multiple_updates() {
        let (mut d, mut ids) = doc("X\nY\nZ");
        let x_id = d.read(0).unwrap().id;
        edit(&mut d, &mut ids, |facts| {
            // no-op update
            facts.update("X", 0);
            facts.update("YY", 1);
            facts.update("ZZ", 2);
            facts.update("ZZZ", 2);
        });
        assert_eq!(d.to_string(), "X\nYY\nZZZ");
        assert_eq!(d.read(0).unwrap().id, x_id);
    }

    #[test]
    fn single_insert() {
        let (mut d, mut ids) = doc("A");
        edit(&mut d, &mut ids, |facts| {
            facts.insert("B", 1);
        });
        assert_eq!(d.to_string(), "A\nB");
        assert_eq!(d.read(1).unwrap().line, 1);
    }

    #[test]
    fn delete_range() {
        let (mut d, mut ids) = doc("A\nB\nC\nD");
        edit(&mut d, &mut ids, |facts| {
            facts.delete(1, 2);
        });
        assert_eq!(d.to_string(), "A\nD");
        assert_eq!(d.read(1).unwrap().line, 1);
    }

    #[test]
    fn subtree_spans_nested_statements() {
        let (d, _) = doc("A\n\tB\n\n\t\tC\nD");
        let ids: Vec<StatementId> = d.statements().iter().map(|s| s.id).collect();
        assert_eq!(d.subtree(0), vec![ids[0], ids[1], ids[2], ids[3]]);
        assert_eq!(d.subtree(4), vec![ids[4]]);
    }

    #[test]
    fn touched_statements_reported() {
        let (mut d, mut ids) = doc("A\n\tB\nC");
        let before: Vec<StatementId> = d.statements().iter().map(|s| s.id).collect();

        let touched = edit(&mut d, &mut ids, |facts| {
            facts.update("A : C", 0);
        });
        assert_eq!(touched, vec![before[0], before[1]]);

        let touched = edit(&mut d, &mut ids, |facts| {
            facts.insert("\tD", 3);
        });
        // the new child's parent is C
        assert_eq!(touched, vec![before[2]]);
    }

    #[test]
    fn out_of_range_edits_fail() {
        let (mut d, mut ids) = doc("A");
        let mut editor = DocumentEditor::new();
        editor.update("B", 3);
        assert_eq!(
            d.apply(&editor.into_edits(), &mut ids),
            Err(CoreError::LineOutOfRange { line: 3, len: 1 })
        );
    }
}
