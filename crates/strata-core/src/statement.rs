//! Statements: one line of a document, read into declarations and
//! annotations.
//!
//! Reading is deliberately shallow. A line is an indent, a comma-separated
//! list of declarations, and an optional joint (`:` followed by whitespace or
//! the end of the line) introducing comma-separated annotations.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::id::StatementId;
use crate::uri::Uri;

/// Number of spaces that count as one level of indentation.
const SPACES_PER_INDENT: u32 = 4;

/// Suffix marking a list declaration.
pub const LIST_SUFFIX: &str = "...";

/// The subject of a declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    /// A plain type name.
    Name(String),
    /// A list declaration, stored with its `...` suffix.
    List(String),
    /// A pattern declaration such as `/\d+/`.
    Pattern(PatternSubject),
    /// A URI used as a declaration below the root level.
    Uri(Uri),
    /// A declaration with annotations but no name.
    Anonymous,
}

impl Subject {
    /// Returns the URI component under which this subject is declared.
    ///
    /// Anonymous subjects have no name of their own; they are keyed by the
    /// line that declared them.
    pub fn key(&self, line: u32) -> String {
        match self {
            Subject::Name(name) | Subject::List(name) => name.clone(),
            Subject::Pattern(pattern) => format!("/{}/", pattern.source),
            Subject::Uri(uri) => uri.to_string(),
            Subject::Anonymous => format!("~{line}"),
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Subject::Pattern(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Subject::List(_))
    }
}

/// A pattern declaration and its compiled matcher.
#[derive(Debug, Clone)]
pub struct PatternSubject {
    /// The pattern text between the slashes.
    pub source: String,
    /// The anchored matcher, or `None` when the pattern does not compile.
    pub regex: Option<Regex>,
}

impl PatternSubject {
    pub fn new(source: &str) -> Self {
        let regex = Regex::new(&format!("^(?:{source})$")).ok();
        PatternSubject {
            source: source.to_string(),
            regex,
        }
    }

    /// Returns `true` if the pattern compiled and matches the whole text.
    pub fn matches(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(text))
    }
}

impl PartialEq for PatternSubject {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Classification of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Declaration,
    /// A root-level line naming another document this one depends on.
    Reference(Uri),
    Comment,
    Whitespace,
}

/// Points at one annotation inside a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpanRef {
    pub statement: StatementId,
    /// Index of the annotation within the statement.
    pub index: u16,
}

/// A single line of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub id: StatementId,
    /// Zero-based line number within the owning document.
    pub line: u32,
    pub indent: u32,
    pub text: String,
    pub kind: StatementKind,
    pub declarations: Vec<Subject>,
    pub annotations: Vec<String>,
}

impl Statement {
    /// Reads one line of source text.
    pub fn read(id: StatementId, line: u32, text: &str) -> Statement {
        let indent = read_indent(text);
        let body = text.trim();

        let blank = |kind| Statement {
            id,
            line,
            indent,
            text: text.to_string(),
            kind,
            declarations: Vec::new(),
            annotations: Vec::new(),
        };

        if body.is_empty() {
            return blank(StatementKind::Whitespace);
        }
        if body.starts_with("//") {
            return blank(StatementKind::Comment);
        }
        if indent == 0 && Uri::looks_like_uri(body) {
            if let Ok(uri) = Uri::parse(body) {
                return blank(StatementKind::Reference(uri));
            }
        }

        let (decl_text, anno_text) = match joint_position(body) {
            Some(pos) => (&body[..pos], &body[pos + 1..]),
            None => (body, ""),
        };

        let annotations: Vec<String> = anno_text
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();

        let mut declarations = read_declarations(decl_text.trim());
        if declarations.is_empty() && !annotations.is_empty() {
            declarations.push(Subject::Anonymous);
        }

        Statement {
            id,
            line,
            indent,
            text: text.to_string(),
            kind: StatementKind::Declaration,
            declarations,
            annotations,
        }
    }

    /// Returns `true` for statements that take part in the type structure.
    pub fn is_declaration(&self) -> bool {
        self.kind == StatementKind::Declaration && !self.declarations.is_empty()
    }

    /// Returns `true` for comment and whitespace lines.
    pub fn is_noise(&self) -> bool {
        matches!(self.kind, StatementKind::Comment | StatementKind::Whitespace)
    }

    /// Returns a reference to the annotation at `index`.
    pub fn span(&self, index: u16) -> SpanRef {
        SpanRef {
            statement: self.id,
            index,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

fn read_indent(text: &str) -> u32 {
    let mut tabs = 0;
    let mut spaces = 0;
    for c in text.chars() {
        match c {
            '\t' => tabs += 1,
            ' ' => spaces += 1,
            _ => break,
        }
    }
    tabs + spaces / SPACES_PER_INDENT
}

/// Finds the joint, skipping over a leading pattern so that a `:` inside
/// `/.../` is not mistaken for one.
fn joint_position(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut i = 0;

    if bytes.first() == Some(&b'/') {
        i = 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'/' => {
                    i += 1;
                    break;
                }
                _ => i += 1,
            }
        }
    }

    while i < bytes.len() {
        if bytes[i] == b':' && bytes.get(i + 1).map_or(true, |b| b.is_ascii_whitespace()) {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn read_declarations(text: &str) -> Vec<Subject> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() >= 2 && text.starts_with('/') && text.ends_with('/') {
        return vec![Subject::Pattern(PatternSubject::new(&text[1..text.len() - 1]))];
    }

    text.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| {
            if Uri::looks_like_uri(d) {
                if let Ok(uri) = Uri::parse(d) {
                    return Subject::Uri(uri);
                }
            }
            if d.ends_with(LIST_SUFFIX) && d.len() > LIST_SUFFIX.len() {
                Subject::List(d.to_string())
            } else {
                Subject::Name(d.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str) -> Statement {
        Statement::read(StatementId(0), 0, text)
    }

    #[test]
    fn reads_declarations_and_annotations() {
        let stmt = read("\tDog, Cat : Animal, Pet");
        assert_eq!(stmt.indent, 1);
        assert_eq!(
            stmt.declarations,
            vec![
                Subject::Name("Dog".into()),
                Subject::Name("Cat".into())
            ]
        );
        assert_eq!(stmt.annotations, vec!["Animal".to_string(), "Pet".to_string()]);
        assert!(stmt.is_declaration());
    }

    #[test]
    fn spaces_count_towards_indent() {
        assert_eq!(read("        Name").indent, 2);
        assert_eq!(read("\t    Name").indent, 2);
    }

    #[test]
    fn pattern_colon_is_not_a_joint() {
        let stmt = read("/a:b/ : Text");
        match &stmt.declarations[0] {
            Subject::Pattern(p) => {
                assert_eq!(p.source, "a:b");
                assert!(p.matches("a:b"));
                assert!(!p.matches("xa:b"));
            }
            other => panic!("expected pattern, got {other:?}"),
        }
        assert_eq!(stmt.annotations, vec!["Text".to_string()]);
    }

    #[test]
    fn invalid_pattern_has_no_regex() {
        let stmt = read("/[0-9/ : Number");
        match &stmt.declarations[0] {
            Subject::Pattern(p) => assert!(p.regex.is_none()),
            other => panic!("expected pattern, got {other:?}"),
        }
    }

    #[test]
    fn root_uri_is_a_reference() {
        let stmt = read("memory://lib.strata");
        assert!(matches!(stmt.kind, StatementKind::Reference(_)));
        assert!(!stmt.is_declaration());

        let nested = read("\tmemory://lib.strata");
        assert!(matches!(nested.declarations[0], Subject::Uri(_)));
    }

    #[test]
    fn lists_anonymous_comments_and_whitespace() {
        assert!(read("Names... : Name").declarations[0].is_list());
        assert_eq!(read(": Animal").declarations, vec![Subject::Anonymous]);
        assert_eq!(read("// note").kind, StatementKind::Comment);
        assert_eq!(read("   ").kind, StatementKind::Whitespace);
    }

    #[test]
    fn colon_without_space_stays_in_name() {
        let stmt = read("Time:Zone");
        assert_eq!(stmt.declarations, vec![Subject::Name("Time:Zone".into())]);
        assert!(stmt.annotations.is_empty());
    }

    #[test]
    fn subject_keys() {
        assert_eq!(Subject::Name("A".into()).key(3), "A");
        assert_eq!(Subject::Anonymous.key(3), "~3");
        assert_eq!(Subject::Pattern(PatternSubject::new("\\d+")).key(0), "/\\d+/");
    }
}
