//! Leading-keyword classification of executed SQL.
//!
//! Only the statements that affect cached state matter here: `ALTER` and
//! `DROP` change table shapes, `DROP DATABASE` may remove the selected
//! catalog, and `CREATE` may create temporary tables bound to the physical
//! connection.

/// What an executed statement means for link and cache state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Alter,
    /// `DROP ...`; `database` is set for `DROP DATABASE|SCHEMA <name>`
    Drop { database: Option<String> },
    Create,
    Other,
}

impl StatementKind {
    /// True if cached table metadata can no longer be trusted
    #[must_use]
    pub const fn changes_schema(&self) -> bool {
        matches!(self, Self::Alter | Self::Drop { .. })
    }
}

/// Classify `sql` by its first keyword, ignoring leading comments and case
#[must_use]
pub fn classify(sql: &str) -> StatementKind {
    let stripped = strip_comments(sql);
    let mut tokens = stripped.split_whitespace();

    let Some(first) = tokens.next() else {
        return StatementKind::Other;
    };

    if first.eq_ignore_ascii_case("ALTER") {
        StatementKind::Alter
    } else if first.eq_ignore_ascii_case("DROP") {
        let database = match tokens.next() {
            Some(t) if t.eq_ignore_ascii_case("DATABASE") || t.eq_ignore_ascii_case("SCHEMA") => {
                tokens.next().map(unquote_identifier)
            }
            _ => None,
        };
        StatementKind::Drop { database }
    } else if first.eq_ignore_ascii_case("CREATE") {
        StatementKind::Create
    } else {
        StatementKind::Other
    }
}

/// Strip a trailing `;` and one layer of backquotes or double quotes
fn unquote_identifier(token: &str) -> String {
    let token = token.trim_end_matches(';');
    for quote in ['`', '"'] {
        if token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote) {
            return token[1..token.len() - 1].to_string();
        }
    }
    token.to_string()
}

/// Strip SQL comments from a statement
///
/// Handles:
/// - Line comments: -- comment
/// - Block comments: /* comment */
fn strip_comments(sql: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                for ch in chars.by_ref() {
                    if ch == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for ch in chars.by_ref() {
                    if prev == '*' && ch == '/' {
                        break;
                    }
                    prev = ch;
                }
                result.push(' ');
            }
            _ => result.push(ch),
        }
    }

    result
}
