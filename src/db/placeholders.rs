//! Locating `?` placeholders in SQL text.
//!
//! The scanner is a small state machine that skips quoted literals, quoted
//! identifiers and comments, so a `?` inside `'what?'` or `-- why?` is not a
//! parameter. What counts as a literal or comment depends on the [`Dialect`].

use std::borrow::Cow;
use std::ops::Range;

/// Lexical rules that affect where placeholders can appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Backslash escapes the next character inside quoted literals.
    pub backslash_escapes: bool,
    /// Backtick-quoted identifiers.
    pub backticks: bool,
    /// `# ...` line comments.
    pub hash_comments: bool,
    /// `$tag$ ... $tag$` string bodies.
    pub dollar_quotes: bool,
}

impl Dialect {
    pub const ANSI: Dialect = Dialect {
        backslash_escapes: false,
        backticks: false,
        hash_comments: false,
        dollar_quotes: false,
    };

    pub const MYSQL: Dialect = Dialect {
        backslash_escapes: true,
        backticks: true,
        hash_comments: true,
        dollar_quotes: false,
    };

    pub const POSTGRES: Dialect = Dialect {
        backslash_escapes: false,
        backticks: false,
        hash_comments: false,
        dollar_quotes: true,
    };
}

impl Default for Dialect {
    fn default() -> Self {
        Self::ANSI
    }
}

#[derive(Clone)]
enum State {
    Normal,
    Quoted(u8),
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// Returns the tag and the index of the closing `$` of an opening dollar quote.
fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') || (idx == start + 1 && b.is_ascii_digit())
        {
            return None;
        }
        idx += 1;
    }

    if idx < bytes.len() {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

fn matches_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    end < bytes.len() && &bytes[idx + 1..end] == tag.as_bytes() && bytes[end] == b'$'
}

/// Lexical class of a run of SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Anything outside literals and comments
    Code,
    /// String literal, quoted identifier or dollar-quoted body, quotes included
    Quoted,
    /// Line or block comment
    Comment,
}

fn push_segment(
    out: &mut Vec<(Segment, Range<usize>)>,
    kind: Segment,
    start: &mut usize,
    end: usize,
) {
    if end > *start {
        out.push((kind, *start..end));
    }
    *start = end;
}

/// Split `sql` into consecutive code, quoted and comment runs.
///
/// Run boundaries always fall on ASCII bytes, so every range can be used to
/// slice `sql`.
pub fn segments(sql: &str, dialect: Dialect) -> Vec<(Segment, Range<usize>)> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut state = State::Normal;
    let mut start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => {
                let opened = match b {
                    b'\'' | b'"' => Some(State::Quoted(b)),
                    b'`' if dialect.backticks => Some(State::Quoted(b)),
                    b'#' if dialect.hash_comments => Some(State::LineComment),
                    _ if is_line_comment_start(bytes, idx) => Some(State::LineComment),
                    _ if is_block_comment_start(bytes, idx) => Some(State::BlockComment(1)),
                    b'$' if dialect.dollar_quotes => {
                        try_start_dollar_quote(bytes, idx).map(|(tag, _)| State::DollarQuoted(tag))
                    }
                    _ => None,
                };
                if let Some(next) = opened {
                    push_segment(&mut out, Segment::Code, &mut start, idx);
                    match &next {
                        State::BlockComment(_) => idx += 1,
                        State::DollarQuoted(tag) => idx += tag.len() + 1,
                        _ => {}
                    }
                    state = next;
                }
            }
            State::Quoted(quote) => {
                if b == b'\\' && dialect.backslash_escapes && quote != b'`' {
                    idx += 1;
                } else if b == quote {
                    if bytes.get(idx + 1) == Some(&quote) {
                        idx += 1; // doubled quote
                    } else {
                        push_segment(&mut out, Segment::Quoted, &mut start, idx + 1);
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    push_segment(&mut out, Segment::Comment, &mut start, idx);
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    idx += 1;
                    if depth == 1 {
                        push_segment(&mut out, Segment::Comment, &mut start, idx + 1);
                        state = State::Normal;
                    } else {
                        state = State::BlockComment(depth - 1);
                    }
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    push_segment(&mut out, Segment::Quoted, &mut start, idx + 1);
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    let tail = match state {
        State::Normal => Segment::Code,
        State::Quoted(_) | State::DollarQuoted(_) => Segment::Quoted,
        State::LineComment | State::BlockComment(_) => Segment::Comment,
    };
    push_segment(&mut out, tail, &mut start, bytes.len());
    out
}

fn code_runs<'a>(sql: &'a str, dialect: Dialect) -> impl Iterator<Item = (usize, &'a str)> + 'a {
    segments(sql, dialect)
        .into_iter()
        .filter(|(kind, _)| *kind == Segment::Code)
        .map(move |(_, range)| (range.start, &sql[range]))
}

/// Byte offsets of every `?` placeholder, in order of appearance.
pub fn scan(sql: &str, dialect: Dialect) -> Vec<usize> {
    code_runs(sql, dialect)
        .flat_map(|(offset, code)| code.match_indices('?').map(move |(i, _)| offset + i))
        .collect()
}

/// Whether `keyword` appears as a whole word outside literals and comments.
pub fn contains_keyword(sql: &str, dialect: Dialect, keyword: &str) -> bool {
    code_runs(sql, dialect).any(|(_, code)| {
        code.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .any(|word| word.eq_ignore_ascii_case(keyword))
    })
}

/// Byte offset just past the last meaningful token of a statement, ignoring
/// trailing comments, whitespace and semicolons.
pub fn statement_end(sql: &str, dialect: Dialect) -> usize {
    for (kind, range) in segments(sql, dialect).into_iter().rev() {
        match kind {
            Segment::Comment => continue,
            Segment::Quoted => return range.end,
            Segment::Code => {
                let code = sql[range.clone()]
                    .trim_end_matches(|c: char| c.is_whitespace() || c == ';');
                if !code.is_empty() {
                    return range.start + code.len();
                }
            }
        }
    }
    0
}

/// Number of `?` placeholders in `sql`.
pub fn count(sql: &str, dialect: Dialect) -> usize {
    scan(sql, dialect).len()
}

/// Rewrite `?` placeholders to `$1..$n`.
///
/// Returns a borrowed `Cow` when the statement has no placeholders.
pub fn to_numbered(sql: &str, dialect: Dialect) -> Cow<'_, str> {
    let positions = scan(sql, dialect);
    if positions.is_empty() {
        return Cow::Borrowed(sql);
    }

    let mut out = String::with_capacity(sql.len() + positions.len() * 2);
    let mut last = 0;
    for (n, pos) in positions.iter().enumerate() {
        out.push_str(&sql[last..*pos]);
        out.push('$');
        out.push_str(&(n + 1).to_string());
        last = pos + 1;
    }
    out.push_str(&sql[last..]);
    Cow::Owned(out)
}
