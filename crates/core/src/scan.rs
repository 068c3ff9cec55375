use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LexemeKind {
    Code,
    /// Quoted string literal; carries the delimiter (`'` or `"`).
    Literal(u8),
    QuotedIdent,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Lexeme {
    pub(crate) kind: LexemeKind,
    pub(crate) span: Range<usize>,
    pub(crate) terminated: bool,
}

/// Splits SQL text into code, quoted runs and comments with a single linear
/// scan. Every span boundary sits on an ASCII byte, so slicing the source with
/// any span is always valid UTF-8.
pub(crate) fn lex(sql: &str) -> Vec<Lexeme> {
    let bytes = sql.as_bytes();
    let mut lexemes = Vec::new();
    let mut code_start = 0usize;
    let mut index = 0usize;

    while index < bytes.len() {
        let byte = bytes[index];
        let quoted = match byte {
            b'\'' | b'"' => Some(LexemeKind::Literal(byte)),
            b'`' => Some(LexemeKind::QuotedIdent),
            _ => None,
        };

        if let Some(kind) = quoted {
            push_code(&mut lexemes, code_start, index);
            let backslash_escapes = kind != LexemeKind::QuotedIdent;
            let (end, terminated) = scan_quoted(bytes, index, byte, backslash_escapes);
            lexemes.push(Lexeme {
                kind,
                span: index..end,
                terminated,
            });
            index = end;
            code_start = end;
            continue;
        }

        if let Some(end) = comment_end(bytes, index) {
            push_code(&mut lexemes, code_start, index);
            lexemes.push(Lexeme {
                kind: LexemeKind::Comment,
                span: index..end,
                terminated: true,
            });
            index = end;
            code_start = end;
            continue;
        }

        index += 1;
    }

    push_code(&mut lexemes, code_start, bytes.len());
    lexemes
}

fn push_code(lexemes: &mut Vec<Lexeme>, start: usize, end: usize) {
    if start < end {
        lexemes.push(Lexeme {
            kind: LexemeKind::Code,
            span: start..end,
            terminated: true,
        });
    }
}

fn scan_quoted(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> (usize, bool) {
    let mut index = start + 1;
    while index < bytes.len() {
        let byte = bytes[index];
        if backslash_escapes && byte == b'\\' {
            index += 2;
            continue;
        }
        if byte == quote {
            if bytes.get(index + 1) == Some(&quote) {
                index += 2;
                continue;
            }
            return (index + 1, true);
        }
        index += 1;
    }
    (bytes.len(), false)
}

fn comment_end(bytes: &[u8], index: usize) -> Option<usize> {
    let byte = bytes[index];
    let next = bytes.get(index + 1).copied();

    let line_comment = byte == b'#'
        || (byte == b'-'
            && next == Some(b'-')
            && bytes
                .get(index + 2)
                .is_none_or(|after| after.is_ascii_whitespace()));
    if line_comment {
        let end = bytes[index..]
            .iter()
            .position(|candidate| *candidate == b'\n')
            .map_or(bytes.len(), |offset| index + offset);
        return Some(end);
    }

    if byte == b'/' && next == Some(b'*') {
        let body_start = index + 2;
        let end = bytes[body_start..]
            .windows(2)
            .position(|window| window == b"*/")
            .map_or(bytes.len(), |offset| body_start + offset + 2);
        return Some(end);
    }

    None
}

pub(crate) fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$' || byte >= 0x80
}

/// SQL text paired with a same-length "masked" copy in which the contents of
/// quoted runs are blanked and comments are erased. Structural searches run on
/// the mask; replacements slice the original.
#[derive(Debug, Clone)]
pub(crate) struct SqlText<'a> {
    sql: &'a str,
    masked: String,
}

impl<'a> SqlText<'a> {
    pub(crate) fn new(sql: &'a str) -> Self {
        let mut masked = String::with_capacity(sql.len());
        for lexeme in lex(sql) {
            let span = lexeme.span.clone();
            match lexeme.kind {
                LexemeKind::Code => masked.push_str(&sql[span]),
                LexemeKind::Comment => {
                    masked.extend(std::iter::repeat_n(' ', span.len()));
                }
                LexemeKind::Literal(_) | LexemeKind::QuotedIdent => {
                    let delimiter = char::from(sql.as_bytes()[span.start]);
                    let inner = if lexeme.terminated {
                        span.len().saturating_sub(2)
                    } else {
                        span.len() - 1
                    };
                    masked.push(delimiter);
                    masked.extend(std::iter::repeat_n(' ', inner));
                    if lexeme.terminated {
                        masked.push(delimiter);
                    }
                }
            }
        }
        Self { sql, masked }
    }

    pub(crate) fn masked(&self) -> &str {
        &self.masked
    }

    pub(crate) fn len(&self) -> usize {
        self.sql.len()
    }

    pub(crate) fn slice(&self, range: Range<usize>) -> &'a str {
        &self.sql[range]
    }

    fn bytes(&self) -> &[u8] {
        self.masked.as_bytes()
    }

    pub(crate) fn byte(&self, index: usize) -> Option<u8> {
        self.bytes().get(index).copied()
    }

    /// End (exclusive) of the quoted run opening at `start`.
    pub(crate) fn quoted_end(&self, start: usize) -> usize {
        let bytes = self.bytes();
        let quote = bytes[start];
        bytes[start + 1..]
            .iter()
            .position(|byte| *byte == quote)
            .map_or(bytes.len(), |offset| start + 1 + offset + 1)
    }

    pub(crate) fn is_word_start(&self, index: usize) -> bool {
        let bytes = self.bytes();
        bytes.get(index).is_some_and(|byte| is_word_byte(*byte))
            && (index == 0 || !is_word_byte(bytes[index - 1]))
    }

    pub(crate) fn word_end(&self, start: usize) -> usize {
        let bytes = self.bytes();
        bytes[start..]
            .iter()
            .position(|byte| !is_word_byte(*byte))
            .map_or(bytes.len(), |offset| start + offset)
    }

    pub(crate) fn skip_whitespace(&self, mut index: usize) -> usize {
        let bytes = self.bytes();
        while index < bytes.len() && bytes[index].is_ascii_whitespace() {
            index += 1;
        }
        index
    }

    /// True when a word equal to `keyword` (ASCII case-insensitive) starts at
    /// `index`.
    pub(crate) fn keyword_at(&self, index: usize, keyword: &str) -> bool {
        if !self.is_word_start(index) {
            return false;
        }
        let end = self.word_end(index);
        self.masked[index..end].eq_ignore_ascii_case(keyword)
    }

    /// Matches a whitespace-separated keyword sequence at `index`, returning
    /// the end of the last keyword.
    pub(crate) fn keywords_at(&self, index: usize, keywords: &[&str]) -> Option<usize> {
        let mut cursor = index;
        for (position, keyword) in keywords.iter().enumerate() {
            if position > 0 {
                cursor = self.skip_whitespace(cursor);
            }
            if !self.keyword_at(cursor, keyword) {
                return None;
            }
            cursor = self.word_end(cursor);
        }
        Some(cursor)
    }

    /// Finds a keyword sequence anywhere at or after `from`, at any paren depth.
    pub(crate) fn find_keywords(&self, keywords: &[&str], from: usize) -> Option<Range<usize>> {
        self.find_keywords_in(keywords, from..self.len(), false)
    }

    /// Finds a keyword sequence within `range` at paren depth zero relative to
    /// the range start.
    pub(crate) fn find_top_level(&self, keywords: &[&str], range: Range<usize>) -> Option<Range<usize>> {
        self.find_keywords_in(keywords, range, true)
    }

    fn find_keywords_in(
        &self,
        keywords: &[&str],
        range: Range<usize>,
        top_level: bool,
    ) -> Option<Range<usize>> {
        let bytes = self.bytes();
        let mut depth = 0usize;
        let mut index = range.start;
        while index < range.end {
            match bytes[index] {
                b'\'' | b'"' | b'`' => {
                    index = self.quoted_end(index);
                    continue;
                }
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                _ => {}
            }
            if (!top_level || depth == 0)
                && self.is_word_start(index)
                && let Some(end) = self.keywords_at(index, keywords)
                && end <= range.end
            {
                return Some(index..end);
            }
            if self.is_word_start(index) {
                index = self.word_end(index);
            } else {
                index += 1;
            }
        }
        None
    }

    /// Index of the `)` closing the `(` at `open`.
    pub(crate) fn matching_paren(&self, open: usize) -> Option<usize> {
        let bytes = self.bytes();
        if bytes.get(open) != Some(&b'(') {
            return None;
        }
        let mut depth = 0usize;
        let mut index = open;
        while index < bytes.len() {
            match bytes[index] {
                b'\'' | b'"' | b'`' => {
                    index = self.quoted_end(index);
                    continue;
                }
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(index);
                    }
                }
                _ => {}
            }
            index += 1;
        }
        None
    }

    /// Splits `range` on `separator` occurring at paren depth zero. Pieces are
    /// trimmed; an all-whitespace range yields no pieces.
    pub(crate) fn split_top_level(&self, range: Range<usize>, separator: u8) -> Vec<Range<usize>> {
        let bytes = self.bytes();
        let mut pieces = Vec::new();
        let mut depth = 0usize;
        let mut start = range.start;
        let mut index = range.start;
        while index < range.end {
            match bytes[index] {
                b'\'' | b'"' | b'`' => {
                    index = self.quoted_end(index).min(range.end);
                    continue;
                }
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                byte if byte == separator && depth == 0 => {
                    pieces.push(self.trim(start..index));
                    start = index + 1;
                }
                _ => {}
            }
            index += 1;
        }
        let last = self.trim(start..range.end);
        if !last.is_empty() || !pieces.is_empty() {
            pieces.push(last);
        }
        pieces
    }

    /// Whitespace-separated words of `range` at paren depth zero; a
    /// parenthesized group stays attached to the word it touches.
    pub(crate) fn words(&self, range: Range<usize>) -> Vec<Range<usize>> {
        let bytes = self.bytes();
        let mut words = Vec::new();
        let mut depth = 0usize;
        let mut start: Option<usize> = None;
        let mut index = range.start;
        while index < range.end {
            let byte = bytes[index];
            if depth == 0 && byte.is_ascii_whitespace() {
                if let Some(word_start) = start.take() {
                    words.push(word_start..index);
                }
                index += 1;
                continue;
            }
            if start.is_none() {
                start = Some(index);
            }
            match byte {
                b'\'' | b'"' | b'`' => {
                    index = self.quoted_end(index).min(range.end);
                    continue;
                }
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                _ => {}
            }
            index += 1;
        }
        if let Some(word_start) = start {
            words.push(word_start..range.end);
        }
        words
    }

    pub(crate) fn trim(&self, range: Range<usize>) -> Range<usize> {
        let bytes = self.bytes();
        let mut start = range.start;
        let mut end = range.end;
        while start < end && bytes[start].is_ascii_whitespace() {
            start += 1;
        }
        while end > start && bytes[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
        start..end
    }

    pub(crate) fn cursor(&self) -> Cursor<'_, 'a> {
        Cursor {
            text: self,
            pos: 0,
            end: self.len(),
        }
    }

    pub(crate) fn cursor_in(&self, range: Range<usize>) -> Cursor<'_, 'a> {
        Cursor {
            text: self,
            pos: range.start,
            end: range.end,
        }
    }
}

/// Forward-only reader over a [`SqlText`] range.
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'t, 'a> {
    text: &'t SqlText<'a>,
    pos: usize,
    end: usize,
}

impl<'a> Cursor<'_, 'a> {
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn end(&self) -> usize {
        self.end
    }

    pub(crate) fn rest(&self) -> Range<usize> {
        self.text.trim(self.pos..self.end)
    }

    pub(crate) fn skip_whitespace(&mut self) {
        self.pos = self.text.skip_whitespace(self.pos).min(self.end);
    }

    pub(crate) fn peek_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        self.text.keyword_at(self.pos, keyword) && self.text.word_end(self.pos) <= self.end
    }

    pub(crate) fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos = self.text.word_end(self.pos);
            return true;
        }
        false
    }

    /// Consumes the whole sequence or nothing.
    pub(crate) fn eat_keywords(&mut self, keywords: &[&str]) -> bool {
        self.skip_whitespace();
        match self.text.keywords_at(self.pos, keywords) {
            Some(end) if end <= self.end => {
                self.pos = end;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn eat_byte(&mut self, byte: u8) -> bool {
        self.skip_whitespace();
        if self.pos < self.end && self.text.byte(self.pos) == Some(byte) {
            self.pos += 1;
            return true;
        }
        false
    }

    pub(crate) fn peek_byte(&mut self) -> Option<u8> {
        self.skip_whitespace();
        if self.pos < self.end {
            self.text.byte(self.pos)
        } else {
            None
        }
    }

    /// Next bare word, as a source range.
    pub(crate) fn word(&mut self) -> Option<Range<usize>> {
        self.skip_whitespace();
        if self.pos >= self.end || !self.text.is_word_start(self.pos) {
            return None;
        }
        let start = self.pos;
        self.pos = self.text.word_end(start).min(self.end);
        Some(start..self.pos)
    }

    /// Reads an identifier, bare or quoted, following `a.b` qualification and
    /// returning the last part unquoted.
    pub(crate) fn identifier(&mut self) -> Option<String> {
        let mut name = self.identifier_part()?;
        while self.text.byte(self.pos) == Some(b'.') && self.pos < self.end {
            let checkpoint = self.pos;
            self.pos += 1;
            match self.identifier_part() {
                Some(part) => name = part,
                None => {
                    self.pos = checkpoint;
                    break;
                }
            }
        }
        Some(name)
    }

    fn identifier_part(&mut self) -> Option<String> {
        if self.pos >= self.end {
            return None;
        }
        if self.text.byte(self.pos).is_some_and(|byte| byte.is_ascii_whitespace()) {
            self.skip_whitespace();
        }
        match self.text.byte(self.pos)? {
            quote @ (b'`' | b'"') => {
                let end = self.text.quoted_end(self.pos).min(self.end);
                let raw = self.text.slice(self.pos..end);
                self.pos = end;
                Some(unquote_identifier_with(raw, char::from(quote)))
            }
            _ => {
                let range = self.word()?;
                Some(self.text.slice(range).to_string())
            }
        }
    }

    /// Consumes a parenthesized group, returning the range inside the parens.
    pub(crate) fn paren_group(&mut self) -> Option<Range<usize>> {
        self.skip_whitespace();
        if self.text.byte(self.pos) != Some(b'(') {
            return None;
        }
        let close = self.text.matching_paren(self.pos)?;
        if close >= self.end {
            return None;
        }
        let inner = self.pos + 1..close;
        self.pos = close + 1;
        Some(inner)
    }

    pub(crate) fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.end);
    }
}

pub(crate) fn unquote_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.chars().next() {
        Some(quote @ ('`' | '"')) => unquote_identifier_with(trimmed, quote),
        _ => trimmed.to_string(),
    }
}

fn unquote_identifier_with(raw: &str, quote: char) -> String {
    let inner = raw.strip_prefix(quote).unwrap_or(raw);
    let inner = inner.strip_suffix(quote).unwrap_or(inner);
    let doubled = format!("{quote}{quote}");
    inner.replace(&doubled, &quote.to_string())
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Literal for text that goes back through the parameterizer: backslash
/// escaping round-trips through the literal unescape.
pub(crate) fn mysql_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Literal for text handed verbatim to the embedded engine.
pub(crate) fn sqlite_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Drops trailing semicolons and surrounding whitespace.
pub(crate) fn trim_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(|ch: char| ch == ';' || ch.is_whitespace())
}
