//! Operand extraction for MySQL introspection commands (`SHOW …`,
//! `DESCRIBE`, `CHECK TABLE`, `TRUNCATE`), which carry only table names and
//! simple filters.

use sqlparser::{
    dialect::MySqlDialect,
    tokenizer::{Token, Tokenizer},
};

use crate::StatementKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Filter {
    Like(String),
    Equals { field: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Introspection {
    pub(crate) tables: Vec<String>,
    pub(crate) full: bool,
    pub(crate) filter: Option<Filter>,
}

impl Introspection {
    pub(crate) fn table(&self) -> Option<&str> {
        self.tables.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Keyword(String),
    Name(String),
    Text(String),
    Punct(Token),
}

impl Item {
    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Self::Keyword(value) if value.eq_ignore_ascii_case(keyword))
    }

    fn name(&self) -> Option<&str> {
        match self {
            Self::Keyword(value) | Self::Name(value) => Some(value),
            _ => None,
        }
    }

    fn literal(&self) -> Option<String> {
        match self {
            Self::Keyword(value) | Self::Name(value) | Self::Text(value) => Some(value.clone()),
            Self::Punct(Token::Number(number, _)) => Some(number.clone()),
            Self::Punct(_) => None,
        }
    }
}

/// Parses the operands of an introspection statement. Unparsable input yields
/// an empty result; the caller then works with what it has.
pub(crate) fn parse(kind: StatementKind, sql: &str) -> Introspection {
    let items = items(sql);
    let mut reader = Reader { items, pos: 0 };
    let mut result = Introspection::default();

    match kind {
        StatementKind::Describe => {
            reader.advance();
            if let Some(table) = reader.qualified_name() {
                result.tables.push(table);
            }
            if let Some(column) = reader.next().and_then(|item| item.literal()) {
                result.filter = Some(Filter::Like(column));
            }
            return result;
        }
        StatementKind::ShowColumns | StatementKind::ShowIndex | StatementKind::Show => {
            reader.advance();
            result.full = reader.eat_keyword("FULL");
            reader.advance();
            if kind != StatementKind::Show && reader.eat_any(&["FROM", "IN"]) {
                result.tables.extend(reader.qualified_name());
            }
            if reader.eat_any(&["FROM", "IN"]) {
                reader.qualified_name();
            }
        }
        StatementKind::ShowVariables => {
            reader.advance();
            reader.eat_any(&["GLOBAL", "SESSION"]);
            reader.advance();
        }
        StatementKind::ShowStatus => {
            reader.skip(3);
            if reader.eat_any(&["FROM", "IN"]) {
                reader.qualified_name();
            }
        }
        StatementKind::Check
        | StatementKind::Analyze
        | StatementKind::Optimize
        | StatementKind::Truncate => {
            reader.advance();
            reader.eat_any(&["NO_WRITE_TO_BINLOG", "LOCAL"]);
            reader.eat_keyword("TABLE");
            result.tables = reader.name_list();
            return result;
        }
        _ => return result,
    }

    result.filter = reader.filter();
    result
}

fn items(sql: &str) -> Vec<Item> {
    let Ok(tokens) = Tokenizer::new(&MySqlDialect {}, sql).tokenize() else {
        return Vec::new();
    };
    tokens
        .into_iter()
        .filter_map(|token| match token {
            Token::Whitespace(_) | Token::SemiColon => None,
            Token::Word(word) if word.quote_style.is_some() => Some(Item::Name(word.value)),
            Token::Word(word) => Some(Item::Keyword(word.value)),
            Token::SingleQuotedString(value) | Token::DoubleQuotedString(value) => {
                Some(Item::Text(value))
            }
            other => Some(Item::Punct(other)),
        })
        .collect()
}

struct Reader {
    items: Vec<Item>,
    pos: usize,
}

impl Reader {
    fn peek(&self) -> Option<&Item> {
        self.items.get(self.pos)
    }

    fn next(&mut self) -> Option<&Item> {
        let item = self.items.get(self.pos);
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip(&mut self, count: usize) {
        self.pos += count;
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|item| item.is_keyword(keyword)) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn eat_any(&mut self, keywords: &[&str]) -> bool {
        keywords.iter().any(|keyword| self.eat_keyword(keyword))
    }

    fn eat_punct(&mut self, expected: &Token) -> bool {
        if matches!(self.peek(), Some(Item::Punct(token)) if token == expected) {
            self.pos += 1;
            return true;
        }
        false
    }

    /// `name` or `schema.name`, returning the last part.
    fn qualified_name(&mut self) -> Option<String> {
        let mut name = self.peek()?.name()?.to_string();
        self.pos += 1;
        while self.eat_punct(&Token::Period) {
            match self.peek().and_then(Item::name) {
                Some(part) => {
                    name = part.to_string();
                    self.pos += 1;
                }
                None => break,
            }
        }
        Some(name)
    }

    fn name_list(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        while let Some(name) = self.qualified_name() {
            names.push(name);
            if !self.eat_punct(&Token::Comma) {
                break;
            }
        }
        names
    }

    fn filter(&mut self) -> Option<Filter> {
        if self.eat_keyword("LIKE") {
            return self.next().and_then(Item::literal).map(Filter::Like);
        }
        if self.eat_keyword("WHERE") {
            let field = self.next()?.name()?.to_string();
            if !self.eat_punct(&Token::Eq) {
                return None;
            }
            let value = self.next().and_then(Item::literal)?;
            return Some(Filter::Equals { field, value });
        }
        None
    }
}
