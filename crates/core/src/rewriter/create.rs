use std::ops::Range;

use tracing::debug;

use super::{
    PlanStep, RebuildPlan, RewrittenStatement,
    definition::{ColumnDefinition, IndexDefinition, index_clause, key_parts, quote_list},
};
use crate::scan::{SqlText, quote_identifier};

pub(super) fn rewrite(sql: &str) -> RewrittenStatement {
    let text = SqlText::new(sql);
    let mut cursor = text.cursor();
    cursor.eat_keyword("CREATE");
    cursor.eat_keywords(&["OR", "REPLACE"]);

    let temporary = cursor.eat_keyword("TEMPORARY");
    if cursor.eat_keyword("TABLE") {
        return create_table(&text, cursor.pos(), temporary)
            .unwrap_or_else(|| RewrittenStatement::Single(sql.to_string()));
    }

    if cursor.eat_keyword("FULLTEXT") || cursor.eat_keyword("SPATIAL") {
        debug!("dropping full-text or spatial index");
        return RewrittenStatement::Noop;
    }
    let unique = cursor.eat_keyword("UNIQUE");
    if cursor.eat_keyword("INDEX") {
        return create_index(&text, cursor.pos(), unique)
            .unwrap_or_else(|| RewrittenStatement::Single(sql.to_string()));
    }

    if cursor.eat_keyword("DATABASE") || cursor.eat_keyword("SCHEMA") {
        return RewrittenStatement::Noop;
    }

    RewrittenStatement::Single(sql.to_string())
}

fn create_table(text: &SqlText<'_>, start: usize, temporary: bool) -> Option<RewrittenStatement> {
    let mut cursor = text.cursor_in(start..text.len());
    let if_not_exists = cursor.eat_keywords(&["IF", "NOT", "EXISTS"]);
    let table = cursor.identifier()?;
    // `CREATE TABLE t LIKE u` and `CREATE TABLE t AS SELECT` run as written.
    let body = cursor.paren_group()?;

    let mut columns = Vec::new();
    let mut primary_key: Vec<String> = Vec::new();
    let mut indexes: Vec<IndexDefinition> = Vec::new();
    let mut constraints = Vec::new();

    for element in text.split_top_level(body, b',') {
        match table_element(text, element.clone()) {
            Element::Column(column) => {
                if column.primary_key {
                    primary_key = vec![column.name.clone()];
                }
                if column.unique {
                    indexes.push(IndexDefinition {
                        name: column.name.clone(),
                        unique: true,
                        columns: vec![column.name.clone()],
                    });
                }
                columns.push(column);
            }
            Element::PrimaryKey(key) => primary_key = key,
            Element::Index(index) => indexes.push(index),
            Element::Constraint(clause) => constraints.push(clause),
            Element::Skip => {}
        }
    }

    let inline_key = match primary_key.as_slice() {
        [single] => columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(single) && column.auto_increment),
        _ => None,
    };

    let mut definitions = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let mut column = column.clone();
            column.unique = false;
            column.render(Some(index) == inline_key)
        })
        .collect::<Vec<_>>();
    if inline_key.is_none() && !primary_key.is_empty() {
        definitions.push(format!("PRIMARY KEY ({})", quote_list(&primary_key)));
    }
    definitions.extend(constraints);

    let create = format!(
        "CREATE {}TABLE {}{} ({})",
        if temporary { "TEMPORARY " } else { "" },
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        quote_identifier(&table),
        definitions.join(", "),
    );

    if indexes.is_empty() {
        return Some(RewrittenStatement::Single(create));
    }

    let mut steps = vec![PlanStep::new(create)];
    steps.extend(
        indexes
            .iter()
            .map(|index| PlanStep::new(index.render(&table, if_not_exists))),
    );
    Some(RewrittenStatement::Plan(RebuildPlan {
        steps,
        follow_up: None,
    }))
}

enum Element {
    Column(ColumnDefinition),
    PrimaryKey(Vec<String>),
    Index(IndexDefinition),
    Constraint(String),
    Skip,
}

fn table_element(text: &SqlText<'_>, range: Range<usize>) -> Element {
    let mut cursor = text.cursor_in(range.clone());

    let mut constraint_name = None;
    if cursor.eat_keyword("CONSTRAINT") {
        let named = !["PRIMARY", "UNIQUE", "FOREIGN", "CHECK"]
            .iter()
            .any(|keyword| cursor.peek_keyword(keyword));
        if named {
            constraint_name = cursor.identifier();
        }
    }

    if cursor.eat_keywords(&["PRIMARY", "KEY"]) {
        if cursor.eat_keyword("USING") {
            cursor.word();
        }
        return cursor
            .paren_group()
            .map_or(Element::Skip, |inner| Element::PrimaryKey(key_parts(text, inner)));
    }

    if cursor.eat_keyword("UNIQUE") {
        if !cursor.eat_keyword("KEY") {
            cursor.eat_keyword("INDEX");
        }
        let unnamed = cursor.peek_byte() == Some(b'(') || cursor.peek_keyword("USING");
        return index_clause(text, cursor.pos()..range.end, true).map_or(Element::Skip, |mut index| {
            if unnamed && let Some(name) = constraint_name {
                index.name = name;
            }
            Element::Index(index)
        });
    }

    if cursor.eat_keyword("KEY") || cursor.eat_keyword("INDEX") {
        return index_clause(text, cursor.pos()..range.end, false).map_or(Element::Skip, Element::Index);
    }

    if cursor.eat_keyword("FULLTEXT") || cursor.eat_keyword("SPATIAL") {
        return Element::Skip;
    }

    if cursor.peek_keyword("FOREIGN") || cursor.peek_keyword("CHECK") {
        let clause = text.slice(cursor.rest());
        return Element::Constraint(match constraint_name {
            Some(name) => format!("CONSTRAINT {} {clause}", quote_identifier(&name)),
            None => clause.to_string(),
        });
    }

    ColumnDefinition::parse(text, range).map_or(Element::Skip, |(column, _, _)| Element::Column(column))
}

fn create_index(text: &SqlText<'_>, start: usize, unique: bool) -> Option<RewrittenStatement> {
    let mut cursor = text.cursor_in(start..text.len());
    let if_not_exists = cursor.eat_keywords(&["IF", "NOT", "EXISTS"]);
    let name = cursor.identifier()?;
    if cursor.eat_keyword("USING") {
        cursor.word();
    }
    if !cursor.eat_keyword("ON") {
        return None;
    }
    let table = cursor.identifier()?;
    let inner = cursor.paren_group()?;
    let index = IndexDefinition {
        name,
        unique,
        columns: key_parts(text, inner),
    };
    Some(RewrittenStatement::Single(index.render(&table, if_not_exists)))
}
