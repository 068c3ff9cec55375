use tracing::debug;

use super::{
    PlanStep, RebuildPlan, RebuildStep, RewrittenStatement,
    definition::{
        ColumnDefinition, IndexDefinition, Position, engine_index_name, implicit_default,
        index_clause, key_parts, quote_list, render_index,
    },
};
use crate::{
    IndexOrigin, TableSchema,
    scan::{Cursor, SqlText, quote_identifier},
};

const SHADOW_PREFIX: &str = "_mylite_rebuild_";

const TABLE_OPTIONS: [&str; 22] = [
    "ENGINE",
    "TYPE",
    "AUTO_INCREMENT",
    "DEFAULT",
    "CHARACTER",
    "CHARSET",
    "COLLATE",
    "COMMENT",
    "ROW_FORMAT",
    "CONVERT",
    "ORDER",
    "DISABLE",
    "ENABLE",
    "LOCK",
    "ALGORITHM",
    "FORCE",
    "KEY_BLOCK_SIZE",
    "PACK_KEYS",
    "CHECKSUM",
    "DELAY_KEY_WRITE",
    "MAX_ROWS",
    "MIN_ROWS",
];

fn table_header(cursor: &mut Cursor<'_, '_>) -> Option<String> {
    if !cursor.eat_keyword("ALTER") {
        return None;
    }
    cursor.eat_keyword("ONLINE");
    cursor.eat_keyword("IGNORE");
    if !cursor.eat_keyword("TABLE") {
        return None;
    }
    cursor.identifier()
}

pub(super) fn target_table(sql: &str) -> Option<String> {
    let text = SqlText::new(sql);
    table_header(&mut text.cursor())
}

/// Rewrites the first subcommand of an `ALTER TABLE`; the remaining
/// subcommands become the follow-up statement.
pub(super) fn rewrite(sql: &str, schema: Option<&TableSchema>) -> RewrittenStatement {
    let text = SqlText::new(sql);
    let mut cursor = text.cursor();
    let Some(table) = table_header(&mut cursor) else {
        return RewrittenStatement::Single(sql.to_string());
    };

    let mut commands = text
        .split_top_level(cursor.pos()..text.len(), b',')
        .into_iter()
        .map(|range| text.slice(range).to_string())
        .collect::<Vec<_>>();
    if commands.is_empty() {
        return RewrittenStatement::Noop;
    }
    let first = commands.remove(0);
    let (current, mut remainder) = expand_grouped_add(&first);
    remainder.extend(commands);

    let (rewritten, table_after) = subcommand(&table, &current, schema);
    let follow_up = (!remainder.is_empty()).then(|| {
        format!(
            "ALTER TABLE {} {}",
            quote_identifier(&table_after),
            remainder.join(", ")
        )
    });
    rewritten.with_follow_up(follow_up)
}

/// `ADD [COLUMN] (a int, b int)` is handled one column at a time.
fn expand_grouped_add(command: &str) -> (String, Vec<String>) {
    let text = SqlText::new(command);
    let mut cursor = text.cursor();
    if !cursor.eat_keyword("ADD") {
        return (command.to_string(), Vec::new());
    }
    cursor.eat_keyword("COLUMN");
    let Some(inner) = cursor.paren_group() else {
        return (command.to_string(), Vec::new());
    };
    let mut definitions = text
        .split_top_level(inner, b',')
        .into_iter()
        .map(|range| format!("ADD COLUMN {}", text.slice(range)));
    let current = definitions.next().unwrap_or_default();
    (current, definitions.collect())
}

fn subcommand(
    table: &str,
    command: &str,
    schema: Option<&TableSchema>,
) -> (RewrittenStatement, String) {
    let text = SqlText::new(command);
    let mut cursor = text.cursor();
    let passthrough = || {
        RewrittenStatement::Single(format!("ALTER TABLE {} {command}", quote_identifier(table)))
    };
    let same_table = |rewritten| (rewritten, table.to_string());

    if cursor.eat_keyword("ADD") {
        return same_table(add_subcommand(table, &text, cursor, schema).unwrap_or_else(passthrough));
    }
    if cursor.eat_keyword("DROP") {
        return same_table(drop_subcommand(table, cursor, schema).unwrap_or_else(passthrough));
    }
    if cursor.eat_keyword("CHANGE") {
        cursor.eat_keyword("COLUMN");
        let rewritten = cursor.identifier().and_then(|old| {
            let (definition, position, after) = ColumnDefinition::parse(&text, cursor.rest())?;
            rebuild(table, schema, |model| {
                model.change(&old, definition, position, after)
            })
        });
        return same_table(rewritten.unwrap_or_else(passthrough));
    }
    if cursor.eat_keyword("MODIFY") {
        cursor.eat_keyword("COLUMN");
        let rewritten = ColumnDefinition::parse(&text, cursor.rest()).and_then(
            |(definition, position, after)| {
                let name = definition.name.clone();
                rebuild(table, schema, |model| {
                    model.change(&name, definition, position, after)
                })
            },
        );
        return same_table(rewritten.unwrap_or_else(passthrough));
    }
    if cursor.eat_keyword("ALTER") {
        cursor.eat_keyword("COLUMN");
        let rewritten = cursor.identifier().and_then(|column| {
            let default = if cursor.eat_keywords(&["SET", "DEFAULT"]) {
                Some(text.slice(cursor.rest()).to_string())
            } else if cursor.eat_keywords(&["DROP", "DEFAULT"]) {
                None
            } else {
                return None;
            };
            rebuild(table, schema, |model| model.set_default(&column, default))
        });
        return same_table(rewritten.unwrap_or_else(passthrough));
    }
    if cursor.eat_keyword("RENAME") {
        if cursor.eat_keyword("INDEX") || cursor.eat_keyword("KEY") {
            let rewritten = cursor.identifier().and_then(|old| {
                cursor.eat_keyword("TO");
                let new = cursor.identifier()?;
                Some(rename_index(table, &old, &new, schema))
            });
            return same_table(rewritten.unwrap_or_else(passthrough));
        }
        if cursor.eat_keyword("COLUMN") {
            let rewritten = cursor.identifier().and_then(|old| {
                cursor.eat_keyword("TO");
                let new = cursor.identifier()?;
                Some(RewrittenStatement::Single(format!(
                    "ALTER TABLE {} RENAME COLUMN {} TO {}",
                    quote_identifier(table),
                    quote_identifier(&old),
                    quote_identifier(&new)
                )))
            });
            return same_table(rewritten.unwrap_or_else(passthrough));
        }
        if !cursor.eat_keyword("TO") {
            cursor.eat_keyword("AS");
        }
        return match cursor.identifier() {
            Some(new) => (rename_table(table, &new, schema), new),
            None => same_table(passthrough()),
        };
    }

    if TABLE_OPTIONS
        .iter()
        .any(|option| cursor.peek_keyword(option))
    {
        debug!(command, "ignoring table option");
        return same_table(RewrittenStatement::Noop);
    }

    same_table(passthrough())
}

fn add_subcommand(
    table: &str,
    text: &SqlText<'_>,
    mut cursor: Cursor<'_, '_>,
    schema: Option<&TableSchema>,
) -> Option<RewrittenStatement> {
    if cursor.eat_keyword("FULLTEXT") || cursor.eat_keyword("SPATIAL") {
        return Some(RewrittenStatement::Noop);
    }

    let mut constraint_name = None;
    if cursor.eat_keyword("CONSTRAINT")
        && !["PRIMARY", "UNIQUE", "FOREIGN", "CHECK"]
            .iter()
            .any(|keyword| cursor.peek_keyword(keyword))
    {
        constraint_name = cursor.identifier();
    }

    if cursor.eat_keywords(&["PRIMARY", "KEY"]) {
        if cursor.eat_keyword("USING") {
            cursor.word();
        }
        let columns = key_parts(text, cursor.paren_group()?);
        return rebuild(table, schema, |model| {
            model.set_primary_key(columns);
            Some(())
        });
    }

    let unique = cursor.eat_keyword("UNIQUE");
    if cursor.eat_keyword("INDEX") || cursor.eat_keyword("KEY") || unique {
        let unnamed = cursor.peek_byte() == Some(b'(') || cursor.peek_keyword("USING");
        let mut index = index_clause(text, cursor.pos()..cursor.end(), unique)?;
        if unnamed && let Some(name) = constraint_name {
            index.name = name;
        }
        return Some(RewrittenStatement::Single(index.render(table, false)));
    }

    if cursor.peek_keyword("FOREIGN") || cursor.peek_keyword("CHECK") {
        debug!(table, "ignoring added foreign key or check constraint");
        return Some(RewrittenStatement::Noop);
    }

    cursor.eat_keyword("COLUMN");
    let (definition, position, after) = ColumnDefinition::parse(text, cursor.rest())?;

    let in_place = position == Position::End
        && !definition.primary_key
        && !definition.auto_increment
        && !definition.default.as_deref().is_some_and(is_non_constant_default);
    if in_place {
        return Some(add_column_in_place(table, definition));
    }

    rebuild(table, schema, |model| {
        model.add(definition, position, after);
        Some(())
    })
}

fn is_non_constant_default(default: &str) -> bool {
    let upper = default.to_ascii_uppercase();
    upper.starts_with("CURRENT_") || default.starts_with('(')
}

fn add_column_in_place(table: &str, mut definition: ColumnDefinition) -> RewrittenStatement {
    if definition.not_null && definition.default.is_none() {
        definition.default = Some(definition.implicit_default().to_string());
    }
    let unique = std::mem::take(&mut definition.unique);
    let add = format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_identifier(table),
        definition.render(false)
    );
    if !unique {
        return RewrittenStatement::Single(add);
    }

    let index = IndexDefinition {
        name: definition.name.clone(),
        unique: true,
        columns: vec![definition.name],
    };
    RewrittenStatement::Plan(RebuildPlan {
        steps: vec![PlanStep::new(add), PlanStep::new(index.render(table, false))],
        follow_up: None,
    })
}

fn drop_subcommand(
    table: &str,
    mut cursor: Cursor<'_, '_>,
    schema: Option<&TableSchema>,
) -> Option<RewrittenStatement> {
    if cursor.eat_keywords(&["PRIMARY", "KEY"]) {
        return rebuild(table, schema, |model| {
            model.primary_key.clear();
            model.autoincrement = None;
            Some(())
        });
    }
    if cursor.eat_keyword("INDEX") || cursor.eat_keyword("KEY") {
        let name = cursor.identifier()?;
        return Some(drop_index(table, &name, schema));
    }
    if cursor.eat_keyword("FOREIGN") || cursor.eat_keyword("CHECK") || cursor.eat_keyword("CONSTRAINT") {
        debug!(table, "ignoring dropped constraint");
        return Some(RewrittenStatement::Noop);
    }
    cursor.eat_keyword("COLUMN");
    let column = cursor.identifier()?;
    rebuild(table, schema, |model| model.drop_column(&column))
}

/// Resolves a MySQL index name to the engine's name for it: the
/// table-prefixed form when it exists, the bare name otherwise.
fn resolve_index(table: &str, index: &str, schema: Option<&TableSchema>) -> String {
    let prefixed = engine_index_name(table, index);
    schema
        .and_then(|schema| schema.index(&prefixed).or_else(|| schema.index(index)))
        .map_or(prefixed, |found| found.name.clone())
}

fn drop_index(table: &str, index: &str, schema: Option<&TableSchema>) -> RewrittenStatement {
    if index.eq_ignore_ascii_case("PRIMARY") {
        return rebuild(table, schema, |model| {
            model.primary_key.clear();
            model.autoincrement = None;
            Some(())
        })
        .unwrap_or(RewrittenStatement::Noop);
    }
    RewrittenStatement::Single(format!(
        "DROP INDEX {}",
        quote_identifier(&resolve_index(table, index, schema))
    ))
}

fn rename_index(
    table: &str,
    old: &str,
    new: &str,
    schema: Option<&TableSchema>,
) -> RewrittenStatement {
    let resolved = resolve_index(table, old, schema);
    let drop = PlanStep::new(format!("DROP INDEX {}", quote_identifier(&resolved)));
    let Some(existing) = schema.and_then(|schema| schema.index(&resolved)) else {
        return RewrittenStatement::Single(drop.sql);
    };
    let create = render_index(
        &engine_index_name(table, new),
        table,
        existing.unique,
        &existing.columns,
        false,
    );
    RewrittenStatement::Plan(RebuildPlan {
        steps: vec![drop, PlanStep::new(create)],
        follow_up: None,
    })
}

/// `RENAME TO` also moves the table's `old__name` indexes into the new
/// table's namespace.
fn rename_table(table: &str, new: &str, schema: Option<&TableSchema>) -> RewrittenStatement {
    let rename = PlanStep::new(format!(
        "ALTER TABLE {} RENAME TO {}",
        quote_identifier(table),
        quote_identifier(new)
    ));
    let prefix = engine_index_name(table, "");
    let moved = schema
        .map(|schema| {
            schema
                .indexes
                .iter()
                .filter(|index| index.origin == IndexOrigin::Created)
                .filter_map(|index| {
                    let declared = index.name.get(prefix.len()..)?;
                    let owned = index.name[..prefix.len()].eq_ignore_ascii_case(&prefix);
                    (owned && !declared.is_empty()).then_some((index, declared))
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    if moved.is_empty() {
        return RewrittenStatement::Single(rename.sql);
    }

    let mut steps = vec![rename];
    for (index, declared) in moved {
        steps.push(PlanStep::new(format!("DROP INDEX {}", quote_identifier(&index.name))));
        steps.push(PlanStep::new(render_index(
            &engine_index_name(new, declared),
            new,
            index.unique,
            &index.columns,
            false,
        )));
    }
    RewrittenStatement::Plan(RebuildPlan {
        steps,
        follow_up: None,
    })
}

pub(super) fn drop_index_target(sql: &str) -> Option<(String, String)> {
    let text = SqlText::new(sql);
    let mut cursor = text.cursor();
    if !cursor.eat_keywords(&["DROP", "INDEX"]) {
        return None;
    }
    let index = cursor.identifier()?;
    if !cursor.eat_keyword("ON") {
        return None;
    }
    let table = cursor.identifier()?;
    Some((table, index))
}

/// `DROP INDEX name ON table` takes the same path as
/// `ALTER TABLE table DROP INDEX name`.
pub(super) fn drop_index_statement(sql: &str, schema: Option<&TableSchema>) -> RewrittenStatement {
    match drop_index_target(sql) {
        Some((table, index)) => drop_index(&table, &index, schema),
        None => RewrittenStatement::Single(sql.to_string()),
    }
}

/// Applies `change` to the table's current shape and emits the shadow-table
/// rebuild producing it. `None` when the table or a referenced column is
/// unknown.
fn rebuild(
    table: &str,
    schema: Option<&TableSchema>,
    change: impl FnOnce(&mut TableModel) -> Option<()>,
) -> Option<RewrittenStatement> {
    let mut model = TableModel::from_schema(table, schema?);
    change(&mut model)?;
    Some(RewrittenStatement::Plan(model.plan()))
}

#[derive(Debug, Clone)]
struct ModelColumn {
    definition: ColumnDefinition,
    source: Option<String>,
    source_not_null: bool,
}

#[derive(Debug, Clone)]
struct ModelIndex {
    engine_name: String,
    unique: bool,
    columns: Vec<String>,
}

#[derive(Debug, Clone)]
struct TableModel {
    table: String,
    columns: Vec<ModelColumn>,
    primary_key: Vec<String>,
    autoincrement: Option<String>,
    indexes: Vec<ModelIndex>,
}

impl TableModel {
    fn from_schema(table: &str, schema: &TableSchema) -> Self {
        let columns = schema
            .columns
            .iter()
            .map(|column| ModelColumn {
                definition: ColumnDefinition {
                    name: column.name.clone(),
                    data_type: column.declared_type.clone(),
                    not_null: column.not_null,
                    default: column.default.clone(),
                    auto_increment: false,
                    primary_key: false,
                    unique: false,
                    extra: Vec::new(),
                },
                source: Some(column.name.clone()),
                source_not_null: column.not_null,
            })
            .collect();
        let primary_key = schema
            .primary_key()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let autoincrement = match primary_key.as_slice() {
            [single] if schema.autoincrement => Some(single.clone()),
            _ => None,
        };
        let indexes = schema
            .indexes
            .iter()
            .filter(|index| index.origin != IndexOrigin::PrimaryKey && !index.columns.is_empty())
            .map(|index| ModelIndex {
                engine_name: match index.origin {
                    IndexOrigin::UniqueConstraint => engine_index_name(table, &index.columns[0]),
                    _ => index.name.clone(),
                },
                unique: index.unique,
                columns: index.columns.clone(),
            })
            .collect();

        Self {
            table: table.to_string(),
            columns,
            primary_key,
            autoincrement,
            indexes,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.definition.name.eq_ignore_ascii_case(name))
    }

    fn place(&mut self, column: ModelColumn, position: Position, after: Option<String>, fallback: usize) {
        let index = match position {
            Position::First => 0,
            Position::After => after
                .and_then(|after| self.position(&after))
                .map_or(self.columns.len(), |found| found + 1),
            Position::End => fallback.min(self.columns.len()),
        };
        self.columns.insert(index, column);
    }

    fn apply_keys(&mut self, definition: &ColumnDefinition) {
        let name = definition.name.clone();
        if definition.primary_key {
            self.primary_key = vec![name.clone()];
        }
        if definition.auto_increment && self.is_sole_key(&name) {
            self.autoincrement = Some(name.clone());
        }
        if definition.unique {
            self.indexes.push(ModelIndex {
                engine_name: engine_index_name(&self.table, &name),
                unique: true,
                columns: vec![name],
            });
        }
    }

    fn is_sole_key(&self, name: &str) -> bool {
        matches!(self.primary_key.as_slice(), [single] if single.eq_ignore_ascii_case(name))
    }

    fn add(&mut self, definition: ColumnDefinition, position: Position, after: Option<String>) {
        self.apply_keys(&definition);
        let end = self.columns.len();
        self.place(
            ModelColumn {
                definition,
                source: None,
                source_not_null: false,
            },
            position,
            after,
            end,
        );
    }

    fn change(
        &mut self,
        old: &str,
        definition: ColumnDefinition,
        position: Position,
        after: Option<String>,
    ) -> Option<()> {
        let index = self.position(old)?;
        let existing = self.columns.remove(index);
        let old_name = existing.definition.name.clone();
        self.rename_references(&old_name, &definition.name);

        if self
            .autoincrement
            .as_deref()
            .is_some_and(|column| column.eq_ignore_ascii_case(&definition.name))
            && !definition.auto_increment
        {
            self.autoincrement = None;
        }
        self.apply_keys(&definition);

        self.place(
            ModelColumn {
                definition,
                source: existing.source,
                source_not_null: existing.source_not_null,
            },
            position,
            after,
            index,
        );
        Some(())
    }

    fn drop_column(&mut self, name: &str) -> Option<()> {
        let index = self.position(name)?;
        let removed = self.columns.remove(index);
        let name = removed.definition.name;
        self.primary_key.retain(|column| !column.eq_ignore_ascii_case(&name));
        if self
            .autoincrement
            .as_deref()
            .is_some_and(|column| column.eq_ignore_ascii_case(&name))
        {
            self.autoincrement = None;
        }
        for index in &mut self.indexes {
            index.columns.retain(|column| !column.eq_ignore_ascii_case(&name));
        }
        self.indexes.retain(|index| !index.columns.is_empty());
        Some(())
    }

    fn set_default(&mut self, name: &str, default: Option<String>) -> Option<()> {
        let index = self.position(name)?;
        self.columns[index].definition.default = default;
        Some(())
    }

    fn set_primary_key(&mut self, columns: Vec<String>) {
        for column in &mut self.columns {
            if columns
                .iter()
                .any(|key| key.eq_ignore_ascii_case(&column.definition.name))
            {
                column.definition.not_null = true;
            }
        }
        self.primary_key = columns;
        if let Some(current) = self.autoincrement.clone()
            && !self.is_sole_key(&current)
        {
            self.autoincrement = None;
        }
    }

    fn rename_references(&mut self, old: &str, new: &str) {
        let rename = |column: &mut String| {
            if column.eq_ignore_ascii_case(old) {
                *column = new.to_string();
            }
        };
        self.primary_key.iter_mut().for_each(rename);
        for index in &mut self.indexes {
            index.columns.iter_mut().for_each(rename);
        }
        if let Some(column) = self.autoincrement.as_mut() {
            rename(column);
        }
    }

    fn plan(&self) -> RebuildPlan {
        let table = quote_identifier(&self.table);
        let shadow = quote_identifier(&format!("{SHADOW_PREFIX}{}", self.table));
        let inline_key = self.autoincrement.as_deref().filter(|column| self.is_sole_key(column));

        let mut definitions = Vec::new();
        let mut targets = Vec::new();
        let mut sources = Vec::new();
        for column in &self.columns {
            let definition = &column.definition;
            let inline = inline_key.is_some_and(|key| key.eq_ignore_ascii_case(&definition.name));
            let mut rendered = definition.clone();
            rendered.auto_increment = inline;
            definitions.push(rendered.render(inline));

            let fallback = || {
                definition
                    .default
                    .clone()
                    .unwrap_or_else(|| implicit_default(&definition.data_type).to_string())
            };
            let needs_value = definition.not_null && !inline;
            let expression = match &column.source {
                Some(source) if needs_value && !column.source_not_null => Some(format!(
                    "COALESCE({}, {})",
                    quote_identifier(source),
                    fallback()
                )),
                Some(source) => Some(quote_identifier(source)),
                None if needs_value && definition.default.is_none() => Some(fallback()),
                None => None,
            };
            if let Some(expression) = expression {
                targets.push(quote_identifier(&definition.name));
                sources.push(expression);
            }
        }
        if inline_key.is_none() && !self.primary_key.is_empty() {
            definitions.push(format!("PRIMARY KEY ({})", quote_list(&self.primary_key)));
        }

        let mut steps = vec![PlanStep::rebuild(
            format!("CREATE TABLE {shadow} ({})", definitions.join(", ")),
            RebuildStep::CreateShadowTable,
        )];
        if !targets.is_empty() {
            steps.push(PlanStep::rebuild(
                format!(
                    "INSERT INTO {shadow} ({}) SELECT {} FROM {table}",
                    targets.join(", "),
                    sources.join(", ")
                ),
                RebuildStep::CopyData,
            ));
        }
        steps.push(PlanStep::rebuild(
            format!("DROP TABLE {table}"),
            RebuildStep::DropOldTable,
        ));
        steps.push(PlanStep::rebuild(
            format!("ALTER TABLE {shadow} RENAME TO {table}"),
            RebuildStep::RenameShadowTable,
        ));
        steps.extend(self.indexes.iter().map(|index| {
            PlanStep::rebuild(
                render_index(&index.engine_name, &self.table, index.unique, &index.columns, false),
                RebuildStep::RecreateIndexes,
            )
        }));

        RebuildPlan {
            steps,
            follow_up: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{drop_index_target, rewrite, target_table};
    use crate::{
        ColumnInfo, IndexInfo, IndexOrigin, TableSchema,
        rewriter::{RebuildStep, RewrittenStatement},
    };

    fn column(name: &str, declared_type: &str, not_null: bool, primary_key: u32) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            declared_type: declared_type.to_string(),
            not_null,
            default: None,
            primary_key,
        }
    }

    fn posts() -> TableSchema {
        TableSchema {
            name: "posts".to_string(),
            columns: vec![
                column("id", "integer", true, 1),
                column("title", "varchar(200)", false, 0),
                column("body", "text", false, 0),
            ],
            indexes: vec![IndexInfo {
                name: "posts__title".to_string(),
                unique: false,
                origin: IndexOrigin::Created,
                columns: vec!["title".to_string()],
            }],
            autoincrement: true,
        }
    }

    fn plan_sql(rewritten: &RewrittenStatement) -> Vec<String> {
        let RewrittenStatement::Plan(plan) = rewritten else {
            panic!("expected a plan, got {rewritten:?}");
        };
        plan.steps.iter().map(|step| step.sql.clone()).collect()
    }

    #[test]
    fn parses_alter_and_drop_index_targets() {
        assert_eq!(target_table("ALTER TABLE `posts` ADD x int").as_deref(), Some("posts"));
        assert_eq!(
            drop_index_target("DROP INDEX title ON posts"),
            Some(("posts".to_string(), "title".to_string()))
        );
    }

    #[test]
    fn plain_add_column_runs_in_place_with_implicit_default() {
        let rewritten = rewrite("ALTER TABLE posts ADD COLUMN hits int NOT NULL", Some(&posts()));
        assert_eq!(
            rewritten,
            RewrittenStatement::Single(
                "ALTER TABLE `posts` ADD COLUMN `hits` int NOT NULL DEFAULT 0".to_string()
            )
        );
    }

    #[test]
    fn drop_column_rebuilds_through_shadow_table() {
        let rewritten = rewrite("ALTER TABLE posts DROP COLUMN body", Some(&posts()));
        let RewrittenStatement::Plan(plan) = &rewritten else {
            panic!("expected a plan");
        };
        let contexts = plan.steps.iter().map(|step| step.context).collect::<Vec<_>>();
        assert_eq!(
            contexts,
            vec![
                Some(RebuildStep::CreateShadowTable),
                Some(RebuildStep::CopyData),
                Some(RebuildStep::DropOldTable),
                Some(RebuildStep::RenameShadowTable),
                Some(RebuildStep::RecreateIndexes),
            ]
        );
        assert_eq!(
            plan_sql(&rewritten),
            vec![
                "CREATE TABLE `_mylite_rebuild_posts` (`id` integer PRIMARY KEY AUTOINCREMENT NOT NULL, `title` varchar(200))",
                "INSERT INTO `_mylite_rebuild_posts` (`id`, `title`) SELECT `id`, `title` FROM `posts`",
                "DROP TABLE `posts`",
                "ALTER TABLE `_mylite_rebuild_posts` RENAME TO `posts`",
                "CREATE INDEX `posts__title` ON `posts` (`title`)",
            ]
        );
    }

    #[test]
    fn modify_to_not_null_coalesces_existing_rows() {
        let rewritten = rewrite("ALTER TABLE posts MODIFY title varchar(100) NOT NULL", Some(&posts()));
        let steps = plan_sql(&rewritten);
        assert_eq!(
            steps[1],
            "INSERT INTO `_mylite_rebuild_posts` (`id`, `title`, `body`) SELECT `id`, COALESCE(`title`, ''), `body` FROM `posts`"
        );
    }

    #[test]
    fn remaining_subcommands_become_follow_up() {
        let rewritten = rewrite(
            "ALTER TABLE posts ADD INDEX by_body (body), RENAME TO articles, ENGINE=InnoDB",
            Some(&posts()),
        );
        let RewrittenStatement::Plan(plan) = rewritten else {
            panic!("expected a plan");
        };
        assert_eq!(plan.steps[0].sql, "CREATE INDEX `posts__by_body` ON `posts` (`body`)");
        assert_eq!(
            plan.follow_up.as_deref(),
            Some("ALTER TABLE `posts` RENAME TO articles, ENGINE=InnoDB")
        );
    }

    #[test]
    fn drop_index_resolves_prefixed_name() {
        assert_eq!(
            rewrite("ALTER TABLE posts DROP INDEX title", Some(&posts())),
            RewrittenStatement::Single("DROP INDEX `posts__title`".to_string())
        );
    }

    #[test]
    fn table_options_are_ignored() {
        assert_eq!(
            rewrite("ALTER TABLE posts ENGINE=InnoDB", Some(&posts())),
            RewrittenStatement::Noop
        );
    }
}
