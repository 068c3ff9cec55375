//! Native table metadata as reported by the embedded engine's introspection.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
    /// Whether the table was declared with `AUTOINCREMENT`.
    pub autoincrement: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    /// Default as SQL expression text, exactly as declared.
    pub default: Option<String>,
    /// 1-based position within the primary key, 0 when not part of it.
    pub primary_key: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    Created,
    UniqueConstraint,
    PrimaryKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub origin: IndexOrigin,
    pub columns: Vec<String>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key(&self) -> Vec<&str> {
        let mut keyed = self
            .columns
            .iter()
            .filter(|column| column.primary_key > 0)
            .collect::<Vec<_>>();
        keyed.sort_by_key(|column| column.primary_key);
        keyed.into_iter().map(|column| column.name.as_str()).collect()
    }

    pub fn index(&self, name: &str) -> Option<&IndexInfo> {
        self.indexes
            .iter()
            .find(|index| index.name.eq_ignore_ascii_case(name))
    }
}
