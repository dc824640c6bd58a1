use sqlparser::dialect::{MsSqlDialect, MySqlDialect, SQLiteDialect};

/// SQL flavour spoken by a remote database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
    SqlServer,
}

impl Dialect {
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
            Dialect::SqlServer => format!("[{}]", ident.replace(']', "]]")),
        }
    }

    /// Placeholder for the `position`-th bind value, starting at 1.
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
            Dialect::SqlServer => format!("@P{}", position),
        }
    }

    pub fn count_expression(&self) -> &'static str {
        match self {
            Dialect::SqlServer => "COUNT_BIG(*)",
            Dialect::MySql | Dialect::Sqlite => "COUNT(*)",
        }
    }

    pub(crate) fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        match self {
            Dialect::MySql => Box::new(MySqlDialect {}),
            Dialect::Sqlite => Box::new(SQLiteDialect {}),
            Dialect::SqlServer => Box::new(MsSqlDialect {}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quote_characters() {
        assert_eq!(Dialect::MySql.quote_ident("a`b"), "`a``b`");
        assert_eq!(Dialect::Sqlite.quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::SqlServer.quote_ident("a]b"), "[a]]b]");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::MySql.placeholder(3), "?");
        assert_eq!(Dialect::SqlServer.placeholder(3), "@P3");
    }
}
