//! SQL composition for lookup queries.
//!
//! Statements are written as templates with `/**where**/` and
//! `/**orderby**/` slots. [`SqlBuilder`] accumulates predicates and sort
//! keys, binds every request-supplied value as a `$n` parameter, and
//! renders the templates. Identifiers are only ever taken from
//! [`Identifier`], which admits plain and schema-qualified names.

use lookup_core::Identifier;
use lookup_storage::{PageQuery, Predicate, SnapshotQuery};
use tokio_postgres::types::ToSql;

pub const WHERE_SLOT: &str = "/**where**/";
pub const ORDER_BY_SLOT: &str = "/**orderby**/";

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    BigInt(i64),
}

impl SqlParam {
    fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlParam::Text(s) => s,
            SqlParam::BigInt(n) => n,
        }
    }
}

/// Borrow parameters in the form tokio-postgres expects.
pub fn as_sql_params(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(SqlParam::as_sql).collect()
}

/// Accumulates WHERE predicates, ORDER BY keys and bound values.
#[derive(Debug, Default)]
pub struct SqlBuilder {
    wheres: Vec<String>,
    order_by: Vec<String>,
    params: Vec<SqlParam>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value, returning its placeholder.
    pub fn bind(&mut self, value: SqlParam) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    /// AND a predicate into the WHERE slot.
    pub fn and_where(&mut self, predicate: String) -> &mut Self {
        self.wheres.push(predicate);
        self
    }

    /// Append a sort key.
    pub fn order_by(&mut self, column: &Identifier) -> &mut Self {
        self.order_by.push(column.to_string());
        self
    }

    /// Number of parameters bound so far.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    /// Fill the slots of `template`.
    pub fn render(&self, template: &str) -> String {
        let where_clause = if self.wheres.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.wheres.join(" AND "))
        };
        let order_clause = if self.order_by.is_empty() {
            String::new()
        } else {
            format!("ORDER BY {}", self.order_by.join(", "))
        };
        template
            .replace(WHERE_SLOT, &where_clause)
            .replace(ORDER_BY_SLOT, &order_clause)
    }
}

/// Escape `LIKE` metacharacters so the term matches literally.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Page and count statements sharing one parameter list. The count
/// statement uses the first `count_params` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageStatements {
    pub page_sql: String,
    pub count_sql: String,
    pub params: Vec<SqlParam>,
    pub count_params: usize,
}

impl PageStatements {
    pub fn page_params(&self) -> Vec<&(dyn ToSql + Sync)> {
        as_sql_params(&self.params)
    }

    pub fn count_params(&self) -> Vec<&(dyn ToSql + Sync)> {
        as_sql_params(&self.params[..self.count_params])
    }
}

/// Render a [`PageQuery`] for PostgreSQL.
pub fn page_statements(query: &PageQuery) -> PageStatements {
    let mut builder = SqlBuilder::new();

    for predicate in &query.predicates {
        let clause = match predicate {
            Predicate::LabelContains { column, term } => {
                let placeholder =
                    builder.bind(SqlParam::Text(format!("%{}%", escape_like(term))));
                format!("CAST({column} AS TEXT) ILIKE {placeholder} ESCAPE '\\'")
            }
            Predicate::Equals { column, value } => {
                let placeholder = builder.bind(SqlParam::Text(value.clone()));
                format!("CAST({column} AS TEXT) = {placeholder}")
            }
            Predicate::IsNull { column } => format!("{column} IS NULL"),
        };
        builder.and_where(clause);
    }
    for column in &query.order_by {
        builder.order_by(column);
    }

    let count_params = builder.param_count();
    let offset = builder.bind(SqlParam::BigInt(clamp_i64(query.offset)));
    let limit = builder.bind(SqlParam::BigInt(clamp_i64(query.limit)));

    let page_sql = builder.render(&format!(
        "SELECT CAST({id} AS TEXT) AS value, CAST({label} AS TEXT) AS label \
         FROM {table} {WHERE_SLOT} {ORDER_BY_SLOT} \
         OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY",
        id = query.id_column,
        label = query.label_column,
        table = query.table,
    ));
    let count_sql = builder.render(&format!(
        "SELECT COUNT(*) FROM {table} {WHERE_SLOT}",
        table = query.table
    ));

    PageStatements {
        page_sql,
        count_sql,
        params: builder.params().to_vec(),
        count_params,
    }
}

/// Render a [`SnapshotQuery`] for PostgreSQL. Takes no parameters.
pub fn snapshot_statement(query: &SnapshotQuery) -> String {
    let mut builder = SqlBuilder::new();
    builder.order_by(&query.order_by);
    if query.order_by != query.id_column {
        builder.order_by(&query.id_column);
    }
    let filter = match &query.filter_column {
        Some(column) => format!("CAST({column} AS TEXT)"),
        None => "CAST(NULL AS TEXT)".to_string(),
    };
    builder.render(&format!(
        "SELECT CAST({id} AS TEXT) AS value, CAST({label} AS TEXT) AS label, \
         {filter} AS filter_value FROM {table} {ORDER_BY_SLOT}",
        id = query.id_column,
        label = query.label_column,
        table = query.table,
    ))
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookup_core::LookupDefinition;
    use proptest::prelude::*;

    fn squash(sql: &str) -> String {
        sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn users() -> LookupDefinition {
        LookupDefinition::live("Users", "AppUsers", "UserId", "FullName")
            .unwrap()
            .with_filter_column("TeamId")
            .unwrap()
    }

    #[test]
    fn test_unfiltered_page() {
        let query = PageQuery::for_definition(&users(), 20).with_offset(40);
        let statements = page_statements(&query);
        assert_eq!(
            squash(&statements.page_sql),
            "SELECT CAST(UserId AS TEXT) AS value, CAST(FullName AS TEXT) AS label \
             FROM AppUsers ORDER BY FullName, UserId OFFSET $1 ROWS FETCH NEXT $2 ROWS ONLY"
        );
        assert_eq!(squash(&statements.count_sql), "SELECT COUNT(*) FROM AppUsers");
        assert_eq!(
            statements.params,
            vec![SqlParam::BigInt(40), SqlParam::BigInt(20)]
        );
        assert_eq!(statements.count_params, 0);
    }

    #[test]
    fn test_search_and_filter_are_parameterized() {
        let def = users();
        let query = PageQuery::for_definition(&def, 10)
            .with_predicate(Predicate::LabelContains {
                column: def.label_column.clone(),
                term: "o'brien".to_string(),
            })
            .with_predicate(Predicate::Equals {
                column: def.filter_column.clone().unwrap(),
                value: "7".to_string(),
            });
        let statements = page_statements(&query);
        assert_eq!(
            squash(&statements.count_sql),
            "SELECT COUNT(*) FROM AppUsers WHERE CAST(FullName AS TEXT) ILIKE $1 ESCAPE '\\' \
             AND CAST(TeamId AS TEXT) = $2"
        );
        assert!(statements.page_sql.contains("OFFSET $3 ROWS FETCH NEXT $4 ROWS ONLY"));
        assert!(!statements.page_sql.contains("o'brien"));
        assert_eq!(statements.params[0], SqlParam::Text("%o'brien%".to_string()));
        assert_eq!(statements.count_params().len(), 2);
        assert_eq!(statements.page_params().len(), 4);
    }

    #[test]
    fn test_is_null_binds_nothing() {
        let def = users();
        let query = PageQuery::for_definition(&def, 10).with_predicate(Predicate::IsNull {
            column: def.filter_column.clone().unwrap(),
        });
        let statements = page_statements(&query);
        assert!(statements.count_sql.contains("WHERE TeamId IS NULL"));
        assert_eq!(statements.count_params, 0);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\dir"), "c:\\\\dir");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_snapshot_statement() {
        let def = LookupDefinition::cached("States", "Ref_State", "Id", "StateName")
            .unwrap()
            .with_filter_column("CountryId")
            .unwrap()
            .with_order_by("StateName")
            .unwrap();
        assert_eq!(
            squash(&snapshot_statement(&SnapshotQuery::for_definition(&def))),
            "SELECT CAST(Id AS TEXT) AS value, CAST(StateName AS TEXT) AS label, \
             CAST(CountryId AS TEXT) AS filter_value FROM Ref_State ORDER BY StateName, Id"
        );

        let plain = LookupDefinition::cached("Codes", "ref.Codes", "Code", "Name").unwrap();
        let sql = snapshot_statement(&SnapshotQuery::for_definition(&plain));
        assert!(sql.contains("CAST(NULL AS TEXT) AS filter_value FROM ref.Codes"));
    }

    proptest! {
        #[test]
        fn prop_request_values_never_reach_sql_text(term in "[ -~]{1,24}", value in "[ -~]{1,12}") {
            let def = users();
            let query = PageQuery::for_definition(&def, 10)
                .with_predicate(Predicate::LabelContains {
                    column: def.label_column.clone(),
                    term: term.clone(),
                })
                .with_predicate(Predicate::Equals {
                    column: def.filter_column.clone().unwrap(),
                    value: value.clone(),
                });
            let statements = page_statements(&query);
            let template_only = page_statements(
                &PageQuery::for_definition(&def, 10)
                    .with_predicate(Predicate::LabelContains {
                        column: def.label_column.clone(),
                        term: "x".to_string(),
                    })
                    .with_predicate(Predicate::Equals {
                        column: def.filter_column.clone().unwrap(),
                        value: "y".to_string(),
                    }),
            );
            prop_assert_eq!(&statements.page_sql, &template_only.page_sql);
            prop_assert_eq!(&statements.count_sql, &template_only.count_sql);
            prop_assert_eq!(&statements.params[1], &SqlParam::Text(value));
        }
    }
}
