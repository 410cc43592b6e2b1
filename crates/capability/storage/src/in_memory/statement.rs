//! 内存数据库支持的语句
//!
//! 只覆盖测试需要的最小子集（大小写不敏感）：
//! - CREATE TABLE t
//! - INSERT INTO t (a, b) VALUES (?, ?)
//! - SELECT * FROM t [WHERE a = ?]
//! - DELETE FROM t [WHERE a = ?]

use super::InMemoryError;
use crate::value::{QueryResult, Row, SqlValue};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// 表：行 + 自增计数
#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    next_id: u64,
    rows: Vec<Row>,
}

pub(crate) type Tables = BTreeMap<String, Table>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    CreateTable { table: String },
    Insert { table: String, columns: Vec<String> },
    Select { table: String, filter: Option<String> },
    Delete { table: String, filter: Option<String> },
}

impl Statement {
    pub(crate) fn parse(sql: &str) -> Result<Self, InMemoryError> {
        let normalized = sql
            .trim()
            .trim_end_matches(';')
            .replace('(', " ( ")
            .replace(')', " ) ")
            .replace(',', " , ")
            .replace('=', " = ");
        let tokens: Vec<&str> = normalized.split_whitespace().collect();
        let upper: Vec<String> = tokens.iter().map(|t| t.to_ascii_uppercase()).collect();
        let keywords: Vec<&str> = upper.iter().map(String::as_str).collect();
        let syntax = || InMemoryError::Syntax(sql.to_string());

        match keywords.as_slice() {
            ["CREATE", "TABLE", _] => Ok(Statement::CreateTable {
                table: tokens[2].to_string(),
            }),
            ["INSERT", "INTO", _, "(", ..] => {
                let table = tokens[2].to_string();
                let close = keywords.iter().position(|t| *t == ")").ok_or_else(syntax)?;
                let columns: Vec<String> = tokens[4..close]
                    .iter()
                    .filter(|t| **t != ",")
                    .map(|t| t.to_string())
                    .collect();
                let values = &keywords[close + 1..];
                let placeholders = match values {
                    ["VALUES", "(", inner @ .., ")"] => {
                        inner.iter().filter(|t| **t != ",").collect::<Vec<_>>()
                    }
                    _ => return Err(syntax()),
                };
                if columns.is_empty()
                    || placeholders.len() != columns.len()
                    || placeholders.iter().any(|t| **t != "?")
                {
                    return Err(syntax());
                }
                Ok(Statement::Insert { table, columns })
            }
            ["SELECT", "*", "FROM", _] => Ok(Statement::Select {
                table: tokens[3].to_string(),
                filter: None,
            }),
            ["SELECT", "*", "FROM", _, "WHERE", _, "=", "?"] => Ok(Statement::Select {
                table: tokens[3].to_string(),
                filter: Some(tokens[5].to_string()),
            }),
            ["DELETE", "FROM", _] => Ok(Statement::Delete {
                table: tokens[2].to_string(),
                filter: None,
            }),
            ["DELETE", "FROM", _, "WHERE", _, "=", "?"] => Ok(Statement::Delete {
                table: tokens[2].to_string(),
                filter: Some(tokens[4].to_string()),
            }),
            _ => Err(syntax()),
        }
    }

    /// 是否修改数据（事务内需要记入日志）
    pub(crate) fn is_write(&self) -> bool {
        !matches!(self, Statement::Select { .. })
    }

    fn placeholders(&self) -> usize {
        match self {
            Statement::CreateTable { .. } => 0,
            Statement::Insert { columns, .. } => columns.len(),
            Statement::Select { filter, .. } | Statement::Delete { filter, .. } => {
                usize::from(filter.is_some())
            }
        }
    }

    pub(crate) fn apply(
        &self,
        tables: &mut Tables,
        params: &[SqlValue],
    ) -> Result<QueryResult, InMemoryError> {
        let expected = self.placeholders();
        if params.len() != expected {
            return Err(InMemoryError::ParameterCount {
                expected,
                actual: params.len(),
            });
        }

        match self {
            Statement::CreateTable { table } => {
                if tables.contains_key(table) {
                    return Err(InMemoryError::TableExists(table.clone()));
                }
                tables.insert(table.clone(), Table::default());
                Ok(QueryResult::default())
            }
            Statement::Insert { table, columns } => {
                let target = lookup(tables, table)?;
                let mut row = Row::new();
                for (column, value) in columns.iter().zip(params) {
                    row.insert(column.clone(), value.to_json());
                }
                target.next_id += 1;
                let id = match row.get("id").and_then(JsonValue::as_u64) {
                    Some(explicit) => explicit,
                    None => {
                        row.insert("id".to_string(), JsonValue::from(target.next_id));
                        target.next_id
                    }
                };
                target.rows.push(row);
                Ok(QueryResult {
                    rows: Vec::new(),
                    rows_affected: 1,
                    last_insert_id: Some(id),
                })
            }
            Statement::Select { table, filter } => {
                let target = lookup(tables, table)?;
                let rows = target
                    .rows
                    .iter()
                    .filter(|row| matches_filter(row, filter.as_deref(), params))
                    .cloned()
                    .collect();
                Ok(QueryResult::from_rows(rows))
            }
            Statement::Delete { table, filter } => {
                let target = lookup(tables, table)?;
                let before = target.rows.len();
                target
                    .rows
                    .retain(|row| !matches_filter(row, filter.as_deref(), params));
                Ok(QueryResult {
                    rows: Vec::new(),
                    rows_affected: (before - target.rows.len()) as u64,
                    last_insert_id: None,
                })
            }
        }
    }
}

fn lookup<'a>(tables: &'a mut Tables, table: &str) -> Result<&'a mut Table, InMemoryError> {
    tables
        .get_mut(table)
        .ok_or_else(|| InMemoryError::NoSuchTable(table.to_string()))
}

fn matches_filter(row: &Row, filter: Option<&str>, params: &[SqlValue]) -> bool {
    match (filter, params.first()) {
        (Some(column), Some(value)) => row.get(column) == Some(&value.to_json()),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_statements() {
        assert_eq!(
            Statement::parse("insert into books (title, price) values (?, ?);").expect("insert"),
            Statement::Insert {
                table: "books".to_string(),
                columns: vec!["title".to_string(), "price".to_string()],
            }
        );
        assert_eq!(
            Statement::parse("SELECT * FROM books WHERE isbn=?").expect("select"),
            Statement::Select {
                table: "books".to_string(),
                filter: Some("isbn".to_string()),
            }
        );
        assert!(Statement::parse("DELETE FROM cart").expect("delete").is_write());
    }

    #[test]
    fn rejects_unknown_syntax() {
        assert!(matches!(
            Statement::parse("SELEC * FROM books"),
            Err(InMemoryError::Syntax(_))
        ));
        assert!(matches!(
            Statement::parse("INSERT INTO books (title) VALUES (?, ?)"),
            Err(InMemoryError::Syntax(_))
        ));
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let mut tables = Tables::new();
        Statement::parse("CREATE TABLE books")
            .and_then(|s| s.apply(&mut tables, &[]))
            .expect("create");
        let insert = Statement::parse("INSERT INTO books (title) VALUES (?)").expect("parse");
        let first = insert
            .apply(&mut tables, &[SqlValue::from("Dune")])
            .expect("first");
        let second = insert
            .apply(&mut tables, &[SqlValue::from("Emma")])
            .expect("second");
        assert_eq!(first.last_insert_id, Some(1));
        assert_eq!(second.last_insert_id, Some(2));

        let err = insert.apply(&mut tables, &[]).expect_err("missing param");
        assert!(matches!(
            err,
            InMemoryError::ParameterCount {
                expected: 1,
                actual: 0
            }
        ));
    }
}
