//! SQLite-backed persistence backend.
//!
//! # Responsibility
//! - Map the capability set onto one caller-owned table.
//! - Turn constraint violations into `PersistenceError` without raising and
//!   missing records into `QueryError`.
//!
//! # Invariants
//! - Table and column names are validated identifiers before reaching SQL.
//! - Every statement is restricted to the scope partition when one is set.
//! - Rows stamped in `soft_delete_column` are invisible to reads.
//! - Transactions are savepoints, so they nest inside caller transactions.

use super::{
    AttributeMapper, BackendKind, Data, Page, Persistence, RecordMapper, Scope, Transactional,
    DEFAULT_IDENTIFIER_FIELD,
};
use crate::db::{DbError, DbResult};
use crate::model::entity::{merge_attributes, Attributes, Entity};
use crate::repo::error::{FieldErrors, PersistenceError, QueryError, RepoError, RepoResult};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{ffi, params_from_iter, Connection, ErrorCode};
use serde_json::{Number, Value};
use std::rc::Rc;

const SAVEPOINT: &str = "interflow_tx";
const NOW_MS_SQL: &str = "(CAST(strftime('%s', 'now') AS INTEGER) * 1000)";

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Table binding for a relational repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalConfig {
    pub table: String,
    pub identifier_field: String,
    pub soft_delete_column: Option<String>,
}

impl RelationalConfig {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            identifier_field: DEFAULT_IDENTIFIER_FIELD.to_string(),
            soft_delete_column: None,
        }
    }

    pub fn identifier_field(mut self, field: impl Into<String>) -> Self {
        self.identifier_field = field.into();
        self
    }

    pub fn soft_delete_column(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = Some(column.into());
        self
    }

    fn validate(&self) -> DbResult<()> {
        ensure_identifier(&self.table)?;
        ensure_identifier(&self.identifier_field)?;
        if let Some(column) = &self.soft_delete_column {
            ensure_identifier(column)?;
        }
        Ok(())
    }
}

/// Relational backend over a shared SQLite connection.
pub struct RelationalPersistence<E: Entity> {
    conn: Rc<Connection>,
    config: RelationalConfig,
    scope: Option<Scope>,
    mapper: Rc<dyn RecordMapper<E>>,
}

/// Accumulated `WHERE` fragments with their bound values.
#[derive(Default)]
struct Filter {
    clauses: Vec<String>,
    binds: Vec<SqlValue>,
}

impl Filter {
    fn eq(&mut self, column: &str, value: &Value) {
        if value.is_null() {
            self.clauses.push(format!("\"{column}\" IS NULL"));
        } else {
            self.clauses.push(format!("\"{column}\" = ?"));
            self.binds.push(to_sql_value(value));
        }
    }

    fn raw(&mut self, clause: String) {
        self.clauses.push(clause);
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

impl<E: Entity> RelationalPersistence<E> {
    pub fn new(conn: Rc<Connection>, config: RelationalConfig) -> RepoResult<Self> {
        config.validate()?;
        Ok(Self {
            conn,
            config,
            scope: None,
            mapper: Rc::new(AttributeMapper),
        })
    }

    pub fn scoped(mut self, scope: Scope) -> RepoResult<Self> {
        ensure_identifier(&scope.key)?;
        self.scope = Some(scope);
        Ok(self)
    }

    pub fn mapped_with(mut self, mapper: Rc<dyn RecordMapper<E>>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn config(&self) -> &RelationalConfig {
        &self.config
    }

    fn table(&self) -> &str {
        &self.config.table
    }

    fn id_field(&self) -> &str {
        &self.config.identifier_field
    }

    /// Scope partition only; used by bulk deletes.
    fn scope_filter(&self) -> Filter {
        let mut filter = Filter::default();
        if let Some(scope) = &self.scope {
            filter.eq(&scope.key, &scope.value);
        }
        filter
    }

    /// Scope partition plus soft-delete visibility; used by reads.
    fn visible_filter(&self) -> Filter {
        let mut filter = self.scope_filter();
        if let Some(column) = &self.config.soft_delete_column {
            filter.raw(format!("\"{column}\" IS NULL"));
        }
        filter
    }

    fn select(&self, filter: &Filter, suffix: &str) -> RepoResult<Vec<Attributes>> {
        let sql = format!("SELECT * FROM \"{}\"{}{suffix}", self.table(), filter.sql());
        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut rows = stmt.query(params_from_iter(filter.binds.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Attributes::new();
            for (index, column) in columns.iter().enumerate() {
                record.insert(column.clone(), from_sql_ref(row.get_ref(index)?));
            }
            records.push(record);
        }
        Ok(records)
    }

    fn select_one(&self, filter: &Filter, order: &str) -> RepoResult<Option<Attributes>> {
        let mut records = self.select(filter, &format!(" ORDER BY rowid {order} LIMIT 1"))?;
        Ok(records.pop())
    }

    fn find_record(&self, id: &Value) -> RepoResult<Option<Attributes>> {
        let mut filter = self.visible_filter();
        filter.eq(self.id_field(), id);
        self.select_one(&filter, "ASC")
    }

    fn require_record(&self, id: &Value) -> RepoResult<Attributes> {
        self.find_record(id)?
            .ok_or_else(|| QueryError::record_not_found(self.id_field(), id).into())
    }

    fn to_entity(&self, record: Attributes) -> RepoResult<E> {
        Ok(self.mapper.to_entity(record)?)
    }

    fn to_entities(&self, records: Vec<Attributes>) -> RepoResult<Vec<E>> {
        records
            .into_iter()
            .map(|record| self.to_entity(record))
            .collect()
    }

    /// Converts a failed write into `PersistenceError` when it is a
    /// constraint violation; other failures stay storage errors.
    fn write_failure(&self, err: rusqlite::Error, record: Attributes) -> RepoError {
        match constraint_violation(&err, self.table()) {
            Some(errors) => {
                warn!(
                    "event=repo_write module=persistence backend=relational status=failure table={} fields={}",
                    self.table(),
                    errors.keys().cloned().collect::<Vec<_>>().join(",")
                );
                let entity = self
                    .mapper
                    .to_entity(record.clone())
                    .and_then(|entity| self.mapper.to_record(&entity))
                    .ok();
                PersistenceError {
                    errors,
                    entity,
                    record,
                }
                .into()
            }
            None => err.into(),
        }
    }
}

impl<E: Entity> Transactional for RelationalPersistence<E> {
    fn kind(&self) -> BackendKind {
        BackendKind::of::<Connection>()
    }

    fn begin(&self) -> DbResult<()> {
        // rusqlite's Transaction guard borrows the connection until dropped,
        // so it cannot stay open between separate begin and commit calls.
        self.conn.execute_batch(&format!("SAVEPOINT {SAVEPOINT};"))?;
        debug!("event=tx_begin module=persistence backend=relational status=ok");
        Ok(())
    }

    fn commit(&self) -> DbResult<()> {
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {SAVEPOINT};"))?;
        Ok(())
    }

    fn rollback(&self) -> DbResult<()> {
        self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {SAVEPOINT}; RELEASE SAVEPOINT {SAVEPOINT};"
        ))?;
        debug!("event=tx_rollback module=persistence backend=relational status=ok");
        Ok(())
    }

    fn store_identity(&self) -> Option<usize> {
        Some(Rc::as_ptr(&self.conn) as usize)
    }
}

impl<E: Entity> Persistence<E> for RelationalPersistence<E> {
    fn identifier_field(&self) -> &str {
        self.id_field()
    }

    fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    fn create(&self, data: Data<E>) -> RepoResult<E> {
        let mut record = data.into_record(self.mapper.as_ref())?;
        if let Some(scope) = &self.scope {
            scope.stamp(&mut record);
        }
        // Null identifiers are left to SQLite (rowid alias / defaults).
        if record.get(self.id_field()).is_some_and(Value::is_null) {
            record.remove(self.id_field());
        }
        for column in record.keys() {
            ensure_identifier(column)?;
        }

        let sql = if record.is_empty() {
            format!("INSERT INTO \"{}\" DEFAULT VALUES", self.table())
        } else {
            let columns = record
                .keys()
                .map(|column| format!("\"{column}\""))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = vec!["?"; record.len()].join(", ");
            format!(
                "INSERT INTO \"{}\" ({columns}) VALUES ({placeholders})",
                self.table()
            )
        };
        let binds: Vec<SqlValue> = record.values().map(to_sql_value).collect();
        if let Err(err) = self.conn.execute(&sql, params_from_iter(binds)) {
            return Err(self.write_failure(err, record));
        }

        let mut filter = Filter::default();
        filter.raw("rowid = ?".to_string());
        filter.binds.push(SqlValue::Integer(self.conn.last_insert_rowid()));
        let stored = self.select_one(&filter, "ASC")?.ok_or_else(|| {
            RepoError::InvalidData(format!("inserted row vanished from `{}`", self.table()))
        })?;
        self.to_entity(stored)
    }

    fn update(&self, id: &Value, data: Data<E>) -> RepoResult<E> {
        let existing = self.require_record(id)?;
        let mut changes = data.into_record(self.mapper.as_ref())?;
        if changes.get(self.id_field()).is_some_and(Value::is_null) {
            changes.remove(self.id_field());
        }
        if changes.is_empty() {
            return self.to_entity(existing);
        }
        for column in changes.keys() {
            ensure_identifier(column)?;
        }

        let assignments = changes
            .keys()
            .map(|column| format!("\"{column}\" = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut filter = self.scope_filter();
        filter.eq(self.id_field(), id);
        let sql = format!(
            "UPDATE \"{}\" SET {assignments}{}",
            self.table(),
            filter.sql()
        );
        let binds: Vec<SqlValue> = changes
            .values()
            .map(to_sql_value)
            .chain(filter.binds.iter().cloned())
            .collect();

        let next_id = changes
            .get(self.id_field())
            .cloned()
            .unwrap_or_else(|| id.clone());
        if let Err(err) = self.conn.execute(&sql, params_from_iter(binds)) {
            let mut attempted = existing;
            merge_attributes(&mut attempted, changes);
            return Err(self.write_failure(err, attempted));
        }

        let updated = self.require_record(&next_id)?;
        self.to_entity(updated)
    }

    fn delete(&self, id: &Value) -> RepoResult<bool> {
        self.require_record(id)?;
        let mut filter = self.scope_filter();
        filter.eq(self.id_field(), id);
        let sql = format!("DELETE FROM \"{}\"{}", self.table(), filter.sql());
        let changed = self.conn.execute(&sql, params_from_iter(filter.binds))?;
        Ok(changed > 0)
    }

    fn soft_delete(&self, id: &Value) -> RepoResult<bool> {
        let Some(column) = self.config.soft_delete_column.clone() else {
            return self.delete(id);
        };
        self.require_record(id)?;
        let mut filter = self.visible_filter();
        filter.eq(self.id_field(), id);
        let sql = format!(
            "UPDATE \"{}\" SET \"{column}\" = {NOW_MS_SQL}{}",
            self.table(),
            filter.sql()
        );
        let changed = self.conn.execute(&sql, params_from_iter(filter.binds))?;
        Ok(changed > 0)
    }

    fn delete_all(&self) -> RepoResult<()> {
        let filter = self.scope_filter();
        let sql = format!("DELETE FROM \"{}\"{}", self.table(), filter.sql());
        self.conn.execute(&sql, params_from_iter(filter.binds))?;
        Ok(())
    }

    fn soft_delete_all(&self) -> RepoResult<()> {
        let Some(column) = self.config.soft_delete_column.clone() else {
            return self.delete_all();
        };
        let filter = self.visible_filter();
        let sql = format!(
            "UPDATE \"{}\" SET \"{column}\" = {NOW_MS_SQL}{}",
            self.table(),
            filter.sql()
        );
        self.conn.execute(&sql, params_from_iter(filter.binds))?;
        Ok(())
    }

    fn all(&self) -> RepoResult<Vec<E>> {
        let records = self.select(&self.visible_filter(), " ORDER BY rowid ASC")?;
        self.to_entities(records)
    }

    fn paginate(&self, page: Page) -> RepoResult<Vec<E>> {
        let suffix = format!(
            " ORDER BY rowid ASC LIMIT {} OFFSET {}",
            page.size,
            page.offset()
        );
        let records = self.select(&self.visible_filter(), &suffix)?;
        self.to_entities(records)
    }

    fn find(&self, id: &Value) -> RepoResult<Option<E>> {
        self.find_record(id)?
            .map(|record| self.to_entity(record))
            .transpose()
    }

    fn find_by(&self, attributes: &Attributes) -> RepoResult<Option<E>> {
        let mut filter = self.visible_filter();
        for (column, value) in attributes {
            ensure_identifier(column)?;
            filter.eq(column, value);
        }
        self.select_one(&filter, "ASC")?
            .map(|record| self.to_entity(record))
            .transpose()
    }

    fn first(&self) -> RepoResult<Option<E>> {
        self.select_one(&self.visible_filter(), "ASC")?
            .map(|record| self.to_entity(record))
            .transpose()
    }

    fn last(&self) -> RepoResult<Option<E>> {
        self.select_one(&self.visible_filter(), "DESC")?
            .map(|record| self.to_entity(record))
            .transpose()
    }

    fn count(&self) -> RepoResult<usize> {
        let filter = self.visible_filter();
        let sql = format!("SELECT COUNT(*) FROM \"{}\"{}", self.table(), filter.sql());
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(filter.binds), |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn ensure_identifier(name: &str) -> DbResult<()> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => SqlValue::Real(number.as_f64().unwrap_or_default()),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        nested @ (Value::Array(_) | Value::Object(_)) => SqlValue::Text(nested.to_string()),
    }
}

fn from_sql_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(integer) => Value::Number(integer.into()),
        ValueRef::Real(real) => Number::from_f64(real).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|byte| (*byte).into()).collect()),
    }
}

/// Extracts field errors from a SQLite constraint failure.
///
/// Column constraints (`UNIQUE`, `NOT NULL`, primary key) are keyed by column;
/// table-level constraints (`CHECK`, foreign keys) are keyed under `base`.
fn constraint_violation(err: &rusqlite::Error, table: &str) -> Option<FieldErrors> {
    let rusqlite::Error::SqliteFailure(failure, message) = err else {
        return None;
    };
    if failure.code != ErrorCode::ConstraintViolation {
        return None;
    }

    let (text, per_column) = match failure.extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
            ("has already been taken", true)
        }
        ffi::SQLITE_CONSTRAINT_NOTNULL => ("can't be blank", true),
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ("must exist", false),
        _ => ("is invalid", false),
    };

    let mut errors = FieldErrors::new();
    let detail = message.as_deref().unwrap_or_default();
    let columns: Vec<&str> = if per_column {
        detail
            .split_once(": ")
            .map(|(_, list)| list.split(", ").collect())
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    for qualified in columns {
        let column = qualified
            .strip_prefix(table)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(qualified);
        errors
            .entry(column.to_string())
            .or_default()
            .push(text.to_string());
    }
    if errors.is_empty() {
        let base = if detail.is_empty() {
            text.to_string()
        } else {
            format!("{text} ({detail})")
        };
        errors.insert("base".to_string(), vec![base]);
    }
    Some(errors)
}
