//! In-memory backend for integration tests.
//!
//! Emulates a single `people (id BIGINT, name VARCHAR, age INT)` table and
//! understands just enough SQL for the tests:
//! - `CREATE ...` (no-op update)
//! - `INSERT INTO people (cols) VALUES (...)`
//! - `SELECT * FROM people [WHERE col = v] [ORDER BY ...]`
//! - `UPDATE people SET col = v [WHERE col = v]`
//! - `DELETE FROM people [WHERE col = v]`
//! - `BLOCK` (parks the session until the test releases it)
//!
//! Like MySQL it reports generated keys for every insert whether or not they
//! were requested, so tests can check that the driver drops them.

#![allow(dead_code)]

use async_trait::async_trait;
use db_driver::config::Credentials;
use db_driver::db::{
    BackendDriver, BackendSession, ConnectTarget, Connection, DriverRegistry, RawOutcome,
    RawRequest, RowSet,
};
use db_driver::error::{DriverError, DriverResult};
use db_driver::models::{ColumnMetadata, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const MEMORY_URL: &str = "memory://localhost/test";
pub const BAD_PASSWORD: &str = "wrong";

#[derive(Debug, Clone)]
struct Person {
    id: i64,
    name: Value,
    age: Value,
}

/// State shared by every session the driver opens.
#[derive(Debug, Default)]
pub struct MemoryState {
    people: Mutex<Vec<Person>>,
    next_id: Mutex<i64>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    /// Signalled when a `BLOCK` statement starts waiting.
    pub entered: Notify,
    /// Releases a waiting `BLOCK` statement.
    pub release: Notify,
}

impl MemoryState {
    pub fn row_count(&self) -> usize {
        self.people.lock().unwrap().len()
    }

    pub fn open_sessions(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MemoryDriver {
    state: Arc<MemoryState>,
}

impl MemoryDriver {
    pub fn new(state: Arc<MemoryState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl BackendDriver for MemoryDriver {
    fn name(&self) -> &str {
        "Memory"
    }

    fn schemes(&self) -> &[&'static str] {
        &["memory"]
    }

    fn default_port(&self) -> u16 {
        7000
    }

    async fn open(&self, target: &ConnectTarget) -> DriverResult<Box<dyn BackendSession>> {
        if target.credentials.password.as_deref() == Some(BAD_PASSWORD) {
            return Err(DriverError::connection(
                "Access denied for user",
                "Verify the user name and password",
            ));
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemorySession {
    state: Arc<MemoryState>,
}

fn people_columns() -> Vec<ColumnMetadata> {
    vec![
        ColumnMetadata::new("id", "BIGINT"),
        ColumnMetadata::new("name", "VARCHAR"),
        ColumnMetadata::new("age", "INT"),
    ]
}

fn syntax_error(sql: &str) -> DriverError {
    DriverError::execution(
        format!("You have an error in your SQL syntax near '{}'", sql),
        Some("42000".to_string()),
    )
}

/// A literal or the next bound parameter.
fn operand(token: &str, params: &mut impl Iterator<Item = Value>) -> DriverResult<Value> {
    let token = token.trim();
    if token == "?" {
        return params
            .next()
            .ok_or_else(|| DriverError::execution("missing parameter", None));
    }
    if token.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    if let Some(text) = token.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Ok(Value::from(text.replace("''", "'")));
    }
    if let Ok(n) = token.parse::<i64>() {
        return Ok(Value::from(n));
    }
    if let Ok(n) = token.parse::<f64>() {
        return Ok(Value::from(n));
    }
    Err(syntax_error(token))
}

fn same(a: &Value, b: &Value) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// `col = v` pair.
fn assignment(
    text: &str,
    params: &mut impl Iterator<Item = Value>,
) -> DriverResult<(String, Value)> {
    let (col, value) = text.split_once('=').ok_or_else(|| syntax_error(text))?;
    Ok((col.trim().to_ascii_lowercase(), operand(value, params)?))
}

/// Split `sql` at ` WHERE `, dropping any `ORDER BY` tail.
fn split_where(sql: &str) -> (&str, Option<&str>) {
    let upper = sql.to_ascii_uppercase();
    let end = upper.find(" ORDER BY ").unwrap_or(sql.len());
    match upper[..end].find(" WHERE ") {
        Some(pos) => (&sql[..pos], Some(&sql[pos + 7..end])),
        None => (&sql[..end], None),
    }
}

impl Person {
    fn get(&self, col: &str) -> Value {
        match col {
            "id" => Value::from(self.id),
            "name" => self.name.clone(),
            "age" => self.age.clone(),
            _ => Value::Null,
        }
    }

    fn set(&mut self, col: &str, value: Value) -> DriverResult<()> {
        match col {
            "name" => self.name = value,
            "age" => self.age = value,
            _ => return Err(DriverError::execution(format!("Unknown column '{}'", col), Some("42S22".to_string()))),
        }
        Ok(())
    }

    fn row(&self) -> Vec<Value> {
        vec![Value::from(self.id), self.name.clone(), self.age.clone()]
    }
}

impl MemorySession {
    fn filter(
        &self,
        condition: Option<&str>,
        params: &mut impl Iterator<Item = Value>,
    ) -> DriverResult<impl Fn(&Person) -> bool> {
        let condition = condition.map(|c| assignment(c, params)).transpose()?;
        Ok(move |p: &Person| match &condition {
            Some((col, value)) => same(&p.get(col), value),
            None => true,
        })
    }

    fn insert(&self, sql: &str, params: &mut impl Iterator<Item = Value>) -> DriverResult<RawOutcome> {
        let upper = sql.to_ascii_uppercase();
        let values_at = upper.find("VALUES").ok_or_else(|| syntax_error(sql))?;
        let cols_open = sql.find('(').ok_or_else(|| syntax_error(sql))?;
        let cols_close = sql.find(')').ok_or_else(|| syntax_error(sql))?;
        let vals_open = values_at + sql[values_at..].find('(').ok_or_else(|| syntax_error(sql))?;
        let vals_close = sql.rfind(')').ok_or_else(|| syntax_error(sql))?;

        let columns: Vec<String> = sql[cols_open + 1..cols_close]
            .split(',')
            .map(|c| c.trim().to_ascii_lowercase())
            .collect();
        let tokens: Vec<&str> = sql[vals_open + 1..vals_close].split(',').collect();
        if columns.len() != tokens.len() {
            return Err(DriverError::execution(
                "Column count doesn't match value count",
                Some("21S01".to_string()),
            ));
        }

        let id = {
            let mut next = self.state.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        let mut person = Person {
            id,
            name: Value::Null,
            age: Value::Null,
        };
        for (col, token) in columns.iter().zip(tokens) {
            person.set(col, operand(token, params)?)?;
        }
        self.state.people.lock().unwrap().push(person);

        Ok(RawOutcome::Update {
            rows_affected: 1,
            generated_keys: Some(RowSet::new(
                vec![ColumnMetadata::new("GENERATED_KEY", "BIGINT")],
                vec![vec![Value::from(id)]],
            )),
        })
    }

    fn select(&self, sql: &str, params: &mut impl Iterator<Item = Value>) -> DriverResult<RawOutcome> {
        let (_, condition) = split_where(sql);
        let keep = self.filter(condition, params)?;
        let rows = self
            .state
            .people
            .lock()
            .unwrap()
            .iter()
            .filter(|p| keep(p))
            .map(Person::row)
            .collect();
        Ok(RawOutcome::Rows(RowSet::new(people_columns(), rows)))
    }

    fn update(&self, sql: &str, params: &mut impl Iterator<Item = Value>) -> DriverResult<RawOutcome> {
        let (head, condition) = split_where(sql);
        let set_at = head.to_ascii_uppercase().find(" SET ").ok_or_else(|| syntax_error(sql))?;
        let (col, value) = assignment(&head[set_at + 5..], params)?;
        let keep = self.filter(condition, params)?;

        let mut people = self.state.people.lock().unwrap();
        let mut affected = 0;
        for person in people.iter_mut().filter(|p| keep(p)) {
            person.set(&col, value.clone())?;
            affected += 1;
        }
        Ok(RawOutcome::Update {
            rows_affected: affected,
            generated_keys: None,
        })
    }

    fn delete(&self, sql: &str, params: &mut impl Iterator<Item = Value>) -> DriverResult<RawOutcome> {
        let (_, condition) = split_where(sql);
        let keep = self.filter(condition, params)?;

        let mut people = self.state.people.lock().unwrap();
        let before = people.len();
        people.retain(|p| !keep(p));
        Ok(RawOutcome::Update {
            rows_affected: (before - people.len()) as u64,
            generated_keys: None,
        })
    }
}

#[async_trait]
impl BackendSession for MemorySession {
    async fn run(&mut self, request: RawRequest<'_>) -> DriverResult<RawOutcome> {
        let sql = request.sql.trim().trim_end_matches(';');
        let upper = sql.to_ascii_uppercase();
        let mut params = request.params.iter().cloned();

        if upper == "BLOCK" {
            self.state.entered.notify_one();
            self.state.release.notified().await;
            return Ok(RawOutcome::Update {
                rows_affected: 0,
                generated_keys: None,
            });
        }
        if upper.starts_with("CREATE ") {
            return Ok(RawOutcome::Update {
                rows_affected: 0,
                generated_keys: None,
            });
        }
        if upper.starts_with("INSERT INTO PEOPLE") {
            return self.insert(sql, &mut params);
        }
        if upper.starts_with("SELECT * FROM PEOPLE") {
            return self.select(sql, &mut params);
        }
        if upper.starts_with("UPDATE PEOPLE ") {
            return self.update(sql, &mut params);
        }
        if upper.starts_with("DELETE FROM PEOPLE") {
            return self.delete(sql, &mut params);
        }
        Err(syntax_error(sql))
    }

    fn server_version(&self) -> Option<&str> {
        Some("memory-1.0")
    }

    async fn close(self: Box<Self>) -> DriverResult<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A registry holding only the in-memory driver.
pub fn memory_registry() -> (DriverRegistry, Arc<MemoryState>) {
    let state = Arc::new(MemoryState::default());
    let mut registry = DriverRegistry::new();
    registry.register(Arc::new(MemoryDriver::new(Arc::clone(&state))));
    (registry, state)
}

/// Connect to a fresh in-memory database; `query` is appended to the URL.
pub async fn connect_with(query: &str) -> (Connection, Arc<MemoryState>) {
    let (registry, state) = memory_registry();
    let url = format!("{}{}", MEMORY_URL, query);
    let conn = registry
        .connect(&url, Credentials::new("test_js_sql", "123456"))
        .await
        .expect("in-memory connection");
    (conn, state)
}

pub async fn connect() -> (Connection, Arc<MemoryState>) {
    connect_with("").await
}

/// Insert a person through a plain statement.
pub async fn insert_person(conn: &Connection, name: &str, age: i64) {
    let mut stmt = conn.create_statement().unwrap();
    let sql = format!(
        "INSERT INTO people (name, age) VALUES ('{}', {})",
        name, age
    );
    assert_eq!(stmt.execute_update(&sql).await.unwrap(), 1);
}
