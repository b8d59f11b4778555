//! Per-operation connection management for the relational store.
//!
//! Each read or write acquires a fresh connection for its own duration
//! and releases it before returning, on every exit path. Connections are
//! never shared, reused, or pooled: isolation is favored over the cost of
//! a fresh handshake per call. Pooling would change the resource model
//! and stays an explicit non-feature.

use chrono::NaiveDate;
use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder};
use switchboard_core::{encode_value, DbError, Params, Row, SqlValue};

use crate::config::DbConfig;

/// Outcome of a single write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    pub affected_rows: u64,
    pub last_insert_id: u64,
}

/// A live handle to the relational store, owned by exactly one operation.
pub trait DbConnection {
    /// Execute a read statement and fetch every row.
    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>, DbError>;

    /// Execute a write statement inside the current transaction.
    fn execute(&mut self, sql: &str, params: &Params) -> Result<ExecResult, DbError>;

    fn begin(&mut self) -> Result<(), DbError>;
    fn commit(&mut self) -> Result<(), DbError>;
    fn rollback(&mut self) -> Result<(), DbError>;

    /// Liveness probe.
    fn ping(&mut self) -> bool;
}

/// Opens and closes connections; the only component that knows how.
pub trait ConnectionSource {
    type Conn: DbConnection;

    /// Open a fresh connection from static configuration.
    fn acquire(&self) -> Result<Self::Conn, DbError>;

    /// Close a connection. Close-time failures never propagate: the
    /// operation's result was already determined when release runs.
    fn release(&self, conn: Self::Conn);
}

/// Production connection source over the MySQL wire protocol.
pub struct MysqlSource {
    config: DbConfig,
}

impl MysqlSource {
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }
}

impl ConnectionSource for MysqlSource {
    type Conn = MysqlConnection;

    fn acquire(&self) -> Result<MysqlConnection, DbError> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(self.config.host.clone()))
            .tcp_port(self.config.port)
            .user(Some(self.config.user.clone()))
            .pass(Some(self.config.password.clone()))
            .db_name(Some(self.config.database.clone()));

        let conn = Conn::new(Opts::from(opts)).map_err(|e| {
            tracing::error!(error = %e, host = %self.config.host, "failed to open connection");
            DbError::ConnectionFailed {
                reason: e.to_string(),
            }
        })?;
        Ok(MysqlConnection { conn })
    }

    fn release(&self, conn: MysqlConnection) {
        // The driver sends COM_QUIT on drop; there is nothing to surface.
        drop(conn);
    }
}

/// One ephemeral MySQL connection.
pub struct MysqlConnection {
    conn: Conn,
}

impl DbConnection for MysqlConnection {
    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>, DbError> {
        let rows: Vec<mysql::Row> = self
            .conn
            .exec(sql, to_driver_params(params))
            .map_err(statement_err)?;
        Ok(rows.into_iter().map(row_from_driver).collect())
    }

    fn execute(&mut self, sql: &str, params: &Params) -> Result<ExecResult, DbError> {
        self.conn
            .exec_drop(sql, to_driver_params(params))
            .map_err(statement_err)?;
        Ok(ExecResult {
            affected_rows: self.conn.affected_rows(),
            last_insert_id: self.conn.last_insert_id(),
        })
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.conn
            .query_drop("START TRANSACTION")
            .map_err(statement_err)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.conn.query_drop("COMMIT").map_err(|e| DbError::CommitFailed {
            reason: e.to_string(),
        })
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.conn
            .query_drop("ROLLBACK")
            .map_err(|e| DbError::RollbackFailed {
                reason: e.to_string(),
            })
    }

    fn ping(&mut self) -> bool {
        self.conn.ping().is_ok()
    }
}

fn statement_err(err: mysql::Error) -> DbError {
    DbError::StatementFailed {
        reason: err.to_string(),
    }
}

fn to_driver_params(params: &Params) -> mysql::Params {
    match params {
        Params::None => mysql::Params::Empty,
        Params::Positional(values) => {
            mysql::Params::Positional(values.iter().map(value_to_driver).collect())
        }
        Params::Named(entries) => mysql::Params::from(
            entries
                .iter()
                .map(|(name, value)| (name.clone(), value_to_driver(value)))
                .collect::<Vec<(String, mysql::Value)>>(),
        ),
    }
}

fn value_to_driver(value: &SqlValue) -> mysql::Value {
    match value {
        SqlValue::Null => mysql::Value::NULL,
        SqlValue::Bool(b) => mysql::Value::Int(*b as i64),
        SqlValue::Int(i) => mysql::Value::Int(*i),
        SqlValue::UInt(u) => mysql::Value::UInt(*u),
        SqlValue::Float(f) => mysql::Value::Double(*f),
        SqlValue::Decimal(text) => mysql::Value::Bytes(text.clone().into_bytes()),
        SqlValue::Str(s) => mysql::Value::Bytes(s.clone().into_bytes()),
        SqlValue::Bytes(b) => mysql::Value::Bytes(b.clone()),
        SqlValue::DateTime(dt) => {
            use chrono::{Datelike, Timelike};
            let date = dt.date();
            let time = dt.time();
            mysql::Value::Date(
                date.year() as u16,
                date.month() as u8,
                date.day() as u8,
                time.hour() as u8,
                time.minute() as u8,
                time.second() as u8,
                time.nanosecond() / 1_000,
            )
        }
        SqlValue::Date(d) => {
            use chrono::Datelike;
            mysql::Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0)
        }
        // Structured values bind as their JSON text.
        SqlValue::List(_) | SqlValue::Map(_) => {
            mysql::Value::Bytes(encode_value(value).to_string().into_bytes())
        }
    }
}

fn value_from_driver(value: mysql::Value) -> SqlValue {
    match value {
        mysql::Value::NULL => SqlValue::Null,
        mysql::Value::Int(i) => SqlValue::Int(i),
        mysql::Value::UInt(u) => SqlValue::UInt(u),
        mysql::Value::Float(f) => SqlValue::Float(f as f64),
        mysql::Value::Double(d) => SqlValue::Float(d),
        mysql::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => SqlValue::Str(text),
            Err(err) => SqlValue::Bytes(err.into_bytes()),
        },
        mysql::Value::Date(year, month, day, hour, minute, second, micros) => {
            match NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32) {
                // A DATE column arrives with a zero time component.
                Some(date) if hour == 0 && minute == 0 && second == 0 && micros == 0 => {
                    SqlValue::Date(date)
                }
                Some(date) => date
                    .and_hms_micro_opt(hour as u32, minute as u32, second as u32, micros)
                    .map(SqlValue::DateTime)
                    .unwrap_or(SqlValue::Null),
                None => SqlValue::Null,
            }
        }
        mysql::Value::Time(negative, days, hours, minutes, seconds, micros) => {
            SqlValue::Str(format_time(negative, days, hours, minutes, seconds, micros))
        }
    }
}

/// Render a TIME interval the way the server prints it.
fn format_time(negative: bool, days: u32, hours: u8, minutes: u8, seconds: u8, micros: u32) -> String {
    let sign = if negative { "-" } else { "" };
    let total_hours = days * 24 + hours as u32;
    if micros == 0 {
        format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}.{micros:06}")
    }
}

fn row_from_driver(row: mysql::Row) -> Row {
    let columns: Vec<String> = row
        .columns_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();
    columns
        .into_iter()
        .zip(row.unwrap())
        .map(|(name, value)| (name, value_from_driver(value)))
        .collect()
}
