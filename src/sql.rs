use chrono::{NaiveDate, NaiveTime};
use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertStaff {
        id: Ulid,
        name: String,
        active: bool,
    },
    InsertService {
        id: Ulid,
        duration_minutes: u32,
        min_advance_hours: u32,
        max_advance_days: u32,
        buffer_time_before: u32,
        buffer_time_after: u32,
    },
    InsertAssignment {
        staff_id: Ulid,
        service_id: Ulid,
        active: bool,
        custom_duration_minutes: Option<u32>,
    },
    InsertSchedule {
        id: Ulid,
        staff_id: Ulid,
        day_of_week: u8,
        start_time: NaiveTime,
        end_time: NaiveTime,
        is_active: bool,
    },
    DeleteSchedule {
        id: Ulid,
    },
    InsertHold {
        session_id: String,
        staff_id: Ulid,
        service_id: Ulid,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: u32,
        client_id: Option<Ulid>,
    },
    DeleteHold {
        id: Ulid,
    },
    InsertBooking {
        hold_id: Ulid,
        first_name: String,
        last_name: String,
        email: String,
        phone: String,
        notes: Option<String>,
    },
    SelectSlots {
        service_id: Ulid,
        date: NaiveDate,
        staff_id: Option<Ulid>,
    },
    SelectCalendar {
        start: NaiveDate,
        end: NaiveDate,
        staff_id: Option<Ulid>,
    },
}

/// Service defaults when the optional columns are omitted.
const DEFAULT_MAX_ADVANCE_DAYS: u32 = 30;

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;
    let opt = |i: usize| values.get(i);

    match table.as_str() {
        "staff" => {
            require("staff", &values, 2)?;
            Ok(Command::InsertStaff {
                id: parse_ulid(&values[0])?,
                name: parse_string(&values[1])?,
                active: opt(2).map(parse_bool).transpose()?.unwrap_or(true),
            })
        }
        "services" => {
            require("services", &values, 2)?;
            Ok(Command::InsertService {
                id: parse_ulid(&values[0])?,
                duration_minutes: parse_u32(&values[1])?,
                min_advance_hours: opt(2).map(parse_u32).transpose()?.unwrap_or(0),
                max_advance_days: opt(3)
                    .map(parse_u32)
                    .transpose()?
                    .unwrap_or(DEFAULT_MAX_ADVANCE_DAYS),
                buffer_time_before: opt(4).map(parse_u32).transpose()?.unwrap_or(0),
                buffer_time_after: opt(5).map(parse_u32).transpose()?.unwrap_or(0),
            })
        }
        "staff_services" => {
            require("staff_services", &values, 2)?;
            Ok(Command::InsertAssignment {
                staff_id: parse_ulid(&values[0])?,
                service_id: parse_ulid(&values[1])?,
                active: opt(2).map(parse_bool).transpose()?.unwrap_or(true),
                custom_duration_minutes: opt(3).map(parse_u32_or_null).transpose()?.flatten(),
            })
        }
        "staff_schedules" => {
            require("staff_schedules", &values, 5)?;
            let day = parse_u32(&values[2])?;
            Ok(Command::InsertSchedule {
                id: parse_ulid(&values[0])?,
                staff_id: parse_ulid(&values[1])?,
                day_of_week: u8::try_from(day)
                    .map_err(|_| SqlError::Parse(format!("{day} out of day_of_week range")))?,
                start_time: parse_time(&values[3])?,
                end_time: parse_time(&values[4])?,
                is_active: opt(5).map(parse_bool).transpose()?.unwrap_or(true),
            })
        }
        "booking_holds" => {
            require("booking_holds", &values, 6)?;
            Ok(Command::InsertHold {
                session_id: parse_string(&values[0])?,
                staff_id: parse_ulid(&values[1])?,
                service_id: parse_ulid(&values[2])?,
                date: parse_date(&values[3])?,
                time: parse_time(&values[4])?,
                duration_minutes: parse_u32(&values[5])?,
                client_id: opt(6).map(parse_ulid_or_null).transpose()?.flatten(),
            })
        }
        "bookings" => {
            require("bookings", &values, 5)?;
            Ok(Command::InsertBooking {
                hold_id: parse_ulid(&values[0])?,
                first_name: parse_string(&values[1])?,
                last_name: parse_string(&values[2])?,
                email: parse_string(&values[3])?,
                phone: parse_string(&values[4])?,
                notes: opt(5).map(parse_string_or_null).transpose()?.flatten(),
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn require(table: &'static str, values: &[Expr], n: usize) -> Result<(), SqlError> {
    if values.len() < n {
        return Err(SqlError::WrongArity(table, n, values.len()));
    }
    Ok(())
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "staff_schedules" => Ok(Command::DeleteSchedule { id }),
        "booking_holds" => Ok(Command::DeleteHold { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

#[derive(Default)]
struct Filters {
    service_id: Option<Ulid>,
    staff_id: Option<Ulid>,
    date_eq: Option<NaiveDate>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Filters::default();
    if let Some(selection) = &select.selection {
        extract_filters(selection, &mut filters)?;
    }

    match table.as_str() {
        "slots" => Ok(Command::SelectSlots {
            service_id: filters.service_id.ok_or(SqlError::MissingFilter("service_id"))?,
            date: filters.date_eq.ok_or(SqlError::MissingFilter("date"))?,
            staff_id: filters.staff_id,
        }),
        "calendar" => Ok(Command::SelectCalendar {
            start: filters
                .date_from
                .or(filters.date_eq)
                .ok_or(SqlError::MissingFilter("date >="))?,
            end: filters
                .date_to
                .or(filters.date_eq)
                .ok_or(SqlError::MissingFilter("date <="))?,
            staff_id: filters.staff_id,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn extract_filters(expr: &Expr, filters: &mut Filters) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => extract_filters(inner, filters)?,
        Expr::BinaryOp { left, op, right } => {
            let col = expr_column_name(left);
            match (op, col.as_deref()) {
                (ast::BinaryOperator::And, _) => {
                    extract_filters(left, filters)?;
                    extract_filters(right, filters)?;
                }
                (ast::BinaryOperator::Eq, Some("service_id")) => {
                    filters.service_id = Some(parse_ulid(right)?);
                }
                (ast::BinaryOperator::Eq, Some("staff_id")) => {
                    filters.staff_id = Some(parse_ulid(right)?);
                }
                (ast::BinaryOperator::Eq, Some("date")) => {
                    filters.date_eq = Some(parse_date(right)?);
                }
                (ast::BinaryOperator::GtEq, Some("date")) => {
                    filters.date_from = Some(parse_date(right)?);
                }
                (ast::BinaryOperator::LtEq, Some("date")) => {
                    filters.date_to = Some(parse_date(right)?);
                }
                _ => return Err(SqlError::Unsupported(format!("filter {expr}"))),
            }
        }
        _ => return Err(SqlError::Unsupported(format!("filter {expr}"))),
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.clone()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            if expr_column_name(left).as_deref() == Some("id") {
                parse_ulid(right)
            } else {
                Err(SqlError::MissingFilter("id"))
            }
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    if is_null(expr) {
        return Ok(None);
    }
    parse_string(expr).map(Some)
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) | Value::Number(s, _) => {
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
            }
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_ulid_or_null(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    if is_null(expr) {
        return Ok(None);
    }
    parse_ulid(expr).map(Some)
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_u32_or_null(expr: &Expr) -> Result<Option<u32>, SqlError> {
    if is_null(expr) {
        return Ok(None);
    }
    parse_u32(expr).map(Some)
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::SingleQuotedString(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
            },
            Value::Number(n, _) => Ok(n != "0"),
            _ => Err(SqlError::Parse(format!("expected bool, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

/// `YYYY-MM-DD`.
fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date {s}: {e}")))
}

/// `HH:MM`, with optional `:SS`.
fn parse_time(expr: &Expr) -> Result<NaiveTime, SqlError> {
    let s = parse_string(expr)?;
    NaiveTime::parse_from_str(&s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
        .map_err(|e| SqlError::Parse(format!("bad time {s}: {e}")))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected at least {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
