use crate::{
    error::{Error, Result},
    row::Row,
    table::Table,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert(Row),
    Select,
}

impl Statement {
    /// Checks insert arguments against the schema before they get anywhere near the table.
    pub fn prepare_insert(id: i32, username: &str, email: &str) -> Result<Self> {
        let row = Row {
            id,
            username: username.to_string(),
            email: email.to_string(),
        };
        row.validate()?;
        Ok(Self::Insert(row))
    }
}

/// Outcome of a statement that reached the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteResult {
    Success,
    DuplicateKey,
    TableFull,
}

/// Runs `statement` against `table`. Selected rows are handed to `emit` as they are read.
///
/// Duplicate keys and a full table are ordinary outcomes. Any other error means the
/// table itself is in trouble and is returned as is.
pub fn execute<F>(statement: &Statement, table: &mut Table, emit: F) -> Result<ExecuteResult>
where
    F: FnMut(&Row),
{
    match statement {
        Statement::Insert(row) => execute_insert(row, table),
        Statement::Select => execute_select(table, emit),
    }
}

fn execute_insert(row: &Row, table: &mut Table) -> Result<ExecuteResult> {
    match table.insert(row) {
        Ok(()) => Ok(ExecuteResult::Success),
        Err(Error::DuplicateKey { .. }) => Ok(ExecuteResult::DuplicateKey),
        Err(Error::TableFull { .. }) => Ok(ExecuteResult::TableFull),
        Err(err) => Err(err),
    }
}

fn execute_select<F>(table: &mut Table, mut emit: F) -> Result<ExecuteResult>
where
    F: FnMut(&Row),
{
    for row in table.scan() {
        emit(&row?);
    }
    Ok(ExecuteResult::Success)
}
