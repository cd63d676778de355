use std::io::{BufRead, Write};

use anyhow::Context;
use tracing::debug;

use crate::{
    error::Error,
    statements::{execute, ExecuteResult, Statement},
    table::Table,
};

const PROMPT: &str = "db > ";

/// Prints an error and its chain of causes to stderr.
pub fn report(err: &anyhow::Error) {
    eprintln!("[ERROR] {}", err);
    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        eprintln!();
        eprintln!("Caused by:");
        for (i, e) in causes.enumerate() {
            eprintln!("   {}: {}", i, e);
        }
    }
}

/// Reads commands line by line until `.exit` or end of input, then closes the table.
///
/// Rejected statements are reported on `output` and the loop carries on. Errors that
/// leave the table unusable end the loop and are returned.
pub fn input_loop<R: BufRead, W: Write>(
    mut table: Table,
    mut input: R,
    mut output: W,
) -> anyhow::Result<()> {
    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).context("error when reading input")? == 0 {
            debug!("end of input");
            break;
        }
        let line = line.trim();

        match parse_query(line) {
            Ok(Query::Exit) => break,
            Ok(Query::Constants) => {
                writeln!(output, "Constants:")?;
                write!(output, "{}", Table::constants())?;
            }
            Ok(Query::Btree) => {
                writeln!(output, "Tree:")?;
                write!(output, "{}", table.dump_tree().context("could not dump tree")?)?;
            }
            Ok(Query::Select) => run(&Statement::Select, &mut table, &mut output)?,
            Ok(Query::Insert(id, username, email)) => {
                match Statement::prepare_insert(id, &username, &email) {
                    Ok(statement) => run(&statement, &mut table, &mut output)?,
                    Err(err) => writeln!(output, "{}", validation_message(&err))?,
                }
            }
            Err(err) => writeln!(output, "{}", err.message(line))?,
        }
    }
    output.flush()?;
    table.close().context("could not close table")
}

fn run<W: Write>(statement: &Statement, table: &mut Table, output: &mut W) -> anyhow::Result<()> {
    let mut write_err = None;
    let result = execute(statement, table, |row| {
        if write_err.is_none() {
            write_err = writeln!(output, "{}", row).err();
        }
    });
    if let Some(err) = write_err {
        return Err(err.into());
    }

    let message = match result {
        Ok(ExecuteResult::Success) => "Executed.".to_string(),
        Ok(ExecuteResult::DuplicateKey) => "Error: Duplicate key.".to_string(),
        Ok(ExecuteResult::TableFull) => "Error: Table full.".to_string(),
        Err(err) if err.is_fatal() => {
            return Err(err).context("could not execute statement");
        }
        Err(err) => validation_message(&err),
    };
    writeln!(output, "{message}")?;
    Ok(())
}

fn validation_message(err: &Error) -> String {
    if !err.is_validation() {
        return format!("Error: {err}.");
    }
    match err {
        Error::NegativeId { .. } => "ID must be positive.".to_string(),
        Error::ContainsNul { .. } => "String contains a NUL byte.".to_string(),
        _ => "String is too long.".to_string(),
    }
}

#[derive(Debug, PartialEq)]
enum Query {
    Exit,
    Constants,
    Btree,
    Select,
    Insert(i32, String, String),
}

#[derive(Debug, PartialEq)]
enum ParseError {
    Syntax,
    UnrecognizedKeyword,
    UnrecognizedCommand,
}

impl ParseError {
    fn message(&self, input: &str) -> String {
        match self {
            Self::Syntax => "Syntax error. Could not parse statement.".to_string(),
            Self::UnrecognizedKeyword => format!("Unrecognized keyword at start of '{input}'."),
            Self::UnrecognizedCommand => format!("Unrecognized command '{input}'"),
        }
    }
}

fn parse_query(input: &str) -> Result<Query, ParseError> {
    if input.starts_with('.') {
        return match input {
            ".exit" => Ok(Query::Exit),
            ".constants" => Ok(Query::Constants),
            ".btree" => Ok(Query::Btree),
            _ => Err(ParseError::UnrecognizedCommand),
        };
    }

    let mut parts = input.split_whitespace();
    match parts.next() {
        Some("select") => Ok(Query::Select),
        Some("insert") => {
            let id = parts
                .next()
                .ok_or(ParseError::Syntax)?
                .parse()
                .map_err(|_| ParseError::Syntax)?;
            let username = parts.next().ok_or(ParseError::Syntax)?.to_string();
            let email = parts.next().ok_or(ParseError::Syntax)?.to_string();
            Ok(Query::Insert(id, username, email))
        }
        _ => Err(ParseError::UnrecognizedKeyword),
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use tempdir::TempDir;

    use super::{input_loop, parse_query, ParseError, Query};
    use crate::table::Table;

    fn run_script(table: Table, commands: &[&str]) -> anyhow::Result<String> {
        let input = commands.join("\n");
        let mut output = vec![];
        input_loop(table, Cursor::new(input), &mut output)?;
        Ok(String::from_utf8(output)?)
    }

    #[test]
    fn test_parse_query() {
        assert_eq!(Ok(Query::Select), parse_query("select"));
        assert_eq!(
            Ok(Query::Insert(1, "username".to_string(), "email".to_string())),
            parse_query("insert 1 username email")
        );
        assert_eq!(
            Ok(Query::Insert(-1, "cstack".to_string(), "foo@bar.com".to_string())),
            parse_query("insert -1 cstack foo@bar.com")
        );
        assert_eq!(Ok(Query::Exit), parse_query(".exit"));
        assert_eq!(Ok(Query::Btree), parse_query(".btree"));
        assert_eq!(Ok(Query::Constants), parse_query(".constants"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Err(ParseError::Syntax), parse_query("insert 1 username"));
        assert_eq!(Err(ParseError::Syntax), parse_query("insert one a b"));
        assert_eq!(
            Err(ParseError::UnrecognizedKeyword),
            parse_query("update 1 a b")
        );
        assert_eq!(Err(ParseError::UnrecognizedCommand), parse_query(".tables"));
        assert_eq!(
            "Unrecognized keyword at start of 'foo'.",
            ParseError::UnrecognizedKeyword.message("foo")
        );
    }

    #[test]
    fn test_input_loop() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new("rowdb")?;
        let table = Table::open(tmp_dir.path().join("my.db"))?;

        let output = run_script(
            table,
            &[
                "insert 1 user1 person1@example.com",
                "insert 1 user1 person1@example.com",
                "insert 0 user0 person0@example.com",
                "select",
                "bogus",
                ".exit",
            ],
        )?;
        assert_eq!(
            output,
            "db > Executed.\n\
             db > Error: Duplicate key.\n\
             db > ID must be positive.\n\
             db > (1, user1, person1@example.com)\n\
             Executed.\n\
             db > Unrecognized keyword at start of 'bogus'.\n\
             db > "
        );
        Ok(())
    }

    #[test]
    fn test_input_loop_persists_on_eof() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new("rowdb")?;
        let file_path = tmp_dir.path().join("my.db");

        run_script(Table::open(&file_path)?, &["insert 2 user2 person2@example.com"])?;
        let output = run_script(Table::open(&file_path)?, &["select", ".exit"])?;
        assert_eq!(output, "db > (2, user2, person2@example.com)\nExecuted.\ndb > ");
        Ok(())
    }

    #[test]
    fn test_input_loop_rejects_nul_bytes() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new("rowdb")?;
        let table = Table::open(tmp_dir.path().join("my.db"))?;

        let output = run_script(table, &["insert 1 ab\0cd e@x", "select", ".exit"])?;
        assert_eq!(
            output,
            "db > String contains a NUL byte.\n\
             db > Executed.\n\
             db > "
        );
        Ok(())
    }

    #[test]
    fn test_meta_commands() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new("rowdb")?;
        let table = Table::open(tmp_dir.path().join("my.db"))?;

        let output = run_script(
            table,
            &[
                "insert 3 user3 person3@example.com",
                "insert 1 user1 person1@example.com",
                "insert 2 user2 person2@example.com",
                ".btree",
                ".constants",
                ".nope",
                ".exit",
            ],
        )?;
        assert_eq!(
            output,
            "db > Executed.\n\
             db > Executed.\n\
             db > Executed.\n\
             db > Tree:\n\
             leaf (size 3)\n\
             \t- 0 : 1\n\
             \t- 1 : 2\n\
             \t- 2 : 3\n\
             db > Constants:\n\
             ROW_SIZE: 293\n\
             COMMON_NODE_HEADER_SIZE: 6\n\
             LEAF_NODE_HEADER_SIZE: 10\n\
             LEAF_NODE_CELL_SIZE: 297\n\
             LEAF_NODE_SPACE_FOR_CELLS: 4086\n\
             LEAF_NODE_MAX_CELLS: 13\n\
             db > Unrecognized command '.nope'\n\
             db > "
        );
        Ok(())
    }
}
