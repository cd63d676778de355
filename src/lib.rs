//! Single-table embedded record store.
//!
//! Rows of `(id, username, email)` are kept sorted by id in fixed-size leaf pages of one
//! database file. [`Table`] is the entry point; [`cli::input_loop`] drives it from a
//! line-oriented REPL.

pub mod cli;
pub mod constants;
pub mod cursor;
pub mod error;
pub mod node;
pub mod pager;
pub mod row;
pub mod statements;
pub mod table;

pub use error::{Error, Result};
pub use row::Row;
pub use statements::{execute, ExecuteResult, Statement};
pub use table::{Table, TableBuilder};
