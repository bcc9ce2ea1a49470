//! Create a table, insert students inside a transaction, and query them back.
//!
//! ```text
//! cargo run -p sqlite-lite --example basic [path/to/db]
//! RUST_LOG=sqlite_lite=debug cargo run -p sqlite-lite --example basic
//! ```
//!
//! Without a path the database lives in a temporary directory.

use sqlite_lite::{Connection, Error, params};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let scratch = tempfile::tempdir()?;
    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => scratch
            .path()
            .join("mydatabase.db")
            .to_string_lossy()
            .into_owned(),
    };

    let conn = Connection::open_file(&path)?;
    println!("opened {} (SQLite {})", conn.path(), sqlite_lite::sqlite_version());

    conn.exec("CREATE TABLE IF NOT EXISTS student(name STRING, age INTEGER)")?;
    conn.with_transaction(insert_students)?;
    query_students(&conn)?;

    conn.close()?;
    Ok(())
}

fn insert_students(conn: &Connection) -> Result<(), Error> {
    let mut stmt = conn.prepare("INSERT INTO student VALUES (?, ?)", params![])?;

    // One row the long way: bind, step, reset
    stmt.bind(params!["Bill", 18])?;
    stmt.step()?;
    stmt.reset()?;

    // exec binds, steps to completion and always resets
    stmt.exec(params!["Tom", 18])?;
    stmt.exec(params!["John", 19])?;
    stmt.exec(params!["Bob", 18])?;

    stmt.close()
}

fn query_students(conn: &Connection) -> Result<(), Error> {
    // Arguments given to prepare are bound immediately
    let mut stmt = conn.prepare("SELECT * FROM student WHERE age = ?", params![18])?;

    while stmt.step()? {
        let (name, age): (String, i32) = stmt.scan()?;
        println!("name: {name} age: {age}");
    }

    stmt.close()
}
