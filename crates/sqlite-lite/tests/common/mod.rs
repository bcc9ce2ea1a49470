#![allow(dead_code)]

use sqlite_lite::{Connection, params};

/// Route library logs to the test harness; `RUST_LOG=sqlite_lite=trace` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn create_students(conn: &Connection) {
    conn.exec("CREATE TABLE student(name STRING, age INTEGER)")
        .expect("create student table");
}

/// Insert Tom (18), John (19) and Bob (18) in that order.
pub fn insert_students(conn: &Connection) {
    let mut stmt = conn
        .prepare("INSERT INTO student VALUES (?, ?)", params![])
        .expect("prepare insert");
    stmt.exec(params!["Tom", 18]).expect("insert Tom");
    stmt.exec(params!["John", 19]).expect("insert John");
    stmt.exec(params!["Bob", 18]).expect("insert Bob");
}

pub fn count_students(conn: &Connection) -> i64 {
    let mut stmt = conn
        .prepare("SELECT count(*) FROM student", params![])
        .expect("prepare count");
    assert!(stmt.step().expect("step count"));
    stmt.column(0).expect("read count")
}
