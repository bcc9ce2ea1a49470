mod common;

use common::{create_students, init_tracing, insert_students};
use sqlite_lite::{Connection, StatementState, params};

#[test]
fn query_by_age_returns_matches_in_insertion_order() {
    init_tracing();
    let conn = Connection::open_memory().expect("open");
    create_students(&conn);
    insert_students(&conn);

    let mut stmt = conn
        .prepare("SELECT * FROM student WHERE age = ?", params![18])
        .expect("prepare query");

    let mut rows = Vec::new();
    while stmt.step().expect("step") {
        let (name, age): (String, i32) = stmt.scan().expect("scan");
        rows.push((name, age));
    }

    assert_eq!(rows, vec![("Tom".to_string(), 18), ("Bob".to_string(), 18)]);
    assert_eq!(stmt.state(), StatementState::Done);

    stmt.close().expect("close statement");
    conn.close().expect("close connection");
}

#[test]
fn bind_step_reset_then_exec_loop() {
    init_tracing();
    let conn = Connection::open_memory().expect("open");
    create_students(&conn);

    conn.with_transaction(|conn| -> Result<(), sqlite_lite::Error> {
        let mut insert = conn.prepare("INSERT INTO student VALUES (?, ?)", params![])?;

        insert.bind(params!["Bill", 18])?;
        assert!(!insert.step()?);
        insert.reset()?;

        insert.exec(params!["Tom", 18])?;
        insert.exec(params!["John", 19])?;
        insert.exec(params!["Bob", 18])?;
        insert.close()
    })
    .expect("insert students");

    let mut stmt = conn
        .prepare("SELECT name FROM student WHERE age = ?", params![18])
        .expect("prepare query");
    let mut names = Vec::new();
    while stmt.step().expect("step") {
        names.push(stmt.column::<String>(0).expect("name"));
    }
    assert_eq!(names, ["Bill", "Tom", "Bob"]);
}

#[test]
fn rebinding_after_reset_is_independent_of_prior_results() {
    init_tracing();
    let conn = Connection::open_memory().expect("open");
    create_students(&conn);
    insert_students(&conn);

    let mut stmt = conn
        .prepare("SELECT name FROM student WHERE age = ? ORDER BY rowid", params![18])
        .expect("prepare");

    // Leave the cursor mid-result on purpose
    assert!(stmt.step().expect("step"));
    assert_eq!(stmt.column::<String>(0).expect("name"), "Tom");

    stmt.reset().expect("reset");
    stmt.bind(params![19]).expect("rebind");
    assert!(stmt.step().expect("step"));
    assert_eq!(stmt.column::<String>(0).expect("name"), "John");
    assert!(!stmt.step().expect("step"));

    stmt.reset().expect("reset");
    stmt.bind(params![42]).expect("rebind");
    assert!(!stmt.step().expect("step"));
    assert!(stmt.scan::<(String,)>().is_err());

    stmt.reset().expect("reset");
    stmt.bind(params![18]).expect("rebind");
    let mut names = Vec::new();
    while stmt.step().expect("step") {
        names.push(stmt.column::<String>(0).expect("name"));
    }
    assert_eq!(names, ["Tom", "Bob"]);
}

#[test]
fn scan_before_step_fails() {
    init_tracing();
    let conn = Connection::open_memory().expect("open");
    create_students(&conn);
    insert_students(&conn);

    let stmt = conn
        .prepare("SELECT * FROM student", params![])
        .expect("prepare");
    let err = stmt.scan::<(String, i64)>().unwrap_err();
    assert!(matches!(err, sqlite_lite::Error::Scan(_)));
    assert!(err.to_string().contains("no row"));
}

#[test]
fn rows_can_be_read_by_name() {
    init_tracing();
    let conn = Connection::open_memory().expect("open");
    create_students(&conn);
    insert_students(&conn);

    let mut stmt = conn
        .prepare("SELECT * FROM student ORDER BY age DESC, name", params![])
        .expect("prepare");
    assert!(stmt.step().expect("step"));
    let row = stmt.row().expect("row");
    assert_eq!(row.get_named::<String>("name").expect("name"), "John");
    assert_eq!(row.get_named::<i64>("age").expect("age"), 19);
    let pairs: Vec<_> = row.iter().map(|(col, _)| col.to_string()).collect();
    assert_eq!(pairs, ["name", "age"]);
}
