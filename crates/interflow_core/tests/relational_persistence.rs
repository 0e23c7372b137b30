mod support;

use interflow_core::db::{open_db, open_db_in_memory};
use interflow_core::{
    RelationalConfig, RelationalPersistence, RepoError, Repository, Scope, Transactional,
};
use rusqlite::Connection;
use serde_json::json;
use std::rc::Rc;
use support::{attrs, person, Person};

type People = Repository<Person, RelationalPersistence<Person>>;

const SCHEMA: &str = "
CREATE TABLE people (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    age INTEGER NOT NULL,
    company_id TEXT,
    deleted_at INTEGER
);";

fn connection() -> Rc<Connection> {
    let conn = open_db_in_memory().expect("in-memory database should open");
    conn.execute_batch(SCHEMA).expect("schema should apply");
    Rc::new(conn)
}

fn people(conn: &Rc<Connection>) -> People {
    Repository::new(
        RelationalPersistence::new(Rc::clone(conn), RelationalConfig::new("people"))
            .expect("config should be valid"),
    )
}

#[test]
fn create_find_and_count_through_sqlite() {
    let conn = connection();
    let repo = people(&conn);

    let ada = repo.create_entity(person("Ada", 36)).expect("create");
    let id = ada.id.clone().expect("sqlite assigns the rowid");
    assert_eq!(id, json!(1));

    let found = repo.find(&id).expect("find").expect("row exists");
    assert_eq!(found, ada);
    assert_eq!(repo.count().expect("count"), 1);
    assert!(repo.find(&json!(99)).expect("find").is_none());
}

#[test]
fn unique_violation_becomes_persistence_error() {
    let conn = connection();
    let repo = people(&conn);
    repo.create_entity(person("Ada", 36)).expect("first create");

    match repo.create_entity(person("Ada", 12)) {
        Err(RepoError::Persistence(err)) => {
            assert_eq!(err.errors.get("name"), Some(&vec!["has already been taken".to_string()]));
            assert_eq!(err.record.get("age"), Some(&json!(12)));
            assert!(err.entity.is_some());
        }
        other => panic!("expected persistence error, got {other:?}"),
    }
    assert_eq!(repo.count().expect("count"), 1);
}

#[test]
fn not_null_violation_is_keyed_by_column() {
    let conn = connection();
    let repo = people(&conn);

    let err = repo
        .create(attrs(json!({"age": 3})))
        .expect_err("name is required by the schema");
    let RepoError::Persistence(err) = err else {
        panic!("expected persistence error, got {err:?}");
    };
    assert_eq!(err.errors.get("name"), Some(&vec!["can't be blank".to_string()]));
    assert!(err.entity.is_none());

    let detail = RepoError::Persistence(err).to_attributes();
    assert_eq!(detail["errors"], json!({"name": ["can't be blank"]}));
}

#[test]
fn missing_table_is_a_storage_error() {
    let conn = Rc::new(open_db_in_memory().expect("open"));
    let repo = people(&conn);
    assert!(matches!(
        repo.create_entity(person("Ada", 36)),
        Err(RepoError::Storage(_))
    ));
}

#[test]
fn update_and_delete_report_missing_records() {
    let conn = connection();
    let repo = people(&conn);
    let ada = repo.create_entity(person("Ada", 36)).expect("create");
    let id = ada.id.clone().expect("id");

    let older = repo.update(&id, attrs(json!({"age": 37}))).expect("update");
    assert_eq!(older.age, 37);
    assert_eq!(older.name, "Ada");

    match repo.update(&json!(42), attrs(json!({"age": 1}))) {
        Err(RepoError::Query(err)) => {
            assert_eq!(err.message, "Couldn't find record with 'id'=42")
        }
        other => panic!("expected query error, got {other:?}"),
    }
    assert!(matches!(repo.delete(&json!(42)), Err(RepoError::Query(_))));
    assert!(repo.delete(&id).expect("delete"));
    assert_eq!(repo.count().expect("count"), 0);
}

#[test]
fn soft_delete_hides_rows_without_removing_them() {
    let conn = connection();
    let repo: People = Repository::new(
        RelationalPersistence::new(
            Rc::clone(&conn),
            RelationalConfig::new("people").soft_delete_column("deleted_at"),
        )
        .expect("config"),
    );
    let ada = repo.create_entity(person("Ada", 36)).expect("create");
    repo.create_entity(person("Grace", 45)).expect("create");

    assert!(repo.soft_delete(ada.id.as_ref().expect("id")).expect("soft delete"));
    assert_eq!(repo.count().expect("count"), 1);
    assert!(repo.find(ada.id.as_ref().expect("id")).expect("find").is_none());

    let stored: i64 = conn
        .query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))
        .expect("raw count");
    assert_eq!(stored, 2);

    repo.soft_delete_all().expect("soft delete all");
    assert_eq!(repo.count().expect("count"), 0);
}

#[test]
fn scope_is_stamped_and_filters_reads() {
    let conn = connection();
    let scoped = |company: &str| -> People {
        Repository::new(
            RelationalPersistence::new(Rc::clone(&conn), RelationalConfig::new("people"))
                .and_then(|p| p.scoped(Scope::new("company_id", company)))
                .expect("config"),
        )
    };
    let acme = scoped("acme");
    let globex = scoped("globex");

    acme.create_entity(person("Ada", 36)).expect("create");
    globex.create_entity(person("Linus", 54)).expect("create");

    assert_eq!(acme.count().expect("count"), 1);
    assert_eq!(
        acme.all().expect("all").into_iter().map(|p| p.name).collect::<Vec<_>>(),
        vec!["Ada"]
    );
    assert!(acme
        .find_by(&attrs(json!({"name": "Linus"})))
        .expect("find_by")
        .is_none());

    acme.delete_all().expect("delete_all");
    assert_eq!(globex.count().expect("count"), 1);
}

#[test]
fn rollback_discards_writes_since_begin() {
    let conn = connection();
    let repo = people(&conn);
    repo.create_entity(person("Kept", 1)).expect("create");

    let backend = repo.persistence();
    backend.begin().expect("begin");
    repo.create_entity(person("Discarded", 2)).expect("create");
    assert_eq!(repo.count().expect("count"), 2);
    backend.rollback().expect("rollback");

    assert_eq!(repo.count().expect("count"), 1);
    assert!(repo
        .find_by(&attrs(json!({"name": "Discarded"})))
        .expect("find_by")
        .is_none());
}

#[test]
fn file_backed_database_persists_committed_rows() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("interflow.sqlite3");
    {
        let conn = Rc::new(open_db(&path).expect("open"));
        conn.execute_batch(SCHEMA).expect("schema");
        let repo = people(&conn);
        repo.persistence().begin().expect("begin");
        repo.create_entity(person("Ada", 36)).expect("create");
        repo.persistence().commit().expect("commit");
    }

    let conn = Rc::new(open_db(&path).expect("reopen"));
    assert_eq!(people(&conn).count().expect("count"), 1);
}

#[test]
fn invalid_table_names_are_rejected() {
    let conn = connection();
    let result = RelationalPersistence::<Person>::new(conn, RelationalConfig::new("people; --"));
    assert!(matches!(result, Err(RepoError::Storage(_))));
}
