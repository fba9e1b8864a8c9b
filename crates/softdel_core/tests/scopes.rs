mod common;

use common::{create_bar, create_baz, create_foo, create_label, open, repo, Bar, Baz, Foo, Label};
use rusqlite::Connection;
use softdel_core::{
    open_db_in_memory, EntityDef, Migration, RepoError, Scope, SoftDeleteRepository,
    SqliteSoftDeleteRepository,
};

#[test]
fn scopes_compose_with_caller_filters() {
    let conn = open();
    let repo = repo(&conn);

    create_label(&conn, "urgent");
    let mut stale = create_label(&conn, "urgent");
    create_label(&conn, "later");
    repo.delete(&mut stale).unwrap();

    let urgent = || repo.objects::<Label>().filter_eq("name", "urgent".to_string());
    assert_eq!(urgent().count().unwrap(), 1);
    assert_eq!(urgent().deleted().count().unwrap(), 1);
    assert_eq!(urgent().with_deleted().count().unwrap(), 2);
    assert_eq!(urgent().scope(Scope::Deleted).live().count().unwrap(), 1);

    let not_urgent = repo
        .with_deleted::<Label>()
        .exclude_eq("name", "urgent".to_string())
        .fetch()
        .unwrap();
    assert_eq!(not_urgent.len(), 1);
    assert_eq!(not_urgent[0].name, "later");
}

#[test]
fn entry_points_start_in_expected_scope() {
    let conn = open();
    let repo = repo(&conn);

    assert_eq!(repo.objects::<Foo>().current_scope(), Scope::Live);
    assert_eq!(repo.deleted::<Foo>().current_scope(), Scope::Deleted);
    assert_eq!(repo.with_deleted::<Foo>().current_scope(), Scope::All);
}

#[test]
fn pagination_applies_after_scope() {
    let conn = open();
    let repo = repo(&conn);

    for _ in 0..5 {
        create_baz(&conn);
    }
    let mut gone = repo.objects::<Baz>().first().unwrap().unwrap();
    repo.delete(&mut gone).unwrap();

    let all_ids = repo.objects::<Baz>().ids().unwrap();
    assert_eq!(all_ids.len(), 4);
    assert!(!all_ids.contains(&gone.id));

    let page = repo.objects::<Baz>().limit(2).offset(1).ids().unwrap();
    assert_eq!(page, all_ids[1..3].to_vec());
    assert_eq!(repo.objects::<Baz>().offset(3).count().unwrap(), 1);
    assert!(repo.objects::<Baz>().limit(0).fetch().unwrap().is_empty());
}

#[test]
fn filter_ref_and_exists_follow_scope() {
    let conn = open();
    let repo = repo(&conn);

    let foo = create_foo(&conn, None);
    let mut bar = create_bar(&conn, Some(&foo));
    let by_foo = || repo.objects::<Bar>().filter_ref("foo_id", foo.id);
    assert!(by_foo().exists().unwrap());

    repo.delete(&mut bar).unwrap();
    assert!(!by_foo().exists().unwrap());
    assert!(by_foo().with_deleted().exists().unwrap());
    assert!(repo.objects::<Bar>().filter_null("foo_id").fetch().unwrap().is_empty());
}

#[test]
fn filters_on_undeclared_columns_are_rejected_and_cannot_widen_scope() {
    let conn = open();
    let repo = repo(&conn);

    let mut hidden = create_label(&conn, "hidden");
    repo.delete(&mut hidden).unwrap();

    let widened = repo
        .objects::<Label>()
        .filter_eq("deleted_at IS NOT NULL OR name", "x".to_string())
        .count()
        .unwrap_err();
    assert!(matches!(widened, RepoError::InvalidData(_)));

    let unknown = repo.objects::<Label>().filter_eq("nope", 1).fetch().unwrap_err();
    assert!(matches!(unknown, RepoError::InvalidData(ref message) if message.contains("nope")));

    let bulk = repo.with_deleted::<Label>().filter_null("nope").delete().unwrap_err();
    assert!(matches!(bulk, RepoError::InvalidData(_)));
    assert_eq!(repo.objects::<Label>().count().unwrap(), 0);
    assert_eq!(repo.deleted::<Label>().count().unwrap(), 1);
}

#[test]
fn related_rejects_unknown_relation_and_wrong_target() {
    let conn = open();
    let repo = repo(&conn);
    let bar = create_bar(&conn, None);

    let unknown = repo.related::<Bar, Baz>(bar.id, "nope").err().unwrap();
    assert!(matches!(
        unknown,
        RepoError::UnknownRelation { table: "bar", ref relation } if relation == "nope"
    ));

    let mismatch = repo.related::<Bar, Foo>(bar.id, "bazes").err().unwrap();
    assert!(matches!(
        mismatch,
        RepoError::RelationTargetMismatch {
            relation: "bazes",
            expected: "baz",
            actual: "foo"
        }
    ));

    let link_err = repo.link::<Foo>(bar.id, "baz", bar.id).unwrap_err();
    assert!(matches!(link_err, RepoError::NotFound { table: "foo", .. }));
}

#[test]
fn repository_rejects_connection_without_declared_tables() {
    let conn = open_db_in_memory(&[]).unwrap();

    let result = SqliteSoftDeleteRepository::try_new(&conn, &[&common::FOO]);
    assert!(matches!(result, Err(RepoError::MissingRequiredTable("foo"))));
}

#[test]
fn repository_rejects_missing_relation_columns() {
    const PARTIAL: &[Migration] = &[Migration {
        version: 1,
        sql: "
CREATE TABLE baz (id TEXT PRIMARY KEY NOT NULL, deleted_at INTEGER NULL, updated_at INTEGER NOT NULL DEFAULT 0);
CREATE TABLE foo (id TEXT PRIMARY KEY NOT NULL, deleted_at INTEGER NULL, updated_at INTEGER NOT NULL DEFAULT 0);
",
    }];
    let conn: Connection = open_db_in_memory(PARTIAL).unwrap();

    let result = SqliteSoftDeleteRepository::try_new(&conn, &[&common::BAZ]);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredColumn {
            table: "foo",
            column: "baz_id"
        })
    ));
}

#[test]
fn repository_rejects_entity_not_selecting_deletion_column() {
    static BROKEN: EntityDef = EntityDef {
        table: "baz",
        primary_key: "id",
        deleted_column: "deleted_at",
        updated_column: None,
        columns: &["id"],
        relations: &[],
    };
    let conn = open();

    let result = SqliteSoftDeleteRepository::try_new(&conn, &[&BROKEN]);
    assert!(matches!(result, Err(RepoError::InvalidData(_))));
}
