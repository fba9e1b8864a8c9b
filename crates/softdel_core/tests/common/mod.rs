//! Shared fixture: Foo/Bar/Baz/Label entities with every relation shape.
//!
//! - `Foo.baz` one-to-one -> `Baz` (reverse accessor `Baz.foo`)
//! - `Bar.foo` foreign key -> `Foo` (reverse accessor `Foo.bars`)
//! - `Bar.bazes` many-to-many -> `Baz`, memberships retained on delete
//! - `Bar.labels` many-to-many -> `Label`, memberships cleared on delete
#![allow(dead_code)]

use rusqlite::{params, Connection, Row};
use softdel_core::{
    open_db_in_memory, optional_record_id_from_row, record_id_from_row, EntityDef,
    MembershipPolicy, Migration, RecordId, Relation, SoftDeleteModel,
    SqliteSoftDeleteRepository,
};

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "
CREATE TABLE baz (
    id TEXT PRIMARY KEY NOT NULL,
    deleted_at INTEGER NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
);
CREATE TABLE foo (
    id TEXT PRIMARY KEY NOT NULL,
    baz_id TEXT NULL UNIQUE REFERENCES baz (id),
    deleted_at INTEGER NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
);
CREATE TABLE bar (
    id TEXT PRIMARY KEY NOT NULL,
    foo_id TEXT NULL REFERENCES foo (id),
    deleted_at INTEGER NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
);
CREATE TABLE label (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    deleted_at INTEGER NULL
);
CREATE TABLE bar_bazes (
    bar_id TEXT NOT NULL REFERENCES bar (id),
    baz_id TEXT NOT NULL REFERENCES baz (id),
    PRIMARY KEY (bar_id, baz_id)
);
CREATE TABLE bar_labels (
    bar_id TEXT NOT NULL REFERENCES bar (id),
    label_id TEXT NOT NULL REFERENCES label (id),
    PRIMARY KEY (bar_id, label_id)
);
",
}];

static BAZ_RELATIONS: [Relation; 2] = [
    Relation::ReverseOneToOne {
        accessor: "foo",
        related: &FOO,
        column: "baz_id",
    },
    Relation::ReverseManyToMany {
        accessor: "bars",
        through: "bar_bazes",
        source_column: "baz_id",
        target_column: "bar_id",
        related: &BAR,
        on_delete: MembershipPolicy::Retain,
    },
];

pub static BAZ: EntityDef = EntityDef {
    table: "baz",
    primary_key: "id",
    deleted_column: "deleted_at",
    updated_column: Some("updated_at"),
    columns: &["id", "deleted_at", "updated_at"],
    relations: &BAZ_RELATIONS,
};

static FOO_RELATIONS: [Relation; 2] = [
    Relation::OneToOne {
        field: "baz",
        column: "baz_id",
        target: &BAZ,
    },
    Relation::ReverseForeignKey {
        accessor: "bars",
        related: &BAR,
        column: "foo_id",
    },
];

pub static FOO: EntityDef = EntityDef {
    table: "foo",
    primary_key: "id",
    deleted_column: "deleted_at",
    updated_column: Some("updated_at"),
    columns: &["id", "baz_id", "deleted_at", "updated_at"],
    relations: &FOO_RELATIONS,
};

static BAR_RELATIONS: [Relation; 3] = [
    Relation::ForeignKey {
        field: "foo",
        column: "foo_id",
        target: &FOO,
    },
    Relation::ManyToMany {
        field: "bazes",
        through: "bar_bazes",
        source_column: "bar_id",
        target_column: "baz_id",
        target: &BAZ,
        on_delete: MembershipPolicy::Retain,
    },
    Relation::ManyToMany {
        field: "labels",
        through: "bar_labels",
        source_column: "bar_id",
        target_column: "label_id",
        target: &LABEL,
        on_delete: MembershipPolicy::Clear,
    },
];

pub static BAR: EntityDef = EntityDef {
    table: "bar",
    primary_key: "id",
    deleted_column: "deleted_at",
    updated_column: Some("updated_at"),
    columns: &["id", "foo_id", "deleted_at", "updated_at"],
    relations: &BAR_RELATIONS,
};

static LABEL_RELATIONS: [Relation; 1] = [Relation::ReverseManyToMany {
    accessor: "bars",
    through: "bar_labels",
    source_column: "label_id",
    target_column: "bar_id",
    related: &BAR,
    on_delete: MembershipPolicy::Clear,
}];

pub static LABEL: EntityDef = EntityDef {
    table: "label",
    primary_key: "id",
    deleted_column: "deleted_at",
    updated_column: None,
    columns: &["id", "name", "deleted_at"],
    relations: &LABEL_RELATIONS,
};

pub static ENTITIES: [&EntityDef; 4] = [&FOO, &BAR, &BAZ, &LABEL];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baz {
    pub id: RecordId,
    pub deleted_at: Option<i64>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Foo {
    pub id: RecordId,
    pub baz_id: Option<RecordId>,
    pub deleted_at: Option<i64>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bar {
    pub id: RecordId,
    pub foo_id: Option<RecordId>,
    pub deleted_at: Option<i64>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub id: RecordId,
    pub name: String,
    pub deleted_at: Option<i64>,
}

impl SoftDeleteModel for Baz {
    fn entity() -> &'static EntityDef {
        &BAZ
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: record_id_from_row(row, "id")?,
            deleted_at: row.get("deleted_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn deleted_at(&self) -> Option<i64> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, deleted_at: Option<i64>) {
        self.deleted_at = deleted_at;
    }

    fn set_updated_at(&mut self, updated_at: i64) {
        self.updated_at = updated_at;
    }
}

impl SoftDeleteModel for Foo {
    fn entity() -> &'static EntityDef {
        &FOO
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: record_id_from_row(row, "id")?,
            baz_id: optional_record_id_from_row(row, "baz_id")?,
            deleted_at: row.get("deleted_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn deleted_at(&self) -> Option<i64> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, deleted_at: Option<i64>) {
        self.deleted_at = deleted_at;
    }

    fn set_updated_at(&mut self, updated_at: i64) {
        self.updated_at = updated_at;
    }

    fn clear_one_to_one(&mut self, field: &str) {
        if field == "baz" {
            self.baz_id = None;
        }
    }
}

impl SoftDeleteModel for Bar {
    fn entity() -> &'static EntityDef {
        &BAR
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: record_id_from_row(row, "id")?,
            foo_id: optional_record_id_from_row(row, "foo_id")?,
            deleted_at: row.get("deleted_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn deleted_at(&self) -> Option<i64> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, deleted_at: Option<i64>) {
        self.deleted_at = deleted_at;
    }

    fn set_updated_at(&mut self, updated_at: i64) {
        self.updated_at = updated_at;
    }
}

impl SoftDeleteModel for Label {
    fn entity() -> &'static EntityDef {
        &LABEL
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: record_id_from_row(row, "id")?,
            name: row.get("name")?,
            deleted_at: row.get("deleted_at")?,
        })
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn deleted_at(&self) -> Option<i64> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, deleted_at: Option<i64>) {
        self.deleted_at = deleted_at;
    }
}

pub fn open() -> Connection {
    open_db_in_memory(MIGRATIONS).unwrap()
}

pub fn repo(conn: &Connection) -> SqliteSoftDeleteRepository<'_> {
    SqliteSoftDeleteRepository::try_new(conn, &ENTITIES).unwrap()
}

pub fn create_baz(conn: &Connection) -> Baz {
    let id = RecordId::new_v4();
    conn.execute("INSERT INTO baz (id) VALUES (?1);", [id.to_string()])
        .unwrap();
    load(conn, id)
}

pub fn create_foo(conn: &Connection, baz: Option<&Baz>) -> Foo {
    let id = RecordId::new_v4();
    conn.execute(
        "INSERT INTO foo (id, baz_id) VALUES (?1, ?2);",
        params![id.to_string(), baz.map(|baz| baz.id.to_string())],
    )
    .unwrap();
    load(conn, id)
}

pub fn create_bar(conn: &Connection, foo: Option<&Foo>) -> Bar {
    let id = RecordId::new_v4();
    conn.execute(
        "INSERT INTO bar (id, foo_id) VALUES (?1, ?2);",
        params![id.to_string(), foo.map(|foo| foo.id.to_string())],
    )
    .unwrap();
    load(conn, id)
}

pub fn create_label(conn: &Connection, name: &str) -> Label {
    let id = RecordId::new_v4();
    conn.execute(
        "INSERT INTO label (id, name) VALUES (?1, ?2);",
        params![id.to_string(), name],
    )
    .unwrap();
    load(conn, id)
}

pub fn load<M: SoftDeleteModel>(conn: &Connection, id: RecordId) -> M {
    SqliteSoftDeleteRepository::new(conn)
        .with_deleted::<M>()
        .get(id)
        .unwrap()
        .unwrap()
}

pub fn membership_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
