//! Demo schema: authors with a one-to-one desk, books pointing at authors
//! and tags joined to books.

use rusqlite::{params, Connection, Row};
use serde_json::{json, Value};
use softdel_core::{
    optional_record_id_from_row, record_id_from_row, EntityDef, MembershipPolicy, Migration,
    RecordId, Relation, RepoError, RepoResult, SoftDeleteModel, SoftDeleteRepository,
    SqliteSoftDeleteRepository,
};

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "
CREATE TABLE desk (
    id TEXT PRIMARY KEY NOT NULL,
    deleted_at INTEGER NULL
);
CREATE TABLE author (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    desk_id TEXT NULL UNIQUE REFERENCES desk (id),
    deleted_at INTEGER NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
);
CREATE TABLE book (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    author_id TEXT NULL REFERENCES author (id),
    deleted_at INTEGER NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
);
CREATE TABLE tag (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    deleted_at INTEGER NULL
);
CREATE TABLE book_tags (
    book_id TEXT NOT NULL REFERENCES book (id),
    tag_id TEXT NOT NULL REFERENCES tag (id),
    PRIMARY KEY (book_id, tag_id)
);
",
}];

static DESK_RELATIONS: [Relation; 1] = [Relation::ReverseOneToOne {
    accessor: "author",
    related: &AUTHOR,
    column: "desk_id",
}];

static DESK: EntityDef = EntityDef {
    table: "desk",
    primary_key: "id",
    deleted_column: "deleted_at",
    updated_column: None,
    columns: &["id", "deleted_at"],
    relations: &DESK_RELATIONS,
};

static AUTHOR_RELATIONS: [Relation; 2] = [
    Relation::OneToOne {
        field: "desk",
        column: "desk_id",
        target: &DESK,
    },
    Relation::ReverseForeignKey {
        accessor: "books",
        related: &BOOK,
        column: "author_id",
    },
];

static AUTHOR: EntityDef = EntityDef {
    table: "author",
    primary_key: "id",
    deleted_column: "deleted_at",
    updated_column: Some("updated_at"),
    columns: &["id", "name", "desk_id", "deleted_at", "updated_at"],
    relations: &AUTHOR_RELATIONS,
};

static BOOK_RELATIONS: [Relation; 2] = [
    Relation::ForeignKey {
        field: "author",
        column: "author_id",
        target: &AUTHOR,
    },
    Relation::ManyToMany {
        field: "tags",
        through: "book_tags",
        source_column: "book_id",
        target_column: "tag_id",
        target: &TAG,
        on_delete: MembershipPolicy::Clear,
    },
];

static BOOK: EntityDef = EntityDef {
    table: "book",
    primary_key: "id",
    deleted_column: "deleted_at",
    updated_column: Some("updated_at"),
    columns: &["id", "title", "author_id", "deleted_at", "updated_at"],
    relations: &BOOK_RELATIONS,
};

static TAG_RELATIONS: [Relation; 1] = [Relation::ReverseManyToMany {
    accessor: "books",
    through: "book_tags",
    source_column: "tag_id",
    target_column: "book_id",
    related: &BOOK,
    on_delete: MembershipPolicy::Retain,
}];

static TAG: EntityDef = EntityDef {
    table: "tag",
    primary_key: "id",
    deleted_column: "deleted_at",
    updated_column: None,
    columns: &["id", "name", "deleted_at"],
    relations: &TAG_RELATIONS,
};

struct Author {
    id: RecordId,
    name: String,
    desk_id: Option<RecordId>,
    deleted_at: Option<i64>,
    updated_at: i64,
}

struct Book {
    id: RecordId,
    title: String,
    author_id: Option<RecordId>,
    deleted_at: Option<i64>,
    updated_at: i64,
}

impl SoftDeleteModel for Author {
    fn entity() -> &'static EntityDef {
        &AUTHOR
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: record_id_from_row(row, "id")?,
            name: row.get("name")?,
            desk_id: optional_record_id_from_row(row, "desk_id")?,
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
        if field == "desk" {
            self.desk_id = None;
        }
    }
}

impl SoftDeleteModel for Book {
    fn entity() -> &'static EntityDef {
        &BOOK
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: record_id_from_row(row, "id")?,
            title: row.get("title")?,
            author_id: optional_record_id_from_row(row, "author_id")?,
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

/// Seeds one author with a desk, a book and two tags, deletes the author,
/// restores it, then bulk-deletes the books. Returns one JSON object per
/// step.
pub fn walkthrough(conn: &Connection) -> RepoResult<Vec<Value>> {
    let repo = SqliteSoftDeleteRepository::try_new(conn, &[&DESK, &AUTHOR, &BOOK, &TAG])?;
    let mut steps = Vec::new();

    let desk_id = RecordId::new_v4();
    let author_id = RecordId::new_v4();
    let book_id = RecordId::new_v4();
    conn.execute("INSERT INTO desk (id) VALUES (?1);", [desk_id.to_string()])?;
    conn.execute(
        "INSERT INTO author (id, name, desk_id) VALUES (?1, 'Ada', ?2);",
        params![author_id.to_string(), desk_id.to_string()],
    )?;
    conn.execute(
        "INSERT INTO book (id, title, author_id) VALUES (?1, 'Notes', ?2);",
        params![book_id.to_string(), author_id.to_string()],
    )?;
    for name in ["math", "history"] {
        let tag_id = RecordId::new_v4();
        conn.execute(
            "INSERT INTO tag (id, name) VALUES (?1, ?2);",
            params![tag_id.to_string(), name],
        )?;
        repo.link::<Book>(book_id, "tags", tag_id)?;
    }

    let mut author = require(&AUTHOR, author_id, repo.objects::<Author>().get(author_id)?)?;
    steps.push(json!({
        "step": "seeded",
        "author": author.name,
        "has_desk": author.desk_id.is_some(),
        "live_authors": repo.objects::<Author>().filter_id(author_id).count()?,
    }));

    let report = repo.delete(&mut author)?;
    let book = require(&BOOK, book_id, repo.with_deleted::<Book>().get(book_id)?)?;
    steps.push(json!({
        "step": "author_deleted",
        "report": report,
        "deleted_at": author.deleted_at,
        "updated_at": author.updated_at,
        "has_desk": author.desk_id.is_some(),
        "live_authors": repo.objects::<Author>().filter_id(author_id).count()?,
        "book": book.title,
        "book_has_author": book.author_id.is_some(),
    }));

    let written = repo.undelete(&mut author)?;
    steps.push(json!({
        "step": "author_restored",
        "written": written,
        "live_authors": repo.objects::<Author>().filter_id(author_id).count()?,
        "has_desk": author.desk_id.is_some(),
    }));

    let report = repo.objects::<Book>().filter_id(book_id).delete()?;
    let book = require(&BOOK, book_id, repo.deleted::<Book>().get(book_id)?)?;
    steps.push(json!({
        "step": "books_deleted",
        "report": report,
        "deleted_book": book.title,
        "deleted_at": book.deleted_at,
        "updated_at": book.updated_at,
    }));

    Ok(steps)
}

fn require<M>(entity: &EntityDef, id: RecordId, found: Option<M>) -> RepoResult<M> {
    found.ok_or(RepoError::NotFound {
        table: entity.table,
        id,
    })
}
