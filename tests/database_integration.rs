//! End-to-end scenarios against real database directories: ingest via
//! the public API, query through every family, reopen in a fresh
//! engine value.

use bibdex::{Database, DbError, Extent, Field};
use tempfile::tempdir;

fn ingest_sample(db: &mut Database) {
    // Three records: authors {Alice, Bob, Alice}, titles {X, Y, Z}.
    let records = [
        (Extent::new(0, 10), "Alice", "X"),
        (Extent::new(10, 12), "Bob", "Y"),
        (Extent::new(22, 8), "Alice", "Z"),
    ];
    for (extent, author, title) in records {
        db.insert(Field::Author, extent, author).unwrap();
        db.insert(Field::Title, extent, title).unwrap();
    }
}

#[test]
fn prefix_find_returns_every_alice_extent() {
    let dir = tempdir().unwrap();
    let mut db = Database::create(dir.path(), "t1").unwrap();
    ingest_sample(&mut db);

    let hits = db.find(Field::Author, "Ali").unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0], (Extent::new(0, 10), "Alice".to_string()));
    assert_eq!(hits[1], (Extent::new(22, 8), "Alice".to_string()));

    let hits = db.find(Field::Title, "Y").unwrap();
    assert_eq!(hits, vec![(Extent::new(10, 12), "Y".to_string())]);
}

#[test]
fn queries_survive_reopening_in_a_fresh_engine() {
    let dir = tempdir().unwrap();
    {
        let mut db = Database::create(dir.path(), "t1").unwrap();
        ingest_sample(&mut db);
        db.close();
    }

    let mut db = Database::open(dir.path(), "t1").unwrap();
    let hits = db.find(Field::Author, "Bob").unwrap();
    assert_eq!(hits, vec![(Extent::new(10, 12), "Bob".to_string())]);
}

#[test]
fn five_hundred_titles_iterate_from_the_midpoint() {
    let dir = tempdir().unwrap();
    let mut db = Database::create(dir.path(), "t1").unwrap();
    for n in 0..500u32 {
        db.insert(Field::Title, Extent::new(n, 1), &format!("key{:03}", n))
            .unwrap();
    }

    let hits = db.find(Field::Title, "key").unwrap();
    assert_eq!(hits.len(), 500);

    // Everything from key250 on, in order.
    let upper: Vec<String> = hits
        .into_iter()
        .map(|(_, name)| name)
        .filter(|name| name.as_str() >= "key250")
        .collect();
    assert_eq!(upper.len(), 250);
    for (n, name) in upper.iter().enumerate() {
        assert_eq!(name, &format!("key{:03}", 250 + n));
    }
}

#[test]
fn opening_a_nonexistent_database_fails_with_the_file_name() {
    let dir = tempdir().unwrap();
    let err = Database::open(dir.path(), "t2").unwrap_err();
    assert_eq!(
        err.downcast_ref::<DbError>(),
        Some(&DbError::NotExist("t2_idx_title.bin".to_string()))
    );
}

#[test]
fn fuzzy_search_intersects_across_records() {
    let dir = tempdir().unwrap();
    let mut db = Database::create(dir.path(), "t1").unwrap();

    // Three records: A "graph theory", B "graph algorithm",
    // C "algorithm design"; only B holds both query tokens.
    let records = [
        (Extent::new(0, 10), "graph theory"),
        (Extent::new(10, 12), "graph algorithm"),
        (Extent::new(22, 8), "algorithm design"),
    ];
    for (extent, title) in records {
        index_tokens(&mut db, title, extent);
    }

    let hits = db
        .search(&["graph".to_string(), "algorithm".to_string()])
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, Extent::new(10, 12));

    let hits = db.search(&["graph".to_string()]).unwrap();
    assert_eq!(hits.len(), 2);
}

/// Routes a title through the same adaptor path `read` uses.
fn index_tokens(db: &mut Database, title: &str, extent: Extent) {
    use bibdex::ingest::{Ingestor, ParseEvent};
    let mut ingestor = Ingestor::new(db);
    ingestor
        .handle(&ParseEvent::Start {
            name: "dblp",
            offset: extent.pos(),
        })
        .unwrap();
    ingestor
        .handle(&ParseEvent::Start {
            name: "article",
            offset: extent.pos(),
        })
        .unwrap();
    ingestor
        .handle(&ParseEvent::Start {
            name: "title",
            offset: extent.pos(),
        })
        .unwrap();
    ingestor
        .handle(&ParseEvent::Text {
            text: title.into(),
        })
        .unwrap();
    ingestor
        .handle(&ParseEvent::End {
            name: "title",
            offset: extent.pos(),
        })
        .unwrap();
    ingestor
        .handle(&ParseEvent::End {
            name: "article",
            offset: extent.pos() + extent.len(),
        })
        .unwrap();
}

#[test]
fn top_authors_rank_by_record_count() {
    let dir = tempdir().unwrap();
    let mut db = Database::create(dir.path(), "t1").unwrap();

    let counts = [("a", 5u32), ("b", 2), ("c", 7), ("d", 1), ("e", 4)];
    let mut offset = 0u32;
    for (author, count) in counts {
        for _ in 0..count {
            ingest_one_author(&mut db, author, offset);
            offset += 10;
        }
    }

    let ranked = db.top(3).unwrap();
    assert_eq!(
        ranked,
        vec![
            ("c".to_string(), 7),
            ("a".to_string(), 5),
            ("e".to_string(), 4)
        ]
    );

    let two = db.top(2).unwrap();
    assert_eq!(two, vec![("c".to_string(), 7), ("a".to_string(), 5)]);
}

fn ingest_one_author(db: &mut Database, author: &str, offset: u32) {
    use bibdex::ingest::{Ingestor, ParseEvent};
    let mut ingestor = Ingestor::new(db);
    for event in [
        ParseEvent::Start {
            name: "dblp",
            offset,
        },
        ParseEvent::Start {
            name: "article",
            offset,
        },
        ParseEvent::Start {
            name: "author",
            offset,
        },
        ParseEvent::Text {
            text: author.into(),
        },
        ParseEvent::End {
            name: "author",
            offset,
        },
        ParseEvent::End {
            name: "article",
            offset: offset + 10,
        },
    ] {
        ingestor.handle(&event).unwrap();
    }
}

#[test]
fn alice_leads_the_sample_ranking() {
    let dir = tempdir().unwrap();
    let mut db = Database::create(dir.path(), "t1").unwrap();
    for (author, offset) in [("Alice", 0u32), ("Bob", 10), ("Alice", 22)] {
        ingest_one_author(&mut db, author, offset);
    }

    let ranked = db.top(1).unwrap();
    assert_eq!(ranked, vec![("Alice".to_string(), 2)]);
}
