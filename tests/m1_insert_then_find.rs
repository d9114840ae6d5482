//! §8 concrete scenario: insert-then-find.

use docdb::{Bson, Client, Document};

#[test]
fn insert_then_find_round_trips_the_document() {
    let client = Client::new();
    let users = client.default_database().collection("users");

    let mut doc = Document::new();
    doc.insert("_id", Bson::Int32(1));
    doc.insert("name", Bson::String("alpha".into()));
    let inserted = users.insert_one(doc).unwrap();
    assert_eq!(inserted.inserted_count, 1);

    let mut filter = Document::new();
    filter.insert("_id", Bson::Int32(1));
    let found = users.find_one(filter).unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&Bson::String("alpha".into())));
}
