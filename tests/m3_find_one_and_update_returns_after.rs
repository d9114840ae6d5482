//! §8 concrete scenario: `findOneAndUpdate` with `returnDocument: "after"`.

use docdb::{Bson, Client, Document, ReturnDocument};

#[test]
fn find_one_and_update_returns_the_post_update_document() {
    let client = Client::new();
    let accounts = client.default_database().collection("accounts");

    let mut seed = Document::new();
    seed.insert("_id", Bson::Int32(1));
    seed.insert("tier", Bson::Int32(1));
    accounts.insert_one(seed).unwrap();

    let mut filter = Document::new();
    filter.insert("_id", Bson::Int32(1));
    let mut inc = Document::new();
    inc.insert("tier", Bson::Int32(1));
    let mut update = Document::new();
    update.insert("$inc", Bson::Document(inc));

    let result = accounts
        .find_one_and_update(filter, update, ReturnDocument::After, false)
        .unwrap()
        .expect("matching document");

    assert_eq!(result.get("tier"), Some(&Bson::Int32(2)));
}
