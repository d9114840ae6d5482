//! §8 concrete scenario: a cursor drains across multiple `getMore` batches.

use docdb::{Bson, Client, Document};

#[test]
fn cursor_yields_every_document_across_small_batches() {
    let client = Client::new();
    let widgets = client.default_database().collection("widgets");

    let docs: Vec<Document> = (0..10)
        .map(|i| Document::from_pairs([("_id".to_string(), Bson::Int32(i))]))
        .collect();
    widgets.insert_many(docs).unwrap();

    let cursor = widgets.find_with_batch_size(Document::new(), 3).unwrap();
    let collected: Vec<_> = cursor.collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(collected.len(), 10);
}
