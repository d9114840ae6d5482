//! §8 concrete scenario: re-committing an already-committed transaction is
//! reported distinctly rather than silently retried.

use docdb::{Bson, Client, Document};

#[test]
fn second_commit_of_the_same_transaction_is_rejected() {
    let client = Client::new();
    let db = client.default_database();
    let ledger = db.collection("ledger");

    let mut session = db.start_session();
    session.start_transaction();

    let mut doc = Document::new();
    doc.insert("_id", Bson::Int32(1));
    ledger
        .insert_many_in_session(vec![doc], &mut session)
        .unwrap();

    session.commit_transaction().unwrap();

    let err = session.commit_transaction().unwrap_err();
    assert_eq!(err.code, 256);
    assert_eq!(err.code_name, "TransactionCommitted");
}
