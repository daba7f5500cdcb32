use std::sync::Arc;

use docguard::{memory::InMemoryStore, prelude::*};
use futures::future::join_all;
use serde_json::{Value, json};

const NOTES: &str = "io.cozy.notes";
const FILES: &str = "io.cozy.files";

fn doc(value: Value) -> JsonDoc {
    JsonDoc::from_value(value).unwrap()
}

fn grants() -> GrantTable {
    GrantTable::from_json_str(
        r#"{
            "io.cozy.notes": "ALL",
            "io.cozy.files": "GET"
        }"#,
    )
    .unwrap()
}

async fn mediator() -> DocumentMediator<InMemoryStore> {
    DocumentMediator::new(InMemoryStore::builder().with_collection(NOTES).build().await.unwrap())
}

#[tokio::test]
async fn document_lifecycle() {
    let mediator = mediator().await;
    let grants = grants();

    let created = mediator
        .create(&grants, CreateRequest::new(NOTES, doc(json!({ "title": "draft" }))))
        .await
        .unwrap();
    assert_eq!(created.doctype, NOTES);
    assert!(created.rev.starts_with("1-"));

    let mut fetched = mediator
        .fetch(&grants, FetchRequest::new(NOTES, created.id.clone()))
        .await
        .unwrap();
    assert_eq!(fetched.doctype, NOTES);
    assert_eq!(fetched.rev(), Some(created.rev.as_str()));

    fetched.body.insert("title".into(), json!("final"));
    let updated = mediator
        .upsert(&grants, UpsertRequest::new(NOTES, created.id.clone(), fetched))
        .await
        .unwrap();
    assert!(updated.rev.starts_with("2-"));
    assert_eq!(updated.data.body.get("title"), Some(&json!("final")));

    let deleted = mediator
        .delete(
            &grants,
            DeleteRequest::new(NOTES, created.id.clone()).with_if_match(format!("\"{}\"", updated.rev)),
        )
        .await
        .unwrap();
    assert!(deleted.deleted);
    assert!(deleted.rev.starts_with("3-"));

    let err = mediator
        .fetch(&grants, FetchRequest::new(NOTES, created.id.clone()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        MediatorError::NotFound {
            collection: NOTES.into(),
            id: Some(created.id)
        }
    );
}

#[tokio::test]
async fn stale_revisions_conflict() {
    let mediator = mediator().await;
    let grants = grants();

    let created = mediator
        .upsert(&grants, UpsertRequest::new(NOTES, "n1", doc(json!({ "v": 1 }))))
        .await
        .unwrap();
    mediator
        .upsert(
            &grants,
            UpsertRequest::new(NOTES, "n1", doc(json!({ "_id": "n1", "_rev": created.rev, "v": 2 }))),
        )
        .await
        .unwrap();

    let stale_update = mediator
        .upsert(
            &grants,
            UpsertRequest::new(NOTES, "n1", doc(json!({ "_id": "n1", "_rev": created.rev, "v": 3 }))),
        )
        .await
        .unwrap_err();
    let stale_delete = mediator
        .delete(&grants, DeleteRequest::new(NOTES, "n1").with_rev(created.rev.clone()))
        .await
        .unwrap_err();
    let taken_id = mediator
        .upsert(&grants, UpsertRequest::new(NOTES, "n1", doc(json!({}))))
        .await
        .unwrap_err();

    for err in [stale_update, stale_delete, taken_id] {
        assert_eq!(err.status(), 409, "{err}");
    }
}

#[tokio::test]
async fn read_only_grant_cannot_write() {
    let mediator = mediator().await;
    let grants = grants();

    let err = mediator
        .create(&grants, CreateRequest::new(FILES, doc(json!({ "name": "a.txt" }))))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        MediatorError::Forbidden {
            verb: Verb::Post,
            collection: FILES.into()
        }
    );
    assert_eq!(mediator.backend().list_collections().await, vec![NOTES]);
}

#[tokio::test]
async fn define_index_creates_missing_collection() {
    let mediator = DocumentMediator::new(InMemoryStore::new());
    let grants = PermissionSet::from_verbs([Verb::Post]);

    let result = mediator
        .define_index(
            &grants,
            DefineIndexRequest::new("io.cozy.contacts", json!({ "index": { "fields": ["name"] } })),
        )
        .await
        .unwrap();

    assert_eq!(result["result"], "created");
    assert_eq!(mediator.backend().list_collections().await, vec!["io.cozy.contacts"]);
}

#[tokio::test]
async fn define_index_without_heal_reports_missing_collection() {
    let mediator = DocumentMediator::builder(InMemoryStore::new())
        .with_index_heal(false)
        .build();

    let err = mediator
        .define_index(
            &PermissionSet::all(),
            DefineIndexRequest::new("io.cozy.contacts", json!({ "index": { "fields": ["name"] } })),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        MediatorError::NotFound {
            collection: "io.cozy.contacts".into(),
            id: None
        }
    );
}

#[tokio::test]
async fn find_returns_typed_documents() {
    let mediator = mediator().await;
    let grants = grants();

    for (id, year) in [("a", 2019), ("b", 2021), ("c", 2023)] {
        mediator
            .upsert(&grants, UpsertRequest::new(NOTES, id, doc(json!({ "year": year }))))
            .await
            .unwrap();
    }

    let found = mediator
        .find(
            &grants,
            FindRequest::new(
                NOTES,
                json!({ "selector": { "year": { "$gt": 2020 } }, "sort": [{ "year": "desc" }] }),
            ),
        )
        .await
        .unwrap();

    let ids: Vec<_> = found.docs.iter().filter_map(JsonDoc::id).collect();
    assert_eq!(ids, vec!["c", "b"]);
    assert!(found.docs.iter().all(|doc| doc.doctype == NOTES));

    let err = mediator
        .find(&grants, FindRequest::new(NOTES, json!({ "selector": { "$where": "x" } })))
        .await
        .unwrap_err();
    assert_eq!(err.status(), 400);
}

#[tokio::test]
async fn changes_feed_pages_through_mutations() {
    let mediator = mediator().await;
    let grants = grants();

    for id in ["a", "b", "c"] {
        mediator
            .upsert(&grants, UpsertRequest::new(NOTES, id, doc(json!({}))))
            .await
            .unwrap();
    }

    let first = mediator
        .changes(&grants, ChangesRequest::new(NOTES).with_param("limit", "2"))
        .await
        .unwrap();
    assert_eq!(first.results.len(), 2);
    assert_eq!(first.pending, 1);

    let rest = mediator
        .changes(
            &grants,
            ChangesRequest::new(NOTES)
                .with_param("feed", "longpoll")
                .with_param("since", first.last_seq),
        )
        .await
        .unwrap();
    let ids: Vec<_> = rest.results.iter().map(|change| change.id.as_str()).collect();
    assert_eq!(ids, vec!["c"]);

    let err = mediator
        .changes(&grants, ChangesRequest::new(NOTES).with_param("include_docs", "true"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        MediatorError::InvalidRequest("unsupported query parameter 'include_docs'".into())
    );
}

#[tokio::test]
async fn dynamic_backend_behind_mediator() {
    let backend: Arc<dyn StoreBackend> = Arc::new(InMemoryStore::new());
    let mediator = DocumentMediator::new(backend);

    let created = mediator
        .create(&PermissionSet::all(), CreateRequest::new(NOTES, doc(json!({ "n": 1 }))))
        .await
        .unwrap();

    assert_eq!(created.data.body.get("n"), Some(&json!(1)));
}

#[tokio::test]
async fn concurrent_writers_share_one_mediator() {
    let mediator = Arc::new(mediator().await);
    let grants = Arc::new(grants());

    let results = join_all((0..16).map(|n| {
        let mediator = Arc::clone(&mediator);
        let grants = Arc::clone(&grants);
        async move {
            mediator
                .upsert(&grants, UpsertRequest::new(NOTES, format!("n{n}"), doc(json!({ "n": n }))))
                .await
        }
    }))
    .await;

    assert!(results.iter().all(Result::is_ok));

    let changes = mediator
        .changes(&grants, ChangesRequest::new(NOTES))
        .await
        .unwrap();
    assert_eq!(changes.results.len(), 16);
    assert_eq!(changes.last_seq, "16");
}
