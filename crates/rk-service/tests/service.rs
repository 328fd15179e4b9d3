//! Common service behaviour, run against both a default `id` resource and a
//! custom-keyed `customid` resource backed by [`MemoryModel`].

use rk_service::{
    ErrorKind, FindResult, MemoryModel, OneOrMany, Paginate, Params, Record, RecordService,
    ServiceError, ServiceOptions, Target,
};
use serde_json::{json, Value};
use std::sync::Arc;

const COLUMNS: [&str; 4] = ["name", "age", "time", "created"];

struct Fixture {
    model: Arc<MemoryModel>,
    service: RecordService,
    id: &'static str,
}

impl Fixture {
    fn new(id: &'static str) -> Self {
        Self::with_options(id, |options| options)
    }

    fn with_options(id: &'static str, configure: impl FnOnce(ServiceOptions) -> ServiceOptions) -> Self {
        let model = Arc::new(MemoryModel::new("people", id, COLUMNS));
        let options = configure(ServiceOptions::new(model.clone()).id(id).events(["testing"]));
        Self {
            model,
            service: RecordService::new(options).unwrap(),
            id,
        }
    }

    async fn create(&self, value: Value) -> Record {
        match self.service.create(OneOrMany::One(record(value)), Params::default()).await.unwrap() {
            OneOrMany::One(created) => created,
            OneOrMany::Many(_) => panic!("expected a single record"),
        }
    }

    async fn seed_people(&self) -> (Value, Value, Value) {
        let alice = self.create(json!({ "name": "Alice", "age": 19 })).await;
        let bob = self.create(json!({ "name": "Bob", "age": 25 })).await;
        let doug = self.create(json!({ "name": "Doug", "age": 32 })).await;
        (
            alice[self.id].clone(),
            bob[self.id].clone(),
            doug[self.id].clone(),
        )
    }

    async fn find(&self, query: Value) -> Vec<Record> {
        self.service.find(Params::from_value(query)).await.unwrap().into_data()
    }

    async fn names(&self, query: Value) -> Vec<String> {
        self.find(query)
            .await
            .iter()
            .map(|r| r["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

fn record(value: Value) -> Record {
    Record::from(value.as_object().cloned().unwrap())
}

fn query(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().unwrap()
}

// =============================================================================
// get
// =============================================================================

async fn check_get(id: &'static str) {
    let fx = Fixture::new(id);
    let doug = fx.create(json!({ "name": "Doug", "age": 32 })).await;
    let doug_id = doug[id].clone();

    let got = fx.service.get(doug_id.clone(), Params::default()).await.unwrap();
    assert_eq!(got[id], doug_id);
    assert_eq!(got["name"], json!("Doug"));
    assert_eq!(got["age"], json!(32));

    let selected = fx
        .service
        .get(doug_id.clone(), Params::from_value(json!({ "$select": ["name"] })))
        .await
        .unwrap();
    assert_eq!(selected, record(json!({ id: doug_id, "name": "Doug" })));

    let err = fx.service.get(568225, Params::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), "No record found for id '568225'");

    // Extra query constraints must also hold.
    let err = fx
        .service
        .get(doug_id, Params::from_value(json!({ "name": "Alice" })))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_get() {
    check_get("id").await;
    check_get("customid").await;
}

// =============================================================================
// find
// =============================================================================

async fn check_find_filters(id: &'static str) {
    let fx = Fixture::new(id);
    fx.seed_people().await;

    assert_eq!(fx.find(json!({})).await.len(), 3);
    assert_eq!(fx.names(json!({ "name": "Alice" })).await, vec!["Alice"]);
    assert_eq!(fx.names(json!({ "$sort": { "name": 1 } })).await, vec!["Alice", "Bob", "Doug"]);
    assert_eq!(fx.names(json!({ "$sort": { "name": -1 } })).await, vec!["Doug", "Bob", "Alice"]);
    assert_eq!(fx.find(json!({ "$limit": 2 })).await.len(), 2);
    assert_eq!(
        fx.names(json!({ "$sort": { "name": 1 }, "$skip": 1 })).await,
        vec!["Bob", "Doug"]
    );
    assert_eq!(
        fx.names(json!({ "$sort": { "name": 1 }, "$skip": 1, "$limit": 1 })).await,
        vec!["Bob"]
    );
    assert_eq!(
        fx.names(json!({ "name": { "$in": ["Alice", "Bob"] }, "$sort": { "name": 1 } })).await,
        vec!["Alice", "Bob"]
    );
    assert_eq!(
        fx.names(json!({ "name": { "$nin": ["Alice", "Bob"] } })).await,
        vec!["Doug"]
    );
    assert_eq!(fx.names(json!({ "age": { "$lt": 30 }, "$sort": { "age": 1 } })).await, vec!["Alice", "Bob"]);
    assert_eq!(fx.names(json!({ "age": { "$lte": 25 }, "$sort": { "age": 1 } })).await, vec!["Alice", "Bob"]);
    assert_eq!(fx.names(json!({ "age": { "$gt": 30 } })).await, vec!["Doug"]);
    assert_eq!(fx.names(json!({ "age": { "$gte": 25 }, "$sort": { "age": 1 } })).await, vec!["Bob", "Doug"]);
    assert_eq!(
        fx.names(json!({ "name": { "$ne": "Alice" }, "$sort": { "name": 1 } })).await,
        vec!["Bob", "Doug"]
    );
    assert_eq!(
        fx.names(json!({ "$or": [{ "name": "Alice" }, { "name": "Bob" }], "$sort": { "name": 1 } })).await,
        vec!["Alice", "Bob"]
    );
    assert_eq!(
        fx.names(json!({ "$or": [{ "name": "Alice" }, { "name": "Bob" }], "age": { "$gt": 20 } })).await,
        vec!["Bob"]
    );

    let selected = fx.find(json!({ "name": "Alice", "$select": ["name"] })).await;
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].keys().map(String::as_str).collect::<Vec<_>>(), vec![id, "name"]);
}

#[tokio::test]
async fn test_find_filters() {
    check_find_filters("id").await;
    check_find_filters("customid").await;
}

#[tokio::test]
async fn test_find_like() {
    let fx = Fixture::new("id");
    fx.create(json!({ "name": "Charlie Brown", "age": 10 })).await;

    let found = fx.find(json!({ "name": { "$like": "%lie%" } })).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], json!(1));
    assert_eq!(found[0]["name"], json!("Charlie Brown"));
}

#[tokio::test]
async fn test_float_words_filter_as_text() {
    let fx = Fixture::new("id");
    for name in ["Nan", "Infinity", "Bob"] {
        fx.create(json!({ "name": name })).await;
    }

    for name in ["Nan", "Infinity", "Bob"] {
        assert_eq!(fx.names(json!({ "name": name })).await, vec![name]);
        assert_eq!(fx.find(json!({ "name": { "$ne": name } })).await.len(), 2);
    }

    let removed = fx
        .service
        .remove(Target::AllMatching(query(json!({ "name": { "$ne": "Nan" } }))), Params::default())
        .await
        .unwrap();
    assert_eq!(removed.len(), 2);
    assert_eq!(fx.names(json!({})).await, vec!["Nan"]);
}

#[tokio::test]
async fn test_find_rejects_unknown_operator() {
    let fx = Fixture::new("id");
    let err = fx
        .service
        .find(Params::from_value(json!({ "name": { "$regex": "^A" } })))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert!(matches!(err, ServiceError::Filter(_)));
}

async fn check_pagination(id: &'static str) {
    let fx = Fixture::with_options(id, |o| o.paginate(Paginate::new(1, Some(2))));
    fx.seed_people().await;

    let paginated = |q: Value| Params::from_value(q);

    let FindResult::Page(page) = fx.service.find(paginated(json!({ "$sort": { "name": 1 } }))).await.unwrap() else {
        panic!("expected a page");
    };
    assert_eq!((page.total, page.limit, page.skip), (3, 1, 0));
    assert_eq!(page.data[0]["name"], json!("Alice"));

    let FindResult::Page(page) = fx
        .service
        .find(paginated(json!({ "$sort": { "name": 1 }, "$skip": 1, "$limit": 10 })))
        .await
        .unwrap()
    else {
        panic!("expected a page");
    };
    assert_eq!((page.total, page.limit, page.skip), (3, 2, 1));
    assert_eq!(page.data.len(), 2);

    let FindResult::Page(page) = fx.service.find(paginated(json!({ "name": "Doug" }))).await.unwrap() else {
        panic!("expected a page");
    };
    assert_eq!(page.total, 1);

    // Per-call override turns pagination off.
    let result = fx
        .service
        .find(Params::default().with_paginate(Paginate::disabled()))
        .await
        .unwrap();
    assert!(matches!(result, FindResult::All(ref all) if all.len() == 3));
}

#[tokio::test]
async fn test_pagination() {
    check_pagination("id").await;
    check_pagination("customid").await;
}

#[tokio::test]
async fn test_zero_limit_reports_total() {
    let fx = Fixture::with_options("id", |o| o.paginate(Paginate::new(10, None)));
    fx.seed_people().await;

    let FindResult::Page(page) = fx
        .service
        .find(Params::from_value(json!({ "$limit": 0, "age": { "$gt": 20 } })))
        .await
        .unwrap()
    else {
        panic!("expected a page");
    };
    assert_eq!(page.total, 2);
    assert_eq!(page.limit, 0);
    assert!(page.data.is_empty());

    let unpaginated = Fixture::new("id");
    unpaginated.seed_people().await;
    assert!(unpaginated.find(json!({ "$limit": 0 })).await.is_empty());
}

// =============================================================================
// create
// =============================================================================

async fn check_create(id: &'static str) {
    let fx = Fixture::new(id);

    let created = fx.create(json!({ "name": "Bill", "age": 40 })).await;
    assert!(created.id(id).is_some());
    assert_eq!(created["name"], json!("Bill"));
    assert_eq!(created["created"], Value::Null);

    let fetched = fx.service.get(created[id].clone(), Params::default()).await.unwrap();
    assert_eq!(fetched, created);

    let many = fx
        .service
        .create(
            OneOrMany::Many(vec![
                record(json!({ "name": "Gerald", "age": 18 })),
                record(json!({ "name": "Herald", "age": 18 })),
            ]),
            Params::default(),
        )
        .await
        .unwrap()
        .into_vec();
    assert_eq!(many.len(), 2);
    assert_eq!(many[0]["name"], json!("Gerald"));
    assert_eq!(many[1]["name"], json!("Herald"));
    assert_eq!(fx.model.len().await, 3);
}

#[tokio::test]
async fn test_create() {
    check_create("id").await;
    check_create("customid").await;
}

#[tokio::test]
async fn test_create_picks_up_storage_defaults() {
    let model = Arc::new(MemoryModel::new("todos", "id", ["text", "complete"]).with_default("complete", false));
    let service = RecordService::new(ServiceOptions::new(model)).unwrap();

    let created = service
        .create(OneOrMany::One(record(json!({ "text": "walk" }))), Params::default())
        .await
        .unwrap();
    assert_eq!(created, OneOrMany::One(record(json!({ "id": 1, "text": "walk", "complete": false }))));
}

#[tokio::test]
async fn test_bulk_create_is_not_atomic() {
    let fx = Fixture::new("id");
    let err = fx
        .service
        .create(
            OneOrMany::Many(vec![
                record(json!({ "name": "ok" })),
                record(json!({ "nickname": "bad" })),
            ]),
            Params::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(err.to_string(), "table people has no column named nickname");
    // The valid row was written and stays written.
    assert_eq!(fx.model.len().await, 1);
}

// =============================================================================
// update
// =============================================================================

async fn check_update(id: &'static str) {
    let fx = Fixture::new(id);
    let doug = fx.create(json!({ "name": "Doug", "age": 32, "created": true })).await;
    let doug_id = doug[id].clone();

    let updated = fx
        .service
        .update(
            Target::Single(doug_id.clone()),
            record(json!({ "name": "Dougler", id: 999 })),
            Params::default(),
        )
        .await
        .unwrap();
    assert_eq!(updated[id], doug_id);
    assert_eq!(updated["name"], json!("Dougler"));
    assert_eq!(updated["age"], Value::Null);
    assert_eq!(updated["created"], Value::Null);

    let stored = fx.service.get(doug_id, Params::default()).await.unwrap();
    assert_eq!(stored, updated);

    let err = fx
        .service
        .update(Target::single(568225), record(json!({ "name": "NotFound" })), Params::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_update() {
    check_update("id").await;
    check_update("customid").await;
}

#[tokio::test]
async fn test_update_ignores_fields_the_row_lacks() {
    let model = Arc::new(MemoryModel::new("people", "id", ["name", "age"]));
    let service = RecordService::new(ServiceOptions::new(model.clone())).unwrap();
    service
        .create(OneOrMany::One(record(json!({ "name": "Doug", "age": 32 }))), Params::default())
        .await
        .unwrap();

    let updated = service
        .update(Target::single(1), record(json!({ "name": "D", "nickname": "x" })), Params::default())
        .await
        .unwrap();
    assert_eq!(updated, record(json!({ "id": 1, "name": "D", "age": null })));
    assert_eq!(model.rows().await, vec![updated]);
}

#[tokio::test]
async fn test_update_many_is_bad_request_and_writes_nothing() {
    let fx = Fixture::new("id");
    fx.seed_people().await;
    let before = fx.model.rows().await;

    let err = fx
        .service
        .update(Target::all(), record(json!({ "name": "Everyone" })), Params::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(err.to_string(), "You can not replace multiple instances. Did you mean 'patch'?");
    assert_eq!(fx.model.rows().await, before);
}

// =============================================================================
// patch
// =============================================================================

async fn check_patch(id: &'static str) {
    let fx = Fixture::new(id);
    let (alice, _, _) = fx.seed_people().await;

    let patched = fx
        .service
        .patch(Target::Single(alice.clone()), record(json!({ "name": "PatchDoug", id: 42 })), Params::default())
        .await
        .unwrap();
    let OneOrMany::One(patched) = patched else {
        panic!("expected a single record");
    };
    assert_eq!(patched[id], alice);
    assert_eq!(patched["name"], json!("PatchDoug"));
    assert_eq!(patched["age"], json!(19));

    let err = fx
        .service
        .patch(Target::single(568225), record(json!({ "name": "x" })), Params::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let patched = fx
        .service
        .patch(
            Target::AllMatching(query(json!({ "age": { "$gt": 20 } }))),
            record(json!({ "created": true })),
            Params::default(),
        )
        .await
        .unwrap()
        .into_vec();
    assert_eq!(patched.len(), 2);
    assert!(patched.iter().all(|r| r["created"] == json!(true)));

    let untouched = fx.service.get(alice, Params::default()).await.unwrap();
    assert_eq!(untouched["created"], Value::Null);
}

#[tokio::test]
async fn test_patch() {
    check_patch("id").await;
    check_patch("customid").await;
}

#[tokio::test]
async fn test_patch_many_todos() {
    let model = Arc::new(MemoryModel::new("todos", "id", ["text", "complete"]));
    let service = RecordService::new(ServiceOptions::new(model.clone()).paginate(Paginate::new(2, Some(4)))).unwrap();

    for (text, complete) in [("a", false), ("b", false), ("c", true), ("d", false)] {
        service
            .create(OneOrMany::One(record(json!({ "text": text, "complete": complete }))), Params::default())
            .await
            .unwrap();
    }

    // Bulk patch is not limited by the default page size.
    let patched = service
        .patch(
            Target::AllMatching(query(json!({ "complete": false }))),
            record(json!({ "complete": true, "text": "done" })),
            Params::default(),
        )
        .await
        .unwrap()
        .into_vec();
    assert_eq!(patched.len(), 3);
    assert!(patched.iter().all(|r| r["complete"] == json!(true) && r["text"] == json!("done")));

    // The already-complete row did not match and keeps its own text.
    assert_eq!(
        model.rows().await,
        vec![
            record(json!({ "id": 1, "text": "done", "complete": true })),
            record(json!({ "id": 2, "text": "done", "complete": true })),
            record(json!({ "id": 3, "text": "c", "complete": true })),
            record(json!({ "id": 4, "text": "done", "complete": true })),
        ]
    );
}

// =============================================================================
// remove
// =============================================================================

async fn check_remove(id: &'static str) {
    let fx = Fixture::new(id);
    let (alice, _, _) = fx.seed_people().await;

    let removed = fx.service.remove(Target::Single(alice.clone()), Params::default()).await.unwrap();
    let OneOrMany::One(removed) = removed else {
        panic!("expected a single record");
    };
    assert_eq!(removed[id], alice);
    assert_eq!(removed["name"], json!("Alice"));

    let err = fx.service.get(alice.clone(), Params::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = fx.service.remove(Target::Single(alice), Params::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let removed = fx
        .service
        .remove(Target::AllMatching(query(json!({ "age": { "$gte": 25 } }))), Params::default())
        .await
        .unwrap()
        .into_vec();
    let mut names: Vec<_> = removed.iter().map(|r| r["name"].clone()).collect();
    names.sort_by_key(|v| v.to_string());
    assert_eq!(names, vec![json!("Bob"), json!("Doug")]);
    assert!(fx.model.is_empty().await);
}

#[tokio::test]
async fn test_remove() {
    check_remove("id").await;
    check_remove("customid").await;
}

// =============================================================================
// error hook
// =============================================================================

#[tokio::test]
async fn test_error_hook_sees_every_failure() {
    let fx = Fixture::with_options("id", |o| {
        o.on_error(|err| match err {
            ServiceError::NotFound(msg) => ServiceError::BadRequest(format!("translated: {}", msg)),
            other => other,
        })
    });

    let err = fx.service.get(1, Params::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "translated: No record found for id '1'");

    let err = fx.service.remove(Target::single(1), Params::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let err = fx
        .service
        .update(Target::all(), Record::new(), Params::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}
