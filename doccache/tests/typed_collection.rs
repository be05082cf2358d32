mod common;

use common::*;
use doccache::{
    bson::{doc, Bson},
    prelude::*,
};

#[tokio::test]
async fn create_then_find() {
    let store = simple_store().await;
    let simple = store.typed_collection::<SimpleItem>();

    let id = simple.create(&one()).await.unwrap();
    let found = simple.find(&SimpleKey::new("one", 1).filter()).await.unwrap();

    assert_eq!(found.id().map(Bson::ObjectId), Some(id));
    assert_eq!(found.charlie, "One is the loneliest number");
    assert!(found.realized);

    let by_id = simple.find(&found.id_filter().unwrap()).await.unwrap();
    assert_eq!(by_id.alpha, "one");
}

#[tokio::test]
async fn find_reports_not_found() {
    let store = simple_store().await;
    let simple = store.typed_collection::<SimpleItem>();

    let err = simple.find(&SimpleKey::new("xRay", 23).filter()).await.unwrap_err();

    assert!(err.is_not_found());
    assert!(err.to_string().contains("xRay"));
}

#[tokio::test]
async fn second_create_is_a_duplicate() {
    let store = simple_store().await;
    let simple = store.typed_collection::<SimpleItem>();

    simple.create(&two()).await.unwrap();
    let err = simple.create(&two()).await.unwrap_err();

    assert!(err.is_duplicate());
    assert_eq!(simple.count(&Filter::all()).await.unwrap(), 1);
}

#[tokio::test]
async fn find_or_create_returns_the_stored_document() {
    let store = simple_store().await;
    let simple = store.typed_collection::<SimpleItem>();
    let filter = three().filter();

    let created = simple.find_or_create(&filter, &three()).await.unwrap();
    assert!(created.id().is_some());

    let mut different = three();
    different.charlie = "Nobody can keep a secret".to_string();
    let existing = simple.find_or_create(&filter, &different).await.unwrap();

    assert_eq!(existing.id(), created.id());
    assert_eq!(existing.charlie, "Three can keep a secret if two of them are dead");
    assert_eq!(simple.count(&filter).await.unwrap(), 1);
}

#[tokio::test]
async fn find_or_create_reports_collisions_on_other_indexes() {
    let store = simple_store().await;
    store
        .backend()
        .add_index("simple", &IndexDescription::new(true, ["charlie"]))
        .await
        .unwrap();
    let simple = store.typed_collection::<SimpleItem>();

    simple.create(&one()).await.unwrap();
    let uno = SimpleItem::new("uno", 1, "One is the loneliest number");
    let err = simple.find_or_create(&uno.filter(), &uno).await.unwrap_err();

    assert!(err.is_duplicate(), "{err}");
    assert_eq!(simple.count(&Filter::all()).await.unwrap(), 1);
}

#[tokio::test]
async fn validator_rejects_invalid_documents() {
    let store = simple_store().await;
    let simple = store.typed_collection::<SimpleItem>();

    let err = simple.create(&simply_invalid()).await.unwrap_err();

    assert!(err.is_validation_failure());
    assert!(err.to_string().contains("charlie"));
}

#[tokio::test]
async fn update_outcomes() {
    let store = simple_store().await;
    let simple = store.typed_collection::<SimpleItem>();
    let filter = one().filter();

    simple.create(&one()).await.unwrap();

    simple
        .update(&filter, &Update::new().set("charlie", "One more time").inc("delta", 5))
        .await
        .unwrap();
    let updated = simple.find(&filter).await.unwrap();
    assert_eq!((updated.charlie.as_str(), updated.delta), ("One more time", 5));

    let err = simple
        .update(&filter, &Update::new().set("charlie", "One more time"))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::NoModification { .. }));

    let err = simple
        .update(&SimpleKey::new("xRay", 23).filter(), &Update::new().inc("delta", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::NoMatch { .. }));

    let err = simple
        .update(&filter, &Update::new().unset("charlie"))
        .await
        .unwrap_err();
    assert!(err.is_validation_failure());
}

#[tokio::test]
async fn replace_outcomes() {
    let store = simple_store().await;
    let simple = store.typed_collection::<SimpleItem>();
    let filter = two().filter();

    let original = simple.find_or_create(&filter, &two()).await.unwrap();

    let mut replacement = two();
    replacement.delta = 22;
    simple.replace(&filter, &replacement).await.unwrap();

    let replaced = simple.find(&filter).await.unwrap();
    assert_eq!(replaced.delta, 22);
    assert_eq!(replaced.id(), original.id());

    let err = simple.replace(&filter, &replacement).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::NoModification { .. }));

    let err = simple
        .replace(&SimpleKey::new("xRay", 23).filter(), &replacement)
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::NoMatch { .. }));
}

#[tokio::test]
async fn delete_and_delete_all() {
    let store = simple_store().await;
    let simple = store.typed_collection::<SimpleItem>();

    for item in [one(), two(), three()] {
        simple.create(&item).await.unwrap();
    }

    simple.delete(&one().filter(), false).await.unwrap();
    assert!(simple.delete(&one().filter(), false).await.unwrap_err().is_not_found());
    simple.delete(&one().filter(), true).await.unwrap();

    assert_eq!(simple.delete_all().await.unwrap(), 2);
    assert_eq!(simple.count(&Filter::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn iterate_visits_matches_in_order() {
    let store = simple_store().await;
    let simple = store.typed_collection::<SimpleItem>();

    for item in [one(), two(), three()] {
        simple.create(&item).await.unwrap();
    }

    let mut seen = Vec::new();
    simple
        .iterate(&Filter::gte("bravo", 2), |item| {
            assert!(item.realized);
            seen.push(item.alpha);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(seen, ["two", "three"]);

    let mut visited = 0;
    let err = simple
        .iterate(&Filter::all(), |_| {
            visited += 1;
            Err(DocumentStoreError::Backend("stop".into()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Backend(_)));
    assert_eq!(visited, 1);
}

#[tokio::test]
async fn query_sorts_and_limits() {
    let store = simple_store().await;
    let simple = store.typed_collection::<SimpleItem>();

    for item in [one(), two(), three()] {
        simple.create(&item).await.unwrap();
    }

    let query = Query::builder()
        .sort("bravo", SortDirection::Desc)
        .limit(2)
        .build();
    let alphas = simple
        .query(query)
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.alpha)
        .collect::<Vec<_>>();

    assert_eq!(alphas, ["three", "two"]);
}

#[tokio::test]
async fn distinct_string_values() {
    let store = simple_store().await;
    let simple = store.typed_collection::<SimpleItem>();

    for item in [one(), two(), three(), SimpleItem::new("two", 22, "Two again")] {
        simple.create(&item).await.unwrap();
    }

    let alphas = simple.string_values_for("alpha", &Filter::all()).await.unwrap();
    assert_eq!(alphas, ["one", "two", "three"]);

    let err = simple.string_values_for("bravo", &Filter::all()).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::UnexpectedType { .. }));
}

#[tokio::test]
async fn undecodable_documents_are_reported() {
    let store = simple_store().await;
    let loose = TypedCollection::<_, SimpleItem>::new("loose", store.backend());

    store
        .backend()
        .insert_one(doc! { "alpha": 5, "bravo": "one" }, "loose")
        .await
        .unwrap();

    let err = loose.find(&Filter::all()).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::Decode { .. }));
}

#[tokio::test]
async fn define_collection_is_idempotent() {
    let store = simple_store().await;

    store
        .define_collection(&SimpleItem::definition().unwrap())
        .await
        .unwrap();

    assert_eq!(store.list_collections().await.unwrap(), ["simple"]);
    assert!(store.collection_exists("simple").await.unwrap());
}
