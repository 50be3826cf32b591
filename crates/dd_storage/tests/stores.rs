use dd_core::MessageStore;
use dd_storage::{create_store, StoreKind};

#[tokio::test]
async fn test_create_store_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("state").join("messages");

    let file = create_store(StoreKind::File, &nested).await.unwrap();
    assert!(nested.is_dir());
    assert!(file.offer_ids().await.unwrap().is_empty());

    let memory = create_store(StoreKind::Memory, &nested).await.unwrap();
    assert_eq!(memory.load("daydeal-daily").await.unwrap(), None);
}
