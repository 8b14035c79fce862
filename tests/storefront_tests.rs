//! End-to-end tests for the storefront facade over file-backed media.

use std::sync::Arc;
use storefront_sync::{
    AdmissionOutcome, AdmissionRule, Category, CommitStrategy, Direction, FileMedium, HeroItem,
    InMemoryRemoteStore, InsertMode, JsonFileRemoteStore, MemoryMedium, NotificationKind, OrderedItem,
    Product, RemoteStore, ReorderOutcome, SnapshotCodec, Storefront, StorefrontConfig, SyncError,
};
use tempfile::TempDir;

async fn open_on_disk(root: &std::path::Path) -> Storefront {
    Storefront::open(
        StorefrontConfig::default(),
        Arc::new(FileMedium::new(root.join("local"))),
        Arc::new(JsonFileRemoteStore::<Category>::new(root.join("remote"))),
        Arc::new(JsonFileRemoteStore::<HeroItem>::new(root.join("remote"))),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_storefront_state_survives_restart() {
    let temp_dir = TempDir::new().unwrap();

    // Session 1
    {
        let storefront = open_on_disk(temp_dir.path()).await;
        storefront
            .cart()
            .insert("mug", Product::new("mug", "Mug", 1200))
            .unwrap();
        storefront
            .wishlist()
            .toggle("lamp", Product::new("lamp", "Lamp", 5000))
            .unwrap();

        let categories = storefront.categories();
        for (id, name) in [("new", "New In"), ("sale", "Sale"), ("home", "Home")] {
            assert_eq!(
                categories.insert_at_end(id, Category::new(name)).await.unwrap(),
                AdmissionOutcome::Applied
            );
        }
        assert_eq!(
            categories.reorder("home", Direction::Up).await.unwrap(),
            ReorderOutcome::Applied
        );
        storefront
            .hero()
            .insert_at_end("mug", HeroItem::new("mug", "Morning coffee"))
            .await
            .unwrap();
    }

    // Session 2
    let storefront = open_on_disk(temp_dir.path()).await;
    assert_eq!(storefront.cart().count().unwrap(), 1);
    assert!(storefront.wishlist().contains("lamp").unwrap());

    let ids: Vec<_> = storefront
        .categories()
        .list()
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(ids, vec!["new", "home", "sale"]);
    assert_eq!(storefront.hero().len().unwrap(), 1);
    assert!(temp_dir.path().join("remote").join("categories.json").exists());
}

#[tokio::test]
async fn test_move_to_cart() {
    let storefront = Storefront::open(
        StorefrontConfig::default(),
        Arc::new(MemoryMedium::new()),
        Arc::new(InMemoryRemoteStore::<Category>::new()),
        Arc::new(InMemoryRemoteStore::<HeroItem>::new()),
    )
    .await
    .unwrap();
    let lamp = Product::new("lamp", "Lamp", 5000);
    storefront.cart().insert("lamp", lamp.clone()).unwrap();
    storefront.wishlist().insert("lamp", lamp).unwrap();

    assert!(storefront.move_to_cart("lamp").unwrap());
    assert!(!storefront.move_to_cart("lamp").unwrap());
    assert!(storefront.wishlist().is_empty().unwrap());
    assert_eq!(storefront.cart().get("lamp").unwrap().unwrap().quantity, 2);
}

#[tokio::test]
async fn test_move_to_cart_keeps_wishlist_quantity() {
    let storefront = Storefront::open(
        StorefrontConfig::default(),
        Arc::new(MemoryMedium::new()),
        Arc::new(InMemoryRemoteStore::<Category>::new()),
        Arc::new(InMemoryRemoteStore::<HeroItem>::new()),
    )
    .await
    .unwrap();
    storefront
        .wishlist()
        .insert_with("mug", Product::new("mug", "Mug", 1200), 3, InsertMode::Silent)
        .unwrap();

    assert!(storefront.move_to_cart("mug").unwrap());
    assert_eq!(storefront.cart().count().unwrap(), 3);
    assert_eq!(storefront.cart().total().unwrap(), 3 * 1200);
}

#[tokio::test]
async fn test_notifications_are_shared_across_stores() {
    let storefront = Storefront::open(
        StorefrontConfig::default(),
        Arc::new(MemoryMedium::new()),
        Arc::new(InMemoryRemoteStore::<Category>::new()),
        Arc::new(InMemoryRemoteStore::<HeroItem>::new()),
    )
    .await
    .unwrap();
    let mut rx = storefront.subscribe();

    storefront
        .cart()
        .insert("mug", Product::new("mug", "Mug", 1200))
        .unwrap();
    storefront
        .categories()
        .insert_at_end("sale", Category::new("Sale"))
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        seen.push((notification.collection, notification.kind));
    }
    assert_eq!(
        seen,
        vec![
            ("cart".to_string(), NotificationKind::Added),
            ("cart".to_string(), NotificationKind::Reveal),
            ("categories".to_string(), NotificationKind::Added),
        ]
    );
}

#[tokio::test]
async fn test_open_fails_when_remote_is_unreachable() {
    let categories = Arc::new(InMemoryRemoteStore::<Category>::new());
    categories.fail_loads(true);

    let result = Storefront::open(
        StorefrontConfig::default(),
        Arc::new(MemoryMedium::new()),
        categories,
        Arc::new(InMemoryRemoteStore::<HeroItem>::new()),
    )
    .await;
    assert!(matches!(result, Err(SyncError::Remote(_))));
}

#[test]
fn test_config_from_json() {
    let config = StorefrontConfig::from_json_str(
        r#"{
            "cart": { "namespace": "bag", "codec": "message_pack" },
            "categories": {
                "collection": "nav",
                "capacity": 4,
                "commit_strategy": "sequential"
            }
        }"#,
    )
    .unwrap();

    assert_eq!(config.cart.namespace, "bag");
    assert!(config.cart.reveal_on_insert);
    assert_eq!(config.cart.codec, SnapshotCodec::MessagePack);
    assert_eq!(config.wishlist.namespace, "wishlist");
    assert_eq!(config.categories.collection, "nav");
    assert_eq!(config.categories.capacity, Some(4));
    assert_eq!(config.categories.admission, AdmissionRule::ActiveFlag);
    assert_eq!(config.categories.commit_strategy, CommitStrategy::Sequential);
    assert_eq!(config.hero.admission, AdmissionRule::Membership);
}

#[test]
fn test_config_rejects_shared_namespace() {
    let result = StorefrontConfig::from_json_str(
        r#"{ "cart": { "namespace": "wishlist" } }"#,
    );
    assert!(matches!(result, Err(SyncError::Config(_))));

    let result = StorefrontConfig::from_json_str(r#"{ "hero": { "collection": "categories" } }"#);
    assert!(matches!(result, Err(SyncError::Config(_))));
}

#[test]
fn test_config_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("storefront.json");
    std::fs::write(&path, r#"{ "hero": { "collection": "carousel", "capacity": 3 } }"#).unwrap();

    let config = StorefrontConfig::from_json_file(&path).unwrap();
    assert_eq!(config.hero.collection, "carousel");
    assert_eq!(config.hero.capacity, Some(3));

    let missing = StorefrontConfig::from_json_file(temp_dir.path().join("missing.json"));
    assert!(matches!(missing, Err(SyncError::Config(_))));
}

#[tokio::test]
async fn test_json_file_remote_store_reopens_collections() {
    let temp_dir = TempDir::new().unwrap();
    {
        let remote = JsonFileRemoteStore::<Category>::new(temp_dir.path());
        remote
            .write_many(
                "nav",
                &[
                    OrderedItem::new("b", Category::new("B"), 2).with_active(true),
                    OrderedItem::new("a", Category::new("A"), 1).with_active(false),
                ],
            )
            .await
            .unwrap();
        remote.delete_one("nav", "missing").await.unwrap();
    }

    let remote = JsonFileRemoteStore::<Category>::new(temp_dir.path());
    let items = remote.load("nav").await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(
        remote
            .count("nav", storefront_sync::CountFilter::Active)
            .await
            .unwrap(),
        1
    );
}
