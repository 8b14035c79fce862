//! Integration tests for keyed collections (cart, wishlist) and their local
//! snapshots.

use std::sync::Arc;
use storefront_sync::{
    FileMedium, FilterCriteria, FilterPipeline, InsertMode, KeyedChange, KeyedCollectionStore,
    KeyedStoreConfig, LocalMedium, MemoryMedium, NotificationKind, Notifier, Product,
    SnapshotCodec, SyncError,
};
use tempfile::TempDir;
use tokio::sync::broadcast;

struct BrokenMedium;

impl LocalMedium for BrokenMedium {
    fn get(&self, namespace: &str) -> storefront_sync::Result<Option<Vec<u8>>> {
        Err(SyncError::Medium(format!("'{}' unreadable", namespace)))
    }

    fn set(&self, namespace: &str, _bytes: &[u8]) -> storefront_sync::Result<()> {
        Err(SyncError::Medium(format!("'{}' is read-only", namespace)))
    }

    fn remove(&self, namespace: &str) -> storefront_sync::Result<()> {
        Err(SyncError::Medium(format!("'{}' is read-only", namespace)))
    }
}

fn cart_over(medium: Arc<dyn LocalMedium>) -> KeyedCollectionStore<Product> {
    KeyedCollectionStore::open_local(KeyedStoreConfig::new("cart"), medium, Notifier::default())
        .unwrap()
}

fn mug() -> Product {
    Product::new("mug", "Mug", 1200)
}

fn kinds(rx: &mut broadcast::Receiver<storefront_sync::Notification>) -> Vec<NotificationKind> {
    let mut kinds = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        kinds.push(notification.kind);
    }
    kinds
}

#[test]
fn test_insert_merges_by_key() {
    let cart = cart_over(Arc::new(MemoryMedium::new()));

    assert_eq!(cart.insert("mug", mug()).unwrap(), KeyedChange::Added);
    assert_eq!(cart.insert("mug", mug()).unwrap(), KeyedChange::Updated);
    cart.insert_with("mug", mug(), 3, InsertMode::Silent).unwrap();

    assert_eq!(cart.len().unwrap(), 1);
    assert_eq!(cart.count().unwrap(), 5);
    assert_eq!(cart.get("mug").unwrap().unwrap().quantity, 5);
}

#[test]
fn test_merge_keeps_existing_payload() {
    let cart = cart_over(Arc::new(MemoryMedium::new()));
    cart.insert("mug", mug()).unwrap();
    cart.insert("mug", Product::new("mug", "Renamed", 1)).unwrap();

    let entry = cart.get("mug").unwrap().unwrap();
    assert_eq!(entry.payload.name, "Mug");
    assert_eq!(entry.payload.price, 1200);
}

#[test]
fn test_rejects_blank_key_and_zero_quantity() {
    let cart = cart_over(Arc::new(MemoryMedium::new()));

    assert!(matches!(
        cart.insert("  ", mug()),
        Err(SyncError::InvalidKey(_))
    ));
    assert!(matches!(
        cart.insert_with("mug", mug(), 0, InsertMode::Reveal),
        Err(SyncError::InvalidQuantity { quantity: 0, .. })
    ));
    assert!(cart.is_empty().unwrap());
}

#[test]
fn test_quantity_never_drops_below_one() {
    let cart = cart_over(Arc::new(MemoryMedium::new()));
    cart.insert_with("mug", mug(), 2, InsertMode::Silent).unwrap();

    assert!(!cart.set_quantity("mug", 0).unwrap());
    assert!(!cart.set_quantity("mug", -4).unwrap());
    assert_eq!(cart.get("mug").unwrap().unwrap().quantity, 2);

    assert!(cart.set_quantity("mug", 7).unwrap());
    assert!(!cart.set_quantity("mug", 7).unwrap());
    assert!(!cart.set_quantity("missing", 3).unwrap());
    assert_eq!(cart.count().unwrap(), 7);
}

#[test]
fn test_total_uses_discounted_price_when_set() {
    let cart = cart_over(Arc::new(MemoryMedium::new()));
    cart.insert_with("mug", mug(), 2, InsertMode::Silent).unwrap();
    cart.insert_with(
        "lamp",
        Product::new("lamp", "Lamp", 5000).with_discount(3999),
        1,
        InsertMode::Silent,
    )
    .unwrap();
    // A zero discount means "no discount".
    cart.insert(
        "pen",
        Product::new("pen", "Pen", 250).with_discount(0),
    )
    .unwrap();

    assert_eq!(cart.total().unwrap(), 2 * 1200 + 3999 + 250);
    assert_eq!(cart.count().unwrap(), 4);
}

#[test]
fn test_remove_and_toggle() {
    let wishlist = cart_over(Arc::new(MemoryMedium::new()));

    assert_eq!(wishlist.toggle("mug", mug()).unwrap(), KeyedChange::Added);
    assert!(wishlist.contains("mug").unwrap());
    assert_eq!(wishlist.toggle("mug", mug()).unwrap(), KeyedChange::Removed);
    assert!(!wishlist.contains("mug").unwrap());

    assert!(!wishlist.remove("mug").unwrap());
}

#[test]
fn test_entries_keep_insertion_order() {
    let cart = cart_over(Arc::new(MemoryMedium::new()));
    for key in ["c", "a", "b"] {
        cart.insert(key, Product::new(key, key, 100)).unwrap();
    }
    cart.insert("c", Product::new("c", "c", 100)).unwrap();
    cart.remove("a").unwrap();

    let keys: Vec<_> = cart.entries().unwrap().into_iter().map(|e| e.key).collect();
    assert_eq!(keys, vec!["c", "b"]);
}

#[test]
fn test_snapshot_survives_reopen_on_disk() {
    let temp_dir = TempDir::new().unwrap();

    // Session 1
    {
        let cart = cart_over(Arc::new(FileMedium::new(temp_dir.path())));
        cart.insert_with("mug", mug(), 2, InsertMode::Silent).unwrap();
        cart.insert("lamp", Product::new("lamp", "Lamp", 5000)).unwrap();
    }

    // Session 2
    let cart = cart_over(Arc::new(FileMedium::new(temp_dir.path())));
    assert_eq!(cart.len().unwrap(), 2);
    assert_eq!(cart.count().unwrap(), 3);
    assert_eq!(cart.total().unwrap(), 2 * 1200 + 5000);
    assert!(cart.version().unwrap() >= 2);
    assert!(temp_dir.path().join("cart.snapshot").exists());
}

#[test]
fn test_messagepack_snapshot_survives_reopen() {
    let medium: Arc<dyn LocalMedium> = Arc::new(MemoryMedium::new());
    let config = KeyedStoreConfig::new("wishlist").codec(SnapshotCodec::MessagePack);

    let first =
        KeyedCollectionStore::open_local(config.clone(), medium.clone(), Notifier::default())
            .unwrap();
    first.insert("mug", mug()).unwrap();
    drop(first);

    let second: KeyedCollectionStore<Product> =
        KeyedCollectionStore::open_local(config, medium, Notifier::default()).unwrap();
    assert_eq!(second.get("mug").unwrap().unwrap().payload, mug());
}

#[test]
fn test_clear_erases_durable_snapshot() {
    let medium = Arc::new(MemoryMedium::new());
    let cart = cart_over(medium.clone());
    cart.insert("mug", mug()).unwrap();
    assert!(medium.contains("cart"));

    cart.clear().unwrap();
    assert!(cart.is_empty().unwrap());
    assert!(!medium.contains("cart"));

    let reopened = cart_over(medium);
    assert!(reopened.is_empty().unwrap());
}

#[test]
fn test_corrupt_snapshot_starts_empty() {
    let medium = Arc::new(MemoryMedium::new());
    medium.set("cart", b"{not json").unwrap();

    let cart = cart_over(medium);
    assert!(cart.is_empty().unwrap());
    cart.insert("mug", mug()).unwrap();
    assert_eq!(cart.count().unwrap(), 1);
}

#[test]
fn test_broken_medium_never_fails_mutations() {
    let cart = cart_over(Arc::new(BrokenMedium));

    cart.insert("mug", mug()).unwrap();
    cart.set_quantity("mug", 4).unwrap();
    cart.clear().unwrap();
    cart.insert("mug", mug()).unwrap();

    assert_eq!(cart.count().unwrap(), 1);
}

#[test]
fn test_reveal_follows_mode_and_config() {
    let notifier = Notifier::default();
    let mut rx = notifier.subscribe();
    let medium: Arc<dyn LocalMedium> = Arc::new(MemoryMedium::new());
    let cart: KeyedCollectionStore<Product> = KeyedCollectionStore::open_local(
        KeyedStoreConfig::new("cart"),
        medium.clone(),
        notifier.clone(),
    )
    .unwrap();
    let wishlist: KeyedCollectionStore<Product> = KeyedCollectionStore::open_local(
        KeyedStoreConfig::new("wishlist").reveal_on_insert(false),
        medium,
        notifier,
    )
    .unwrap();

    cart.insert("mug", mug()).unwrap();
    assert_eq!(
        kinds(&mut rx),
        vec![NotificationKind::Added, NotificationKind::Reveal]
    );

    cart.insert_with("mug", mug(), 1, InsertMode::Silent).unwrap();
    assert_eq!(kinds(&mut rx), vec![NotificationKind::Updated]);

    wishlist.insert("mug", mug()).unwrap();
    assert_eq!(kinds(&mut rx), vec![NotificationKind::Added]);

    cart.remove("missing").unwrap();
    assert!(kinds(&mut rx).is_empty());

    cart.clear().unwrap();
    assert_eq!(kinds(&mut rx), vec![NotificationKind::Cleared]);
}

#[test]
fn test_filter_pipeline_polls_only_on_change() {
    let cart = cart_over(Arc::new(MemoryMedium::new()));
    cart.insert(
        "lamp",
        Product::new("lamp", "Desk Lamp", 5000)
            .in_category("lighting")
            .with_stock(3),
    )
    .unwrap();
    cart.insert(
        "bulb",
        Product::new("bulb", "LED Bulb", 400)
            .in_category("lighting")
            .with_stock(0),
    )
    .unwrap();
    cart.insert("mug", mug().in_category("kitchen").with_stock(10))
        .unwrap();

    let mut pipeline = FilterPipeline::new(FilterCriteria::new().category("lighting"));
    let view = pipeline.poll(&cart).unwrap().unwrap();
    assert_eq!(view.len(), 2);
    assert!(pipeline.poll(&cart).unwrap().is_none());

    pipeline.configure(FilterCriteria::new().category("lighting").in_stock_only());
    let view = pipeline.poll(&cart).unwrap().unwrap();
    let keys: Vec<_> = view.into_iter().map(|e| e.key).collect();
    assert_eq!(keys, vec!["lamp"]);

    cart.remove("lamp").unwrap();
    assert!(pipeline.poll(&cart).unwrap().unwrap().is_empty());
}
