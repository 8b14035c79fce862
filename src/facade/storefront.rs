use crate::catalog::{Category, HeroItem, Product};
use crate::config::StorefrontConfig;
use crate::core::Result;
use crate::storage::{LocalMedium, RemoteStore};
use crate::sync::{InsertMode, KeyedCollectionStore, Notification, Notifier, OrderedCollectionStore};
use std::sync::Arc;
use tokio::sync::broadcast;

pub type Cart = KeyedCollectionStore<Product>;
pub type Wishlist = KeyedCollectionStore<Product>;
pub type CategoryList = OrderedCollectionStore<Category>;
pub type HeroCarousel = OrderedCollectionStore<HeroItem>;

/// The storefront's collections, opened together and sharing one
/// notification bus.
///
/// Each store is handed out as an `Arc` so UI components can hold their own
/// handle instead of reaching for shared global state.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use storefront_sync::{
///     Category, HeroItem, InMemoryRemoteStore, MemoryMedium, Product, Storefront, StorefrontConfig,
/// };
///
/// # #[tokio::main]
/// # async fn main() -> storefront_sync::Result<()> {
/// let storefront = Storefront::open(
///     StorefrontConfig::default(),
///     Arc::new(MemoryMedium::new()),
///     Arc::new(InMemoryRemoteStore::<Category>::new()),
///     Arc::new(InMemoryRemoteStore::<HeroItem>::new()),
/// )
/// .await?;
///
/// storefront.cart().insert("sku-1", Product::new("sku-1", "Mug", 1200))?;
/// assert_eq!(storefront.cart().total()?, 1200);
/// # Ok(())
/// # }
/// ```
pub struct Storefront {
    config: StorefrontConfig,
    notifier: Notifier,
    cart: Arc<Cart>,
    wishlist: Arc<Wishlist>,
    categories: Arc<CategoryList>,
    hero: Arc<HeroCarousel>,
}

impl Storefront {
    /// Opens every store. Local collections start empty when their snapshot
    /// cannot be read; a failed remote load is an error.
    pub async fn open(
        config: StorefrontConfig,
        local: Arc<dyn LocalMedium>,
        categories_remote: Arc<dyn RemoteStore<Category>>,
        hero_remote: Arc<dyn RemoteStore<HeroItem>>,
    ) -> Result<Self> {
        config.validate()?;
        let notifier = Notifier::default();

        let cart = KeyedCollectionStore::open_local(
            config.cart.clone(),
            local.clone(),
            notifier.clone(),
        )?;
        let wishlist =
            KeyedCollectionStore::open_local(config.wishlist.clone(), local, notifier.clone())?;

        let categories = OrderedCollectionStore::new(
            config.categories.clone(),
            categories_remote,
            notifier.clone(),
        )?;
        let hero = OrderedCollectionStore::new(config.hero.clone(), hero_remote, notifier.clone())?;
        futures::try_join!(categories.load(), hero.load())?;

        Ok(Self {
            config,
            notifier,
            cart: Arc::new(cart),
            wishlist: Arc::new(wishlist),
            categories: Arc::new(categories),
            hero: Arc::new(hero),
        })
    }

    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    /// Notifications from every store of this storefront.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    pub fn cart(&self) -> &Arc<Cart> {
        &self.cart
    }

    pub fn wishlist(&self) -> &Arc<Wishlist> {
        &self.wishlist
    }

    pub fn categories(&self) -> &Arc<CategoryList> {
        &self.categories
    }

    pub fn hero(&self) -> &Arc<HeroCarousel> {
        &self.hero
    }

    /// Moves a wishlist entry, with its quantity, into the cart.
    pub fn move_to_cart(&self, key: &str) -> Result<bool> {
        let Some(entry) = self.wishlist.get(key)? else {
            return Ok(false);
        };
        self.cart
            .insert_with(key, entry.payload, entry.quantity, InsertMode::Reveal)?;
        self.wishlist.remove(key)?;
        Ok(true)
    }
}
