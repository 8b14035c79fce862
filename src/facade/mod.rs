mod storefront;

pub use storefront::{Cart, CategoryList, HeroCarousel, Storefront, Wishlist};
