use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use storefront_sync::{
    Category, Direction, Entry, FileMedium, HeroItem, JsonFileRemoteStore, OrderedItem, Product,
    Storefront, StorefrontConfig,
};
use tokio::sync::broadcast::error::TryRecvError;

#[derive(Parser)]
#[command(name = "storefront-tool")]
#[command(about = "Developer tooling for file-backed storefront collections")]
struct Cli {
    /// Directory holding local snapshots and the remote collection documents
    #[arg(long, default_value = ".storefront")]
    data_dir: PathBuf,

    /// Optional JSON storefront configuration
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },
    Hero {
        #[command(subcommand)]
        action: HeroAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    Add {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: u64,
        #[arg(long)]
        discount: Option<u64>,
        #[arg(long, default_value_t = 1)]
        qty: u32,
    },
    Remove {
        id: String,
    },
    SetQty {
        id: String,
        #[arg(allow_negative_numbers = true)]
        qty: i64,
    },
    List,
    Clear,
}

#[derive(Subcommand)]
enum WishlistAction {
    Toggle {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: u64,
    },
    MoveToCart {
        id: String,
    },
    List,
}

#[derive(Subcommand)]
enum CategoryAction {
    List,
    Add { id: String, name: String },
    Move { id: String, direction: Direction },
    Activate { id: String },
    Deactivate { id: String },
    FixOrder,
}

#[derive(Subcommand)]
enum HeroAction {
    List,
    Add { product_id: String, headline: String },
    Remove { product_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => StorefrontConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => StorefrontConfig::default(),
    };
    let storefront = Storefront::open(
        config,
        Arc::new(FileMedium::new(cli.data_dir.join("local"))),
        Arc::new(JsonFileRemoteStore::<Category>::new(cli.data_dir.join("remote"))),
        Arc::new(JsonFileRemoteStore::<HeroItem>::new(cli.data_dir.join("remote"))),
    )
    .await
    .context("Failed to open storefront")?;
    let mut notifications = storefront.subscribe();

    match cli.command {
        Command::Cart { action } => run_cart(&storefront, action)?,
        Command::Wishlist { action } => run_wishlist(&storefront, action)?,
        Command::Categories { action } => run_categories(&storefront, action).await?,
        Command::Hero { action } => run_hero(&storefront, action).await?,
    }

    loop {
        match notifications.try_recv() {
            Ok(notification) if notification.kind.is_failure() => {
                eprintln!("! {}", notification)
            }
            Ok(notification) => println!("  {}", notification),
            Err(TryRecvError::Lagged(skipped)) => eprintln!("! {} notifications dropped", skipped),
            Err(_) => break,
        }
    }
    Ok(())
}

fn run_cart(storefront: &Storefront, action: CartAction) -> Result<()> {
    let cart = storefront.cart();
    match action {
        CartAction::Add {
            id,
            name,
            price,
            discount,
            qty,
        } => {
            let mut product = Product::new(&id, &name, price);
            product.discounted_price = discount;
            cart.insert_with(&id, product, qty, storefront_sync::InsertMode::Reveal)?;
        }
        CartAction::Remove { id } => {
            if !cart.remove(&id)? {
                println!("'{}' is not in the cart", id);
            }
        }
        CartAction::SetQty { id, qty } => {
            if !cart.set_quantity(&id, qty)? {
                println!("quantity of '{}' unchanged", id);
            }
        }
        CartAction::List => {
            print_entries(&cart.entries()?);
            println!("items: {}  total: {}", cart.count()?, format_price(cart.total()?));
        }
        CartAction::Clear => cart.clear()?,
    }
    Ok(())
}

fn run_wishlist(storefront: &Storefront, action: WishlistAction) -> Result<()> {
    let wishlist = storefront.wishlist();
    match action {
        WishlistAction::Toggle { id, name, price } => {
            let change = wishlist.toggle(&id, Product::new(&id, &name, price))?;
            println!("{:?} '{}'", change, id);
        }
        WishlistAction::MoveToCart { id } => {
            if !storefront.move_to_cart(&id)? {
                return Err(anyhow!("'{}' is not in the wishlist", id));
            }
        }
        WishlistAction::List => print_entries(&wishlist.entries()?),
    }
    Ok(())
}

async fn run_categories(storefront: &Storefront, action: CategoryAction) -> Result<()> {
    let categories = storefront.categories();
    match action {
        CategoryAction::List => print_ordered(&categories.list()?, |c| c.name.clone()),
        CategoryAction::Add { id, name } => {
            let outcome = categories.insert_at_end(&id, Category::new(&name)).await?;
            println!("{:?}", outcome);
        }
        CategoryAction::Move { id, direction } => {
            let outcome = categories.reorder(&id, direction).await?;
            println!("{:?}", outcome);
        }
        CategoryAction::Activate { id } => {
            println!("{:?}", categories.set_admitted(&id, true).await?);
        }
        CategoryAction::Deactivate { id } => {
            println!("{:?}", categories.set_admitted(&id, false).await?);
        }
        CategoryAction::FixOrder => {
            println!("{:?}", categories.fix_sequential_order().await?);
        }
    }
    Ok(())
}

async fn run_hero(storefront: &Storefront, action: HeroAction) -> Result<()> {
    let hero = storefront.hero();
    match action {
        HeroAction::List => print_ordered(&hero.list()?, |h| h.headline.clone()),
        HeroAction::Add {
            product_id,
            headline,
        } => {
            let outcome = hero
                .insert_at_end(&product_id, HeroItem::new(&product_id, &headline))
                .await?;
            println!("{:?}", outcome);
        }
        HeroAction::Remove { product_id } => {
            println!("{:?}", hero.remove_and_compact(&product_id).await?);
        }
    }
    Ok(())
}

fn print_entries(entries: &[Entry<Product>]) {
    for entry in entries {
        println!(
            "{:<16} {:<24} x{:<4} {}",
            entry.key,
            entry.payload.name,
            entry.quantity,
            format_price(storefront_sync::Priced::effective_price(&entry.payload))
        );
    }
}

fn print_ordered<T>(items: &[OrderedItem<T>], label: impl Fn(&T) -> String) {
    for item in items {
        let marker = match item.active {
            Some(true) => "*",
            Some(false) => "-",
            None => " ",
        };
        println!("{:>3} {} {:<16} {}", item.position, marker, item.id, label(&item.payload));
    }
}

fn format_price(minor_units: u64) -> String {
    format!("{}.{:02}", minor_units / 100, minor_units % 100)
}
