mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    AuthSession, FilePart, FileTokenStore, HttpTransport, Order, OrderBook, Product, ProductDraft,
    ProductStore, UndoController, UndoEvent,
};
use shared::domain::{OrderId, OrderStatus, ProductId, ProductStatus};

#[derive(Parser, Debug)]
#[command(name = "admin_cli", about = "Pastry shop admin dashboard client")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session token locally.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Drop the stored session.
    Logout,
    #[command(subcommand)]
    Products(ProductCommand),
    #[command(subcommand)]
    Orders(OrderCommand),
}

#[derive(Subcommand, Debug)]
enum ProductCommand {
    /// List the catalog. Logically deleted products are hidden unless --all.
    List {
        #[arg(long)]
        all: bool,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        stock: u32,
        #[arg(long, default_value = "active")]
        status: String,
        #[arg(long, default_value_t = true)]
        available: bool,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        stock: u32,
        #[arg(long, default_value = "active")]
        status: String,
        #[arg(long, default_value_t = true)]
        available: bool,
    },
    SetStatus {
        id: i64,
        status: String,
    },
    /// Soft-delete a product; the delete can be undone while the countdown runs.
    Delete {
        id: i64,
        /// Undo the delete after this many seconds instead of letting it expire.
        #[arg(long)]
        undo_after: Option<u64>,
    },
    AddImages {
        id: i64,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    RemoveImage {
        id: i64,
        url: String,
    },
}

#[derive(Subcommand, Debug)]
enum OrderCommand {
    List,
    SetStatus {
        id: i64,
        status: String,
    },
    SetPaid {
        id: i64,
        #[arg(long)]
        paid: bool,
    },
    Delete {
        id: i64,
    },
    Stats,
}

struct App {
    session: Arc<AuthSession>,
    products: Arc<ProductStore>,
    orders: Arc<OrderBook>,
    undo: Arc<UndoController>,
}

impl App {
    fn build(settings: &config::Settings) -> Self {
        let store = Arc::new(FileTokenStore::new(settings.session_file.clone()));
        let session = AuthSession::new(settings.api_base_url.clone(), store);
        let transport = HttpTransport::new(settings.api_base_url.clone(), session.clone());
        let products = ProductStore::new(transport.clone());
        let orders = OrderBook::new(transport);
        let undo = UndoController::with_window(
            products.clone(),
            Duration::from_secs(settings.undo_window_seconds),
        );
        Self {
            session,
            products,
            orders,
            undo,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let settings = config::load_settings();
    let app = App::build(&settings);

    match args.command {
        Command::Login { email, password } => {
            app.session.login(&email, &password).await?;
            println!("Logged in as {email}");
        }
        Command::Logout => {
            app.session.logout().await;
            println!("Logged out");
        }
        Command::Products(cmd) => run_product_command(&app, cmd).await?,
        Command::Orders(cmd) => run_order_command(&app, cmd).await?,
    }

    Ok(())
}

async fn run_product_command(app: &App, cmd: ProductCommand) -> Result<()> {
    match cmd {
        ProductCommand::List { all } => {
            app.products.load_all().await?;
            let products = if all {
                app.products.list_all().await
            } else {
                app.products.list_visible().await
            };
            for product in &products {
                print_product(product);
            }
            println!("{} products", products.len());
        }
        ProductCommand::Create {
            name,
            description,
            price,
            stock,
            status,
            available,
        } => {
            let draft = draft_from_args(name, description, price, stock, &status, available)?;
            let product = app.products.create(&draft).await?;
            println!("Created product {}", product.id);
        }
        ProductCommand::Update {
            id,
            name,
            description,
            price,
            stock,
            status,
            available,
        } => {
            app.products.load_all().await?;
            let draft = draft_from_args(name, description, price, stock, &status, available)?;
            let product = app.products.update(ProductId(id), &draft).await?;
            println!("Updated product {}", product.id);
        }
        ProductCommand::SetStatus { id, status } => {
            app.products.load_all().await?;
            let status = parse_product_status(&status)?;
            let product = app.products.set_status(ProductId(id), status).await?;
            println!("Product {} is now {}", product.id, product.status);
        }
        ProductCommand::Delete { id, undo_after } => {
            app.products.load_all().await?;
            run_delete_with_countdown(app, ProductId(id), undo_after).await?;
        }
        ProductCommand::AddImages { id, paths } => {
            app.products.load_all().await?;
            let mut parts = Vec::with_capacity(paths.len());
            for path in &paths {
                parts.push(file_part(path)?);
            }
            let product = app.products.add_images(ProductId(id), parts).await?;
            println!(
                "Product {} now has {} images",
                product.id,
                product.image_urls.len()
            );
        }
        ProductCommand::RemoveImage { id, url } => {
            app.products.load_all().await?;
            let product = app.products.remove_image(ProductId(id), &url).await?;
            println!(
                "Product {} now has {} images",
                product.id,
                product.image_urls.len()
            );
        }
    }
    Ok(())
}

async fn run_order_command(app: &App, cmd: OrderCommand) -> Result<()> {
    match cmd {
        OrderCommand::List => {
            let orders = app.orders.load_all().await?;
            for order in &orders {
                print_order(order);
            }
            println!("{} orders", orders.len());
        }
        OrderCommand::SetStatus { id, status } => {
            app.orders.load_all().await?;
            let status: OrderStatus = status
                .parse()
                .with_context(|| format!("valid order statuses: {}", taxonomy(&OrderStatus::ALL)))?;
            let order = app.orders.update_status(OrderId(id), status).await?;
            println!("Order {} is now {}", order.id, order.status);
        }
        OrderCommand::SetPaid { id, paid } => {
            app.orders.load_all().await?;
            let order = app.orders.set_paid(OrderId(id), paid).await?;
            println!(
                "Order {} marked {}",
                order.id,
                if order.paid { "paid" } else { "unpaid" }
            );
        }
        OrderCommand::Delete { id } => {
            app.orders.load_all().await?;
            app.orders.delete(OrderId(id)).await?;
            println!("Order {id} deleted");
        }
        OrderCommand::Stats => {
            let stats = app.orders.stats().await?;
            println!("Total orders:     {}", stats.total_orders);
            println!("Pending orders:   {}", stats.pending_orders);
            println!("Completed orders: {}", stats.completed_orders);
            println!("Total revenue:    {:.2}", stats.total_revenue);
        }
    }
    Ok(())
}

/// Runs the soft delete and follows the undo countdown until it resolves,
/// optionally cancelling it after `undo_after` seconds.
async fn run_delete_with_countdown(
    app: &App,
    id: ProductId,
    undo_after: Option<u64>,
) -> Result<()> {
    let mut events = app.undo.subscribe();
    let product = app.undo.delete(id).await?;
    println!("Deleted product {}", product.id);

    if let Some(after) = undo_after {
        let undo = app.undo.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(after)).await;
            if let Err(err) = undo.cancel().await {
                eprintln!("undo failed: {err}");
            }
        });
    }

    loop {
        match events.recv().await {
            Ok(UndoEvent::Armed { id, seconds }) => {
                println!("Undo window open for product {id} ({seconds}s)");
            }
            Ok(UndoEvent::Tick { id, remaining }) => {
                println!("Product {id}: {remaining}s left to undo");
            }
            Ok(UndoEvent::Expired { id }) => {
                println!("Delete of product {id} is final");
                break;
            }
            Ok(UndoEvent::Restored { id }) => {
                println!("Product {id} restored");
                break;
            }
            Ok(UndoEvent::RestoreFailed { id, message }) => {
                println!("Could not restore product {id}: {message}");
                break;
            }
            Err(_) => break,
        }
    }
    Ok(())
}

fn draft_from_args(
    name: String,
    description: String,
    price: f64,
    stock: u32,
    status: &str,
    available: bool,
) -> Result<ProductDraft> {
    Ok(ProductDraft {
        name,
        description,
        price,
        stock,
        status: parse_product_status(status)?,
        available,
    })
}

fn parse_product_status(raw: &str) -> Result<ProductStatus> {
    raw.parse().with_context(|| {
        format!(
            "valid product statuses: {}",
            taxonomy(&[ProductStatus::Active, ProductStatus::Inactive])
        )
    })
}

fn taxonomy(statuses: &[impl std::fmt::Display]) -> String {
    statuses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn file_part(path: &PathBuf) -> Result<FilePart> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let mime_type = match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
    .to_string();
    Ok(FilePart {
        filename,
        mime_type: Some(mime_type),
        bytes,
    })
}

fn print_product(product: &Product) {
    println!(
        "#{} {} [{}] {:.2} ({} in stock){}",
        product.id,
        product.name,
        product.status,
        product.price,
        product.stock,
        match product.image_url() {
            Some(url) => format!(" image: {url}"),
            None => String::new(),
        }
    );
}

fn print_order(order: &Order) {
    println!(
        "#{} {} [{}] {:.2} {} {}",
        order.id,
        order.customer,
        order.status,
        order.total,
        if order.paid { "paid" } else { "unpaid" },
        order.items_summary()
    );
}
