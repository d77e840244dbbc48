use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use supermarket_api::{
    db::{DbPool, create_pool},
    dto::cart::AddToCartRequest,
    error::AppError,
    middleware::auth::AuthUser,
    models::{CartStatus, Role},
    services::{cart_service, order_service},
};

// Integration tests for the cart-to-order path. Each test creates its own
// users and products with unique names, so they can run in parallel against
// one database without clearing tables.

async fn setup_pool() -> Option<DbPool> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests."
            );
            return None;
        }
    };

    let pool = create_pool(&database_url).await.expect("connect");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrate");
    Some(pool)
}

async fn create_user(pool: &DbPool, role: Role) -> AuthUser {
    let id = Uuid::new_v4();
    let tag = &id.to_string()[..8];
    sqlx::query(
        r#"
        INSERT INTO users (id, first_name, last_name, username, email, password_hash, role, status)
        VALUES ($1, 'Test', 'Shopper', $2, $3, 'hash', $4, 'active')
        "#,
    )
    .bind(id)
    .bind(format!("shopper-{tag}"))
    .bind(format!("shopper-{tag}@example.com"))
    .bind(role)
    .execute(pool)
    .await
    .expect("insert user");

    AuthUser { user_id: id, role }
}

async fn create_product(pool: &DbPool, price: &str, stock: i32) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO products (id, name, price, stock, status)
        VALUES ($1, $2, $3, $4, 'active')
        "#,
    )
    .bind(id)
    .bind(format!("Product {id}"))
    .bind(Decimal::from_str(price).unwrap())
    .bind(stock)
    .execute(pool)
    .await
    .expect("insert product");
    id
}

async fn product_stock(pool: &DbPool, id: Uuid) -> i32 {
    let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("select stock");
    stock
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// Full storefront flow: price 2.00, stock 10, add 3, checkout. The order
// freezes the total, stock drops to 7, the cart completes, and the next
// cart read is an empty fresh one.
#[tokio::test]
async fn add_then_checkout_completes_cart_and_decrements_stock() {
    let Some(pool) = setup_pool().await else { return };
    let user = create_user(&pool, Role::User).await;
    let apple = create_product(&pool, "2.00", 10).await;

    cart_service::add_to_cart(
        &pool,
        &user,
        AddToCartRequest {
            product_id: apple,
            quantity: 3,
        },
    )
    .await
    .expect("add to cart");

    let cart = cart_service::get_cart(&pool, &user)
        .await
        .expect("get cart")
        .data
        .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
    assert_eq!(cart.items[0].subtotal, dec("6.00"));
    assert_eq!(cart.total, dec("6.00"));
    let cart_id = cart.cart_id.expect("active cart id");

    let checkout = order_service::checkout(&pool, &user)
        .await
        .expect("checkout")
        .data
        .unwrap();
    assert_eq!(checkout.order.total_amount, dec("6.00"));
    assert_eq!(checkout.items.len(), 1);
    assert_eq!(product_stock(&pool, apple).await, 7);

    let (status,): (CartStatus,) = sqlx::query_as("SELECT status FROM carts WHERE id = $1")
        .bind(cart_id)
        .fetch_one(&pool)
        .await
        .expect("cart status");
    assert_eq!(status, CartStatus::Completed);

    let fresh = cart_service::get_cart(&pool, &user)
        .await
        .expect("get cart")
        .data
        .unwrap();
    assert!(fresh.items.is_empty());
    assert_eq!(fresh.total, Decimal::ZERO);
}

#[tokio::test]
async fn re_adding_a_product_sums_quantities() {
    let Some(pool) = setup_pool().await else { return };
    let user = create_user(&pool, Role::User).await;
    let product = create_product(&pool, "1.50", 10).await;

    for qty in [2, 1] {
        cart_service::add_to_cart(
            &pool,
            &user,
            AddToCartRequest {
                product_id: product,
                quantity: qty,
            },
        )
        .await
        .expect("add to cart");
    }

    let cart = cart_service::get_cart(&pool, &user)
        .await
        .expect("get cart")
        .data
        .unwrap();
    assert_eq!(cart.items.len(), 1, "no duplicate lines");
    assert_eq!(cart.items[0].quantity, 3);
    assert_eq!(cart.total, dec("4.50"));
}

#[tokio::test]
async fn add_beyond_stock_is_rejected_for_the_new_total() {
    let Some(pool) = setup_pool().await else { return };
    let user = create_user(&pool, Role::User).await;
    let product = create_product(&pool, "3.00", 5).await;

    cart_service::add_to_cart(
        &pool,
        &user,
        AddToCartRequest {
            product_id: product,
            quantity: 4,
        },
    )
    .await
    .expect("first add within stock");

    // 4 already in the cart; 2 more would exceed stock 5.
    let err = cart_service::add_to_cart(
        &pool,
        &user,
        AddToCartRequest {
            product_id: product,
            quantity: 2,
        },
    )
    .await
    .expect_err("should exceed stock");
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    let cart = cart_service::get_cart(&pool, &user)
        .await
        .expect("get cart")
        .data
        .unwrap();
    assert_eq!(cart.items[0].quantity, 4, "failed add left cart unchanged");
}

#[tokio::test]
async fn update_quantity_to_zero_removes_the_line() {
    let Some(pool) = setup_pool().await else { return };
    let user = create_user(&pool, Role::User).await;
    let product = create_product(&pool, "2.25", 10).await;

    cart_service::add_to_cart(
        &pool,
        &user,
        AddToCartRequest {
            product_id: product,
            quantity: 2,
        },
    )
    .await
    .expect("add");

    let view = cart_service::update_cart_item(&pool, &user, product, 0)
        .await
        .expect("update to zero")
        .data
        .unwrap();
    assert!(view.items.is_empty());

    // Removing again is idempotent.
    cart_service::remove_from_cart(&pool, &user, product)
        .await
        .expect("idempotent remove");
}

// Round-trip property: add 2, update to 5, checkout. The order reflects the
// final quantity and stock drops by exactly 5.
#[tokio::test]
async fn update_then_checkout_uses_the_final_quantity() {
    let Some(pool) = setup_pool().await else { return };
    let user = create_user(&pool, Role::User).await;
    let product = create_product(&pool, "2.00", 10).await;

    cart_service::add_to_cart(
        &pool,
        &user,
        AddToCartRequest {
            product_id: product,
            quantity: 2,
        },
    )
    .await
    .expect("add");
    cart_service::update_cart_item(&pool, &user, product, 5)
        .await
        .expect("update");

    let checkout = order_service::checkout(&pool, &user)
        .await
        .expect("checkout")
        .data
        .unwrap();
    assert_eq!(checkout.order.total_amount, dec("10.00"));
    assert_eq!(product_stock(&pool, product).await, 5);
}

#[tokio::test]
async fn checkout_with_empty_cart_fails_without_writes() {
    let Some(pool) = setup_pool().await else { return };
    let user = create_user(&pool, Role::User).await;

    let err = order_service::checkout(&pool, &user)
        .await
        .expect_err("no cart at all");
    assert!(matches!(err, AppError::EmptyCart));

    // A cart whose only line was removed is just as empty.
    let product = create_product(&pool, "1.00", 3).await;
    cart_service::add_to_cart(
        &pool,
        &user,
        AddToCartRequest {
            product_id: product,
            quantity: 1,
        },
    )
    .await
    .expect("add");
    cart_service::remove_from_cart(&pool, &user, product)
        .await
        .expect("remove");

    let err = order_service::checkout(&pool, &user)
        .await
        .expect_err("empty cart");
    assert!(matches!(err, AppError::EmptyCart));

    let (orders,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&pool)
        .await
        .expect("count orders");
    assert_eq!(orders, 0);
}

// Stock dropped between add-to-cart and checkout: the whole transaction
// aborts, nothing is decremented and the cart stays active.
#[tokio::test]
async fn checkout_aborts_when_stock_shrank_after_add() {
    let Some(pool) = setup_pool().await else { return };
    let user = create_user(&pool, Role::User).await;
    let scarce = create_product(&pool, "4.00", 6).await;
    let plenty = create_product(&pool, "1.00", 100).await;

    for (product, qty) in [(scarce, 6), (plenty, 2)] {
        cart_service::add_to_cart(
            &pool,
            &user,
            AddToCartRequest {
                product_id: product,
                quantity: qty,
            },
        )
        .await
        .expect("add");
    }

    sqlx::query("UPDATE products SET stock = 5 WHERE id = $1")
        .bind(scarce)
        .execute(&pool)
        .await
        .expect("shrink stock");

    let err = order_service::checkout(&pool, &user)
        .await
        .expect_err("over stock");
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    // No partial decrement on the other line.
    assert_eq!(product_stock(&pool, plenty).await, 100);
    assert_eq!(product_stock(&pool, scarce).await, 5);

    let cart = cart_service::get_cart(&pool, &user)
        .await
        .expect("get cart")
        .data
        .unwrap();
    assert_eq!(cart.items.len(), 2, "cart still active and intact");
}

// Forced race: two carts want 3 each from a stock of 5. Exactly one
// checkout wins; the loser aborts and the winner's decrement survives.
#[tokio::test]
async fn concurrent_checkouts_cannot_oversell() {
    let Some(pool) = setup_pool().await else { return };
    let alice = create_user(&pool, Role::User).await;
    let bob = create_user(&pool, Role::User).await;
    let product = create_product(&pool, "2.50", 5).await;

    for user in [&alice, &bob] {
        cart_service::add_to_cart(
            &pool,
            user,
            AddToCartRequest {
                product_id: product,
                quantity: 3,
            },
        )
        .await
        .expect("add");
    }

    let (first, second) = tokio::join!(
        order_service::checkout(&pool, &alice),
        order_service::checkout(&pool, &bob),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one checkout may win");

    let loser = if first.is_err() { first } else { second };
    assert!(matches!(
        loser.expect_err("loser"),
        AppError::InsufficientStock { .. } | AppError::Conflict(_)
    ));

    assert_eq!(product_stock(&pool, product).await, 2);
}

// The order total is a frozen snapshot; later price changes do not touch it.
#[tokio::test]
async fn order_total_survives_price_changes() {
    let Some(pool) = setup_pool().await else { return };
    let user = create_user(&pool, Role::User).await;
    let product = create_product(&pool, "2.00", 10).await;

    cart_service::add_to_cart(
        &pool,
        &user,
        AddToCartRequest {
            product_id: product,
            quantity: 3,
        },
    )
    .await
    .expect("add");

    let order = order_service::checkout(&pool, &user)
        .await
        .expect("checkout")
        .data
        .unwrap()
        .order;
    assert_eq!(order.total_amount, dec("6.00"));

    sqlx::query("UPDATE products SET price = 9.99 WHERE id = $1")
        .bind(product)
        .execute(&pool)
        .await
        .expect("reprice");

    let fetched = order_service::get_order(&pool, &user, order.id)
        .await
        .expect("get order")
        .data
        .unwrap();
    assert_eq!(fetched.order.total_amount, dec("6.00"));
}
