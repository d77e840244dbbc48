use uuid::Uuid;

use supermarket_api::{
    config::AppConfig,
    db::{DbPool, create_pool},
    dto::{
        auth::{LoginRequest, RegisterRequest},
        cart::AddToCartRequest,
        users::{CreateUserRequest, UpdateUserStatusRequest},
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{Role, UserStatus},
    routes::params::{LowStockQuery, SalesReportQuery},
    services::{admin_service, auth_service, cart_service, inventory_service, report_service},
    state::AppState,
};

async fn setup_state() -> Option<AppState> {
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

    let pool: DbPool = create_pool(&database_url).await.expect("connect");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrate");

    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "integration-test-secret".into(),
    };
    Some(AppState { pool, config })
}

async fn create_admin(state: &AppState) -> AuthUser {
    let id = Uuid::new_v4();
    let tag = &id.to_string()[..8];
    sqlx::query(
        r#"
        INSERT INTO users (id, first_name, last_name, username, email, password_hash, role, status)
        VALUES ($1, 'Store', 'Admin', $2, $3, 'hash', 'admin', 'active')
        "#,
    )
    .bind(id)
    .bind(format!("admin-{tag}"))
    .bind(format!("admin-{tag}@example.com"))
    .execute(&state.pool)
    .await
    .expect("insert admin");

    AuthUser {
        user_id: id,
        role: Role::Admin,
    }
}

fn unique_email() -> String {
    format!("user-{}@example.com", &Uuid::new_v4().to_string()[..8])
}

#[tokio::test]
async fn register_login_and_disabled_account() {
    let Some(state) = setup_state().await else { return };
    let admin = create_admin(&state).await;
    let email = unique_email();

    let user = auth_service::register_user(
        &state,
        RegisterRequest {
            first_name: "Pat".into(),
            last_name: "Shopper".into(),
            email: email.clone(),
            password: "a-strong-password".into(),
        },
    )
    .await
    .expect("register")
    .data
    .unwrap();
    assert_eq!(user.role, Role::User);
    assert_eq!(user.status, UserStatus::Active);

    // Self-signup uses the email as username.
    let login = auth_service::login_user(
        &state,
        LoginRequest {
            username: email.clone(),
            password: "a-strong-password".into(),
        },
    )
    .await
    .expect("login")
    .data
    .unwrap();
    assert!(login.token.starts_with("Bearer "));

    let err = auth_service::login_user(
        &state,
        LoginRequest {
            username: email.clone(),
            password: "wrong-password".into(),
        },
    )
    .await
    .expect_err("wrong password");
    assert!(matches!(err, AppError::InvalidCredentials));

    admin_service::set_user_status(
        &state.pool,
        &admin,
        user.id,
        UpdateUserStatusRequest {
            status: UserStatus::Inactive,
        },
    )
    .await
    .expect("disable");

    let err = auth_service::login_user(
        &state,
        LoginRequest {
            username: email,
            password: "a-strong-password".into(),
        },
    )
    .await
    .expect_err("disabled account");
    assert!(matches!(err, AppError::AccountDisabled));
}

#[tokio::test]
async fn non_admin_is_forbidden_from_admin_surface() {
    let Some(state) = setup_state().await else { return };
    let shopper = AuthUser {
        user_id: Uuid::new_v4(),
        role: Role::User,
    };

    let err = inventory_service::list_low_stock(
        &state.pool,
        &shopper,
        LowStockQuery {
            page: None,
            per_page: None,
            threshold: None,
        },
    )
    .await
    .expect_err("not an admin");
    assert!(matches!(err, AppError::Forbidden));

    let err = report_service::sales_report(
        &state.pool,
        &shopper,
        SalesReportQuery {
            from: None,
            to: None,
        },
    )
    .await
    .expect_err("not an admin");
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn product_delete_is_blocked_while_carted() {
    let Some(state) = setup_state().await else { return };
    let admin = create_admin(&state).await;

    let product = inventory_service::create_product(
        &state.pool,
        &admin,
        supermarket_api::dto::products::CreateProductRequest {
            name: format!("Blocked Widget {}", Uuid::new_v4()),
            price: "4.99".parse().unwrap(),
            stock: 10,
            image: None,
        },
    )
    .await
    .expect("create product")
    .data
    .unwrap();

    let shopper = {
        let id = Uuid::new_v4();
        let tag = &id.to_string()[..8];
        sqlx::query(
            r#"
            INSERT INTO users (id, first_name, last_name, username, email, password_hash, role, status)
            VALUES ($1, 'Cart', 'Holder', $2, $3, 'hash', 'user', 'active')
            "#,
        )
        .bind(id)
        .bind(format!("holder-{tag}"))
        .bind(format!("holder-{tag}@example.com"))
        .execute(&state.pool)
        .await
        .expect("insert shopper");
        AuthUser {
            user_id: id,
            role: Role::User,
        }
    };

    cart_service::add_to_cart(
        &state.pool,
        &shopper,
        AddToCartRequest {
            product_id: product.id,
            quantity: 1,
        },
    )
    .await
    .expect("add to cart");

    let err = inventory_service::delete_product(&state.pool, &admin, product.id)
        .await
        .expect_err("referenced by a cart");
    assert!(matches!(err, AppError::Conflict(_)));

    cart_service::remove_from_cart(&state.pool, &shopper, product.id)
        .await
        .expect("remove");
    inventory_service::delete_product(&state.pool, &admin, product.id)
        .await
        .expect("deletable once unreferenced");
}

#[tokio::test]
async fn admin_user_lifecycle_and_delete_block() {
    let Some(state) = setup_state().await else { return };
    let admin = create_admin(&state).await;
    let email = unique_email();

    let created = admin_service::create_user(
        &state.pool,
        &admin,
        CreateUserRequest {
            first_name: "New".into(),
            last_name: "Clerk".into(),
            email: email.clone(),
            role: Role::User,
            password: None,
        },
    )
    .await
    .expect("create user")
    .data
    .unwrap();
    // Admin-added accounts get the email local part as username.
    assert_eq!(created.username, email.split('@').next().unwrap());

    // Default password works until reset.
    let login = auth_service::login_user(
        &state,
        LoginRequest {
            username: created.username.clone(),
            password: "password123".into(),
        },
    )
    .await
    .expect("default password login");
    assert!(login.data.is_some());

    // A user with cart history cannot be hard-deleted.
    let product = inventory_service::create_product(
        &state.pool,
        &admin,
        supermarket_api::dto::products::CreateProductRequest {
            name: format!("History Widget {}", Uuid::new_v4()),
            price: "1.00".parse().unwrap(),
            stock: 5,
            image: None,
        },
    )
    .await
    .expect("create product")
    .data
    .unwrap();
    let as_user = AuthUser {
        user_id: created.id,
        role: Role::User,
    };
    cart_service::add_to_cart(
        &state.pool,
        &as_user,
        AddToCartRequest {
            product_id: product.id,
            quantity: 1,
        },
    )
    .await
    .expect("add to cart");

    let err = admin_service::delete_user(&state.pool, &admin, created.id)
        .await
        .expect_err("has cart history");
    assert!(matches!(err, AppError::Conflict(_)));
}
