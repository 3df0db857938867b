use sqlx::mysql::MySqlPool;

/// Create a small shop schema with foreign keys and seed it when empty
pub async fn setup(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INT PRIMARY KEY AUTO_INCREMENT,
            full_name VARCHAR(255) NOT NULL,
            email VARCHAR(255) UNIQUE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            is_active BOOLEAN DEFAULT true
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INT PRIMARY KEY AUTO_INCREMENT,
            title VARCHAR(255) NOT NULL,
            price DECIMAL(10, 2) NOT NULL,
            stock INT DEFAULT 0,
            category VARCHAR(64)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id INT PRIMARY KEY AUTO_INCREMENT,
            user_id INT,
            status VARCHAR(32) DEFAULT 'pending',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Composite key, both halves reference other tables
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS order_items (
            order_id INT NOT NULL,
            product_id INT NOT NULL,
            quantity INT NOT NULL,
            PRIMARY KEY (order_id, product_id),
            FOREIGN KEY (order_id) REFERENCES orders(id),
            FOREIGN KEY (product_id) REFERENCES products(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    seed_sample_data(pool).await
}

async fn seed_sample_data(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    let user_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    if user_count.0 > 0 {
        // Data already seeded
        return Ok(());
    }

    let first_names = ["Alice", "Bob", "Charlie", "Diana", "Evan", "Fiona", "George", "Hannah"];
    let last_names = ["Johnson", "Smith", "Brown", "Prince", "Davis", "Wilson", "Taylor", "Anderson"];

    for index in 0..50 {
        let first = first_names[index % first_names.len()];
        let last = last_names[(index / first_names.len()) % last_names.len()];
        sqlx::query("INSERT INTO users (full_name, email, is_active) VALUES (?, ?, ?)")
            .bind(format!("{} {}", first, last))
            .bind(format!("{}.{}{}@example.com", first.to_lowercase(), last.to_lowercase(), index))
            .bind(index % 5 != 0)
            .execute(pool)
            .await?;
    }

    let categories = ["Electronics", "Furniture", "Stationery", "Books", "Kitchen"];
    let product_types = ["Laptop", "Chair", "Notebook", "Lamp", "Kettle", "Desk", "Pen", "Shelf"];

    for index in 0..40 {
        let product_type = product_types[index % product_types.len()];
        sqlx::query("INSERT INTO products (title, price, stock, category) VALUES (?, ?, ?, ?)")
            .bind(format!("{} {}", product_type, index + 1))
            .bind(format!("{:.2}", 5.99 + index as f64 * 12.5))
            .bind(((index * 7 + 5) % 500) as i32)
            .bind(categories[index % categories.len()])
            .execute(pool)
            .await?;
    }

    let statuses = ["pending", "processing", "shipped", "completed", "cancelled"];

    for index in 0..200 {
        sqlx::query("INSERT INTO orders (user_id, status) VALUES (?, ?)")
            .bind(((index % 50) + 1) as i32)
            .bind(statuses[index % statuses.len()])
            .execute(pool)
            .await?;

        sqlx::query("INSERT INTO order_items (order_id, product_id, quantity) VALUES (?, ?, ?)")
            .bind((index + 1) as i32)
            .bind(((index % 40) + 1) as i32)
            .bind(((index % 10) + 1) as i32)
            .execute(pool)
            .await?;
    }

    tracing::info!("sample data seeded: 50 users, 40 products, 200 orders");
    Ok(())
}
