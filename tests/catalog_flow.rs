use chrono::Utc;
use storefront_api::docstore::{
    DocStore, RepoError,
    admins::AdminDoc,
    products::{ProductDoc, ProductPatch, SearchFilter},
};

fn doc(sku: &str, name: &str, price: f64, category: &str, stock: i64) -> ProductDoc {
    let now = Utc::now();
    ProductDoc {
        id: None,
        sku: sku.to_string(),
        name: name.to_string(),
        price,
        category: category.to_string(),
        stock,
        image: None,
        description: None,
        created_at: now,
        updated_at: now,
    }
}

async fn seeded_store() -> anyhow::Result<DocStore> {
    let store = DocStore::open_memory().await?;
    let repo = store.products();
    repo.create(doc("SKU-HOODIE", "Axum Hoodie", 59.99, "apparel", 50))
        .await?;
    repo.create(doc("SKU-TEE", "Borrow Checker Tee", 24.99, "apparel", 80))
        .await?;
    repo.create(doc("SKU-MUG", "Ferris Mug", 14.50, "drinkware", 100))
        .await?;
    repo.create(doc("SKU-STICKER", "Rust Sticker Pack", 4.99, "accessories", 200))
        .await?;
    Ok(store)
}

#[tokio::test]
async fn search_matches_name_and_sku_case_insensitively() -> anyhow::Result<()> {
    let store = seeded_store().await?;
    let repo = store.products();

    let (hits, total) = repo
        .search(&SearchFilter {
            text: Some("FERRIS".to_string()),
            limit: 10,
            ..Default::default()
        })
        .await?;
    assert_eq!(total, 1);
    assert_eq!(hits[0].name, "Ferris Mug");

    let (hits, total) = repo
        .search(&SearchFilter {
            text: Some("sku-t".to_string()),
            limit: 10,
            ..Default::default()
        })
        .await?;
    assert_eq!(total, 1);
    assert_eq!(hits[0].sku, "SKU-TEE");
    Ok(())
}

#[tokio::test]
async fn search_orders_by_price_and_pages_in_memory() -> anyhow::Result<()> {
    let store = seeded_store().await?;
    let repo = store.products();

    let (page_one, total) = repo
        .search(&SearchFilter {
            ascending: true,
            limit: 2,
            ..Default::default()
        })
        .await?;
    assert_eq!(total, 4);
    let prices: Vec<f64> = page_one.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![4.99, 14.50]);

    let (page_two, _) = repo
        .search(&SearchFilter {
            ascending: true,
            offset: 2,
            limit: 2,
            ..Default::default()
        })
        .await?;
    let prices: Vec<f64> = page_two.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![24.99, 59.99]);

    let (descending, _) = repo
        .search(&SearchFilter {
            limit: 1,
            ..Default::default()
        })
        .await?;
    assert_eq!(descending[0].price, 59.99);

    // A page past the end is empty, but the total still counts every match.
    let (beyond, total) = repo
        .search(&SearchFilter {
            offset: 10,
            limit: 10,
            ..Default::default()
        })
        .await?;
    assert!(beyond.is_empty());
    assert_eq!(total, 4);
    Ok(())
}

#[tokio::test]
async fn search_filters_by_category() -> anyhow::Result<()> {
    let store = seeded_store().await?;
    let repo = store.products();

    let (hits, total) = repo
        .search(&SearchFilter {
            category: Some("apparel".to_string()),
            limit: 10,
            ..Default::default()
        })
        .await?;
    assert_eq!(total, 2);
    assert!(hits.iter().all(|p| p.category == "apparel"));

    let (hits, total) = repo
        .search(&SearchFilter {
            text: Some("tee".to_string()),
            category: Some("apparel".to_string()),
            limit: 10,
            ..Default::default()
        })
        .await?;
    assert_eq!(total, 1);
    assert_eq!(hits[0].sku, "SKU-TEE");
    Ok(())
}

#[tokio::test]
async fn categories_are_distinct_and_sorted() -> anyhow::Result<()> {
    let store = seeded_store().await?;
    let categories = store.products().categories().await?;
    assert_eq!(categories, vec!["accessories", "apparel", "drinkware"]);
    Ok(())
}

#[tokio::test]
async fn category_summary_reports_price_stats() -> anyhow::Result<()> {
    let store = seeded_store().await?;
    let summary = store.products().category_summary().await?;

    assert_eq!(summary.len(), 3);
    assert_eq!(summary[0].category, "accessories");

    let apparel = summary
        .iter()
        .find(|s| s.category == "apparel")
        .expect("apparel summary");
    assert_eq!(apparel.count, 2);
    assert_eq!(apparel.min_price, 24.99);
    assert_eq!(apparel.max_price, 59.99);
    assert!((apparel.avg_price - 42.49).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn duplicate_sku_is_rejected() -> anyhow::Result<()> {
    let store = seeded_store().await?;
    let err = store
        .products()
        .create(doc("SKU-MUG", "Another Mug", 9.99, "drinkware", 10))
        .await
        .expect_err("duplicate sku must fail");
    assert!(matches!(err, RepoError::Duplicate(_)));
    Ok(())
}

#[tokio::test]
async fn guarded_decrement_never_oversells() -> anyhow::Result<()> {
    let store = DocStore::open_memory().await?;
    let repo = store.products();
    let created = repo
        .create(doc("SKU-SCARCE", "Limited Widget", 10.0, "gadgets", 5))
        .await?;
    let id = created.id.as_ref().expect("record id").to_string();

    assert!(repo.try_decrement_stock(&id, 3).await?);
    let after = repo.find_by_id(&id).await?.expect("product");
    assert_eq!(after.stock, 2);

    // More than what is left: the guard refuses and stock is untouched.
    assert!(!repo.try_decrement_stock(&id, 4).await?);
    let after = repo.find_by_id(&id).await?.expect("product");
    assert_eq!(after.stock, 2);

    assert!(!repo.try_decrement_stock("product:doesnotexist", 1).await?);
    assert!(!repo.try_decrement_stock("admin:wrongtable", 1).await?);
    Ok(())
}

#[tokio::test]
async fn malformed_ids_resolve_like_missing_records() -> anyhow::Result<()> {
    let store = seeded_store().await?;
    let repo = store.products();

    assert!(repo.find_by_id("").await?.is_none());
    assert!(repo.find_by_id("admin:123").await?.is_none());
    assert!(repo.find_by_id("nonexistent-key").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn update_patches_only_given_fields() -> anyhow::Result<()> {
    let store = seeded_store().await?;
    let repo = store.products();
    let hoodie = repo.find_by_sku("SKU-HOODIE").await?.expect("hoodie");
    let id = hoodie.id.as_ref().expect("record id").to_string();

    let updated = repo
        .update(
            &id,
            ProductPatch {
                price: Some(49.99),
                stock: Some(7),
                ..Default::default()
            },
        )
        .await?
        .expect("updated product");

    assert_eq!(updated.price, 49.99);
    assert_eq!(updated.stock, 7);
    assert_eq!(updated.name, "Axum Hoodie");
    assert_eq!(updated.sku, "SKU-HOODIE");
    assert!(updated.updated_at >= hoodie.updated_at);
    Ok(())
}

#[tokio::test]
async fn delete_returns_removed_doc() -> anyhow::Result<()> {
    let store = seeded_store().await?;
    let repo = store.products();
    let sticker = repo.find_by_sku("SKU-STICKER").await?.expect("sticker");
    let id = sticker.id.as_ref().expect("record id").to_string();

    let removed = repo.delete(&id).await?.expect("removed product");
    assert_eq!(removed.sku, "SKU-STICKER");

    assert!(repo.delete(&id).await?.is_none());
    assert!(repo.find_by_id(&id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn admin_email_is_unique_and_login_time_updates() -> anyhow::Result<()> {
    let store = DocStore::open_memory().await?;
    let repo = store.admins();

    let admin = repo
        .create(AdminDoc {
            id: None,
            name: "Store Admin".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: "admin".to_string(),
            permissions: vec!["products:write".to_string()],
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
        })
        .await?;

    let err = repo
        .create(AdminDoc {
            id: None,
            name: "Impostor".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: "admin".to_string(),
            permissions: vec![],
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
        })
        .await
        .expect_err("duplicate email must fail");
    assert!(matches!(err, RepoError::Duplicate(_)));

    let id = admin.id.as_ref().expect("record id").to_string();
    repo.touch_last_login(&id).await?;
    let refreshed = repo.find_by_id(&id).await?.expect("admin");
    assert!(refreshed.last_login.is_some());
    Ok(())
}
