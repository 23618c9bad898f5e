use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    docstore::DocStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    // Opening the document store applies its idempotent table and index
    // definitions as well.
    let _docs = DocStore::open(&config.docstore_path).await?;

    println!("Migrations applied");
    Ok(())
}
