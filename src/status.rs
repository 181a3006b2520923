//! Index status summary for the CLI.

use anyhow::Result;

use crate::cache;
use crate::config::Config;
use crate::db;
use crate::pipeline::{self, ImportState};
use crate::registry;
use crate::store;

pub async fn run_status(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let state = match pipeline::import_state(&pool).await? {
        ImportState::Ready => "ready",
        ImportState::Importing => "importing",
    };
    let sources = registry::count_sources(&pool).await?;
    let chunks = store::count_chunks(&pool).await?;
    let cached = cache::count_entries(&pool).await?;

    println!("state:          {}", state);
    println!("sources:        {}", sources);
    println!("chunks:         {}", chunks);
    println!("cached queries: {}", cached);

    pool.close().await;
    Ok(())
}
