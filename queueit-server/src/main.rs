use std::{env, sync::Arc};

use colored::Colorize;
use log::{error, info};
use queueit_collab::{Coordinator, PgDatabase, SpotifyCatalog};
use queueit_server::logging;

#[tokio::main]
async fn main() {
    logging::init_logger();

    let database_url = match env::var("QUEUEIT_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            error!(
                "{} Set QUEUEIT_DATABASE_URL to a postgres connection string.",
                "Missing database url!".bold().red()
            );
            return;
        }
    };

    info!("Connecting to database...");

    let database = match PgDatabase::new(&database_url).await {
        Ok(database) => Arc::new(database),
        Err(e) => {
            error!(
                "{} Make sure the postgres instance is running and reachable, then try again.",
                "Failed to connect to database!".bold().red()
            );
            error!("{}", e);
            return;
        }
    };

    let coordinator = Arc::new(Coordinator::new(database));
    let catalog = Arc::new(SpotifyCatalog::from_env());

    info!("Initialized successfully.");
    queueit_server::run_server(coordinator, catalog).await;
}
