use std::sync::Arc;

use anyhow::Result;
use chrono::{Local, Utc};
use polpo::client::ApiClient;
use polpo::config::Config;
use polpo::logging::init_logging;
use polpo::rates::{current_unit_price, local_now_iso, select_current_product};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    info!("Polpo Octopus Energy Italy client starting up");

    let client = Arc::new(
        ApiClient::from_config(&config)
            .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?,
    );

    if !client.login().await {
        return Err(anyhow::anyhow!("Authentication failed"));
    }
    client.start_auto_refresh();

    let accounts = client.fetch_accounts().await?;
    if accounts.is_empty() {
        return Err(anyhow::anyhow!("No accounts found for these credentials"));
    }

    for account in &accounts {
        info!("Fetching data for account {}", account.number);
        let bundle = match client.fetch_all_data(&account.number).await {
            Ok(bundle) => bundle,
            Err(e) => {
                error!("Failed to fetch data for account {}: {}", account.number, e);
                continue;
            }
        };

        info!(
            "Account {}: {} electricity products, {} gas products, {} devices, {} planned dispatches",
            account.number,
            bundle.products.len(),
            bundle.gas_products.len(),
            bundle.devices.len(),
            bundle.planned_dispatches.len()
        );

        let now_iso = local_now_iso();
        match select_current_product(&bundle.products, &now_iso) {
            Some(product) => {
                let price =
                    current_unit_price(product, Local::now().naive_local(), Utc::now());
                match price {
                    Some(price) => info!(
                        "Current electricity tariff {}: {:.4} EUR/kWh",
                        product.code.as_deref().unwrap_or("unknown"),
                        price
                    ),
                    None => warn!(
                        "No resolvable rate for tariff {}",
                        product.code.as_deref().unwrap_or("unknown")
                    ),
                }
            }
            None => warn!("No currently valid electricity product for account {}", account.number),
        }
    }

    client.stop_auto_refresh();
    Ok(())
}
