use futures_util::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use wallet_sync::config::AppConfig;
use wallet_sync::keys::{Seed, generate_mnemonic};
use wallet_sync::price::{CoinPriceKey, CoinPriceSyncManager, PollingSchedulerFactory, WALLET_TAG};
use wallet_sync::provider::HttpProvider;
use wallet_sync::storage::{FileStorage, TransactionFilter};
use wallet_sync::utils::format_token_amount;
use wallet_sync::{Kit, KitParams};

const MNEMONIC_VAR: &str = "WALLET_SYNC_MNEMONIC";

#[tokio::main]
async fn main() {
	if let Err(e) = run().await {
		// the subscriber may not be installed yet if config loading failed
		error!("Wallet sync failed: {}", e);
		eprintln!("wallet-sync: {e}");
		std::process::exit(1);
	}
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
	let config = AppConfig::load(std::env::args().nth(1).map(PathBuf::from).as_deref())?;

	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive("wallet_sync=debug".parse()?)
				.add_directive(config.log_level.parse::<tracing::Level>()?.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting wallet sync service");

	let mnemonic = match std::env::var(MNEMONIC_VAR) {
		Ok(phrase) => phrase,
		Err(_) => {
			info!("{} not set, generating a throwaway wallet", MNEMONIC_VAR);
			generate_mnemonic(12)?
		}
	};
	let seed = Seed::from_mnemonic(&mnemonic, "")?;

	if !HttpProvider::supports(config.network) {
		return Err(format!(
			"network {} is not served by the bundled Horizon provider",
			config.network
		)
		.into());
	}

	let storage = Arc::new(FileStorage::open(&config.data_dir, &config.wallet_id).await?);
	info!("Using wallet file {}", storage.path().display());
	let provider = Arc::new(HttpProvider::new(&config.provider)?);

	let kit = Kit::new(
		KitParams {
			seed,
			network: config.network,
			wallet_id: config.wallet_id.clone(),
			account_path: None,
		},
		storage,
		provider.clone(),
		config.sync.clone(),
	)
	.await?;
	let decimals = config.network.spec().decimals;
	info!("Receive address: {}", kit.address());

	let prices = CoinPriceSyncManager::new(
		Arc::new(
			PollingSchedulerFactory::new(provider.clone(), config.price.poll_interval())
				.with_backoff(provider.retry_policy()),
		),
		config.sync.event_buffer,
	);
	let mut subscriptions = Vec::new();
	for currency in &config.price.currencies {
		let key = CoinPriceKey::new(WALLET_TAG, config.price.coin_uids.iter(), currency.as_str());
		subscriptions.push(prices.subscribe(key));
	}

	kit.start();

	let mut balances = kit.balance_flow();
	let mut states = kit.transactions_sync_state_flow();
	let mut transactions = kit.transactions_flow(TransactionFilter::All);
	let mut price_updates = futures_util::stream::select_all(
		subscriptions
			.into_iter()
			.map(|subscription| {
				let currency = subscription.key().currency_code.clone();
				subscription.into_stream().map(move |map| (currency.clone(), map))
			}),
	);

	loop {
		tokio::select! {
			Some(balance) = balances.next() => {
				if let Some(balance) = balance {
					info!("Balance: {}", format_token_amount(balance.amount, decimals));
				}
			}
			Some(state) = states.next() => info!("Transactions sync: {}", state),
			Some(batch) = transactions.next() => {
				for record in &batch.records {
					info!(
						"{} {} {}",
						if record.is_pending { "pending" } else { "confirmed" },
						record.hash,
						format_token_amount(record.amount, decimals)
					);
				}
			}
			Some((currency, map)) = price_updates.next() => {
				for (coin, price) in map {
					info!("{} = {} {}", coin, price, currency);
				}
			}
			_ = tokio::signal::ctrl_c() => {
				info!("Shutting down");
				break;
			}
		}
	}

	kit.stop();
	Ok(())
}
