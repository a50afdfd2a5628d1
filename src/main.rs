//! tap-pay terminal CLI.
//!
//! ```text
//! card file ─▶ card::read_card ─▶ PIN prompt ─▶ PaymentFlow::prepare
//!                                                   │
//!                                      preview ◀────┘
//!                                         │ confirm
//!                                         ▼
//!                              PaymentFlow::confirm ─▶ receipt
//! ```

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

use tap_pay::blockchain::{Transfer, Wallet};
use tap_pay::card::{read_card, FileCardReader};
use tap_pay::config::{load_config, ConfigError, PayConfig};
use tap_pay::lifecycle::{spawn_ctrl_c_handler, Shutdown};
use tap_pay::observability::logging::init_logging;
use tap_pay::oracle::{PriceAggregator, PriceAsset};
use tap_pay::payments::{format_amount, PaymentError, PaymentFlow, PaymentPreview, TransactionIntent};
use tap_pay::secret::{Pin, SecretResolver};

#[derive(Parser)]
#[command(name = "tap-pay")]
#[command(about = "Tap-to-pay terminal for EVM chains", long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "config/tap-pay.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a card, preview and send a payment
    Pay {
        #[arg(short, long)]
        network: String,
        /// `native` or a configured token key
        #[arg(short, long, default_value = "native")]
        asset: String,
        #[arg(short = 'm', long)]
        amount: String,
        /// Recipient address or ENS name (defaults to the merchant)
        #[arg(long)]
        to: Option<String>,
        /// File holding the card payload
        #[arg(long)]
        card: PathBuf,
        /// Tag identifier for payloads without a serial
        #[arg(long)]
        tag_id: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show native and token balances
    Balance {
        #[arg(short, long)]
        network: String,
        #[arg(long, conflicts_with = "card")]
        address: Option<Address>,
        #[arg(long)]
        card: Option<PathBuf>,
        #[arg(long)]
        tag_id: Option<String>,
    },
    /// Show USD prices for every configured asset
    Prices,
    /// Show the current gas estimate for a network
    Gas {
        #[arg(short, long)]
        network: String,
        /// Sender used for estimation (defaults to the merchant)
        #[arg(long)]
        from: Option<Address>,
    },
    /// Encrypt a private key for a card
    Provision {
        #[arg(short, long)]
        serial: String,
        /// Print the JSON card payload instead of the bare ciphertext
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code(e.as_ref())
        }
    }
}

/// 2 for an unusable configuration, 1 for everything else.
fn exit_code(error: &(dyn std::error::Error + 'static)) -> ExitCode {
    if error.is::<ConfigError>() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli.config)?;
    init_logging(&config.observability);
    let config = Arc::new(config);

    tracing::info!(
        networks = config.networks.len(),
        tokens = config.tokens.len(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Pay {
            network,
            asset,
            amount,
            to,
            card,
            tag_id,
            yes,
        } => {
            let intent = TransactionIntent::new(network, asset, amount).to(to.unwrap_or_default());
            pay(config, intent, card, tag_id, yes).await?;
        }
        Commands::Balance {
            network,
            address,
            card,
            tag_id,
        } => {
            balance(config, &network, address, card, tag_id).await?;
        }
        Commands::Prices => {
            let aggregator = PriceAggregator::from_config(&config.prices);
            let set = aggregator.fetch(&PriceAsset::from_config(&config)).await;
            println!("Prices ({}):", set.source);
            for (id, price) in &set.prices {
                println!("  {:<20} ${:.2}", id, price);
            }
        }
        Commands::Gas { network, from } => {
            let flow = PaymentFlow::connect(config.clone(), &network).await?;
            let to = flow.resolve_recipient("").await?;
            let from = from.unwrap_or(to);
            let transfer = Transfer::Native {
                to,
                value: alloy::primitives::U256::ZERO,
            };
            let estimate = flow.builder().estimate(from, &transfer).await?;
            println!("Network:   {}", flow.network().name);
            println!("Strategy:  {} ({:?})", estimate.strategy, estimate.price_source);
            println!("Gas limit: {}{}", estimate.gas_limit, if estimate.limit_is_fallback { " (fallback)" } else { "" });
            println!(
                "Gas price: {} gwei",
                format_amount(alloy::primitives::U256::from(estimate.gas_price), 9)
            );
            println!("Max cost:  {} {}", format_amount(estimate.total_cost, 18), flow.network().symbol);
        }
        Commands::Provision { serial, json } => {
            let key = Zeroizing::new(rpassword::prompt_password("Private key: ")?);
            let pin = prompt_pin()?;
            let ciphertext = SecretResolver::cryptojs().provision(&key, &pin, &serial)?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "ekey": ciphertext, "serial": serial })
                );
            } else {
                println!("{}", ciphertext);
            }
        }
    }

    Ok(())
}

async fn pay(
    config: Arc<PayConfig>,
    intent: TransactionIntent,
    card_path: PathBuf,
    tag_id: Option<String>,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = Arc::new(Shutdown::new());
    let mut cancel = shutdown.subscribe();
    spawn_ctrl_c_handler(shutdown.clone());

    let flow = PaymentFlow::connect(config.clone(), &intent.network).await?;

    let mut reader = FileCardReader::new(card_path);
    if let Some(id) = tag_id {
        reader = reader.with_tag_id(id);
    }
    let card = read_card(&mut reader, Duration::from_secs(config.card.nfc_timeout_secs)).await?;

    let pin = prompt_pin()?;
    let prepared = match flow.prepare(&card, &pin, &intent).await {
        Ok(prepared) => prepared,
        Err(PaymentError::Insufficient(shortfall)) => {
            eprintln!(
                "Insufficient balance: have {} {sym}, need {} + {} gas, short {} {sym}",
                format_amount(shortfall.balance, 18),
                format_amount(shortfall.amount, 18),
                format_amount(shortfall.fee, 18),
                format_amount(shortfall.deficit, 18),
                sym = flow.network().symbol
            );
            return Err(PaymentError::Insufficient(shortfall).into());
        }
        Err(e) => return Err(e.into()),
    };
    drop(pin);
    drop(card);

    print_preview(&prepared.preview);
    if !yes && !confirm_prompt()? {
        println!("Cancelled.");
        return Ok(());
    }

    match flow.confirm(prepared, &mut cancel).await {
        Ok(receipt) => {
            println!("Payment confirmed");
            println!("  tx:    {}", receipt.tx_hash);
            if let Some(block) = receipt.block_number {
                println!("  block: {}", block);
            }
            println!("  fee:   {} {}", format_amount(receipt.fee_paid, 18), flow.network().symbol);
            if let Some(url) = receipt.explorer_url {
                println!("  {}", url);
            }
            Ok(())
        }
        Err(PaymentError::Cancelled) => {
            println!("Cancelled before broadcast.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn balance(
    config: Arc<PayConfig>,
    network: &str,
    address: Option<Address>,
    card_path: Option<PathBuf>,
    tag_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let flow = PaymentFlow::connect(config.clone(), network).await?;

    let address = match (address, card_path) {
        (Some(address), _) => address,
        (None, Some(path)) => {
            let mut reader = FileCardReader::new(path);
            if let Some(id) = tag_id {
                reader = reader.with_tag_id(id);
            }
            let card = read_card(&mut reader, Duration::from_secs(config.card.nfc_timeout_secs)).await?;
            match card.address {
                Some(address) => address,
                None => {
                    let pin = prompt_pin()?;
                    let secret = SecretResolver::cryptojs().resolve(&card.encrypted_key, &pin, &card.serial)?;
                    Wallet::from_secret(&secret, flow.network().chain_id)?.address()
                }
            }
        }
        (None, None) => return Err("pass --address or --card".into()),
    };

    let balances = flow.balances(address).await?;
    let prices = PriceAggregator::from_config(&config.prices)
        .fetch(&PriceAsset::from_config(&config))
        .await;

    println!("{} on {}", address, flow.network().name);
    for line in balances {
        let price_id = match config.token(&line.asset) {
            Some(token) => token.price_id.as_str(),
            None => flow.network().price_id.as_str(),
        };
        let amount = line.formatted();
        let usd = amount.parse::<f64>().unwrap_or(0.0) * prices.usd(price_id);
        println!("  {:<8} {:>24}  ${:.2}", line.symbol, amount, usd);
    }
    Ok(())
}

fn prompt_pin() -> Result<Pin, Box<dyn std::error::Error>> {
    let raw = Zeroizing::new(rpassword::prompt_password("PIN: ")?);
    Ok(Pin::parse(&raw)?)
}

fn confirm_prompt() -> std::io::Result<bool> {
    print!("Send payment? [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_preview(preview: &PaymentPreview) {
    println!("Payment preview ({})", preview.network);
    println!("  from:      {}", preview.from);
    println!("  to:        {}", preview.recipient);
    println!("  amount:    {} {}  (${:.2})", preview.amount, preview.symbol, preview.amount_usd);
    println!("  gas limit: {}", preview.gas_limit);
    println!("  gas price: {} gwei ({})", preview.gas_price_gwei, preview.strategy);
    println!(
        "  max gas:   {} {}  (${:.2})",
        preview.total_gas, preview.native_symbol, preview.gas_usd
    );
    println!("  total:     ${:.2}  [prices: {}]", preview.total_usd, preview.price_source);
}
