//! dark-otc - Binary Entry Point
//!
//! Runs one full escrow lifecycle against the in-memory coprocessor:
//! create with escrow, fill with escrow, the validator's off-core check and
//! settlement, finalize, reveal. Prints the events and the final state root.

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use dark_otc::config::EngineConfig;
use dark_otc::confidential::{LocalCoprocessor, Plaintext};
use dark_otc::engine::{CreateOrder, EscrowEngine, FillRequest, TxContext};
use dark_otc::logging::init_logger;
use dark_otc::types::{Identity, Order};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON engine config. Defaults to demo identities.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Ledger time of the first transaction
    #[arg(long, default_value_t = 1_700_000_000)]
    start_time: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level, args.json_logs);

    let config = match &args.config {
        Some(path) => EngineConfig::load(path).context("loading engine config")?,
        None => EngineConfig::new(Identity::from_label("validator"), Identity::from_label("escrow"))
            .with_env_overrides()?,
    };
    let validator = config.validator;
    let custody = config.custody;

    let maker = Identity::from_label("maker");
    let taker = Identity::from_label("taker");
    let usdc = Identity::from_label("cUSDC");
    let weth = Identity::from_label("cWETH");

    // Balances and operator approvals live in the token ledgers.
    let mut fhe = LocalCoprocessor::new(b"dark-otc/demo");
    fhe.mint(usdc, taker, 250_000);
    fhe.mint(weth, maker, 100);
    fhe.set_operator(usdc, taker, custody);
    fhe.set_operator(weth, maker, custody);
    fhe.set_operator(usdc, custody, validator);
    fhe.set_operator(weth, custody, validator);

    let mut engine = EscrowEngine::new(config, fhe)?;
    let mut now = args.start_time;

    info!("=== dark-otc: confidential escrow demo ===");
    info!(%validator, %custody, "engine ready");

    // Maker sells 10 cWETH for 200,000 cUSDC to anyone.
    let (terms, proof) = engine.backend_mut().encrypt_inputs(
        custody,
        maker,
        &[Plaintext::Uint(200_000), Plaintext::Uint(10), Plaintext::ANY_TAKER],
    );
    let id = engine.create_order(
        &TxContext::new(maker, now),
        CreateOrder {
            asset_in: usdc,
            asset_out: weth,
            amount_in: terms[0],
            amount_out: terms[1],
            allowed_taker: terms[2],
            proof,
            deadline: now + 3_600,
            escrow_now: true,
        },
    )?;

    now += 60;
    let (payment, proof) = engine
        .backend_mut()
        .encrypt(custody, taker, Plaintext::Uint(200_000));
    engine.request_fill(
        &TxContext::new(taker, now),
        id,
        FillRequest {
            payment,
            proof,
            escrow_now: true,
        },
    )?;

    now += 60;
    let order = engine.get_order(id)?.clone();
    settle_off_core(engine.backend_mut(), &order, validator, custody)?;
    engine.finalize(&TxContext::new(validator, now), id, taker)?;

    now += 60;
    engine.reveal_terms(&TxContext::new(maker, now), id)?;

    for event in engine.drain_events() {
        info!(event = event.name(), order_id = ?event.order_id(), "{:?}", event);
    }

    let fhe = engine.backend();
    info!(
        maker_usdc = fhe.balance_of(usdc, maker),
        maker_weth = fhe.balance_of(weth, maker),
        taker_usdc = fhe.balance_of(usdc, taker),
        taker_weth = fhe.balance_of(weth, taker),
        "final balances"
    );
    info!(
        status = ?engine.order_status(id, now)?,
        revealed_amount_in = ?fhe.public_decrypt(&order.amount_in_handle()),
        "order closed"
    );
    info!(state_root = %engine.store().state_root_hex()?, "state root");

    Ok(())
}

/// What the validator does between `request_fill` and `finalize`: decrypt,
/// compare, check the allow-list, then move the escrowed funds.
fn settle_off_core(
    fhe: &mut LocalCoprocessor,
    order: &Order,
    validator: Identity,
    custody: Identity,
) -> Result<()> {
    let Some(payment) = order.taker_payment_handle() else {
        bail!("order {} has no fill request", order.id());
    };
    let Some(taker) = order.taker() else {
        bail!("order {} has no taker", order.id());
    };

    let expected = fhe.decrypt(&order.amount_in_handle(), validator);
    let offered = fhe.decrypt(&payment, validator);
    if expected.is_none() || expected != offered {
        bail!("payment does not match the order's amount_in");
    }
    match fhe.decrypt(&order.allowed_taker_handle(), validator) {
        Some(allowed) if allowed == Plaintext::ANY_TAKER || allowed == Plaintext::Address(taker) => {}
        _ => bail!("{} is not the allow-listed taker", taker),
    }

    if order.taker_escrowed() {
        fhe.transfer_handle(order.asset_in(), custody, order.maker(), &payment, validator)?;
    }
    if order.maker_escrowed() {
        fhe.transfer_handle(order.asset_out(), custody, taker, &order.amount_out_handle(), validator)?;
    }
    info!(order_id = order.id(), %taker, "settled off-core");
    Ok(())
}
