use std::{sync::Arc, time::Duration};

use clap::Parser;
use tracing::{error, info};

use dpoll::{
    cli::{execute, Args},
    logging::init_logging,
    PollConfig, PollGateway, RpcWallet, Session, WalletProvider,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let level = init_logging("info");
    let args = Args::parse();
    info!("Starting dpoll with log filter {level:?}");

    let mut config = PollConfig::from_env()?;
    if args.contract.is_some() {
        config.contract_address = args.contract;
    }
    if let Some(secs) = args.timeout_secs {
        config.call_timeout = Some(Duration::from_secs(secs));
    }

    let wallet: Arc<dyn WalletProvider> =
        Arc::new(RpcWallet::connect(args.rpc_url.clone(), &args.private_key)?);
    let session = Session::new(Some(wallet), config);
    session.initialize().await.inspect_err(|e| error!("{e}"))?;

    let gateway = PollGateway::new(session);
    let output = execute(&gateway, args.command)
        .await
        .inspect_err(|e| error!("{e}"))?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
