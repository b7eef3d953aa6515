//! mex-server: hosts a demo order service and publishes its metadata.
//!
//! Without `--config` a built-in configuration is used: one `IOrderService`
//! endpoint at `/orders`, WSDL over HTTP GET and a metadata exchange
//! endpoint at `/mex` that advertises the host each client addressed.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use servicemodel_core::{ContractBuilder, OperationBuilder};
use servicemodel_server::config::{
    BindingRegistry, ConfigLoader, ContractRegistry, EndpointConfig, HostConfig, MetadataConfig,
    ServiceConfig,
};
use servicemodel_server::host::ServiceHostBuilder;
use servicemodel_server::network::{NetworkConfig, NetworkModule};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "mex-server", about = "Serve service metadata over HTTP")]
struct Args {
    /// JSON host configuration; the demo configuration is used when absent.
    #[arg(long, env = "MEX_SERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured bind address.
    #[arg(long, env = "MEX_SERVER_HOST")]
    host: Option<String>,

    /// Overrides the configured port.
    #[arg(long, env = "MEX_SERVER_PORT")]
    port: Option<u16>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "MEX_SERVER_LOG_JSON")]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,servicemodel_server=debug".into());
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn demo_contracts() -> anyhow::Result<ContractRegistry> {
    let mut contracts = ContractRegistry::new();
    contracts.register(
        ContractBuilder::new("IOrderService")
            .namespace("urn:example:orders")
            .operation(OperationBuilder::new("GetOrder").input("orderId", "int").output("Order"))
            .operation(
                OperationBuilder::new("PlaceOrder")
                    .input("order", "Order")
                    .output("int")
                    .fault("OrderRejected", "RejectionDetail"),
            )
            .operation(OperationBuilder::new("CancelOrder").input("orderId", "int").one_way())
            .build()?,
    );
    Ok(contracts)
}

fn demo_config(port: u16) -> HostConfig {
    HostConfig {
        service: ServiceConfig {
            name: "OrderService".to_string(),
            namespace: "urn:example:orders".to_string(),
            base_address: format!("http://localhost:{port}"),
            endpoints: vec![EndpointConfig {
                address: "orders".to_string(),
                binding: "basicHttpBinding".to_string(),
                contract: "IOrderService".to_string(),
                ..EndpointConfig::default()
            }],
            metadata: Some(MetadataConfig {
                http_get_enabled: true,
                mex_address: Some("mex".to_string()),
                use_request_headers: true,
                ..MetadataConfig::default()
            }),
            ..ServiceConfig::default()
        },
        network: NetworkConfig {
            port,
            ..NetworkConfig::default()
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = match &args.config {
        Some(path) => ConfigLoader::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => demo_config(args.port.unwrap_or(8080)),
    };
    if let Some(host) = args.host {
        config.network.host = host;
    }
    if let Some(port) = args.port {
        config.network.port = port;
    }

    let host = ServiceHostBuilder::new(
        config.service,
        demo_contracts()?,
        BindingRegistry::with_defaults()?,
    )
    .build()?
    .open()?;

    let mut network = NetworkModule::new(config.network, host);
    let port = network.start().await?;
    info!(port, "mex-server listening");

    network
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
