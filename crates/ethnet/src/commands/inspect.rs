use crate::OutputFormat;
use anyhow::{Context, Result};
use comfy_table::{Cell, Color, Table};
use enclave_client::{PackageConfig, SnapshotOrchestrator};
use network_discovery::{ClientRecord, Network, NetworkOptions, ServiceMapper};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub async fn run(
    services_path: &Path,
    config_path: Option<&Path>,
    enclave: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let config = match config_path {
        Some(path) => PackageConfig::from_file(path)
            .await
            .with_context(|| format!("Failed to load package configuration {}", path.display()))?,
        None => PackageConfig::default(),
    };

    let enclave_id = enclave
        .or_else(|| config.enclave_name.clone())
        .unwrap_or_else(|| "snapshot".to_string());

    let orchestrator = SnapshotOrchestrator::from_file(enclave_id.clone(), services_path)
        .await
        .with_context(|| format!("Failed to load service listing {}", services_path.display()))?;

    // Inspection never owns the enclave
    let options = NetworkOptions::default().orphaned();
    let network = ServiceMapper::new(Arc::new(orchestrator))
        .map_to_network(&enclave_id, &config, options)
        .await
        .context("Failed to map services")?;
    info!("Discovered {} services", network.services().len());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&to_json(&network))?),
        OutputFormat::Table => print_tables(&network),
    }
    Ok(())
}

fn to_json(network: &Network) -> Value {
    let apache = network.apache_config().map(|apache| {
        json!({
            "url": apache.url(),
            "genesis_ssz_url": apache.genesis_ssz_url(),
            "config_yaml_url": apache.config_yaml_url(),
            "bootnodes_yaml_url": apache.bootnodes_yaml_url(),
            "deposit_contract_block_url": apache.deposit_contract_block_url(),
        })
    });

    json!({
        "name": network.name(),
        "chain_id": network.chain_id(),
        "enclave_name": network.enclave_name(),
        "execution_clients": network.execution_clients().all().collect::<Vec<_>>(),
        "consensus_clients": network.consensus_clients().all().collect::<Vec<_>>(),
        "validators": network.validators(),
        "services": network.services(),
        "apache_config": apache,
    })
}

fn print_tables(network: &Network) {
    println!(
        "Network {} (chain {}, enclave {})",
        network.name(),
        network.chain_id(),
        network.enclave_name()
    );

    let mut clients = Table::new();
    clients.set_header(vec!["LAYER", "CLIENT", "SERVICE", "PRIMARY ENDPOINT"]);
    for client in network.execution_clients().all() {
        add_client_row(&mut clients, "execution", client, client.rpc_url());
    }
    for client in network.consensus_clients().all() {
        add_client_row(&mut clients, "consensus", client, client.beacon_url());
    }
    for client in network.validators() {
        add_client_row(&mut clients, "validator", client, &client.endpoints.api_url);
    }
    println!("{}", clients);

    let mut services = Table::new();
    services.set_header(vec!["SERVICE", "TYPE", "STATUS", "IP", "PORTS"]);
    for service in network.services() {
        let status_color = if service.is_running() {
            Color::Green
        } else {
            Color::Red
        };
        let ports = service
            .ports
            .iter()
            .map(|(name, port)| format!("{}:{}", name, port.number))
            .collect::<Vec<_>>()
            .join(", ");
        services.add_row(vec![
            Cell::new(&service.name),
            Cell::new(service.service_type),
            Cell::new(&service.status).fg(status_color),
            Cell::new(&service.ip_address),
            Cell::new(ports),
        ]);
    }
    println!("{}", services);

    match network.apache_config() {
        Some(apache) => println!("Config server: {}", apache.url()),
        None => println!("Config server: -"),
    }
}

fn add_client_row(table: &mut Table, layer: &str, client: &impl ClientRecord, endpoint: &str) {
    let endpoint = if endpoint.is_empty() { "-" } else { endpoint };
    table.add_row(vec![
        Cell::new(layer),
        Cell::new(client.client_type()),
        Cell::new(client.service_name()),
        Cell::new(endpoint),
    ]);
}
