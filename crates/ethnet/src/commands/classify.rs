use anyhow::Result;
use comfy_table::{Cell, Table};
use enclave_client::{PortInfo, RawService};
use network_discovery::MetadataParser;

pub fn run(names: &[String], ports: &[String]) -> Result<()> {
    let parser = MetadataParser::new();

    let mut table = Table::new();
    table.set_header(vec!["NAME", "SERVICE TYPE", "CLIENT", "NODE", "NODE NAME"]);
    for name in names {
        let service = ports
            .iter()
            .fold(RawService::new(name.as_str()), |service, port| {
                service.with_port(port.as_str(), PortInfo::tcp(0))
            });
        let meta = parser.parse(&service);
        table.add_row(vec![
            Cell::new(name),
            Cell::new(meta.service_type),
            Cell::new(meta.client_type),
            Cell::new(meta.node_index),
            Cell::new(&meta.node_name),
        ]);
    }

    println!("{}", table);
    Ok(())
}
