use crate::integrations::cloud_interface::CloudProvisioner;
use crate::integrations::providers::openstack::{
    OpenStackCredentials, OpenStackInterface, ServerDetail,
};
use crate::utils;

use anyhow::Result;
use colored::Colorize;
use tabled::{Table, Tabled, settings::Style};
use tracing::warn;

#[derive(Tabled)]
struct ServerDisplay {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Delete every instance attached to one tenant network, chosen interactively.
pub async fn delete(credentials: &OpenStackCredentials, skip_confirmation: bool) -> Result<()> {
    let os = OpenStackInterface::connect(credentials).await?;
    println!(
        "Running crank on project: {}",
        os.session.tenant_name.bold()
    );

    let networks = os.tenant_networks().await?;
    let network_options: Vec<String> = networks.iter().map(|n| n.name.clone()).collect();
    let idx = utils::select_index(
        "Which network's instances should be deleted?",
        network_options.clone(),
    )?;
    let network_name = &network_options[idx];

    let servers = os.list_servers_detailed().await?;
    let targets: Vec<ServerDetail> = servers
        .into_iter()
        .filter(|s| s.addresses.contains_key(network_name))
        .collect();

    if targets.is_empty() {
        println!("No instances attached to '{}'.", network_name);
        return Ok(());
    }

    delete_servers(&os, &targets, skip_confirmation).await
}

pub(super) async fn delete_servers(
    os: &OpenStackInterface,
    targets: &[ServerDetail],
    skip_confirmation: bool,
) -> Result<()> {
    let rows: Vec<ServerDisplay> = targets
        .iter()
        .map(|s| ServerDisplay {
            name: s.name.clone(),
            id: s.id.clone(),
            status: s.status.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);

    if !(utils::user_confirmation(
        skip_confirmation,
        &format!("Do you want to delete these {} instance(s)?", targets.len()),
    )?) {
        return Ok(());
    }

    for (idx, server) in targets.iter().enumerate() {
        println!("[{}/{}] Deleting '{}'...", idx + 1, targets.len(), server.name);
        if let Err(e) = os.delete_server(&server.id).await {
            warn!("Failed to delete '{}': {:?}", server.name, e);
            println!("{}", format!("Could not delete '{}'.", server.name).red());
        }
    }

    println!("Deletion requests submitted.");
    Ok(())
}
