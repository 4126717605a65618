use crate::commands::instance::delete::delete_servers;
use crate::integrations::providers::openstack::{OpenStackCredentials, OpenStackInterface};

use anyhow::Result;
use colored::Colorize;

/// Delete every instance visible to the tenant, regardless of network.
pub async fn delete_all(credentials: &OpenStackCredentials, skip_confirmation: bool) -> Result<()> {
    let os = OpenStackInterface::connect(credentials).await?;
    println!(
        "Running crank on project: {}",
        os.session.tenant_name.bold()
    );

    let servers = os.list_servers_detailed().await?;
    if servers.is_empty() {
        println!("The project has no instances.");
        return Ok(());
    }

    delete_servers(&os, &servers, skip_confirmation).await
}
