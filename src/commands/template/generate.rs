use crate::constants::SNAPSHOT_THRESHOLD;
use crate::integrations::providers::openstack::{
    OpenStackCredentials, OpenStackInterface,
};
use crate::template::{
    ComputeTemplateBuilder, HeatTemplate, TemplateOptions, TenantTopology, fetch_user_data,
};
use crate::utils;

use anyhow::{Result, bail};
use colored::Colorize;
use serde_json::Value as JsonValue;
use sqlx::MySqlPool;
use std::collections::{HashMap, HashSet};
use tracing::{error, info, warn};

pub const COMPUTE_TEMPLATE_FILE: &str = "compute_template.yaml";
pub const HEAT_TEMPLATE_FILE: &str = "heat_template.yaml";

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Snapshot each server and parameterize the snapshots as boot images.
    pub snapshots: bool,
    /// Pin generated ports to their current fixed IPs.
    pub static_ips: bool,
}

/// Reconstruct the tenant's non-orchestrated resources into a template.
pub async fn compute(credentials: &OpenStackCredentials, options: ExportOptions) -> Result<()> {
    let os = OpenStackInterface::connect(credentials).await?;
    println!(
        "Exporting project: {}",
        os.session.tenant_name.bold()
    );

    let topology = gather_topology(&os, &options).await?;
    let template = ComputeTemplateBuilder::new(
        &topology,
        TemplateOptions {
            static_ips: options.static_ips,
        },
    )
    .build();

    let template = template_to_value(&template)?;
    write_and_validate(&os, &template, COMPUTE_TEMPLATE_FILE).await
}

/// Re-export an existing stack's template as the orchestration service
/// stores it.
pub async fn heat(credentials: &OpenStackCredentials) -> Result<()> {
    let os = OpenStackInterface::connect(credentials).await?;
    println!(
        "Exporting project: {}",
        os.session.tenant_name.bold()
    );

    let stacks = os.list_stacks().await?;
    if stacks.is_empty() {
        println!("The project has no stacks.");
        return Ok(());
    }

    let stack_options: Vec<String> = stacks.iter().map(|s| s.stack_name.clone()).collect();
    let idx = utils::select_index("Which stack should the template come from?", stack_options)?;

    let template = os.stack_template(&stacks[idx]).await?;
    write_and_validate(&os, &template, HEAT_TEMPLATE_FILE).await
}

/// Both exports in one pass: the stack template first, then everything
/// outside of stacks.
pub async fn all(credentials: &OpenStackCredentials, options: ExportOptions) -> Result<()> {
    heat(credentials).await?;
    compute(credentials, options).await
}

async fn gather_topology(
    os: &OpenStackInterface,
    options: &ExportOptions,
) -> Result<TenantTopology> {
    let servers = os.list_servers_detailed().await?;
    let flavors = os.list_flavors().await?;
    let networks = os.list_networks().await?;
    let routers = os.list_routers().await?;
    let ports = os.list_ports().await?;

    let mut subnets = HashMap::new();
    for network in &networks {
        if network.external || !(network.tenant_id == os.session.tenant_id || network.shared) {
            continue;
        }
        for subnet_id in &network.subnets {
            if subnets.contains_key(subnet_id) {
                continue;
            }
            let subnet = os.show_subnet(subnet_id).await?;
            subnets.insert(subnet_id.clone(), subnet);
        }
    }

    let mut server_interfaces = HashMap::new();
    for server in &servers {
        match os.server_interfaces(&server.id).await {
            Ok(interfaces) => {
                server_interfaces.insert(server.id.clone(), interfaces);
            }
            Err(e) => warn!("Could not list interfaces of '{}': {:?}", server.name, e),
        }
    }

    let mut image_overrides = HashMap::new();
    if options.snapshots {
        let distinct_images: HashSet<&str> = servers
            .iter()
            .filter_map(|s| s.image.as_ref().map(|i| i.id.as_str()))
            .collect();
        if distinct_images.len() >= SNAPSHOT_THRESHOLD {
            println!(
                "More than {} distinct base images in use; exporting without snapshots.",
                SNAPSHOT_THRESHOLD
            );
        } else {
            for server in &servers {
                if server.image.is_none() {
                    continue;
                }
                let snapshot_name = format!("{}_snapshot", server.name);
                println!("Snapshotting '{}'...", server.name);
                match os.snapshot_server(&server.id, &snapshot_name).await {
                    Ok(image_id) => {
                        image_overrides.insert(server.id.clone(), image_id);
                    }
                    Err(e) => {
                        warn!(
                            "Could not snapshot '{}', keeping its base image: {:?}",
                            server.name, e
                        );
                    }
                }
            }
        }
    }

    let mut user_data = HashMap::new();
    match std::env::var("NOVA_DATABASE_URL") {
        Ok(url) => {
            let pool = match MySqlPool::connect(&url).await {
                Ok(pool) => pool,
                Err(e) => {
                    error!("{:?}", e);
                    bail!("Failed connecting to the compute database")
                }
            };
            for server in &servers {
                match fetch_user_data(&pool, &server.id).await {
                    Ok(Some(data)) => {
                        user_data.insert(server.id.clone(), data);
                    }
                    Ok(None) => {}
                    Err(e) => warn!("User data lookup failed for '{}': {:?}", server.name, e),
                }
            }
        }
        Err(_) => info!("NOVA_DATABASE_URL not set, skipping user data recovery"),
    }

    Ok(TenantTopology {
        tenant_id: os.session.tenant_id.clone(),
        tenant_name: os.session.tenant_name.clone(),
        servers,
        flavors,
        server_interfaces,
        networks,
        subnets,
        routers,
        ports,
        image_overrides,
        user_data,
    })
}

fn template_to_value(template: &HeatTemplate) -> Result<JsonValue> {
    match serde_json::to_value(template) {
        Ok(value) => Ok(value),
        Err(e) => {
            error!("{:?}", e);
            bail!("Failed serializing the generated template")
        }
    }
}

async fn write_and_validate(
    os: &OpenStackInterface,
    template: &JsonValue,
    filename: &str,
) -> Result<()> {
    let yaml = match serde_yaml::to_string(template) {
        Ok(yaml) => yaml,
        Err(e) => {
            error!("{:?}", e);
            bail!("Failed rendering the template as YAML")
        }
    };
    if let Err(e) = std::fs::write(filename, &yaml) {
        error!("{:?}", e);
        bail!("Failed writing '{}'", filename)
    }
    println!("Template written to {}", filename.bold());

    if os.session.orchestration_url.is_none() {
        warn!("No orchestration endpoint in the catalog, skipping validation");
        println!("No orchestration endpoint available; the template was not validated.");
        return Ok(());
    }
    match os.validate_template(template).await {
        Ok(()) => {
            println!("{}", "The orchestration service accepted the template.".green());
            Ok(())
        }
        Err(e) => {
            error!("{:?}", e);
            bail!("'{}' failed orchestration validation", filename)
        }
    }
}
