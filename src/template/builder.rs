use crate::constants::HEAT_TEMPLATE_VERSION;
use crate::integrations::providers::openstack::{
    FlavorSummary, InterfaceAttachment, NetworkSummary, PortSummary, RouterSummary, ServerDetail,
    SubnetDetail,
};
use crate::template::UserData;

use chrono::Local;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// A heat-orchestration-style template. Maps are ordered so the serialized
/// YAML is stable run to run.
#[derive(Debug, Serialize)]
pub struct HeatTemplate {
    pub heat_template_version: String,
    pub description: String,
    pub parameters: BTreeMap<String, JsonValue>,
    pub resources: BTreeMap<String, JsonValue>,
}

/// Everything read from the cloud that the builder turns into a template.
/// Fetching lives in the command layer; this type keeps assembly pure.
#[derive(Debug, Default)]
pub struct TenantTopology {
    pub tenant_id: String,
    pub tenant_name: String,
    pub servers: Vec<ServerDetail>,
    pub flavors: Vec<FlavorSummary>,
    /// server id -> attached interfaces
    pub server_interfaces: HashMap<String, Vec<InterfaceAttachment>>,
    pub networks: Vec<NetworkSummary>,
    /// subnet id -> detail, resolved for the tenant's networks
    pub subnets: HashMap<String, SubnetDetail>,
    pub routers: Vec<RouterSummary>,
    pub ports: Vec<PortSummary>,
    /// server id -> snapshot image id, when exporting with snapshots
    pub image_overrides: HashMap<String, String>,
    /// server id -> recovered boot payload
    pub user_data: HashMap<String, UserData>,
}

impl TenantTopology {
    fn tenant_routers(&self) -> Vec<&RouterSummary> {
        self.routers
            .iter()
            .filter(|r| r.tenant_id == self.tenant_id)
            .collect()
    }

    /// Networks that belong in the template: the tenant's own plus shared
    /// ones, never external and never the provider "public" network.
    fn template_networks(&self) -> Vec<&NetworkSummary> {
        self.networks
            .iter()
            .filter(|n| {
                !n.external
                    && n.name != "public"
                    && (n.tenant_id == self.tenant_id || n.shared)
            })
            .collect()
    }

    fn effective_image_id(&self, server: &ServerDetail) -> Option<String> {
        if let Some(id) = self.image_overrides.get(&server.id) {
            return Some(id.clone());
        }
        server.image.as_ref().map(|i| i.id.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateOptions {
    /// Pin generated server ports to their current fixed IPs.
    pub static_ips: bool,
}

// "key_name", "key_name1", "key_name2", ...
fn indexed(base: &str, idx: usize) -> String {
    if idx == 0 {
        base.to_string()
    } else {
        format!("{}{}", base, idx)
    }
}

fn string_param(description: &str, default: &str) -> JsonValue {
    json!({
        "type": "string",
        "description": description,
        "default": default,
    })
}

pub struct ComputeTemplateBuilder<'a> {
    topology: &'a TenantTopology,
    options: TemplateOptions,
    /// image id -> parameter name
    image_params: HashMap<String, String>,
    /// flavor id -> parameter name
    flavor_params: HashMap<String, String>,
    /// key pair name -> parameter name
    key_params: HashMap<String, String>,
    template: HeatTemplate,
}

impl<'a> ComputeTemplateBuilder<'a> {
    pub fn new(topology: &'a TenantTopology, options: TemplateOptions) -> Self {
        let description = format!(
            "Generated template {} on project {}",
            Local::now().format("%A, %d. %B %Y %I:%M%p"),
            topology.tenant_name
        );
        ComputeTemplateBuilder {
            topology,
            options,
            image_params: HashMap::new(),
            flavor_params: HashMap::new(),
            key_params: HashMap::new(),
            template: HeatTemplate {
                heat_template_version: HEAT_TEMPLATE_VERSION.to_string(),
                description,
                parameters: BTreeMap::new(),
                resources: BTreeMap::new(),
            },
        }
    }

    pub fn build(mut self) -> HeatTemplate {
        self.add_key_parameters();
        self.add_image_parameters();
        self.add_flavor_parameters();
        self.add_network_parameters();
        self.add_network_resources();
        self.add_router_resources();
        self.add_server_resources();
        self.template
    }

    fn add_key_parameters(&mut self) {
        for server in &self.topology.servers {
            let Some(key_name) = &server.key_name else {
                continue;
            };
            if self.key_params.contains_key(key_name) {
                continue;
            }
            let param = indexed("key_name", self.key_params.len());
            self.template.parameters.insert(
                param.clone(),
                string_param("Name of keypair to assign to servers", key_name),
            );
            self.key_params.insert(key_name.clone(), param);
        }
    }

    fn add_image_parameters(&mut self) {
        for server in &self.topology.servers {
            let Some(image_id) = self.topology.effective_image_id(server) else {
                continue;
            };
            if self.image_params.contains_key(&image_id) {
                continue;
            }
            let param = indexed("image", self.image_params.len());
            self.template.parameters.insert(
                param.clone(),
                string_param("Name of image to use for servers", &image_id),
            );
            self.image_params.insert(image_id, param);
        }
    }

    fn add_flavor_parameters(&mut self) {
        for server in &self.topology.servers {
            let Some(flavor) = &server.flavor else {
                continue;
            };
            if self.flavor_params.contains_key(&flavor.id) {
                continue;
            }
            let default = self
                .topology
                .flavors
                .iter()
                .find(|f| f.id == flavor.id)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| flavor.id.clone());
            let param = indexed("flavor", self.flavor_params.len());
            self.template.parameters.insert(
                param.clone(),
                string_param("Flavor to use for servers", &default),
            );
            self.flavor_params.insert(flavor.id.clone(), param);
        }
    }

    fn add_network_parameters(&mut self) {
        for (idx, router) in self.topology.tenant_routers().iter().enumerate() {
            let Some(gateway) = &router.external_gateway_info else {
                continue;
            };
            self.template.parameters.insert(
                format!("public_net_{}", idx),
                string_param("ID of public network", &gateway.network_id),
            );
        }

        let mut shared_idx = 0;
        for network in self.topology.template_networks() {
            if network.shared {
                self.template.parameters.insert(
                    format!("shared_net_{}", shared_idx),
                    string_param("ID of detected shared network", &network.id),
                );
                shared_idx += 1;
                continue;
            }

            for subnet_id in &network.subnets {
                let Some(subnet) = self.topology.subnets.get(subnet_id) else {
                    continue;
                };
                self.template.parameters.insert(
                    format!("{}_net_name", network.name),
                    string_param("Name of network", &network.name),
                );
                self.template.parameters.insert(
                    format!("{}_{}_cidr", network.name, subnet.name),
                    string_param("Network address (CIDR notation)", &subnet.cidr),
                );
                if let Some(gateway_ip) = &subnet.gateway_ip {
                    self.template.parameters.insert(
                        format!("{}_{}_gateway", network.name, subnet.name),
                        string_param("Network gateway address", gateway_ip),
                    );
                }
                if let Some(pool) = subnet.allocation_pools.first() {
                    self.template.parameters.insert(
                        format!("{}_{}_pool_start", network.name, subnet.name),
                        string_param("Start of network IP address allocation pool", &pool.start),
                    );
                    self.template.parameters.insert(
                        format!("{}_{}_pool_end", network.name, subnet.name),
                        string_param("End of network IP address allocation pool", &pool.end),
                    );
                }
            }
        }
    }

    fn add_network_resources(&mut self) {
        for network in self.topology.template_networks() {
            if network.shared {
                // referenced by id through the shared_net parameter instead
                continue;
            }

            for subnet_id in &network.subnets {
                let Some(subnet) = self.topology.subnets.get(subnet_id) else {
                    continue;
                };

                self.template.resources.insert(
                    network.name.clone(),
                    json!({
                        "type": "OS::Neutron::Net",
                        "properties": {
                            "name": {"get_param": format!("{}_net_name", network.name)},
                        },
                    }),
                );

                let mut properties = json!({
                    "name": subnet.name,
                    "network_id": {"get_resource": network.name},
                    "cidr": {"get_param": format!("{}_{}_cidr", network.name, subnet.name)},
                });
                if subnet.gateway_ip.is_some() {
                    properties["gateway_ip"] = json!({
                        "get_param": format!("{}_{}_gateway", network.name, subnet.name)
                    });
                }
                if !subnet.allocation_pools.is_empty() {
                    properties["allocation_pools"] = json!([{
                        "start": {"get_param": format!("{}_{}_pool_start", network.name, subnet.name)},
                        "end": {"get_param": format!("{}_{}_pool_end", network.name, subnet.name)},
                    }]);
                }
                self.template.resources.insert(
                    subnet.name.clone(),
                    json!({"type": "OS::Neutron::Subnet", "properties": properties}),
                );
            }
        }
    }

    fn add_router_resources(&mut self) {
        let routers = self.topology.tenant_routers();
        for (idx, router) in routers.iter().enumerate() {
            let router_resource = format!("router{}", idx);

            let definition = match &router.external_gateway_info {
                Some(_) => json!({
                    "type": "OS::Neutron::Router",
                    "properties": {
                        "name": router.name,
                        "external_gateway_info": {
                            "network": {"get_param": format!("public_net_{}", idx)},
                        },
                    },
                }),
                None => json!({
                    "type": "OS::Neutron::Router",
                    "properties": {"name": router.name},
                }),
            };
            self.template
                .resources
                .insert(router_resource.clone(), definition);

            let interfaces: Vec<&PortSummary> = self
                .topology
                .ports
                .iter()
                .filter(|p| p.device_id == router.id && p.device_owner == "network:router_interface")
                .collect();

            for (idxs, interface) in interfaces.iter().enumerate() {
                let port_resource = format!("port_{}_{}", idx, idxs);

                for fixed_ip in &interface.fixed_ips {
                    self.template.resources.insert(
                        format!("router_interface{}_{}", idx, idxs),
                        json!({
                            "type": "OS::Neutron::RouterInterface",
                            "properties": {
                                "router_id": {"get_resource": router_resource},
                                "port_id": {"get_resource": port_resource},
                            },
                        }),
                    );

                    let network = self
                        .topology
                        .subnets
                        .get(&fixed_ip.subnet_id)
                        .and_then(|subnet| {
                            self.topology.networks.iter().find(|n| n.id == subnet.network_id)
                        });
                    let Some(network) = network else {
                        warn!(
                            "No network found for router port '{}' on subnet '{}'",
                            interface.id, fixed_ip.subnet_id
                        );
                        continue;
                    };

                    let network_ref = if network.shared {
                        json!(network.id)
                    } else {
                        json!({"get_resource": network.name})
                    };
                    self.template.resources.insert(
                        port_resource.clone(),
                        json!({
                            "type": "OS::Neutron::Port",
                            "properties": {
                                "fixed_ips": [{"ip_address": fixed_ip.ip_address}],
                                "network_id": network_ref,
                            },
                        }),
                    );
                }
            }
        }
    }

    fn add_server_resources(&mut self) {
        for server in &self.topology.servers {
            let Some(image_id) = self.topology.effective_image_id(server) else {
                // nothing to boot this server from in the template
                continue;
            };
            let Some(image_param) = self.image_params.get(&image_id) else {
                continue;
            };

            let flavor_ref = server
                .flavor
                .as_ref()
                .and_then(|f| self.flavor_params.get(&f.id))
                .map(|param| json!({"get_param": param}))
                .unwrap_or_else(|| {
                    json!(server.flavor.as_ref().map(|f| f.id.clone()).unwrap_or_default())
                });

            let interfaces = self
                .topology
                .server_interfaces
                .get(&server.id)
                .cloned()
                .unwrap_or_default();
            let networks: Vec<JsonValue> = (0..interfaces.len())
                .map(|idx| json!({"port": {"get_resource": format!("{}_port{}", server.name, idx)}}))
                .collect();

            let mut properties = json!({
                "name": server.name,
                "image": {"get_param": image_param},
                "flavor": flavor_ref,
                "networks": networks,
            });
            if let Some(key_param) = server.key_name.as_ref().and_then(|k| self.key_params.get(k))
            {
                properties["key_name"] = json!({"get_param": key_param});
            }
            match self.topology.user_data.get(&server.id) {
                Some(UserData::CloudInit(payload)) => {
                    properties["user_data"] = json!(payload);
                }
                Some(UserData::Raw(payload)) => {
                    properties["user_data"] = json!(payload);
                    properties["user_data_format"] = json!("RAW");
                }
                None => {}
            }

            self.template.resources.insert(
                server.name.clone(),
                json!({"type": "OS::Nova::Server", "properties": properties}),
            );

            self.add_server_ports(server, &interfaces);
        }
    }

    fn add_server_ports(&mut self, server: &ServerDetail, interfaces: &[InterfaceAttachment]) {
        for (idx, interface) in interfaces.iter().enumerate() {
            let resource_name = format!("{}_port{}", server.name, idx);

            let Some(fixed_ip) = interface.fixed_ips.first() else {
                warn!(
                    "No fixed ip on port '{}' of server '{}'",
                    interface.port_id, server.name
                );
                self.template
                    .resources
                    .insert(resource_name, json!({"type": "OS::Neutron::Port"}));
                continue;
            };

            let subnet = self.topology.subnets.get(&fixed_ip.subnet_id);
            let network = subnet.and_then(|s| {
                self.topology.networks.iter().find(|n| n.id == s.network_id)
            });
            let (Some(subnet), Some(network)) = (subnet, network) else {
                warn!(
                    "Probable error grabbing port information for server '{}'",
                    server.name
                );
                self.template
                    .resources
                    .insert(resource_name, json!({"type": "OS::Neutron::Port"}));
                continue;
            };

            let properties = if self.options.static_ips {
                json!({
                    "network_id": {"get_resource": network.name},
                    "fixed_ips": [{"ip_address": fixed_ip.ip_address}],
                })
            } else if network.shared {
                json!({
                    "network_id": network.id,
                    "fixed_ips": [{"subnet_id": fixed_ip.subnet_id}],
                })
            } else {
                json!({
                    "network_id": {"get_resource": network.name},
                    "fixed_ips": [{"subnet_id": {"get_resource": subnet.name}}],
                })
            };

            self.template.resources.insert(
                resource_name,
                json!({"type": "OS::Neutron::Port", "properties": properties}),
            );
        }
    }
}
