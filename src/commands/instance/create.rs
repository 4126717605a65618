use crate::engine::{
    self, Batch, BatchReport, InstanceDescriptor, InstanceSpec, ProvisionerSettings,
};
use crate::integrations::providers::openstack::{
    FlavorSummary, ImageSummary, OpenStackCredentials, OpenStackInterface,
};
use crate::utils::{self, ProgressTracker};

use anyhow::{Result, bail};
use colored::Colorize;
use inquire::{Confirm, CustomType};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use tabled::{Table, Tabled, settings::Style};
use tracing::error;

/// One interactively chosen (image, flavor, networks, zone, count) tuple.
struct BatchSelection {
    image: ImageSummary,
    flavor: FlavorSummary,
    networks: Vec<String>,
    availability_zone: Option<String>,
    count: usize,
}

#[derive(Tabled)]
struct SelectionDisplay {
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Flavor")]
    flavor: String,
    #[tabled(rename = "Networks")]
    networks: String,
    #[tabled(rename = "Zone")]
    zone: String,
    #[tabled(rename = "Count")]
    count: usize,
}

#[derive(Tabled)]
struct OutcomeDisplay {
    #[tabled(rename = "Instance")]
    name: String,
    #[tabled(rename = "Result")]
    result: String,
}

pub async fn create(
    credentials: &OpenStackCredentials,
    key_name: &str,
    settings: ProvisionerSettings,
    skip_confirmation: bool,
) -> Result<()> {
    let os = OpenStackInterface::connect(credentials).await?;
    println!(
        "Running crank on project: {}",
        os.session.tenant_name.bold()
    );

    let mut selections: Vec<BatchSelection> = vec![];
    loop {
        let selection = prompt_selection(&os).await?;
        selections.push(selection);
        print_selections(&selections);

        match Confirm::new("Add another (image, flavor) pair?")
            .with_default(false)
            .prompt()
        {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                error!("{}", e.to_string());
                bail!("Failure processing user response")
            }
        }
    }

    let mut descriptors = expand_descriptors(&selections, key_name);
    println!("Creating {} instances.", descriptors.len());
    if !(utils::user_confirmation(
        skip_confirmation,
        "Do you want to proceed creating this batch?",
    )?) {
        return Ok(());
    }

    // Shuffled once up front; intra-batch ordering carries no guarantee.
    descriptors.shuffle(&mut rand::rng());

    let batch = Batch::new(descriptors)?;
    let tracker = ProgressTracker::new(batch.len() as u64, Some("Provisioning instances"));
    let report = engine::run_batch(&os, batch, &settings, &tracker).await?;
    tracker.finish_with_message("Batch finished");

    print_report(&report);
    Ok(())
}

async fn prompt_selection(os: &OpenStackInterface) -> Result<BatchSelection> {
    let images = os.list_images().await?;
    let image_options: Vec<String> = images.iter().map(|i| i.name.clone()).collect();
    let image_idx =
        utils::select_index("What base image would you like to use?", image_options)?;

    let flavors = os.list_flavors().await?;
    let flavor_options: Vec<String> = flavors.iter().map(|f| f.name.clone()).collect();
    let flavor_idx = utils::select_index("What flavor would you like to use?", flavor_options)?;

    let networks = os.tenant_networks().await?;
    let network_options: Vec<String> = networks.iter().map(|n| n.name.clone()).collect();
    let picked_networks = utils::select_many(
        "Which networks should the instances attach to?",
        network_options,
    )?;

    let availability_zone = prompt_availability_zone(os).await?;

    let count = match CustomType::<usize>::new("How many instances of this pair?")
        .with_error_message("Expecting a whole number of instances")
        .prompt()
    {
        Ok(count) => count,
        Err(e) => {
            error!("{}", e.to_string());
            bail!("Failure processing instance count")
        }
    };

    Ok(BatchSelection {
        image: images[image_idx].clone(),
        flavor: flavors[flavor_idx].clone(),
        networks: picked_networks,
        availability_zone,
        count,
    })
}

async fn prompt_availability_zone(os: &OpenStackInterface) -> Result<Option<String>> {
    match Confirm::new("Pin instances to a specific host?")
        .with_default(false)
        .prompt()
    {
        Ok(false) => return Ok(None),
        Ok(true) => {}
        Err(e) => {
            error!("{}", e.to_string());
            bail!("Failure processing user response")
        }
    }

    let zones = os.list_availability_zones().await?;
    let mut options: Vec<String> = vec![];
    for zone in &zones {
        for host in &zone.hosts {
            options.push(format!("{}:{}", zone.zone, host));
        }
    }
    if options.is_empty() {
        println!("No hosts visible, falling back to the scheduler default.");
        return Ok(None);
    }

    let idx = utils::select_index("Which host should the instances land on?", options.clone())?;
    Ok(Some(options[idx].clone()))
}

/// Expand the user's selections into uniquely named descriptors. The counter
/// is shared per (image, flavor) prefix so repeated pairs never collide.
fn expand_descriptors(selections: &[BatchSelection], key_name: &str) -> Vec<InstanceDescriptor> {
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut descriptors = vec![];

    for selection in selections {
        let prefix = format!(
            "{}_{}",
            sanitize(&selection.image.name),
            sanitize(&selection.flavor.name)
        );
        for _ in 0..selection.count {
            let counter = counters.entry(prefix.clone()).or_insert(0);
            let name = format!("{}_{}", prefix, counter);
            *counter += 1;

            descriptors.push(InstanceDescriptor {
                name,
                spec: InstanceSpec {
                    image_id: selection.image.id.clone(),
                    flavor_id: selection.flavor.id.clone(),
                    key_name: key_name.to_string(),
                    networks: selection.networks.clone(),
                },
                availability_zone: selection.availability_zone.clone(),
            });
        }
    }

    descriptors
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn print_selections(selections: &[BatchSelection]) {
    let rows: Vec<SelectionDisplay> = selections
        .iter()
        .map(|s| SelectionDisplay {
            image: s.image.name.clone(),
            flavor: s.flavor.name.clone(),
            networks: s.networks.join(", "),
            zone: s
                .availability_zone
                .clone()
                .unwrap_or_else(|| "(default)".to_string()),
            count: s.count,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("\nSelections so far:");
    println!("{}", table);
}

fn print_report(report: &BatchReport) {
    let mut rows: Vec<OutcomeDisplay> = vec![];
    for (name, renamed_to) in &report.active {
        rows.push(OutcomeDisplay {
            name: name.clone(),
            result: format!("ACTIVE as {}", renamed_to),
        });
    }
    for name in &report.externally_deleted {
        rows.push(OutcomeDisplay {
            name: name.clone(),
            result: "deleted externally".to_string(),
        });
    }
    for name in &report.abandoned {
        rows.push(OutcomeDisplay {
            name: name.clone(),
            result: "abandoned on timeout".to_string(),
        });
    }
    for name in &report.unresolved {
        rows.push(OutcomeDisplay {
            name: name.clone(),
            result: "unresolved".to_string(),
        });
    }

    if !rows.is_empty() {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("\n{}", table);
    }

    println!(
        "\n{} active, {} externally deleted, {} abandoned, {} unresolved \
         ({} passes, {} waves, {} swept)",
        report.active.len().to_string().green(),
        report.externally_deleted.len(),
        report.abandoned.len(),
        report.unresolved.len().to_string().red(),
        report.passes,
        report.waves,
        report.swept.len()
    );
    if !report.unresolved.is_empty() {
        println!(
            "{}",
            "Some instances never reached ACTIVE; see the log for details.".red()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(image: &str, flavor: &str, count: usize) -> BatchSelection {
        BatchSelection {
            image: ImageSummary {
                id: format!("{}-id", image),
                name: image.to_string(),
            },
            flavor: FlavorSummary {
                id: format!("{}-id", flavor),
                name: flavor.to_string(),
            },
            networks: vec!["internal".to_string()],
            availability_zone: None,
            count,
        }
    }

    #[test]
    fn repeated_pairs_keep_names_unique() {
        let selections = vec![
            selection("ubuntu 14.04", "m1.small", 2),
            selection("ubuntu 14.04", "m1.small", 2),
        ];

        let descriptors = expand_descriptors(&selections, "crank-key");
        let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "ubuntu-14.04_m1.small_0",
                "ubuntu-14.04_m1.small_1",
                "ubuntu-14.04_m1.small_2",
                "ubuntu-14.04_m1.small_3",
            ]
        );
        assert!(Batch::new(descriptors).is_ok());
    }

    #[test]
    fn descriptors_carry_the_selection_spec() {
        let descriptors = expand_descriptors(&[selection("cirros", "m1.tiny", 1)], "ops-key");
        let descriptor = &descriptors[0];
        assert_eq!(descriptor.spec.image_id, "cirros-id");
        assert_eq!(descriptor.spec.flavor_id, "m1.tiny-id");
        assert_eq!(descriptor.spec.key_name, "ops-key");
        assert_eq!(descriptor.spec.networks, vec!["internal".to_string()]);
    }
}
