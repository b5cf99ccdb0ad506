//! Connectivity probe across declared hosts

use anyhow::{Result, bail};
use colored::Colorize;
use rayon::prelude::*;
use reconcile::Host;

use crate::Context;
use crate::declarations::Declarations;
use crate::paths;
use crate::progress;
use crate::transport::SshConnector;
use crate::ui;

/// Outcome for one host
struct Probe {
    name: String,
    destination: String,
    latency: Option<std::time::Duration>,
    error: Option<String>,
}

/// Hosts matching the optional name and group filters
fn select<'a>(hosts: &'a [Host], name: Option<&str>, group: Option<&str>) -> Vec<&'a Host> {
    hosts
        .iter()
        .filter(|h| name.is_none_or(|n| h.name == n))
        .filter(|h| group.is_none_or(|g| h.group.as_deref() == Some(g)))
        .collect()
}

fn probe(connector: &SshConnector, host: &Host) -> Probe {
    match connector.client(host) {
        Ok(client) => {
            let result = sshkit::ping(&client);
            let error = result.error.map(|e| {
                let category = e.category();
                format!("{}: {}", category.description(), ui::truncate(&e.to_string(), 80))
            });
            Probe {
                name: host.name.clone(),
                destination: result.destination,
                latency: error.is_none().then_some(result.latency),
                error,
            }
        }
        Err(e) => Probe {
            name: host.name.clone(),
            destination: host.destination(),
            latency: None,
            error: Some(e.to_string()),
        },
    }
}

pub fn run(ctx: &Context, name: Option<&str>, group: Option<&str>) -> Result<()> {
    let file = paths::declarations_file(ctx.file.as_deref());
    let declarations = Declarations::load(&file)?;
    let hosts = declarations.hosts();
    let selected = select(&hosts, name, group);

    if selected.is_empty() {
        bail!("No hosts match the given filters");
    }

    let connector = super::connector(ctx);
    let pb = if ctx.quiet {
        progress::hidden()
    } else {
        progress::bar(selected.len() as u64, "Pinging")
    };

    // Every probe finishes before anything is printed
    let probes: Vec<Probe> = selected
        .par_iter()
        .map(|host| {
            let result = probe(&connector, host);
            pb.set_message(result.name.clone());
            pb.inc(1);
            result
        })
        .collect();

    let failed = probes.iter().filter(|p| p.error.is_some()).count();
    let reachable = probes.len() - failed;

    if failed == 0 {
        progress::finish_success(&pb, &format!("{reachable} hosts reachable"));
    } else if reachable == 0 {
        progress::finish_error(&pb, &format!("{failed} hosts unreachable"));
    } else {
        progress::finish_warn(&pb, &format!("{reachable} reachable, {failed} unreachable"));
    }

    for probe in &probes {
        match (&probe.error, probe.latency) {
            (None, Some(latency)) if !ctx.quiet => println!(
                "  {} {:<20} {} {}",
                "✓".green(),
                probe.name,
                probe.destination.dimmed(),
                ui::format_duration(latency).dimmed()
            ),
            (Some(error), _) => println!(
                "  {} {:<20} {} {}",
                "✗".red(),
                probe.name,
                probe.destination.dimmed(),
                error.red()
            ),
            _ => {}
        }
    }

    if !ctx.quiet {
        println!();
        ui::kv("Success", &reachable.to_string());
        ui::kv("Failure", &failed.to_string());
    }

    if failed > 0 {
        bail!("{failed} of {} hosts unreachable", probes.len());
    }
    Ok(())
}
