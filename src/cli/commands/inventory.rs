//! Inventory commands
//!
//! Read-only views of device identity, interfaces, BGP and LLDP.

use super::CommandContext;
use anyhow::Result;
use netcommit::network::{Interface, LinkStatus, Switchport};

fn status(status: LinkStatus) -> String {
    match status {
        LinkStatus::Up => "up".to_string(),
        LinkStatus::Down => "down".to_string(),
    }
}

/// Show device identity.
pub async fn facts(ctx: &mut CommandContext) -> Result<i32> {
    let driver = ctx.connect().await?;
    let facts = driver.get_facts().await?;

    ctx.output.section(&facts.hostname);
    ctx.output.table(
        &["Field", "Value"],
        &[
            vec!["vendor".into(), facts.vendor.clone()],
            vec!["model".into(), facts.model.clone()],
            vec!["serial".into(), facts.serial_number.clone()],
            vec!["version".into(), facts.os_version.clone()],
            vec!["fqdn".into(), facts.fqdn.clone()],
            vec!["uptime".into(), format!("{:.0}s", facts.uptime)],
            vec!["interfaces".into(), facts.interface_list.len().to_string()],
        ],
    );
    ctx.output.data(&facts)?;
    Ok(0)
}

fn interface_detail(interface: &Interface) -> String {
    match &interface.switchport {
        Some(Switchport::Access { access_vlan }) => format!("access vlan {}", access_vlan),
        Some(Switchport::Trunk {
            native_vlan,
            trunk_vlans,
        }) => format!("trunk native {} ({} vlans)", native_vlan, trunk_vlans.len()),
        None => interface.ip_address_v4.join(", "),
    }
}

/// Show interface state.
pub async fn interfaces(ctx: &mut CommandContext) -> Result<i32> {
    let driver = ctx.connect().await?;
    let interfaces = driver.get_interfaces().await?;

    let rows: Vec<Vec<String>> = interfaces
        .iter()
        .map(|(name, i)| {
            vec![
                name.clone(),
                status(i.status),
                format!("{:?}", i.mode).to_lowercase(),
                interface_detail(i),
                i.description.clone(),
            ]
        })
        .collect();
    ctx.output
        .table(&["Interface", "Status", "Mode", "Detail", "Description"], &rows);
    ctx.output.data(&interfaces)?;
    Ok(0)
}

/// Show BGP neighbors.
pub async fn bgp(ctx: &mut CommandContext) -> Result<i32> {
    let driver = ctx.connect().await?;
    let vrfs = driver.get_bgp_neighbors().await?;

    for (vrf, data) in &vrfs {
        ctx.output.section(&format!(
            "VRF {} (router-id {}, AS {})",
            vrf, data.router_id, data.local_as
        ));
        let rows: Vec<Vec<String>> = data
            .peers
            .iter()
            .map(|(peer, p)| {
                vec![
                    peer.clone(),
                    p.remote_as.to_string(),
                    status(p.status),
                    p.rcvd_prefixes.to_string(),
                    p.sent_prefixes.to_string(),
                ]
            })
            .collect();
        ctx.output
            .table(&["Neighbor", "AS", "Status", "Received", "Sent"], &rows);
    }
    ctx.output.data(&vrfs)?;
    Ok(0)
}

/// Show LLDP neighbors.
pub async fn lldp(ctx: &mut CommandContext) -> Result<i32> {
    let driver = ctx.connect().await?;
    let neighbors = driver.get_lldp_neighbors().await?;

    let rows: Vec<Vec<String>> = neighbors
        .iter()
        .flat_map(|(port, list)| {
            list.iter().map(move |n| {
                vec![
                    port.clone(),
                    n.hostname.clone(),
                    n.port.clone(),
                    n.ttl.to_string(),
                ]
            })
        })
        .collect();
    ctx.output
        .table(&["Local port", "Neighbor", "Neighbor port", "TTL"], &rows);
    ctx.output.data(&neighbors)?;
    Ok(0)
}
