//! Read-only inventory getters.
//!
//! Device identity, interface state, BGP neighbors and LLDP neighbors,
//! reshaped from EOS command output into a vendor-neutral schema. None of
//! these touch the configuration lifecycle.

use super::parsers::{expand_vlan_range, leading_number, parse_colon_separated};
use crate::connection::{Command, CommandChannel, CommandOutput, OutputFormat};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Device identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facts {
    /// Manufacturer
    pub vendor: String,
    /// Hardware model
    pub model: String,
    /// Serial number
    pub serial_number: String,
    /// Software version
    pub os_version: String,
    /// Short hostname
    pub hostname: String,
    /// Fully qualified name
    pub fqdn: String,
    /// Seconds since boot
    pub uptime: f64,
    /// Interface names
    pub interface_list: Vec<String>,
}

/// Operational link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    /// Line protocol up
    Up,
    /// Anything else
    Down,
}

impl LinkStatus {
    fn from_protocol(status: &str) -> Self {
        if status == "up" {
            LinkStatus::Up
        } else {
            LinkStatus::Down
        }
    }
}

/// How an interface forwards traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardingModel {
    /// Layer 3 interface
    Routed,
    /// Layer 2 switchport
    Bridged,
    /// Any other model (e.g. link-aggregation member)
    Other,
}

impl ForwardingModel {
    fn from_device(model: &str) -> Self {
        match model {
            "routed" => ForwardingModel::Routed,
            "bridged" => ForwardingModel::Bridged,
            _ => ForwardingModel::Other,
        }
    }
}

/// Packet counters. `-1` when the device reports none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub tx_packets: i64,
    pub rx_packets: i64,
    pub tx_errors: i64,
    pub rx_errors: i64,
    pub tx_discards: i64,
    pub rx_discards: i64,
}

impl Default for InterfaceCounters {
    fn default() -> Self {
        Self {
            tx_packets: -1,
            rx_packets: -1,
            tx_errors: -1,
            rx_errors: -1,
            tx_discards: -1,
            rx_discards: -1,
        }
    }
}

impl InterfaceCounters {
    fn from_device(counters: &Value) -> Self {
        let get = |key: &str| counters.get(key).and_then(Value::as_i64).unwrap_or(0);
        Self {
            tx_packets: get("outUcastPkts") + get("outMulticastPkts") + get("outBroadcastPkts"),
            rx_packets: get("inUcastPkts") + get("inMulticastPkts") + get("inBroadcastPkts"),
            tx_errors: get("totalOutErrors"),
            rx_errors: get("totalInErrors"),
            tx_discards: get("outDiscards"),
            rx_discards: get("inDiscards"),
        }
    }
}

/// Layer 2 mode of a bridged interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Switchport {
    /// Untagged member of one VLAN
    Access {
        /// Access VLAN
        access_vlan: u32,
    },
    /// Tagged member of several VLANs
    Trunk {
        /// Native VLAN
        native_vlan: u32,
        /// Allowed VLANs
        trunk_vlans: Vec<u16>,
    },
}

/// State of one interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub description: String,
    pub status: LinkStatus,
    /// Epoch seconds of the last state change, `-1` if never
    pub last_flapped: f64,
    pub mode: ForwardingModel,
    pub counters: InterfaceCounters,
    /// Primary and secondary addresses in CIDR form (routed only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_address_v4: Vec<String>,
    /// Switchport details (bridged only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switchport: Option<Switchport>,
}

/// BGP session state of one peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BgpPeer {
    pub status: LinkStatus,
    pub remote_as: u32,
    /// Epoch seconds of the last up/down transition
    pub uptime: f64,
    pub rcvd_prefixes: u64,
    pub sent_prefixes: u64,
}

/// BGP state of one VRF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BgpVrf {
    pub router_id: String,
    pub local_as: u32,
    pub peers: IndexMap<String, BgpPeer>,
}

/// One LLDP neighbor seen on a local port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LldpNeighbor {
    pub hostname: String,
    pub port: String,
    pub ttl: u32,
}

// ============================================================================
// Per-interface detail queries
// ============================================================================

/// Extra query run for interfaces of one forwarding model.
struct DetailQuery {
    model: ForwardingModel,
    format: OutputFormat,
    command: fn(&str) -> String,
    apply: fn(&mut Interface, &CommandOutput) -> Result<()>,
}

/// Detail queries keyed by forwarding model. Models without an entry need
/// nothing beyond `show interfaces`.
static DETAIL_QUERIES: &[DetailQuery] = &[DetailQuery {
    model: ForwardingModel::Bridged,
    format: OutputFormat::Text,
    command: switchport_command,
    apply: apply_switchport,
}];

fn detail_query(model: ForwardingModel) -> Option<&'static DetailQuery> {
    DETAIL_QUERIES.iter().find(|q| q.model == model)
}

fn switchport_command(interface: &str) -> String {
    format!("show interfaces {} switchport", interface)
}

fn apply_switchport(interface: &mut Interface, output: &CommandOutput) -> Result<()> {
    let data = parse_colon_separated(output.output());
    let field = |key: &str| data.get(key).cloned().flatten().unwrap_or_default();

    interface.switchport = match field("Operational Mode").as_str() {
        "static access" => Some(Switchport::Access {
            access_vlan: leading_number(&field("Access Mode VLAN")).unwrap_or(1),
        }),
        "trunk" => Some(Switchport::Trunk {
            native_vlan: leading_number(&field("Trunking Native Mode VLAN")).unwrap_or(1),
            trunk_vlans: expand_vlan_range(&field("Trunking VLANs Enabled"))?,
        }),
        _ => None,
    };
    Ok(())
}

// ============================================================================
// Getters
// ============================================================================

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// ASNs come back as numbers on some releases and strings on others.
fn asn_field(value: &Value, key: &str) -> u32 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn object<'a>(value: &'a Value, key: &str, command: &str) -> Result<&'a serde_json::Map<String, Value>> {
    value
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| Error::parse(command, format!("missing '{}' object", key)))
}

/// Collect device identity.
pub async fn get_facts<C>(channel: &C) -> Result<Facts>
where
    C: CommandChannel + ?Sized,
{
    let commands = [
        Command::from("show version"),
        Command::from("show hostname"),
        Command::from("show interfaces status"),
    ];
    let outputs = channel.run_commands(&commands, OutputFormat::Json).await?;
    let [version, hostname, status] = outputs.as_slice() else {
        return Err(Error::parse("show version", "expected three results"));
    };

    let boot = version
        .value()
        .get("bootupTimestamp")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;

    let interface_list = object(status.value(), "interfaceStatuses", "show interfaces status")?
        .keys()
        .cloned()
        .collect();

    Ok(Facts {
        vendor: "Arista".to_string(),
        model: str_field(version.value(), "modelName"),
        serial_number: str_field(version.value(), "serialNumber"),
        os_version: str_field(version.value(), "internalVersion"),
        hostname: str_field(hostname.value(), "hostname"),
        fqdn: str_field(hostname.value(), "fqdn"),
        uptime: (now - boot).max(0.0),
        interface_list,
    })
}

/// Collect interface state, including switchport details for bridged
/// interfaces.
pub async fn get_interfaces<C>(channel: &C) -> Result<IndexMap<String, Interface>>
where
    C: CommandChannel + ?Sized,
{
    let command = "show interfaces";
    let value = channel.run_json(command).await?;

    let mut interfaces = IndexMap::new();
    for (name, values) in object(&value, "interfaces", command)? {
        let mode = ForwardingModel::from_device(&str_field(values, "forwardingModel"));
        let counters = values
            .get("interfaceCounters")
            .map(InterfaceCounters::from_device)
            .unwrap_or_default();

        let mut ip_address_v4 = Vec::new();
        if mode == ForwardingModel::Routed {
            if let Some(address) = values
                .get("interfaceAddress")
                .and_then(Value::as_array)
                .and_then(|a| a.first())
            {
                if let Some(primary) = address.get("primaryIp") {
                    let ip = str_field(primary, "address");
                    if !ip.is_empty() && ip != "0.0.0.0" {
                        ip_address_v4.push(format!("{}/{}", ip, asn_field(primary, "maskLen")));
                    }
                }
                if let Some(secondaries) = address.get("secondaryIps").and_then(Value::as_object) {
                    for (ip, details) in secondaries {
                        ip_address_v4.push(format!("{}/{}", ip, asn_field(details, "maskLen")));
                    }
                }
            }
        }

        interfaces.insert(
            name.clone(),
            Interface {
                description: str_field(values, "description"),
                status: LinkStatus::from_protocol(&str_field(values, "lineProtocolStatus")),
                last_flapped: values
                    .get("lastStatusChangeTimestamp")
                    .and_then(Value::as_f64)
                    .unwrap_or(-1.0),
                mode,
                counters,
                ip_address_v4,
                switchport: None,
            },
        );
    }

    for query in DETAIL_QUERIES {
        let targets: Vec<String> = interfaces
            .iter()
            .filter(|(_, i)| detail_query(i.mode).is_some_and(|q| q.model == query.model))
            .map(|(name, _)| name.clone())
            .collect();
        if targets.is_empty() {
            continue;
        }

        debug!(model = ?query.model, count = targets.len(), "querying interface details");
        let commands: Vec<Command> = targets
            .iter()
            .map(|name| Command::from((query.command)(name)))
            .collect();
        let outputs = channel.run_commands(&commands, query.format).await?;

        for (name, output) in targets.iter().zip(outputs.iter()) {
            if let Some(interface) = interfaces.get_mut(name) {
                (query.apply)(interface, output)?;
            }
        }
    }

    Ok(interfaces)
}

/// Collect BGP neighbor state for every VRF.
pub async fn get_bgp_neighbors<C>(channel: &C) -> Result<IndexMap<String, BgpVrf>>
where
    C: CommandChannel + ?Sized,
{
    let command = "show ip bgp summary vrf all";
    let value = channel.run_json(command).await?;

    let mut vrfs = IndexMap::new();
    let mut prefix_queries = Vec::new();

    for (vrf, vrf_data) in object(&value, "vrfs", command)? {
        let mut peers = IndexMap::new();
        if let Some(peer_map) = vrf_data.get("peers").and_then(Value::as_object) {
            for (peer, peer_data) in peer_map {
                peers.insert(
                    peer.clone(),
                    BgpPeer {
                        status: if str_field(peer_data, "peerState") == "Established" {
                            LinkStatus::Up
                        } else {
                            LinkStatus::Down
                        },
                        remote_as: asn_field(peer_data, "asn"),
                        uptime: peer_data
                            .get("upDownTime")
                            .and_then(Value::as_f64)
                            .unwrap_or(-1.0),
                        rcvd_prefixes: 0,
                        sent_prefixes: 0,
                    },
                );
                prefix_queries.push((vrf.clone(), peer.clone()));
            }
        }

        vrfs.insert(
            vrf.clone(),
            BgpVrf {
                router_id: str_field(vrf_data, "routerId"),
                local_as: asn_field(vrf_data, "asn"),
                peers,
            },
        );
    }

    if prefix_queries.is_empty() {
        return Ok(vrfs);
    }

    let commands: Vec<Command> = prefix_queries
        .iter()
        .map(|(vrf, peer)| Command::from(format!("show ip bgp neighbors {} vrf {}", peer, vrf)))
        .collect();
    let outputs = channel.run_commands(&commands, OutputFormat::Text).await?;

    for ((vrf, peer), output) in prefix_queries.iter().zip(outputs.iter()) {
        let details = parse_colon_separated(output.output());
        let counts = details
            .get("IPv4 Unicast")
            .cloned()
            .flatten()
            .unwrap_or_default();
        let mut numbers = counts.split_whitespace().map(|n| n.parse::<u64>().unwrap_or(0));
        let sent = numbers.next().unwrap_or(0);
        let rcvd = numbers.next().unwrap_or(0);

        if let Some(entry) = vrfs.get_mut(vrf).and_then(|v| v.peers.get_mut(peer)) {
            entry.sent_prefixes = sent;
            entry.rcvd_prefixes = rcvd;
        }
    }

    Ok(vrfs)
}

/// Collect LLDP neighbors grouped by local port.
pub async fn get_lldp_neighbors<C>(channel: &C) -> Result<IndexMap<String, Vec<LldpNeighbor>>>
where
    C: CommandChannel + ?Sized,
{
    let command = "show lldp neighbors";
    let value = channel.run_json(command).await?;
    let neighbors = value
        .get("lldpNeighbors")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::parse(command, "missing 'lldpNeighbors' list"))?;

    let mut lldp: IndexMap<String, Vec<LldpNeighbor>> = IndexMap::new();
    for neighbor in neighbors {
        lldp.entry(str_field(neighbor, "port"))
            .or_default()
            .push(LldpNeighbor {
                hostname: str_field(neighbor, "neighborDevice"),
                port: str_field(neighbor, "neighborPort"),
                ttl: asn_field(neighbor, "ttl"),
            });
    }
    Ok(lldp)
}
