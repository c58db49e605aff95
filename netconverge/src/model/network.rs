//! Machine graph construction.
//!
//! `NetworkGraph::build` is the only place machines are created. It validates
//! every input field it turns into a model value and resolves the references
//! that can be checked without addresses (admins, hypervisors). The returned
//! graph is never mutated again: the topology and firewall passes read it and
//! produce their own values.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use serde::Serialize;
use tracing::debug;

use crate::data::{DeviceData, FirewallData, InterfaceData, NetworkData, ServerData, UserData};
use crate::error::{DataError, Error, TopologyError};
use crate::model::traffic::{split_target, ANY};
use crate::model::{
    Direction, DiskMedium, DiskSpec, Encapsulation, IfaceKind, InterfaceBuilder, Ipv4Net,
    LanConnection, MacAddress, MachineModel, MachineType, NetworkInterfaceModel, PortSet,
    ServiceSpec, Table, TrafficRule, UserAccount, WanConnection,
};
use crate::settings::Settings;

pub const DEFAULT_DOMAIN: &str = "lan";
pub const DEFAULT_UPSTREAM_DNS: [Ipv4Addr; 2] = [Ipv4Addr::new(9, 9, 9, 9), Ipv4Addr::new(149, 112, 112, 112)];
pub const SSH_PORT: i64 = 22;

/// Index of a machine in its graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MachineId(pub usize);

/// Every machine of one network, keyed by label.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkGraph {
    pub name: String,
    pub domain: String,
    pub upstream_dns: Vec<Ipv4Addr>,
    pub adblocking: bool,
    pub autoguest: bool,
    pub autogenpasswds: bool,
    machines: Vec<MachineModel>,
    index: BTreeMap<String, MachineId>,
}

impl NetworkGraph {
    pub fn machine(&self, id: MachineId) -> &MachineModel {
        &self.machines[id.0]
    }

    pub fn id(&self, label: &str) -> Option<MachineId> {
        self.index.get(label).copied()
    }

    pub fn get(&self, label: &str) -> Option<&MachineModel> {
        self.id(label).map(|id| self.machine(id))
    }

    /// Machines in arena order, which is input order within each section.
    pub fn machines(&self) -> impl Iterator<Item = (MachineId, &MachineModel)> {
        self.machines
            .iter()
            .enumerate()
            .map(|(idx, m)| (MachineId(idx), m))
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn of_type(&self, machine_type: MachineType) -> impl Iterator<Item = (MachineId, &MachineModel)> {
        self.machines().filter(move |(_, m)| m.is(machine_type))
    }

    pub fn routers(&self) -> Vec<(MachineId, &MachineModel)> {
        self.of_type(MachineType::Router).collect()
    }

    /// Services hosted on `hypervisor`.
    pub fn services_on<'a>(&'a self, hypervisor: &'a str) -> impl Iterator<Item = &'a MachineModel> {
        self.machines.iter().filter(move |m| {
            m.service
                .as_ref()
                .is_some_and(|s| s.hypervisor == hypervisor)
        })
    }

    /// Build and validate the graph for one network.
    pub fn build(name: &str, data: &NetworkData, settings: &Settings) -> Result<Self, Error> {
        let domain = data
            .domain
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string());
        let upstream_dns = if data.upstreamdns.is_empty() {
            DEFAULT_UPSTREAM_DNS.to_vec()
        } else {
            data.upstreamdns
                .iter()
                .map(|raw| parse_ip(name, "upstreamdns", raw))
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut builder = GraphBuilder {
            graph: NetworkGraph {
                name: name.to_string(),
                domain,
                upstream_dns,
                adblocking: data.adblocking,
                autoguest: data.autoguest,
                autogenpasswds: data.autogenpasswds,
                machines: Vec::new(),
                index: BTreeMap::new(),
            },
            settings,
        };

        let admins = collect_admins(data)?;

        for (label, server) in &data.servers {
            builder.add_server(label, server)?;
        }
        for (label, device) in &data.internaldevices {
            builder.add_device(label, device, MachineType::InternalOnly)?;
        }
        for (label, device) in &data.externaldevices {
            builder.add_device(label, device, MachineType::ExternalOnly)?;
        }
        for (label, user) in &data.users {
            builder.add_user(label, user, admins.contains(label.as_str()))?;
        }

        builder.check_macs()?;
        builder.check_hypervisors()?;
        builder.add_admin_access()?;

        debug!(network = name, machines = builder.graph.len(), "built machine graph");
        Ok(builder.graph)
    }
}

struct GraphBuilder<'a> {
    graph: NetworkGraph,
    settings: &'a Settings,
}

impl GraphBuilder<'_> {
    fn insert(&mut self, machine: MachineModel) -> Result<(), DataError> {
        if self.graph.index.contains_key(&machine.label) {
            return Err(DataError::DuplicateLabel {
                label: machine.label,
            });
        }
        let id = MachineId(self.graph.machines.len());
        self.graph.index.insert(machine.label.clone(), id);
        self.graph.machines.push(machine);
        Ok(())
    }

    fn blank(&self, label: &str, types: BTreeSet<MachineType>) -> Result<MachineModel, DataError> {
        validate_label(label)?;
        Ok(MachineModel {
            label: label.to_string(),
            types,
            fqdn: format!("{label}.{}", self.graph.domain),
            cnames: Vec::new(),
            email: None,
            throttled: false,
            lan: Vec::new(),
            wan: Vec::new(),
            listen: Vec::new(),
            ingress: Vec::new(),
            egress: Vec::new(),
            forward: Vec::new(),
            dnat: Vec::new(),
            external_ip: None,
            admins: Vec::new(),
            profiles: Vec::new(),
            connection: LanConnection::Dhcp,
            wan_connection: None,
            service: None,
            account: None,
        })
    }

    fn add_server(&mut self, label: &str, data: &ServerData) -> Result<(), Error> {
        let types = server_types(label, &data.types)?;
        let mut machine = self.blank(label, types)?;
        machine.cnames = data.cnames.clone();
        machine.email = data.email.clone();
        machine.admins = data.admins.clone();
        machine.profiles = data.profiles.clone();
        machine.throttled = data.firewall.throttle;
        machine.connection = match data.connection.as_deref() {
            None | Some("dhcp") => LanConnection::Dhcp,
            Some("static") => LanConnection::Static,
            Some(other) => return Err(invalid(label, "connection", other, "static or dhcp").into()),
        };

        if machine.is_router() {
            let wan_connection = match data.extconnection.as_deref() {
                None | Some("dhcp") => WanConnection::Dhcp,
                Some("static") => WanConnection::Static,
                Some(other) => {
                    return Err(invalid(label, "extconnection", other, "dhcp or static").into())
                }
            };
            machine.wan_connection = Some(wan_connection);
        }

        if machine.is(MachineType::Service) {
            machine.service = Some(service_spec(label, data)?);
        }

        let mut seen = BTreeSet::new();
        for (iface, iface_data) in &data.networkinterfaces.lan {
            if !seen.insert(iface.clone()) {
                return Err(DataError::DuplicateInterface {
                    label: label.to_string(),
                    iface: iface.clone(),
                }
                .into());
            }
            let lan = lan_interface(&machine, iface, iface_data)?;
            machine.lan.push(lan);
        }
        if machine.lan.is_empty() && !machine.is_router() {
            let data = InterfaceData {
                mac: data.mac.clone(),
                ..InterfaceData::default()
            };
            let lan = lan_interface(&machine, "lan0", &data)?;
            machine.lan.push(lan);
        }
        for (iface, iface_data) in &data.networkinterfaces.wan {
            if !seen.insert(iface.clone()) {
                return Err(DataError::DuplicateInterface {
                    label: label.to_string(),
                    iface: iface.clone(),
                }
                .into());
            }
            let wan = wan_interface(&machine, iface, iface_data)?;
            machine.wan.push(wan);
        }

        self.add_firewall(&mut machine, &data.firewall)?;
        self.insert(machine)?;
        Ok(())
    }

    fn add_device(
        &mut self,
        label: &str,
        data: &DeviceData,
        machine_type: MachineType,
    ) -> Result<(), Error> {
        let types = BTreeSet::from([MachineType::Device, machine_type]);
        let mut machine = self.blank(label, types)?;
        machine.cnames = data.cnames.clone();
        machine.email = data.email.clone();
        machine.throttled = data.throttle;
        machine.lan = device_interfaces(label, &data.macs)?;

        if machine_type == MachineType::ExternalOnly {
            machine
                .egress
                .push(TrafficRule::new(Encapsulation::Tcp, Table::Egress, label, [ANY], &[])?);
            machine
                .egress
                .push(TrafficRule::new(Encapsulation::Udp, Table::Egress, label, [ANY], &[])?);
        }
        for target in &data.allow_egress_to {
            machine.egress.push(self.egress_rule(label, target)?);
        }
        self.insert(machine)?;
        Ok(())
    }

    fn add_user(&mut self, label: &str, data: &UserData, is_admin: bool) -> Result<(), Error> {
        let mut types = BTreeSet::from([MachineType::User]);
        if is_admin {
            types.insert(MachineType::Admin);
        }
        let mut machine = self.blank(label, types)?;
        machine.email = data.email.clone();
        machine.account = Some(UserAccount {
            fullname: data.fullname.clone().unwrap_or_else(|| label.to_string()),
            sshkey: data.sshkey.clone(),
        });
        if !data.macs.is_empty() {
            machine.lan = device_interfaces(label, &data.macs)?;
            machine.types.insert(MachineType::Device);
            machine
                .egress
                .push(TrafficRule::new(Encapsulation::Tcp, Table::Egress, label, [ANY], &[])?);
            machine
                .egress
                .push(TrafficRule::new(Encapsulation::Udp, Table::Egress, label, [ANY], &[])?);
        }
        self.insert(machine)?;
        Ok(())
    }

    fn add_firewall(&self, machine: &mut MachineModel, fw: &FirewallData) -> Result<(), Error> {
        let label = machine.label.clone();
        if !fw.listen.tcp.is_empty() {
            let ports = PortSet::new(&label, "listen.tcp", &fw.listen.tcp)?;
            machine.listen.push(
                TrafficRule::new(Encapsulation::Tcp, Table::Ingress, ANY, [label.clone()], &[])?
                    .with_ports(ports),
            );
        }
        if !fw.listen.udp.is_empty() {
            let ports = PortSet::new(&label, "listen.udp", &fw.listen.udp)?;
            machine.listen.push(
                TrafficRule::new(Encapsulation::Udp, Table::Ingress, ANY, [label.clone()], &[])?
                    .with_ports(ports),
            );
        }
        let listen_tcp = machine.listen_ports(Encapsulation::Tcp);

        for raw in &fw.allow_ingress_from {
            let (source, port) = split_target(&label, "allow_ingress_from", raw)?;
            let ports = match port {
                Some(port) => PortSet::new(&label, "allow_ingress_from", &[i64::from(port)])?,
                None if !listen_tcp.is_any() => listen_tcp.clone(),
                None => {
                    return Err(invalid(
                        &label,
                        "allow_ingress_from",
                        raw,
                        "name:port, or listen.tcp ports to open",
                    )
                    .into())
                }
            };
            machine.ingress.push(
                TrafficRule::new(Encapsulation::Tcp, Table::Ingress, source, [label.clone()], &[])?
                    .with_ports(ports),
            );
        }

        for raw in &fw.allow_egress_to {
            machine.egress.push(self.egress_rule(&label, raw)?);
        }

        for raw in &fw.allow_forward_to {
            let (target, port) = split_target(&label, "allow_forward_to", raw)?;
            let ports: Vec<i64> = port.map(i64::from).into_iter().collect();
            machine.forward.push(TrafficRule::new(
                Encapsulation::Tcp,
                Table::Forward,
                label.clone(),
                [target],
                &ports,
            )?);
        }

        if !fw.dnat_to.is_empty() {
            if listen_tcp.is_any() {
                return Err(invalid(&label, "dnat_to", &fw.dnat_to.join(","), "listen.tcp ports to redirect").into());
            }
            let mut targets = Vec::new();
            for raw in &fw.dnat_to {
                let (target, _) = split_target(&label, "dnat_to", raw)?;
                targets.push(target);
            }
            machine.dnat.push(
                TrafficRule::new(Encapsulation::Tcp, Table::Dnat, label.clone(), targets, &[])?
                    .with_ports(listen_tcp.clone()),
            );
        }

        if let Some(raw) = &fw.external_ip {
            machine.external_ip = Some(parse_ip(&label, "firewall.external_ip", raw)?);
        }
        Ok(())
    }

    fn egress_rule(&self, label: &str, raw: &str) -> Result<TrafficRule, DataError> {
        let (target, port) = split_target(label, "allow_egress_to", raw)?;
        let ports: Vec<i64> = match port {
            Some(port) => vec![i64::from(port)],
            None => self
                .settings
                .egress
                .default_ports
                .iter()
                .map(|p| i64::from(*p))
                .collect(),
        };
        TrafficRule::new(Encapsulation::Tcp, Table::Egress, label, [target], &ports)
    }

    /// A MAC identifies one interface in the whole network.
    fn check_macs(&self) -> Result<(), DataError> {
        let mut owners: BTreeMap<MacAddress, &str> = BTreeMap::new();
        for (_, machine) in self.graph.machines() {
            for iface in machine.interfaces() {
                let Some(mac) = iface.mac else { continue };
                if let Some(other) = owners.insert(mac, machine.label.as_str()) {
                    return Err(DataError::DuplicateMac {
                        label: machine.label.clone(),
                        field: format!("{}.mac", iface.name),
                        mac: mac.to_string(),
                        other: other.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_hypervisors(&self) -> Result<(), TopologyError> {
        for machine in &self.graph.machines {
            let Some(service) = &machine.service else {
                continue;
            };
            let hosted = self
                .graph
                .get(&service.hypervisor)
                .is_some_and(|h| h.is(MachineType::Hypervisor));
            if !hosted {
                return Err(TopologyError::UnknownHypervisor {
                    label: machine.label.clone(),
                    hypervisor: service.hypervisor.clone(),
                });
            }
        }
        Ok(())
    }

    /// Admins with devices may reach the servers they administer over SSH.
    fn add_admin_access(&mut self) -> Result<(), DataError> {
        let mut grants: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for server in &self.graph.machines {
            for admin in &server.admins {
                grants
                    .entry(admin.clone())
                    .or_default()
                    .insert(server.label.clone());
            }
        }
        for (admin, servers) in grants {
            let Some(id) = self.graph.id(&admin) else {
                continue;
            };
            let machine = &mut self.graph.machines[id.0];
            if machine.lan.is_empty() {
                continue;
            }
            machine.forward.push(TrafficRule::new(
                Encapsulation::Tcp,
                Table::Forward,
                admin.clone(),
                servers,
                &[SSH_PORT],
            )?);
        }
        Ok(())
    }
}

fn collect_admins(data: &NetworkData) -> Result<BTreeSet<&str>, DataError> {
    let mut admins = BTreeSet::new();
    for (label, server) in &data.servers {
        for user in &server.admins {
            if !data.users.contains_key(user) {
                return Err(DataError::MissingUser {
                    label: label.clone(),
                    field: "admins".to_string(),
                    user: user.clone(),
                });
            }
            admins.insert(user.as_str());
        }
    }
    Ok(admins)
}

fn validate_label(label: &str) -> Result<(), DataError> {
    let valid = !label.is_empty()
        && label.len() <= 63
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && !label.starts_with('-');
    if valid {
        Ok(())
    } else {
        Err(DataError::InvalidLabel {
            label: label.to_string(),
        })
    }
}

fn server_types(label: &str, raw: &[String]) -> Result<BTreeSet<MachineType>, DataError> {
    if raw.is_empty() {
        return Err(DataError::MissingField {
            label: label.to_string(),
            field: "types".to_string(),
        });
    }
    let mut types = BTreeSet::new();
    for name in raw {
        match name.trim().to_ascii_lowercase().as_str() {
            "router" => {
                types.insert(MachineType::Router);
            }
            "hypervisor" => {
                types.extend([MachineType::Server, MachineType::Hypervisor]);
            }
            "dedicated" => {
                types.extend([MachineType::Server, MachineType::Dedicated]);
            }
            "service" => {
                types.extend([MachineType::Server, MachineType::Service]);
            }
            _ => {
                return Err(invalid(
                    label,
                    "types",
                    name,
                    "router, hypervisor, dedicated or service",
                ))
            }
        }
    }
    Ok(types)
}

fn service_spec(label: &str, data: &ServerData) -> Result<ServiceSpec, DataError> {
    let hypervisor = data.hypervisor.clone().ok_or_else(|| DataError::MissingField {
        label: label.to_string(),
        field: "hypervisor".to_string(),
    })?;
    let ram_mb = positive(label, "ram", data.ram.unwrap_or(1024))?;
    let cpus = positive(label, "cpus", data.cpus.unwrap_or(1))?;
    let backup_hours = data
        .backups
        .map(|hours| positive(label, "backups", hours))
        .transpose()?;

    let mut disks = Vec::new();
    for (name, disk) in &data.disks {
        let medium = match disk.medium.as_deref() {
            None | Some("disk") => DiskMedium::Disk,
            Some("dvd") => DiskMedium::Dvd,
            Some(other) => return Err(invalid(label, "disks.medium", other, "disk or dvd")),
        };
        let format = disk.format.clone().unwrap_or_else(|| "qcow2".to_string());
        if !matches!(format.as_str(), "qcow2" | "raw" | "vdi" | "vmdk") {
            return Err(invalid(label, "disks.format", &format, "qcow2, raw, vdi or vmdk"));
        }
        let filename = disk
            .filename
            .clone()
            .unwrap_or_else(|| format!("{label}_{name}.{format}"));
        let size_mb = positive(label, "disks.size", disk.size.unwrap_or(8192))?;
        disks.push(DiskSpec {
            name: name.clone(),
            medium,
            format,
            filename,
            size_mb,
        });
    }
    if disks.is_empty() {
        disks.push(DiskSpec {
            name: "boot".to_string(),
            medium: DiskMedium::Disk,
            format: "qcow2".to_string(),
            filename: format!("{label}_boot.qcow2"),
            size_mb: 8192,
        });
    }

    Ok(ServiceSpec {
        hypervisor,
        ram_mb,
        cpus,
        disks,
        backup_hours,
        debian_mirror: data
            .debianmirror
            .clone()
            .unwrap_or_else(|| "deb.debian.org".to_string()),
        debian_directory: data
            .debiandirectory
            .clone()
            .unwrap_or_else(|| "/debian".to_string()),
    })
}

fn lan_interface(
    machine: &MachineModel,
    iface: &str,
    data: &InterfaceData,
) -> Result<NetworkInterfaceModel, DataError> {
    let label = machine.label.as_str();
    let mac = parse_mac(label, iface, data.mac.as_deref())?;
    let address = data
        .address
        .as_deref()
        .map(|raw| parse_ip(label, "networkinterfaces.lan.address", raw))
        .transpose()?;

    let kind = if machine.is_router() {
        IfaceKind::Manual
    } else if address.is_some() || machine.connection == LanConnection::Static {
        IfaceKind::Static
    } else {
        IfaceKind::Dhcp
    };
    if machine.is_router() && address.is_some() {
        return Err(DataError::InvalidInterface {
            label: label.to_string(),
            iface: iface.to_string(),
            reason: "router LAN ports are VLAN carriers and take no address".to_string(),
        });
    }

    let mut builder = InterfaceBuilder::new(iface, kind, Direction::Lan).mac(mac);
    if let Some(address) = address {
        builder = builder
            .address(address)
            .subnet(parse_subnet(label, data.subnet.as_deref(), address)?)
            .gateway(
                data.gateway
                    .as_deref()
                    .map(|raw| parse_ip(label, "networkinterfaces.lan.gateway", raw))
                    .transpose()?,
            );
    }
    builder.build(label)
}

fn wan_interface(
    machine: &MachineModel,
    iface: &str,
    data: &InterfaceData,
) -> Result<NetworkInterfaceModel, DataError> {
    let label = machine.label.as_str();
    let mac = parse_mac(label, iface, data.mac.as_deref())?;
    let connection = machine.wan_connection.unwrap_or(WanConnection::Dhcp);
    let is_router = machine.is_router();

    let builder = match connection {
        WanConnection::Dhcp => InterfaceBuilder::new(iface, IfaceKind::Dhcp, Direction::Wan),
        WanConnection::Static => {
            let raw = data.address.as_deref().ok_or_else(|| DataError::MissingField {
                label: label.to_string(),
                field: format!("networkinterfaces.wan.{iface}.address"),
            })?;
            let address = parse_ip(label, "networkinterfaces.wan.address", raw)?;
            let gateway = data
                .gateway
                .as_deref()
                .ok_or_else(|| DataError::MissingField {
                    label: label.to_string(),
                    field: format!("networkinterfaces.wan.{iface}.gateway"),
                })
                .and_then(|raw| parse_ip(label, "networkinterfaces.wan.gateway", raw))?;
            InterfaceBuilder::new(iface, IfaceKind::Static, Direction::Wan)
                .address(address)
                .subnet(parse_subnet(label, data.subnet.as_deref(), address)?)
                .gateway(Some(gateway))
                .broadcast(
                    data.broadcast
                        .as_deref()
                        .map(|raw| parse_ip(label, "networkinterfaces.wan.broadcast", raw))
                        .transpose()?,
                )
        }
    };

    builder
        .mac(mac)
        .ip_forwarding(is_router)
        .ip_masquerading(is_router)
        .build(label)
}

fn device_interfaces(label: &str, macs: &[String]) -> Result<Vec<NetworkInterfaceModel>, DataError> {
    if macs.is_empty() {
        return Ok(vec![InterfaceBuilder::new("lan0", IfaceKind::Dhcp, Direction::Lan)
            .build(label)?]);
    }
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for (idx, raw) in macs.iter().enumerate() {
        let iface = format!("lan{idx}");
        let mac = parse_mac(label, &iface, Some(raw))?;
        if !seen.insert(mac) {
            return Err(invalid(label, "macs", raw, "each MAC listed once"));
        }
        out.push(
            InterfaceBuilder::new(iface, IfaceKind::Dhcp, Direction::Lan)
                .mac(mac)
                .build(label)?,
        );
    }
    Ok(out)
}

fn parse_ip(label: &str, field: &str, raw: &str) -> Result<Ipv4Addr, DataError> {
    raw.trim().parse().map_err(|_| DataError::InvalidIp {
        label: label.to_string(),
        field: field.to_string(),
        value: raw.to_string(),
    })
}

fn parse_mac(label: &str, iface: &str, raw: Option<&str>) -> Result<Option<MacAddress>, DataError> {
    raw.map(|raw| {
        raw.parse().map_err(|_| DataError::InvalidMac {
            label: label.to_string(),
            field: format!("{iface}.mac"),
            value: raw.to_string(),
        })
    })
    .transpose()
}

/// Accepts `a.b.c.d/len`, a bare prefix length, or a dotted netmask.
fn parse_subnet(label: &str, raw: Option<&str>, address: Ipv4Addr) -> Result<Option<Ipv4Net>, DataError> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(None);
    };
    let err = || DataError::InvalidIp {
        label: label.to_string(),
        field: "subnet".to_string(),
        value: raw.to_string(),
    };
    if raw.contains('/') {
        return raw.parse::<Ipv4Net>().map(Some).map_err(|_| err());
    }
    if let Ok(prefix) = raw.parse::<u8>() {
        return Ipv4Net::new(address, prefix).map(Some).ok_or_else(err);
    }
    let mask: Ipv4Addr = raw.parse().map_err(|_| err())?;
    let bits = u32::from(mask);
    let prefix = bits.leading_ones();
    if bits.count_ones() != prefix {
        return Err(err());
    }
    let prefix = u8::try_from(prefix).map_err(|_| err())?;
    Ipv4Net::new(address, prefix).map(Some).ok_or_else(err)
}

fn positive(label: &str, field: &str, value: i64) -> Result<u32, DataError> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| invalid(label, field, &value.to_string(), "a positive integer"))
}

fn invalid(label: &str, field: &str, value: &str, expected: &str) -> DataError {
    DataError::InvalidValue {
        label: label.to_string(),
        field: field.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}
