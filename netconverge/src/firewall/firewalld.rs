//! firewalld zone documents.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::CompileError;
use crate::firewall::{
    revision, Endpoint, FirewallBackend, FirewallDocument, FirewallPlan, LiveCheck, ResolvedRule,
};
use crate::model::{MachineId, NetworkGraph};

const ZONE: &str = "netconverge";
const ZONE_PATH: &str = "/etc/firewalld/zones/netconverge.xml";

pub struct Firewalld;

impl FirewallBackend for Firewalld {
    fn name(&self) -> &'static str {
        "firewalld"
    }

    fn packages(&self) -> &'static [&'static str] {
        &["firewalld"]
    }

    fn service(&self) -> &'static str {
        "firewalld"
    }

    fn reload_command(&self) -> &'static str {
        "firewall-cmd --reload"
    }

    fn live_check(&self, revision: &str) -> LiveCheck {
        LiveCheck {
            command: format!(
                "firewall-cmd --zone={ZONE} --query-rich-rule='rule family=\"ipv4\" source address=\"127.0.0.1\" log prefix=\"{revision}\" drop'"
            ),
            expected: "yes".to_string(),
        }
    }

    fn render_router(
        &self,
        graph: &NetworkGraph,
        plan: &FirewallPlan,
    ) -> Result<FirewallDocument, CompileError> {
        let label = graph.machine(plan.router).label.clone();
        let mut zone = Zone::new(&label, "DROP");
        zone.masquerade = !plan.wan_ifaces.is_empty();
        zone.interfaces = plan.lan_ifaces.iter().chain(&plan.wan_ifaces).cloned().collect();
        zone.services = vec!["ssh", "dns", "dhcp"];

        if let Some(router) = plan.machine(plan.router) {
            zone.push_rules(router.listen.iter().chain(&router.ingress), Side::Source);
        }
        for member in plan.machines.iter().filter(|m| m.id != plan.router) {
            for addr in &member.addresses {
                let own = Endpoint::Net(crate::model::Ipv4Net::host(*addr));
                for rule in member.listen.iter().chain(&member.ingress) {
                    zone.push_pinned(rule, Side::Source, &own);
                }
                for rule in member.forward.iter().chain(&member.egress) {
                    zone.push_pinned(rule, Side::Destination, &own);
                }
            }
        }
        for rule in &plan.dnat {
            for dest in &rule.destinations {
                for port in port_list(&rule.ports) {
                    zone.forward_ports.push(ForwardPort {
                        port: port.clone(),
                        protocol: rule.encapsulation.as_str(),
                        to_addr: rule.to.to_string(),
                        destination: match dest {
                            Endpoint::Any => None,
                            other => Some(other.to_string()),
                        },
                    });
                }
            }
        }
        zone.render(&label)
    }

    fn render_host(
        &self,
        graph: &NetworkGraph,
        plan: &FirewallPlan,
        id: MachineId,
    ) -> Result<FirewallDocument, CompileError> {
        let label = graph.machine(id).label.clone();
        let mut zone = Zone::new(&label, "DROP");
        zone.services = vec!["ssh"];
        if let Some(rules) = plan.machine(id) {
            zone.push_rules(rules.listen.iter().chain(&rules.ingress), Side::Source);
        }
        zone.render(&label)
    }
}

#[derive(Clone, Copy)]
enum Side {
    Source,
    Destination,
}

struct RichRule {
    source: Option<String>,
    destination: Option<String>,
    protocol: &'static str,
    ports: Vec<String>,
}

struct ForwardPort {
    port: String,
    protocol: &'static str,
    to_addr: String,
    destination: Option<String>,
}

struct Zone {
    description: String,
    target: &'static str,
    masquerade: bool,
    interfaces: Vec<String>,
    services: Vec<&'static str>,
    rules: Vec<RichRule>,
    forward_ports: Vec<ForwardPort>,
}

impl Zone {
    fn new(label: &str, target: &'static str) -> Self {
        Self {
            description: format!("{label} ruleset"),
            target,
            masquerade: false,
            interfaces: Vec::new(),
            services: Vec::new(),
            rules: Vec::new(),
            forward_ports: Vec::new(),
        }
    }

    fn push_rules<'r>(&mut self, rules: impl Iterator<Item = &'r ResolvedRule>, side: Side) {
        for rule in rules {
            let endpoints = match side {
                Side::Source => &rule.sources,
                Side::Destination => &rule.destinations,
            };
            for endpoint in endpoints {
                let end = host_of(endpoint);
                let (source, destination) = match side {
                    Side::Source => (end, None),
                    Side::Destination => (None, end),
                };
                self.rules.push(RichRule {
                    source,
                    destination,
                    protocol: rule.encapsulation.as_str(),
                    ports: port_list(&rule.ports),
                });
            }
        }
    }

    /// Rule where one end is the machine itself.
    fn push_pinned(&mut self, rule: &ResolvedRule, side: Side, own: &Endpoint) {
        let endpoints = match side {
            Side::Source => &rule.sources,
            Side::Destination => &rule.destinations,
        };
        for endpoint in endpoints {
            let (source, destination) = match side {
                Side::Source => (host_of(endpoint), host_of(own)),
                Side::Destination => (host_of(own), host_of(endpoint)),
            };
            self.rules.push(RichRule {
                source,
                destination,
                protocol: rule.encapsulation.as_str(),
                ports: port_list(&rule.ports),
            });
        }
    }

    fn render(self, label: &str) -> Result<FirewallDocument, CompileError> {
        let body = self
            .write(None)
            .map_err(|err| document_error(label, &err))?;
        let rev = revision(&String::from_utf8_lossy(&body));
        let bytes = self
            .write(Some(&rev))
            .map_err(|err| document_error(label, &err))?;
        let mut content = String::from_utf8(bytes).map_err(|err| document_error(label, &err))?;
        content.push('\n');
        Ok(FirewallDocument {
            path: ZONE_PATH.to_string(),
            content,
            revision: rev,
        })
    }

    fn write(&self, revision: Option<&str>) -> Result<Vec<u8>, quick_xml::Error> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut zone = BytesStart::new("zone");
        zone.push_attribute(("target", self.target));
        writer.write_event(Event::Start(zone))?;

        text_element(&mut writer, "short", ZONE)?;
        text_element(&mut writer, "description", &self.description)?;
        for iface in &self.interfaces {
            let mut el = BytesStart::new("interface");
            el.push_attribute(("name", iface.as_str()));
            writer.write_event(Event::Empty(el))?;
        }
        for service in &self.services {
            let mut el = BytesStart::new("service");
            el.push_attribute(("name", *service));
            writer.write_event(Event::Empty(el))?;
        }
        if self.masquerade {
            writer.write_event(Event::Empty(BytesStart::new("masquerade")))?;
        }
        for fwd in &self.forward_ports {
            let mut el = BytesStart::new("forward-port");
            el.push_attribute(("port", fwd.port.as_str()));
            el.push_attribute(("protocol", fwd.protocol));
            el.push_attribute(("to-addr", fwd.to_addr.as_str()));
            if let Some(dest) = &fwd.destination {
                el.push_attribute(("to-port", fwd.port.as_str()));
                writer.write_event(Event::Start(BytesStart::new("rule").with_attributes([("family", "ipv4")])))?;
                let mut d = BytesStart::new("destination");
                d.push_attribute(("address", dest.as_str()));
                writer.write_event(Event::Empty(d))?;
                writer.write_event(Event::Empty(el))?;
                writer.write_event(Event::End(BytesEnd::new("rule")))?;
            } else {
                writer.write_event(Event::Empty(el))?;
            }
        }
        for rule in &self.rules {
            write_rich_rule(&mut writer, rule)?;
        }
        if let Some(rev) = revision {
            let marker = RichRule {
                source: Some("127.0.0.1".to_string()),
                destination: None,
                protocol: "",
                ports: Vec::new(),
            };
            write_marker(&mut writer, &marker, rev)?;
        }

        writer.write_event(Event::End(BytesEnd::new("zone")))?;
        Ok(writer.into_inner())
    }
}

fn write_rich_rule(writer: &mut Writer<Vec<u8>>, rule: &RichRule) -> Result<(), quick_xml::Error> {
    let ports: Vec<Option<&str>> = if rule.ports.is_empty() {
        vec![None]
    } else {
        rule.ports.iter().map(|p| Some(p.as_str())).collect()
    };
    for port in ports {
        writer.write_event(Event::Start(BytesStart::new("rule").with_attributes([("family", "ipv4")])))?;
        if let Some(source) = &rule.source {
            let mut el = BytesStart::new("source");
            el.push_attribute(("address", source.as_str()));
            writer.write_event(Event::Empty(el))?;
        }
        if let Some(destination) = &rule.destination {
            let mut el = BytesStart::new("destination");
            el.push_attribute(("address", destination.as_str()));
            writer.write_event(Event::Empty(el))?;
        }
        match port {
            Some(port) => {
                let mut el = BytesStart::new("port");
                el.push_attribute(("port", port));
                el.push_attribute(("protocol", rule.protocol));
                writer.write_event(Event::Empty(el))?;
            }
            None => {
                let mut el = BytesStart::new("protocol");
                el.push_attribute(("value", rule.protocol));
                writer.write_event(Event::Empty(el))?;
            }
        }
        writer.write_event(Event::Empty(BytesStart::new("accept")))?;
        writer.write_event(Event::End(BytesEnd::new("rule")))?;
    }
    Ok(())
}

/// Inert rule carrying the revision so the live zone can be queried for it.
fn write_marker(
    writer: &mut Writer<Vec<u8>>,
    rule: &RichRule,
    rev: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new("rule").with_attributes([("family", "ipv4")])))?;
    if let Some(source) = &rule.source {
        let mut el = BytesStart::new("source");
        el.push_attribute(("address", source.as_str()));
        writer.write_event(Event::Empty(el))?;
    }
    let mut log = BytesStart::new("log");
    log.push_attribute(("prefix", rev));
    writer.write_event(Event::Empty(log))?;
    writer.write_event(Event::Empty(BytesStart::new("drop")))?;
    writer.write_event(Event::End(BytesEnd::new("rule")))?;
    Ok(())
}

fn text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn host_of(endpoint: &Endpoint) -> Option<String> {
    match endpoint {
        Endpoint::Any => None,
        other => Some(other.to_string()),
    }
}

fn port_list(ports: &crate::model::PortSet) -> Vec<String> {
    ports.iter().map(|p| p.to_string()).collect()
}

fn document_error(label: &str, err: &dyn std::fmt::Display) -> CompileError {
    CompileError::FirewallDocument {
        machine: label.to_string(),
        message: err.to_string(),
    }
}
