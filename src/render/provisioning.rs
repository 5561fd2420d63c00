//! Customer provisioning payload (`deploy-customers` service).
//!
//! Each path endpoint becomes a `pe-attributes` block:
//!
//! ```text
//! <config xmlns="http://tail-f.com/ns/config/1.0">
//!   <deploy-customers xmlns="http://example.com/deploy-customers">
//!     <customer-name>ACME</customer-name>
//!     <pe-attributes>
//!       <id>R1</id>
//!       <port-id>1/1/3</port-id>
//!       <ipv4-addr>192.168.10.1</ipv4-addr>
//!       <cidr-mask>30</cidr-mask>
//!     </pe-attributes>
//!     ...
//! ```
//!
//! `port-id` and `ipv4-addr` are mandatory, `id` and `cidr-mask` optional.

use std::net::Ipv4Addr;

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

use crate::model::{Hop, PathNode, PathResult, Value};
use crate::{Error, Result};
use super::xml::XmlDoc;

pub const CONFIG_NS: &str = "http://tail-f.com/ns/config/1.0";
pub const DEPLOY_CUSTOMERS_NS: &str = "http://example.com/deploy-customers";

/// Attributes of one provider-edge attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeAttributes {
    pub id: Option<String>,
    pub port_id: String,
    pub ipv4_addr: Ipv4Addr,
    pub cidr_mask: Option<u8>,
}

/// A `deploy-customers` service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningPayload {
    pub customer_name: String,
    pub pe_attributes: Vec<PeAttributes>,
}

impl ProvisioningPayload {
    /// Check the instance against the service schema.
    pub fn validate(&self) -> Result<()> {
        if self.customer_name.trim().is_empty() {
            return Err(Error::Render("customer-name must not be empty".into()));
        }
        if self.pe_attributes.is_empty() {
            return Err(Error::Render("at least one pe-attributes block is required".into()));
        }
        for pe in &self.pe_attributes {
            if pe.port_id.trim().is_empty() {
                return Err(Error::Render("pe-attributes/port-id must not be empty".into()));
            }
            if let Some(mask) = pe.cidr_mask {
                if mask > 32 {
                    return Err(Error::Render(format!("pe-attributes/cidr-mask {mask} is out of range 0..=32")));
                }
            }
        }
        Ok(())
    }

    /// Serialize to the NETCONF-style XML document.
    pub fn to_xml(&self) -> Result<String> {
        self.validate()?;
        let mut doc = XmlDoc::new();
        doc.open_ns("config", CONFIG_NS)?;
        doc.open_ns("deploy-customers", DEPLOY_CUSTOMERS_NS)?;
        doc.leaf("customer-name", &self.customer_name)?;
        for pe in &self.pe_attributes {
            doc.open("pe-attributes")?;
            if let Some(id) = &pe.id {
                doc.leaf("id", id)?;
            }
            doc.leaf("port-id", &pe.port_id)?;
            doc.leaf("ipv4-addr", &pe.ipv4_addr.to_string())?;
            if let Some(mask) = pe.cidr_mask {
                doc.leaf("cidr-mask", &mask.to_string())?;
            }
            doc.close("pe-attributes")?;
        }
        doc.close("deploy-customers")?;
        doc.close("config")?;
        doc.finish()
    }

    /// Read a document back. Fails on anything the schema would reject.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<String> = Vec::new();
        let mut customer_name: Option<String> = None;
        let mut blocks: Vec<PeDraft> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if name == "pe-attributes" {
                        blocks.push(PeDraft::default());
                    }
                    stack.push(name);
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(t) => {
                    let text = t.unescape()?.into_owned();
                    let leaf = stack.last().map(String::as_str);
                    let parent = stack.len().checked_sub(2).map(|i| stack[i].as_str());
                    match (parent, leaf) {
                        (Some("deploy-customers"), Some("customer-name")) => customer_name = Some(text),
                        (Some("pe-attributes"), Some(field)) => {
                            if let Some(block) = blocks.last_mut() {
                                block.set(field, text)?;
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let payload = Self {
            customer_name: customer_name
                .ok_or_else(|| Error::Render("document has no customer-name".into()))?,
            pe_attributes: blocks.into_iter().map(PeDraft::finish).collect::<Result<_>>()?,
        };
        payload.validate()?;
        Ok(payload)
    }
}

#[derive(Default)]
struct PeDraft {
    id: Option<String>,
    port_id: Option<String>,
    ipv4_addr: Option<Ipv4Addr>,
    cidr_mask: Option<u8>,
}

impl PeDraft {
    fn set(&mut self, field: &str, text: String) -> Result<()> {
        match field {
            "id" => self.id = Some(text),
            "port-id" => self.port_id = Some(text),
            "ipv4-addr" => self.ipv4_addr = Some(parse_ipv4(&text)?),
            "cidr-mask" => self.cidr_mask = Some(parse_mask(&text)?),
            other => return Err(Error::Render(format!("unexpected pe-attributes leaf '{other}'"))),
        }
        Ok(())
    }

    fn finish(self) -> Result<PeAttributes> {
        Ok(PeAttributes {
            id: self.id,
            port_id: self.port_id
                .ok_or_else(|| Error::Render("pe-attributes block without port-id".into()))?,
            ipv4_addr: self.ipv4_addr
                .ok_or_else(|| Error::Render("pe-attributes block without ipv4-addr".into()))?,
            cidr_mask: self.cidr_mask,
        })
    }
}

// ============================================================================
// Path → payload
// ============================================================================

/// Which end of the path an endpoint is, and so which hop keys back it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Source,
    Destination,
}

impl End {
    fn hop_keys(self) -> [&'static str; 3] {
        match self {
            End::Source => ["src_port", "src_ip", "src_mask"],
            End::Destination => ["dest_port", "dest_ip", "dest_mask"],
        }
    }
}

/// Build the payload for a path's endpoints.
///
/// Attributes come from the endpoint node (`port_id`, `ipv4_addr`,
/// `cidr_mask`) and, when the node lacks them, from the adjacent hop
/// (`src_*` on the first hop, `dest_*` on the last).
pub fn payload_for_path(path: &PathResult, customer_name: &str) -> Result<ProvisioningPayload> {
    let mut endpoints = vec![pe_for(path.source(), path.hops.first(), End::Source)?];
    if !path.is_empty() {
        endpoints.push(pe_for(path.destination(), path.hops.last(), End::Destination)?);
    }
    let payload = ProvisioningPayload {
        customer_name: customer_name.to_string(),
        pe_attributes: endpoints,
    };
    payload.validate()?;
    Ok(payload)
}

/// Render the provisioning document for a path.
pub fn render_provisioning(path: &PathResult, customer_name: &str) -> Result<String> {
    let xml = payload_for_path(path, customer_name)?.to_xml()?;
    // Re-read what we wrote so a malformed document never leaves here.
    ProvisioningPayload::from_xml(&xml)?;
    Ok(xml)
}

fn pe_for(node: &PathNode, hop: Option<&Hop>, end: End) -> Result<PeAttributes> {
    let [port_key, ip_key, mask_key] = end.hop_keys();
    let lookup = |node_key: &str, hop_key: &str| -> Option<&Value> {
        node.get(node_key)
            .filter(|v| !v.is_null())
            .or_else(|| hop.and_then(|h| h.get(hop_key)).filter(|v| !v.is_null()))
    };

    let port = lookup("port_id", port_key).and_then(Value::to_plain_string);
    let ip_raw = lookup("ipv4_addr", ip_key).and_then(Value::to_plain_string);
    let mask_raw = lookup("cidr_mask", mask_key);

    let mut missing = Vec::new();
    if node.id.is_empty() { missing.push("id"); }
    if port.as_deref().is_none_or(|p| p.trim().is_empty()) { missing.push("port-id"); }
    if ip_raw.is_none() { missing.push("ipv4-addr"); }
    if !missing.is_empty() {
        return Err(Error::Render(format!(
            "endpoint '{}' is missing {}", node.id, missing.join(", ")
        )));
    }

    let ip_raw = ip_raw.unwrap_or_default();
    let (addr, prefix_len) = match ip_raw.split_once('/') {
        Some((addr, len)) => (addr, Some(parse_mask(len)?)),
        None => (ip_raw.as_str(), None),
    };
    let cidr_mask = match mask_raw {
        Some(v) => Some(mask_from_value(v)?),
        None => prefix_len,
    };

    Ok(PeAttributes {
        id: Some(node.id.clone()),
        port_id: port.unwrap_or_default(),
        ipv4_addr: parse_ipv4(addr)?,
        cidr_mask,
    })
}

fn parse_ipv4(raw: &str) -> Result<Ipv4Addr> {
    raw.trim().parse().map_err(|_| Error::Render(format!("'{raw}' is not an IPv4 address")))
}

fn parse_mask(raw: &str) -> Result<u8> {
    match raw.trim().parse::<u8>() {
        Ok(mask) if mask <= 32 => Ok(mask),
        _ => Err(Error::Render(format!("'{raw}' is not a CIDR mask (0..=32)"))),
    }
}

fn mask_from_value(v: &Value) -> Result<u8> {
    match v {
        Value::Int(i) => parse_mask(&i.to_string()),
        Value::String(s) => parse_mask(s),
        other => Err(Error::Render(format!("cidr mask must be an integer, got {}", other.type_name()))),
    }
}
