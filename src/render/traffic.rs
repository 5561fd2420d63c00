//! Segment-routing traffic-engineering payload.
//!
//! One `label-path` per hop, taken from the hop's `sr_adjacency_sid`:
//!
//! ```text
//! <config xmlns="http://tail-f.com/ns/config/1.0">
//!   <traffic-engineering xmlns="http://example.com/traffic-engineering">
//!     <source>R1</source>
//!     <destination>R3</destination>
//!     <color>103</color>
//!     <service-type>vprn</service-type>
//!     <service-name>VPRN-TSP</service-name>
//!     <label-path>24012</label-path>
//!     <label-path>24023</label-path>
//!   </traffic-engineering>
//! </config>
//! ```

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

use crate::model::PathResult;
use crate::{Error, Result};
use super::provisioning::CONFIG_NS;
use super::xml::XmlDoc;

pub const TRAFFIC_ENGINEERING_NS: &str = "http://example.com/traffic-engineering";

/// Hop property holding the adjacency segment id.
pub const SID_PROPERTY: &str = "sr_adjacency_sid";

const BASE_COLOR: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficEngineeringPayload {
    pub source: String,
    pub destination: String,
    pub color: u32,
    pub service_type: String,
    pub service_name: String,
    pub label_paths: Vec<String>,
}

/// `100 + n` for a router named `R<n>`, otherwise 100.
pub fn color_for(destination: &str) -> u32 {
    destination
        .trim_start_matches('R')
        .parse::<u32>()
        .ok()
        .and_then(|n| BASE_COLOR.checked_add(n))
        .unwrap_or(BASE_COLOR)
}

impl TrafficEngineeringPayload {
    pub fn from_path(path: &PathResult, service_type: &str, service_name: &str) -> Result<Self> {
        if service_type.trim().is_empty() || service_name.trim().is_empty() {
            return Err(Error::Render("service type and service name are both required".into()));
        }
        if path.is_empty() {
            return Err(Error::Render(format!(
                "path from '{}' to itself has no segments to steer", path.source().id
            )));
        }

        let mut label_paths = Vec::with_capacity(path.len());
        for (i, hop) in path.hops.iter().enumerate() {
            let sid = hop.get(SID_PROPERTY)
                .and_then(|v| v.to_plain_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::Render(format!(
                    "hop {} ({} -> {}) has no {SID_PROPERTY}", i + 1, hop.from, hop.to
                )))?;
            label_paths.push(sid);
        }

        let destination = path.destination().id.clone();
        Ok(Self {
            source: path.source().id.clone(),
            color: color_for(&destination),
            destination,
            service_type: service_type.to_lowercase(),
            service_name: format!("{}-{}", service_type.to_uppercase(), service_name.to_uppercase()),
            label_paths,
        })
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut doc = XmlDoc::new();
        doc.open_ns("config", CONFIG_NS)?;
        doc.open_ns("traffic-engineering", TRAFFIC_ENGINEERING_NS)?;
        doc.leaf("source", &self.source)?;
        doc.leaf("destination", &self.destination)?;
        doc.leaf("color", &self.color.to_string())?;
        doc.leaf("service-type", &self.service_type)?;
        doc.leaf("service-name", &self.service_name)?;
        for label in &self.label_paths {
            doc.leaf("label-path", label)?;
        }
        doc.close("traffic-engineering")?;
        doc.close("config")?;
        doc.finish()
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut current: Option<String> = None;
        let mut fields: std::collections::HashMap<String, String> = Default::default();
        let mut label_paths = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    current = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
                Event::End(_) => current = None,
                Event::Text(t) => {
                    let text = t.unescape()?.into_owned();
                    match current.as_deref() {
                        Some("label-path") => label_paths.push(text),
                        Some(name) => { fields.insert(name.to_string(), text); }
                        None => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let mut take = |name: &str| fields.remove(name)
            .ok_or_else(|| Error::Render(format!("traffic-engineering document has no {name}")));
        let color = take("color")?;
        Ok(Self {
            source: take("source")?,
            destination: take("destination")?,
            color: color.parse().map_err(|_| Error::Render(format!("color '{color}' is not an integer")))?,
            service_type: take("service-type")?,
            service_name: take("service-name")?,
            label_paths,
        })
    }
}

/// Render the traffic-engineering document for a path.
pub fn render_traffic_engineering(path: &PathResult, service_type: &str, service_name: &str) -> Result<String> {
    let payload = TrafficEngineeringPayload::from_path(path, service_type, service_name)?;
    let xml = payload.to_xml()?;
    TrafficEngineeringPayload::from_xml(&xml)?;
    Ok(xml)
}
