//! # Payload rendering
//!
//! Turns a [`PathResult`] into something a person or a device can use.
//!
//! | Mode | Output |
//! |------|--------|
//! | `text` | Line-oriented report for the model and the operator |
//! | `provisioning-xml` | `deploy-customers` service, one block per endpoint |
//! | `traffic-engineering-xml` | SR-TE policy with one label per hop |
//!
//! Rendering is pure. Documents are re-read before they are returned, so a
//! caller never receives a document the service schema would reject.

mod xml;
pub mod text;
pub mod provisioning;
pub mod traffic;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::PathResult;
use crate::{Error, Result};

pub use text::render_text;
pub use provisioning::{PeAttributes, ProvisioningPayload, payload_for_path, render_provisioning};
pub use traffic::{TrafficEngineeringPayload, color_for, render_traffic_engineering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    #[default]
    Text,
    ProvisioningXml,
    TrafficEngineeringXml,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Text => "text",
            RenderMode::ProvisioningXml => "provisioning-xml",
            RenderMode::TrafficEngineeringXml => "traffic-engineering-xml",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(RenderMode::Text),
            "provisioning-xml" => Ok(RenderMode::ProvisioningXml),
            "traffic-engineering-xml" => Ok(RenderMode::TrafficEngineeringXml),
            other => Err(Error::InvalidArgument(format!(
                "unknown render mode '{other}' (expected text, provisioning-xml or traffic-engineering-xml)"
            ))),
        }
    }
}

/// Inputs a document mode needs beyond the path itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub customer_name: Option<String>,
    pub service_type: Option<String>,
    pub service_name: Option<String>,
}

/// Render a path in the given mode.
pub fn render(path: &PathResult, mode: RenderMode, options: &RenderOptions) -> Result<String> {
    match mode {
        RenderMode::Text => Ok(render_text(path)),
        RenderMode::ProvisioningXml => {
            let customer = required(options.customer_name.as_deref(), "customer_name", mode)?;
            render_provisioning(path, customer)
        }
        RenderMode::TrafficEngineeringXml => {
            let service_type = required(options.service_type.as_deref(), "service_type", mode)?;
            let service_name = required(options.service_name.as_deref(), "service_name", mode)?;
            render_traffic_engineering(path, service_type, service_name)
        }
    }
}

fn required<'a>(value: Option<&'a str>, name: &str, mode: RenderMode) -> Result<&'a str> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::InvalidArgument(format!("{mode} rendering requires {name}")))
}
