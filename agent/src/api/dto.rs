//! Request and response bodies of the HTTP API.
//!
//! Request fields are kept as raw JSON values: front ends send `null` or
//! mistyped optional fields, and one odd field must not void the request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn as_str(v: &Option<Value>) -> Option<&str> {
    v.as_ref().and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectPrinterRequest {
    #[serde(default)]
    name: Option<Value>,
}

impl SelectPrinterRequest {
    pub fn name(&self) -> Option<&str> {
        as_str(&self.name)
    }
}

/// Receipt print request. `data` and `logo` are base64.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintRawRequest {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    logo: Option<Value>,
    #[serde(default)]
    print_logo: Option<Value>,
}

impl PrintRawRequest {
    pub fn data(&self) -> Option<&str> {
        as_str(&self.data)
    }

    pub fn logo(&self) -> Option<&str> {
        as_str(&self.logo)
    }

    /// Only a literal `true` asks for the logo.
    pub fn print_logo(&self) -> bool {
        matches!(self.print_logo, Some(Value::Bool(true)))
    }
}

#[derive(Debug, Serialize)]
pub struct PrintersResponse {
    pub printers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SelectedResponse {
    pub selected: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub selected: Option<String>,
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub result: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
