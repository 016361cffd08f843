use serde::{Deserialize, Serialize};

use crate::api::IntakeError;
use crate::geoip::GeoIpInfo;
use crate::user_agent::UserAgentInfo;

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Device {
    pub browser: String,
    pub os: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub vendor: String,
}

/// One accepted visit, stored in the `visitors` collection.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VisitorRecord {
    pub ip: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub timezone: String,
    pub isp: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    pub device: Device,
    pub timestamp: String,
}

fn or_unknown(value: Option<String>) -> String {
    value
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn static_or_unknown(value: Option<&'static str>) -> String {
    value.unwrap_or(UNKNOWN).to_string()
}

impl VisitorRecord {
    /// Total mapping: every field missing from the enrichment becomes `"Unknown"`
    /// (or null for coordinates), so the stored shape never changes.
    pub fn build(ip: String, agent: &UserAgentInfo, geo: GeoIpInfo, timestamp: String) -> Self {
        Self {
            ip,
            city: or_unknown(geo.city),
            region: or_unknown(geo.region_name),
            country: or_unknown(geo.country),
            timezone: or_unknown(geo.timezone),
            isp: or_unknown(geo.isp),
            lat: geo.lat,
            lon: geo.lon,
            device: Device {
                browser: static_or_unknown(agent.browser),
                os: static_or_unknown(agent.os),
                device_type: static_or_unknown(agent.device_type),
                vendor: static_or_unknown(agent.device_vendor),
            },
            timestamp,
        }
    }
}

/// A captured lead, stored in the `leads` collection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    pub name: String,
    pub number: String,
    pub status: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl LeadRecord {
    pub fn new(name: String, number: String, timestamp: String) -> Self {
        Self {
            name,
            number,
            status: 0,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        }
    }
}

// Phone numbers arrive as strings from forms but as numbers from some clients.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FormValue {
    Text(String),
    Number(serde_json::Number),
}

impl FormValue {
    fn into_text(self) -> String {
        match self {
            FormValue::Text(text) => text,
            FormValue::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UrlencodedLead {
    name: Option<String>,
    number: Option<String>,
}

/// Lead submission body, JSON or urlencoded.
#[derive(Debug, Default, Deserialize)]
pub struct LeadForm {
    #[serde(default)]
    name: Option<FormValue>,
    #[serde(default)]
    number: Option<FormValue>,
}

impl LeadForm {
    pub fn from_json(body: &[u8]) -> Result<Self, IntakeError> {
        if body.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|err| IntakeError::InvalidBody(err.to_string()))
    }

    pub fn from_urlencoded(body: &[u8]) -> Result<Self, IntakeError> {
        let form: UrlencodedLead = serde_urlencoded::from_bytes(body)
            .map_err(|err| IntakeError::InvalidBody(err.to_string()))?;
        Ok(Self {
            name: form.name.map(FormValue::Text),
            number: form.number.map(FormValue::Text),
        })
    }

    /// Both fields must be present and non-empty.
    pub fn into_fields(self) -> Result<(String, String), IntakeError> {
        let name = self.name.map(FormValue::into_text).unwrap_or_default();
        let number = self.number.map(FormValue::into_text).unwrap_or_default();
        if name.is_empty() || number.is_empty() {
            return Err(IntakeError::MissingLeadFields);
        }
        Ok((name, number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn test_build_with_full_enrichment() {
        let agent = UserAgentInfo::parse(
            "Mozilla/5.0 (Linux; Android 13; SM-S911B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
        );
        let geo = GeoIpInfo {
            city: Some("Mumbai".to_string()),
            region_name: Some("Maharashtra".to_string()),
            country: Some("India".to_string()),
            timezone: Some("Asia/Kolkata".to_string()),
            isp: Some("Example Telecom".to_string()),
            lat: Some(19.076),
            lon: Some(72.8777),
        };

        let record = VisitorRecord::build(
            "203.0.113.7".to_string(),
            &agent,
            geo,
            "10/16/2026, 03:04:05 pm".to_string(),
        );

        assert_json_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "ip": "203.0.113.7",
                "city": "Mumbai",
                "region": "Maharashtra",
                "country": "India",
                "timezone": "Asia/Kolkata",
                "isp": "Example Telecom",
                "lat": 19.076,
                "lon": 72.8777,
                "device": {
                    "browser": "Mobile Chrome",
                    "os": "Android",
                    "type": "mobile",
                    "vendor": "Samsung"
                },
                "timestamp": "10/16/2026, 03:04:05 pm"
            })
        );
    }

    #[test]
    fn test_build_without_enrichment_defaults_everything() {
        let record = VisitorRecord::build(
            "198.51.100.2".to_string(),
            &UserAgentInfo::parse("Unknown"),
            GeoIpInfo::default(),
            "01/02/2024, 12:00:00 am".to_string(),
        );

        assert_json_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "ip": "198.51.100.2",
                "city": "Unknown",
                "region": "Unknown",
                "country": "Unknown",
                "timezone": "Unknown",
                "isp": "Unknown",
                "lat": null,
                "lon": null,
                "device": {
                    "browser": "Unknown",
                    "os": "Unknown",
                    "type": "Unknown",
                    "vendor": "Unknown"
                },
                "timestamp": "01/02/2024, 12:00:00 am"
            })
        );
    }

    #[test]
    fn test_empty_strings_count_as_missing() {
        let geo = GeoIpInfo {
            city: Some(String::new()),
            country: Some("India".to_string()),
            ..Default::default()
        };
        let record = VisitorRecord::build(
            "198.51.100.2".to_string(),
            &UserAgentInfo::default(),
            geo,
            String::new(),
        );
        assert_eq!(record.city, UNKNOWN);
        assert_eq!(record.country, "India");
    }

    #[test]
    fn test_lead_record_shape() {
        let lead = LeadRecord::new(
            "Asha".to_string(),
            "9999999999".to_string(),
            "10/16/2026, 03:04:05 pm".to_string(),
        );
        assert_json_eq!(
            serde_json::to_value(&lead).unwrap(),
            json!({
                "name": "Asha",
                "number": "9999999999",
                "status": 0,
                "createdAt": "10/16/2026, 03:04:05 pm",
                "updatedAt": "10/16/2026, 03:04:05 pm"
            })
        );
    }

    #[test]
    fn test_lead_form_from_json() {
        let fields = LeadForm::from_json(br#"{"name":"Asha","number":9999999999}"#)
            .unwrap()
            .into_fields()
            .unwrap();
        assert_eq!(fields, ("Asha".to_string(), "9999999999".to_string()));

        assert!(matches!(
            LeadForm::from_json(br#"{"name":"","number":"9999999999"}"#)
                .unwrap()
                .into_fields(),
            Err(IntakeError::MissingLeadFields)
        ));
        assert!(matches!(
            LeadForm::from_json(b"").unwrap().into_fields(),
            Err(IntakeError::MissingLeadFields)
        ));
        assert!(matches!(
            LeadForm::from_json(b"{not json"),
            Err(IntakeError::InvalidBody(_))
        ));
    }

    #[test]
    fn test_lead_form_from_urlencoded() {
        let fields = LeadForm::from_urlencoded(b"name=Asha+Rao&number=%2B91%209999999999&extra=1")
            .unwrap()
            .into_fields()
            .unwrap();
        assert_eq!(
            fields,
            ("Asha Rao".to_string(), "+91 9999999999".to_string())
        );

        assert!(matches!(
            LeadForm::from_urlencoded(b"name=Asha").unwrap().into_fields(),
            Err(IntakeError::MissingLeadFields)
        ));
    }
}
