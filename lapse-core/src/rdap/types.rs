use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::date::normalize_date;
use crate::error::{LapseError, Result};

/// Event actions that carry the end of the registration term.
pub const EXPIRATION_ACTIONS: &[&str] = &["expiration", "registration expiration"];

/// The parts of an RDAP domain object lapse reads.
///
/// `events` must be a list; every other field, and any individual event or
/// entity, is dropped when it has an unexpected shape so one garbled member
/// does not hide the rest of the response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub object_class_name: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub handle: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub ldh_name: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub unicode_name: Option<String>,

    #[serde(default, deserialize_with = "list_members")]
    pub events: Vec<RdapEvent>,

    #[serde(default, deserialize_with = "lenient_members")]
    pub entities: Vec<RdapEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapEvent {
    pub event_action: String,
    #[serde(default, deserialize_with = "lenient")]
    pub event_date: Option<String>,
}

impl RdapEvent {
    /// Calendar date of the event as printed, ignoring time and offset.
    pub fn calendar_date(&self) -> Option<Result<NaiveDate>> {
        let raw = self.event_date.as_deref()?.trim();
        let day = raw.get(..10).unwrap_or(raw);
        Some(normalize_date(day).map_err(|_| {
            LapseError::FormatError(format!("RDAP {} event date {}", self.event_action, raw))
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapEntity {
    #[serde(default, deserialize_with = "lenient")]
    pub handle: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub roles: Vec<String>,

    #[serde(default)]
    pub vcard_array: Option<serde_json::Value>,
}

/// Field value, or its default when the value has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// A list whose malformed members are skipped. The field itself must be a
/// list (or null).
fn list_members<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let values = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}

/// Like [`list_members`], but a non-list field reads as empty.
fn lenient_members<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let values: Vec<serde_json::Value> = lenient(deserializer)?;
    Ok(values
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}

impl RdapEntity {
    /// First `fn` property of the entity's jCard.
    pub fn get_name(&self) -> Option<String> {
        let props = self.vcard_array.as_ref()?.as_array()?.get(1)?.as_array()?;
        props
            .iter()
            .filter_map(|prop| prop.as_array())
            .filter(|prop| prop.len() >= 4 && prop[0].as_str() == Some("fn"))
            .find_map(|prop| prop[3].as_str())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

impl RdapResponse {
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(LapseError::MalformedResponse(
                "RDAP response is not a JSON object".to_string(),
            ));
        }
        serde_json::from_value(value)
            .map_err(|e| LapseError::MalformedResponse(format!("Unexpected RDAP structure: {}", e)))
    }

    pub fn domain_name(&self) -> Option<&str> {
        self.ldh_name.as_deref().or(self.unicode_name.as_deref())
    }

    /// Date of the first expiration event, if the registry published one.
    pub fn expiration_date(&self) -> Result<Option<NaiveDate>> {
        self.events
            .iter()
            .find(|e| {
                EXPIRATION_ACTIONS
                    .iter()
                    .any(|action| e.event_action.eq_ignore_ascii_case(action))
            })
            .and_then(RdapEvent::calendar_date)
            .transpose()
    }

    pub fn get_registrar(&self) -> Option<String> {
        self.entities
            .iter()
            .find(|entity| entity.has_role("registrar"))
            .and_then(|entity| entity.get_name().or_else(|| entity.handle.clone()))
    }
}
