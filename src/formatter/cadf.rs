//! CADF (DMTF DSP0262) rendering of classified log entries.

use super::FormatContext;
use super::time::TimeFormat;
use crate::catalog::Classification;
use crate::domain::LogEntry;
use serde_json::{Map, Value, json};
use uuid::Uuid;

pub const CADF_EVENT_TYPE_URI: &str = "http://schemas.dmtf.org/cloud/audit/1.0/event";
pub const INITIATOR_TYPE_URI: &str = "data/security/account/user";
pub const OBSERVER_TYPE_URI: &str = "service/hmc";

/// Deterministic event id: the same entry seen by the same forwarder always
/// gets the same id.
pub fn event_id(label: &str, entry: &LogEntry) -> Uuid {
    let name = format!(
        "{}/{}/{}/{}/{}",
        label,
        entry.log_type,
        entry.timestamp.to_rfc3339(),
        entry.message_number,
        entry.sequence
    );
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

pub fn build_event(
    entry: &LogEntry,
    classification: &Classification<'_>,
    context: &FormatContext,
) -> Value {
    let mut initiator = Map::new();
    initiator.insert("typeURI".into(), INITIATOR_TYPE_URI.into());
    if let Some(user) = &entry.user {
        initiator.insert("name".into(), user.as_str().into());
    }
    if let Some(address) = classification.initiator_address() {
        initiator.insert("host".into(), json!({ "address": address }));
    }

    let data_items: Vec<Value> = entry
        .data_items
        .iter()
        .map(|item| json!({ "number": item.number, "value": item.value, "type": item.kind }))
        .collect();

    json!({
        "typeURI": CADF_EVENT_TYPE_URI,
        "id": event_id(&context.label, entry).to_string(),
        "eventType": "activity",
        "eventTime": TimeFormat::Iso8601.render(&entry.timestamp),
        "action": classification.action(),
        "outcome": classification.outcome().as_str(),
        "initiator": initiator,
        "target": {
            "typeURI": classification.target_type(),
            "class": classification.target_class(),
        },
        "observer": {
            "typeURI": OBSERVER_TYPE_URI,
            "name": context.label,
        },
        "attachments": [
            { "name": "message", "typeURI": "xs:string", "content": entry.message },
            { "name": "message_number", "typeURI": "xs:string", "content": entry.message_number },
            { "name": "log", "typeURI": "xs:string", "content": entry.log_type.as_str() },
            { "name": "event_name", "typeURI": "xs:string", "content": entry.name },
            { "name": "data_items", "typeURI": "xs:anyType", "content": data_items },
            { "name": "check_data", "typeURI": "xs:anyType", "content": context.check_data },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MessageCatalog, UNKNOWN};
    use crate::domain::{DataItem, DataItemKind, LogType};
    use chrono::DateTime;

    fn entry(number: &str, message: &str) -> LogEntry {
        LogEntry::new(
            LogType::Security,
            7,
            DateTime::parse_from_rfc3339("2019-08-09T12:46:38.550+02:00").unwrap(),
            number,
            message,
        )
        .with_user("alice")
    }

    fn context() -> FormatContext {
        FormatContext::new("lab-hmc1")
    }

    #[test]
    fn test_classified_event_fields() {
        let catalog = MessageCatalog::builtin().unwrap();
        let entry = entry("1279", "User alice has logged on").with_data_items(vec![DataItem {
            number: 0,
            value: "alice".into(),
            kind: DataItemKind::String,
        }]);
        let classification = catalog.classify(&entry);
        let event = build_event(&entry, &classification, &context());

        assert_eq!(event["typeURI"], CADF_EVENT_TYPE_URI);
        assert_eq!(event["eventType"], "activity");
        assert_eq!(event["eventTime"], "2019-08-09T12:46:38.550000+02:00");
        assert_eq!(event["action"], "authenticate/logon");
        assert_eq!(event["outcome"], "success");
        assert_eq!(event["initiator"]["name"], "alice");
        assert_eq!(event["observer"]["name"], "lab-hmc1");
        assert_eq!(event["attachments"][4]["content"][0]["type"], "string");
        assert_eq!(
            event["attachments"][5]["content"]["functional_users"],
            json!([])
        );
    }

    #[test]
    fn test_unclassified_event_uses_sentinel() {
        let catalog = MessageCatalog::builtin().unwrap();
        let entry = entry("99999", "Something nobody catalogued");
        let event = build_event(&entry, &catalog.classify(&entry), &context());

        assert_eq!(event["action"], UNKNOWN);
        assert_eq!(event["outcome"], UNKNOWN);
        assert_eq!(event["target"]["typeURI"], UNKNOWN);
        assert_eq!(event["target"]["class"], UNKNOWN);
        assert_eq!(event["attachments"][0]["content"], "Something nobody catalogued");
        assert!(event["initiator"].get("host").is_none());
    }

    #[test]
    fn test_event_id_is_deterministic() {
        let a = entry("1279", "User alice has logged on");
        let mut b = a.clone();
        assert_eq!(event_id("x", &a), event_id("x", &b));
        assert_ne!(event_id("x", &a), event_id("y", &a));
        b.sequence += 1;
        assert_ne!(event_id("x", &a), event_id("x", &b));
    }
}
