use crate::api::PipefyWebhookInput;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One offending field, located by its path from the request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldViolation {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl FieldViolation {
    fn new(loc: &[&'static str], msg: impl Into<String>, kind: &'static str) -> Self {
        Self {
            loc: loc.iter().map(|s| s.to_string()).collect(),
            msg: msg.into(),
            kind,
        }
    }

    pub fn invalid_json(error: &serde_json::Error) -> Self {
        Self::new(&["body"], format!("Invalid JSON: {}", error), "json_invalid")
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.loc.join(" -> "),
            self.msg,
            self.kind
        )
    }
}

enum Shape {
    Text,
    OptionalText,
    Id,
    OptionalId,
    Object(&'static [Field]),
}

struct Field {
    name: &'static str,
    shape: Shape,
}

const fn field(name: &'static str, shape: Shape) -> Field {
    Field { name, shape }
}

const PHASE: &[Field] = &[field("id", Shape::Id), field("name", Shape::Text)];

const USER: &[Field] = &[
    field("id", Shape::Id),
    field("name", Shape::Text),
    field("username", Shape::OptionalText),
    field("email", Shape::OptionalText),
];

const CARD: &[Field] = &[
    field("id", Shape::Id),
    field("title", Shape::OptionalText),
    field("pipe_id", Shape::Id),
];

const CARD_MOVE: &[Field] = &[
    field("action", Shape::Text),
    field("from", Shape::Object(PHASE)),
    field("to", Shape::Object(PHASE)),
    field("moved_by", Shape::Object(USER)),
    field("card", Shape::Object(CARD)),
];

const WEBHOOK: &[Field] = &[
    field("data", Shape::Object(CARD_MOVE)),
    field("timestamp", Shape::OptionalText),
    field("webhook_id", Shape::OptionalId),
];

fn is_id(value: &Value) -> bool {
    value.is_string() || value.is_i64() || value.is_u64()
}

fn check(
    value: Option<&Value>,
    shape: &Shape,
    loc: &mut Vec<&'static str>,
    out: &mut Vec<FieldViolation>,
) {
    let optional = matches!(shape, Shape::OptionalText | Shape::OptionalId);
    let value = match value {
        None | Some(Value::Null) if optional => return,
        None => {
            out.push(FieldViolation::new(loc, "Field required", "missing"));
            return;
        }
        Some(value) => value,
    };

    match shape {
        Shape::Text | Shape::OptionalText => {
            if !value.is_string() {
                out.push(FieldViolation::new(
                    loc,
                    "Input should be a valid string",
                    "string_type",
                ));
            }
        }
        Shape::Id | Shape::OptionalId => {
            if !is_id(value) {
                out.push(FieldViolation::new(
                    loc,
                    "Input should be a valid string or integer",
                    "id_type",
                ));
            }
        }
        Shape::Object(fields) => {
            let Some(map) = value.as_object() else {
                out.push(FieldViolation::new(
                    loc,
                    "Input should be a valid dictionary",
                    "dict_type",
                ));
                return;
            };
            for field in fields.iter() {
                loc.push(field.name);
                check(map.get(field.name), &field.shape, loc, out);
                loc.pop();
            }
        }
    }
}

/// Check a card.move payload, reporting every offending field at once
pub fn validate_webhook(payload: &Value) -> Result<PipefyWebhookInput, Vec<FieldViolation>> {
    let mut violations = Vec::new();
    let mut loc = vec!["body"];
    check(Some(payload), &Shape::Object(WEBHOOK), &mut loc, &mut violations);

    if !violations.is_empty() {
        return Err(violations);
    }

    PipefyWebhookInput::deserialize(payload)
        .map_err(|e| vec![FieldViolation::new(&["body"], e.to_string(), "value_error")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "data": {
                "action": "card.move",
                "from": {"id": 1, "name": "Inbox"},
                "to": {"id": "2", "name": "Review"},
                "moved_by": {"id": 3, "name": "Ana", "username": null},
                "card": {"id": 67890, "pipe_id": "42"}
            },
            "timestamp": "2024-05-01T12:00:00Z"
        })
    }

    fn locations(violations: &[FieldViolation]) -> Vec<String> {
        violations.iter().map(|v| v.loc.join(".")).collect()
    }

    #[test]
    fn test_valid_payload() {
        let input = validate_webhook(&valid()).unwrap();
        assert_eq!(input.data.card.id.as_str(), "67890");
        assert_eq!(input.data.card.pipe_id.as_str(), "42");
    }

    #[test]
    fn test_reports_every_violation() {
        let mut payload = valid();
        payload["data"]["card"]
            .as_object_mut()
            .unwrap()
            .remove("id");
        payload["data"]["from"]["id"] = json!(1.5);
        payload["data"]["to"]["name"] = json!(7);
        payload["data"]["moved_by"] = json!("someone");

        let violations = validate_webhook(&payload).unwrap_err();

        assert_eq!(
            locations(&violations),
            vec![
                "body.data.from.id",
                "body.data.to.name",
                "body.data.moved_by",
                "body.data.card.id",
            ]
        );
        assert_eq!(violations[3].kind, "missing");
        assert_eq!(violations[0].kind, "id_type");
        assert_eq!(violations[2].kind, "dict_type");
    }

    #[test]
    fn test_missing_data_and_non_object_body() {
        let violations = validate_webhook(&json!({"timestamp": 5})).unwrap_err();
        assert_eq!(locations(&violations), vec!["body.data", "body.timestamp"]);

        let violations = validate_webhook(&json!([1, 2])).unwrap_err();
        assert_eq!(locations(&violations), vec!["body"]);
    }

    #[test]
    fn test_boolean_is_not_an_id() {
        let mut payload = valid();
        payload["data"]["card"]["id"] = json!(true);

        let violations = validate_webhook(&payload).unwrap_err();
        assert_eq!(locations(&violations), vec!["body.data.card.id"]);
    }

    #[test]
    fn test_display() {
        let violation = FieldViolation::new(&["body", "data"], "Field required", "missing");
        assert_eq!(violation.to_string(), "body -> data: Field required (missing)");
    }
}
