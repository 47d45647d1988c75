use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::ledger::dates::canonical_date_text;
use crate::ledger::record::{Record, Session};
use crate::logging::log;

/// Session heuristic on the play name: "day" or "mid" anywhere means the midday draw.
pub fn classify_session(play_name: &str) -> Session {
    let lower = play_name.to_lowercase();
    if lower.contains("day") || lower.contains("mid") {
        Session::Mid
    } else {
        Session::Eve
    }
}

fn malformed(msg: impl Into<String>) -> SyncError {
    SyncError::Payload(msg.into())
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, SyncError> {
    value
        .as_object()
        .ok_or_else(|| malformed(format!("{what} is not an object")))
}

/// Missing or null means "none"; anything but an array is malformed.
fn array_field<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    what: &str,
) -> Result<&'a [Value], SyncError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(malformed(format!("{what}.{key} is not a list"))),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn draw_date(draw: &Map<String, Value>) -> Option<String> {
    let raw = match draw.get("date")? {
        Value::String(s) => s.trim().to_string(),
        Value::Null | Value::Bool(false) => return None,
        other => other.to_string(),
    };
    if raw.is_empty() {
        return None;
    }
    Some(canonical_date_text(&raw))
}

fn number_order(entry: &Map<String, Value>) -> f64 {
    entry.get("order").and_then(Value::as_f64).unwrap_or(0.0)
}

fn draw_values(numbers: &[Value], what: &str) -> Result<[String; 3], SyncError> {
    let mut entries = numbers
        .iter()
        .enumerate()
        .map(|(idx, n)| as_object(n, &format!("{what}.numbers[{idx}]")))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by(|a, b| number_order(a).total_cmp(&number_order(b)));

    let mut out: [String; 3] = Default::default();
    for (slot, entry) in out.iter_mut().zip(&entries) {
        let value = entry
            .get("value")
            .ok_or_else(|| malformed(format!("{what} has a number without `value`")))?;
        *slot = value_text(value);
    }
    Ok(out)
}

/// Flatten `{plays: [{name, draws: [{date, numbers: [{order, value}]}]}]}` (one
/// object or a list of them) into records, in payload order.
///
/// Draws without a date or with fewer than three numbers are skipped.
pub fn normalize(payload: &Value) -> Result<Vec<Record>, SyncError> {
    let games = match payload {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        other => vec![other],
    };

    let mut rows = Vec::new();
    for (gi, game) in games.into_iter().enumerate() {
        let game_what = format!("game[{gi}]");
        let game = as_object(game, &game_what)?;
        for (pi, play) in array_field(game, "plays", &game_what)?.iter().enumerate() {
            let play_what = format!("{game_what}.plays[{pi}]");
            let play = as_object(play, &play_what)?;
            let session = classify_session(play.get("name").and_then(Value::as_str).unwrap_or(""));
            for (di, draw) in array_field(play, "draws", &play_what)?.iter().enumerate() {
                let draw_what = format!("{play_what}.draws[{di}]");
                let draw = as_object(draw, &draw_what)?;
                let Some(date) = draw_date(draw) else {
                    continue;
                };
                let numbers = array_field(draw, "numbers", &draw_what)?;
                if numbers.len() < 3 {
                    continue;
                }
                let [p1, p2, p3] = draw_values(numbers, &draw_what)?;
                rows.push(Record {
                    date,
                    p1,
                    p2,
                    p3,
                    session,
                });
            }
        }
    }

    log(format!("Normalized {} draw rows.", rows.len()));
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_session_matches_substrings_case_insensitively() {
        assert_eq!(classify_session("Pick 3 Daytime"), Session::Mid);
        assert_eq!(classify_session("MIDDAY"), Session::Mid);
        assert_eq!(classify_session("Pick 3 Evening"), Session::Eve);
        assert_eq!(classify_session(""), Session::Eve);
    }

    #[test]
    fn numbers_are_ordered_by_order_field() {
        let payload = json!({
            "plays": [{
                "name": "Pick 3 Day",
                "draws": [{
                    "date": "01/02/2025",
                    "numbers": [
                        {"order": 3, "value": 9},
                        {"order": 1, "value": "4"},
                        {"order": 2, "value": 0},
                        {"order": 4, "value": 1}
                    ]
                }]
            }]
        });

        let rows = normalize(&payload).expect("normalize");
        assert_eq!(
            rows,
            vec![Record {
                date: "01/02/2025".into(),
                p1: "4".into(),
                p2: "0".into(),
                p3: "9".into(),
                session: Session::Mid,
            }]
        );
    }

    #[test]
    fn incomplete_draws_are_skipped_and_order_is_kept() {
        let payload = json!([
            {"plays": [
                {"name": "Evening", "draws": [
                    {"date": "2025-01-03", "numbers": [
                        {"order": 1, "value": 1}, {"order": 2, "value": 2}, {"order": 3, "value": 3}
                    ]},
                    {"date": "", "numbers": [
                        {"order": 1, "value": 1}, {"order": 2, "value": 2}, {"order": 3, "value": 3}
                    ]},
                    {"date": "01/01/2025", "numbers": [{"order": 1, "value": 1}]}
                ]},
                {"name": "Midday", "draws": [
                    {"date": "01/02/2025", "numbers": [
                        {"value": 7}, {"value": 8}, {"value": 9}
                    ]}
                ]}
            ]},
            {"plays": null}
        ]);

        let rows = normalize(&payload).expect("normalize");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "01/03/2025");
        assert_eq!(rows[0].session, Session::Eve);
        assert_eq!(rows[1].date, "01/02/2025");
        assert_eq!(rows[1].session, Session::Mid);
        assert_eq!((rows[1].p1.as_str(), rows[1].p3.as_str()), ("7", "9"));
    }

    #[test]
    fn malformed_shapes_are_fatal() {
        assert!(matches!(
            normalize(&json!(["not a game"])),
            Err(SyncError::Payload(_))
        ));
        assert!(matches!(
            normalize(&json!({"plays": {"name": "Day"}})),
            Err(SyncError::Payload(_))
        ));
        assert!(matches!(
            normalize(&json!({"plays": [{"draws": [{"date": "01/01/2025", "numbers": [
                {"order": 1}, {"order": 2, "value": 2}, {"order": 3, "value": 3}
            ]}]}]})),
            Err(SyncError::Payload(_))
        ));
    }
}
