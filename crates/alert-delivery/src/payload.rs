//! The bundle of artifacts delivered once a match occurs

use causelist_core::TargetDate;

/// Everything to deliver, built once and sent once per recipient.
///
/// Only constructed when the match result is non-empty. `voice` is `None`
/// when synthesis failed; text and document still go out.
#[derive(Debug, Clone)]
pub struct AlertPayload {
    pub message: String,
    pub voice: Option<Vec<u8>>,
    pub document: Vec<u8>,
    pub document_name: String,
}

/// Markdown summary sent as the text artifact.
pub fn alert_message(found: &[String], date: &TargetDate) -> String {
    format!(
        "⚖️ *Court Case Listed*\n\n📅 Date: {}\n📌 Case: {}",
        date.display(),
        found.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> TargetDate {
        TargetDate::from_date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn message_lists_date_and_cases() {
        let message = alert_message(&["141/24/MR".to_string()], &date(2025, 1, 13));
        assert_eq!(
            message,
            "⚖️ *Court Case Listed*\n\n📅 Date: 13-01-2025\n📌 Case: 141/24/MR"
        );
    }

    #[test]
    fn multiple_cases_are_comma_joined() {
        let message = alert_message(
            &["11/02/AA".to_string(), "99/01/ZZ".to_string()],
            &date(2025, 6, 1),
        );
        assert!(message.contains("11/02/AA, 99/01/ZZ"));
    }
}
