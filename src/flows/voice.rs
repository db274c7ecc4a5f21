//! Voice command parsing for appointment booking.
//!
//! The transcript comes from the browser's speech recognizer; the model maps
//! it to an intent plus the appointment details it mentions.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

use super::engine::Flow;
use super::prompt::{delimited, require_text, RenderedPrompt};
use super::types::{FlowOutput, Sampling};
use super::FlowError;
use crate::i18n::{response_language, Locale};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCommandInput {
    pub transcript: String,
    #[serde(default)]
    pub language: Option<String>,
    /// Anchor for relative dates ("tomorrow", "next Monday").
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceIntent {
    BookAppointment,
    CancelAppointment,
    RescheduleAppointment,
    ListAppointments,
    #[serde(other)]
    Unknown,
}

impl VoiceIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookAppointment => "book_appointment",
            Self::CancelAppointment => "cancel_appointment",
            Self::RescheduleAppointment => "reschedule_appointment",
            Self::ListAppointments => "list_appointments",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCommand {
    pub intent: VoiceIntent,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    pub confirmation_message: String,
}

/// Unparseable dates become `None` rather than failing the whole command.
fn lenient_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
}

/// Accepts `HH:MM` and `HH:MM:SS`.
fn lenient_time<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.and_then(|s| {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .ok()
    }))
}

impl FlowOutput for VoiceCommand {
    fn schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "intent": {
                    "type": "STRING",
                    "enum": [
                        "book_appointment",
                        "cancel_appointment",
                        "reschedule_appointment",
                        "list_appointments",
                        "unknown"
                    ]
                },
                "date": { "type": "STRING", "description": "YYYY-MM-DD", "nullable": true },
                "time": { "type": "STRING", "description": "HH:MM, 24-hour", "nullable": true },
                "patient_name": { "type": "STRING", "nullable": true },
                "doctor_name": { "type": "STRING", "nullable": true },
                "confirmation_message": { "type": "STRING" }
            },
            "required": ["intent", "confirmation_message"]
        })
    }

    fn primary_text(&self) -> &str {
        &self.confirmation_message
    }

    fn fallback(locale: Locale) -> Self {
        let message = match locale {
            Locale::Hindi => "क्षमा करें, मैं आपका आदेश समझ नहीं सका। कृपया फिर से बोलें।",
            _ => "I'm sorry, I couldn't understand your command. Please try again.",
        };
        Self {
            intent: VoiceIntent::Unknown,
            date: None,
            time: None,
            patient_name: None,
            doctor_name: None,
            confirmation_message: message.to_string(),
        }
    }
}

pub struct ParseVoiceCommand;

impl Flow for ParseVoiceCommand {
    const NAME: &'static str = "parse_voice_command";
    type Input = VoiceCommandInput;
    type Output = VoiceCommand;

    fn sampling() -> Sampling {
        Sampling::extraction()
    }

    fn language(input: &VoiceCommandInput) -> Option<&str> {
        input.language.as_deref()
    }

    fn render(input: &VoiceCommandInput) -> Result<RenderedPrompt, FlowError> {
        let transcript = require_text("transcript", &input.transcript)?;

        let anchor = match input.today {
            Some(today) => format!(
                "Today is {} ({}). Resolve relative dates against it.",
                today.format("%Y-%m-%d"),
                today.format("%A")
            ),
            None => "If the date is relative (e.g. \"tomorrow\"), leave it null.".to_string(),
        };

        Ok(RenderedPrompt::text(format!(
            "You parse voice commands for a clinic's appointment system.\n\
             {anchor}\n\n{}\n\n\
             Identify the intent and any date (YYYY-MM-DD), time (HH:MM, 24-hour), patient \
             name and doctor name mentioned. Use null for anything not mentioned. Write a \
             short confirmation message in {} repeating what you understood.",
            delimited("transcript", transcript),
            response_language(input.language.as_deref())
        )))
    }
}
