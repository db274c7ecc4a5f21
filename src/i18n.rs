//! Locale handling and the localized message catalog.
//!
//! The UI language preference arrives as a free-form tag ("hi", "hi-IN",
//! "Hindi"). `LanguageConfig` is passed explicitly to every formatting call
//! and resolves messages through requested locale, then default locale, then
//! the literal key.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Language used when a request carries no language tag.
pub const DEFAULT_LANGUAGE_NAME: &str = "English";

/// The eight UI locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    English,
    Hindi,
    Bengali,
    Tamil,
    Telugu,
    Marathi,
    Gujarati,
    Kannada,
}

impl Locale {
    pub fn all() -> &'static [Locale] {
        &[
            Self::English,
            Self::Hindi,
            Self::Bengali,
            Self::Tamil,
            Self::Telugu,
            Self::Marathi,
            Self::Gujarati,
            Self::Kannada,
        ]
    }

    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Hindi => "hi",
            Self::Bengali => "bn",
            Self::Tamil => "ta",
            Self::Telugu => "te",
            Self::Marathi => "mr",
            Self::Gujarati => "gu",
            Self::Kannada => "kn",
        }
    }

    /// English display name, used when instructing the model.
    pub fn english_name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Bengali => "Bengali",
            Self::Tamil => "Tamil",
            Self::Telugu => "Telugu",
            Self::Marathi => "Marathi",
            Self::Gujarati => "Gujarati",
            Self::Kannada => "Kannada",
        }
    }

    fn native_name(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Hindi => "हिन्दी",
            Self::Bengali => "বাংলা",
            Self::Tamil => "தமிழ்",
            Self::Telugu => "తెలుగు",
            Self::Marathi => "मराठी",
            Self::Gujarati => "ગુજરાતી",
            Self::Kannada => "ಕನ್ನಡ",
        }
    }

    /// Parse a language tag: ISO code with optional region ("hi", "hi-IN"),
    /// English name ("Hindi") or native name ("हिन्दी"). Case-insensitive.
    pub fn parse(tag: &str) -> Option<Locale> {
        let tag = tag.trim();
        if tag.is_empty() {
            return None;
        }
        let lowered = tag.to_lowercase();
        let primary = lowered
            .split(['-', '_'])
            .next()
            .unwrap_or(lowered.as_str());

        Self::all().iter().copied().find(|locale| {
            primary == locale.code()
                || lowered == locale.english_name().to_lowercase()
                || tag == locale.native_name()
                || lowered == locale.native_name()
        })
    }

    /// Locale used to select a fallback message. Unknown or absent tags
    /// resolve to English.
    pub fn for_fallback(tag: Option<&str>) -> Locale {
        tag.and_then(Locale::parse).unwrap_or(Locale::English)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Name of the language a flow should answer in.
///
/// Known tags are normalized to their English name; unknown tags are passed
/// through so the model can still honor them. Absent or blank tags yield
/// "English".
pub fn response_language(tag: Option<&str>) -> String {
    match tag.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => Locale::parse(t)
            .map(|l| l.english_name().to_string())
            .unwrap_or_else(|| t.to_string()),
        None => DEFAULT_LANGUAGE_NAME.to_string(),
    }
}

// ──────────────────────────────────────────────
// Message catalog
// ──────────────────────────────────────────────

type Table = HashMap<&'static str, &'static str>;

static CATALOG: LazyLock<HashMap<Locale, Table>> = LazyLock::new(|| {
    let mut catalog = HashMap::new();

    catalog.insert(
        Locale::English,
        Table::from([
            (
                "sos.alert_body",
                "EMERGENCY SOS from {name}. They need immediate help.",
            ),
            ("sos.unknown_patient", "a SmartCare Hub user"),
            ("sos.location_line", "Location: {location}"),
            ("sos.note_line", "Note: {note}"),
            ("sos.sent_all", "Emergency alert sent to {count} contact(s)."),
            ("sos.failed_some", "Failed to send emergency alert to: {recipients}"),
            ("sos.no_contacts", "No emergency contacts are configured."),
            (
                "sos.unavailable",
                "Emergency alerts are unavailable: no SMS provider is configured.",
            ),
        ]),
    );

    catalog.insert(
        Locale::Hindi,
        Table::from([
            (
                "sos.alert_body",
                "{name} की ओर से आपातकालीन SOS। उन्हें तुरंत सहायता की आवश्यकता है।",
            ),
            ("sos.unknown_patient", "एक SmartCare Hub उपयोगकर्ता"),
            ("sos.location_line", "स्थान: {location}"),
            ("sos.note_line", "टिप्पणी: {note}"),
            ("sos.sent_all", "आपातकालीन अलर्ट {count} संपर्क(ों) को भेजा गया।"),
            ("sos.failed_some", "इन नंबरों पर आपातकालीन अलर्ट नहीं भेजा जा सका: {recipients}"),
            ("sos.no_contacts", "कोई आपातकालीन संपर्क कॉन्फ़िगर नहीं है।"),
            (
                "sos.unavailable",
                "आपातकालीन अलर्ट उपलब्ध नहीं हैं: कोई SMS प्रदाता कॉन्फ़िगर नहीं है।",
            ),
        ]),
    );

    // Partial coverage; missing keys resolve through the default locale.
    catalog.insert(
        Locale::Bengali,
        Table::from([
            (
                "sos.alert_body",
                "{name}-এর কাছ থেকে জরুরি SOS। তাঁর এখনই সাহায্য প্রয়োজন।",
            ),
            ("sos.location_line", "অবস্থান: {location}"),
        ]),
    );

    catalog.insert(
        Locale::Marathi,
        Table::from([
            (
                "sos.alert_body",
                "{name} यांच्याकडून आपत्कालीन SOS. त्यांना त्वरित मदतीची गरज आहे.",
            ),
            ("sos.location_line", "ठिकाण: {location}"),
        ]),
    );

    catalog
});

/// Explicit language configuration for formatting calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageConfig {
    pub requested: Locale,
    pub default: Locale,
}

impl LanguageConfig {
    pub fn new(requested: Locale, default: Locale) -> Self {
        Self { requested, default }
    }

    /// Build from a free-form tag. Unparseable or absent tags fall back to
    /// `default`.
    pub fn from_tag(tag: Option<&str>, default: Locale) -> Self {
        Self {
            requested: tag.and_then(Locale::parse).unwrap_or(default),
            default,
        }
    }

    /// Look up `key`: requested locale, then default locale, then the key
    /// itself.
    pub fn text<'a>(&self, key: &'a str) -> &'a str {
        lookup(self.requested, key)
            .or_else(|| lookup(self.default, key))
            .unwrap_or(key)
    }

    /// Look up `key` and substitute `{placeholder}` arguments.
    pub fn format(&self, key: &str, args: &[(&str, &str)]) -> String {
        args.iter()
            .fold(self.text(key).to_string(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            })
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self::new(Locale::English, Locale::English)
    }
}

fn lookup(locale: Locale, key: &str) -> Option<&'static str> {
    CATALOG.get(&locale).and_then(|table| table.get(key)).copied()
}
