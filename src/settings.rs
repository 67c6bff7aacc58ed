//! Document settings – the typed option set a [`crate::Document`] is built
//! with. Keys use the camelCase option names so a
//! settings JSON object like `{"marginTop": 30, "dpi": "150"}` deserializes
//! directly.
//!
//! Numeric options never fail to deserialize: numbers, numeric strings and
//! booleans are cast, anything else becomes `0` (with a warning). Values
//! that would break the converter are normalized by
//! [`DocumentSettings::normalized`].

use serde::{Deserialize, Serialize};

/// Default converter resolution.
pub const DEFAULT_DPI: u32 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentSettings {
    /// Append the page-number widget to the footer.
    pub show_page_numbers: bool,
    /// Label rendered in front of the page counter.
    pub page_numbers_prefix: String,
    /// Download name of the PDF; generated when empty.
    pub filename: String,
    #[serde(deserialize_with = "lenient::uint")]
    pub dpi: u32,
    /// Page margins in millimetres.
    #[serde(deserialize_with = "lenient::float")]
    pub margin_top: f64,
    #[serde(deserialize_with = "lenient::float")]
    pub margin_right: f64,
    #[serde(deserialize_with = "lenient::float")]
    pub margin_bottom: f64,
    #[serde(deserialize_with = "lenient::float")]
    pub margin_left: f64,
    #[serde(deserialize_with = "lenient::float")]
    pub header_spacing: f64,
    #[serde(deserialize_with = "lenient::float")]
    pub footer_spacing: f64,
    #[serde(deserialize_with = "lenient::float")]
    pub zoom: f64,
    pub enable_forms: bool,
    /// Draw DIN 5008 folding and punch marks in the header region.
    pub folding_marks: bool,
    pub disable_smart_shrinking: bool,
    /// Download name for image artifacts; generated when empty.
    pub output_filename: String,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            show_page_numbers: true,
            page_numbers_prefix: "Page".to_string(),
            filename: String::new(),
            dpi: DEFAULT_DPI,
            margin_top: 20.0,
            margin_right: 5.0,
            margin_bottom: 20.0,
            margin_left: 5.0,
            // should be 5 at minimum
            header_spacing: 5.0,
            footer_spacing: 0.0,
            zoom: 1.0,
            enable_forms: false,
            folding_marks: false,
            disable_smart_shrinking: false,
            output_filename: String::new(),
        }
    }
}

impl DocumentSettings {
    /// Replace values the converter cannot work with by their defaults.
    pub fn normalized(mut self) -> Self {
        if self.dpi == 0 {
            log::warn!("dpi must be positive, using {DEFAULT_DPI}");
            self.dpi = DEFAULT_DPI;
        }
        if !(self.zoom.is_finite() && self.zoom > 0.0) {
            log::warn!("zoom must be positive, using 1");
            self.zoom = 1.0;
        }
        for v in [
            &mut self.margin_top,
            &mut self.margin_right,
            &mut self.margin_bottom,
            &mut self.margin_left,
            &mut self.header_spacing,
            &mut self.footer_spacing,
        ] {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
        self
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str::<Self>(json)
            .map(Self::normalized)
            .map_err(|e| e.to_string())
    }
}

/// Casting deserializers for numeric settings.
mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Numeric {
        Int(i64),
        Float(f64),
        Bool(bool),
        Text(String),
    }

    fn cast(value: Option<Numeric>) -> f64 {
        match value {
            None => 0.0,
            Some(Numeric::Int(i)) => i as f64,
            Some(Numeric::Float(f)) => f,
            Some(Numeric::Bool(b)) => f64::from(u8::from(b)),
            Some(Numeric::Text(s)) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => f,
                _ => {
                    log::warn!("Non-numeric setting value {s:?} cast to 0");
                    0.0
                }
            },
        }
    }

    pub fn float<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
        Ok(cast(Option::<Numeric>::deserialize(de)?))
    }

    pub fn uint<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
        let f = cast(Option::<Numeric>::deserialize(de)?);
        // `as` saturates: negatives become 0, huge values u32::MAX
        Ok(f.trunc() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = DocumentSettings::default();
        assert!(s.show_page_numbers);
        assert_eq!(s.dpi, 300);
        assert_eq!((s.margin_top, s.margin_right), (20.0, 5.0));
        assert_eq!((s.margin_bottom, s.margin_left), (20.0, 5.0));
        assert_eq!(s.zoom, 1.0);
        assert_eq!(s.header_spacing, 5.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s = DocumentSettings::from_json(r#"{"marginTop": 30, "filename": "test.pdf"}"#).unwrap();
        assert_eq!(s.margin_top, 30.0);
        assert_eq!(s.margin_left, 5.0);
        assert_eq!(s.filename, "test.pdf");
    }

    #[test]
    fn numeric_strings_are_cast() {
        let s = DocumentSettings::from_json(
            r#"{"dpi": "150.9", "zoom": "1.25", "marginBottom": "25", "footerSpacing": true}"#,
        )
        .unwrap();
        assert_eq!(s.dpi, 150);
        assert_eq!(s.zoom, 1.25);
        assert_eq!(s.margin_bottom, 25.0);
        assert_eq!(s.footer_spacing, 1.0);
    }

    #[test]
    fn junk_numbers_never_raise() {
        let s = DocumentSettings::from_json(
            r#"{"dpi": "lots", "zoom": null, "marginTop": "wide"}"#,
        )
        .unwrap();
        // cast to 0, then normalized
        assert_eq!(s.dpi, DEFAULT_DPI);
        assert_eq!(s.zoom, 1.0);
        assert_eq!(s.margin_top, 0.0);
    }

    #[test]
    fn json_round_trip_uses_camel_case() {
        let json = DocumentSettings::default().to_json();
        assert!(json.contains("\"showPageNumbers\""));
        assert!(json.contains("\"disableSmartShrinking\""));
        assert_eq!(
            DocumentSettings::from_json(&json).unwrap(),
            DocumentSettings::default()
        );
    }
}
