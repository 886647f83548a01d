use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Resolution labels accepted at the API boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
    IntoStaticStr,
)]
pub enum ResolutionLabel {
    #[serde(rename = "480p")]
    #[strum(serialize = "480p")]
    P480,
    #[serde(rename = "512p")]
    #[strum(serialize = "512p")]
    P512,
    #[serde(rename = "720p")]
    #[strum(serialize = "720p")]
    P720,
    #[serde(rename = "768p")]
    #[strum(serialize = "768p")]
    P768,
    #[serde(rename = "1024p")]
    #[strum(serialize = "1024p")]
    P1024,
    #[serde(rename = "1080p")]
    #[strum(serialize = "1080p")]
    P1080,
}

impl ResolutionLabel {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_labels_parse_from_wire_form() {
        assert_eq!(ResolutionLabel::from_str("768p").unwrap(), ResolutionLabel::P768);
        assert_eq!(ResolutionLabel::P1080.to_string(), "1080p");
        assert!(ResolutionLabel::from_str("4k").is_err());
        assert!(ResolutionLabel::from_str("768P").is_err());
    }
}
