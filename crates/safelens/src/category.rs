//! Closed set of moderation categories.

/// A content-safety category evaluated for every image.
///
/// The order of [`Category::ALL`] is the order in which categories appear in
/// every verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Exposed-body imagery.
    Nudity,
    /// Drug-related imagery (pills, powder, plants, paraphernalia).
    Drugs,
}

impl Category {
    /// All configured categories, in verdict order.
    pub const ALL: [Category; 2] = [Category::Nudity, Category::Drugs];

    /// Stable lowercase name used in logs and JSON.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nudity => "nudity",
            Self::Drugs => "drugs",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_match_display() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category));
        }
    }
}
