use serde::{Deserialize, Deserializer};

/// One purchasable option combination from the per-card embedded records.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Variant {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: String,
    #[serde(default)]
    pub option1: Option<String>,
    #[serde(default)]
    pub option2: Option<String>,
    #[serde(default)]
    pub option3: Option<String>,
    pub price: i64,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub featured_image: Option<FeaturedImage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeaturedImage {
    pub src: String,
}

fn default_available() -> bool {
    true
}

// Storefront feeds serialize variant ids sometimes as numbers, sometimes as
// strings; the cart endpoint takes either, so normalize to a string.
fn id_from_number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(value) => value.to_string(),
        Raw::Text(value) => value,
    })
}

pub(crate) fn parse_variants(json: &str) -> serde_json::Result<Vec<Variant>> {
    serde_json::from_str(json)
}

/// Resolves the selector values of a card (in positional order) against its
/// variant list. A candidate matches when its first option equals the first
/// selected value and every further selected value equals the candidate's
/// corresponding option or that option is absent. First match wins.
pub fn match_variant<'a>(variants: &'a [Variant], selected: &[String]) -> Option<&'a Variant> {
    let first = selected.first()?;
    variants.iter().find(|variant| {
        variant.option1.as_deref() == Some(first.as_str())
            && option_matches(variant.option2.as_deref(), selected.get(1))
            && option_matches(variant.option3.as_deref(), selected.get(2))
    })
}

fn option_matches(option: Option<&str>, selected: Option<&String>) -> bool {
    match (option, selected) {
        (_, None) => true,
        (None, Some(_)) => true,
        (Some(option), Some(selected)) => option == selected.as_str(),
    }
}
