use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Error body: `{"success": false, "error": {"code", "message"}}`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Substring filters are trimmed; blank means "no filter".
pub fn non_blank(filter: &Option<String>) -> Option<&str> {
    filter
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// For patch fields where `null` clears the value: absent stays `None`,
/// `null` becomes `Some(None)`. Use with `#[serde(default)]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(&Some("  shoe ".into())), Some("shoe"));
        assert_eq!(non_blank(&Some("   ".into())), None);
        assert_eq!(non_blank(&None), None);
    }
}
