//! Runtime configuration. Everything comes from the environment with
//! compiled defaults; there is no config file.

const DEFAULT_API_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the studio API, without a trailing slash.
    pub api_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        let api_url = std::env::var("OBSCURA_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self {
            api_url: normalize_base_url(&api_url),
        }
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_trailing_slash() {
        assert_eq!(
            normalize_base_url("http://studio.example/api/"),
            "http://studio.example/api"
        );
        assert_eq!(
            normalize_base_url("  http://studio.example/api  "),
            "http://studio.example/api"
        );
        assert_eq!(normalize_base_url("http://x/api"), "http://x/api");
    }
}
