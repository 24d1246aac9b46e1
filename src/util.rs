use reqwest::Url;
use std::time::Duration;

/// Parse "true"/"false"/"1"/"0"/"yes"/"off"-style flags.
pub fn parse_bool_flag(s: String) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Reads an environment variable, treating blank values as unset.
pub fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses a whole number of seconds. Zero is kept so validation can reject it.
pub fn parse_secs(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Returns true for localhost, loopback IPv4/IPv6, and 0.0.0.0 URLs.
pub fn is_local_endpoint_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };

    match parsed.host_str() {
        Some(host) => {
            let normalized = host.trim_matches(['[', ']']).to_ascii_lowercase();
            normalized == "localhost"
                || normalized == "::1"
                || normalized == "0.0.0.0"
                || normalized.starts_with("127.")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_flag() {
        assert_eq!(parse_bool_flag("YES".to_string()), Some(true));
        assert_eq!(parse_bool_flag(" off ".to_string()), Some(false));
        assert_eq!(parse_bool_flag("maybe".to_string()), None);
    }

    #[test]
    fn test_parse_secs() {
        assert_eq!(parse_secs(" 30 "), Some(Duration::from_secs(30)));
        assert_eq!(parse_secs("0"), Some(Duration::ZERO));
        assert_eq!(parse_secs("soon"), None);
    }

    #[test]
    fn test_is_local_endpoint_url() {
        assert!(is_local_endpoint_url(" HTTP://LOCALHOST:8000 "));
        assert!(is_local_endpoint_url("http://127.0.0.1:8000/api"));
        assert!(is_local_endpoint_url("http://[::1]:8000"));
        assert!(!is_local_endpoint_url("https://evil-localhost.com"));
        assert!(!is_local_endpoint_url("https://analytics.example.com"));
        assert!(!is_local_endpoint_url("not a url"));
    }
}
