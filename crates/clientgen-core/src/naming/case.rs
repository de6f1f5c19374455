//! String transformation utilities for code generation

/// Split a raw name into words.
///
/// Boundaries are any non-alphanumeric character, a lower-to-upper
/// transition (`fooBar`), the end of an acronym (`HTTPResponse` splits as
/// `HTTP`, `Response`) and a digit followed by an uppercase letter (`v2Beta`).
pub fn split_words(raw: &str) -> Vec<String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &ch) in chars.iter().enumerate() {
        if !ch.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(prev) = current.chars().last() {
            let next = chars.get(i + 1).copied();
            let boundary = ch.is_ascii_uppercase()
                && (prev.is_ascii_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_ascii_uppercase() && next.map_or(false, |n| n.is_ascii_lowercase())));
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
    }
}

/// Convert a string to snake_case
pub fn to_snake_case(s: &str) -> String {
    split_words(s)
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Convert a string to SCREAMING_SNAKE_CASE
pub fn to_screaming_snake_case(s: &str) -> String {
    split_words(s)
        .iter()
        .map(|w| w.to_ascii_uppercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Convert a string to UpperCamelCase (PascalCase)
pub fn to_upper_camel_case(s: &str) -> String {
    split_words(s).iter().map(|w| capitalize(w)).collect()
}

/// Convert a string to lowerCamelCase
pub fn to_lower_camel_case(s: &str) -> String {
    split_words(s)
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { w.to_ascii_lowercase() } else { capitalize(w) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("HTTPResponse"), vec!["HTTP", "Response"]);
        assert_eq!(split_words("getHTTP2Response"), vec!["get", "HTTP2", "Response"]);
        assert_eq!(split_words("v2Beta"), vec!["v2", "Beta"]);
        assert_eq!(split_words("int32_value"), vec!["int32", "value"]);
        assert_eq!(split_words("--a  b--"), vec!["a", "b"]);
        assert!(split_words("@#!").is_empty());
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("findPetsByStatus"), "find_pets_by_status");
        assert_eq!(to_snake_case("FindPetsByStatus"), "find_pets_by_status");
        assert_eq!(to_snake_case("find-pets-by-status"), "find_pets_by_status");
        assert_eq!(to_snake_case("find_pets_by_status"), "find_pets_by_status");
        assert_eq!(to_snake_case("HTTPResponse"), "http_response");
        assert_eq!(to_snake_case("getHTTPResponse"), "get_http_response");
        assert_eq!(to_snake_case("get HTTP Response"), "get_http_response");
    }

    #[test]
    fn test_to_upper_camel_case() {
        assert_eq!(to_upper_camel_case("find_pets_by_status"), "FindPetsByStatus");
        assert_eq!(to_upper_camel_case("findPetsByStatus"), "FindPetsByStatus");
        assert_eq!(to_upper_camel_case("FIND_PETS_BY_STATUS"), "FindPetsByStatus");
        assert_eq!(to_upper_camel_case("http_response"), "HttpResponse");
        assert_eq!(to_upper_camel_case("IOStream"), "IoStream");
    }

    #[test]
    fn test_to_lower_camel_case() {
        assert_eq!(to_lower_camel_case("find_pets_by_status"), "findPetsByStatus");
        assert_eq!(to_lower_camel_case("FindPetsByStatus"), "findPetsByStatus");
        assert_eq!(to_lower_camel_case("URL"), "url");
    }

    #[test]
    fn test_to_screaming_snake_case() {
        assert_eq!(to_screaming_snake_case("maxPageSize"), "MAX_PAGE_SIZE");
        assert_eq!(to_screaming_snake_case("MAX_PAGE_SIZE"), "MAX_PAGE_SIZE");
    }
}
