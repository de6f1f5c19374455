//! Identifier namer.
//!
//! Maps raw service names to Rust identifiers. Pure: the same input always
//! gives the same output and no state is consulted, so collisions between
//! different raw names are left to [`NameRegistry`](super::NameRegistry).
//!
//! # Examples
//!
//! ```
//! use clientgen_core::naming::{to_identifier, CaseConvention, NameContext};
//!
//! assert_eq!(to_identifier("type", CaseConvention::Snake, NameContext::Property), "type_property");
//! assert_eq!(to_identifier("2022-12-01", CaseConvention::Pascal, NameContext::Variant), "V20221201");
//! assert_eq!(to_identifier("HTTPResponse", CaseConvention::Pascal, NameContext::Type), "HttpResponse");
//! ```

// Internal imports (std, crate)
use std::collections::HashSet;

use super::case::{split_words, to_lower_camel_case, to_screaming_snake_case, to_snake_case, to_upper_camel_case};

// External imports (alphabetized)
use once_cell::sync::Lazy;

/// Target case convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseConvention {
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
}

impl CaseConvention {
    pub fn apply(&self, raw: &str) -> String {
        match self {
            Self::Pascal => to_upper_camel_case(raw),
            Self::Camel => to_lower_camel_case(raw),
            Self::Snake => to_snake_case(raw),
            Self::ScreamingSnake => to_screaming_snake_case(raw),
        }
    }

    /// Join a base name and a numeric disambiguator
    pub fn with_suffix(&self, base: &str, n: usize) -> String {
        match self {
            Self::Snake | Self::ScreamingSnake => format!("{}_{}", base, n),
            Self::Pascal | Self::Camel => format!("{}{}", base, n),
        }
    }
}

/// What kind of declaration a name is for; picks the escape word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameContext {
    Type,
    Property,
    Parameter,
    Method,
    Variant,
    Module,
}

impl NameContext {
    fn escape_word(&self) -> &'static str {
        match self {
            Self::Type => "Model",
            Self::Property => "Property",
            Self::Parameter => "Param",
            Self::Method => "Method",
            Self::Variant => "Variant",
            Self::Module => "Module",
        }
    }
}

/// Prefix word for names that would start with a digit
const NUMERIC_PREFIX: &str = "v";
/// Replacement for names with no usable characters
const EMPTY_NAME: &str = "empty";

static RUST_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
        "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
        "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait",
        "true", "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do",
        "final", "gen", "macro", "override", "priv", "try", "typeof", "unsized", "virtual",
        "yield",
    ]
    .into_iter()
    .collect()
});

/// Type names that generated modules import or that shadow the prelude
static RESERVED_TYPE_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "Box", "Clone", "ClientOptions", "DateTime", "Debug", "Decimal", "Default", "Duration", "Encoded",
        "Eq", "Err", "From", "Hash", "IndexMap", "None", "Nullable", "Ok", "Option", "Pager", "PartialEq",
        "Poller", "Result", "RuntimeError", "ServiceVersion", "Some", "String", "UnknownVariant", "Url",
        "Utc", "Uuid", "Vec",
    ]
    .into_iter()
    .collect()
});

/// Variant names that read as prelude constructors
static RESERVED_VARIANT_NAMES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["Err", "None", "Ok", "Some"].into_iter().collect());

/// Methods every generated model or client already defines
static RESERVED_METHOD_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["new", "clone", "default", "options", "additional_properties", "builder"]
        .into_iter()
        .collect()
});

/// Whether `name` cannot be declared as a generated type as written
pub(crate) fn is_reserved_type_name(name: &str) -> bool {
    is_reserved(name, NameContext::Type)
}

fn is_reserved(name: &str, context: NameContext) -> bool {
    if RUST_KEYWORDS.contains(name) {
        return true;
    }
    match context {
        NameContext::Type => RESERVED_TYPE_NAMES.contains(name),
        NameContext::Variant => RESERVED_VARIANT_NAMES.contains(name),
        NameContext::Method => RESERVED_METHOD_NAMES.contains(name),
        _ => false,
    }
}

fn convert_once(raw: &str, convention: CaseConvention, context: NameContext) -> String {
    let mut words = split_words(raw);
    if words.is_empty() {
        words.push(EMPTY_NAME.to_string());
    }
    if words[0].starts_with(|c: char| c.is_ascii_digit()) {
        words.insert(0, NUMERIC_PREFIX.to_string());
    }

    let name = convention.apply(&words.join("_"));
    if is_reserved(&name, context) {
        words.push(context.escape_word().to_string());
        return convention.apply(&words.join("_"));
    }
    name
}

/// Map a raw name to an identifier in `convention`.
///
/// Idempotent: feeding the result back in returns it unchanged.
pub fn to_identifier(raw: &str, convention: CaseConvention, context: NameContext) -> String {
    let mut current = convert_once(raw, convention, context);
    // Adjacent one-letter words ("a b" -> "AB") re-split differently, so
    // iterate to the fixed point; two or three rounds always suffice.
    for _ in 0..4 {
        let next = convert_once(&current, convention, context);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// English plural of the last word of `name`, preserving its case style
pub fn pluralize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let shout = name.chars().any(|c| c.is_ascii_alphabetic()) && name == name.to_ascii_uppercase();
    let suffix_case = |s: &str| if shout { s.to_ascii_uppercase() } else { s.to_string() };

    for (singular, plural) in IRREGULAR {
        if lower.ends_with(singular) {
            let stem = &name[..name.len() - singular.len()];
            return format!("{}{}", stem, suffix_case(&restore_case(&name[name.len() - singular.len()..], plural)));
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|end| lower.ends_with(end)) {
        return format!("{}{}", name, suffix_case("es"));
    }
    if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") && !lower.ends_with("oy") && !lower.ends_with("uy") && name.len() > 1 {
        return format!("{}{}", &name[..name.len() - 1], suffix_case("ies"));
    }
    format!("{}{}", name, suffix_case("s"))
}

/// English singular of the last word of `name`
pub fn singularize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    for (singular, plural) in IRREGULAR {
        if lower.ends_with(plural) {
            let cut = name.len() - plural.len();
            return format!("{}{}", &name[..cut], restore_case(&name[cut..], singular));
        }
    }
    if lower.ends_with("ies") && name.len() > 3 {
        let y = if name.ends_with("IES") { "Y" } else { "y" };
        return format!("{}{}", &name[..name.len() - 3], y);
    }
    if ["sses", "xes", "zes", "ches", "shes"].iter().any(|end| lower.ends_with(end)) {
        return name[..name.len() - 2].to_string();
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && name.len() > 1 {
        return name[..name.len() - 1].to_string();
    }
    name.to_string()
}

const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("person", "people"),
    ("mouse", "mice"),
    ("index", "indexes"),
    ("status", "statuses"),
];

/// Give `replacement` the leading capitalization of `original`
fn restore_case(original: &str, replacement: &str) -> String {
    match original.chars().next() {
        Some(first) if first.is_ascii_uppercase() => {
            let mut chars = replacement.chars();
            match chars.next() {
                Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        }
        _ => replacement.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "type",
        "Self",
        "self",
        "HTTPResponse",
        "2022-12-01-preview",
        "",
        "@@",
        "a b c",
        "x-ms-client-request-id",
        "Option",
        "ABC123Def",
        "new",
        "_private",
        "max_page_size",
        "IOStream",
        "v2",
    ];

    const CONVENTIONS: &[CaseConvention] = &[
        CaseConvention::Pascal,
        CaseConvention::Camel,
        CaseConvention::Snake,
        CaseConvention::ScreamingSnake,
    ];

    const CONTEXTS: &[NameContext] = &[
        NameContext::Type,
        NameContext::Property,
        NameContext::Parameter,
        NameContext::Method,
        NameContext::Variant,
        NameContext::Module,
    ];

    #[test]
    fn test_naming_is_idempotent() {
        for raw in SAMPLES {
            for convention in CONVENTIONS {
                for context in CONTEXTS {
                    let once = to_identifier(raw, *convention, *context);
                    let twice = to_identifier(&once, *convention, *context);
                    assert_eq!(once, twice, "raw={:?} {:?} {:?}", raw, convention, context);
                }
            }
        }
    }

    #[test]
    fn test_reserved_words_escape() {
        assert_eq!(to_identifier("type", CaseConvention::Snake, NameContext::Property), "type_property");
        assert_eq!(to_identifier("fn", CaseConvention::Snake, NameContext::Parameter), "fn_param");
        assert_eq!(to_identifier("self", CaseConvention::Pascal, NameContext::Type), "SelfModel");
        assert_eq!(to_identifier("option", CaseConvention::Pascal, NameContext::Type), "OptionModel");
        assert_eq!(to_identifier("string", CaseConvention::Pascal, NameContext::Variant), "String");
        assert_eq!(to_identifier("none", CaseConvention::Pascal, NameContext::Variant), "NoneVariant");
        assert_eq!(to_identifier("new", CaseConvention::Snake, NameContext::Method), "new_method");
        assert_eq!(to_identifier("match", CaseConvention::Snake, NameContext::Module), "match_module");
    }

    #[test]
    fn test_empty_and_numeric_leading() {
        assert_eq!(to_identifier("", CaseConvention::Snake, NameContext::Property), "empty");
        assert_eq!(to_identifier("@@", CaseConvention::Pascal, NameContext::Type), "Empty");
        assert_eq!(to_identifier("2022-12-01-preview", CaseConvention::Pascal, NameContext::Variant), "V20221201Preview");
        assert_eq!(to_identifier("404", CaseConvention::Snake, NameContext::Property), "v_404");
    }

    #[test]
    fn test_case_conventions() {
        assert_eq!(to_identifier("x-ms-client-request-id", CaseConvention::Snake, NameContext::Parameter), "x_ms_client_request_id");
        assert_eq!(to_identifier("maxPageSize", CaseConvention::ScreamingSnake, NameContext::Variant), "MAX_PAGE_SIZE");
        assert_eq!(to_identifier("a b c", CaseConvention::Pascal, NameContext::Type), "Abc");
    }

    #[test]
    fn test_plurals() {
        assert_eq!(pluralize("Widget"), "Widgets");
        assert_eq!(pluralize("Box"), "Boxes");
        assert_eq!(pluralize("Policy"), "Policies");
        assert_eq!(pluralize("Key"), "Keys");
        assert_eq!(pluralize("Child"), "Children");
        assert_eq!(pluralize("ID"), "IDS");

        assert_eq!(singularize("Widgets"), "Widget");
        assert_eq!(singularize("Policies"), "Policy");
        assert_eq!(singularize("Boxes"), "Box");
        assert_eq!(singularize("Address"), "Address");
        assert_eq!(singularize("people"), "person");
    }
}
