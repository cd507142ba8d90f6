//! Domain name validation and normalization.
//!
//! Names are checked before any network work. Labels follow hostname rules
//! with underscores allowed, since real-world names such as AMP cache hosts
//! and service records carry them.

const MAX_DOMAIN_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 63;

/// Returns whether `domain` is a syntactically valid domain name.
///
/// Requires at least two labels of 1-63 ASCII letters, digits, hyphens or
/// underscores, no label starting or ending with a hyphen, and an alphabetic
/// TLD of at least two characters (or a Punycode `xn--` TLD). A single
/// trailing root dot is tolerated.
pub fn is_valid_domain(domain: &str) -> bool {
    let domain = domain.strip_suffix('.').unwrap_or(domain);

    if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let last = labels.len() - 1;
    labels
        .iter()
        .enumerate()
        .all(|(i, label)| is_valid_label(label) && (i != last || is_valid_tld(label)))
}

/// Lowercase, trim surrounding whitespace and drop a single trailing root dot.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(domain: &str) -> String {
    let lowered = domain.to_lowercase();
    let trimmed = lowered.trim();

    match trimmed.strip_suffix('.') {
        Some(rest) if !rest.ends_with(|c: char| c == '.' || c.is_whitespace()) => {
            rest.to_string()
        }
        _ => trimmed.to_string(),
    }
}

fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return false;
    }

    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }

    label
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn is_valid_tld(label: &str) -> bool {
    if label.len() < 2 {
        return false;
    }

    // Punycode TLDs already passed the hostname label rules.
    if label.len() > 4 && label[..4].eq_ignore_ascii_case("xn--") {
        return true;
    }

    label.bytes().all(|b| b.is_ascii_alphabetic())
}
