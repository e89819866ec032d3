//! Cosmetic URL slugs and public viewer paths.
//!
//! The slug derived from the recipient name only decorates the public URL.
//! Resolution always goes through the access code; a stale or edited slug
//! never prevents a viewer from opening the page.

use std::sync::LazyLock;

use regex::Regex;

use super::AccessCode;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-z0-9_\s-]").unwrap_or_else(|_| unreachable!("static pattern"))
});

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s_-]+").unwrap_or_else(|_| unreachable!("static pattern")));

/// Derives the URL slug for a recipient name.
///
/// Lowercases, strips non-word characters, collapses runs of whitespace,
/// underscores and hyphens into a single hyphen, then trims hyphens from
/// both ends. Names made entirely of stripped characters yield an empty
/// slug.
#[must_use]
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, "");
    let hyphenated = SEPARATORS.replace_all(&stripped, "-");
    hyphenated.trim_matches('-').to_string()
}

/// Path of the code-only viewer route: `/view/{code}`.
#[must_use]
pub fn view_path(code: &AccessCode) -> String {
    format!("/view/{code}")
}

/// Path of the public surprise route: `/surprise/{slug}/{code}`.
///
/// Falls back to [`view_path`] when the slug is empty, so the URL never
/// contains an empty path segment.
#[must_use]
pub fn public_path(slug: &str, code: &AccessCode) -> String {
    if slug.is_empty() {
        view_path(code)
    } else {
        format!("/surprise/{slug}/{code}")
    }
}

/// Joins `base_url` and a public path into an absolute URL.
#[must_use]
pub fn public_url(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn code() -> AccessCode {
        let Ok(code) = AccessCode::parse("AB3DEFGH9K") else {
            panic!("valid code");
        };
        code
    }

    #[test]
    fn recipient_name_becomes_slug() {
        assert_eq!(slugify("Sarah Jones"), "sarah-jones");
    }

    #[test]
    fn punctuation_is_stripped_and_separators_collapse() {
        assert_eq!(slugify("  Mom & Dad's  40th!! "), "mom-dads-40th");
        assert_eq!(slugify("anna__maria--lopez"), "anna-maria-lopez");
        assert_eq!(slugify("-Leading and trailing-"), "leading-and-trailing");
    }

    #[test]
    fn all_stripped_name_gives_empty_slug() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn public_path_matches_route_scheme() {
        assert_eq!(
            public_path(&slugify("Sarah Jones"), &code()),
            "/surprise/sarah-jones/AB3DEFGH9K"
        );
        assert_eq!(public_path("", &code()), "/view/AB3DEFGH9K");
    }

    #[test]
    fn public_url_joins_without_double_slash() {
        assert_eq!(
            public_url("https://keepsake.example/", "/view/AB3DEFGH9K"),
            "https://keepsake.example/view/AB3DEFGH9K"
        );
    }
}
