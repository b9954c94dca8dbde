//! Identifier normalisation and slug generation.
//!
//! Author ids and slugs end up in repository paths and branch names, so they
//! are restricted to `[a-z0-9-]`.

use std::fmt;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Maximum length of a generated slug.
pub const SLUG_MAX_LEN: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("invalid {field}: nothing left after normalisation")]
    Empty { field: &'static str },

    #[error("invalid idea id '{0}': expected <author>/<slug>")]
    MalformedIdeaId(String),
}

/// An idea addressed by `(author_id, slug)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdeaRef {
    pub author_id: String,
    pub slug: String,
}

impl fmt::Display for IdeaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.author_id, self.slug)
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
}

/// Trim, lowercase and strip everything outside `[a-z0-9-]`.
///
/// Fails only when nothing survives, so `" Ana_B "` becomes `"anab"`.
pub fn normalize_id(value: &str, field: &'static str) -> Result<String, IdError> {
    let normalized: String = value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| is_id_char(*c))
        .collect();
    if normalized.is_empty() {
        return Err(IdError::Empty { field });
    }
    Ok(normalized)
}

/// Parse a strict `author/slug` idea id. Unlike [`normalize_id`] nothing is
/// stripped: any character outside `[A-Za-z0-9-]` rejects the id.
pub fn parse_idea_id(value: &str) -> Result<IdeaRef, IdError> {
    let trimmed = value.trim();
    let malformed = || IdError::MalformedIdeaId(trimmed.to_string());
    let (author, slug) = trimmed.split_once('/').ok_or_else(malformed)?;
    let valid = |part: &str| {
        !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if !valid(author) || !valid(slug) {
        return Err(malformed());
    }
    Ok(IdeaRef {
        author_id: author.to_ascii_lowercase(),
        slug: slug.to_ascii_lowercase(),
    })
}

fn is_combining_diacritic(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// Convert a title to a path-safe slug of at most [`SLUG_MAX_LEN`] characters.
///
/// The title is NFKD-decomposed and combining diacritics are dropped, so
/// `"Café"` becomes `"cafe"`. Runs of anything outside `[a-z0-9]` then
/// collapse to a single `-`. Returns `fallback` when the title has no usable
/// characters.
pub fn slugify(title: &str, fallback: &str) -> String {
    let slug = title
        .trim()
        .nfkd()
        .filter(|c| !is_combining_diacritic(*c))
        .collect::<String>()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    // ASCII only at this point, so byte slicing is safe.
    let slug = if slug.len() > SLUG_MAX_LEN {
        slug[..SLUG_MAX_LEN].trim_end_matches('-').to_string()
    } else {
        slug
    };
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}
