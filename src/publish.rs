use crate::db::models::PublishedSnippet;
use crate::db::{is_constraint_violation, Database};
use rand::Rng;

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 6;
const SLUG_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Please enter a title")]
    MissingTitle,
    #[error("Nothing to publish")]
    EmptyContent,
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// Lower-case the title, collapse everything outside `[a-z0-9]` to single
/// dashes and trim them from the ends.
pub fn slug_base(title: &str) -> String {
    let mut base = String::with_capacity(title.len());
    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            base.push(c);
        } else if !base.ends_with('-') {
            base.push('-');
        }
    }
    base.trim_matches('-').to_string()
}

pub fn generate_slug(title: &str) -> String {
    let base = slug_base(title);
    if base.is_empty() {
        random_suffix()
    } else {
        format!("{}-{}", base, random_suffix())
    }
}

pub fn publish(
    db: &Database,
    title: &str,
    description: Option<&str>,
    html_content: &str,
) -> Result<PublishedSnippet, PublishError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PublishError::MissingTitle);
    }
    if html_content.trim().is_empty() {
        return Err(PublishError::EmptyContent);
    }
    let description = description.map(str::trim).filter(|d| !d.is_empty());

    let mut attempt = 0;
    loop {
        attempt += 1;
        let slug = generate_slug(title);
        match db.publish_snippet(&slug, title, description, html_content) {
            Ok(snippet) => {
                tracing::info!(slug = %snippet.slug, "published snippet");
                return Ok(snippet);
            }
            Err(e) if is_constraint_violation(&e) && attempt < SLUG_ATTEMPTS => {
                tracing::warn!(slug = %slug, "slug collision, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub fn public_url(base_url: &str, slug: &str) -> String {
    format!("{}/published/{}", base_url.trim_end_matches('/'), slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_base() {
        assert_eq!(slug_base("My Awesome Project!"), "my-awesome-project");
        assert_eq!(slug_base("  --Todo   App 2.0--  "), "todo-app-2-0");
        assert_eq!(slug_base("日本語"), "");
    }

    #[test]
    fn test_generated_slug_has_suffix() {
        let slug = generate_slug("Weather Widget");
        let (base, suffix) = slug.rsplit_once('-').unwrap();
        assert_eq!(base, "weather-widget");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b)));
        assert_eq!(generate_slug("!!!").len(), 6);
    }

    #[test]
    fn test_publish_validates_and_stores() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path()).unwrap();

        assert!(matches!(
            publish(&db, "   ", None, "<p>x</p>"),
            Err(PublishError::MissingTitle)
        ));
        assert!(matches!(
            publish(&db, "T", None, "  "),
            Err(PublishError::EmptyContent)
        ));

        let snippet = publish(&db, " Clock ", Some("  "), "<!DOCTYPE html>").unwrap();
        assert_eq!(snippet.title, "Clock");
        assert_eq!(snippet.description, None);
        assert!(snippet.slug.starts_with("clock-"));
        assert_eq!(db.get_published(&snippet.slug).unwrap().unwrap(), snippet);
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("http://localhost:3000/", "a-b"),
            "http://localhost:3000/published/a-b"
        );
    }
}
