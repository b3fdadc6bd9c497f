use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

use crate::database::entities::teams;
use crate::errors::CoreResult;

pub const MAX_SLUG_SOURCE_LENGTH: usize = 40;

/// Lower-cases and collapses every run of non-alphanumerics into `-`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// First of `base`, `base-1`, `base-2`, ... not yet used by a team.
pub async fn next_unique_team_slug<C: ConnectionTrait>(db: &C, name: &str) -> CoreResult<String> {
    let source: String = name.chars().take(MAX_SLUG_SOURCE_LENGTH).collect();
    let mut base = slugify(&source);
    if base.is_empty() {
        base = "team".to_string();
    }

    let mut candidate = base.clone();
    let mut suffix = 0;
    loop {
        let taken = teams::Entity::find()
            .filter(teams::Column::Slug.eq(candidate.as_str()))
            .count(db)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        suffix += 1;
        candidate = format!("{}-{}", base, suffix);
    }
}
