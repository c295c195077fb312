use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Genre, Platform};

/// Body for creating or renaming a platform or genre.
#[derive(Debug, Deserialize, ToSchema)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct PlatformList {
    #[schema(value_type = Vec<Platform>)]
    pub items: Vec<Platform>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct GenreList {
    #[schema(value_type = Vec<Genre>)]
    pub items: Vec<Genre>,
}
