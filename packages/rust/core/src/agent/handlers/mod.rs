//! One function per tool. Each decodes its own typed input, checks that the
//! records it touches belong to the calling org, and returns plain JSON.

pub(crate) mod imports;
pub(crate) mod outreach;
pub(crate) mod pipeline;
pub(crate) mod research;

use serde::Deserialize;

pub(crate) const PROJECT_NOT_FOUND: &str = "Project not found";
pub(crate) const PROSPECT_NOT_FOUND: &str = "Prospect not found";

/// Input of the project-scoped read tools.
#[derive(Debug, Deserialize)]
pub(crate) struct ProjectInput {
    pub project_id: Option<String>,
}

/// Input of the single-prospect tools.
#[derive(Debug, Deserialize)]
pub(crate) struct ProspectInput {
    pub prospect_id: String,
}
