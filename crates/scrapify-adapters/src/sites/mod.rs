//! Site adapters, grouped by how they find postings.

pub mod anchors;
pub mod headings;
pub mod json_api;
pub mod lever;
