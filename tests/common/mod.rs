//! Common test utilities

use serde_json::{json, Value};
use startrail::models::ProjectSummary;

/// Summary with predictable names derived from the id
#[allow(dead_code)]
pub fn summary(id: i64, stars: u64) -> ProjectSummary {
    ProjectSummary {
        id,
        name: format!("repo{id}"),
        full_name: format!("owner/repo{id}"),
        description: Some(format!("Project number {id}")),
        url: format!("https://github.com/owner/repo{id}"),
        language: Some("Rust".to_string()),
        stars,
        forks: stars / 10,
        watchers: stars,
        created_at: None,
    }
}

/// Repository JSON as the hosting API returns it
#[allow(dead_code)]
pub fn repo_json(id: i64, stars: u64) -> Value {
    json!({
        "id": id,
        "node_id": format!("R_{id}"),
        "name": format!("repo{id}"),
        "full_name": format!("owner/repo{id}"),
        "private": false,
        "owner": {"login": "owner", "id": 1},
        "html_url": format!("https://github.com/owner/repo{id}"),
        "description": format!("Project number {id}"),
        "language": "Rust",
        "stargazers_count": stars,
        "watchers_count": stars,
        "forks_count": stars / 10,
        "created_at": "2020-01-01T00:00:00Z"
    })
}

/// Search response body for the given (id, stars) pairs
#[allow(dead_code)]
pub fn search_json(items: &[(i64, u64)]) -> Value {
    json!({
        "total_count": items.len(),
        "incomplete_results": false,
        "items": items.iter().map(|(id, stars)| repo_json(*id, *stars)).collect::<Vec<_>>()
    })
}
