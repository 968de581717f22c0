//! Embedded Handlebars templates for the HTML views

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{Error, Result};

pub const INDEX_TEMPLATE: &str = "index";
pub const PROJECT_TEMPLATE: &str = "project";
pub const NOT_FOUND_TEMPLATE: &str = "not_found";
pub const DATABASE_TEMPLATE: &str = "database";
pub const TABLE_TEMPLATE: &str = "table";

const HEADER_PARTIAL: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{title}} | startrail</title>
<style>
body { font-family: sans-serif; margin: 2rem auto; max-width: 1100px; color: #222; }
table { border-collapse: collapse; width: 100%; }
th, td { border-bottom: 1px solid #ddd; padding: 0.4rem; text-align: left; }
th { background: #f5f5f5; }
.num { text-align: right; }
.message { background: #fff3cd; border: 1px solid #e0c36a; padding: 0.6rem; }
nav a { margin-right: 1rem; }
</style>
</head>
<body>
<nav><a href="/">Trending</a><a href="/admin/database">Database</a><a href="/api/jobs">Jobs</a></nav>
<h1>{{title}}</h1>
"#;

const FOOTER_PARTIAL: &str = r#"</body>
</html>
"#;

const INDEX_BODY: &str = r#"{{> header}}
<form method="get" action="/">
  <label>Date <input type="date" name="date" value="{{page.date}}"></label>
  <label>Per page <input type="number" name="per_page" min="1" max="100" value="{{page.per_page}}"></label>
  <button type="submit">Show</button>
</form>
{{#if page.error}}<p class="message">{{page.error}}</p>{{/if}}
<p>{{page.total_items}} projects collected on {{page.date}}</p>
<table>
<thead><tr><th>Project</th><th>Language</th><th class="num">Stars</th><th class="num">Forks</th><th class="num">Watchers</th></tr></thead>
<tbody>
{{#each page.projects}}
<tr>
  <td><a href="/project/{{project_id}}">{{full_name}}</a>{{#if description}}<br><small>{{description}}</small>{{/if}}</td>
  <td>{{language}}</td>
  <td class="num">{{stars}}</td>
  <td class="num">{{forks}}</td>
  <td class="num">{{watchers}}</td>
</tr>
{{else}}
<tr><td colspan="5">No projects for this date.</td></tr>
{{/each}}
</tbody>
</table>
<p>
{{#if page.prev_page}}<a href="/?date={{page.date}}&page={{page.prev_page}}&per_page={{page.per_page}}">&laquo; Previous</a>{{/if}}
Page {{page.page}} of {{page.total_pages}}
{{#if page.next_page}}<a href="/?date={{page.date}}&page={{page.next_page}}&per_page={{page.per_page}}">Next &raquo;</a>{{/if}}
</p>
{{> footer}}"#;

const PROJECT_BODY: &str = r#"{{> header}}
<p><a href="{{project.url}}">{{project.url}}</a></p>
{{#if project.description}}<p>{{project.description}}</p>{{/if}}
<table>
<tr><th>Language</th><td>{{project.language}}</td></tr>
<tr><th>Stars</th><td>{{project.stars}}</td></tr>
<tr><th>Forks</th><td>{{project.forks}}</td></tr>
<tr><th>Watchers</th><td>{{project.watchers}}</td></tr>
<tr><th>Last collected</th><td>{{project.collect_date}}</td></tr>
</table>
<h2>History since {{since}}</h2>
<table>
<thead><tr><th>Collected</th><th class="num">Stars</th><th class="num">Forks</th><th class="num">Watchers</th></tr></thead>
<tbody>
{{#each history}}
<tr><td>{{collect_date}}</td><td class="num">{{stars}}</td><td class="num">{{forks}}</td><td class="num">{{watchers}}</td></tr>
{{else}}
<tr><td colspan="4">No history recorded yet.</td></tr>
{{/each}}
</tbody>
</table>
<script id="history-data" type="application/json">{{{history_json}}}</script>
{{> footer}}"#;

const NOT_FOUND_BODY: &str = r#"{{> header}}
<p class="message">{{message}}</p>
<p><a href="/">Back to trending</a></p>
{{> footer}}"#;

const DATABASE_BODY: &str = r#"{{> header}}
{{#if error}}<p class="message">{{error}}</p>{{/if}}
<ul>
{{#each tables}}
<li><a href="/admin/database/table/{{this}}">{{this}}</a></li>
{{else}}
<li>No tables.</li>
{{/each}}
</ul>
{{> footer}}"#;

const TABLE_BODY: &str = r#"{{> header}}
<h2>Columns</h2>
<table>
<thead><tr><th>#</th><th>Name</th><th>Type</th><th>Not null</th><th>Default</th><th>Primary key</th></tr></thead>
<tbody>
{{#each table.columns}}
<tr><td>{{cid}}</td><td>{{name}}</td><td>{{decl_type}}</td><td>{{not_null}}</td><td>{{default_value}}</td><td>{{primary_key}}</td></tr>
{{/each}}
</tbody>
</table>
<h2>Sample rows</h2>
<table>
<thead><tr>{{#each table.columns}}<th>{{name}}</th>{{/each}}</tr></thead>
<tbody>
{{#each table.sample_rows}}
<tr>{{#each this}}<td>{{this}}</td>{{/each}}</tr>
{{else}}
<tr><td>Table is empty.</td></tr>
{{/each}}
</tbody>
</table>
{{> footer}}"#;

/// Compiled page templates
pub struct Templates {
    handlebars: Handlebars<'static>,
}

impl Templates {
    /// Compile every embedded template
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();

        for (name, source) in [("header", HEADER_PARTIAL), ("footer", FOOTER_PARTIAL)] {
            handlebars
                .register_partial(name, source)
                .map_err(|e| Error::config(format!("Failed to register partial {name}: {e}")))?;
        }

        for (name, source) in [
            (INDEX_TEMPLATE, INDEX_BODY),
            (PROJECT_TEMPLATE, PROJECT_BODY),
            (NOT_FOUND_TEMPLATE, NOT_FOUND_BODY),
            (DATABASE_TEMPLATE, DATABASE_BODY),
            (TABLE_TEMPLATE, TABLE_BODY),
        ] {
            handlebars
                .register_template_string(name, source)
                .map_err(|e| Error::config(format!("Failed to register template {name}: {e}")))?;
        }

        Ok(Self { handlebars })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        Ok(self.handlebars.render(name, data)?)
    }
}

/// Serialize for embedding inside a `<script>` element
pub fn script_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}
