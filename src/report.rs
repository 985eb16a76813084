//! HTML report assembly.
//!
//! One template renders every report: a branding header, one block per
//! [`ReportSection`] in list order and a footer. Charts are embedded as
//! Plotly figure JSON and drawn client-side.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::chart::Chart;
use crate::error::Result;

// ---

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.27.0.min.js";

/// Shown in place of a section body that has nothing to draw.
pub const MISSING_BODY: &str = "Ningun tipo coincide";

/// Plain tabular body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub enum SectionBody {
    Chart(Chart),
    Table(Table),
    Missing,
}

/// Layout hint for a section block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SectionKind {
    #[default]
    Wide,
    /// Rendered side by side with the next compact section.
    Compact,
}

impl SectionKind {
    fn css_class(self) -> &'static str {
        match self {
            SectionKind::Wide => "section",
            SectionKind::Compact => "section compact",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportSection {
    pub title: String,
    pub subtitle: Option<String>,
    pub text: Option<String>,
    pub body: SectionBody,
    pub kind: SectionKind,
}

impl ReportSection {
    pub fn new(title: impl Into<String>, body: SectionBody) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            text: None,
            body,
            kind: SectionKind::Wide,
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn compact(mut self) -> Self {
        self.kind = SectionKind::Compact;
        self
    }
}

/// Render the whole document.
pub fn render_html(heading: &str, generated: NaiveDate, sections: &[ReportSection]) -> Result<String> {
    // ---
    let mut blocks = String::new();
    for (i, section) in sections.iter().enumerate() {
        blocks.push_str(&render_section(i, section)?);
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>H2Okuo Reporting - {title}</title>
    <script src="{cdn}"></script>
    <style>{css}</style>
</head>
<body>
    <div class="container">
        {header}
        {blocks}
        {footer}
    </div>
</body>
</html>"#,
        title = html_escape(heading),
        cdn = PLOTLY_CDN,
        css = inline_css(),
        header = render_header(heading, generated),
        blocks = blocks,
        footer = render_footer(),
    ))
}

fn render_header(heading: &str, generated: NaiveDate) -> String {
    format!(
        r#"<header>
            <h1>H2Okuo Reporting</h1>
            <h2>{heading}</h2>
            <div class="meta">Generado el {date}</div>
        </header>"#,
        heading = html_escape(heading),
        date = generated.format("%d-%m-%Y"),
    )
}

fn render_footer() -> String {
    r#"<footer>
            <a href="https://www.asimetrix.co/">Asimetrix</a>
        </footer>"#
        .to_string()
}

fn render_section(index: usize, section: &ReportSection) -> Result<String> {
    // ---
    let subtitle = section
        .subtitle
        .as_deref()
        .map(|s| format!("<h3>{}</h3>", html_escape(s)))
        .unwrap_or_default();
    let text = section
        .text
        .as_deref()
        .map(|t| format!(r#"<p class="text">{}</p>"#, html_escape(t)))
        .unwrap_or_default();

    let body = match &section.body {
        SectionBody::Chart(chart) => render_chart(index, chart)?,
        SectionBody::Table(table) if !table.rows.is_empty() => render_table(table),
        SectionBody::Table(_) | SectionBody::Missing => {
            format!(r#"<p class="missing">{MISSING_BODY}</p>"#)
        }
    };

    Ok(format!(
        r#"
        <div class="{class}">
            <h2>{title}</h2>
            {subtitle}
            {body}
            {text}
        </div>"#,
        class = section.kind.css_class(),
        title = html_escape(&section.title),
    ))
}

fn render_chart(index: usize, chart: &Chart) -> Result<String> {
    // ---
    let figure = serde_json::to_string(chart)?;
    Ok(format!(
        r#"<div class="chart" id="chart-{index}"></div>
            <script>
                (function() {{
                    var fig = {figure};
                    Plotly.newPlot("chart-{index}", fig.data, fig.layout, {{displayModeBar: false}});
                }})();
            </script>"#,
        figure = escape_script(&figure),
    ))
}

fn render_table(table: &Table) -> String {
    // ---
    let headers: String = table
        .headers
        .iter()
        .map(|h| format!("<th>{}</th>", html_escape(h)))
        .collect();
    let rows: String = table
        .rows
        .iter()
        .map(|row| {
            let cells: String = row
                .iter()
                .map(|c| format!("<td>{}</td>", html_escape(c)))
                .collect();
            format!("<tr>{cells}</tr>\n")
        })
        .collect();

    format!(
        r#"<table>
                <thead><tr>{headers}</tr></thead>
                <tbody>
{rows}                </tbody>
            </table>"#
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Keep embedded JSON from closing the surrounding script element.
fn escape_script(json: &str) -> String {
    json.replace("</", "<\\/")
}

fn inline_css() -> &'static str {
    r#"
* { box-sizing: border-box; }
body {
    font-family: system-ui, -apple-system, 'Segoe UI', sans-serif;
    color: #1f2937;
    background: #ffffff;
    margin: 0;
}
.container { max-width: 1100px; margin: 0 auto; padding: 2rem; }
header { border-bottom: 3px solid #00b16a; margin-bottom: 2rem; padding-bottom: 1rem; }
header h1 { color: #00b16a; margin: 0 0 0.25rem 0; }
header h2 { margin: 0; font-weight: 500; }
header .meta { color: #6b7280; font-size: 0.875rem; }
.section { margin-bottom: 2.5rem; }
.section.compact { display: inline-block; vertical-align: top; width: 49%; }
.section h2 { font-size: 1.35rem; margin-bottom: 0.25rem; }
.section h3 { font-size: 1rem; color: #4b5563; font-weight: 500; margin-top: 0; }
.text { color: #374151; }
.missing { color: #9ca3af; font-style: italic; }
table { border-collapse: collapse; width: 100%; }
th, td { padding: 0.5rem 0.75rem; border-bottom: 1px solid #e5e7eb; text-align: left; font-size: 0.875rem; }
thead { background: #f9fafb; }
footer { border-top: 1px solid #e5e7eb; margin-top: 2rem; padding-top: 1rem; font-size: 0.875rem; }
footer a { color: #00b16a; }
"#
}

/// `"<report_name> <DD-Mon-YY>.html"`.
pub fn report_file_name(report_name: &str, date: NaiveDate) -> String {
    format!("{} {}.html", report_name, date.format("%d-%b-%y"))
}

/// Write `html` under `dir` and return the file's path.
pub fn write_report(dir: &Path, report_name: &str, date: NaiveDate, html: &str) -> Result<PathBuf> {
    // ---
    fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(report_name, date));
    fs::write(&path, html)?;
    info!("Report written to {} ({} bytes)", path.display(), html.len());
    Ok(path)
}
