//! HTML pages for the survey
//!
//! Pages are rendered server side from inline templates. Every value that
//! came from a participant or the definitions file goes through
//! [`escape_html`].

use stereo_common::db::{AnnotationRecord, FamiliarityRecord};
use stereo_common::selection::EntryForm;
use stereo_common::submission::{
    AnnotationLabel, FAMILIARITY_FIELD, ITEM_COUNT_FIELD, RATING_MAX, RATING_MIN, REGION_FIELD,
};
use stereo_common::StereotypeItem;

const STYLE: &str = r#"
    body { font-family: system-ui, sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; color: #222; }
    h1 { font-size: 1.6rem; }
    .errors { background: #fdecea; border: 1px solid #f5c2c0; padding: 0.75rem 1rem; border-radius: 4px; }
    .notice { background: #fff8e1; border: 1px solid #ffe082; padding: 0.75rem 1rem; border-radius: 4px; }
    .item { border: 1px solid #ddd; border-radius: 4px; padding: 0.75rem 1rem; margin: 1rem 0; }
    .category { color: #666; font-size: 0.85rem; text-transform: uppercase; }
    .subsets { color: #555; font-size: 0.9rem; }
    .regions { display: grid; grid-template-columns: repeat(auto-fill, minmax(180px, 1fr)); gap: 0.25rem; }
    table { border-collapse: collapse; width: 100%; font-size: 0.85rem; }
    th, td { border: 1px solid #ddd; padding: 0.25rem 0.5rem; text-align: left; }
    label { margin-right: 0.75rem; }
"#;

/// Escape text for HTML element content and quoted attributes
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape_html(title),
    )
}

fn error_list(errors: &[String]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let items: String = errors
        .iter()
        .map(|e| format!("<li>{}</li>", escape_html(e)))
        .collect();
    format!(r#"<div class="errors"><ul>{items}</ul></div>"#)
}

/// Entry page: identity fields and target region checkboxes
///
/// `form` repopulates the fields after a rejected submission.
pub fn entry_page(
    regions: &[String],
    regions_per_participant: usize,
    errors: &[String],
    notice: Option<&str>,
    form: Option<&EntryForm>,
) -> String {
    let empty = EntryForm::default();
    let form = form.unwrap_or(&empty);
    let value = |v: &Option<String>| escape_html(v.as_deref().unwrap_or(""));

    let notice = notice
        .map(|n| format!(r#"<div class="notice">{}</div>"#, escape_html(n)))
        .unwrap_or_default();

    if regions.is_empty() {
        let body = format!(
            r#"<h1>Stereotype Annotation Survey</h1>
{notice}
{errors}
<p>The survey cannot be started right now.</p>"#,
            errors = error_list(errors),
        );
        return layout("Stereotype Annotation Survey", &body);
    }

    let native_options: String = regions
        .iter()
        .map(|r| {
            let selected = if form.native_region.as_deref() == Some(r.as_str()) {
                " selected"
            } else {
                ""
            };
            format!(
                r#"<option value="{v}"{selected}>{v}</option>"#,
                v = escape_html(r)
            )
        })
        .collect();

    let checkboxes: String = regions
        .iter()
        .map(|r| {
            let checked = if form.selected_regions.iter().any(|s| s == r) {
                " checked"
            } else {
                ""
            };
            format!(
                r#"<label><input type="checkbox" name="selected_regions" value="{v}"{checked}> {v}</label>"#,
                v = escape_html(r)
            )
        })
        .collect();

    let sex_options: String = ["Female", "Male", "Other", "Prefer not to say"]
        .iter()
        .map(|s| {
            let selected = if form.sex.as_deref() == Some(*s) {
                " selected"
            } else {
                ""
            };
            format!(r#"<option value="{s}"{selected}>{s}</option>"#)
        })
        .collect();

    let body = format!(
        r#"<h1>Stereotype Annotation Survey</h1>
{notice}
{errors}
<form method="post" action="/">
    <p><label for="name">Name</label>
       <input type="text" id="name" name="name" value="{name}" required></p>
    <p><label for="age">Age</label>
       <input type="number" id="age" name="age" min="1" max="120" value="{age}" required></p>
    <p><label for="sex">Sex</label>
       <select id="sex" name="sex" required>
           <option value="">Select...</option>
           {sex_options}
       </select></p>
    <p><label for="native_region">Native region</label>
       <select id="native_region" name="native_region" required>
           <option value="">Select...</option>
           {native_options}
       </select></p>
    <fieldset>
        <legend>Select exactly {k} regions to annotate (not your native region)</legend>
        <div class="regions">{checkboxes}</div>
    </fieldset>
    <p><button type="submit">Start</button></p>
</form>"#,
        errors = error_list(errors),
        name = value(&form.name),
        age = value(&form.age),
        k = regions_per_participant,
    );

    layout("Stereotype Annotation Survey", &body)
}

fn rating_radios(name: &str, required: bool) -> String {
    let required = if required { " required" } else { "" };
    (RATING_MIN..=RATING_MAX)
        .map(|n| {
            format!(r#"<label><input type="radio" name="{name}" value="{n}"{required}> {n}</label>"#)
        })
        .collect()
}

/// One region page of the quiz
pub fn quiz_page(
    region: &str,
    position: usize,
    total: usize,
    items: &[&StereotypeItem],
    error: Option<&str>,
) -> String {
    let region_html = escape_html(region);

    let items_html: String = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let subsets = if item.subsets.is_empty() {
                String::new()
            } else {
                format!(
                    r#"<div class="subsets">Includes: {}</div>"#,
                    escape_html(&item.subsets.join(", "))
                )
            };
            let labels: String = AnnotationLabel::ALL
                .iter()
                .map(|label| {
                    format!(
                        r#"<label><input type="radio" name="annotation_{i}" value="{v}" required> {v}</label>"#,
                        v = label.as_str()
                    )
                })
                .collect();
            format!(
                r#"<div class="item">
    <div class="category">{category}</div>
    <strong>{superset}</strong>
    {subsets}
    <input type="hidden" name="category_{i}" value="{category}">
    <input type="hidden" name="superset_{i}" value="{superset}">
    <p>{labels}</p>
    <p class="offensiveness">If a stereotype, how offensive is it? (0 = not at all, 5 = very)<br>{ratings}</p>
</div>"#,
                category = escape_html(&item.category),
                superset = escape_html(&item.superset),
                ratings = rating_radios(&format!("offensiveness_{i}"), false),
            )
        })
        .collect();

    let errors = error.map(|e| error_list(&[e.to_string()])).unwrap_or_default();
    let button = if position == total { "Finish" } else { "Next region" };

    let body = format!(
        r#"<h1>Region {position} of {total}: {region_html}</h1>
{errors}
<form method="post" action="/quiz">
    <p>How familiar are you with {region_html}? (0 = not at all, 5 = very)<br>
       {familiarity}</p>
    <input type="hidden" name="{REGION_FIELD}" value="{region_html}">
    <input type="hidden" name="{ITEM_COUNT_FIELD}" value="{count}">
    {items_html}
    <p><button type="submit">{button}</button></p>
</form>"#,
        familiarity = rating_radios(FAMILIARITY_FIELD, true),
        count = items.len(),
    );

    layout(&format!("Survey: {region}"), &body)
}

/// Completion page
pub fn done_page(name: Option<&str>) -> String {
    let greeting = match name {
        Some(name) => format!("Thank you, {}!", escape_html(name)),
        None => "Thank you!".to_string(),
    };
    let body = format!(
        r#"<h1>{greeting}</h1>
<p>Your responses have been recorded.</p>
<p><a href="/">Start again</a></p>"#
    );
    layout("Thank you", &body)
}

/// Raw results view with export links
pub fn admin_page(
    annotations: &[AnnotationRecord],
    familiarity: &[FamiliarityRecord],
    definitions_error: Option<&str>,
) -> String {
    let cell = |v: &str| format!("<td>{}</td>", escape_html(v));

    let annotation_rows: String = annotations
        .iter()
        .map(|r| {
            format!(
                "<tr>{}{}{}{}{}{}{}{}{}{}{}</tr>",
                cell(&r.id.to_string()),
                cell(&r.native_region),
                cell(&r.target_region),
                cell(&r.participant_name),
                cell(&r.age.to_string()),
                cell(&r.sex),
                cell(&r.category),
                cell(&r.superset_attribute),
                cell(&r.annotation),
                cell(&r.offensiveness_rating.to_string()),
                cell(&r.timestamp),
            )
        })
        .collect();

    let familiarity_rows: String = familiarity
        .iter()
        .map(|r| {
            format!(
                "<tr>{}{}{}{}{}{}{}{}</tr>",
                cell(&r.id.to_string()),
                cell(&r.native_region),
                cell(&r.target_region),
                cell(&r.rating.to_string()),
                cell(&r.participant_name),
                cell(&r.age.to_string()),
                cell(&r.sex),
                cell(&r.timestamp),
            )
        })
        .collect();

    let header = |columns: &[&str]| -> String {
        columns.iter().map(|c| format!("<th>{c}</th>")).collect()
    };

    let report_link = match definitions_error {
        Some(e) => format!(
            r#"<li>Processed report unavailable: {}</li>"#,
            escape_html(e)
        ),
        None => r#"<li><a href="/admin/export/report">Processed report (CSV)</a></li>"#.to_string(),
    };

    let body = format!(
        r#"<h1>Survey Results</h1>
<ul>
    <li><a href="/admin/export/annotations">Raw annotations (CSV)</a></li>
    <li><a href="/admin/export/familiarity">Familiarity ratings (CSV)</a></li>
    {report_link}
</ul>
<h2>Familiarity ratings ({familiarity_count})</h2>
<table><tr>{familiarity_header}</tr>{familiarity_rows}</table>
<h2>Annotations ({annotation_count})</h2>
<table><tr>{annotation_header}</tr>{annotation_rows}</table>"#,
        familiarity_count = familiarity.len(),
        familiarity_header = header(&FamiliarityRecord::COLUMNS),
        annotation_count = annotations.len(),
        annotation_header = header(&AnnotationRecord::COLUMNS),
    );

    layout("Survey Results", &body)
}
