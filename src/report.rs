use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed category set every audit runs. Order is the order categories
/// appear in the rendered report.
pub const CATEGORIES: [&str; 4] = ["performance", "accessibility", "best-practices", "seo"];

/// Script evaluated in the audited page. Resolves to a JSON string matching
/// [`RawAuditData`]; collection happens entirely in-page so one evaluation
/// round-trip covers all categories.
pub const AUDIT_SCRIPT: &str = r#" new Promise((resolve) => {
    const paint = performance.getEntriesByType('paint');
    const fcp = paint.find((e) => e.name === 'first-contentful-paint');
    const nav = performance.getEntriesByType('navigation')[0];
    const resources = performance.getEntriesByType('resource');
    const images = Array.from(document.querySelectorAll('img'));
    resolve(JSON.stringify({
        timing: {
            dom_content_loaded_ms: nav ? nav.domContentLoadedEventEnd : 0,
            load_ms: nav ? nav.loadEventEnd : 0,
            first_contentful_paint_ms: fcp ? fcp.startTime : 0,
        },
        resources: {
            count: resources.length,
            transfer_size: resources.reduce((t, r) => t + (r.transferSize || 0), 0),
        },
        accessibility: {
            images_missing_alt: images.filter((i) => !i.hasAttribute('alt')).length,
            has_lang: !!document.documentElement.lang,
            has_title: !!document.title,
            unlabeled_buttons: Array.from(document.querySelectorAll('button'))
                .filter((b) => !b.textContent.trim() && !b.getAttribute('aria-label')).length,
        },
        best_practices: {
            is_https: location.protocol === 'https:',
            has_doctype: !!document.doctype,
            insecure_requests: resources.filter((r) => r.name.indexOf('http://') === 0).length,
        },
        seo: {
            has_meta_description: !!document.querySelector('meta[name="description"]'),
            has_viewport: !!document.querySelector('meta[name="viewport"]'),
            h1_count: document.querySelectorAll('h1').length,
            title_length: document.title.length,
        },
    }));
});"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAuditData {
    pub timing: Timing,
    pub resources: Resources,
    pub accessibility: Accessibility,
    pub best_practices: BestPractices,
    pub seo: Seo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timing {
    pub dom_content_loaded_ms: f64,
    pub load_ms: f64,
    pub first_contentful_paint_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resources {
    pub count: u32,
    pub transfer_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accessibility {
    pub images_missing_alt: u32,
    pub has_lang: bool,
    pub has_title: bool,
    pub unlabeled_buttons: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestPractices {
    pub is_https: bool,
    pub has_doctype: bool,
    pub insecure_requests: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seo {
    pub has_meta_description: bool,
    pub has_viewport: bool,
    pub h1_count: u32,
    pub title_length: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryScore {
    pub id: String,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub url: String,
    pub device: String,
    pub fetched_at: DateTime<Utc>,
    pub categories: Vec<CategoryScore>,
    pub raw: RawAuditData,
}

impl AuditReport {
    pub fn from_raw(url: &str, device: &str, raw: RawAuditData) -> Self {
        let categories = vec![
            CategoryScore {
                id: "performance".into(),
                score: performance_score(&raw.timing),
            },
            CategoryScore {
                id: "accessibility".into(),
                score: accessibility_score(&raw.accessibility),
            },
            CategoryScore {
                id: "best-practices".into(),
                score: best_practices_score(&raw.best_practices),
            },
            CategoryScore {
                id: "seo".into(),
                score: seo_score(&raw.seo),
            },
        ];
        AuditReport {
            url: url.into(),
            device: device.into(),
            fetched_at: Utc::now(),
            categories,
            raw,
        }
    }
}

/// Linear falloff between a "good" and a "poor" threshold, in [0, 1].
fn metric_component(value_ms: f64, good_ms: f64, poor_ms: f64) -> f64 {
    if value_ms <= good_ms {
        1.0
    } else if value_ms >= poor_ms {
        0.0
    } else {
        (poor_ms - value_ms) / (poor_ms - good_ms)
    }
}

fn performance_score(timing: &Timing) -> u32 {
    let fcp = metric_component(timing.first_contentful_paint_ms, 1800.0, 6000.0);
    let load = metric_component(timing.load_ms, 3000.0, 10000.0);
    (((fcp + load) / 2.0) * 100.0).round() as u32
}

fn accessibility_score(a: &Accessibility) -> u32 {
    let mut score: i32 = 100;
    if a.images_missing_alt > 0 {
        score -= 25;
    }
    if !a.has_lang {
        score -= 25;
    }
    if !a.has_title {
        score -= 25;
    }
    if a.unlabeled_buttons > 0 {
        score -= 25;
    }
    score.max(0) as u32
}

fn best_practices_score(b: &BestPractices) -> u32 {
    let mut score: i32 = 100;
    if !b.is_https {
        score -= 40;
    }
    if !b.has_doctype {
        score -= 20;
    }
    if b.insecure_requests > 0 {
        score -= 40;
    }
    score.max(0) as u32
}

fn seo_score(s: &Seo) -> u32 {
    let mut score: i32 = 100;
    if !s.has_meta_description {
        score -= 30;
    }
    if !s.has_viewport {
        score -= 25;
    }
    if s.h1_count != 1 {
        score -= 20;
    }
    if s.title_length == 0 || s.title_length > 60 {
        score -= 25;
    }
    score.max(0) as u32
}

fn score_class(score: u32) -> &'static str {
    if score >= 90 {
        "pass"
    } else if score >= 50 {
        "average"
    } else {
        "fail"
    }
}

/// Renders the persisted HTML artifact for one audit.
pub fn render_html(report: &AuditReport) -> String {
    let scores = report
        .categories
        .iter()
        .map(|c| {
            format!(
                r#"<div class="score {}"><span class="value">{}</span><span class="label">{}</span></div>"#,
                score_class(c.score),
                c.score,
                c.id
            )
        })
        .collect::<Vec<String>>()
        .join("\n      ");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>Audit report: {url} ({device})</title>
    <style>
      body {{ font-family: sans-serif; margin: 2rem; color: #212121; }}
      .scores {{ display: flex; gap: 2rem; }}
      .score {{ text-align: center; }}
      .score .value {{ display: block; font-size: 2.5rem; }}
      .pass .value {{ color: #0c6; }}
      .average .value {{ color: #fa3; }}
      .fail .value {{ color: #f33; }}
      table {{ border-collapse: collapse; margin-top: 1.5rem; }}
      td, th {{ border: 1px solid #ccc; padding: 0.4rem 0.8rem; text-align: left; }}
    </style>
  </head>
  <body>
    <h1>{url}</h1>
    <p>Device: <strong>{device}</strong> · Fetched: {fetched_at}</p>
    <div class="scores">
      {scores}
    </div>
    <table>
      <tr><th>Metric</th><th>Value</th></tr>
      <tr><td>First contentful paint</td><td>{fcp:.0} ms</td></tr>
      <tr><td>DOM content loaded</td><td>{dcl:.0} ms</td></tr>
      <tr><td>Load</td><td>{load:.0} ms</td></tr>
      <tr><td>Requests</td><td>{req_count}</td></tr>
      <tr><td>Transferred</td><td>{transfer} bytes</td></tr>
    </table>
    <script type="application/json" id="raw-audit-data">{raw}</script>
  </body>
</html>
"#,
        url = report.url,
        device = report.device,
        fetched_at = report.fetched_at.to_rfc3339(),
        scores = scores,
        fcp = report.raw.timing.first_contentful_paint_ms,
        dcl = report.raw.timing.dom_content_loaded_ms,
        load = report.raw.timing.load_ms,
        req_count = report.raw.resources.count,
        transfer = report.raw.resources.transfer_size,
        raw = serde_json::to_string(&report.raw).unwrap_or_default(),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    fn clean_raw() -> RawAuditData {
        RawAuditData {
            timing: Timing {
                dom_content_loaded_ms: 400.0,
                load_ms: 900.0,
                first_contentful_paint_ms: 600.0,
            },
            resources: Resources {
                count: 12,
                transfer_size: 150_000,
            },
            accessibility: Accessibility {
                images_missing_alt: 0,
                has_lang: true,
                has_title: true,
                unlabeled_buttons: 0,
            },
            best_practices: BestPractices {
                is_https: true,
                has_doctype: true,
                insecure_requests: 0,
            },
            seo: Seo {
                has_meta_description: true,
                has_viewport: true,
                h1_count: 1,
                title_length: 30,
            },
        }
    }

    #[test]
    fn clean_page_scores_100_everywhere() {
        let report = AuditReport::from_raw("https://ex.com/", "mobile", clean_raw());
        assert_eq!(report.categories.len(), CATEGORIES.len());
        for category in &report.categories {
            assert_eq!(category.score, 100, "category {}", category.id);
        }
    }

    #[test]
    fn scores_stay_in_bounds_on_a_broken_page() {
        let mut raw = clean_raw();
        raw.timing.first_contentful_paint_ms = 20_000.0;
        raw.timing.load_ms = 60_000.0;
        raw.accessibility.images_missing_alt = 7;
        raw.accessibility.has_lang = false;
        raw.accessibility.has_title = false;
        raw.accessibility.unlabeled_buttons = 3;
        raw.best_practices.is_https = false;
        raw.best_practices.has_doctype = false;
        raw.best_practices.insecure_requests = 2;
        raw.seo.has_meta_description = false;
        raw.seo.has_viewport = false;
        raw.seo.h1_count = 0;
        raw.seo.title_length = 0;

        let report = AuditReport::from_raw("http://ex.com/", "desktop", raw);
        for category in &report.categories {
            assert_eq!(category.score, 0, "category {}", category.id);
        }
    }

    #[test]
    fn falloff_is_linear_between_thresholds() {
        assert_eq!(metric_component(1000.0, 1800.0, 6000.0), 1.0);
        assert_eq!(metric_component(8000.0, 1800.0, 6000.0), 0.0);
        let mid = metric_component(3900.0, 1800.0, 6000.0);
        assert!(mid > 0.49 && mid < 0.51);
    }

    #[test]
    fn rendered_artifact_names_every_category() {
        let report = AuditReport::from_raw("https://ex.com/about", "mobile", clean_raw());
        let html = render_html(&report);
        assert!(html.contains("https://ex.com/about"));
        for id in CATEGORIES {
            assert!(html.contains(id), "missing {}", id);
        }
        assert!(html.contains("raw-audit-data"));
    }

    #[test]
    fn raw_payload_round_trips_from_script_shape() {
        let json = serde_json::to_string(&clean_raw()).unwrap();
        let parsed: RawAuditData = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.resources.count, 12);
    }
}
