use rand::{distributions::Alphanumeric, thread_rng, Rng};
use std::{fs, path::PathBuf, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};

/// Top-level grouping every artifact lands under, on both backends.
pub const REPORTS_DIR: &str = "reports";

/// Turns a URL path into the filename slug: the root path maps to `home`,
/// every other path collapses runs of non-alphanumeric characters into a
/// single `-` with leading/trailing separators stripped.
pub fn path_slug(url_path: &str) -> String {
    if url_path.is_empty() || url_path == "/" {
        return "home".into();
    }
    let mut slug = String::with_capacity(url_path.len());
    let mut in_separator = false;
    for c in url_path.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c);
            in_separator = false;
        } else if !in_separator {
            slug.push('-');
            in_separator = true;
        }
    }
    slug.trim_matches('-').to_string()
}

/// ISO-8601 timestamp with `:` and `.` normalized to `-` so it is safe in
/// filenames on every filesystem we write to.
pub fn filename_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// Folder name for one batch run: `{configName}-{YYYY-MM-DD}`. Daily
/// granularity; two same-name batches on the same day share the folder.
pub fn date_folder(config_name: &str, start: DateTime<Utc>) -> String {
    format!("{}-{}", config_name, start.format("%Y-%m-%d"))
}

pub fn jitter(duration: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let rndm = rng.gen_range(1.0..10.0);
    duration.mul_f64(rndm)
}

pub fn get_random_string(len: i32) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len as usize)
        .map(char::from)
        .collect()
}

pub fn create_random_tmp_folder() -> anyhow::Result<PathBuf> {
    let rand_folder_name: String = get_random_string(11);

    let path = PathBuf::from(format!("/tmp/auditor-{}", rand_folder_name));
    fs::create_dir(&path)?;
    Ok(path)
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn root_path_slugs_to_home() {
        assert_eq!(path_slug("/"), "home");
        assert_eq!(path_slug(""), "home");
    }

    #[test]
    fn non_alphanumeric_runs_collapse() {
        assert_eq!(path_slug("/about-us!!"), "about-us");
        assert_eq!(path_slug("/pricing/plans"), "pricing-plans");
        assert_eq!(path_slug("/blog/2024/01/post?draft=1"), "blog-2024-01-post-draft-1");
    }

    #[test]
    fn filename_timestamp_is_filesystem_safe() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 7, 12, 30, 5).unwrap();
        let s = filename_timestamp(ts);
        assert!(!s.contains(':'));
        assert!(!s.contains('.'));
        assert!(s.starts_with("2026-08-07T12-30-05"));
    }

    #[test]
    fn date_folder_uses_daily_granularity() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 7, 23, 59, 59).unwrap();
        assert_eq!(date_folder("ex", ts), "ex-2026-08-07");
    }

    #[test]
    fn creates_a_random_folder() {
        let p = create_random_tmp_folder().unwrap();
        assert!(p.exists());
        fs::remove_dir(p).unwrap();
    }
}
