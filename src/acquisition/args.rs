//! Command line arguments of the `download-data` tool.

use clap::Parser;
use time::{Date, Duration, OffsetDateTime};
use url::Url;

/// Default STAC API used for item search.
pub const DEFAULT_SEARCH_URL: &str = "https://earth-search.aws.element84.com/v0";

/// Searches a STAC API and downloads the matching assets into a dataset directory
#[derive(Clone, Debug, Parser)]
#[command(version, about)]
pub struct DownloadArgs {
    /// Root URL of the STAC API. Items are searched at `<search-url>/search`.
    #[arg(long, default_value = DEFAULT_SEARCH_URL)]
    pub search_url: Url,
    /// Path to a GeoJSON geometry file used to filter items spatially
    #[arg(long)]
    pub intersects: Option<String>,
    /// Maximum number of items to fetch
    #[arg(long)]
    pub limit: Option<u32>,
    /// Additional query as a JSON object, merged over the cloud cover filter
    #[arg(long)]
    pub query: Option<String>,
    /// Only items with cloud cover strictly below this percentage are returned
    #[arg(long, default_value_t = 40)]
    pub cloud_cover: i64,
    /// Log level used when `RUST_LOG` is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
    /// Directory into which assets are downloaded
    #[arg(long, default_value = "dataset")]
    pub output_dir: String,
    /// Single date or `start/end` range. Defaults to the last two days.
    #[arg(long)]
    pub date: Option<String>,
    /// Maximum number of concurrent downloads. Zero removes the limit.
    #[arg(long, default_value_t = 10)]
    pub max_concurrent_downloads: usize,
}

impl DownloadArgs {
    /// The date filter to search with.
    pub fn date_range(&self) -> String {
        match &self.date {
            Some(date) => date.clone(),
            None => default_date_range(OffsetDateTime::now_utc().date()),
        }
    }

    /// The download concurrency limit, if any.
    pub fn download_limit(&self) -> Option<usize> {
        (self.max_concurrent_downloads > 0).then_some(self.max_concurrent_downloads)
    }
}

/// Date range covering the two days before `today` up to `today`.
pub fn default_date_range(today: Date) -> String {
    format!("{}/{}", today - Duration::days(2), today)
}

/// Returns parsed command line arguments.
pub fn parse() -> DownloadArgs {
    DownloadArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    use time::macros::date;

    #[test]
    fn defaults() {
        let args = DownloadArgs::try_parse_from(["download-data"]).unwrap();
        assert_eq!(DEFAULT_SEARCH_URL, args.search_url.as_str());
        assert_eq!(40, args.cloud_cover);
        assert_eq!("dataset", args.output_dir);
        assert_eq!("info", args.log_level);
        assert_eq!(Some(10), args.download_limit());
        assert!(args.limit.is_none());
        assert!(args.query.is_none());
        assert!(args.intersects.is_none());
    }

    #[test]
    fn explicit_values() {
        let args = DownloadArgs::try_parse_from([
            "download-data",
            "--search-url",
            "http://localhost:9000/stac",
            "--limit",
            "5",
            "--query",
            r#"{"platform": {"eq": "sentinel-2a"}}"#,
            "--cloud-cover",
            "10",
            "--date",
            "2020-01-01/2020-01-31",
            "--max-concurrent-downloads",
            "0",
        ])
        .unwrap();
        assert_eq!("localhost", args.search_url.host_str().unwrap());
        assert_eq!(Some(5), args.limit);
        assert_eq!(10, args.cloud_cover);
        assert_eq!("2020-01-01/2020-01-31", args.date_range());
        assert_eq!(None, args.download_limit());
    }

    #[test]
    fn invalid_search_url() {
        let result = DownloadArgs::try_parse_from(["download-data", "--search-url", "not a url"]);
        assert!(result.is_err());
    }

    #[test]
    fn default_range_spans_two_days() {
        assert_eq!("2023-06-13/2023-06-15", default_date_range(date!(2023 - 06 - 15)));
    }

    #[test]
    fn default_range_crosses_month_boundary() {
        assert_eq!("2023-02-27/2023-03-01", default_date_range(date!(2023 - 03 - 01)));
        assert_eq!("2023-12-31/2024-01-02", default_date_range(date!(2024 - 01 - 02)));
    }
}
