use std::error::Error;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use reqwest::blocking::Client;
use url::Url;

#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct DownloadError(pub String);

/// Local path a URL is cached at: the basename of its path, under `dir`.
pub fn local_path(url: &str, dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let parsed = Url::parse(url)?;
    let filename = parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| DownloadError(format!("no filename in url {}", url)))?;
    Ok(Path::new(dir).join(filename))
}

/// Download `url` into `dir`, keeping the remote filename.  An already
/// downloaded file is reused without touching the network.  Returns the
/// local path.
pub fn download_source(url: &str, dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let dst = local_path(url, dir)?;
    if dst.exists() {
        info!("{} is already downloaded, skipping", dst.display());
        return Ok(dst);
    }

    fs::create_dir_all(dir)?;
    info!("downloading {} ...", url);
    let client = Client::new();
    let mut response = client.get(url).send()?;
    if !response.status().is_success() {
        return Err(Box::new(DownloadError(format!(
            "download of {} failed with status {}",
            url,
            response.status()
        ))));
    }
    // a partial transfer must never land at the cached name
    let tmp = scratch_path(&dst);
    let mut out = File::create(&tmp)?;
    io::copy(&mut response, &mut out)?;
    drop(out);
    fs::rename(&tmp, &dst)?;
    info!("download completed: {}", dst.display());

    Ok(dst)
}

/// Scratch name a transfer streams to before the rename into place.
fn scratch_path(dst: &Path) -> PathBuf {
    let mut name = dst.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn filename_comes_from_the_url_path() -> Result<(), Box<dyn Error>> {
        let path = local_path(
            "https://github.com/DataTalksClub/nyc-tlc-data/releases/download/green/green_tripdata_2019-01.csv.gz",
            "data/raw",
        )?;
        assert_eq!(
            path,
            PathBuf::from("data/raw/green_tripdata_2019-01.csv.gz")
        );
        Ok(())
    }

    #[test]
    fn query_string_is_not_part_of_the_filename() -> Result<(), Box<dyn Error>> {
        let path = local_path("https://example.com/files/zones.csv?sig=abc&x=1", "tmp")?;
        assert_eq!(path, PathBuf::from("tmp/zones.csv"));
        Ok(())
    }

    #[test]
    fn url_without_a_filename_is_rejected() {
        assert!(local_path("https://example.com/", "data/raw").is_err());
        assert!(local_path("not a url", "data/raw").is_err());
    }

    #[test]
    fn scratch_name_keeps_the_full_extension() {
        assert_eq!(
            scratch_path(Path::new("data/raw/green_tripdata_2019-01.csv.gz")),
            PathBuf::from("data/raw/green_tripdata_2019-01.csv.gz.part")
        );
    }

    #[test]
    fn failed_download_leaves_no_cache_entry() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let res = download_source(
            "http://localhost:1/trips.csv",
            dir.path().to_str().ok_or("non-utf8 temp dir")?,
        );
        assert!(res.is_err());
        assert!(!dir.path().join("trips.csv").exists());
        Ok(())
    }

    #[test]
    fn existing_file_short_circuits_the_download() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let cached = dir.path().join("trips.csv");
        fs::write(&cached, "a,b\n1,2\n")?;

        // the host is unreachable, so this only passes if the cache is used
        let path = download_source(
            "http://localhost:1/trips.csv",
            dir.path().to_str().ok_or("non-utf8 temp dir")?,
        )?;
        assert_eq!(path, cached);
        assert_eq!(fs::read_to_string(path)?, "a,b\n1,2\n");
        Ok(())
    }

    #[ignore]
    #[test]
    fn download_zone_lookup_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = download_source(
            "https://github.com/DataTalksClub/nyc-tlc-data/releases/download/misc/taxi_zone_lookup.csv",
            dir.path().to_str().ok_or("non-utf8 temp dir")?,
        )?;
        assert!(path.exists());
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("taxi_zone_lookup.csv"));
        Ok(())
    }
}
