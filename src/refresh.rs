//src/refresh.rs

use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Blast2TaxError, Result};

pub const TAXDUMP_URL: &str = "https://ftp.ncbi.nlm.nih.gov/pub/taxonomy/taxdump.tar.gz";

/// Files pulled out of the taxdump archive.
pub const TAXDUMP_FILES: [&str; 3] = ["nodes.dmp", "names.dmp", "merged.dmp"];

const ARCHIVE_NAME: &str = "taxdump.tar.gz";

/// Downloads the current NCBI taxdump and unpacks it into `dir`,
/// replacing any previous copy. Must finish before any lookups start.
pub fn refresh_database<P: AsRef<Path>>(dir: P) -> Result<()> {
    refresh_database_from(TAXDUMP_URL, dir)
}

pub fn refresh_database_from<P: AsRef<Path>>(url: &str, dir: P) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let archive = dir.join(ARCHIVE_NAME);

    log::info!("### Updating Taxonomy Database from {}", url);
    download(url, &archive)?;
    let extracted = extract_taxdump(&archive, dir)?;
    log::info!("Finished Updating Database ({} files)", extracted.len());

    log::info!("Removing temporary files");
    fs::remove_file(&archive)?;
    Ok(())
}

fn download(url: &str, target: &Path) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("blast2taxonomy-rs/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(1800))
        .build()
        .map_err(|e| Blast2TaxError::Refresh(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| Blast2TaxError::Refresh(format!("{url}: {e}")))?;

    let bar = match response.content_length() {
        Some(len) => {
            let bar = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.blue} [{bar:40}] {bytes}/{total_bytes} {msg}")
            {
                bar.set_style(style);
            }
            bar
        }
        None => ProgressBar::new_spinner(),
    };
    bar.set_message("Downloading NCBI taxonomy...");

    let mut reader = bar.wrap_read(response);
    let mut writer = BufWriter::new(File::create(target)?);
    io::copy(&mut reader, &mut writer)?;
    bar.finish_with_message("Download complete.");
    Ok(())
}

/// Unpacks the taxonomy tables from a taxdump `.tar.gz` into `dir`.
/// Returns the paths written. `nodes.dmp` and `names.dmp` are required.
pub fn extract_taxdump(archive: &Path, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut tar = tar::Archive::new(GzDecoder::new(File::open(archive)?));
    let mut written = Vec::new();

    for entry in tar.entries()? {
        let mut entry = entry?;
        let name = match entry.path()?.file_name().and_then(|n| n.to_str()) {
            Some(n) if TAXDUMP_FILES.contains(&n) => n.to_string(),
            _ => continue,
        };
        let target = dir.join(&name);
        entry.unpack(&target)?;
        log::debug!("extracted {}", target.display());
        written.push(target);
    }

    for required in &TAXDUMP_FILES[..2] {
        if !written.iter().any(|p| p.ends_with(required)) {
            return Err(Blast2TaxError::Refresh(format!(
                "{} is missing from {}",
                required,
                archive.display()
            )));
        }
    }
    Ok(written)
}
