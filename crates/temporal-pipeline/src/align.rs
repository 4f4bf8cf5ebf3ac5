//! Source alignment: from a directory of dated files to dense per-source
//! path grids on a shared time grid.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use raster_common::{DateFormat, GridDescriptor, TimeGrid};
use raster_io::{BandSelector, RasterDataset};

use crate::config::SourceConfig;
use crate::error::{PipelineError, Result};

/// A source after alignment: resolved decode parameters and a dense path
/// grid with one slot per (year, frame).
#[derive(Debug, Clone)]
pub struct AlignedSource {
    /// Source name.
    pub name: String,
    /// Band to read from each file.
    pub band: BandSelector,
    /// Decode scale.
    pub scale: f64,
    /// Decode offset.
    pub offset: f64,
    /// Input no-data value; samples equal to it are excluded.
    pub missing_in: f64,
    /// One entry per (year, frame) slot, `None` for gaps.
    pub paths: Vec<Option<PathBuf>>,
}

impl AlignedSource {
    /// Fraction of slots holding a mapped file.
    pub fn completeness(&self) -> f64 {
        if self.paths.is_empty() {
            return 0.0;
        }
        let mapped = self.paths.iter().filter(|p| p.is_some()).count();
        mapped as f64 / self.paths.len() as f64
    }
}

/// Result of aligning every source: identical path-grid shapes, one shared
/// spatial grid, one shared time grid.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Aligned sources, in configuration order.
    pub sources: Vec<AlignedSource>,
    /// Spatial grid every file was validated against.
    pub grid: GridDescriptor,
    /// Shared (union) time grid.
    pub time: TimeGrid,
}

/// Files of one source before densification.
struct ScannedSource {
    dated: BTreeMap<(i32, u32), PathBuf>,
    first_year: i32,
    last_year: i32,
    scale: f64,
    offset: f64,
    missing_in: f64,
}

/// Align all configured sources found under `project_dir`.
///
/// Fails before any block is scheduled when a source has no matching
/// files, a file disagrees with the shared spatial grid, `missing_in`
/// cannot be resolved, or a source's completeness falls below
/// `completeness_threshold`.
pub fn align_sources(
    project_dir: &Path,
    configs: &[SourceConfig],
    days_per_frame: u32,
    date_format: DateFormat,
    completeness_threshold: f64,
) -> Result<Alignment> {
    let mut grid: Option<GridDescriptor> = None;
    let mut scanned = Vec::with_capacity(configs.len());

    for config in configs {
        info!(source = %config.name, "aligning source");
        scanned.push(scan_source(project_dir, config, date_format, &mut grid)?);
    }

    let grid = grid.ok_or_else(|| PipelineError::alignment("no readable source files"))?;

    // Union year range across sources. Per-source ranges that disagree are
    // suspicious but tolerated; see DESIGN.md.
    let first_year = scanned.iter().map(|s| s.first_year).min().unwrap();
    let last_year = scanned.iter().map(|s| s.last_year).max().unwrap();
    for (config, scan) in configs.iter().zip(&scanned) {
        if scan.first_year != first_year || scan.last_year != last_year {
            warn!(
                source = %config.name,
                source_range = format!("{}..={}", scan.first_year, scan.last_year),
                union_range = format!("{first_year}..={last_year}"),
                "source year range differs from union; this may be OK"
            );
        }
    }
    let time = TimeGrid::new(first_year, last_year, days_per_frame);

    let mut sources = Vec::with_capacity(configs.len());
    for (config, scan) in configs.iter().zip(scanned) {
        let source = densify(config, scan, &time)?;
        let completeness = source.completeness();
        info!(
            source = %config.name,
            mapped = source.paths.iter().filter(|p| p.is_some()).count(),
            slots = source.paths.len(),
            completeness = format!("{completeness:.3}"),
            "source aligned"
        );
        if completeness < completeness_threshold {
            return Err(PipelineError::alignment(format!(
                "source '{}' completeness {completeness:.3} below threshold {completeness_threshold:.3}",
                config.name
            )));
        }
        sources.push(source);
    }

    Ok(Alignment {
        sources,
        grid,
        time,
    })
}

/// Scan one source: match filenames, parse dates, resolve decode
/// parameters and validate every readable file against the shared grid.
fn scan_source(
    project_dir: &Path,
    config: &SourceConfig,
    date_format: DateFormat,
    grid: &mut Option<GridDescriptor>,
) -> Result<ScannedSource> {
    let pattern = Regex::new(&config.pattern).map_err(|e| {
        PipelineError::config(format!("source '{}': invalid pattern: {e}", config.name))
    })?;
    if pattern.captures_len() < 2 {
        return Err(PipelineError::config(format!(
            "source '{}': pattern needs a date capture group",
            config.name
        )));
    }

    let mut dated: BTreeMap<(i32, u32), PathBuf> = BTreeMap::new();
    for entry in std::fs::read_dir(project_dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(caps) = pattern.captures(name) else {
            continue;
        };

        let date_str = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let (year, doy) = date_format.parse(date_str).ok_or_else(|| {
            PipelineError::alignment(format!(
                "source '{}': cannot parse date '{date_str}' in '{name}'",
                config.name
            ))
        })?;
        if let Some(tile) = caps.get(2) {
            debug!(source = %config.name, tile = tile.as_str(), file = name, "matched tile");
        }

        let path = entry.path();
        if let Some(previous) = dated.get(&(year, doy)) {
            warn!(
                source = %config.name,
                kept = %previous.display(),
                ignored = %path.display(),
                "duplicate file for ({year}, day {doy}); keeping the first"
            );
            continue;
        }
        dated.insert((year, doy), path);
    }

    if dated.is_empty() {
        return Err(PipelineError::alignment(format!(
            "source '{}': no files in {} match pattern '{}'",
            config.name,
            project_dir.display(),
            config.pattern
        )));
    }

    // Open every matched file: the first valid one fixes decode defaults,
    // all readable ones must agree on the spatial grid. Unreadable files
    // stay in the grid for the worker's per-file skip path.
    let mut resolved: Option<(f64, f64, Option<f64>)> = None;
    for path in dated.values() {
        let dataset = match RasterDataset::open(path) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(source = %config.name, file = %path.display(), error = %e,
                    "unreadable file left for worker skip");
                continue;
            }
        };

        let descriptor = dataset.descriptor();
        match grid {
            Some(expected) => {
                if !expected.is_compatible(&descriptor) {
                    return Err(PipelineError::alignment(format!(
                        "source '{}': {} does not match run grid in size, projection or geotransform",
                        config.name,
                        path.display()
                    )));
                }
            }
            None => *grid = Some(descriptor),
        }

        if resolved.is_none() {
            if let Err(e) = dataset.find_band(&config.band) {
                warn!(source = %config.name, file = %path.display(), error = %e,
                    "band missing; not using file for decode defaults");
                continue;
            }
            resolved = Some((
                config.scale.or(dataset.scale()).unwrap_or(1.0),
                config.offset.or(dataset.offset()).unwrap_or(0.0),
                config.missing_in.or(dataset.no_data_value()),
            ));
        }
    }

    let (scale, offset, missing_in) = resolved.ok_or_else(|| {
        PipelineError::alignment(format!(
            "source '{}': no readable file with band {}",
            config.name, config.band
        ))
    })?;
    let missing_in = missing_in.ok_or_else(|| {
        PipelineError::alignment(format!(
            "source '{}': no-data value not configured and absent from files",
            config.name
        ))
    })?;

    let first_year = dated.keys().map(|(y, _)| *y).min().unwrap();
    let last_year = dated.keys().map(|(y, _)| *y).max().unwrap();
    Ok(ScannedSource {
        dated,
        first_year,
        last_year,
        scale,
        offset,
        missing_in,
    })
}

/// Spread a source's dated files over the dense slot grid.
fn densify(config: &SourceConfig, scan: ScannedSource, time: &TimeGrid) -> Result<AlignedSource> {
    let mut paths: Vec<Option<PathBuf>> = vec![None; time.slots()];
    for ((year, doy), path) in scan.dated {
        let Some(slot) = time.slot(year, doy) else {
            warn!(
                source = %config.name,
                file = %path.display(),
                "day {doy} of {year} falls past the last frame; skipping"
            );
            continue;
        };
        match &paths[slot] {
            // Multiple day-of-years can share a frame when days_per_frame > 1.
            Some(kept) => warn!(
                source = %config.name,
                kept = %kept.display(),
                ignored = %path.display(),
                "frame already mapped; keeping the first file"
            ),
            None => paths[slot] = Some(path),
        }
    }

    Ok(AlignedSource {
        name: config.name.clone(),
        band: config.band.clone(),
        scale: scan.scale,
        offset: scan.offset,
        missing_in: scan.missing_in,
        paths,
    })
}
