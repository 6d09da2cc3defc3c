//! Image sequence input helpers
//!
//! Turns command-line style inputs (files, directories, glob patterns) into
//! the flat path list `SequenceCache::set_sequence` expects, and names
//! sequences for log output.

use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Supported image file extensions
pub const IMAGE_EXTS: &[&str] = &["exr", "png", "jpg", "jpeg", "tif", "tiff", "tga", "hdr"];

/// Check if file is a supported image format
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| IMAGE_EXTS.contains(&s.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expand inputs into image paths.
///
/// - existing file: taken as is
/// - directory: every supported image directly inside it
/// - anything else: glob pattern, non-image matches dropped
///
/// Order follows the inputs; later duplicates are dropped. An input that
/// matches nothing is an error.
pub fn expand_inputs<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for input in inputs {
        let input = input.as_ref();
        let found = if input.is_file() {
            vec![input.to_path_buf()]
        } else if input.is_dir() {
            dir_images(input)?
        } else {
            glob_images(input)?
        };

        if found.is_empty() {
            bail!("No images found for input: {}", input.display());
        }
        debug!("Input {} -> {} file(s)", input.display(), found.len());

        for path in found {
            if seen.insert(path.clone()) {
                out.push(path);
            }
        }
    }

    info!("Expanded {} input(s) into {} image(s)", inputs.len(), out.len());
    Ok(out)
}

fn dir_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read entry in: {}", dir.display()))?
            .path();
        if path.is_file() && is_image(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn glob_images(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern = pattern.to_string_lossy();
    let mut paths = Vec::new();
    let entries =
        glob::glob(&pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))?;
    for entry in entries {
        let path = entry.with_context(|| format!("Glob entry error for: {}", pattern))?;
        if path.is_file() && is_image(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Split a sequence filename into (prefix, number, ext, padding)
///
/// Example: "/path/seq.0001.exr" -> ("/path/seq.", 1, "exr", 4)
pub fn split_sequence_path(path: &Path) -> Option<(String, usize, String, usize)> {
    let ext = path.extension()?.to_str()?.to_string();
    let stem = path.file_stem()?.to_str()?;

    let digit_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, ch)| ch.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;

    let number_str = &stem[digit_start..];
    let number = number_str.parse::<usize>().ok()?;

    let mut prefix = String::new();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        prefix.push_str(&parent.to_string_lossy());
        if !prefix.ends_with(std::path::MAIN_SEPARATOR) {
            prefix.push(std::path::MAIN_SEPARATOR);
        }
    }
    prefix.push_str(&stem[..digit_start]);

    Some((prefix, number, ext, number_str.len()))
}

/// Short label for a path list, e.g. `/seq/shot.####.exr [1001-1100]`.
///
/// Falls back to a file count when the paths are not one numbered sequence.
pub fn describe_sequence(paths: &[PathBuf]) -> String {
    let mut pattern: Option<(String, String, usize)> = None;
    let (mut min, mut max) = (usize::MAX, 0usize);

    for path in paths {
        let Some((prefix, number, ext, padding)) = split_sequence_path(path) else {
            return format!("{} file(s)", paths.len());
        };
        match &pattern {
            None => pattern = Some((prefix, ext, padding)),
            Some((p, e, _)) if *p == prefix && *e == ext => {}
            Some(_) => return format!("{} file(s)", paths.len()),
        }
        min = min.min(number);
        max = max.max(number);
    }

    match pattern {
        Some((prefix, ext, padding)) => {
            format!("{}{}.{} [{}-{}]", prefix, "#".repeat(padding), ext, min, max)
        }
        None => "0 file(s)".to_string(),
    }
}

/// Compact ascending frame list, e.g. `0-9, 12, 20-25`
pub fn format_frame_ranges(frames: &[usize]) -> String {
    let mut parts = Vec::new();
    let mut iter = frames.iter().copied().peekable();

    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        parts.push(if start == end {
            start.to_string()
        } else {
            format!("{}-{}", start, end)
        });
    }

    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(", ")
    }
}
