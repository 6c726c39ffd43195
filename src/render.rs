use crate::{
    config::Output,
    error::ReportWriteError,
    report::{ImageReportRow, RunReport},
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct WrittenReport {
    pub markdown: PathBuf,
    pub json: Option<PathBuf>,
}

/// Writes the Markdown report to `path` (plus image copies and the optional
/// JSON dump next to it).
pub fn write_report(report: &RunReport, path: &Path, out: &Output) -> Result<WrittenReport, ReportWriteError> {
    let fail = |p: &Path, e: &dyn std::fmt::Display| ReportWriteError {
        path: p.to_path_buf(),
        reason: e.to_string(),
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| fail(&dir, &e))?;

    let photos = if out.copy_images {
        copy_images(&report.rows, &dir, &out.images_dir)
    } else {
        report
            .rows
            .iter()
            .map(|r| r.image_path.display().to_string())
            .collect()
    };

    let markdown = render_markdown(report, &photos, out);
    std::fs::write(path, markdown).map_err(|e| fail(path, &e))?;
    info!("report written to {}", path.display());

    let json = if out.write_json {
        let json_path = dir.join(&out.json_filename);
        let body = serde_json::to_string_pretty(report).map_err(|e| fail(&json_path, &e))?;
        std::fs::write(&json_path, body).map_err(|e| fail(&json_path, &e))?;
        Some(json_path)
    } else {
        None
    };

    Ok(WrittenReport {
        markdown: path.to_path_buf(),
        json,
    })
}

/// Copies each image under `<dir>/<images_dir>/` and returns the relative
/// photo links. A failed copy falls back to linking the original path.
fn copy_images(rows: &[ImageReportRow], dir: &Path, images_dir: &str) -> Vec<String> {
    let target_dir = dir.join(images_dir);
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        warn!("cannot create {}: {e}", target_dir.display());
    }
    rows.iter()
        .map(|row| {
            let Some(name) = row.image_path.file_name() else {
                return row.image_path.display().to_string();
            };
            match std::fs::copy(&row.image_path, target_dir.join(name)) {
                Ok(_) => format!("{images_dir}/{}", name.to_string_lossy()),
                Err(e) => {
                    warn!("cannot copy {}: {e}", row.image_path.display());
                    row.image_path.display().to_string()
                }
            }
        })
        .collect()
}

pub fn render_markdown(report: &RunReport, photos: &[String], out: &Output) -> String {
    let mut columns: Vec<String> = ["Title", "Photo", "Resolution", "Size"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if report.layout.jpeg_quality {
        columns.push("JPEG Quality".into());
    }
    columns.extend(report.layout.saas_column.iter().cloned());
    columns.extend(report.layout.sdk_columns.iter().cloned());

    let mut md = String::new();
    if report.is_partial() {
        md.push_str(&format!(
            "> **Partial report**: interrupted after {} of {} images.\n\n",
            report.rows.len(),
            report.total_images
        ));
    }
    md.push_str(&table_line(&columns));
    md.push_str(&table_line(
        &columns.iter().map(|c| "-".repeat(c.len())).collect::<Vec<_>>(),
    ));

    for (row, photo) in report.rows.iter().zip(photos) {
        let mut cells = vec![
            escape(&row.title),
            format!(
                "<img src=\"{photo}\" width=\"{}\" height=\"{}\" alt=\"Photo\">",
                out.thumb_width, out.thumb_height
            ),
            row.metadata.resolution_cell(),
            row.metadata.size_cell(),
        ];
        if report.layout.jpeg_quality {
            cells.push(escape(
                &row.jpeg_quality
                    .as_ref()
                    .map(|q| q.cell())
                    .unwrap_or_else(|| "N/A".into()),
            ));
        }
        if report.layout.saas_column.is_some() {
            cells.push(escape(
                &row.saas_diagnosis
                    .as_ref()
                    .map(|d| d.cell())
                    .unwrap_or_else(|| "N/A".into()),
            ));
        }
        cells.extend(row.sdk_diagnoses.iter().map(|d| escape(&d.cell())));
        md.push_str(&table_line(&cells));
    }
    md
}

fn table_line(cells: &[String]) -> String {
    format!("| {} |\n", cells.join(" | "))
}

fn escape(cell: &str) -> String {
    cell.replace('|', "\\|").replace(['\r', '\n'], " ")
}
