//! Report rendering.
//!
//! Turns an exported tracker snapshot into a document: plain text or a
//! paginated A4 PDF for people, or JSON for other tools. The format is picked
//! from the output file extension unless requested explicitly.

use std::fmt::{self, Write as _};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::types::DeviceRecord;

/// Heading of every report.
pub const REPORT_TITLE: &str = "Bluetooth Devices Report";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// A4 portrait, in millimetres.
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const LINE_HEIGHT_MM: f32 = 7.0;
const INDENT_MM: f32 = 8.0;

/// Text lines that fit on one PDF page between the margins.
pub const PDF_LINES_PER_PAGE: usize = 36;

/// Errors raised while rendering or writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report could not be serialized.
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The PDF document could not be built.
    #[error("Failed to render PDF report: {0}")]
    Pdf(String),

    /// The report file could not be written.
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for report operations.
pub type ReportResult<T> = std::result::Result<T, ReportError>;

/// Output document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
    /// Paginated A4 PDF.
    Pdf,
}

impl ReportFormat {
    /// `Json` for a `.json` extension, `Pdf` for `.pdf` (any case), `Text`
    /// otherwise.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => Self::Pdf,
            _ => Self::Text,
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "pdf" => Ok(Self::Pdf),
            other => Err(format!(
                "unknown report format '{other}' (expected text, json or pdf)"
            )),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
            Self::Pdf => f.write_str("pdf"),
        }
    }
}

/// Everything a rendered report shows about one observation run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Identifier of the observation run.
    pub run_id: Uuid,
    /// When scanning started.
    pub started_at: DateTime<Utc>,
    /// When scanning stopped.
    pub finished_at: DateTime<Utc>,
    /// Gap threshold the intervals were merged with.
    pub gap_threshold_secs: u64,
    /// Timezone instants are displayed in.
    #[serde(serialize_with = "serialize_tz")]
    pub timezone: Tz,
    /// Devices in first-seen order.
    pub devices: Vec<DeviceRecord>,
}

impl Report {
    /// Build a report for a run, taking display settings from `config`.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        devices: Vec<DeviceRecord>,
        config: &Config,
    ) -> Self {
        Self {
            run_id,
            started_at,
            finished_at,
            gap_threshold_secs: config.tracker.gap_threshold_secs,
            timezone: config.report.timezone,
            devices,
        }
    }

    /// Render in the requested format, as the bytes of the output file.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialize`] if JSON serialization fails, or
    /// [`ReportError::Pdf`] if the PDF document cannot be built.
    pub fn render(&self, format: ReportFormat) -> ReportResult<Vec<u8>> {
        match format {
            ReportFormat::Text => Ok(render_text(self).into_bytes()),
            ReportFormat::Json => render_json(self).map(String::into_bytes),
            ReportFormat::Pdf => render_pdf(self),
        }
    }

    fn local(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone).format(TIME_FORMAT).to_string()
    }
}

/// Render a plain-text report.
#[must_use]
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "{REPORT_TITLE}");
    let _ = writeln!(out, "{}", "=".repeat(REPORT_TITLE.len()));
    let _ = writeln!(out, "Run:      {}", report.run_id);
    let _ = writeln!(
        out,
        "Window:   {} to {} ({})",
        report.local(report.started_at),
        report.local(report.finished_at),
        report.timezone.name()
    );
    let _ = writeln!(out, "Gap:      {}s", report.gap_threshold_secs);
    let _ = writeln!(out, "Devices:  {}", report.devices.len());
    out.push('\n');

    if report.devices.is_empty() {
        out.push_str("No devices found.\n");
        return out;
    }

    for device in &report.devices {
        let _ = writeln!(out, "Device Name: {}", device.display_name);
        let _ = writeln!(out, "MAC Address: {}", device.device_id);
        let _ = writeln!(
            out,
            "Sightings:   {} ({} present)",
            device.sightings,
            format_duration(device.total_presence())
        );
        for interval in &device.intervals {
            let _ = writeln!(
                out,
                "  Online from {} to {} ({})",
                report.local(interval.start),
                report.local(interval.end),
                format_duration(interval.duration())
            );
        }
        out.push('\n');
    }

    out
}

/// Render the report as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ReportError::Serialize`] if serialization fails.
pub fn render_json(report: &Report) -> ReportResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// How a line of the PDF report is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    /// Report heading.
    Title,
    /// First line of a device block.
    Heading,
    /// Ordinary line.
    Body,
    /// Presence interval under a device.
    Indented,
    /// Empty spacer line.
    Blank,
}

impl LineStyle {
    const fn font_size(self) -> f32 {
        match self {
            Self::Title => 18.0,
            Self::Heading => 12.0,
            Self::Body | Self::Indented | Self::Blank => 10.0,
        }
    }

    const fn indent_mm(self) -> f32 {
        match self {
            Self::Indented => INDENT_MM,
            _ => 0.0,
        }
    }
}

/// One line of the PDF report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfLine {
    /// Text to draw.
    pub text: String,
    /// How to draw it.
    pub style: LineStyle,
}

impl PdfLine {
    fn new(style: LineStyle, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    fn blank() -> Self {
        Self::new(LineStyle::Blank, String::new())
    }
}

/// Lay the report out as PDF pages of at most [`PDF_LINES_PER_PAGE`] lines.
///
/// A device block that does not fit in the space left on a page starts on
/// the next one; only blocks longer than a whole page are split.
#[must_use]
pub fn pdf_pages(report: &Report) -> Vec<Vec<PdfLine>> {
    let mut blocks = vec![vec![
        PdfLine::new(LineStyle::Title, REPORT_TITLE),
        PdfLine::new(LineStyle::Body, format!("Run: {}", report.run_id)),
        PdfLine::new(
            LineStyle::Body,
            format!(
                "Window: {} to {} ({})",
                report.local(report.started_at),
                report.local(report.finished_at),
                report.timezone.name()
            ),
        ),
        PdfLine::new(
            LineStyle::Body,
            format!(
                "Gap: {}s    Devices: {}",
                report.gap_threshold_secs,
                report.devices.len()
            ),
        ),
        PdfLine::blank(),
    ]];

    if report.devices.is_empty() {
        blocks.push(vec![PdfLine::new(LineStyle::Body, "No devices found.")]);
    }

    for device in &report.devices {
        let mut block = vec![
            PdfLine::new(
                LineStyle::Heading,
                format!("Device Name: {}", device.display_name),
            ),
            PdfLine::new(LineStyle::Body, format!("MAC Address: {}", device.device_id)),
            PdfLine::new(
                LineStyle::Body,
                format!(
                    "Sightings: {} ({} present)",
                    device.sightings,
                    format_duration(device.total_presence())
                ),
            ),
        ];
        block.extend(device.intervals.iter().map(|interval| {
            PdfLine::new(
                LineStyle::Indented,
                format!(
                    "Online from {} to {} ({})",
                    report.local(interval.start),
                    report.local(interval.end),
                    format_duration(interval.duration())
                ),
            )
        }));
        block.push(PdfLine::blank());
        blocks.push(block);
    }

    paginate(blocks, PDF_LINES_PER_PAGE)
}

fn paginate(blocks: Vec<Vec<PdfLine>>, per_page: usize) -> Vec<Vec<PdfLine>> {
    let mut pages = Vec::new();
    let mut current: Vec<PdfLine> = Vec::with_capacity(per_page);

    for block in blocks {
        let room = per_page - current.len();
        if block.len() > room && block.len() <= per_page && !current.is_empty() {
            pages.push(std::mem::take(&mut current));
        }
        for line in block {
            if current.len() == per_page {
                pages.push(std::mem::take(&mut current));
            }
            // Spacers are dropped at the top of a page.
            if current.is_empty() && line.style == LineStyle::Blank && !pages.is_empty() {
                continue;
            }
            current.push(line);
        }
    }

    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    pages
}

/// Render the report as a PDF document.
///
/// # Errors
///
/// Returns [`ReportError::Pdf`] if the document cannot be built.
pub fn render_pdf(report: &Report) -> ReportResult<Vec<u8>> {
    let mut pages = pdf_pages(report).into_iter();

    let (doc, page, layer) = PdfDocument::new(
        REPORT_TITLE,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Report",
    );
    let fonts = PdfFonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?,
    };

    let first = pages.next().unwrap_or_default();
    draw_page(&doc.get_page(page).get_layer(layer), &first, &fonts);
    for lines in pages {
        let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Report");
        draw_page(&doc.get_page(page).get_layer(layer), &lines, &fonts);
    }

    doc.save_to_bytes().map_err(pdf_error)
}

struct PdfFonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn draw_page(layer: &PdfLayerReference, lines: &[PdfLine], fonts: &PdfFonts) {
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;
    for line in lines {
        if line.style != LineStyle::Blank {
            let font = match line.style {
                LineStyle::Title | LineStyle::Heading => &fonts.bold,
                _ => &fonts.regular,
            };
            layer.use_text(
                line.text.as_str(),
                line.style.font_size(),
                Mm(MARGIN_MM + line.style.indent_mm()),
                Mm(y),
                font,
            );
        }
        y -= LINE_HEIGHT_MM;
    }
}

fn pdf_error(err: impl fmt::Display) -> ReportError {
    ReportError::Pdf(err.to_string())
}

/// Render `report` and write it to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if rendering fails or the file cannot be written.
pub fn write_report(report: &Report, path: &Path, format: ReportFormat) -> ReportResult<()> {
    let content = report.render(format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    info!(
        path = %path.display(),
        %format,
        devices = report.devices.len(),
        "Report written"
    );
    Ok(())
}

/// Compact duration such as `45s`, `3m 05s` or `2h 00m 10s`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

fn serialize_tz<S>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(tz.name())
}
