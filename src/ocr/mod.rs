//! Optical character recognition.
//!
//! OCR is an external collaborator: the pipeline hands it a raster and
//! gets words with pixel bounding boxes back. [`TesseractOcr`] drives the
//! `tesseract` command-line tool; tests and embedders can plug in any
//! other [`OcrEngine`].

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use image::{ImageFormat, RgbImage};
use log::debug;

use crate::error::{Error, Result};
use crate::model::{BoundingBox, OcrToken};

/// Default recognition languages: Korean plus English.
pub const DEFAULT_LANGUAGE: &str = "kor+eng";

/// Recognizes words on a raster.
pub trait OcrEngine: Send + Sync {
    /// Words in reading order, with boxes in image pixel coordinates.
    fn recognize(&self, image: &RgbImage) -> Result<Vec<OcrToken>>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "ocr"
    }
}

/// OCR through the `tesseract` binary.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
    language: String,
    dpi: Option<u32>,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: DEFAULT_LANGUAGE.to_string(),
            dpi: None,
        }
    }
}

impl TesseractOcr {
    /// `tesseract` from `PATH` with Korean and English.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific binary.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the language string (`kor+eng`, `eng`, ...).
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Tell tesseract the input resolution.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = Some(dpi);
        self
    }

    /// Binary in use.
    pub fn binary(&self) -> &std::path::Path {
        &self.binary
    }

    fn run(&self, png: Vec<u8>) -> Result<String> {
        let mut command = Command::new(&self.binary);
        command.args(["stdin", "stdout", "-l", &self.language]);
        if let Some(dpi) = self.dpi {
            command.args(["--dpi", &dpi.to_string()]);
        }
        command
            .arg("tsv")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Ocr(format!("{} not found", self.binary.display()))
            } else {
                Error::Ocr(format!("failed to start {}: {}", self.binary.display(), e))
            }
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Ocr("stdin unavailable".to_string()))?;
        let writer = std::thread::spawn(move || stdin.write_all(&png));

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Ocr(format!("tesseract: {}", e)))?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Ocr(format!("writing image: {}", e))),
            Err(_) => return Err(Error::Ocr("image writer panicked".to_string())),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &RgbImage) -> Result<Vec<OcrToken>> {
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        let tsv = self.run(png)?;
        let tokens = parse_tsv(&tsv);
        debug!(
            "tesseract: {} words on {}x{}",
            tokens.len(),
            image.width(),
            image.height()
        );
        Ok(tokens)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

/// Word-level rows (level 5) of tesseract TSV output.
pub fn parse_tsv(tsv: &str) -> Vec<OcrToken> {
    let mut tokens = Vec::new();
    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.splitn(12, '\t').collect();
        if fields.len() < 12 || fields[0] != "5" {
            continue;
        }
        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }
        let coord = |i: usize| fields[i].trim().parse::<i64>().ok().map(|v| v.max(0) as u32);
        let (Some(left), Some(top), Some(width), Some(height)) =
            (coord(6), coord(7), coord(8), coord(9))
        else {
            continue;
        };
        let mut token = OcrToken::new(text, BoundingBox::new(left, top, width, height));
        token.confidence = fields[10].trim().parse::<f32>().ok().filter(|c| *c >= 0.0);
        tokens.push(token);
    }
    tokens
}
