//! Image-based segmentation for scanned or flattened documents.
//!
//! When a document yields no extractable text, its pages are rasterized and
//! stacked into one tall composite, and chunk boundaries are derived from the
//! ink itself: blur, Otsu threshold (inverted, so ink is foreground), dilation
//! until nearby strokes merge into section blobs, then external contours.
//! Each contour's bounding rectangle is cropped from the original composite
//! and handed to a text recognizer; regions with no alphabetic text are
//! discarded as noise. Surviving regions are sorted by their top edge so
//! emission follows reading order regardless of contour traversal order.
//!
//! Rasterization and recognition sit behind traits so tests can drive the
//! pipeline with synthetic pages and a fake recognizer.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::{imageops, GrayImage, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::VisualConfig;
use crate::error::SourceError;
use crate::extract::has_alphabetic;

/// Contours smaller than this are specks no recognizer can read.
const MIN_REGION_PX: u32 = 8;

/// The dilation element approximates repeated passes of a 5x5 kernel.
const DILATE_RADIUS_PER_ITERATION: u32 = 2;

/// One recognized region of a document: its text and the persisted crop.
#[derive(Debug, Clone)]
pub struct Region {
    pub text: String,
    pub image_ref: PathBuf,
}

/// Renders a document's pages to bitmaps.
pub trait PageRasterizer {
    fn rasterize(&self, path: &Path) -> Result<Vec<RgbImage>, SourceError>;
}

/// Recognizes text in a cropped region image.
pub trait TextRecognizer {
    fn recognize(&self, region: &RgbImage) -> Result<String, SourceError>;
}

/// Rasterizes PDF pages through poppler's `pdftoppm`.
pub struct PdftoppmRasterizer {
    pub dpi: u32,
}

impl PageRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, path: &Path) -> Result<Vec<RgbImage>, SourceError> {
        let dir = tempfile::tempdir()?;
        let prefix = dir.path().join("page");

        let status = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(path)
            .arg(&prefix)
            .status()
            .map_err(|e| SourceError::Rasterize(format!("failed to run pdftoppm: {}", e)))?;
        if !status.success() {
            return Err(SourceError::Rasterize(format!(
                "pdftoppm exited with {}",
                status
            )));
        }

        let mut page_paths: Vec<PathBuf> = std::fs::read_dir(dir.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("png"))
            .collect();
        page_paths.sort();

        if page_paths.is_empty() {
            return Err(SourceError::Rasterize(
                "pdftoppm produced no pages".to_string(),
            ));
        }

        page_paths
            .iter()
            .map(|p| {
                image::open(p)
                    .map(|img| img.to_rgb8())
                    .map_err(|e| SourceError::Rasterize(e.to_string()))
            })
            .collect()
    }
}

/// Recognizes region text through the `tesseract` CLI.
pub struct TesseractRecognizer;

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, region: &RgbImage) -> Result<String, SourceError> {
        let file = tempfile::Builder::new().suffix(".png").tempfile()?;
        region
            .save(file.path())
            .map_err(|e| SourceError::Recognition(e.to_string()))?;

        let output = Command::new("tesseract")
            .arg(file.path())
            .arg("stdout")
            .output()
            .map_err(|e| SourceError::Recognition(format!("failed to run tesseract: {}", e)))?;
        if !output.status.success() {
            return Err(SourceError::Recognition(format!(
                "tesseract exited with {}",
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub struct VisualSegmenter {
    rasterizer: Box<dyn PageRasterizer>,
    recognizer: Box<dyn TextRecognizer>,
    blur_sigma: f32,
    dilate_iterations: u32,
}

impl VisualSegmenter {
    pub fn from_config(config: &VisualConfig) -> Self {
        Self::new(
            Box::new(PdftoppmRasterizer {
                dpi: config.raster_dpi,
            }),
            Box::new(TesseractRecognizer),
            config,
        )
    }

    pub fn new(
        rasterizer: Box<dyn PageRasterizer>,
        recognizer: Box<dyn TextRecognizer>,
        config: &VisualConfig,
    ) -> Self {
        Self {
            rasterizer,
            recognizer,
            blur_sigma: config.blur_sigma,
            dilate_iterations: config.dilate_iterations,
        }
    }

    /// Segments a document into recognized regions, persisting each kept
    /// crop under `artifacts_dir` at a path derived from the source name,
    /// a per-segmentation tag, and the region index. Paths are unique
    /// across imports and across sources that share a file stem.
    pub fn segment(
        &self,
        path: &Path,
        source_name: &str,
        artifacts_dir: &Path,
    ) -> Result<Vec<Region>, SourceError> {
        let pages = self.rasterizer.rasterize(path)?;
        let composite = stack_pages(&pages);
        debug!(
            source = source_name,
            pages = pages.len(),
            width = composite.width(),
            height = composite.height(),
            "rasterized composite"
        );

        let mask = self.ink_mask(&composite);
        let rects = region_rects(&mask, composite.width(), composite.height());

        let mut kept: Vec<(u32, String, RgbImage)> = Vec::new();
        for rect in rects {
            let crop =
                imageops::crop_imm(&composite, rect.x, rect.y, rect.width, rect.height).to_image();
            let text = match self.recognizer.recognize(&crop) {
                Ok(text) => text,
                Err(e) => {
                    // Treated as "no recognizable content" rather than
                    // aborting the document
                    warn!(source = source_name, error = %e, "region recognition failed, skipping");
                    continue;
                }
            };
            if !has_alphabetic(&text) {
                continue;
            }
            kept.push((rect.y, text, crop));
        }

        // Contour discovery order is not reading order; sort by top edge.
        kept.sort_by_key(|(top, _, _)| *top);

        std::fs::create_dir_all(artifacts_dir)?;
        let stem = source_stem(source_name);
        // Fresh tag per segmentation, so a re-import never reuses the paths
        // of crops still referenced by the chunks it is replacing.
        let batch = Uuid::new_v4();

        let mut regions = Vec::with_capacity(kept.len());
        for (index, (_, text, crop)) in kept.into_iter().enumerate() {
            let image_ref = artifacts_dir.join(format!("{}-{}-{}.png", stem, batch, index));
            crop.save(&image_ref)
                .map_err(|e| SourceError::Extraction(format!("crop write failed: {}", e)))?;
            regions.push(Region { text, image_ref });
        }

        debug!(source = source_name, regions = regions.len(), "visual segmentation done");
        Ok(regions)
    }

    /// Blur, automatic inverse threshold, and dilation into section blobs.
    fn ink_mask(&self, composite: &RgbImage) -> GrayImage {
        let gray = imageops::grayscale(composite);
        let blurred = gaussian_blur_f32(&gray, self.blur_sigma);
        let level = otsu_level(&blurred);
        let binary = threshold(&blurred, level, ThresholdType::BinaryInverted);

        let radius = (self.dilate_iterations * DILATE_RADIUS_PER_ITERATION).min(u8::MAX as u32);
        dilate(&binary, Norm::LInf, radius as u8)
    }
}

#[derive(Debug, Clone, Copy)]
struct RegionRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Bounding rectangles of the mask's external contours, clamped to the
/// original image so crops are taken from non-dilated content.
fn region_rects(mask: &GrayImage, max_width: u32, max_height: u32) -> Vec<RegionRect> {
    let contours: Vec<Contour<i32>> = find_contours(mask);

    contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter_map(|c| bounding_rect(c, max_width, max_height))
        .filter(|r| r.width >= MIN_REGION_PX && r.height >= MIN_REGION_PX)
        .collect()
}

fn bounding_rect(contour: &Contour<i32>, max_width: u32, max_height: u32) -> Option<RegionRect> {
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;

    for point in &contour.points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }

    if min_x > max_x || min_y > max_y {
        return None;
    }

    let x = min_x.max(0) as u32;
    let y = min_y.max(0) as u32;
    let width = ((max_x as u32).saturating_add(1)).min(max_width).saturating_sub(x);
    let height = ((max_y as u32).saturating_add(1)).min(max_height).saturating_sub(y);

    if width == 0 || height == 0 {
        return None;
    }

    Some(RegionRect {
        x,
        y,
        width,
        height,
    })
}

/// Vertically concatenates pages onto a white canvas sized
/// `(max width, sum of heights)`, preserving top-to-bottom reading order.
fn stack_pages(pages: &[RgbImage]) -> RgbImage {
    let width = pages.iter().map(|p| p.width()).max().unwrap_or(1);
    let height: u32 = pages.iter().map(|p| p.height()).sum::<u32>().max(1);

    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut offset: i64 = 0;
    for page in pages {
        imageops::replace(&mut canvas, page, 0, offset);
        offset += i64::from(page.height());
    }
    canvas
}

fn source_stem(source_name: &str) -> String {
    Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serves a single synthetic page without touching any external tool.
    struct FakeRasterizer {
        page: RgbImage,
    }

    impl PageRasterizer for FakeRasterizer {
        fn rasterize(&self, _path: &Path) -> Result<Vec<RgbImage>, SourceError> {
            Ok(vec![self.page.clone()])
        }
    }

    /// Pretends wide regions carry text and everything else is graphics.
    struct WidthRecognizer {
        min_text_width: u32,
    }

    impl TextRecognizer for WidthRecognizer {
        fn recognize(&self, region: &RgbImage) -> Result<String, SourceError> {
            if region.width() >= self.min_text_width {
                Ok(format!("recognized text {}px wide", region.width()))
            } else {
                Ok("--- 123 ---".to_string())
            }
        }
    }

    struct FailingRecognizer;

    impl TextRecognizer for FailingRecognizer {
        fn recognize(&self, _region: &RgbImage) -> Result<String, SourceError> {
            Err(SourceError::Recognition("engine crashed".to_string()))
        }
    }

    fn black_block(canvas: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                canvas.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
    }

    fn test_config() -> VisualConfig {
        VisualConfig {
            blur_sigma: 1.0,
            dilate_iterations: 1,
            ..VisualConfig::default()
        }
    }

    fn two_block_page() -> RgbImage {
        let mut page = RgbImage::from_pixel(220, 220, Rgb([255, 255, 255]));
        // Wide block near the top reads as text, small low block as noise
        black_block(&mut page, 20, 20, 150, 30);
        black_block(&mut page, 20, 160, 30, 30);
        page
    }

    #[test]
    fn noise_regions_are_discarded() {
        let artifacts = tempfile::tempdir().unwrap();
        let segmenter = VisualSegmenter::new(
            Box::new(FakeRasterizer {
                page: two_block_page(),
            }),
            Box::new(WidthRecognizer {
                min_text_width: 100,
            }),
            &test_config(),
        );

        let regions = segmenter
            .segment(Path::new("import/scan.pdf"), "import/scan.pdf", artifacts.path())
            .unwrap();

        assert_eq!(regions.len(), 1, "only the text block survives");
        assert!(regions[0].text.contains("recognized text"));
        assert!(regions[0].image_ref.exists());
        assert!(regions[0]
            .image_ref
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("scan-"));
    }

    #[test]
    fn regions_emit_in_reading_order() {
        let mut page = RgbImage::from_pixel(220, 300, Rgb([255, 255, 255]));
        black_block(&mut page, 20, 200, 150, 40);
        black_block(&mut page, 20, 20, 150, 40);

        let artifacts = tempfile::tempdir().unwrap();
        let segmenter = VisualSegmenter::new(
            Box::new(FakeRasterizer { page }),
            Box::new(WidthRecognizer { min_text_width: 10 }),
            &test_config(),
        );

        let regions = segmenter
            .segment(Path::new("scan.pdf"), "scan.pdf", artifacts.path())
            .unwrap();

        assert_eq!(regions.len(), 2);
        assert!(regions[0].image_ref.to_string_lossy().ends_with("-0.png"));
        assert!(regions[1].image_ref.to_string_lossy().ends_with("-1.png"));
    }

    #[test]
    fn reimported_crops_never_reuse_earlier_paths() {
        let artifacts = tempfile::tempdir().unwrap();
        let segmenter = VisualSegmenter::new(
            Box::new(FakeRasterizer {
                page: two_block_page(),
            }),
            Box::new(WidthRecognizer {
                min_text_width: 100,
            }),
            &test_config(),
        );

        let first = segmenter
            .segment(Path::new("import/scan.pdf"), "import/scan.pdf", artifacts.path())
            .unwrap();
        let second = segmenter
            .segment(Path::new("import/scan.pdf"), "import/scan.pdf", artifacts.path())
            .unwrap();

        // Deleting the first import's crops after a replace commits must not
        // touch the files the replacement chunks reference.
        assert_ne!(first[0].image_ref, second[0].image_ref);
        assert!(first[0].image_ref.exists());
        assert!(second[0].image_ref.exists());
    }

    #[test]
    fn same_stem_sources_get_distinct_crop_paths() {
        let artifacts = tempfile::tempdir().unwrap();
        let segmenter = VisualSegmenter::new(
            Box::new(FakeRasterizer {
                page: two_block_page(),
            }),
            Box::new(WidthRecognizer {
                min_text_width: 100,
            }),
            &test_config(),
        );

        let a = segmenter
            .segment(Path::new("a/scan.pdf"), "a/scan.pdf", artifacts.path())
            .unwrap();
        let b = segmenter
            .segment(Path::new("b/scan.pdf"), "b/scan.pdf", artifacts.path())
            .unwrap();

        assert_ne!(a[0].image_ref, b[0].image_ref);
        assert!(a[0].image_ref.exists());
        assert!(b[0].image_ref.exists());
    }

    #[test]
    fn recognition_failure_skips_region_not_document() {
        let artifacts = tempfile::tempdir().unwrap();
        let segmenter = VisualSegmenter::new(
            Box::new(FakeRasterizer {
                page: two_block_page(),
            }),
            Box::new(FailingRecognizer),
            &test_config(),
        );

        let regions = segmenter
            .segment(Path::new("scan.pdf"), "scan.pdf", artifacts.path())
            .unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn pages_stack_vertically_on_shared_canvas() {
        let a = RgbImage::from_pixel(100, 40, Rgb([0, 0, 0]));
        let b = RgbImage::from_pixel(80, 60, Rgb([10, 10, 10]));

        let composite = stack_pages(&[a, b]);
        assert_eq!(composite.width(), 100);
        assert_eq!(composite.height(), 100);
        // Narrower page leaves white margin on the right
        assert_eq!(*composite.get_pixel(90, 50), Rgb([255, 255, 255]));
        assert_eq!(*composite.get_pixel(10, 50), Rgb([10, 10, 10]));
    }
}
