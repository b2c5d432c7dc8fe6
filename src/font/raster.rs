//! Glyph rasterization: the trait seam, the `fontdue`-backed production
//! rasterizer, and on-disk font discovery.
//!
//! Rasterizers produce full-cell coverage bitmaps: the cell is the glyph's
//! advance width by the face's line height, with the glyph outline blitted
//! at its bearing offsets. Layout and quad sizes both come straight from
//! cell dimensions, so advance logic never diverges from draw geometry.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::OverlayError;

use super::{FontDesc, FontStyle};

/// Single-channel coverage bitmap for one character cell. `0` is fully
/// transparent, `255` fully covered; no color is baked in.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
}

/// Produces coverage bitmaps for single character codes of one logical font.
pub trait Rasterize {
    fn desc(&self) -> &FontDesc;

    /// Rasterize one character cell. Fails with `RasterizationFailed` when
    /// the face has no glyph for the character. No temporary surface
    /// outlives the call.
    fn rasterize(&mut self, code: u16) -> Result<Bitmap, OverlayError>;
}

/// Opens rasterizers for logical font descriptors. The production
/// implementation is [`SystemFonts`]; hosts embedding their own font data
/// can supply their own backend.
pub trait FontBackend {
    fn open(&self, desc: &FontDesc) -> Result<Box<dyn Rasterize>, OverlayError>;
}

/// Production rasterizer over a loaded `fontdue` face.
pub struct FontRasterizer {
    desc: FontDesc,
    font: fontdue::Font,
    px: f32,
    baseline: i32,
    cell_height: u32,
}

impl FontRasterizer {
    /// Parse a face from raw font-file bytes and fix its vertical metrics
    /// for the descriptor's pixel height.
    pub fn from_bytes(data: &[u8], desc: FontDesc) -> Result<Self, OverlayError> {
        let font = fontdue::Font::from_bytes(data, fontdue::FontSettings::default()).map_err(
            |err| {
                log::warn!("font: failed to parse face for {:?}: {err}", desc.family);
                OverlayError::FontUnavailable {
                    family: desc.family.clone(),
                }
            },
        )?;

        let px = desc.height as f32;
        let metrics = font
            .horizontal_line_metrics(px)
            .ok_or_else(|| OverlayError::FontUnavailable {
                family: desc.family.clone(),
            })?;
        let baseline = metrics.ascent.ceil() as i32;
        let cell_height = (metrics.ascent - metrics.descent).ceil().max(1.0) as u32;

        Ok(Self {
            desc,
            font,
            px,
            baseline,
            cell_height,
        })
    }
}

impl Rasterize for FontRasterizer {
    fn desc(&self) -> &FontDesc {
        &self.desc
    }

    fn rasterize(&mut self, code: u16) -> Result<Bitmap, OverlayError> {
        let failed = || OverlayError::RasterizationFailed {
            family: self.desc.family.clone(),
            code,
        };

        let ch = char::from_u32(u32::from(code)).ok_or_else(&failed)?;
        if self.font.lookup_glyph_index(ch) == 0 {
            return Err(failed());
        }

        let (metrics, outline) = self.font.rasterize(ch, self.px);

        let cell_width = metrics.advance_width.ceil().max(1.0) as u32;
        let cell_height = self.cell_height;
        let mut coverage = vec![0u8; (cell_width * cell_height) as usize];

        // Blit the tight outline bitmap into the cell at its bearings:
        // x from the left bearing, y so the outline sits on the baseline.
        let left = metrics.xmin;
        let top = self.baseline - metrics.ymin - metrics.height as i32;
        for row in 0..metrics.height {
            let y = top + row as i32;
            if y < 0 || y >= cell_height as i32 {
                continue;
            }
            for col in 0..metrics.width {
                let x = left + col as i32;
                if x < 0 || x >= cell_width as i32 {
                    continue;
                }
                coverage[(y as u32 * cell_width + x as u32) as usize] =
                    outline[row * metrics.width + col];
            }
        }

        Ok(Bitmap {
            width: cell_width,
            height: cell_height,
            coverage,
        })
    }
}

/// Font discovery over the platform's font directories.
///
/// Resolution is by normalized file stem: lowercase with spaces, hyphens,
/// and underscores removed, matched against the requested family plus a
/// style suffix. A missing style falls back to the family's regular file.
pub struct SystemFonts {
    search_dirs: Vec<PathBuf>,
}

#[cfg(target_os = "windows")]
fn platform_font_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from(r"C:\Windows\Fonts")]
}

#[cfg(target_os = "macos")]
fn platform_font_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/System/Library/Fonts"),
        PathBuf::from("/Library/Fonts"),
    ]
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn platform_font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
    ];
    if let Ok(home) = std::env::var("HOME") {
        dirs.push(Path::new(&home).join(".local/share/fonts"));
    }
    dirs
}

/// Suffixes a file stem may carry for each style, tried in order.
fn style_suffixes(style: FontStyle) -> &'static [&'static str] {
    match style {
        FontStyle::Regular => &["", "regular", "book"],
        FontStyle::Bold => &["bold", "bd", "b"],
        FontStyle::Italic => &["italic", "oblique", "i"],
        FontStyle::BoldItalic => &["bolditalic", "boldoblique", "bi", "z"],
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|&c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_font_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("ttf" | "otf" | "ttc")
    )
}

impl SystemFonts {
    pub fn new() -> Self {
        Self {
            search_dirs: platform_font_dirs(),
        }
    }

    /// Discovery restricted to explicit directories (hosts shipping their
    /// own font folder).
    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs: dirs }
    }

    /// All font files under the search directories, capped at a shallow
    /// recursion depth.
    fn font_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut stack: Vec<(PathBuf, u32)> =
            self.search_dirs.iter().map(|d| (d.clone(), 0)).collect();
        while let Some((dir, depth)) = stack.pop() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    if depth < 3 {
                        stack.push((path, depth + 1));
                    }
                } else if is_font_file(&path) {
                    files.push(path);
                }
            }
        }
        files
    }

    /// Find the file whose stem matches `family` with one of the style's
    /// suffixes.
    fn find_file(&self, family: &str, style: FontStyle) -> Option<PathBuf> {
        let family = normalize(family);
        let files = self.font_files();
        for suffix in style_suffixes(style) {
            let wanted = format!("{family}{suffix}");
            if let Some(path) = files.iter().find(|p| {
                p.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|stem| normalize(stem) == wanted)
            }) {
                return Some(path.clone());
            }
        }
        None
    }
}

impl Default for SystemFonts {
    fn default() -> Self {
        Self::new()
    }
}

impl FontBackend for SystemFonts {
    fn open(&self, desc: &FontDesc) -> Result<Box<dyn Rasterize>, OverlayError> {
        let path = self
            .find_file(&desc.family, desc.style)
            // No styled file — fall back to the family's regular face.
            .or_else(|| self.find_file(&desc.family, FontStyle::Regular))
            .ok_or_else(|| OverlayError::FontUnavailable {
                family: desc.family.clone(),
            })?;

        log::debug!("font: {:?} {:?} -> {}", desc.family, desc.style, path.display());
        let data = fs::read(&path).map_err(|_| OverlayError::FontUnavailable {
            family: desc.family.clone(),
        })?;
        Ok(Box::new(FontRasterizer::from_bytes(&data, desc.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_separators_and_case() {
        assert_eq!(normalize("DejaVu Sans-Mono_X"), "dejavusansmonox");
    }

    #[test]
    fn garbage_bytes_fail_as_font_unavailable() {
        let err = FontRasterizer::from_bytes(&[0u8; 16], FontDesc::regular("Nope", 16))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, OverlayError::FontUnavailable { .. }));
    }

    #[test]
    fn find_file_matches_family_and_style() {
        let dir = std::env::temp_dir().join("scrim_font_discovery_test");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("temp dir");
        for name in ["My Face-Regular.ttf", "MyFace-Bold.ttf", "Other.otf", "notes.txt"] {
            fs::write(dir.join(name), b"").expect("touch");
        }

        let fonts = SystemFonts::with_dirs(vec![dir.clone()]);
        let regular = fonts.find_file("My Face", FontStyle::Regular).expect("regular");
        assert!(regular.ends_with("My Face-Regular.ttf"));
        let bold = fonts.find_file("My Face", FontStyle::Bold).expect("bold");
        assert!(bold.ends_with("MyFace-Bold.ttf"));
        assert!(fonts.find_file("My Face", FontStyle::Italic).is_none());
        assert!(fonts.find_file("Missing", FontStyle::Regular).is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn font_file_extensions() {
        assert!(is_font_file(Path::new("a.ttf")));
        assert!(is_font_file(Path::new("a.otf")));
        assert!(is_font_file(Path::new("a.ttc")));
        assert!(!is_font_file(Path::new("a.woff2")));
        assert!(!is_font_file(Path::new("ttf")));
    }
}
