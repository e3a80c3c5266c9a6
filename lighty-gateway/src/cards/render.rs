//! Card compositing: image layers through `image`, text through resvg.
//!
//! Text is collected as spans while the card is assembled, then drawn in one
//! pass by building an SVG the size of the card and rasterizing it.

use std::fmt::Write;

use image::imageops;
use image::{Rgba, RgbaImage};
use resvg::tiny_skia;
use resvg::usvg;

use super::ForgeError;
use super::assets::FontBook;
use super::layout::{FontFace, TextStyle};

/// Offset of the black drop shadow under white card text.
pub const SHADOW_OFFSET: i32 = 2;

/// Fraction of the font size between the top of a line and its baseline.
const ASCENT_RATIO: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ink {
    Black,
    White,
}

impl Ink {
    fn hex(&self) -> &'static str {
        match self {
            Ink::Black => "#000000",
            Ink::White => "#FFFFFF",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub style: TextStyle,
    pub ink: Ink,
}

/// A card being assembled.
pub struct CardCanvas {
    image: RgbaImage,
    spans: Vec<TextSpan>,
}

impl CardCanvas {
    pub fn new(template: RgbaImage) -> Self {
        Self {
            image: template,
            spans: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Copy `layer` over the card, replacing the pixels underneath.
    pub fn replace(&mut self, layer: &RgbaImage, x: i64, y: i64) {
        imageops::replace(&mut self.image, layer, x, y);
    }

    /// Alpha-blend `layer` over the card.
    pub fn overlay(&mut self, layer: &RgbaImage, x: i64, y: i64) {
        imageops::overlay(&mut self.image, layer, x, y);
    }

    /// Soft-light blend with `texture` stretched to the card size.
    pub fn soft_light(&mut self, texture: &RgbaImage) {
        let (width, height) = self.image.dimensions();
        let texture = if texture.dimensions() == (width, height) {
            texture.clone()
        } else {
            imageops::resize(texture, width, height, imageops::FilterType::Triangle)
        };
        for (base, light) in self.image.pixels_mut().zip(texture.pixels()) {
            for channel in 0..3 {
                base[channel] = soft_light_channel(base[channel], light[channel]);
            }
        }
    }

    pub fn text(&mut self, text: impl Into<String>, x: i32, y: i32, style: TextStyle, ink: Ink) {
        self.spans.push(TextSpan {
            text: text.into(),
            x,
            y,
            style,
            ink,
        });
    }

    /// White text over a black shadow, as used for titles and type lines.
    pub fn shadowed_text(&mut self, text: impl Into<String>, x: i32, y: i32, style: TextStyle) {
        let text = text.into();
        self.text(
            text.clone(),
            x + SHADOW_OFFSET,
            y + SHADOW_OFFSET,
            style,
            Ink::Black,
        );
        self.text(text, x, y, style, Ink::White);
    }

    pub fn spans(&self) -> &[TextSpan] {
        &self.spans
    }

    /// Rasterize the pending text onto the card.
    pub fn draw_text(&mut self, fonts: &FontBook) -> Result<(), ForgeError> {
        if self.spans.is_empty() {
            return Ok(());
        }
        let (width, height) = self.image.dimensions();
        let svg = text_layer_svg(&self.spans, fonts, width, height);
        let layer = rasterize(&svg, fonts.options())?;
        imageops::overlay(&mut self.image, &layer, 0, 0);
        self.spans.clear();
        Ok(())
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Soft-light blend of one 8-bit channel, matching PIL's `ImageChops.soft_light`.
fn soft_light_channel(base: u8, light: u8) -> u8 {
    let (a, b) = (base as u32, light as u32);
    let screen = 255 - ((255 - a) * (255 - b)) / 255;
    let value = ((255 - a) * a * b / 255 + a * screen) / 255;
    value.min(255) as u8
}

/// Build the SVG for a transparent text layer of `width` × `height`.
pub fn text_layer_svg(spans: &[TextSpan], fonts: &FontBook, width: u32, height: u32) -> String {
    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    for span in spans {
        let baseline = span.y as f32 + span.style.size * ASCENT_RATIO;
        let italic = if span.style.face == FontFace::Italic {
            r#" font-style="italic""#
        } else {
            ""
        };
        let _ = write!(
            svg,
            r#"<text x="{}" y="{:.1}" font-family="{}" font-size="{}" fill="{}"{}>{}</text>"#,
            span.x,
            baseline,
            xml_escape(&fonts.css_family(span.style.face)),
            span.style.size,
            span.ink.hex(),
            italic,
            xml_escape(&span.text),
        );
    }
    svg.push_str("</svg>");
    svg
}

fn rasterize(svg: &str, options: &usvg::Options<'static>) -> Result<RgbaImage, ForgeError> {
    let tree = usvg::Tree::from_data(svg.as_bytes(), options)
        .map_err(|e| ForgeError::Render(format!("SVG parse: {e}")))?;
    let size = tree.size().to_int_size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| ForgeError::Render("pixmap allocation failed".to_string()))?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    let mut layer = RgbaImage::new(size.width(), size.height());
    for (dst, src) in layer.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    Ok(layer)
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: TextStyle = TextStyle::new(FontFace::Title, 36.0);

    #[test]
    fn test_shadowed_text_svg() {
        let mut canvas = CardCanvas::new(RgbaImage::new(100, 50));
        canvas.shadowed_text("Goat & <Co>", 56, 50, TITLE);
        let svg = text_layer_svg(canvas.spans(), &FontBook::system(), 100, 50);
        insta::assert_snapshot!(svg, @r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50" viewBox="0 0 100 50"><text x="58" y="80.8" font-family="serif" font-size="36" fill="#000000">Goat &amp; &lt;Co&gt;</text><text x="56" y="78.8" font-family="serif" font-size="36" fill="#FFFFFF">Goat &amp; &lt;Co&gt;</text></svg>"##);
    }

    #[test]
    fn test_italic_face_sets_font_style() {
        let spans = vec![TextSpan {
            text: "flavor".to_string(),
            x: 0,
            y: 0,
            style: TextStyle::new(FontFace::Italic, 10.0),
            ink: Ink::Black,
        }];
        let svg = text_layer_svg(&spans, &FontBook::system(), 10, 10);
        assert!(svg.contains(r#"font-style="italic""#));
    }

    #[test]
    fn test_draw_text_keeps_dimensions() {
        let mut canvas = CardCanvas::new(RgbaImage::from_pixel(64, 32, Rgba([0, 0, 255, 255])));
        canvas.text("hi", 2, 2, TextStyle::new(FontFace::Body, 12.0), Ink::White);
        canvas.draw_text(&FontBook::system()).unwrap();
        assert!(canvas.spans().is_empty());
        assert_eq!(canvas.into_image().dimensions(), (64, 32));
    }

    #[test]
    fn test_soft_light_extremes() {
        assert_eq!(soft_light_channel(0, 200), 0);
        assert_eq!(soft_light_channel(255, 0), 255);
        // Mid-grey light leaves the base close to where it was
        let out = soft_light_channel(100, 128) as i32;
        assert!((out - 100).abs() <= 20, "got {out}");
    }

    #[test]
    fn test_overlay_blends_alpha() {
        let mut canvas = CardCanvas::new(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])));
        let icon = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 0]));
        canvas.overlay(&icon, 1, 1);
        assert_eq!(canvas.into_image().get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape(r#"a<b>"c"&'d'"#), "a&lt;b&gt;&quot;c&quot;&amp;&apos;d&apos;");
    }
}
