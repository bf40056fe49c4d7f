//! Scene rasterization
//!
//! Paints an overlay scene onto a transparent RGBA surface. Paths and images
//! go through tiny-skia; text glyphs are rasterized with ab_glyph and blended
//! by coverage. The active object gets a selection border, so callers that
//! want clean output discard the selection first.

use ab_glyph::{point, Font, GlyphId, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use tiny_skia::{
    ColorU8, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint,
    PremultipliedColorU8, Rect, Stroke, Transform,
};

use crate::fonts::FontBook;
use crate::object::{AnnotationKind, AnnotationObject, ImageProps, PathProps, TextProps};
use crate::scene::OverlayScene;
use crate::{Color, OverlayError};

const SELECTION_BORDER: Color = Color { r: 178, g: 204, b: 255, a: 255 };
const HANDLE_SIZE: f32 = 6.0;

/// Rasterize `scene` at `multiplier` times its canvas size
pub fn rasterize(
    scene: &OverlayScene,
    multiplier: f32,
    fonts: &FontBook,
) -> Result<RgbaImage, OverlayError> {
    let width = (scene.width() as f32 * multiplier).round() as u32;
    let height = (scene.height() as f32 * multiplier).round() as u32;
    let mut pixmap = Pixmap::new(width, height).ok_or(OverlayError::Surface { width, height })?;

    let transform = Transform::from_scale(multiplier, multiplier);

    for object in scene.objects() {
        match &object.kind {
            AnnotationKind::Text(text) => draw_text(&mut pixmap, object, text, multiplier, fonts)?,
            AnnotationKind::Path(path) => draw_path(&mut pixmap, object, path, transform),
            AnnotationKind::Image(image) => draw_image(&mut pixmap, object, image, multiplier),
        }
    }

    if let Some(active) = scene.active_object() {
        draw_selection(&mut pixmap, active, transform);
    }

    Ok(pixmap_to_image(&pixmap))
}

fn skia_color(color: Color, opacity: f32) -> tiny_skia::Color {
    let alpha = (color.a as f32 * opacity).round().clamp(0.0, 255.0) as u8;
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, alpha)
}

fn draw_path(
    pixmap: &mut Pixmap,
    object: &AnnotationObject,
    path: &PathProps,
    transform: Transform,
) {
    let Some(first) = path.points.first() else {
        return;
    };
    let origin = object.position;

    let mut builder = PathBuilder::new();
    builder.move_to(origin.x + first.x, origin.y + first.y);
    if path.points.len() == 1 {
        // Single tap: a dot the size of the brush.
        builder.line_to(origin.x + first.x + 0.01, origin.y + first.y);
    }
    for p in path.points.iter().skip(1) {
        builder.line_to(origin.x + p.x, origin.y + p.y);
    }

    let Some(skia_path) = builder.finish() else {
        return;
    };

    let mut paint = Paint::default();
    paint.set_color(skia_color(path.stroke, object.opacity()));
    let stroke = Stroke {
        width: path.stroke_width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };

    pixmap.stroke_path(&skia_path, &paint, &stroke, transform, None);
}

fn bitmap_to_pixmap(bitmap: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(bitmap.width(), bitmap.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(bitmap.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

fn draw_image(pixmap: &mut Pixmap, object: &AnnotationObject, image: &ImageProps, multiplier: f32) {
    let Some(source) = bitmap_to_pixmap(&image.bitmap) else {
        return;
    };

    let scale = image.scale * multiplier;
    let transform = Transform::from_row(
        scale,
        0.0,
        0.0,
        scale,
        object.position.x * multiplier,
        object.position.y * multiplier,
    );
    let paint = PixmapPaint {
        opacity: object.opacity(),
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };

    pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
}

fn draw_text(
    pixmap: &mut Pixmap,
    object: &AnnotationObject,
    text: &TextProps,
    multiplier: f32,
    fonts: &FontBook,
) -> Result<(), OverlayError> {
    let Some(font) = fonts.resolve(&text.font_family) else {
        tracing::warn!(family = %text.font_family, id = %object.id, "no font for text annotation");
        return Err(OverlayError::MissingFont(text.font_family.clone()));
    };

    let scaled = font.as_scaled(PxScale::from(text.font_size * multiplier));
    let line_height = text.line_height() * multiplier;
    let alpha = text.fill.a as f32 / 255.0 * object.opacity();
    let (width, height) = (pixmap.width() as i32, pixmap.height() as i32);
    let pixels = pixmap.pixels_mut();

    for (line_index, line) in text.content.split('\n').enumerate() {
        let baseline =
            object.position.y * multiplier + line_index as f32 * line_height + scaled.ascent();
        let mut caret = point(object.position.x * multiplier, baseline);
        let mut previous: Option<GlyphId> = None;

        for ch in line.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = previous {
                caret.x += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scaled.scale(), caret);
            caret.x += scaled.h_advance(id);
            previous = Some(id);

            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i32 + gx as i32;
                let y = bounds.min.y as i32 + gy as i32;
                if x < 0 || y < 0 || x >= width || y >= height {
                    return;
                }
                let index = (y * width + x) as usize;
                blend(&mut pixels[index], text.fill, coverage * alpha);
            });
        }
    }

    Ok(())
}

/// Source-over blend of a solid color at `alpha` onto a premultiplied pixel
fn blend(dst: &mut PremultipliedColorU8, color: Color, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let inverse = 1.0 - alpha;
    let out_a = (alpha * 255.0 + dst.alpha() as f32 * inverse).round().min(255.0);
    let channel = |src: u8, dst: u8| -> u8 {
        (src as f32 * alpha + dst as f32 * inverse).round().min(out_a) as u8
    };

    let blended = PremultipliedColorU8::from_rgba(
        channel(color.r, dst.red()),
        channel(color.g, dst.green()),
        channel(color.b, dst.blue()),
        out_a as u8,
    );
    if let Some(blended) = blended {
        *dst = blended;
    }
}

fn draw_selection(pixmap: &mut Pixmap, object: &AnnotationObject, transform: Transform) {
    let bounds = object.bounds();
    let Some(rect) = Rect::from_xywh(bounds.x, bounds.y, bounds.width, bounds.height) else {
        return;
    };

    let mut paint = Paint::default();
    paint.set_color(skia_color(SELECTION_BORDER, 1.0));
    let stroke = Stroke { width: 1.0, ..Stroke::default() };
    pixmap.stroke_path(&PathBuilder::from_rect(rect), &paint, &stroke, transform, None);

    let half = HANDLE_SIZE / 2.0;
    let corners = [
        (rect.left(), rect.top()),
        (rect.right(), rect.top()),
        (rect.left(), rect.bottom()),
        (rect.right(), rect.bottom()),
    ];
    for (x, y) in corners {
        if let Some(handle) = Rect::from_xywh(x - half, y - half, HANDLE_SIZE, HANDLE_SIZE) {
            pixmap.fill_rect(handle, &paint, transform, None);
        }
    }
}

fn pixmap_to_image(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{AnnotationId, Point, TextProps};
    use crate::scene::{Brush, Interaction};
    use std::sync::Arc;

    fn drawing_scene() -> OverlayScene {
        let mut scene = OverlayScene::new(100, 80);
        scene.set_interaction(Interaction {
            selection_enabled: false,
            objects_interactive: false,
            drawing: Some(Brush { color: Color::rgb(0xef, 0x44, 0x44), width: 3.0 }),
        });
        scene
    }

    #[test]
    fn empty_scene_is_transparent() {
        let scene = OverlayScene::new(40, 30);
        let image = rasterize(&scene, 1.0, &FontBook::new()).expect("rasterize");

        assert_eq!(image.dimensions(), (40, 30));
        assert!(image.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn multiplier_scales_output() {
        let scene = OverlayScene::new(40, 30);
        let image = rasterize(&scene, 2.0, &FontBook::new()).expect("rasterize");
        assert_eq!(image.dimensions(), (80, 60));
    }

    #[test]
    fn zero_sized_scene_fails() {
        let scene = OverlayScene::new(0, 10);
        let err = rasterize(&scene, 1.0, &FontBook::new()).expect_err("no surface");
        assert!(matches!(err, OverlayError::Surface { width: 0, height: 10 }));
    }

    #[test]
    fn path_pixels_use_brush_color() {
        let mut scene = drawing_scene();
        scene.begin_stroke(Point::new(10.0, 40.0));
        scene.extend_stroke(Point::new(90.0, 40.0));
        scene.finish_stroke().expect("path");

        let image = rasterize(&scene, 1.0, &FontBook::new()).expect("rasterize");
        let pixel = image.get_pixel(50, 40);
        assert_eq!(pixel.0, [0xef, 0x44, 0x44, 255]);
        assert_eq!(image.get_pixel(50, 10).0[3], 0);
    }

    #[test]
    fn image_object_is_scaled_and_placed() {
        let mut scene = OverlayScene::new(100, 100);
        let bitmap = Arc::new(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 255, 255])));
        scene.add(AnnotationObject::new(
            Point::new(20.0, 20.0),
            AnnotationKind::Image(ImageProps::scaled_to_width(bitmap, 40.0)),
        ));

        let image = rasterize(&scene, 1.0, &FontBook::new()).expect("rasterize");
        assert_eq!(image.get_pixel(40, 40).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(70, 70).0[3], 0);
    }

    fn text_scene() -> (OverlayScene, AnnotationId) {
        let mut scene = OverlayScene::new(200, 100);
        let id = scene.add(AnnotationObject::new(
            Point::new(20.0, 20.0),
            AnnotationKind::Text(TextProps {
                content: "Edit me".to_owned(),
                font_family: "Arial".to_owned(),
                font_size: 24.0,
                fill: Color::BLACK,
            }),
        ));
        (scene, id)
    }

    fn is_selection_border(pixel: &Rgba<u8>) -> bool {
        pixel.0 == [178, 204, 255, 255]
    }

    #[test]
    fn text_renders_with_embedded_face() {
        let (scene, _) = text_scene();
        let image = rasterize(&scene, 1.0, &FontBook::new()).expect("rasterize");

        let inked = image
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[3] > 128 && p.0[0] < 64)
            .map(|(x, y, _)| (x, y))
            .collect::<Vec<_>>();
        assert!(inked.len() > 50, "glyph coverage too small: {}", inked.len());
        assert!(inked.iter().all(|&(x, y)| (20..130).contains(&x) && (20..60).contains(&y)));
    }

    #[test]
    fn selection_border_only_when_active() {
        let (mut scene, id) = text_scene();
        let fonts = FontBook::new();

        let plain = rasterize(&scene, 1.0, &fonts).expect("rasterize");
        assert!(!plain.pixels().any(is_selection_border));

        scene.set_active(id);
        let selected = rasterize(&scene, 1.0, &fonts).expect("rasterize");
        assert!(selected.pixels().any(is_selection_border));
    }

    #[test]
    fn blend_onto_transparent_keeps_color() {
        let mut pixel = PremultipliedColorU8::TRANSPARENT;
        blend(&mut pixel, Color::rgb(200, 100, 50), 1.0);
        assert_eq!(
            (pixel.red(), pixel.green(), pixel.blue(), pixel.alpha()),
            (200, 100, 50, 255)
        );
    }
}
