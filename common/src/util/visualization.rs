use crate::db::core::{RouteSegment, RoutingProblem};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as ImageRect;
use std::path::Path;

/// Renders the routed design: one color per layer, vias as white markers,
/// pins as white dots.
pub fn draw_routed_design(
    problem: &RoutingProblem,
    routes: &[Vec<RouteSegment>],
    filename: &str,
    width: u32,
    height: u32,
) {
    let w = width.max(400);
    let h = height.max(400);
    let mut img = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]));

    let span_x = (problem.grid.x_grids as i32 * problem.tiles.tile_width) as f64;
    let span_y = (problem.grid.y_grids as i32 * problem.tiles.tile_height) as f64;
    if span_x <= 0.0 || span_y <= 0.0 {
        return;
    }

    let scale_x = w as f64 / span_x;
    let scale_y = h as f64 / span_y;

    let map = |x: i32, y: i32| {
        (
            (x - problem.tiles.lower_left_x) as f64 * scale_x,
            h as f64 - (y - problem.tiles.lower_left_y) as f64 * scale_y,
        )
    };

    let colors = [
        // M1: Blue
        Rgba([0, 110, 255, 160]),
        // M2: Red
        Rgba([255, 20, 80, 160]),
        // M3: Green
        Rgba([0, 255, 100, 170]),
        // M4: Gold
        Rgba([255, 215, 0, 170]),
        // M5: Violet
        Rgba([180, 50, 255, 190]),
        // M6: Cyan
        Rgba([0, 240, 255, 190]),
    ];

    let mut segments: Vec<&RouteSegment> = routes.iter().flatten().collect();
    segments.sort_by_key(|s| s.layer);

    for seg in segments {
        let (x1, y1) = map(seg.p1.x, seg.p1.y);
        let (x2, y2) = map(seg.p2.x, seg.p2.y);

        if seg.p1 == seg.p2 {
            let rect = ImageRect::at(x1 as i32 - 1, y1 as i32 - 1).of_size(3, 3);
            draw_filled_rect_mut(&mut img, rect, Rgba([255, 255, 255, 200]));
        } else {
            let color = colors[(seg.layer as usize).min(colors.len() - 1)];
            draw_line_segment_mut(
                &mut img,
                (x1 as f32, y1 as f32),
                (x2 as f32, y2 as f32),
                color,
            );
        }
    }

    let pin_color = Rgba([255, 255, 255, 255]);
    for net in &problem.nets {
        for pin in &net.pins {
            let (px, py) = map(pin.x, pin.y);
            let rect = ImageRect::at(px as i32, py as i32).of_size(2, 2);
            draw_filled_rect_mut(&mut img, rect, pin_color);
        }
    }

    let _ = img.save(Path::new(filename));
}
