use crate::geom::point::Point;
use std::io::{self, Write};

#[derive(Clone, Copy, Debug)]
pub struct GridDims {
    pub x_grids: u32,
    pub y_grids: u32,
    pub layers: u32,
}

/// Default edge budgets, one entry per layer. `horizontal` applies to
/// X-axis edges, `vertical` to Y-axis edges; vias are uncapped.
#[derive(Clone, Debug, Default)]
pub struct LayerCapacity {
    pub vertical: Vec<u32>,
    pub horizontal: Vec<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct DesignRules {
    pub minimum_width: Vec<u32>,
    pub minimum_spacing: Vec<u32>,
    pub via_spacing: Vec<u32>,
}

#[derive(Clone, Copy, Debug)]
pub struct TileInfo {
    pub lower_left_x: i32,
    pub lower_left_y: i32,
    pub tile_width: i32,
    pub tile_height: i32,
}

/// A connection point in physical coordinates. The layer is zero-based
/// internally; the file format is one-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pin {
    pub x: i32,
    pub y: i32,
    pub layer: u32,
}

#[derive(Clone, Debug)]
pub struct Net {
    pub name: String,
    pub id: i32,
    pub num_pins: usize,
    pub minimum_width: u32,
    pub pins: Vec<Pin>,
}

/// Overrides the capacity of the single edge between two adjacent tiles.
/// Layers are zero-based internally.
#[derive(Clone, Copy, Debug)]
pub struct CapacityAdjustment {
    pub col_start: u32,
    pub row_start: u32,
    pub layer_start: u32,
    pub col_end: u32,
    pub row_end: u32,
    pub layer_end: u32,
    pub adjusted_capacity: u32,
}

/// One physical wire segment of a routed net, used for rendering.
/// A via shows up as a zero-length segment (`p1 == p2`).
#[derive(Clone, Copy, Debug)]
pub struct RouteSegment {
    pub layer: u32,
    pub p1: Point<i32>,
    pub p2: Point<i32>,
}

/// The routing problem as loaded from a `.gr` file. Read-only once
/// `order_for_routing` has run.
#[derive(Clone, Debug)]
pub struct RoutingProblem {
    pub grid: GridDims,
    pub capacity: LayerCapacity,
    pub rules: DesignRules,
    pub tiles: TileInfo,
    pub nets: Vec<Net>,
    pub adjustments: Vec<CapacityAdjustment>,
}

impl RoutingProblem {
    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    pub fn layer_count(&self) -> usize {
        self.grid.layers as usize
    }

    /// Maps a physical point to its tile, clamped to the grid so that pins
    /// sitting exactly on the upper boundary land in the last tile.
    pub fn tile_of_point(&self, x: i32, y: i32) -> (u32, u32) {
        let tx = (x - self.tiles.lower_left_x).div_euclid(self.tiles.tile_width);
        let ty = (y - self.tiles.lower_left_y).div_euclid(self.tiles.tile_height);
        let tx = (tx.max(0) as u32).min(self.grid.x_grids - 1);
        let ty = (ty.max(0) as u32).min(self.grid.y_grids - 1);
        (tx, ty)
    }

    pub fn center_of_tile(&self, tx: u32, ty: u32) -> Point<i32> {
        debug_assert!(tx < self.grid.x_grids && ty < self.grid.y_grids);
        Point::new(
            self.tiles.lower_left_x + tx as i32 * self.tiles.tile_width + self.tiles.tile_width / 2,
            self.tiles.lower_left_y + ty as i32 * self.tiles.tile_height
                + self.tiles.tile_height / 2,
        )
    }

    /// Semantic validation of a loaded problem. Everything here is a hard
    /// input error that must abort before routing starts.
    pub fn validate(&self) -> Result<(), String> {
        let layers = self.layer_count();

        if self.grid.x_grids == 0 || self.grid.y_grids == 0 || self.grid.layers == 0 {
            return Err("invalid grid dimensions".to_string());
        }

        if self.capacity.vertical.len() != layers || self.capacity.horizontal.len() != layers {
            return Err("capacity table size does not match the number of layers".to_string());
        }

        if self.rules.minimum_width.len() != layers
            || self.rules.minimum_spacing.len() != layers
            || self.rules.via_spacing.len() != layers
        {
            return Err("design rule table size does not match the number of layers".to_string());
        }

        if self.tiles.tile_width <= 0 || self.tiles.tile_height <= 0 {
            return Err("invalid tile dimensions".to_string());
        }

        let max_x = self.tiles.lower_left_x + self.grid.x_grids as i32 * self.tiles.tile_width;
        let max_y = self.tiles.lower_left_y + self.grid.y_grids as i32 * self.tiles.tile_height;

        for net in &self.nets {
            if net.num_pins != net.pins.len() {
                return Err(format!(
                    "net '{}': pin count {} does not match header value {}",
                    net.name,
                    net.pins.len(),
                    net.num_pins
                ));
            }

            for pin in &net.pins {
                if pin.layer >= self.grid.layers {
                    return Err(format!("net '{}': pin layer out of range", net.name));
                }
                if pin.x < self.tiles.lower_left_x
                    || pin.x > max_x
                    || pin.y < self.tiles.lower_left_y
                    || pin.y > max_y
                {
                    return Err(format!("net '{}': pin coordinates out of bounds", net.name));
                }
            }
        }

        for adj in &self.adjustments {
            if adj.col_start >= self.grid.x_grids
                || adj.row_start >= self.grid.y_grids
                || adj.layer_start >= self.grid.layers
                || adj.col_end >= self.grid.x_grids
                || adj.row_end >= self.grid.y_grids
                || adj.layer_end >= self.grid.layers
            {
                return Err("capacity adjustment coordinates out of bounds".to_string());
            }
        }

        Ok(())
    }

    /// Orders nets and pins for the router: per net, pins ascending by
    /// Manhattan distance to the net centroid (so pin #0 is the most
    /// central one, which the router picks as the search root), then nets
    /// ascending by pin count.
    pub fn order_for_routing(&mut self) {
        let mut total_pins = 0usize;

        for net in &mut self.nets {
            total_pins += net.pins.len();
            if net.pins.is_empty() {
                continue;
            }

            let inv = 1.0 / net.pins.len() as f32;
            let mut mx = 0.0f32;
            let mut my = 0.0f32;
            let mut mz = 0.0f32;
            for pin in &net.pins {
                mx += pin.x as f32;
                my += pin.y as f32;
                mz += pin.layer as f32;
            }
            mx *= inv;
            my *= inv;
            mz *= inv;

            let spread = |pin: &Pin| {
                (pin.x as f32 - mx).abs()
                    + (pin.y as f32 - my).abs()
                    + (pin.layer as f32 - mz).abs()
            };
            net.pins.sort_by(|a, b| spread(a).total_cmp(&spread(b)));
        }

        self.nets.sort_by_key(|net| net.pins.len());

        if !self.nets.is_empty() {
            log::info!(
                "Ordered {} nets for routing, average net size {:.2}",
                self.nets.len(),
                total_pins as f64 / self.nets.len() as f64
            );
        }
    }

    /// Re-emits the problem in the input format (layers one-based again).
    pub fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "grid\t{} {} {}",
            self.grid.x_grids, self.grid.y_grids, self.grid.layers
        )?;

        write!(out, "vertical capacity\t")?;
        for cap in &self.capacity.vertical {
            write!(out, " {}", cap)?;
        }
        writeln!(out)?;

        write!(out, "horizontal capacity\t")?;
        for cap in &self.capacity.horizontal {
            write!(out, " {}", cap)?;
        }
        writeln!(out)?;

        write!(out, "minimum width\t")?;
        for width in &self.rules.minimum_width {
            write!(out, " {}", width)?;
        }
        writeln!(out)?;

        write!(out, "minimum spacing\t")?;
        for spacing in &self.rules.minimum_spacing {
            write!(out, " {}", spacing)?;
        }
        writeln!(out)?;

        write!(out, "via spacing\t")?;
        for spacing in &self.rules.via_spacing {
            write!(out, " {}", spacing)?;
        }
        writeln!(out)?;

        writeln!(
            out,
            "{} {} {} {}",
            self.tiles.lower_left_x,
            self.tiles.lower_left_y,
            self.tiles.tile_width,
            self.tiles.tile_height
        )?;
        writeln!(out)?;

        writeln!(out, "num net {}", self.nets.len())?;
        for net in &self.nets {
            writeln!(
                out,
                "{} {} {} {}",
                net.name, net.id, net.num_pins, net.minimum_width
            )?;
            for pin in &net.pins {
                writeln!(out, "{} {} {}", pin.x, pin.y, pin.layer + 1)?;
            }
        }
        writeln!(out)?;

        writeln!(out, "{}", self.adjustments.len())?;
        for adj in &self.adjustments {
            writeln!(
                out,
                "{} {} {}\t{} {} {}\t{}",
                adj.col_start,
                adj.row_start,
                adj.layer_start + 1,
                adj.col_end,
                adj.row_end,
                adj.layer_end + 1,
                adj.adjusted_capacity
            )?;
        }

        Ok(())
    }
}
