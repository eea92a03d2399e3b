use crate::db::core::{
    CapacityAdjustment, DesignRules, GridDims, LayerCapacity, Net, Pin, RoutingProblem, TileInfo,
};
use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};

/// Loads a routing problem from a `.gr` file.
pub fn parse(path: &Path) -> Result<RoutingProblem> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    parse_str(&text).with_context(|| format!("failed to parse '{}'", path.display()))
}

/// Parses the whitespace-token stream of the `.gr` format. Section keywords
/// are consumed but not checked, matching the tolerant reference reader.
pub fn parse_str(text: &str) -> Result<RoutingProblem> {
    let mut tokens = Tokens::new(text);

    tokens.skip_keywords(1)?; // grid
    let grid = GridDims {
        x_grids: tokens.int("grid x dimension")?,
        y_grids: tokens.int("grid y dimension")?,
        layers: tokens.int("layer count")?,
    };
    let layers = grid.layers as usize;

    tokens.skip_keywords(2)?; // vertical capacity
    let vertical = tokens.int_list(layers, "vertical capacity")?;
    tokens.skip_keywords(2)?; // horizontal capacity
    let horizontal = tokens.int_list(layers, "horizontal capacity")?;

    tokens.skip_keywords(2)?; // minimum width
    let minimum_width = tokens.int_list(layers, "minimum width")?;
    tokens.skip_keywords(2)?; // minimum spacing
    let minimum_spacing = tokens.int_list(layers, "minimum spacing")?;
    tokens.skip_keywords(2)?; // via spacing
    let via_spacing = tokens.int_list(layers, "via spacing")?;

    let tiles = TileInfo {
        lower_left_x: tokens.int("tile origin x")?,
        lower_left_y: tokens.int("tile origin y")?,
        tile_width: tokens.int("tile width")?,
        tile_height: tokens.int("tile height")?,
    };

    tokens.skip_keywords(2)?; // num net
    let num_nets: usize = tokens.int("net count")?;
    let mut nets = Vec::with_capacity(num_nets);
    for _ in 0..num_nets {
        let name = tokens.word("net name")?.to_string();
        let id: i32 = tokens.int("net id")?;
        let num_pins: usize = tokens.int("net pin count")?;
        let minimum_width: u32 = tokens.int("net minimum width")?;

        let mut pins = Vec::with_capacity(num_pins);
        for _ in 0..num_pins {
            pins.push(Pin {
                x: tokens.int("pin x")?,
                y: tokens.int("pin y")?,
                layer: tokens.layer("pin layer")?,
            });
        }

        nets.push(Net {
            name,
            id,
            num_pins,
            minimum_width,
            pins,
        });
    }

    let num_adjustments: usize = tokens.int("capacity adjustment count")?;
    let mut adjustments = Vec::with_capacity(num_adjustments);
    for _ in 0..num_adjustments {
        adjustments.push(CapacityAdjustment {
            col_start: tokens.int("adjustment start column")?,
            row_start: tokens.int("adjustment start row")?,
            layer_start: tokens.layer("adjustment start layer")?,
            col_end: tokens.int("adjustment end column")?,
            row_end: tokens.int("adjustment end row")?,
            layer_end: tokens.layer("adjustment end layer")?,
            adjusted_capacity: tokens.int("adjusted capacity")?,
        });
    }

    Ok(RoutingProblem {
        grid,
        capacity: LayerCapacity {
            vertical,
            horizontal,
        },
        rules: DesignRules {
            minimum_width,
            minimum_spacing,
            via_spacing,
        },
        tiles,
        nets,
        adjustments,
    })
}

struct Tokens<'a> {
    iter: SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            iter: text.split_whitespace(),
        }
    }

    fn word(&mut self, what: &str) -> Result<&'a str> {
        self.iter
            .next()
            .ok_or_else(|| anyhow!("unexpected end of input while reading {}", what))
    }

    fn skip_keywords(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.word("section keyword")?;
        }
        Ok(())
    }

    fn int<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let word = self.word(what)?;
        word.parse()
            .map_err(|_| anyhow!("expected integer for {}, found '{}'", what, word))
    }

    fn int_list(&mut self, count: usize, what: &str) -> Result<Vec<u32>> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.int(what)?);
        }
        Ok(values)
    }

    /// Reads a one-based layer number and converts it to the zero-based
    /// form used everywhere internally.
    fn layer(&mut self, what: &str) -> Result<u32> {
        let one_based: u32 = self.int(what)?;
        one_based
            .checked_sub(1)
            .ok_or_else(|| anyhow!("{} must be one-based, found 0", what))
    }
}
