use rand::Rng;
use std::fs::File;
use std::io::{BufWriter, Write};

/// Writes a random routing benchmark in the `.gr` input format.
pub fn generate_random_problem(
    filename: &str,
    x_grids: u32,
    y_grids: u32,
    layers: u32,
    num_nets: usize,
    pins_per_net: usize,
) -> std::io::Result<()> {
    let file = File::create(filename)?;
    let mut out = BufWriter::new(file);
    let mut rng = rand::thread_rng();

    let tile = 10;
    let span_x = x_grids as i32 * tile;
    let span_y = y_grids as i32 * tile;

    log::info!(
        "Generating benchmark: {}x{}x{} grid, {} nets of up to {} pins",
        x_grids,
        y_grids,
        layers,
        num_nets,
        pins_per_net
    );

    writeln!(out, "grid\t{} {} {}", x_grids, y_grids, layers)?;

    write!(out, "vertical capacity\t")?;
    for _ in 0..layers {
        write!(out, " {}", rng.gen_range(20..=40))?;
    }
    writeln!(out)?;

    write!(out, "horizontal capacity\t")?;
    for _ in 0..layers {
        write!(out, " {}", rng.gen_range(20..=40))?;
    }
    writeln!(out)?;

    write!(out, "minimum width\t")?;
    for _ in 0..layers {
        write!(out, " 1")?;
    }
    writeln!(out)?;

    write!(out, "minimum spacing\t")?;
    for _ in 0..layers {
        write!(out, " 1")?;
    }
    writeln!(out)?;

    write!(out, "via spacing\t")?;
    for _ in 0..layers {
        write!(out, " 1")?;
    }
    writeln!(out)?;

    writeln!(out, "0 0 {} {}", tile, tile)?;

    writeln!(out, "num net {}", num_nets)?;
    for i in 0..num_nets {
        let pins = rng.gen_range(2..=pins_per_net.max(2));
        writeln!(out, "net{} {} {} 1", i, i, pins)?;
        for _ in 0..pins {
            writeln!(
                out,
                "{} {} {}",
                rng.gen_range(0..span_x),
                rng.gen_range(0..span_y),
                rng.gen_range(1..=layers)
            )?;
        }
    }

    writeln!(out, "0")?;

    Ok(())
}
