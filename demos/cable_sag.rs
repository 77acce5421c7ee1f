//! Static shape of a sagging winch cable
//!
//! Solves the same cable with all three shape models and compares the
//! recovered unstrained length and end force: a 5 m steel cable spanning
//! 4 m across and 3 m down, carrying a 50 kg payload.

use cablesim::cable::ShapeModel;
use cablesim::{solve_cable_shape_with, CableProperties, ShapeOptions};
use nalgebra::Vector2;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Cable Sag - Static Shape Solvers");
    println!("================================");
    println!();

    // 10 mm^2 steel cable
    let properties = CableProperties::new(1e11, 1e-4, 7850.0);
    let endpoint = Vector2::new(4.0, -3.0);
    let mass = 50.0;

    println!("Endpoint: ({}, {}) m, payload {} kg", endpoint.x, endpoint.y, mass);
    println!(
        "Cable: EA = {:.1e} N, w = {:.3} N/m",
        properties.axial_stiffness(),
        properties.weight_per_length()
    );
    println!();

    let models = [
        ("simple", ShapeModel::Simple),
        ("catenary", ShapeModel::Catenary),
        ("finite segment", ShapeModel::FiniteSegment { nodes: 20 }),
    ];

    println!(
        "{:>16} {:>10} {:>12} {:>12} {:>10}",
        "Model", "Length", "Fx", "Fz", "|F|"
    );
    println!(
        "{:-<16} {:-<10} {:-<12} {:-<12} {:-<10}",
        "", "", "", "", ""
    );

    for (name, model) in models {
        let options = ShapeOptions::new().with_model(model).with_samples(11);
        let shape = solve_cable_shape_with(endpoint, mass, &properties, &options)?;
        println!(
            "{:>16} {:10.4} {:12.3} {:12.3} {:10.3}",
            name,
            shape.length,
            shape.force.x,
            shape.force.y,
            shape.force.norm()
        );
    }

    // Sampled catenary profile against the straight chord
    let options = ShapeOptions::new().with_samples(11);
    let shape = solve_cable_shape_with(endpoint, mass, &properties, &options)?;

    println!();
    println!("{:>10} {:>10} {:>10} {:>10}", "x", "z", "chord z", "sag");
    println!("{:-<10} {:-<10} {:-<10} {:-<10}", "", "", "", "");
    for p in &shape.shape {
        let chord_z = -0.75 * p.x;
        println!(
            "{:10.4} {:10.4} {:10.4} {:10.4}",
            p.x,
            p.y,
            chord_z,
            chord_z - p.y
        );
    }

    Ok(())
}
