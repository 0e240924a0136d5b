//! Benchmarks the ring-enumeration cost of `diamond_search` against a
//! mostly-empty row and a densely packed one, since ring count (and thus
//! `bin_search` calls) grows with how far the target is from a free slot.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dp_config::LegalizeOptions;
use dp_db::{Design, InMemoryDesign};
use dp_geometry::{Cell, MacroId, MacroPin, Macro, Rect};
use dp_search::diamond_search;

fn sparse_design() -> InMemoryDesign {
    let core = Rect::new(0, 0, 4000, 400);
    let mut d = InMemoryDesign::new(10, 20, core);
    d.macros.push(Macro {
        name: "BUF".into(),
        width: 10,
        height_rows: 1,
        top_power: None,
        is_multi_row: false,
        pins: vec![MacroPin {
            name: "A".into(),
            geometry: vec![],
        }],
    });
    d
}

fn packed_design() -> InMemoryDesign {
    let mut d = sparse_design();
    // Fill every site in rows 0-3 except a single gap near the right edge,
    // forcing diamond_search to walk several rings outward before it finds
    // it instead of resolving in the first ring it tries.
    for row in 0..4 {
        for x in (0..3980).step_by(10) {
            let mut c = Cell::new_movable(format!("fx{row}_{x}"), MacroId(0), 10, 20, x, row * 20);
            c.is_fixed = true;
            d.cells.push(c);
        }
    }
    d
}

fn bench_diamond_search(c: &mut Criterion) {
    let sparse = sparse_design();
    let sparse_grid = dp_grid::build_grid(&sparse).unwrap();
    let sparse_geometry = sparse.geometry();
    let opts = LegalizeOptions::default();
    let cell = Cell::new_movable("probe", MacroId(0), 10, 20, 2000, 200);

    c.bench_function("diamond_search_empty_core", |b| {
        b.iter(|| {
            diamond_search(
                black_box(&sparse_grid),
                black_box(&cell),
                &sparse.macros,
                &sparse_geometry,
                None,
                &opts,
                2000,
                200,
                0.0,
                0,
            )
        })
    });

    let packed = packed_design();
    let packed_grid = dp_grid::build_grid(&packed).unwrap();
    let packed_geometry = packed.geometry();

    c.bench_function("diamond_search_packed_row", |b| {
        b.iter(|| {
            diamond_search(
                black_box(&packed_grid),
                black_box(&cell),
                &packed.macros,
                &packed_geometry,
                None,
                &opts,
                2000,
                0,
                0.9,
                packed.cells.len(),
            )
        })
    });
}

criterion_group!(benches, bench_diamond_search);
criterion_main!(benches);
