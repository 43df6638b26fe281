use splinefit::{AxisBounds, BuildError, Builder, KnotSpacing, SampleTable, Smoothing};

#[test]
fn equidistant_bounds_and_padding_shape_the_knot_vector() {
    let mut table = SampleTable::new();
    for x in 0..5 {
        let x = x as f64;
        table.add_sample(&[x], x * x).expect("sample");
    }

    let spline = Builder::new(&table)
        .degree(3)
        .expect("valid degree")
        .knot_spacing(KnotSpacing::Equidistant)
        .bounds(vec![AxisBounds::new(-1.0, 5.0)])
        .expect("matching dimensionality")
        .padding(0.1)
        .expect("valid padding")
        .build()
        .expect("build should succeed");

    // Bounds [-1, 5] padded by 10% of their width on each side.
    let knots = spline.knot_vector(0);
    assert_eq!(knots.len(), 9);
    for i in 0..4 {
        assert!((knots[i] - -1.6).abs() < 1e-12, "knot {i} = {}", knots[i]);
    }
    for i in 5..9 {
        assert!((knots[i] - 5.6).abs() < 1e-12, "knot {i} = {}", knots[i]);
    }
}

#[test]
fn column_major_ingestion_feeds_a_bilinear_fit() {
    // z = x + 2y on a 3x3 grid, supplied as flat column-major data with
    // the value column last.
    let mut columns = (Vec::new(), Vec::new(), Vec::new());
    for i in 0..3 {
        for j in 0..3 {
            let (x, y) = (i as f64, j as f64);
            columns.0.push(x);
            columns.1.push(y);
            columns.2.push(x + 2.0 * y);
        }
    }
    let mut flat = Vec::new();
    flat.extend_from_slice(&columns.0);
    flat.extend_from_slice(&columns.1);
    flat.extend_from_slice(&columns.2);

    let mut table = SampleTable::new();
    table
        .add_samples_col_major(&flat, 9, 2)
        .expect("well-formed block");
    assert!(table.is_grid_complete());

    let spline = Builder::new(&table)
        .degrees_per_axis(vec![1, 1])
        .expect("valid degrees")
        .build()
        .expect("build should succeed");

    // Piecewise-linear tensor splines reproduce the plane exactly.
    for &(x, y) in &[(0.5, 0.5), (1.25, 0.75), (2.0, 1.5)] {
        let fitted = spline.eval(&[x, y]).expect("matching dimensions");
        assert!(
            (fitted - (x + 2.0 * y)).abs() < 1e-10,
            "plane not reproduced at ({x}, {y}): {fitted}"
        );
    }
}

#[test]
fn pspline_needs_three_basis_functions_per_axis() {
    let mut table = SampleTable::new();
    table.add_sample(&[0.0], 0.0).expect("sample");
    table.add_sample(&[1.0], 1.0).expect("sample");

    match Builder::new(&table)
        .degree(1)
        .expect("valid degree")
        .smoothing(Smoothing::PSpline)
        .build()
    {
        Err(BuildError::PenaltyNeedsThreeBasis { axis: 0, found: 2 }) => {}
        other => panic!("Expected PenaltyNeedsThreeBasis, got {other:?}"),
    }
}

#[test]
fn experimental_spacing_builds_a_capped_knot_vector() {
    let mut table = SampleTable::new();
    for i in 0..40 {
        let x = i as f64;
        table.add_sample(&[x], (0.3 * x).cos()).expect("sample");
    }

    let spline = Builder::new(&table)
        .degree(3)
        .expect("valid degree")
        .knot_spacing(KnotSpacing::Experimental)
        .build()
        .expect("build should succeed");

    // Segment cap of 10 leaves 6 interior knots: 6 + 2(p+1) knots for
    // 10 basis functions.
    assert_eq!(spline.knot_vector(0).len(), 14);
    assert_eq!(spline.num_coefficients(), 10);

    // Far fewer coefficients than samples: a regression, not an
    // interpolation, but still close to the smooth signal.
    for sample in table.samples() {
        let fitted = spline.eval(sample.x()).expect("matching dimensions");
        assert!((fitted - sample.y()).abs() < 0.1);
    }
}
