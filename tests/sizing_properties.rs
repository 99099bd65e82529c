//! Dimension inference and canvas sizing across a spread of inputs

use markshot::normalize::{normalize_svg, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use markshot::rendering::plan::enforce_min_dimension;
use markshot::{Calibration, RasterPlan};

const SIZES: &[(f64, f64)] = &[(1.0, 1.0), (100.0, 50.0), (400.0, 300.0), (800.0, 600.0), (1920.0, 1080.0), (12.5, 900.0)];

#[test]
fn explicit_attributes_are_used_exactly() {
    for &(w, h) in SIZES {
        let svg = format!(r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 5 5"/>"#, w, h);
        let s = normalize_svg(&svg).unwrap();
        assert_eq!((s.width(), s.height()), (w, h), "for {}x{}", w, h);
    }
}

#[test]
fn view_box_components_are_used() {
    for &(w, h) in SIZES {
        let svg = format!(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="-3 7 {} {}"/>"#, w, h);
        let s = normalize_svg(&svg).unwrap();
        assert_eq!((s.width(), s.height()), (w, h), "for {}x{}", w, h);
    }
}

#[test]
fn bare_svg_defaults_to_800_by_600() {
    let s = normalize_svg(r#"<svg xmlns="http://www.w3.org/2000/svg"><g/></svg>"#).unwrap();
    assert_eq!((s.width(), s.height()), (DEFAULT_WIDTH, DEFAULT_HEIGHT));
}

#[test]
fn second_normalization_keeps_dimensions() {
    for &(w, h) in SIZES {
        let svg = format!(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}"/>"#, w, h);
        let once = normalize_svg(&svg).unwrap();
        let twice = normalize_svg(once.markup()).unwrap();
        assert_eq!((once.width(), once.height()), (twice.width(), twice.height()));
    }
}

#[test]
fn minimum_dimension_preserves_aspect_ratio() {
    for &(w, h) in SIZES {
        let (sw, sh) = enforce_min_dimension(w, h, 300.0);
        assert!(sw.min(sh) >= 300.0 - 1e-9, "for {}x{}", w, h);
        assert!((sw / sh - w / h).abs() < 1e-9, "for {}x{}", w, h);
        if w.min(h) < 300.0 {
            assert!((sw.min(sh) - 300.0).abs() < 1e-9);
        }
    }
}

#[test]
fn vector_canvas_matches_the_formula() {
    let cal = Calibration::default();
    for &(w, h) in SIZES {
        let plan = RasterPlan::for_vector(w, h, &cal).unwrap();
        let expected_w = ((plan.content_width + 60.0 + 50.0) * 2.0).ceil() as u32;
        let expected_h = ((plan.content_height + 60.0) * 2.0).ceil() as u32;
        assert_eq!((plan.canvas_width_px, plan.canvas_height_px), (expected_w, expected_h));
    }
    let plan = RasterPlan::for_vector(800.0, 600.0, &cal).unwrap();
    assert_eq!((plan.canvas_width_px, plan.canvas_height_px), (1820, 1320));
}
