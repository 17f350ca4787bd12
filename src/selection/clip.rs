//! Boundary around the polygon-clipping primitive.
//!
//! The boolean algebra itself is delegated to `geo`; this module owns the
//! conversion, the 2-decimal coordinate rounding, and the failure policy: a
//! clipping failure degrades to an empty multi-polygon instead of propagating,
//! so a bad selection never takes the editor down.

use std::panic::{AssertUnwindSafe, catch_unwind};

use geo::{BooleanOps, LineString, MultiPolygon as GeoMultiPolygon, Polygon as GeoPolygon};

use crate::selection::MultiPolygon;
use crate::utils::vector::{Vec2, round2};

#[derive(Clone, Copy, Debug)]
enum BoolOp {
    Union,
    Difference,
    Intersection,
    Xor,
}

pub fn union(a: &MultiPolygon, b: &MultiPolygon) -> MultiPolygon {
    run(a, b, BoolOp::Union)
}

pub fn difference(a: &MultiPolygon, b: &MultiPolygon) -> MultiPolygon {
    run(a, b, BoolOp::Difference)
}

pub fn intersection(a: &MultiPolygon, b: &MultiPolygon) -> MultiPolygon {
    run(a, b, BoolOp::Intersection)
}

pub fn xor(a: &MultiPolygon, b: &MultiPolygon) -> MultiPolygon {
    run(a, b, BoolOp::Xor)
}

fn run(a: &MultiPolygon, b: &MultiPolygon, op: BoolOp) -> MultiPolygon {
    let ga = to_geo(a);
    let gb = to_geo(b);
    let result = catch_unwind(AssertUnwindSafe(|| match op {
        BoolOp::Union => ga.union(&gb),
        BoolOp::Difference => ga.difference(&gb),
        BoolOp::Intersection => ga.intersection(&gb),
        BoolOp::Xor => ga.xor(&gb),
    }));
    match result {
        Ok(out) => from_geo(&out),
        Err(_) => {
            log::warn!("polygon {op:?} failed, falling back to empty selection");
            MultiPolygon::default()
        }
    }
}

fn to_geo(mp: &MultiPolygon) -> GeoMultiPolygon<f64> {
    let polygons = mp
        .polygons
        .iter()
        .filter_map(|rings| {
            let mut iter = rings.iter().filter(|r| r.len() >= 3);
            let exterior = iter.next()?;
            let interiors = iter.map(|r| ring_to_geo(r)).collect();
            Some(GeoPolygon::new(ring_to_geo(exterior), interiors))
        })
        .collect();
    GeoMultiPolygon(polygons)
}

fn ring_to_geo(ring: &[Vec2]) -> LineString<f64> {
    LineString::from(
        ring.iter()
            .map(|p| (p.x as f64, p.y as f64))
            .collect::<Vec<_>>(),
    )
}

fn from_geo(mp: &GeoMultiPolygon<f64>) -> MultiPolygon {
    MultiPolygon {
        polygons: mp
            .0
            .iter()
            .map(|poly| {
                std::iter::once(poly.exterior())
                    .chain(poly.interiors().iter())
                    .map(ring_from_geo)
                    .collect()
            })
            .collect(),
    }
}

fn ring_from_geo(ls: &LineString<f64>) -> Vec<Vec2> {
    let mut coords = &ls.0[..];
    // geo closes rings explicitly; our rings keep the closing edge implicit.
    if coords.len() > 1 && coords.first() == coords.last() {
        coords = &coords[..coords.len() - 1];
    }
    coords
        .iter()
        .map(|c| Vec2::new(round2(c.x as f32), round2(c.y as f32)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_of_disjoint_rects_keeps_both() {
        let a = MultiPolygon::from_rect(0.0, 0.0, 10.0, 10.0);
        let b = MultiPolygon::from_rect(20.0, 0.0, 10.0, 10.0);
        let out = union(&a, &b);
        assert!(out.contains(Vec2::new(5.0, 5.0)));
        assert!(out.contains(Vec2::new(25.0, 5.0)));
        assert!(!out.contains(Vec2::new(15.0, 5.0)));
    }

    #[test]
    fn difference_removes_overlap() {
        let a = MultiPolygon::from_rect(0.0, 0.0, 20.0, 10.0);
        let b = MultiPolygon::from_rect(10.0, 0.0, 20.0, 10.0);
        let out = difference(&a, &b);
        assert!(out.contains(Vec2::new(5.0, 5.0)));
        assert!(!out.contains(Vec2::new(15.0, 5.0)));
    }

    #[test]
    fn intersection_keeps_only_overlap() {
        let a = MultiPolygon::from_rect(0.0, 0.0, 20.0, 10.0);
        let b = MultiPolygon::from_rect(10.0, 0.0, 20.0, 10.0);
        let out = intersection(&a, &b);
        assert!(!out.contains(Vec2::new(5.0, 5.0)));
        assert!(out.contains(Vec2::new(15.0, 5.0)));
        assert!(!out.contains(Vec2::new(25.0, 5.0)));
    }

    #[test]
    fn difference_consuming_everything_yields_empty() {
        let a = MultiPolygon::from_rect(5.0, 5.0, 10.0, 10.0);
        let b = MultiPolygon::from_rect(0.0, 0.0, 100.0, 100.0);
        assert!(difference(&a, &b).is_empty());
    }

    #[test]
    fn results_are_rounded_to_two_decimals() {
        let a = MultiPolygon {
            polygons: vec![vec![vec![
                Vec2::new(0.123_456, 0.0),
                Vec2::new(10.987_654, 0.0),
                Vec2::new(10.987_654, 10.0),
                Vec2::new(0.123_456, 10.0),
            ]]],
        };
        let out = union(&a, &MultiPolygon::default());
        for poly in &out.polygons {
            for ring in poly {
                for p in ring {
                    assert_eq!(p.x, round2(p.x));
                    assert_eq!(p.y, round2(p.y));
                }
            }
        }
    }
}
