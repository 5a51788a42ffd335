//! Raster to polygon conversion.
//!
//! Boundaries are traced along cell edges in pixel space. Every boundary edge
//! keeps the selected cells on its right, and where two rings meet at a
//! corner the trace turns right first, so cells touching only diagonally end
//! up in separate polygons.

use crate::error::{BasinError, Result};
use crate::raster::Raster;
use geo::orient::{Direction, Orient};
use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use ndarray::Array2;
use std::collections::HashMap;

type Vertex = (i64, i64);

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: Vertex,
    to: Vertex,
}

impl Edge {
    fn direction(&self) -> Vertex {
        ((self.to.0 - self.from.0).signum(), (self.to.1 - self.from.1).signum())
    }
}

/// Trace the outline of every cell for which `include` holds.
///
/// No-data cells are never included. The result is in the raster's map
/// coordinates with exteriors counter-clockwise.
pub fn polygonize<F>(raster: &Raster, include: F) -> Result<MultiPolygon<f64>>
where
    F: Fn(f64) -> bool,
{
    let (rows, cols) = raster.shape();
    let selected = Array2::from_shape_fn((rows, cols), |(r, c)| {
        raster.is_valid_at(r, c) && raster.get(r, c).is_some_and(&include)
    });
    let is_in = |r: i64, c: i64| -> bool {
        r >= 0 && c >= 0 && selected.get((r as usize, c as usize)).copied().unwrap_or(false)
    };

    let mut edges = Vec::new();
    for ((r, c), &on) in selected.indexed_iter() {
        if !on {
            continue;
        }
        let (r, c) = (r as i64, c as i64);
        if !is_in(r - 1, c) {
            edges.push(Edge { from: (c, r), to: (c + 1, r) });
        }
        if !is_in(r, c + 1) {
            edges.push(Edge { from: (c + 1, r), to: (c + 1, r + 1) });
        }
        if !is_in(r + 1, c) {
            edges.push(Edge { from: (c + 1, r + 1), to: (c, r + 1) });
        }
        if !is_in(r, c - 1) {
            edges.push(Edge { from: (c, r + 1), to: (c, r) });
        }
    }
    if edges.is_empty() {
        return Err(BasinError::Raster("no cells to polygonize".into()));
    }

    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut exteriors: Vec<Vec<Vertex>> = Vec::new();
    let mut holes: Vec<Vec<Vertex>> = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let ring = trace_ring(start, &edges, &outgoing, &mut used)?;
        for lp in split_loops(ring) {
            let lp = drop_collinear(lp);
            if lp.len() < 4 {
                continue;
            }
            if signed_area2(&lp) > 0 {
                exteriors.push(lp);
            } else {
                holes.push(lp);
            }
        }
    }

    let shells: Vec<Polygon<f64>> = exteriors
        .iter()
        .map(|ring| Polygon::new(to_linestring(ring, |x, y| (x, y)), vec![]))
        .collect();
    let mut interiors: Vec<Vec<&Vec<Vertex>>> = vec![Vec::new(); exteriors.len()];
    for hole in &holes {
        let probe = inner_probe(hole);
        let owner = shells
            .iter()
            .enumerate()
            .filter(|(_, shell)| shell.contains(&probe))
            .min_by_key(|(i, _)| signed_area2(&exteriors[*i]))
            .map(|(i, _)| i);
        match owner {
            Some(i) => interiors[i].push(hole),
            None => log::warn!("dropping hole ring with no enclosing exterior"),
        }
    }

    let gt = raster.transform();
    let to_map = |x: f64, y: f64| gt.pixel_to_geo_corner(x, y);
    let polygons = exteriors
        .iter()
        .zip(interiors)
        .map(|(shell, holes)| {
            Polygon::new(
                to_linestring(shell, to_map),
                holes.into_iter().map(|h| to_linestring(h, to_map)).collect(),
            )
        })
        .collect();
    Ok(MultiPolygon::new(polygons).orient(Direction::Default))
}

fn trace_ring(
    start: usize,
    edges: &[Edge],
    outgoing: &HashMap<Vertex, Vec<usize>>,
    used: &mut [bool],
) -> Result<Vec<Vertex>> {
    let origin = edges[start].from;
    let mut ring = vec![origin];
    let mut current = start;
    used[start] = true;
    loop {
        let edge = edges[current];
        if edge.to == origin {
            return Ok(ring);
        }
        ring.push(edge.to);
        let (dx, dy) = edge.direction();
        // right, straight, left
        let preferred = [(-dy, dx), (dx, dy), (dy, -dx)];
        let candidates = outgoing.get(&edge.to).map(Vec::as_slice).unwrap_or_default();
        let next = preferred
            .iter()
            .find_map(|d| {
                candidates
                    .iter()
                    .copied()
                    .find(|&i| !used[i] && edges[i].direction() == *d)
            })
            .ok_or_else(|| BasinError::Raster(format!("open boundary at {:?}", edge.to)))?;
        used[next] = true;
        current = next;
    }
}

/// Break a ring that revisits a vertex into simple loops.
fn split_loops(ring: Vec<Vertex>) -> Vec<Vec<Vertex>> {
    let mut loops = Vec::new();
    let mut stack: Vec<Vertex> = Vec::with_capacity(ring.len());
    let mut seen: HashMap<Vertex, usize> = HashMap::new();
    for v in ring {
        if let Some(&pos) = seen.get(&v) {
            for p in &stack[pos + 1..] {
                seen.remove(p);
            }
            loops.push(stack.split_off(pos));
            stack.push(v);
        } else {
            seen.insert(v, stack.len());
            stack.push(v);
        }
    }
    loops.push(stack);
    loops
}

fn drop_collinear(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    (0..n)
        .filter(|&i| {
            let p = ring[(i + n - 1) % n];
            let v = ring[i];
            let q = ring[(i + 1) % n];
            (v.0 - p.0) * (q.1 - v.1) - (v.1 - p.1) * (q.0 - v.0) != 0
        })
        .map(|i| ring[i])
        .collect()
}

/// Twice the signed area; positive for rings with selected cells inside.
fn signed_area2(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            a.0 * b.1 - b.0 * a.1
        })
        .sum()
}

/// Centre of the selected cell on the right of the ring's first edge.
fn inner_probe(ring: &[Vertex]) -> Point<f64> {
    let (a, b) = (ring[0], ring[1]);
    let (dx, dy) = ((b.0 - a.0).signum() as f64, (b.1 - a.1).signum() as f64);
    let mid_x = (a.0 + b.0) as f64 / 2.0;
    let mid_y = (a.1 + b.1) as f64 / 2.0;
    Point::new(mid_x - 0.5 * dy, mid_y + 0.5 * dx)
}

fn to_linestring<F>(ring: &[Vertex], map: F) -> LineString<f64>
where
    F: Fn(f64, f64) -> (f64, f64),
{
    let mut coords: Vec<Coord<f64>> = ring
        .iter()
        .map(|&(x, y)| {
            let (mx, my) = map(x as f64, y as f64);
            Coord { x: mx, y: my }
        })
        .collect();
    if let Some(&first) = coords.first() {
        coords.push(first);
    }
    LineString::new(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;
    use geo::Area;

    fn grid(values: &[&[f64]]) -> Raster {
        let rows = values.len();
        let cols = values[0].len();
        let data = values.iter().flat_map(|r| r.iter().copied()).collect();
        Raster::from_vec(data, rows, cols)
            .unwrap()
            .with_georef(GeoTransform::new(0.0, rows as f64 * 10.0, 10.0, -10.0), None)
            .with_nodata(Some(-1.0))
    }

    #[test]
    fn test_single_cell() {
        let raster = grid(&[&[0.0, 0.0], &[0.0, 1.0]]);
        let mp = polygonize(&raster, |v| v > 0.0).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].exterior().0.len(), 5);
        assert_eq!(mp.unsigned_area(), 100.0);
        assert!(mp.signed_area() > 0.0);
    }

    #[test]
    fn test_l_shape_drops_collinear_vertices() {
        let raster = grid(&[&[1.0, 1.0, 1.0], &[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]]);
        let mp = polygonize(&raster, |v| v > 0.0).unwrap();
        assert_eq!(mp.0.len(), 1);
        // six corners plus the closing point
        assert_eq!(mp.0[0].exterior().0.len(), 7);
        assert_eq!(mp.unsigned_area(), 500.0);
    }

    #[test]
    fn test_ring_with_hole() {
        let raster = grid(&[&[1.0, 1.0, 1.0], &[1.0, 0.0, 1.0], &[1.0, 1.0, 1.0]]);
        let mp = polygonize(&raster, |v| v > 0.0).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert_eq!(mp.unsigned_area(), 800.0);
    }

    #[test]
    fn test_hole_touching_outside_at_a_corner() {
        let raster = grid(&[&[0.0, 1.0, 1.0], &[1.0, 0.0, 1.0], &[1.0, 1.0, 1.0]]);
        let mp = polygonize(&raster, |v| v > 0.0).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert_eq!(mp.unsigned_area(), 700.0);
    }

    #[test]
    fn test_diagonal_cells_stay_separate() {
        let raster = grid(&[&[1.0, 0.0], &[0.0, 1.0]]);
        let mp = polygonize(&raster, |v| v > 0.0).unwrap();
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.unsigned_area(), 200.0);
    }

    #[test]
    fn test_nodata_and_empty() {
        let raster = grid(&[&[-1.0, -1.0], &[-1.0, 0.0]]);
        assert!(polygonize(&raster, |_| true).is_ok());
        assert!(polygonize(&raster, |v| v > 0.0).is_err());
    }

    #[test]
    fn test_map_coordinates() {
        let raster = grid(&[&[1.0]]);
        let mp = polygonize(&raster, |v| v > 0.0).unwrap();
        let xs: Vec<f64> = mp.0[0].exterior().coords().map(|c| c.x).collect();
        let ys: Vec<f64> = mp.0[0].exterior().coords().map(|c| c.y).collect();
        assert!(xs.iter().all(|&x| x == 0.0 || x == 10.0));
        assert!(ys.iter().all(|&y| y == 0.0 || y == 10.0));
    }
}
