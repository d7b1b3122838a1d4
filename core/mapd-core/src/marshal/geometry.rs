//! Geometry values and their WKT text form.
//!
//! Geometry columns travel in the string slot as WKT. Coordinates are printed
//! with the shortest representation that parses back to the same `f64`.

use crate::error::{MapdError, MapdResult};
use std::fmt::Write;

pub type Coord = (f64, f64);

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    LineString(Vec<Coord>),
    /// Exterior ring first, then holes
    Polygon(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
}

impl Geometry {
    /// Server type name for this geometry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "POINT",
            Geometry::LineString(_) => "LINESTRING",
            Geometry::Polygon(_) => "POLYGON",
            Geometry::MultiPolygon(_) => "MULTIPOLYGON",
        }
    }

    /// Every coordinate, in WKT order.
    pub fn coords(&self) -> Box<dyn Iterator<Item = &Coord> + '_> {
        match self {
            Geometry::Point(c) => Box::new(std::iter::once(c)),
            Geometry::LineString(line) => Box::new(line.iter()),
            Geometry::Polygon(rings) => Box::new(rings.iter().flatten()),
            Geometry::MultiPolygon(polys) => Box::new(polys.iter().flatten().flatten()),
        }
    }

    /// NaN and infinite coordinates have no WKT form the server accepts.
    pub fn check_finite(&self) -> MapdResult<()> {
        match self.coords().find(|(x, y)| !x.is_finite() || !y.is_finite()) {
            Some((x, y)) => Err(MapdError::Value(format!(
                "{} has a non-finite coordinate ({x} {y})",
                self.type_name()
            ))),
            None => Ok(()),
        }
    }

    pub fn to_wkt(&self) -> String {
        let mut out = String::from(self.type_name());
        out.push(' ');
        match self {
            Geometry::Point(c) => {
                out.push('(');
                write_coord(&mut out, c);
                out.push(')');
            }
            Geometry::LineString(line) => write_ring(&mut out, line),
            Geometry::Polygon(rings) => write_polygon(&mut out, rings),
            Geometry::MultiPolygon(polys) => {
                out.push('(');
                for (i, rings) in polys.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_polygon(&mut out, rings);
                }
                out.push(')');
            }
        }
        out
    }

    pub fn from_wkt(text: &str) -> MapdResult<Self> {
        let text = text.trim();
        let open = text
            .find('(')
            .ok_or_else(|| MapdError::Value(format!("invalid WKT: {text}")))?;
        let tag = text[..open].trim().to_ascii_uppercase();
        let mut p = WktParser {
            src: text,
            bytes: text.as_bytes(),
            pos: open,
        };
        let geometry = match tag.as_str() {
            "POINT" => {
                let coords = p.coord_list()?;
                match coords.as_slice() {
                    [c] => Geometry::Point(*c),
                    _ => return Err(p.error("POINT needs exactly one coordinate")),
                }
            }
            "LINESTRING" => Geometry::LineString(p.coord_list()?),
            "POLYGON" => Geometry::Polygon(p.nested(|p| p.coord_list())?),
            "MULTIPOLYGON" => {
                Geometry::MultiPolygon(p.nested(|p| p.nested(|p| p.coord_list()))?)
            }
            _ => return Err(MapdError::Value(format!("unsupported WKT geometry '{tag}'"))),
        };
        p.skip_ws();
        if p.pos != p.bytes.len() {
            return Err(p.error("trailing characters"));
        }
        geometry.check_finite()?;
        Ok(geometry)
    }
}

fn write_coord(out: &mut String, c: &Coord) {
    let _ = write!(out, "{} {}", c.0, c.1);
}

fn write_ring(out: &mut String, ring: &[Coord]) {
    out.push('(');
    for (i, c) in ring.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_coord(out, c);
    }
    out.push(')');
}

fn write_polygon(out: &mut String, rings: &[Vec<Coord>]) {
    out.push('(');
    for (i, ring) in rings.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_ring(out, ring);
    }
    out.push(')');
}

struct WktParser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> WktParser<'a> {
    fn error(&self, what: &str) -> MapdError {
        MapdError::Value(format!("invalid WKT at byte {}: {what} in '{}'", self.pos, self.src))
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, b: u8) -> MapdResult<()> {
        self.skip_ws();
        if self.bytes.get(self.pos) == Some(&b) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", b as char)))
        }
    }

    /// Consume `,` (returns true) or `)` (returns false).
    fn separator(&mut self) -> MapdResult<bool> {
        self.skip_ws();
        match self.bytes.get(self.pos) {
            Some(b',') => {
                self.pos += 1;
                Ok(true)
            }
            Some(b')') => {
                self.pos += 1;
                Ok(false)
            }
            _ => Err(self.error("expected ',' or ')'")),
        }
    }

    fn number(&mut self) -> MapdResult<f64> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.bytes.len()
            && matches!(self.bytes[self.pos], b'0'..=b'9' | b'+' | b'-' | b'.' | b'e' | b'E')
        {
            self.pos += 1;
        }
        self.src[start..self.pos]
            .parse::<f64>()
            .map_err(|_| self.error("expected number"))
    }

    fn coord_list(&mut self) -> MapdResult<Vec<Coord>> {
        self.expect(b'(')?;
        let mut coords = Vec::new();
        loop {
            let x = self.number()?;
            let y = self.number()?;
            coords.push((x, y));
            if !self.separator()? {
                return Ok(coords);
            }
        }
    }

    fn nested<T>(&mut self, mut item: impl FnMut(&mut Self) -> MapdResult<T>) -> MapdResult<Vec<T>> {
        self.expect(b'(')?;
        let mut items = Vec::new();
        loop {
            items.push(item(self)?);
            if !self.separator()? {
                return Ok(items);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_wkt() {
        let p = Geometry::Point((1.0, 2.5));
        assert_eq!(p.to_wkt(), "POINT (1 2.5)");
        assert_eq!(Geometry::from_wkt("POINT (1 2.5)").unwrap(), p);
    }

    #[test]
    fn multipolygon_round_trip() {
        let g = Geometry::MultiPolygon(vec![
            vec![vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]],
            vec![
                vec![(10.0, 10.0), (20.0, 10.0), (20.0, 20.0), (10.0, 10.0)],
                vec![(12.0, 12.0), (13.0, 12.0), (13.0, 13.0), (12.0, 12.0)],
            ],
        ]);
        let wkt = g.to_wkt();
        assert!(wkt.starts_with("MULTIPOLYGON (((0 0, 1 0"));
        assert_eq!(Geometry::from_wkt(&wkt).unwrap(), g);
    }

    #[test]
    fn parses_compact_spacing() {
        let g = Geometry::from_wkt("linestring(0 0,-1.5 2e1)").unwrap();
        assert_eq!(g, Geometry::LineString(vec![(0.0, 0.0), (-1.5, 20.0)]));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Geometry::from_wkt("POINT").is_err());
        assert!(Geometry::from_wkt("POINT (1)").is_err());
        assert!(Geometry::from_wkt("CIRCLE (1 2)").is_err());
        assert!(Geometry::from_wkt("POINT (1 2) x").is_err());
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let bad = [
            Geometry::Point((f64::NAN, 0.0)),
            Geometry::LineString(vec![(0.0, 0.0), (1.0, f64::INFINITY)]),
            Geometry::MultiPolygon(vec![vec![vec![(0.0, 0.0), (f64::NEG_INFINITY, 1.0)]]]),
        ];
        for g in &bad {
            assert!(matches!(g.check_finite(), Err(MapdError::Value(_))), "{g:?}");
        }
        assert!(Geometry::Polygon(vec![vec![(0.0, 0.0), (1.0, 1.0)]]).check_finite().is_ok());
        // overflows to infinity when parsed
        assert!(Geometry::from_wkt("POINT (1e999 0)").is_err());
    }
}
