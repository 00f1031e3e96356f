use crate::common::{Error, Result};
use crate::graph::NodeCoords;

/// One user scribble: an ordered run of pixel coordinates. A single-pixel
/// marker is a click, a longer one is a stroke.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Marker {
    pub coords: Vec<NodeCoords>,
}

impl Marker {
    pub fn new(coords: Vec<NodeCoords>) -> Self {
        Self { coords }
    }

    pub fn from_point(x: i32, y: i32) -> Self {
        Self {
            coords: vec![NodeCoords { x, y }],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

/// Parses the scribble text format: the first line carries the marker count,
/// and each marker follows as a pixel-count line and that many `x;y` lines
/// (`y;x` when `inverse` is set). `max_markers` caps how many markers are
/// kept; the default keeps them all.
///
/// Coordinates must be non-negative and inside the `num_rows` x `num_cols`
/// image; any malformed or truncated line is fatal.
pub fn parse_markers(
    text: &str,
    inverse: bool,
    num_rows: usize,
    num_cols: usize,
    max_markers: Option<usize>,
) -> Result<Vec<Marker>> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    let declared: usize = next_field(&mut lines, "marker count")?;
    let keep = match max_markers {
        Some(cap) if cap >= 1 => declared.min(cap),
        _ => declared,
    };

    let mut markers = Vec::with_capacity(keep);
    for _ in 0..keep {
        let size: usize = next_field(&mut lines, "marker pixel count")?;
        let mut coords = Vec::with_capacity(size);
        for _ in 0..size {
            let line = lines
                .next()
                .ok_or_else(|| Error::MarkerFormat("missing coordinate line".into()))?;
            let (a, b) = line
                .split_once(';')
                .ok_or_else(|| Error::MarkerFormat(format!("expected `x;y`, got `{line}`")))?;
            let a: i32 = parse_coord(a)?;
            let b: i32 = parse_coord(b)?;
            let (x, y) = if inverse { (b, a) } else { (a, b) };
            if x < 0 || y < 0 || x as usize >= num_cols || y as usize >= num_rows {
                return Err(Error::MarkerOutOfBounds { x, y });
            }
            coords.push(NodeCoords { x, y });
        }
        markers.push(Marker::new(coords));
    }
    Ok(markers)
}

fn next_field<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<usize> {
    let line = lines
        .next()
        .ok_or_else(|| Error::MarkerFormat(format!("missing {what}")))?;
    line.parse()
        .map_err(|_| Error::MarkerFormat(format!("invalid {what}: `{line}`")))
}

fn parse_coord(field: &str) -> Result<i32> {
    field
        .trim()
        .parse()
        .map_err(|_| Error::MarkerFormat(format!("invalid coordinate: `{field}`")))
}

#[cfg(test)]
mod tests {
    use super::parse_markers;
    use crate::common::Error;
    use crate::graph::NodeCoords;

    const TWO_MARKERS: &str = "2\n1\n3;4\n2\n0;0\n1;0\n";

    #[test]
    fn parses_two_markers() {
        let markers = parse_markers(TWO_MARKERS, false, 8, 8, None).unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].coords, vec![NodeCoords { x: 3, y: 4 }]);
        assert_eq!(
            markers[1].coords,
            vec![NodeCoords { x: 0, y: 0 }, NodeCoords { x: 1, y: 0 }]
        );
    }

    #[test]
    fn inverse_swaps_coordinate_order() {
        let markers = parse_markers("1\n1\n4;3\n", true, 8, 8, None).unwrap();
        assert_eq!(markers[0].coords, vec![NodeCoords { x: 3, y: 4 }]);
    }

    #[test]
    fn max_markers_caps_the_list() {
        let markers = parse_markers(TWO_MARKERS, false, 8, 8, Some(1)).unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].len(), 1);
    }

    #[test]
    fn missing_coordinate_line_is_fatal() {
        let err = parse_markers("1\n2\n3;4\n", false, 8, 8, None).unwrap_err();
        assert!(matches!(err, Error::MarkerFormat(_)));
    }

    #[test]
    fn garbled_pair_is_fatal() {
        let err = parse_markers("1\n1\n3,4\n", false, 8, 8, None).unwrap_err();
        assert!(matches!(err, Error::MarkerFormat(_)));
    }

    #[test]
    fn out_of_bounds_coordinate_is_fatal() {
        let err = parse_markers("1\n1\n9;1\n", false, 8, 8, None).unwrap_err();
        assert!(matches!(err, Error::MarkerOutOfBounds { x: 9, y: 1 }));
    }

    #[test]
    fn negative_coordinate_is_fatal() {
        let err = parse_markers("1\n1\n-1;2\n", false, 8, 8, None).unwrap_err();
        assert!(matches!(err, Error::MarkerOutOfBounds { x: -1, y: 2 }));
    }
}
