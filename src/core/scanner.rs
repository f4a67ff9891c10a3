//! Line classifier for OSM XML dumps.
//!
//! This is not an XML parser. Each line is expected to hold at most one
//! element opening or closing marker, which is how `osmium`, JOSM and the
//! Overpass API lay out `.osm` files. Attribute values are read by name and
//! may be quoted with either `"` or `'`.

/// Attributes of a `<node>` line that parsed completely
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeAttrs<'a> {
    pub id: &'a str,
    pub lat: f64,
    pub lon: f64,
}

/// What a single input line means to the extractor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineKind<'a> {
    Node(NodeAttrs<'a>),
    /// `<node` line missing `id`, `lat` or `lon`, or with unparsable numbers
    MalformedNode,
    WayStart { self_closing: bool },
    WayEnd,
    /// `<nd ref=".."/>` inside a way
    MemberRef(&'a str),
    MalformedRef,
    Tag { key: &'a str, value: Option<&'a str> },
    RelationStart { self_closing: bool },
    RelationEnd,
    Other,
}

/// Classify one line of input
pub fn classify(line: &str) -> LineKind<'_> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('<') else {
        return LineKind::Other;
    };

    if let Some(closing) = rest.strip_prefix('/') {
        return match element_name(closing) {
            "way" => LineKind::WayEnd,
            "relation" => LineKind::RelationEnd,
            _ => LineKind::Other,
        };
    }

    let self_closing = line.ends_with("/>");
    match element_name(rest) {
        "node" => parse_node(line),
        "way" => LineKind::WayStart { self_closing },
        "nd" => match attribute(line, "ref") {
            Some(r) if !r.is_empty() => LineKind::MemberRef(r),
            _ => LineKind::MalformedRef,
        },
        "tag" => match attribute(line, "k") {
            Some(key) => LineKind::Tag {
                key,
                value: attribute(line, "v"),
            },
            None => LineKind::Other,
        },
        "relation" => LineKind::RelationStart { self_closing },
        _ => LineKind::Other,
    }
}

fn element_name(s: &str) -> &str {
    let end = s
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(s.len());
    &s[..end]
}

fn parse_node(line: &str) -> LineKind<'_> {
    let id = attribute(line, "id").filter(|id| !id.is_empty());
    let lat = attribute(line, "lat").and_then(parse_coordinate);
    let lon = attribute(line, "lon").and_then(parse_coordinate);

    match (id, lat, lon) {
        (Some(id), Some(lat), Some(lon)) => LineKind::Node(NodeAttrs { id, lat, lon }),
        _ => LineKind::MalformedNode,
    }
}

fn parse_coordinate(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Value of attribute `name`, matched only at an attribute boundary so that
/// `id` does not pick up `uid` or `changeset_id`.
pub fn attribute<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let bytes = line.as_bytes();
    let mut from = 0;

    while let Some(pos) = line[from..].find(name) {
        let start = from + pos;
        let after = start + name.len();
        from = after;

        let at_boundary = start == 0 || bytes[start - 1].is_ascii_whitespace();
        if !at_boundary || bytes.get(after) != Some(&b'=') {
            continue;
        }

        let quote = match bytes.get(after + 1) {
            Some(&q) if q == b'"' || q == b'\'' => q as char,
            _ => continue,
        };
        let value_start = after + 2;
        let value_len = line[value_start..].find(quote)?;
        return Some(&line[value_start..value_start + value_len]);
    }

    None
}
