//! A lenient pass over the raw text of a GPX file, run before handing it to the `gpx` crate.
//!
//! `gpx` refuses the whole document when a single `<trkpt>` has an out-of-range coordinate or an
//! unreadable time. This pass finds those points, records where they sit (track, segment and
//! point index), and cuts them out of the text so the rest of the track still loads. Anything it
//! can't follow is left for `gpx` to report.

use super::gpx::RejectedPoint;
use chrono::DateTime;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_till1, take_until, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{map, opt},
    error::{context, VerboseError},
    multi::many0,
    sequence::{delimited, pair, tuple},
    IResult,
};
use std::ops::Range;

type StrResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

/// The document with its bad track points removed.
#[derive(Debug)]
pub struct Screened {
    pub document: String,
    pub rejected: Vec<RejectedPoint>,
    // Original indices of the points that were kept, by track and segment
    kept: Vec<Vec<Vec<usize>>>,
}

impl Screened {
    fn unchanged(text: &str) -> Self {
        Screened {
            document: text.to_string(),
            rejected: Vec::new(),
            kept: Vec::new(),
        }
    }

    /// Index in the original document of the `point`-th remaining point of a segment.
    pub fn original_index(&self, track: usize, segment: usize, point: usize) -> usize {
        self.kept
            .get(track)
            .and_then(|t| t.get(segment))
            .and_then(|s| s.get(point))
            .copied()
            .unwrap_or(point)
    }
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Open {
        name: &'a str,
        attributes: Vec<(&'a str, &'a str)>,
        empty: bool,
    },
    Close(&'a str),
    Text(&'a str),
    Other,
}

// Element name without its namespace prefix
fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn name(i: &str) -> StrResult<&str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == ':')(i)
}

fn quoted(i: &str) -> StrResult<&str> {
    alt((
        delimited(char('"'), take_till(|c: char| c == '"'), char('"')),
        delimited(char('\''), take_till(|c: char| c == '\''), char('\'')),
    ))(i)
}

fn attribute(i: &str) -> StrResult<(&str, &str)> {
    let (i, (_, key, _, _, _, value)) =
        tuple((multispace1, name, multispace0, char('='), multispace0, quoted))(i)?;
    Ok((i, (local_name(key), value)))
}

fn open_tag(i: &str) -> StrResult<Token> {
    let (i, (_, name, attributes, _, empty, _)) = tuple((
        char('<'),
        name,
        many0(attribute),
        multispace0,
        opt(char('/')),
        char('>'),
    ))(i)?;
    let token = Token::Open {
        name: local_name(name),
        attributes,
        empty: empty.is_some(),
    };
    Ok((i, token))
}

fn close_tag(i: &str) -> StrResult<Token> {
    map(
        delimited(tag("</"), name, pair(multispace0, char('>'))),
        |name| Token::Close(local_name(name)),
    )(i)
}

fn token(i: &str) -> StrResult<Token> {
    let comment = map(
        tuple((tag("<!--"), take_until("-->"), tag("-->"))),
        |_| Token::Other,
    );
    let cdata = map(
        delimited(tag("<![CDATA["), take_until("]]>"), tag("]]>")),
        Token::Text,
    );
    let declaration = map(tuple((tag("<!"), take_until(">"), char('>'))), |_| {
        Token::Other
    });
    let instruction = map(tuple((tag("<?"), take_until("?>"), tag("?>"))), |_| {
        Token::Other
    });
    let text = map(take_till1(|c: char| c == '<'), Token::Text);

    context(
        "GPX markup",
        alt((comment, cdata, declaration, instruction, close_tag, open_tag, text)),
    )(i)
}

/// A `<trkpt>` whose end tag hasn't been reached yet.
struct OpenPoint<'a> {
    start: usize,
    track: usize,
    segment: usize,
    point: usize,
    latitude: Option<&'a str>,
    longitude: Option<&'a str>,
    time: Option<String>,
}

impl OpenPoint<'_> {
    /// Why `gpx` (or the track index) would refuse this point, if it would.
    fn problem(&self) -> Option<String> {
        check_coordinate(self.latitude, "latitude", 90.0)
            .and_then(|_| check_coordinate(self.longitude, "longitude", 180.0))
            .and_then(|_| match &self.time {
                Some(time) => DateTime::parse_from_rfc3339(time.trim())
                    .map(|_| ())
                    .map_err(|e| format!("bad time {:?}: {}", time.trim(), e)),
                None => Ok(()),
            })
            .err()
    }
}

fn check_coordinate(value: Option<&str>, name: &str, limit: f64) -> Result<(), String> {
    let value = value.ok_or_else(|| format!("no {} attribute", name))?;
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid {} {:?}", name, value))?;
    if !parsed.is_finite() || parsed.abs() > limit {
        return Err(format!("{} {} is out of range", name, value));
    }
    Ok(())
}

/// Find the track points in `text` that can't be loaded and cut them out.
pub fn screen(text: &str) -> Screened {
    let mut kept: Vec<Vec<Vec<usize>>> = Vec::new();
    let mut rejected = Vec::new();
    let mut cuts: Vec<Range<usize>> = Vec::new();

    let mut seen_in_segment = 0;
    let mut open: Option<OpenPoint> = None;
    let mut in_time = false;

    let mut rest = text;
    while !rest.is_empty() {
        let start = text.len() - rest.len();
        let (next, token) = match token(rest) {
            Ok(result) => result,
            Err(_) => return Screened::unchanged(text),
        };
        let end = text.len() - next.len();
        rest = next;

        let mut finished = None;
        match token {
            // `gpx` turns `<trk/>` and `<trkseg/>` into empty tracks and segments, so they count
            Token::Open { name: "trk", .. } => kept.push(Vec::new()),
            Token::Open { name: "trkseg", .. } => {
                if let Some(track) = kept.last_mut() {
                    track.push(Vec::new());
                }
                seen_in_segment = 0;
            }
            Token::Open {
                name: "trkpt",
                attributes,
                empty,
            } => {
                let location = match kept.last() {
                    Some(track) if !track.is_empty() => Some((kept.len() - 1, track.len() - 1)),
                    _ => None,
                };
                if let Some((track, segment)) = location {
                    let find = |key| {
                        attributes
                            .iter()
                            .find(|(k, _)| *k == key)
                            .map(|(_, v)| *v)
                    };
                    let point = OpenPoint {
                        start,
                        track,
                        segment,
                        point: seen_in_segment,
                        latitude: find("lat"),
                        longitude: find("lon"),
                        time: None,
                    };
                    seen_in_segment += 1;
                    if empty {
                        finished = Some(point);
                    } else {
                        open = Some(point);
                    }
                }
            }
            Token::Open {
                name: "time",
                empty: false,
                ..
            } => {
                if let Some(point) = open.as_mut() {
                    point.time = Some(String::new());
                    in_time = true;
                }
            }
            Token::Text(s) if in_time => {
                if let Some(time) = open.as_mut().and_then(|p| p.time.as_mut()) {
                    time.push_str(s);
                }
            }
            Token::Close("time") => in_time = false,
            Token::Close("trkpt") => finished = open.take(),
            _ => {}
        }

        if let Some(point) = finished {
            match point.problem() {
                Some(reason) => {
                    cuts.push(point.start..end);
                    rejected.push(RejectedPoint {
                        track: point.track,
                        segment: point.segment,
                        point: point.point,
                        reason,
                    });
                }
                None => kept[point.track][point.segment].push(point.point),
            }
        }
    }

    let mut document = String::with_capacity(text.len());
    let mut from = 0;
    for cut in &cuts {
        document.push_str(&text[from..cut.start]);
        from = cut.end;
    }
    document.push_str(&text[from..]);

    Screened {
        document,
        rejected,
        kept,
    }
}
